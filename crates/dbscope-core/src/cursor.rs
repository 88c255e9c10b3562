//! Row cursors returned by [`Connection::query_cursor`](crate::Connection::query_cursor)

use crate::{ColumnMeta, QueryResult, Result, Value};
use async_trait::async_trait;

/// A forward-only cursor over the rows of one result set.
///
/// Column metadata is available before the first row is read. Callers must
/// call [`RowCursor::close`] once they are done, whether or not every row
/// was consumed.
#[async_trait]
pub trait RowCursor: Send {
    /// Columns of the result set, in result order
    fn columns(&self) -> &[ColumnMeta];

    /// Advance to the next row; `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Release the cursor. Calling it more than once is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Cursor over a result that has already been fetched into memory
#[derive(Debug)]
pub struct BufferedCursor {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Vec<Value>>,
    closed: bool,
}

impl BufferedCursor {
    pub fn new(result: QueryResult) -> Self {
        let rows: Vec<Vec<Value>> = result.rows.into_iter().map(|r| r.into_values()).collect();
        Self {
            columns: result.columns,
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Whether [`RowCursor::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.next())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
