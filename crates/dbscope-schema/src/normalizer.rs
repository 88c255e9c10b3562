//! Cursor-to-rows conversion

use dbscope_core::{Row, RowCursor};
use std::sync::Arc;

use crate::{IntrospectionContext, SchemaError, SchemaResult};

/// Owns a cursor and closes it on every exit path.
///
/// The normal path closes explicitly; early returns and unwinding fall back
/// to a close spawned on the current runtime.
struct CursorGuard {
    cursor: Option<Box<dyn RowCursor>>,
}

impl CursorGuard {
    fn new(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            cursor: Some(cursor),
        }
    }

    fn cursor(&mut self) -> Option<&mut Box<dyn RowCursor>> {
        self.cursor.as_mut()
    }

    async fn close(mut self, operation: &str) {
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close().await {
                tracing::warn!(operation = %operation, error = %e, "error closing cursor");
            }
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        let Some(mut cursor) = self.cursor.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = cursor.close().await {
                        tracing::debug!(error = %e, "error closing abandoned cursor");
                    }
                });
            }
            Err(_) => tracing::debug!("no runtime available to close abandoned cursor"),
        }
    }
}

/// Read every remaining row of `cursor`.
///
/// Column names are read once and shared by all rows; column and row order
/// are kept as the cursor reports them. Each advance observes the context's
/// deadline and cancellation.
pub async fn collect_rows(
    cursor: Box<dyn RowCursor>,
    ctx: &IntrospectionContext,
    operation: &str,
) -> SchemaResult<Vec<Row>> {
    let columns: Arc<[String]> = cursor.columns().iter().map(|c| c.name.clone()).collect();
    let mut guard = CursorGuard::new(cursor);
    let mut rows = Vec::new();

    while let Some(cursor) = guard.cursor() {
        let next = ctx.run(operation, cursor.next_row()).await?;
        match next {
            Ok(Some(values)) => rows.push(Row::new(Arc::clone(&columns), values)),
            Ok(None) => break,
            Err(source) => {
                return Err(SchemaError::RowRead {
                    operation: operation.to_string(),
                    source,
                });
            }
        }
    }

    guard.close(operation).await;
    Ok(rows)
}
