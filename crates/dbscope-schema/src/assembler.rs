//! Facet queries and full schema assembly for one connection

use dbscope_core::{Connection, Row};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dialect::{Dialect, Facet};
use crate::document::{FromRow, decode_rows, merge_constraint_columns, merge_index_columns};
use crate::{
    ColumnInfo, EnumCatalog, EnumRecord, ForeignKey, IndexInfo, IntrospectionContext, PrimaryKey,
    SchemaDocument, SchemaError, SchemaResult, TableInfo, TableSchema, TableStats,
    UniqueConstraint, execute_with_fallbacks,
};

/// Runs introspection for one tool call against one connection.
///
/// Every query runs under the assembler's [`IntrospectionContext`]; the
/// dialect is chosen from the connection's driver name.
pub struct SchemaAssembler {
    conn: Arc<dyn Connection>,
    dialect: Dialect,
    ctx: IntrospectionContext,
}

impl SchemaAssembler {
    pub fn new(conn: Arc<dyn Connection>, ctx: IntrospectionContext) -> Self {
        let dialect = Dialect::for_driver(conn.driver_name());
        Self { conn, dialect, ctx }
    }

    /// Override the dialect picked from the driver name
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Database kind as reported by the driver
    pub fn db_type(&self) -> &str {
        self.conn.driver_name()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn context(&self) -> &IntrospectionContext {
        &self.ctx
    }

    async fn fetch(&self, facet: Facet, table: &str) -> SchemaResult<Vec<Row>> {
        let operation = facet.operation(table);
        let candidates = self.dialect.strategy().queries(facet, table);
        execute_with_fallbacks(self.conn.as_ref(), &self.ctx, &candidates, &operation).await
    }

    async fn fetch_records<T: FromRow>(&self, facet: Facet, table: &str) -> SchemaResult<Vec<T>> {
        let rows = self.fetch(facet, table).await?;
        Ok(decode_rows(&rows, &facet.operation(table)))
    }

    /// Tables visible to the connection
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn tables(&self) -> SchemaResult<Vec<TableInfo>> {
        self.fetch_records(Facet::Tables, "").await
    }

    /// Columns of one table, in ordinal order
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn columns(&self, table: &str) -> SchemaResult<Vec<ColumnInfo>> {
        if table.is_empty() {
            return Err(SchemaError::TableRequired {
                facet: Facet::Columns.as_str(),
            });
        }
        self.fetch_records(Facet::Columns, table).await
    }

    /// Foreign keys from or to `table`; all foreign keys when empty
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn relationships(&self, table: &str) -> SchemaResult<Vec<ForeignKey>> {
        self.fetch_records(Facet::Relationships, table).await
    }

    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn primary_keys(&self, table: &str) -> SchemaResult<Vec<PrimaryKey>> {
        self.fetch_records(Facet::PrimaryKeys, table).await
    }

    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn indexes(&self, table: &str) -> SchemaResult<Vec<IndexInfo>> {
        let indexes = self.fetch_records(Facet::Indexes, table).await?;
        Ok(merge_index_columns(indexes))
    }

    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn unique_constraints(&self, table: &str) -> SchemaResult<Vec<UniqueConstraint>> {
        let constraints = self.fetch_records(Facet::UniqueConstraints, table).await?;
        Ok(merge_constraint_columns(constraints))
    }

    /// Table statistics; empty when the engine does not expose them
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn table_stats(&self, table: &str) -> SchemaResult<Vec<TableStats>> {
        tolerate(
            self.fetch_records(Facet::TableStats, table).await,
            &Facet::TableStats.operation(table),
        )
    }

    /// Enum records; empty when the engine has no enums or the query fails
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn enum_values(&self) -> SchemaResult<Vec<EnumRecord>> {
        tolerate(
            self.fetch_records(Facet::EnumValues, "").await,
            Facet::EnumValues.as_str(),
        )
    }

    /// Attach enum labels and type to every column whose type resolves to
    /// a catalogued enum
    pub fn attach_enums(&self, table: &str, columns: &mut [ColumnInfo], catalog: &EnumCatalog) {
        let strategy = self.dialect.strategy();
        for column in columns.iter_mut() {
            let found = strategy
                .enum_keys(table, column)
                .into_iter()
                .find_map(|key| catalog.get(&key).map(|labels| (key, labels.to_vec())));
            if let Some((enum_type, labels)) = found {
                column.enum_values = Some(labels);
                column.enum_type = Some(enum_type);
            }
        }
    }

    /// Assemble the whole schema.
    ///
    /// Only the table list is mandatory. Enum, statistics, key, index,
    /// constraint and relationship failures leave empty sections; a table
    /// whose columns cannot be read stays in `tables` but gets no detailed
    /// entry. Deadline and cancellation abort the whole call.
    #[tracing::instrument(skip(self), fields(db_type = %self.db_type()))]
    pub async fn full_schema(&self) -> SchemaResult<SchemaDocument> {
        let tables = self.tables().await?;

        let enum_values = self.enum_values().await?;
        let enum_types = EnumCatalog::from_records(&enum_values);

        let mut stats_by_table: HashMap<String, TableStats> = self
            .table_stats("")
            .await?
            .into_iter()
            .map(|stats| (stats.table_name.clone(), stats))
            .collect();

        let mut detailed_schema = IndexMap::with_capacity(tables.len());
        for table in &tables {
            let name = table.table_name.as_str();
            let mut columns = match self.columns(name).await {
                Ok(columns) => columns,
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => {
                    tracing::warn!(table = %name, error = %e, "failed to get columns, skipping table details");
                    continue;
                }
            };
            self.attach_enums(name, &mut columns, &enum_types);

            let primary_keys = tolerate(
                self.primary_keys(name).await,
                &Facet::PrimaryKeys.operation(name),
            )?;
            let indexes = tolerate(self.indexes(name).await, &Facet::Indexes.operation(name))?;
            let unique_constraints = tolerate(
                self.unique_constraints(name).await,
                &Facet::UniqueConstraints.operation(name),
            )?;

            detailed_schema.insert(
                name.to_string(),
                TableSchema {
                    columns,
                    primary_keys,
                    indexes,
                    unique_constraints,
                    statistics: stats_by_table.remove(name).unwrap_or_default(),
                    foreign_keys: Vec::new(),
                },
            );
        }

        let foreign_keys = tolerate(
            self.relationships("").await,
            Facet::Relationships.as_str(),
        )?;
        for fk in &foreign_keys {
            if let Some(schema) = detailed_schema.get_mut(&fk.table_name) {
                schema.foreign_keys.push(fk.clone());
            }
        }

        tracing::debug!(
            tables = tables.len(),
            detailed = detailed_schema.len(),
            foreign_keys = foreign_keys.len(),
            enum_types = enum_types.len(),
            "schema assembled"
        );

        Ok(SchemaDocument {
            tables,
            detailed_schema,
            foreign_keys,
            enum_types,
            enum_values,
        })
    }
}

/// Degrade an optional facet to its empty value, passing interruptions on
fn tolerate<T: Default>(result: SchemaResult<T>, operation: &str) -> SchemaResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_interruption() => Err(e),
        Err(e) => {
            tracing::warn!(operation = %operation, error = %e, "optional schema facet unavailable");
            Ok(T::default())
        }
    }
}
