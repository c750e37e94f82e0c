//! Connection: store client, schema cache, configuration.

use std::sync::Arc;

use tracing::debug;

use dynasql_core::error::Error;
use dynasql_core::parser::parse;
use dynasql_core::schema::SchemaCache;

use crate::config::Config;
use crate::statement::PreparedStatement;
use crate::store::{DescribeTableSource, StoreClient};

/// A connection to one store.
///
/// Cheap to clone; clones share the store client and the schema cache.
/// Statements prepared from one connection may execute concurrently.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) store: Arc<dyn StoreClient>,
    pub(crate) schema: Arc<SchemaCache>,
    pub(crate) config: Config,
}

impl Connection {
    /// Open a connection over a pre-built store client.
    #[must_use]
    pub fn new(store: Arc<dyn StoreClient>, config: Config) -> Self {
        let source = Arc::new(DescribeTableSource {
            store: Arc::clone(&store),
        });
        let schema = Arc::new(SchemaCache::new(source, config.schema_cache_ttl));
        Self {
            store,
            schema,
            config,
        }
    }

    /// Lex and parse `sql` once, memoizing the AST for repeated execution.
    ///
    /// # Errors
    ///
    /// Returns lex/parse failures; no schema access happens here.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement, Error> {
        let statement = parse(sql)?;
        debug!(sql, "prepared statement");
        Ok(PreparedStatement::new(
            self.clone(),
            sql.to_owned(),
            statement,
        ))
    }

    /// Drop the cached descriptor of one table.
    pub fn invalidate_schema(&self, table: &str) {
        self.schema.invalidate(table);
    }

    /// Drop every cached descriptor.
    pub fn invalidate_all_schemas(&self) {
        self.schema.invalidate_all();
    }
}
