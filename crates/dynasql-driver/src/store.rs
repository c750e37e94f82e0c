//! Store client abstraction.
//!
//! The driver talks to the store through an object-safe trait returning
//! boxed futures, so any client (an SDK wrapper, a local emulator, a test
//! double) plugs in. The client must be safe for concurrent use.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dynasql_core::error::{Error, SchemaError};
use dynasql_core::schema::{SchemaFuture, SchemaSource, TableDescriptor};
use dynasql_model::StoreErrorCode;
use dynasql_model::error::StoreError;
use dynasql_model::input::{
    CreateTableInput, DescribeTableInput, GetItemInput, PutItemInput, QueryInput, ScanInput,
};
use dynasql_model::output::{
    CreateTableOutput, DescribeTableOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
};

/// Boxed future returned by [`StoreClient`] operations.
pub type StoreFuture<T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send>>;

/// The native operations the driver dispatches.
///
/// Implementations own transport and credentials; the driver only hands them
/// fully-formed typed requests.
pub trait StoreClient: fmt::Debug + Send + Sync {
    /// Point read by full primary key.
    fn get_item(&self, input: GetItemInput) -> StoreFuture<GetItemOutput>;

    /// Keyed read against a table or index.
    fn query(&self, input: QueryInput) -> StoreFuture<QueryOutput>;

    /// Full traversal with optional filter.
    fn scan(&self, input: ScanInput) -> StoreFuture<ScanOutput>;

    /// Insert or replace one item.
    fn put_item(&self, input: PutItemInput) -> StoreFuture<PutItemOutput>;

    /// Create a table.
    fn create_table(&self, input: CreateTableInput) -> StoreFuture<CreateTableOutput>;

    /// Fetch table metadata.
    fn describe_table(&self, input: DescribeTableInput) -> StoreFuture<DescribeTableOutput>;
}

/// Schema source backed by the store's `DescribeTable`.
#[derive(Debug, Clone)]
pub(crate) struct DescribeTableSource {
    pub store: Arc<dyn StoreClient>,
}

impl SchemaSource for DescribeTableSource {
    fn fetch(&self, table: &str) -> SchemaFuture {
        let store = Arc::clone(&self.store);
        let table = table.to_owned();
        Box::pin(async move {
            let result = store
                .describe_table(DescribeTableInput {
                    table_name: table.clone(),
                })
                .await;
            match result {
                Ok(output) => {
                    let description = output
                        .table
                        .ok_or_else(|| SchemaError::TableNotFound {
                            table: table.clone(),
                        })?;
                    Ok(TableDescriptor::from_description(&description)?)
                }
                Err(err) if err.code == StoreErrorCode::ResourceNotFound => {
                    Err(SchemaError::TableNotFound { table }.into())
                }
                Err(err) => Err(Error::from(err)),
            }
        })
    }
}
