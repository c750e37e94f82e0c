//! Store operation enum.

use std::fmt;

/// The native operations a compiled statement can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Point read by full primary key.
    GetItem,
    /// Key-condition read against a table or index.
    Query,
    /// Full traversal with optional filter.
    Scan,
    /// Insert or replace a single item.
    PutItem,
    /// Create a table with its key schema and indexes.
    CreateTable,
    /// Fetch table metadata (consumed by the schema resolver).
    DescribeTable,
}

impl StoreOperation {
    /// The native operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetItem => "GetItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::PutItem => "PutItem",
            Self::CreateTable => "CreateTable",
            Self::DescribeTable => "DescribeTable",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
