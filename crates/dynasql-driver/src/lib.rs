//! dynasql driver adapter.
//!
//! Exposes the query compiler through a database-driver shaped surface:
//! connections, prepared statements, bound parameters, and lazily paginating
//! row streams, over a pluggable store client.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod context;
pub mod rows;
pub mod statement;
pub mod store;

pub use config::Config;
pub use connection::Connection;
pub use context::ExecContext;
pub use rows::{Row, Rows, SqlValue};
pub use statement::{ExecResult, PreparedStatement};
pub use store::{StoreClient, StoreFuture};

pub use dynasql_core::Params;
pub use dynasql_core::error::Error;
