//! End-to-end tests for the dynasql driver.
//!
//! Statements run through the full pipeline (lex, parse, schema resolve,
//! plan, render, dispatch) against an in-memory store client, so every
//! scenario exercises the compiled requests for real.

use std::sync::{Arc, Once};

use dynasql_driver::{Config, Connection};

pub mod memory_store;

#[cfg(test)]
mod test_scenarios;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A connection over a fresh in-memory store.
#[must_use]
pub fn memory_connection(config: Config) -> Connection {
    init_tracing();
    Connection::new(Arc::new(memory_store::MemoryStore::new()), config)
}
