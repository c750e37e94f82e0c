//! Prepared statements and execution.
//!
//! Lifecycle: `Prepared -> Executing -> Prepared | Closed`. Concurrent
//! executions of one statement serialize on its gate; distinct statements
//! run concurrently. Rows streams detach from the statement once returned.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use dynasql_core::ast::Statement;
use dynasql_core::bind::Params;
use dynasql_core::error::{Error, PlanError};
use dynasql_core::planner::{self, Plan, PlanRequest};
use dynasql_model::StoreOperation;

use crate::connection::Connection;
use crate::context::ExecContext;
use crate::rows::{PageRequest, Row, Rows, decode_item};

/// Outcome of a write or DDL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    /// Number of rows written.
    pub affected_rows: u64,
    /// The replaced item, when the statement asked for `RETURNING ALL_OLD`
    /// and a prior item existed.
    pub returned_item: Option<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementState {
    Prepared,
    Executing,
    Closed,
}

/// A parsed statement bound to a connection, ready for repeated execution.
#[derive(Debug)]
pub struct PreparedStatement {
    conn: Connection,
    sql: String,
    statement: Arc<Statement>,
    state: Arc<Mutex<StatementState>>,
    exec_gate: Arc<tokio::sync::Mutex<()>>,
}

impl PreparedStatement {
    pub(crate) fn new(conn: Connection, sql: String, statement: Statement) -> Self {
        Self {
            conn,
            sql,
            statement: Arc::new(statement),
            state: Arc::new(Mutex::new(StatementState::Prepared)),
            exec_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The original statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The memoized AST.
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Release the statement; further executions fail.
    pub fn close(&self) {
        *self.state.lock() = StatementState::Closed;
    }

    /// Execute a `SELECT`, returning a lazily paginating row stream.
    ///
    /// # Errors
    ///
    /// Everything in the compiler taxonomy, plus [`Error::Cancelled`] from
    /// the context.
    pub async fn query(&self, params: Params, ctx: &ExecContext) -> Result<Rows, Error> {
        let _gate = self.exec_gate.lock().await;
        let _guard = self.begin()?;
        self.run_query(params, ctx).await
    }

    /// Execute a write or DDL statement.
    ///
    /// # Errors
    ///
    /// Everything in the compiler taxonomy. For multi-row inserts the store
    /// error carries the zero-based index of the first failing row; earlier
    /// rows stay written.
    pub async fn execute(&self, params: Params, ctx: &ExecContext) -> Result<ExecResult, Error> {
        let _gate = self.exec_gate.lock().await;
        let _guard = self.begin()?;
        self.run_execute(params, ctx).await
    }

    fn begin(&self) -> Result<ExecGuard, Error> {
        let mut state = self.state.lock();
        if *state == StatementState::Closed {
            return Err(PlanError::StatementClosed.into());
        }
        *state = StatementState::Executing;
        Ok(ExecGuard {
            state: Arc::clone(&self.state),
        })
    }

    async fn run_query(&self, params: Params, ctx: &ExecContext) -> Result<Rows, Error> {
        let Statement::Select(select) = self.statement.as_ref() else {
            return Err(PlanError::NotAQuery.into());
        };

        let table = ctx.run(self.conn.schema.resolve(&select.from)).await??;
        let plan = planner::plan_select(select, &table, params)?;
        log_notes(&plan);

        let request_id = Uuid::new_v4();
        match plan.request {
            PlanRequest::GetItem(input) => {
                debug!(%request_id, table = %input.table_name, op = %StoreOperation::GetItem, "dispatching store call");
                let output = ctx.run(self.conn.store.get_item(input)).await??;
                Ok(Rows::single(output.item))
            }
            PlanRequest::Query(input) => {
                debug!(%request_id, table = %input.table_name, op = %StoreOperation::Query, "dispatching store call");
                Ok(Rows::paged(
                    Arc::clone(&self.conn.store),
                    ctx.clone(),
                    PageRequest::Query(input),
                    self.conn.config.max_page_size,
                    self.conn.config.default_limit,
                ))
            }
            PlanRequest::Scan(input) => {
                debug!(%request_id, table = %input.table_name, op = %StoreOperation::Scan, "dispatching store call");
                Ok(Rows::paged(
                    Arc::clone(&self.conn.store),
                    ctx.clone(),
                    PageRequest::Scan(input),
                    self.conn.config.max_page_size,
                    self.conn.config.default_limit,
                ))
            }
            PlanRequest::Put(_) | PlanRequest::CreateTable(_) => Err(PlanError::NotAQuery.into()),
        }
    }

    async fn run_execute(&self, params: Params, ctx: &ExecContext) -> Result<ExecResult, Error> {
        match self.statement.as_ref() {
            Statement::Select(_) => Err(PlanError::NotAnExec.into()),
            Statement::Insert(insert) | Statement::Replace(insert) => {
                let table = ctx.run(self.conn.schema.resolve(&insert.into)).await??;
                let plan = planner::plan_insert(insert, &table, params)?;
                let PlanRequest::Put(puts) = plan.request else {
                    return Err(PlanError::NotAnExec.into());
                };

                let mut affected_rows = 0u64;
                let mut returned_item: Option<Row> = None;
                for (index, input) in puts.into_iter().enumerate() {
                    let request_id = Uuid::new_v4();
                    debug!(%request_id, table = %input.table_name, row = index, op = %StoreOperation::PutItem, "dispatching store call");
                    let output = match ctx.run(self.conn.store.put_item(input)).await? {
                        Ok(output) => output,
                        Err(source) => {
                            return Err(Error::Store {
                                source,
                                row: Some(index),
                            });
                        }
                    };
                    affected_rows += 1;
                    if !output.attributes.is_empty() {
                        returned_item = Some(decode_item(output.attributes));
                    }
                }
                Ok(ExecResult {
                    affected_rows,
                    returned_item,
                })
            }
            Statement::CreateTable(create) => {
                let plan = planner::plan_create_table(create)?;
                let PlanRequest::CreateTable(input) = plan.request else {
                    return Err(PlanError::NotAnExec.into());
                };
                let request_id = Uuid::new_v4();
                debug!(%request_id, table = %input.table_name, op = %StoreOperation::CreateTable, "dispatching store call");
                // Creation is acknowledged without waiting for the table to
                // become active.
                ctx.run(self.conn.store.create_table(input)).await??;
                Ok(ExecResult {
                    affected_rows: 0,
                    returned_item: None,
                })
            }
        }
    }
}

fn log_notes(plan: &Plan) {
    for note in &plan.notes {
        warn!(%note, "plan note");
    }
}

struct ExecGuard {
    state: Arc<Mutex<StatementState>>,
}

impl Drop for ExecGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == StatementState::Executing {
            *state = StatementState::Prepared;
        }
    }
}
