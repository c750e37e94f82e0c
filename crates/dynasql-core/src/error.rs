//! Error taxonomy for statement compilation and execution.
//!
//! The first error aborts the statement; no partial plan is ever returned.
//! Store failures keep the native error (and its retryability classification)
//! as the source, plus the failing row index for multi-row writes.

use dynasql_model::StoreError;
use dynasql_model::types::ScalarAttributeType;

/// Top-level error for everything from lexing through store dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed token in the statement text.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Statement text violates the grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Table, index, or descriptor trouble.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The statement cannot be compiled into a valid request.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Supplied parameters do not line up with the statement's placeholders.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// A value cannot be marshalled into the required typed form.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The native store call failed. For multi-row inserts `row` is the
    /// zero-based index of the first failing row; earlier rows are not
    /// rolled back.
    #[error("store call failed: {source}")]
    Store {
        /// The native failure.
        source: StoreError,
        /// Index of the failing row for multi-row writes.
        row: Option<usize>,
    },

    /// The deadline passed or the caller cancelled the statement.
    #[error("statement cancelled")]
    Cancelled,
}

impl From<StoreError> for Error {
    fn from(source: StoreError) -> Self {
        Self::Store { source, row: None }
    }
}

/// An unrecognized character in the statement text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized character {found:?} at line {line}, column {col}")]
pub struct LexError {
    /// The offending character.
    pub found: char,
    /// 1-based line of the character.
    pub line: usize,
    /// 1-based column of the character.
    pub col: usize,
}

/// An unexpected token during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected {found} at line {line}, column {col}, expected {}", .expected.join(" or "))]
pub struct ParseError {
    /// Lexeme (or description) of the offending token.
    pub found: String,
    /// 1-based line of the token.
    pub line: usize,
    /// 1-based column of the token.
    pub col: usize,
    /// What the grammar would have accepted here.
    pub expected: Vec<String>,
}

/// Table metadata problems.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The statement references a table the store does not know.
    #[error("table not found: {table}")]
    TableNotFound {
        /// The missing table.
        table: String,
    },

    /// `USE INDEX` named an index the table does not have.
    #[error("index {index} not found on table {table}")]
    IndexNotFound {
        /// The table searched.
        table: String,
        /// The missing index.
        index: String,
    },

    /// The store returned a description the resolver cannot use.
    #[error("unusable table description for {table}: {reason}")]
    InvalidDescriptor {
        /// The table described.
        table: String,
        /// Why the description is unusable.
        reason: String,
    },
}

/// Statement rules the caller can repair.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// `DESC` needs a key-ordered access path; scans have none.
    #[error("DESC requires a query access path; the statement compiles to a scan")]
    DescendingScan,

    /// `LIMIT` must be a non-negative integer.
    #[error("LIMIT must be a non-negative integer, got {value}")]
    InvalidLimit {
        /// The offending limit text.
        value: String,
    },

    /// A table definition needs exactly one `HASH KEY` attribute.
    #[error("table definition must declare exactly one HASH KEY")]
    MissingHashKey,

    /// More than one partition key was declared.
    #[error("table definition declares more than one HASH KEY")]
    DuplicateHashKey,

    /// More than one sort key was declared.
    #[error("table definition declares more than one RANGE KEY")]
    DuplicateRangeKey,

    /// More than one throughput entry was declared.
    #[error("table definition declares PROVISIONED THROUGHPUT more than once")]
    DuplicateThroughput,

    /// An index key attribute has no declared type.
    #[error("attribute {attribute} used by index {index} has no declared type")]
    UndeclaredIndexKey {
        /// The untyped attribute.
        attribute: String,
        /// The index using it.
        index: String,
    },

    /// `query` was called on a statement that does not produce rows.
    #[error("statement does not produce rows; use execute")]
    NotAQuery,

    /// `execute` was called on a row-producing statement.
    #[error("statement produces rows; use query")]
    NotAnExec,

    /// The prepared statement was closed.
    #[error("prepared statement is closed")]
    StatementClosed,
}

/// Parameter binding problems.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Named and positional placeholders appeared in one statement.
    #[error("named and positional placeholders cannot mix in one statement")]
    MixedPlaceholders,

    /// A named placeholder has no supplied value.
    #[error("no value bound for placeholder :{name}")]
    UnboundName {
        /// The placeholder name, without the colon.
        name: String,
    },

    /// A positional placeholder has no supplied value.
    #[error("no value bound for positional placeholder {position}")]
    UnboundPosition {
        /// Zero-based position of the placeholder.
        position: usize,
    },

    /// More values were supplied than the statement has placeholders.
    #[error("{supplied} values supplied but the statement has {used} placeholders")]
    ExcessValues {
        /// Number of supplied values.
        supplied: usize,
        /// Number of placeholders actually consumed.
        used: usize,
    },

    /// Named values were supplied that no placeholder references.
    #[error("supplied values never referenced by the statement: {}", .names.join(", "))]
    UnusedNames {
        /// The unreferenced names.
        names: Vec<String>,
    },
}

/// Typed-encoding problems.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A key attribute value disagrees with the declared key type.
    #[error("key attribute {attribute} is declared {expected} but the value encodes as {actual}")]
    KeyTypeConflict {
        /// The key attribute.
        attribute: String,
        /// The declared scalar type.
        expected: ScalarAttributeType,
        /// The wire type the value actually encodes to.
        actual: &'static str,
    },

    /// An insert row is not a document.
    #[error("insert row must be a JSON object or a document-valued parameter")]
    RowNotDocument,
}

/// Convenience alias used throughout the compiler.
pub type Result<T, E = Error> = std::result::Result<T, E>;
