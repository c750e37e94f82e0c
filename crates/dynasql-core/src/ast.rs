//! Abstract syntax tree for the SQL dialect.
//!
//! Nodes are tagged variants produced by the parser and consumed by the
//! planner. Trees are immutable after construction. Every node implements
//! `Display`, printing back to parseable SQL: reparsing printed output yields
//! a structurally identical tree. Numeric literals keep their exact source
//! text so no value is ever routed through binary floating point.

use std::fmt;

use crate::lexer::is_keyword;

/// A single parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `SELECT ... FROM ...`
    Select(Select),
    /// `INSERT INTO ... VALUES ...`
    Insert(Insert),
    /// `REPLACE INTO ... VALUES ...` (same body as insert).
    Replace(Insert),
    /// `CREATE TABLE ... ( ... )`
    CreateTable(CreateTable),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(s) => s.fmt(f),
            Self::Insert(i) => write!(f, "INSERT {i}"),
            Self::Replace(i) => write!(f, "REPLACE {i}"),
            Self::CreateTable(c) => c.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Projected columns, or all attributes.
    pub projection: ProjectionExpression,
    /// Table name (dotted segments already joined).
    pub from: String,
    /// Forced index from `USE INDEX (name)`.
    pub index: Option<String>,
    /// The `WHERE` clause: a top-level conjunction.
    pub where_clause: Option<AndExpression>,
    /// Traversal direction; `None` when unspecified (ascending).
    pub descending: Option<bool>,
    /// The `LIMIT` argument, kept as source text until planning.
    pub limit: Option<String>,
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM ", self.projection)?;
        fmt_table_name(f, &self.from)?;
        if let Some(index) = &self.index {
            write!(f, " USE INDEX (")?;
            fmt_ident(f, index)?;
            write!(f, ")")?;
        }
        if let Some(cond) = &self.where_clause {
            write!(f, " WHERE {cond}")?;
        }
        match self.descending {
            Some(true) => write!(f, " DESC")?,
            Some(false) => write!(f, " ASC")?,
            None => {}
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

/// Projection of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionExpression {
    /// `*` (or its `document(*)` synonym): every attribute.
    All,
    /// Explicit column list.
    Columns(Vec<ProjectionColumn>),
}

impl fmt::Display for ProjectionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Columns(cols) => fmt_joined(f, cols, ", "),
        }
    }
}

/// A single projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionColumn {
    /// A document path.
    Path(DocumentPath),
    /// A function call such as `size(tags)`.
    Function(FunctionExpression),
}

impl fmt::Display for ProjectionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => p.fmt(f),
            Self::Function(func) => func.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// A disjunction of conjunctions; only appears inside parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionExpression {
    /// The `OR` alternatives.
    pub or: Vec<AndExpression>,
}

impl fmt::Display for ConditionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_joined(f, &self.or, " OR ")
    }
}

/// A conjunction of conditions. The top level of every `WHERE` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndExpression {
    /// The `AND` conjuncts.
    pub and: Vec<Condition>,
}

impl fmt::Display for AndExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_joined(f, &self.and, " AND ")
    }
}

/// A single predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A parenthesized subexpression (the only place `OR` can appear).
    Parenthesized(ConditionExpression),
    /// Negation of a condition.
    Not(Box<Condition>),
    /// A document path compared, ranged, or listed against operands.
    Operand {
        /// The left-hand path.
        path: DocumentPath,
        /// The comparison/range/membership tail.
        rhs: ConditionRhs,
    },
    /// A predicate function such as `attribute_exists(path)`.
    Function(FunctionExpression),
    /// A function used as a comparison left-hand side, e.g. `size(tags) > 2`.
    FunctionOperand {
        /// The function producing the compared value.
        function: FunctionExpression,
        /// The comparison/range/membership tail.
        rhs: ConditionRhs,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parenthesized(inner) => write!(f, "({inner})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::Operand { path, rhs } => write!(f, "{path} {rhs}"),
            Self::Function(func) => func.fmt(f),
            Self::FunctionOperand { function, rhs } => write!(f, "{function} {rhs}"),
        }
    }
}

/// The right-hand side of a path predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionRhs {
    /// `path <op> operand`.
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        operand: Operand,
    },
    /// `path BETWEEN low AND high` (inclusive).
    Between {
        /// Lower bound.
        low: Operand,
        /// Upper bound.
        high: Operand,
    },
    /// `path IN (v0, v1, ...)`.
    In(Vec<Value>),
}

impl fmt::Display for ConditionRhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { op, operand } => write!(f, "{op} {operand}"),
            Self::Between { low, high } => write!(f, "BETWEEN {low} AND {high}"),
            Self::In(values) => {
                write!(f, "IN (")?;
                fmt_joined(f, values, ", ")?;
                write!(f, ")")
            }
        }
    }
}

/// Comparison operators. `!=` parses to `Ne` and prints as `<>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` / `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// An operand: a literal/placeholder value or a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A value.
    Value(Value),
    /// A reference to another attribute.
    Path(DocumentPath),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Path(p) => p.fmt(f),
        }
    }
}

/// A function call appearing as a condition, operand, or projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionExpression {
    /// Function name as written (e.g. `begins_with`, `size`).
    pub name: String,
    /// Arguments in order.
    pub args: Vec<FunctionArg>,
}

impl FunctionExpression {
    /// The first argument's path, when the first argument is a path.
    #[must_use]
    pub fn first_arg_path(&self) -> Option<&DocumentPath> {
        match self.args.first() {
            Some(FunctionArg::Path(p)) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        fmt_joined(f, &self.args, ", ")?;
        write!(f, ")")
    }
}

/// A function argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionArg {
    /// A document path.
    Path(DocumentPath),
    /// A value.
    Value(Value),
}

impl fmt::Display for FunctionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => p.fmt(f),
            Self::Value(v) => v.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Document paths and values
// ---------------------------------------------------------------------------

/// A dotted, optionally indexed reference into an item document,
/// e.g. `info.scores[0].value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    /// Path fragments in order; never empty.
    pub fragments: Vec<PathFragment>,
}

impl DocumentPath {
    /// The bare attribute name when the path is a single unindexed fragment.
    #[must_use]
    pub fn as_top_level_name(&self) -> Option<&str> {
        match self.fragments.as_slice() {
            [frag] if frag.indexes.is_empty() => Some(&frag.symbol),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_joined(f, &self.fragments, ".")
    }
}

/// One fragment of a document path: a symbol plus trailing list indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFragment {
    /// The attribute name at this level.
    pub symbol: String,
    /// Trailing `[n]` list indexes, in order.
    pub indexes: Vec<u32>,
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_ident(f, &self.symbol)?;
        for idx in &self.indexes {
            write!(f, "[{idx}]")?;
        }
        Ok(())
    }
}

/// A literal or placeholder value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A numeric literal, kept as its exact source text.
    Number(String),
    /// A string literal.
    Str(String),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// `NULL`.
    Null,
    /// A named placeholder `:name`.
    Named(String),
    /// A positional placeholder `?`.
    Positional,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(text) => f.write_str(text),
            Self::Str(s) => fmt_string(f, s, '\''),
            Self::Bool(true) => write!(f, "TRUE"),
            Self::Bool(false) => write!(f, "FALSE"),
            Self::Null => write!(f, "NULL"),
            Self::Named(name) => write!(f, ":{name}"),
            Self::Positional => write!(f, "?"),
        }
    }
}

// ---------------------------------------------------------------------------
// INSERT / REPLACE
// ---------------------------------------------------------------------------

/// Body shared by `INSERT` and `REPLACE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    /// Target table (dotted segments already joined).
    pub into: String,
    /// One parenthesized row per item, in listed order.
    pub rows: Vec<InsertRow>,
    /// `RETURNING` mode; `None` when the clause is absent.
    pub returning: Option<Returning>,
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTO ")?;
        fmt_table_name(f, &self.into)?;
        write!(f, " VALUES ")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({row})")?;
        }
        if let Some(returning) = &self.returning {
            write!(f, " RETURNING {returning}")?;
        }
        Ok(())
    }
}

/// A single inserted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertRow {
    /// A scalar or placeholder; placeholders must bind whole documents.
    Value(Value),
    /// An inline JSON document.
    Object(JsonObject),
}

impl fmt::Display for InsertRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Object(obj) => obj.fmt(f),
        }
    }
}

/// What a write statement reports back about replaced items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returning {
    /// Report nothing.
    None,
    /// Report the full prior item.
    AllOld,
}

impl fmt::Display for Returning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::AllOld => write!(f, "ALL_OLD"),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON literals
// ---------------------------------------------------------------------------

/// An inline JSON object literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonObject {
    /// Entries in written order; duplicate keys keep the last occurrence
    /// at encode time.
    pub entries: Vec<JsonEntry>,
}

impl fmt::Display for JsonObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            fmt_string(f, &entry.key, '"')?;
            write!(f, ": {}", entry.value)?;
        }
        write!(f, "}}")
    }
}

/// A key/value pair inside a JSON object literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonEntry {
    /// The key (bare identifier or quoted string in source).
    pub key: String,
    /// The value.
    pub value: JsonValue,
}

/// A JSON value inside an insert row. Placeholders are not permitted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonValue {
    /// A numeric literal, kept as its exact source text.
    Number(String),
    /// A string literal.
    Str(String),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// `NULL`.
    Null,
    /// A nested object.
    Object(JsonObject),
    /// A nested array.
    Array(Vec<JsonValue>),
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(text) => f.write_str(text),
            Self::Str(s) => fmt_string(f, s, '"'),
            Self::Bool(true) => write!(f, "TRUE"),
            Self::Bool(false) => write!(f, "FALSE"),
            Self::Null => write!(f, "NULL"),
            Self::Object(obj) => obj.fmt(f),
            Self::Array(items) => {
                write!(f, "[")?;
                fmt_joined(f, items, ", ")?;
                write!(f, "]")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CREATE TABLE
// ---------------------------------------------------------------------------

/// A `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    /// Name of the table to create.
    pub table: String,
    /// Declaration entries in written order.
    pub entries: Vec<CreateTableEntry>,
}

impl fmt::Display for CreateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TABLE ")?;
        fmt_ident(f, &self.table)?;
        write!(f, " (")?;
        fmt_joined(f, &self.entries, ", ")?;
        write!(f, ")")
    }
}

/// One entry of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTableEntry {
    /// An attribute declaration, optionally a key.
    Attr(AttrDecl),
    /// A global secondary index.
    Gsi(GsiDecl),
    /// A local secondary index.
    Lsi(LsiDecl),
    /// Provisioned capacity for the table.
    Throughput(ThroughputDecl),
}

impl fmt::Display for CreateTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attr(a) => a.fmt(f),
            Self::Gsi(g) => g.fmt(f),
            Self::Lsi(l) => l.fmt(f),
            Self::Throughput(t) => t.fmt(f),
        }
    }
}

/// `name TYPE [HASH KEY | RANGE KEY]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrDecl {
    /// Attribute name.
    pub name: String,
    /// Declared scalar type.
    pub attr_type: AttrType,
    /// Key role, when the attribute is part of the primary key.
    pub key: Option<KeyRole>,
}

impl fmt::Display for AttrDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_ident(f, &self.name)?;
        write!(f, " {}", self.attr_type)?;
        if let Some(role) = &self.key {
            write!(f, " {role} KEY")?;
        }
        Ok(())
    }
}

/// Declared scalar type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// `STRING`
    String,
    /// `NUMBER`
    Number,
    /// `BINARY`
    Binary,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Binary => "BINARY",
        };
        f.write_str(s)
    }
}

/// Key role of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Partition key.
    Hash,
    /// Sort key.
    Range,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => write!(f, "HASH"),
            Self::Range => write!(f, "RANGE"),
        }
    }
}

/// A global secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiDecl {
    /// Index name.
    pub name: String,
    /// Partition key attribute of the index.
    pub partition: String,
    /// Sort key attribute of the index, if any.
    pub sort: Option<String>,
    /// Projection policy.
    pub projection: ProjectionSpec,
    /// Optional capacity for the index.
    pub throughput: Option<ThroughputDecl>,
}

impl fmt::Display for GsiDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GLOBAL SECONDARY INDEX ")?;
        fmt_ident(f, &self.name)?;
        write!(f, " HASH(")?;
        fmt_ident(f, &self.partition)?;
        write!(f, ")")?;
        if let Some(sort) = &self.sort {
            write!(f, " RANGE(")?;
            fmt_ident(f, sort)?;
            write!(f, ")")?;
        }
        write!(f, " PROJECTION {}", self.projection)?;
        if let Some(throughput) = &self.throughput {
            write!(f, " {throughput}")?;
        }
        Ok(())
    }
}

/// A local secondary index declaration. Shares the table's partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsiDecl {
    /// Index name.
    pub name: String,
    /// Sort key attribute of the index.
    pub sort: String,
    /// Projection policy.
    pub projection: ProjectionSpec,
}

impl fmt::Display for LsiDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LOCAL SECONDARY INDEX ")?;
        fmt_ident(f, &self.name)?;
        write!(f, " RANGE(")?;
        fmt_ident(f, &self.sort)?;
        write!(f, ") PROJECTION {}", self.projection)
    }
}

/// Projection policy of a secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionSpec {
    /// Only keys are copied into the index.
    KeysOnly,
    /// All attributes are copied.
    All,
    /// Keys plus the listed attributes.
    Include(Vec<String>),
}

impl fmt::Display for ProjectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeysOnly => write!(f, "KEYS ONLY"),
            Self::All => write!(f, "ALL"),
            Self::Include(attrs) => {
                write!(f, "INCLUDE ")?;
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_ident(f, attr)?;
                }
                Ok(())
            }
        }
    }
}

/// `PROVISIONED THROUGHPUT READ n WRITE n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputDecl {
    /// Read capacity units.
    pub read_units: i64,
    /// Write capacity units.
    pub write_units: i64,
}

impl fmt::Display for ThroughputDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PROVISIONED THROUGHPUT READ {} WRITE {}",
            self.read_units, self.write_units
        )
    }
}

// ---------------------------------------------------------------------------
// Printing helpers
// ---------------------------------------------------------------------------

/// Print an identifier, backtick-quoting it when it collides with a reserved
/// word or is not identifier-shaped.
fn fmt_ident(f: &mut fmt::Formatter<'_>, symbol: &str) -> fmt::Result {
    if needs_quoting(symbol) {
        write!(f, "`{symbol}`")
    } else {
        f.write_str(symbol)
    }
}

/// Print a table name: dotted segments print bare when every segment is a
/// plain identifier, otherwise the whole name is backtick-quoted.
fn fmt_table_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = !name.is_empty()
        && name
            .split('.')
            .all(|segment| !segment.is_empty() && !needs_quoting(segment));
    if plain {
        f.write_str(name)
    } else {
        write!(f, "`{name}`")
    }
}

fn needs_quoting(symbol: &str) -> bool {
    if is_keyword(symbol) {
        return true;
    }
    let mut chars = symbol.chars();
    let Some(first) = chars.next() else {
        return true;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return true;
    }
    !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Print a string literal with the given quote character, escaping the quote
/// itself, backslashes, and control characters the lexer unescapes.
fn fmt_string(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    write!(f, "{quote}")?;
    for c in s.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c if c == quote => write!(f, "\\{quote}")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "{quote}")
}

fn fmt_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    separator: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        item.fmt(f)?;
    }
    Ok(())
}
