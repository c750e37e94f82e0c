//! Recursive-descent parser for the SQL dialect.
//!
//! Works over the token buffer from [`crate::lexer`] with two tokens of
//! lookahead. Lookahead is what disambiguates a bare function call from a
//! path predicate (both begin with an identifier) and keeps `INCLUDE` lists
//! from swallowing the comma before the next table-definition entry.

use crate::ast::{
    AndExpression, AttrDecl, AttrType, CompareOp, Condition, ConditionExpression, ConditionRhs,
    CreateTable, CreateTableEntry, DocumentPath, FunctionArg, FunctionExpression, GsiDecl, Insert,
    InsertRow, JsonEntry, JsonObject, JsonValue, KeyRole, LsiDecl, Operand, PathFragment,
    ProjectionColumn, ProjectionExpression, ProjectionSpec, Returning, Select, Statement,
    ThroughputDecl, Value,
};
use crate::error::{Error, ParseError};
use crate::lexer::{Token, TokenKind, tokenize};

/// Parse one statement, including the optional trailing `;`.
///
/// # Errors
///
/// Returns [`Error::Lex`] on malformed tokens and [`Error::Parse`] on
/// grammar violations.
pub fn parse(sql: &str) -> Result<Statement, Error> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser::new(tokens);
    let statement = parser.parse_statement()?;
    parser.eat_symbol(";");
    parser.expect_eof()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `offset` positions ahead; saturates at the trailing `Eof`.
    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: &[&str]) -> ParseError {
        let tok = self.peek();
        ParseError {
            found: tok.to_string(),
            line: tok.line,
            col: tok.col,
            expected: expected.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek().is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(&[word]))
        }
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.peek().is_symbol(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<(), ParseError> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(self.error(&[sym]))
        }
    }

    /// Word literals (`KEY`, `KEYS`, `ONLY`, `ALL`, `INCLUDE`, `document`)
    /// are ordinary identifiers matched case-insensitively.
    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(self.error(&[word]))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        if self.peek().is_ident() {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error(&["identifier"]))
        }
    }

    fn expect_bare_ident(&mut self) -> Result<String, ParseError> {
        if self.peek().kind == TokenKind::Ident {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error(&["identifier"]))
        }
    }

    fn expect_number(&mut self) -> Result<String, ParseError> {
        if self.peek().kind == TokenKind::Number {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error(&["number"]))
        }
    }

    fn expect_integer<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, ParseError> {
        let err = self.error(&[what]);
        let text = self.expect_number()?;
        text.parse().map_err(|_| err)
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error(&[";", "end of statement"]))
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.eat_keyword("SELECT") {
            return Ok(Statement::Select(self.parse_select()?));
        }
        if self.eat_keyword("INSERT") {
            return Ok(Statement::Insert(self.parse_insert_body()?));
        }
        if self.eat_keyword("REPLACE") {
            return Ok(Statement::Replace(self.parse_insert_body()?));
        }
        if self.eat_keyword("CREATE") {
            self.expect_keyword("TABLE")?;
            return Ok(Statement::CreateTable(self.parse_create_table()?));
        }
        Err(self.error(&["SELECT", "INSERT", "REPLACE", "CREATE"]))
    }

    fn parse_select(&mut self) -> Result<Select, ParseError> {
        let projection = self.parse_projection()?;
        self.expect_keyword("FROM")?;
        let from = self.parse_table_name()?;

        let index = if self.eat_keyword("USE") {
            self.expect_keyword("INDEX")?;
            self.expect_symbol("(")?;
            let name = self.expect_ident()?;
            self.expect_symbol(")")?;
            Some(name)
        } else {
            None
        };

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.parse_and_expression()?)
        } else {
            None
        };

        let descending = if self.eat_keyword("ASC") {
            Some(false)
        } else if self.eat_keyword("DESC") {
            Some(true)
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            Some(self.expect_number()?)
        } else {
            None
        };

        Ok(Select {
            projection,
            from,
            index,
            where_clause,
            descending,
            limit,
        })
    }

    fn parse_projection(&mut self) -> Result<ProjectionExpression, ParseError> {
        if self.eat_symbol("*") {
            return Ok(ProjectionExpression::All);
        }
        // `document(*)` is a synonym for `*`; `document(x)` is a plain
        // function column, hence the third lookahead token.
        if self.peek().is_word("document")
            && self.peek_at(1).is_symbol("(")
            && self.peek_at(2).is_symbol("*")
        {
            self.advance();
            self.advance();
            self.advance();
            self.expect_symbol(")")?;
            return Ok(ProjectionExpression::All);
        }

        let mut columns = vec![self.parse_projection_column()?];
        while self.eat_symbol(",") {
            columns.push(self.parse_projection_column()?);
        }
        Ok(ProjectionExpression::Columns(columns))
    }

    fn parse_projection_column(&mut self) -> Result<ProjectionColumn, ParseError> {
        if !self.peek().is_ident() {
            return Err(self.error(&["column"]));
        }
        if self.peek().kind == TokenKind::Ident && self.peek_at(1).is_symbol("(") {
            Ok(ProjectionColumn::Function(self.parse_function()?))
        } else {
            Ok(ProjectionColumn::Path(self.parse_document_path()?))
        }
    }

    /// Table names are one quoted identifier or dot-joined bare identifiers.
    fn parse_table_name(&mut self) -> Result<String, ParseError> {
        if self.peek().kind == TokenKind::QuotedIdent {
            return Ok(self.advance().lexeme);
        }
        let mut name = self.expect_bare_ident()?;
        while self.peek().is_symbol(".") && self.peek_at(1).kind == TokenKind::Ident {
            self.advance();
            name.push('.');
            name.push_str(&self.advance().lexeme);
        }
        Ok(name)
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_and_expression(&mut self) -> Result<AndExpression, ParseError> {
        let mut and = vec![self.parse_condition()?];
        while self.eat_keyword("AND") {
            and.push(self.parse_condition()?);
        }
        Ok(AndExpression { and })
    }

    fn parse_or_expression(&mut self) -> Result<ConditionExpression, ParseError> {
        let mut or = vec![self.parse_and_expression()?];
        while self.eat_keyword("OR") {
            or.push(self.parse_and_expression()?);
        }
        Ok(ConditionExpression { or })
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        if self.eat_symbol("(") {
            let inner = self.parse_or_expression()?;
            self.expect_symbol(")")?;
            return Ok(Condition::Parenthesized(inner));
        }
        if self.eat_keyword("NOT") {
            return Ok(Condition::Not(Box::new(self.parse_condition()?)));
        }
        if !self.peek().is_ident() {
            return Err(self.error(&["(", "NOT", "identifier"]));
        }
        // `foo(` routes to a function, `foo =` to a path predicate.
        if self.peek().kind == TokenKind::Ident && self.peek_at(1).is_symbol("(") {
            let function = self.parse_function()?;
            // A value-producing call like `size(tags)` may itself be the
            // left-hand side of a comparison.
            if self.starts_condition_rhs() {
                let rhs = self.parse_condition_rhs()?;
                return Ok(Condition::FunctionOperand { function, rhs });
            }
            return Ok(Condition::Function(function));
        }
        let path = self.parse_document_path()?;
        let rhs = self.parse_condition_rhs()?;
        Ok(Condition::Operand { path, rhs })
    }

    fn starts_condition_rhs(&self) -> bool {
        self.peek_compare_op().is_some()
            || self.peek().is_keyword("BETWEEN")
            || self.peek().is_keyword("IN")
    }

    fn parse_condition_rhs(&mut self) -> Result<ConditionRhs, ParseError> {
        if let Some(op) = self.peek_compare_op() {
            self.advance();
            let operand = self.parse_operand()?;
            return Ok(ConditionRhs::Compare { op, operand });
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.parse_operand()?;
            self.expect_keyword("AND")?;
            let high = self.parse_operand()?;
            return Ok(ConditionRhs::Between { low, high });
        }
        if self.eat_keyword("IN") {
            self.expect_symbol("(")?;
            let mut values = vec![self.parse_value()?];
            while self.eat_symbol(",") {
                values.push(self.parse_value()?);
            }
            self.expect_symbol(")")?;
            return Ok(ConditionRhs::In(values));
        }
        Err(self.error(&["comparison operator", "BETWEEN", "IN"]))
    }

    fn peek_compare_op(&self) -> Option<CompareOp> {
        let tok = self.peek();
        if tok.kind != TokenKind::Operator {
            return None;
        }
        match tok.lexeme.as_str() {
            "=" => Some(CompareOp::Eq),
            "<>" | "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        if self.peek().is_ident() {
            Ok(Operand::Path(self.parse_document_path()?))
        } else {
            Ok(Operand::Value(self.parse_value()?))
        }
    }

    fn parse_function(&mut self) -> Result<FunctionExpression, ParseError> {
        let name = self.expect_bare_ident()?;
        self.expect_symbol("(")?;
        let mut args = vec![self.parse_function_arg()?];
        while self.eat_symbol(",") {
            args.push(self.parse_function_arg()?);
        }
        self.expect_symbol(")")?;
        Ok(FunctionExpression { name, args })
    }

    fn parse_function_arg(&mut self) -> Result<FunctionArg, ParseError> {
        if self.peek().is_ident() {
            Ok(FunctionArg::Path(self.parse_document_path()?))
        } else {
            Ok(FunctionArg::Value(self.parse_value()?))
        }
    }

    fn parse_document_path(&mut self) -> Result<DocumentPath, ParseError> {
        let mut fragments = vec![self.parse_path_fragment()?];
        while self.peek().is_symbol(".") && self.peek_at(1).is_ident() {
            self.advance();
            fragments.push(self.parse_path_fragment()?);
        }
        Ok(DocumentPath { fragments })
    }

    fn parse_path_fragment(&mut self) -> Result<PathFragment, ParseError> {
        let symbol = self.expect_ident()?;
        let mut indexes = Vec::new();
        while self.eat_symbol("[") {
            indexes.push(self.expect_integer::<u32>("list index")?);
            self.expect_symbol("]")?;
        }
        Ok(PathFragment { symbol, indexes })
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number => {
                let lexeme = self.advance().lexeme;
                Ok(Value::Number(lexeme))
            }
            TokenKind::String => {
                let lexeme = self.advance().lexeme;
                Ok(Value::Str(lexeme))
            }
            TokenKind::Keyword if tok.is_keyword("TRUE") => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::Keyword if tok.is_keyword("FALSE") => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::Keyword if tok.is_keyword("NULL") => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::Punct if tok.is_symbol(":") => {
                self.advance();
                let name = self.expect_bare_ident()?;
                Ok(Value::Named(name))
            }
            TokenKind::Punct if tok.is_symbol("?") => {
                self.advance();
                Ok(Value::Positional)
            }
            _ => Err(self.error(&["value"])),
        }
    }
}

// ---------------------------------------------------------------------------
// INSERT / REPLACE
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_insert_body(&mut self) -> Result<Insert, ParseError> {
        self.expect_keyword("INTO")?;
        let into = self.parse_table_name()?;
        self.expect_keyword("VALUES")?;

        let mut rows = vec![self.parse_insert_row()?];
        while self.eat_symbol(",") {
            rows.push(self.parse_insert_row()?);
        }

        let returning = if self.eat_keyword("RETURNING") {
            if self.eat_keyword("NONE") {
                Some(Returning::None)
            } else if self.eat_keyword("ALL_OLD") {
                Some(Returning::AllOld)
            } else {
                return Err(self.error(&["NONE", "ALL_OLD"]));
            }
        } else {
            None
        };

        Ok(Insert {
            into,
            rows,
            returning,
        })
    }

    fn parse_insert_row(&mut self) -> Result<InsertRow, ParseError> {
        self.expect_symbol("(")?;
        let row = if self.peek().is_symbol("{") {
            InsertRow::Object(self.parse_json_object()?)
        } else {
            InsertRow::Value(self.parse_value()?)
        };
        self.expect_symbol(")")?;
        Ok(row)
    }

    fn parse_json_object(&mut self) -> Result<JsonObject, ParseError> {
        self.expect_symbol("{")?;
        let mut entries = Vec::new();
        while !self.peek().is_symbol("}") {
            let key = match self.peek().kind {
                TokenKind::Ident | TokenKind::String => self.advance().lexeme,
                _ => return Err(self.error(&["object key"])),
            };
            self.expect_symbol(":")?;
            let value = self.parse_json_value()?;
            entries.push(JsonEntry { key, value });
            // Trailing commas are tolerated.
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol("}")?;
        Ok(JsonObject { entries })
    }

    fn parse_json_value(&mut self) -> Result<JsonValue, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number => {
                let lexeme = self.advance().lexeme;
                Ok(JsonValue::Number(lexeme))
            }
            TokenKind::String => {
                let lexeme = self.advance().lexeme;
                Ok(JsonValue::Str(lexeme))
            }
            TokenKind::Keyword if tok.is_keyword("TRUE") => {
                self.advance();
                Ok(JsonValue::Bool(true))
            }
            TokenKind::Keyword if tok.is_keyword("FALSE") => {
                self.advance();
                Ok(JsonValue::Bool(false))
            }
            TokenKind::Keyword if tok.is_keyword("NULL") => {
                self.advance();
                Ok(JsonValue::Null)
            }
            TokenKind::Punct if tok.is_symbol("{") => {
                Ok(JsonValue::Object(self.parse_json_object()?))
            }
            TokenKind::Punct if tok.is_symbol("[") => self.parse_json_array(),
            _ => Err(self.error(&["JSON value"])),
        }
    }

    fn parse_json_array(&mut self) -> Result<JsonValue, ParseError> {
        self.expect_symbol("[")?;
        let mut items = Vec::new();
        while !self.peek().is_symbol("]") {
            items.push(self.parse_json_value()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol("]")?;
        Ok(JsonValue::Array(items))
    }
}

// ---------------------------------------------------------------------------
// CREATE TABLE
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_create_table(&mut self) -> Result<CreateTable, ParseError> {
        let table = self.expect_ident()?;
        self.expect_symbol("(")?;
        let mut entries = vec![self.parse_create_entry()?];
        while self.eat_symbol(",") {
            entries.push(self.parse_create_entry()?);
        }
        self.expect_symbol(")")?;
        Ok(CreateTable { table, entries })
    }

    fn parse_create_entry(&mut self) -> Result<CreateTableEntry, ParseError> {
        if self.eat_keyword("GLOBAL") {
            return Ok(CreateTableEntry::Gsi(self.parse_gsi()?));
        }
        if self.eat_keyword("LOCAL") {
            return Ok(CreateTableEntry::Lsi(self.parse_lsi()?));
        }
        if self.peek().is_keyword("PROVISIONED") {
            return Ok(CreateTableEntry::Throughput(self.parse_throughput()?));
        }
        Ok(CreateTableEntry::Attr(self.parse_attr_decl()?))
    }

    fn parse_gsi(&mut self) -> Result<GsiDecl, ParseError> {
        self.expect_keyword("SECONDARY")?;
        self.expect_keyword("INDEX")?;
        let name = self.expect_ident()?;

        self.expect_keyword("HASH")?;
        self.expect_symbol("(")?;
        let partition = self.expect_ident()?;
        self.expect_symbol(")")?;

        let sort = if self.eat_keyword("RANGE") {
            self.expect_symbol("(")?;
            let sort = self.expect_ident()?;
            self.expect_symbol(")")?;
            Some(sort)
        } else {
            None
        };

        self.expect_keyword("PROJECTION")?;
        let projection = self.parse_projection_spec()?;

        // An immediately following throughput (no comma) belongs to the
        // index; with a comma it is a separate table-level entry.
        let throughput = if self.peek().is_keyword("PROVISIONED") {
            Some(self.parse_throughput()?)
        } else {
            None
        };

        Ok(GsiDecl {
            name,
            partition,
            sort,
            projection,
            throughput,
        })
    }

    fn parse_lsi(&mut self) -> Result<LsiDecl, ParseError> {
        self.expect_keyword("SECONDARY")?;
        self.expect_keyword("INDEX")?;
        let name = self.expect_ident()?;

        self.expect_keyword("RANGE")?;
        self.expect_symbol("(")?;
        let sort = self.expect_ident()?;
        self.expect_symbol(")")?;

        self.expect_keyword("PROJECTION")?;
        let projection = self.parse_projection_spec()?;

        Ok(LsiDecl {
            name,
            sort,
            projection,
        })
    }

    fn parse_projection_spec(&mut self) -> Result<ProjectionSpec, ParseError> {
        if self.eat_word("KEYS") {
            self.expect_word("ONLY")?;
            return Ok(ProjectionSpec::KeysOnly);
        }
        if self.eat_word("ALL") {
            return Ok(ProjectionSpec::All);
        }
        if self.eat_word("INCLUDE") {
            let mut attrs = vec![self.expect_ident()?];
            // Stop before a comma that introduces the next table entry.
            while self.peek().is_symbol(",") && self.peek_at(1).is_ident() {
                self.advance();
                attrs.push(self.expect_ident()?);
            }
            return Ok(ProjectionSpec::Include(attrs));
        }
        Err(self.error(&["KEYS ONLY", "ALL", "INCLUDE"]))
    }

    fn parse_throughput(&mut self) -> Result<ThroughputDecl, ParseError> {
        self.expect_keyword("PROVISIONED")?;
        self.expect_keyword("THROUGHPUT")?;
        self.expect_keyword("READ")?;
        let read_units = self.expect_integer::<i64>("integer")?;
        self.expect_keyword("WRITE")?;
        let write_units = self.expect_integer::<i64>("integer")?;
        Ok(ThroughputDecl {
            read_units,
            write_units,
        })
    }

    fn parse_attr_decl(&mut self) -> Result<AttrDecl, ParseError> {
        let name = self.expect_ident()?;
        let attr_type = if self.eat_keyword("STRING") {
            AttrType::String
        } else if self.eat_keyword("NUMBER") {
            AttrType::Number
        } else if self.eat_keyword("BINARY") {
            AttrType::Binary
        } else {
            return Err(self.error(&["STRING", "NUMBER", "BINARY"]));
        };

        let key = if self.eat_keyword("HASH") {
            self.expect_word("KEY")?;
            Some(KeyRole::Hash)
        } else if self.eat_keyword("RANGE") {
            self.expect_word("KEY")?;
            Some(KeyRole::Range)
        } else {
            None
        };

        Ok(AttrDecl {
            name,
            attr_type,
            key,
        })
    }
}
