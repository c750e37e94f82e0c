//! In-memory store client used by the end-to-end tests.
//!
//! Implements enough of the native contract to execute compiled requests for
//! real: item storage keyed by the table's primary key, evaluation of the
//! full expression language the compiler renders (resolved through the
//! substitution tables), sort-key ordering in both directions, and page
//! continuation tokens. Expressions outside the rendered language panic
//! instead of silently passing.

use std::collections::HashMap;
use std::sync::Mutex;

use dashmap::DashMap;

use dynasql_driver::store::{StoreClient, StoreFuture};
use dynasql_model::AttributeValue;
use dynasql_model::error::StoreError;
use dynasql_model::input::{
    CreateTableInput, DescribeTableInput, GetItemInput, PutItemInput, QueryInput, ScanInput,
};
use dynasql_model::output::{
    CreateTableOutput, DescribeTableOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
};
use dynasql_model::types::{
    GlobalSecondaryIndexDescription, KeyType, LocalSecondaryIndexDescription, ReturnValue,
    TableDescription, TableStatus,
};

type Item = HashMap<String, AttributeValue>;

/// A self-contained in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Table>,
}

#[derive(Debug)]
struct Table {
    description: TableDescription,
    partition: String,
    sort: Option<String>,
    /// `(index name, partition attr, sort attr)` for every secondary index.
    indexes: Vec<(String, String, Option<String>)>,
    items: Mutex<Vec<Item>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match self.tables.get(name) {
            Some(table) => f(table.value()),
            None => Err(StoreError::resource_not_found(format!(
                "Table: {name} not found"
            ))),
        }
    }
}

impl StoreClient for MemoryStore {
    fn get_item(&self, input: GetItemInput) -> StoreFuture<GetItemOutput> {
        let result = self.with_table(&input.table_name, |table| {
            let items = table.items.lock().unwrap();
            let found = items
                .iter()
                .find(|item| key_matches(item, &input.key))
                .cloned()
                .map(|item| project(item, input.projection_expression.as_deref(), &input.expression_attribute_names));
            Ok(GetItemOutput { item: found })
        });
        Box::pin(async move { result })
    }

    fn query(&self, input: QueryInput) -> StoreFuture<QueryOutput> {
        let result = self.with_table(&input.table_name, |table| {
            let sort = table.sort_attr_for(input.index_name.as_deref())?;

            let key_filter = parse_filter(
                input.key_condition_expression.as_deref().unwrap_or(""),
                &input.expression_attribute_names,
                &input.expression_attribute_values,
            );
            let post_filter = parse_filter(
                input.filter_expression.as_deref().unwrap_or(""),
                &input.expression_attribute_names,
                &input.expression_attribute_values,
            );

            let mut matching: Vec<Item> = table
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|item| key_filter.as_ref().map_or(true, |f| f.eval(item)))
                .cloned()
                .collect();
            if let Some(sort_attr) = &sort {
                matching.sort_by(|a, b| compare_attr(a.get(sort_attr), b.get(sort_attr)));
            }
            if input.scan_index_forward == Some(false) {
                matching.reverse();
            }

            let (page, scanned, last_key) = paginate(
                matching,
                &input.exclusive_start_key,
                input.limit,
                &table.primary_key_attrs(),
            );
            let filtered: Vec<Item> = page
                .into_iter()
                .filter(|item| post_filter.as_ref().map_or(true, |f| f.eval(item)))
                .collect();
            Ok(QueryOutput {
                count: i32::try_from(filtered.len()).unwrap_or(i32::MAX),
                scanned_count: scanned,
                items: filtered,
                last_evaluated_key: last_key,
            })
        });
        Box::pin(async move { result })
    }

    fn scan(&self, input: ScanInput) -> StoreFuture<ScanOutput> {
        let result = self.with_table(&input.table_name, |table| {
            let post_filter = parse_filter(
                input.filter_expression.as_deref().unwrap_or(""),
                &input.expression_attribute_names,
                &input.expression_attribute_values,
            );
            let everything: Vec<Item> = table.items.lock().unwrap().clone();
            let (page, scanned, last_key) = paginate(
                everything,
                &input.exclusive_start_key,
                input.limit,
                &table.primary_key_attrs(),
            );
            let filtered: Vec<Item> = page
                .into_iter()
                .filter(|item| post_filter.as_ref().map_or(true, |f| f.eval(item)))
                .collect();
            Ok(ScanOutput {
                count: i32::try_from(filtered.len()).unwrap_or(i32::MAX),
                scanned_count: scanned,
                items: filtered,
                last_evaluated_key: last_key,
            })
        });
        Box::pin(async move { result })
    }

    fn put_item(&self, input: PutItemInput) -> StoreFuture<PutItemOutput> {
        let result = self.with_table(&input.table_name, |table| {
            let key = table.primary_key_of(&input.item)?;
            let mut items = table.items.lock().unwrap();
            let prior = items
                .iter()
                .position(|existing| key_matches(existing, &key))
                .map(|at| items.remove(at));
            items.push(input.item.clone());
            let attributes = match input.return_values {
                Some(ReturnValue::AllOld) => prior.unwrap_or_default(),
                _ => HashMap::new(),
            };
            Ok(PutItemOutput { attributes })
        });
        Box::pin(async move { result })
    }

    fn create_table(&self, input: CreateTableInput) -> StoreFuture<CreateTableOutput> {
        let name = input.table_name.clone();
        if self.tables.contains_key(&name) {
            let err = StoreError::resource_in_use(format!("Table already exists: {name}"));
            return Box::pin(async move { Err(err) });
        }

        let key_of = |schema: &[dynasql_model::types::KeySchemaElement], kind: KeyType| {
            schema
                .iter()
                .find(|e| e.key_type == kind)
                .map(|e| e.attribute_name.clone())
        };
        let partition = key_of(&input.key_schema, KeyType::Hash).unwrap_or_default();
        let sort = key_of(&input.key_schema, KeyType::Range);

        let mut indexes = Vec::new();
        for gsi in &input.global_secondary_indexes {
            indexes.push((
                gsi.index_name.clone(),
                key_of(&gsi.key_schema, KeyType::Hash).unwrap_or_default(),
                key_of(&gsi.key_schema, KeyType::Range),
            ));
        }
        for lsi in &input.local_secondary_indexes {
            indexes.push((
                lsi.index_name.clone(),
                partition.clone(),
                key_of(&lsi.key_schema, KeyType::Range),
            ));
        }

        let description = TableDescription {
            table_name: Some(name.clone()),
            table_status: Some(TableStatus::Active),
            key_schema: input.key_schema.clone(),
            attribute_definitions: input.attribute_definitions.clone(),
            global_secondary_indexes: input
                .global_secondary_indexes
                .iter()
                .map(|gsi| GlobalSecondaryIndexDescription {
                    index_name: Some(gsi.index_name.clone()),
                    key_schema: gsi.key_schema.clone(),
                    projection: Some(gsi.projection.clone()),
                })
                .collect(),
            local_secondary_indexes: input
                .local_secondary_indexes
                .iter()
                .map(|lsi| LocalSecondaryIndexDescription {
                    index_name: Some(lsi.index_name.clone()),
                    key_schema: lsi.key_schema.clone(),
                    projection: Some(lsi.projection.clone()),
                })
                .collect(),
        };

        self.tables.insert(
            name,
            Table {
                description: description.clone(),
                partition,
                sort,
                indexes,
                items: Mutex::new(Vec::new()),
            },
        );
        Box::pin(async move {
            Ok(CreateTableOutput {
                table_description: Some(description),
            })
        })
    }

    fn describe_table(&self, input: DescribeTableInput) -> StoreFuture<DescribeTableOutput> {
        let result = self.with_table(&input.table_name, |table| {
            Ok(DescribeTableOutput {
                table: Some(table.description.clone()),
            })
        });
        Box::pin(async move { result })
    }
}

impl Table {
    fn primary_key_attrs(&self) -> Vec<String> {
        let mut attrs = vec![self.partition.clone()];
        attrs.extend(self.sort.clone());
        attrs
    }

    fn primary_key_of(&self, item: &Item) -> Result<Item, StoreError> {
        let mut key = HashMap::new();
        for attr in self.primary_key_attrs() {
            let value = item.get(&attr).ok_or_else(|| {
                StoreError::validation(format!("item is missing key attribute {attr}"))
            })?;
            key.insert(attr, value.clone());
        }
        Ok(key)
    }

    fn sort_attr_for(&self, index: Option<&str>) -> Result<Option<String>, StoreError> {
        match index {
            None => Ok(self.sort.clone()),
            Some(name) => self
                .indexes
                .iter()
                .find(|(index_name, _, _)| index_name == name)
                .map(|(_, _, sort)| sort.clone())
                .ok_or_else(|| {
                    StoreError::validation(format!("index {name} does not exist"))
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// Expression evaluation
// ---------------------------------------------------------------------------
//
// Parses and evaluates the full expression language the compiler renders:
// comparisons, BETWEEN, IN, AND/OR/NOT with grouping, the filter functions
// (attribute_exists, attribute_not_exists, begins_with, contains), and
// size(path) comparison operands, over nested document paths. Anything
// outside that set panics so a scenario can never pass by a predicate being
// silently dropped.

#[derive(Debug, Clone, PartialEq)]
struct PathSeg {
    attr: String,
    indexes: Vec<usize>,
}

#[derive(Debug)]
enum Operand {
    Path(Vec<PathSeg>),
    Value(AttributeValue),
    Size(Vec<PathSeg>),
}

#[derive(Debug)]
enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare {
        left: Operand,
        op: String,
        right: Operand,
    },
    Between {
        left: Operand,
        low: Operand,
        high: Operand,
    },
    In {
        left: Operand,
        list: Vec<Operand>,
    },
    Func {
        name: String,
        args: Vec<Operand>,
    },
}

/// Parse one rendered expression string. Empty input means "no predicate".
fn parse_filter(
    expr: &str,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Option<FilterExpr> {
    if expr.trim().is_empty() {
        return None;
    }
    let toks = tokenize_expr(expr, names);
    let mut parser = ExprParser {
        toks,
        pos: 0,
        values,
        expr,
    };
    let parsed = parser.parse_or();
    assert!(
        parser.pos == parser.toks.len(),
        "trailing tokens in expression {expr:?}"
    );
    Some(parsed)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Path(Vec<PathSeg>),
    Value(String),
    Word(String),
    Op(String),
    LParen,
    RParen,
    Comma,
}

fn tokenize_expr(expr: &str, names: &HashMap<String, String>) -> Vec<Tok> {
    let chars: Vec<char> = expr.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    let read_ident = |i: &mut usize| {
        let start = *i;
        while *i < chars.len() && (chars[*i].is_ascii_alphanumeric() || chars[*i] == '_') {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '#' => {
                let mut segs = Vec::new();
                loop {
                    i += 1; // consume '#'
                    let alias = format!("#{}", read_ident(&mut i));
                    let attr = names
                        .get(&alias)
                        .unwrap_or_else(|| panic!("unknown name alias {alias} in {expr:?}"))
                        .clone();
                    let mut indexes = Vec::new();
                    while i < chars.len() && chars[i] == '[' {
                        i += 1;
                        let digits = read_ident(&mut i);
                        indexes.push(digits.parse().unwrap_or_else(|_| {
                            panic!("bad list index {digits:?} in {expr:?}")
                        }));
                        assert!(chars.get(i) == Some(&']'), "unclosed index in {expr:?}");
                        i += 1;
                    }
                    segs.push(PathSeg { attr, indexes });
                    if chars.get(i) == Some(&'.') && chars.get(i + 1) == Some(&'#') {
                        i += 1; // consume '.', loop consumes '#'
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Path(segs));
            }
            ':' => {
                i += 1;
                toks.push(Tok::Value(format!(":{}", read_ident(&mut i))));
            }
            '(' => {
                i += 1;
                toks.push(Tok::LParen);
            }
            ')' => {
                i += 1;
                toks.push(Tok::RParen);
            }
            ',' => {
                i += 1;
                toks.push(Tok::Comma);
            }
            '=' => {
                i += 1;
                toks.push(Tok::Op("=".to_owned()));
            }
            '<' => {
                let op = match chars.get(i + 1) {
                    Some('=') => "<=",
                    Some('>') => "<>",
                    _ => "<",
                };
                i += op.len();
                toks.push(Tok::Op(op.to_owned()));
            }
            '>' => {
                let op = if chars.get(i + 1) == Some(&'=') { ">=" } else { ">" };
                i += op.len();
                toks.push(Tok::Op(op.to_owned()));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                toks.push(Tok::Word(read_ident(&mut i)));
            }
            other => panic!("unrecognized character {other:?} in expression {expr:?}"),
        }
    }
    toks
}

struct ExprParser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    values: &'a HashMap<String, AttributeValue>,
    expr: &'a str,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Tok {
        let tok = self
            .toks
            .get(self.pos)
            .unwrap_or_else(|| panic!("expression {:?} ended early", self.expr))
            .clone();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Tok) {
        let tok = self.next();
        assert!(
            tok == *expected,
            "expected {expected:?}, found {tok:?} in {:?}",
            self.expr
        );
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> FilterExpr {
        let mut alts = vec![self.parse_and()];
        while self.eat_word("OR") {
            alts.push(self.parse_and());
        }
        if alts.len() == 1 {
            alts.remove(0)
        } else {
            FilterExpr::Or(alts)
        }
    }

    fn parse_and(&mut self) -> FilterExpr {
        let mut terms = vec![self.parse_unary()];
        while self.eat_word("AND") {
            terms.push(self.parse_unary());
        }
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::And(terms)
        }
    }

    fn parse_unary(&mut self) -> FilterExpr {
        if self.eat_word("NOT") {
            return FilterExpr::Not(Box::new(self.parse_unary()));
        }
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.pos += 1;
            let inner = self.parse_or();
            self.expect(&Tok::RParen);
            return inner;
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> FilterExpr {
        match self.next() {
            Tok::Word(name) => {
                self.expect(&Tok::LParen);
                let mut args = vec![self.parse_operand()];
                while matches!(self.peek(), Some(Tok::Comma)) {
                    self.pos += 1;
                    args.push(self.parse_operand());
                }
                self.expect(&Tok::RParen);
                if self.starts_relational() {
                    // Only size() produces a comparable value.
                    assert!(
                        name == "size" && args.len() == 1,
                        "{name} cannot be a comparison operand in {:?}",
                        self.expr
                    );
                    let Some(Operand::Path(path)) = args.pop() else {
                        panic!("size() takes a path argument in {:?}", self.expr);
                    };
                    return self.parse_relational(Operand::Size(path));
                }
                FilterExpr::Func { name, args }
            }
            Tok::Path(path) => self.parse_relational(Operand::Path(path)),
            Tok::Value(alias) => {
                let value = self.value(&alias);
                self.parse_relational(value)
            }
            other => panic!("unexpected {other:?} in expression {:?}", self.expr),
        }
    }

    fn starts_relational(&self) -> bool {
        match self.peek() {
            Some(Tok::Op(_)) => true,
            Some(Tok::Word(w)) => w == "BETWEEN" || w == "IN",
            _ => false,
        }
    }

    fn parse_relational(&mut self, left: Operand) -> FilterExpr {
        match self.next() {
            Tok::Op(op) => FilterExpr::Compare {
                left,
                op,
                right: self.parse_operand(),
            },
            Tok::Word(w) if w == "BETWEEN" => {
                let low = self.parse_operand();
                assert!(self.eat_word("AND"), "BETWEEN without AND in {:?}", self.expr);
                let high = self.parse_operand();
                FilterExpr::Between { left, low, high }
            }
            Tok::Word(w) if w == "IN" => {
                self.expect(&Tok::LParen);
                let mut list = vec![self.parse_operand()];
                while matches!(self.peek(), Some(Tok::Comma)) {
                    self.pos += 1;
                    list.push(self.parse_operand());
                }
                self.expect(&Tok::RParen);
                FilterExpr::In { left, list }
            }
            other => panic!(
                "expected comparison, BETWEEN, or IN, found {other:?} in {:?}",
                self.expr
            ),
        }
    }

    fn parse_operand(&mut self) -> Operand {
        match self.next() {
            Tok::Path(path) => Operand::Path(path),
            Tok::Value(alias) => self.value(&alias),
            Tok::Word(w) if w == "size" => {
                self.expect(&Tok::LParen);
                let Tok::Path(path) = self.next() else {
                    panic!("size() takes a path argument in {:?}", self.expr);
                };
                self.expect(&Tok::RParen);
                Operand::Size(path)
            }
            other => panic!("expected operand, found {other:?} in {:?}", self.expr),
        }
    }

    fn value(&self, alias: &str) -> Operand {
        let value = self
            .values
            .get(alias)
            .unwrap_or_else(|| panic!("unknown value alias {alias} in {:?}", self.expr));
        Operand::Value(value.clone())
    }
}

impl FilterExpr {
    fn eval(&self, item: &Item) -> bool {
        match self {
            Self::And(terms) => terms.iter().all(|term| term.eval(item)),
            Self::Or(alts) => alts.iter().any(|alt| alt.eval(item)),
            Self::Not(inner) => !inner.eval(item),
            Self::Compare { left, op, right } => {
                let (Some(a), Some(b)) = (left.resolve(item), right.resolve(item)) else {
                    return false;
                };
                let ord = compare_attr(Some(&a), Some(&b));
                match op.as_str() {
                    "=" => ord == std::cmp::Ordering::Equal,
                    "<>" => ord != std::cmp::Ordering::Equal,
                    "<" => ord == std::cmp::Ordering::Less,
                    "<=" => ord != std::cmp::Ordering::Greater,
                    ">" => ord == std::cmp::Ordering::Greater,
                    ">=" => ord != std::cmp::Ordering::Less,
                    other => panic!("unsupported operator {other}"),
                }
            }
            Self::Between { left, low, high } => {
                let (Some(v), Some(lo), Some(hi)) =
                    (left.resolve(item), low.resolve(item), high.resolve(item))
                else {
                    return false;
                };
                compare_attr(Some(&v), Some(&lo)) != std::cmp::Ordering::Less
                    && compare_attr(Some(&v), Some(&hi)) != std::cmp::Ordering::Greater
            }
            Self::In { left, list } => {
                let Some(v) = left.resolve(item) else {
                    return false;
                };
                list.iter()
                    .filter_map(|candidate| candidate.resolve(item))
                    .any(|candidate| candidate == v)
            }
            Self::Func { name, args } => eval_function(name, args, item),
        }
    }
}

impl Operand {
    fn resolve(&self, item: &Item) -> Option<AttributeValue> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Path(segs) => lookup_path(item, segs).cloned(),
            Self::Size(segs) => lookup_path(item, segs)
                .and_then(collection_size)
                .map(|n| AttributeValue::N(n.to_string())),
        }
    }

    fn as_path(&self) -> &[PathSeg] {
        match self {
            Self::Path(segs) => segs,
            other => panic!("expected a path argument, found {other:?}"),
        }
    }
}

fn lookup_path<'a>(item: &'a Item, segs: &[PathSeg]) -> Option<&'a AttributeValue> {
    let (first, rest) = segs.split_first()?;
    let mut cur = item.get(&first.attr)?;
    for idx in &first.indexes {
        cur = cur.as_l()?.get(*idx)?;
    }
    for seg in rest {
        cur = cur.as_m()?.get(&seg.attr)?;
        for idx in &seg.indexes {
            cur = cur.as_l()?.get(*idx)?;
        }
    }
    Some(cur)
}

fn collection_size(value: &AttributeValue) -> Option<usize> {
    match value {
        AttributeValue::S(s) => Some(s.len()),
        AttributeValue::B(b) => Some(b.len()),
        AttributeValue::L(v) => Some(v.len()),
        AttributeValue::M(m) => Some(m.len()),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => Some(v.len()),
        AttributeValue::Bs(v) => Some(v.len()),
        _ => None,
    }
}

fn eval_function(name: &str, args: &[Operand], item: &Item) -> bool {
    match name {
        "attribute_exists" => lookup_path(item, args[0].as_path()).is_some(),
        "attribute_not_exists" => lookup_path(item, args[0].as_path()).is_none(),
        "begins_with" => {
            match (lookup_path(item, args[0].as_path()), args[1].resolve(item)) {
                (Some(AttributeValue::S(s)), Some(AttributeValue::S(prefix))) => {
                    s.starts_with(&prefix)
                }
                _ => false,
            }
        }
        "contains" => {
            let Some(target) = lookup_path(item, args[0].as_path()) else {
                return false;
            };
            let Some(needle) = args[1].resolve(item) else {
                return false;
            };
            match (target, &needle) {
                (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
                (AttributeValue::Ss(set), AttributeValue::S(member)) => {
                    set.iter().any(|e| e == member)
                }
                (AttributeValue::Ns(set), AttributeValue::N(member)) => {
                    set.iter().any(|e| e == member)
                }
                (AttributeValue::Bs(set), AttributeValue::B(member)) => {
                    set.iter().any(|e| e == member)
                }
                (AttributeValue::L(list), _) => list.iter().any(|e| e == &needle),
                _ => false,
            }
        }
        other => panic!("function {other} is not supported by the in-memory store"),
    }
}

fn key_matches(item: &Item, key: &Item) -> bool {
    key.iter().all(|(attr, value)| item.get(attr) == Some(value))
}

fn compare_attr(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(AttributeValue::N(x)), Some(AttributeValue::N(y))) => {
            let x: f64 = x.parse().unwrap_or(f64::NAN);
            let y: f64 = y.parse().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        }
        (Some(AttributeValue::S(x)), Some(AttributeValue::S(y))) => x.cmp(y),
        (Some(x), Some(y)) => {
            if x == y {
                std::cmp::Ordering::Equal
            } else {
                std::cmp::Ordering::Less
            }
        }
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
    }
}

/// Slice one page out of the ordered candidate list, returning the page,
/// the evaluated count, and the continuation key when more items remain.
fn paginate(
    candidates: Vec<Item>,
    start_key: &Item,
    limit: Option<i32>,
    key_attrs: &[String],
) -> (Vec<Item>, i32, Item) {
    let start = if start_key.is_empty() {
        0
    } else {
        candidates
            .iter()
            .position(|item| key_matches(item, start_key))
            .map_or(0, |at| at + 1)
    };
    let remaining = &candidates[start.min(candidates.len())..];
    let take = limit.map_or(remaining.len(), |n| {
        usize::try_from(n).unwrap_or(0).min(remaining.len())
    });
    let page: Vec<Item> = remaining[..take].to_vec();
    let more = take < remaining.len();
    let last_key = if more {
        page.last()
            .map(|item| {
                key_attrs
                    .iter()
                    .filter_map(|attr| item.get(attr).map(|v| (attr.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        HashMap::new()
    };
    let scanned = i32::try_from(page.len()).unwrap_or(i32::MAX);
    (page, scanned, last_key)
}

fn project(item: Item, projection: Option<&str>, names: &HashMap<String, String>) -> Item {
    let Some(projection) = projection else {
        return item;
    };
    let wanted: Vec<String> = projection
        .split(',')
        .map(str::trim)
        .map(|token| {
            let head = token.split(['[', '.']).next().unwrap_or(token);
            names.get(head).cloned().unwrap_or_else(|| head.to_owned())
        })
        .collect();
    item.into_iter()
        .filter(|(attr, _)| wanted.iter().any(|w| w == attr))
        .collect()
}
