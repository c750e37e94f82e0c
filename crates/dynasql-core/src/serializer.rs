//! Expression rendering with name/value substitution.
//!
//! Renders predicate and projection subtrees into the store's expression
//! string form. Every path fragment symbol is unconditionally aliased
//! (`#n0`), so reserved words at any depth can never collide; every literal
//! or resolved placeholder is recorded under a fresh value slot (`:v0`).
//! Both counters are global to one plan and assigned monotonically in
//! traversal order, so aliases are unique and contiguous within a request.

use std::collections::HashMap;

use dynasql_model::AttributeValue;

use crate::ast::{
    AndExpression, Condition, ConditionExpression, ConditionRhs, DocumentPath, FunctionArg,
    FunctionExpression, JsonObject, JsonValue, Operand, ProjectionColumn, Value,
};
use crate::bind::Binder;
use crate::error::Error;

/// The two substitution tables of one plan.
///
/// Identical fragment symbols share one name alias; values never dedupe.
#[derive(Debug, Default)]
pub struct Substitutions {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    alias_by_symbol: HashMap<String, String>,
    next_name: usize,
    next_value: usize,
}

impl Substitutions {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for one fragment symbol, allocating `#n{k}` on first sight.
    pub fn name_alias(&mut self, symbol: &str) -> String {
        if let Some(alias) = self.alias_by_symbol.get(symbol) {
            return alias.clone();
        }
        let alias = format!("#n{}", self.next_name);
        self.next_name += 1;
        self.names.insert(alias.clone(), symbol.to_owned());
        self.alias_by_symbol.insert(symbol.to_owned(), alias.clone());
        alias
    }

    /// Record a typed value under a fresh `:v{k}` slot.
    pub fn value_alias(&mut self, value: AttributeValue) -> String {
        let alias = format!(":v{}", self.next_value);
        self.next_value += 1;
        self.values.insert(alias.clone(), value);
        alias
    }

    /// The `alias -> real name` table.
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    /// The `alias -> typed value` table.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.values
    }

    /// Consume the tables for the request under construction.
    #[must_use]
    pub fn into_tables(self) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
        (self.names, self.values)
    }
}

/// Renders expression subtrees against shared substitution tables.
#[derive(Debug)]
pub struct ExprRenderer<'a> {
    /// Substitution tables shared across all expressions of the plan.
    pub subs: &'a mut Substitutions,
    /// Placeholder resolver for the execution's parameters.
    pub binder: &'a mut Binder,
}

impl ExprRenderer<'_> {
    /// Render a document path: `#n0.#n1[0]`.
    pub fn render_path(&mut self, path: &DocumentPath) -> String {
        let mut out = String::new();
        for (i, fragment) in path.fragments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&self.subs.name_alias(&fragment.symbol));
            for idx in &fragment.indexes {
                out.push_str(&format!("[{idx}]"));
            }
        }
        out
    }

    /// Render a value into its `:v{k}` slot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BindError`] failures from placeholder
    /// resolution.
    pub fn render_value(&mut self, value: &Value) -> Result<String, Error> {
        let resolved = self.binder.resolve(value)?;
        Ok(self.subs.value_alias(resolved))
    }

    /// Render a top-level conjunction, joining conjuncts with `AND`.
    ///
    /// # Errors
    ///
    /// Propagates placeholder resolution failures.
    pub fn render_and(&mut self, and: &AndExpression) -> Result<String, Error> {
        let rendered: Vec<String> = and
            .and
            .iter()
            .map(|cond| self.render_condition(cond))
            .collect::<Result<_, _>>()?;
        Ok(rendered.join(" AND "))
    }

    /// Render a parenthesized disjunction body.
    ///
    /// # Errors
    ///
    /// Propagates placeholder resolution failures.
    pub fn render_or(&mut self, or: &ConditionExpression) -> Result<String, Error> {
        let rendered: Vec<String> = or
            .or
            .iter()
            .map(|and| self.render_and(and))
            .collect::<Result<_, _>>()?;
        Ok(rendered.join(" OR "))
    }

    /// Render one condition.
    ///
    /// # Errors
    ///
    /// Propagates placeholder resolution failures.
    pub fn render_condition(&mut self, condition: &Condition) -> Result<String, Error> {
        match condition {
            Condition::Parenthesized(inner) => Ok(format!("({})", self.render_or(inner)?)),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.render_condition(inner)?)),
            Condition::Operand { path, rhs } => {
                let lhs = self.render_path(path);
                self.render_rhs(&lhs, rhs)
            }
            Condition::Function(function) => self.render_function(function),
            Condition::FunctionOperand { function, rhs } => {
                let lhs = self.render_function(function)?;
                self.render_rhs(&lhs, rhs)
            }
        }
    }

    fn render_rhs(&mut self, lhs: &str, rhs: &ConditionRhs) -> Result<String, Error> {
        match rhs {
            ConditionRhs::Compare { op, operand } => {
                Ok(format!("{lhs} {op} {}", self.render_operand(operand)?))
            }
            ConditionRhs::Between { low, high } => Ok(format!(
                "{lhs} BETWEEN {} AND {}",
                self.render_operand(low)?,
                self.render_operand(high)?
            )),
            ConditionRhs::In(values) => {
                let slots: Vec<String> = values
                    .iter()
                    .map(|v| self.render_value(v))
                    .collect::<Result<_, _>>()?;
                Ok(format!("{lhs} IN ({})", slots.join(", ")))
            }
        }
    }

    fn render_operand(&mut self, operand: &Operand) -> Result<String, Error> {
        match operand {
            Operand::Value(value) => self.render_value(value),
            Operand::Path(path) => Ok(self.render_path(path)),
        }
    }

    /// Render a function call, substituting each argument.
    ///
    /// # Errors
    ///
    /// Propagates placeholder resolution failures.
    pub fn render_function(&mut self, function: &FunctionExpression) -> Result<String, Error> {
        let args: Vec<String> = function
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Path(path) => Ok(self.render_path(path)),
                FunctionArg::Value(value) => self.render_value(value),
            })
            .collect::<Result<_, _>>()?;
        Ok(format!("{}({})", function.name, args.join(", ")))
    }

    /// Render an explicit projection column list.
    ///
    /// # Errors
    ///
    /// Propagates placeholder resolution failures from function arguments.
    pub fn render_projection(&mut self, columns: &[ProjectionColumn]) -> Result<String, Error> {
        let rendered: Vec<String> = columns
            .iter()
            .map(|col| match col {
                ProjectionColumn::Path(path) => Ok(self.render_path(path)),
                ProjectionColumn::Function(function) => self.render_function(function),
            })
            .collect::<Result<_, _>>()?;
        Ok(rendered.join(", "))
    }
}

/// Encode an inline JSON object into an item document.
///
/// Duplicate keys keep the last occurrence.
#[must_use]
pub fn encode_json_object(object: &JsonObject) -> HashMap<String, AttributeValue> {
    object
        .entries
        .iter()
        .map(|entry| (entry.key.clone(), encode_json_value(&entry.value)))
        .collect()
}

/// Encode one JSON value into its typed form. Numbers keep their source
/// text; nested objects and arrays recurse into maps and lists.
#[must_use]
pub fn encode_json_value(value: &JsonValue) -> AttributeValue {
    match value {
        JsonValue::Number(text) => AttributeValue::N(text.clone()),
        JsonValue::Str(s) => AttributeValue::S(s.clone()),
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Null => AttributeValue::Null(true),
        JsonValue::Object(obj) => AttributeValue::M(encode_json_object(obj)),
        JsonValue::Array(items) => {
            AttributeValue::L(items.iter().map(encode_json_value).collect())
        }
    }
}
