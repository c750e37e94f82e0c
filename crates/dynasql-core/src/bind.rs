//! Placeholder parameter binding.
//!
//! A statement uses either named (`:ident`) or positional (`?`) placeholders,
//! never both. Named values are looked up by identifier; positional values
//! are consumed left to right in AST traversal order. Literals encode
//! directly to their typed form, preserving numeric source text.

use std::collections::{HashMap, HashSet};

use dynasql_model::AttributeValue;

use crate::ast::Value;
use crate::error::{BindError, Error};

/// Values supplied by the caller for one execution.
#[derive(Debug, Clone, Default)]
pub enum Params {
    /// The statement has no placeholders.
    #[default]
    None,
    /// Values for named placeholders, keyed without the leading colon.
    Named(HashMap<String, AttributeValue>),
    /// Values for positional placeholders, in order.
    Positional(Vec<AttributeValue>),
}

impl Params {
    /// Build named parameters from `(name, value)` pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build positional parameters from values in order.
    pub fn positional<V, I>(values: I) -> Self
    where
        V: Into<AttributeValue>,
        I: IntoIterator<Item = V>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Named,
    Positional,
}

/// Resolves placeholder values during one plan construction.
#[derive(Debug)]
pub struct Binder {
    params: Params,
    position: usize,
    used_names: HashSet<String>,
    flavor: Option<Flavor>,
}

impl Binder {
    /// Create a binder over the supplied parameters.
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self {
            params,
            position: 0,
            used_names: HashSet::new(),
            flavor: None,
        }
    }

    /// Resolve one value: literals encode directly, placeholders look up the
    /// supplied parameters.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] on flavor mixing or a missing value.
    pub fn resolve(&mut self, value: &Value) -> Result<AttributeValue, Error> {
        match value {
            Value::Number(text) => Ok(AttributeValue::N(text.clone())),
            Value::Str(s) => Ok(AttributeValue::S(s.clone())),
            Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
            Value::Null => Ok(AttributeValue::Null(true)),
            Value::Named(name) => {
                self.mark(Flavor::Named)?;
                let Params::Named(map) = &self.params else {
                    return Err(BindError::UnboundName { name: name.clone() }.into());
                };
                let bound = map
                    .get(name)
                    .ok_or_else(|| BindError::UnboundName { name: name.clone() })?;
                self.used_names.insert(name.clone());
                Ok(bound.clone())
            }
            Value::Positional => {
                self.mark(Flavor::Positional)?;
                let position = self.position;
                let Params::Positional(values) = &self.params else {
                    return Err(BindError::UnboundPosition { position }.into());
                };
                let bound = values
                    .get(position)
                    .ok_or(BindError::UnboundPosition { position })?;
                self.position += 1;
                Ok(bound.clone())
            }
        }
    }

    fn mark(&mut self, flavor: Flavor) -> Result<(), BindError> {
        match self.flavor {
            None => {
                self.flavor = Some(flavor);
                Ok(())
            }
            Some(used) if used == flavor => Ok(()),
            Some(_) => Err(BindError::MixedPlaceholders),
        }
    }

    /// Verify every supplied value was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when values were supplied beyond what the
    /// statement references.
    pub fn finish(&self) -> Result<(), Error> {
        match &self.params {
            Params::None => Ok(()),
            Params::Named(map) => {
                let mut unused: Vec<String> = map
                    .keys()
                    .filter(|name| !self.used_names.contains(*name))
                    .cloned()
                    .collect();
                if unused.is_empty() {
                    Ok(())
                } else {
                    unused.sort();
                    Err(BindError::UnusedNames { names: unused }.into())
                }
            }
            Params::Positional(values) => {
                if self.position < values.len() {
                    Err(BindError::ExcessValues {
                        supplied: values.len(),
                        used: self.position,
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
        }
    }
}
