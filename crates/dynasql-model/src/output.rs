//! Output types for the store operations the compiler emits.
//!
//! Mirrors `input`: `PascalCase` JSON field naming, optional and empty
//! collections omitted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::types::TableDescription;

/// Output of the `GetItem` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemOutput {
    /// The retrieved item, absent when no item matched the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<HashMap<String, AttributeValue>>,
}

/// Output of the `Query` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    /// Items matching the key condition (and filter, if any).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<HashMap<String, AttributeValue>>,

    /// Number of items returned.
    pub count: i32,

    /// Number of items evaluated before filtering.
    pub scanned_count: i32,

    /// Continuation token; present when more pages remain.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: HashMap<String, AttributeValue>,
}

/// Output of the `Scan` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    /// Items surviving the filter, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<HashMap<String, AttributeValue>>,

    /// Number of items returned.
    pub count: i32,

    /// Number of items evaluated before filtering.
    pub scanned_count: i32,

    /// Continuation token; present when more pages remain.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: HashMap<String, AttributeValue>,
}

/// Output of the `PutItem` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemOutput {
    /// The replaced item as it was before the write; populated only when
    /// the input asked for `ALL_OLD`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, AttributeValue>,
}

/// Output of the `CreateTable` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableOutput {
    /// Metadata of the newly created table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_description: Option<TableDescription>,
}

/// Output of the `DescribeTable` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableOutput {
    /// Metadata of the table.
    #[serde(rename = "Table", skip_serializing_if = "Option::is_none")]
    pub table: Option<TableDescription>,
}
