//! Input types for the store operations the compiler emits.
//!
//! All input structs use `PascalCase` JSON field naming. Optional fields are
//! omitted when `None`; empty maps and vectors are omitted so the compiled
//! requests stay minimal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, LocalSecondaryIndex,
    ProvisionedThroughput, ReturnValue,
};

/// Input for the `GetItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemInput {
    /// Name of the table containing the item.
    pub table_name: String,

    /// Full primary key of the item to retrieve.
    pub key: HashMap<String, AttributeValue>,

    /// Attributes to retrieve, as a rendered projection expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Substitution tokens for attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
}

/// Input for the `Query` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    /// Name of the table to query.
    pub table_name: String,

    /// Secondary index to query instead of the base table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Key condition selecting the partition (and optionally a sort range).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,

    /// Post-read filter over non-key attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// Attributes to retrieve, as a rendered projection expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Substitution tokens for attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Substitution tokens for attribute values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Traversal order: `true` (default) ascending, `false` descending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,

    /// Maximum number of items to evaluate in this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Continuation token from a previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: HashMap<String, AttributeValue>,
}

/// Input for the `Scan` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanInput {
    /// Name of the table to scan.
    pub table_name: String,

    /// Secondary index to scan instead of the base table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Post-read filter over item attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// Attributes to retrieve, as a rendered projection expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Substitution tokens for attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Substitution tokens for attribute values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Maximum number of items to evaluate in this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Continuation token from a previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: HashMap<String, AttributeValue>,
}

/// Input for the `PutItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemInput {
    /// Name of the table to write into.
    pub table_name: String,

    /// The full item, keyed by attribute name.
    pub item: HashMap<String, AttributeValue>,

    /// What to return about the replaced item, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

/// Input for the `CreateTable` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableInput {
    /// Name of the table to create.
    pub table_name: String,

    /// Key schema (partition key and optional sort key).
    pub key_schema: Vec<KeySchemaElement>,

    /// Types of every attribute appearing in some key schema.
    pub attribute_definitions: Vec<AttributeDefinition>,

    /// Billing mode (`PROVISIONED` or `PAY_PER_REQUEST`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<BillingMode>,

    /// Capacity settings, required under `PROVISIONED` billing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,

    /// Global secondary indexes to create.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,

    /// Local secondary indexes to create.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
}

/// Input for the `DescribeTable` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableInput {
    /// Name of the table to describe.
    pub table_name: String,
}
