//! Shared wire types for the store operations the compiler emits.
//!
//! Structs follow the store's JSON wire format with `PascalCase` field names
//! (`#[serde(rename_all = "PascalCase")]`). Enum variants use idiomatic Rust
//! names with `#[serde(rename)]` attributes mapping to the wire spelling.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Role of an attribute inside a key schema.
///
/// `Hash` is the partition key; `Range` is the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Partition key.
    #[serde(rename = "HASH")]
    Hash,
    /// Sort key.
    #[serde(rename = "RANGE")]
    Range,
}

impl KeyType {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Range => "RANGE",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar types usable as key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String.
    S,
    /// Number.
    N,
    /// Binary.
    B,
}

impl ScalarAttributeType {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }
}

impl std::fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing mode for a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BillingMode {
    /// Explicit read/write capacity.
    #[serde(rename = "PROVISIONED")]
    Provisioned,
    /// On-demand capacity.
    #[default]
    #[serde(rename = "PAY_PER_REQUEST")]
    PayPerRequest,
}

impl BillingMode {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioned => "PROVISIONED",
            Self::PayPerRequest => "PAY_PER_REQUEST",
        }
    }
}

impl std::fmt::Display for BillingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which attributes a secondary index carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectionType {
    /// Every table attribute is copied into the index.
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// Only the index and primary keys.
    #[serde(rename = "KEYS_ONLY")]
    KeysOnly,
    /// Keys plus an explicit list of non-key attributes.
    #[serde(rename = "INCLUDE")]
    Include,
}

impl ProjectionType {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::KeysOnly => "KEYS_ONLY",
            Self::Include => "INCLUDE",
        }
    }
}

impl std::fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a write operation hands back about the previous item state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnValue {
    /// Nothing.
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// The full item as it was before the write.
    #[serde(rename = "ALL_OLD")]
    AllOld,
}

impl ReturnValue {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AllOld => "ALL_OLD",
        }
    }
}

impl std::fmt::Display for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a table, as reported by `DescribeTable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableStatus {
    /// Being created.
    #[serde(rename = "CREATING")]
    Creating,
    /// Ready for use.
    #[serde(rename = "ACTIVE")]
    Active,
    /// Being deleted.
    #[serde(rename = "DELETING")]
    Deleting,
    /// Being updated.
    #[serde(rename = "UPDATING")]
    Updating,
}

impl TableStatus {
    /// The wire-format spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Updating => "UPDATING",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Key schema & attribute definitions
// ---------------------------------------------------------------------------

/// One element of a table or index key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    /// Name of the key attribute.
    pub attribute_name: String,
    /// Role of the attribute (`HASH` or `RANGE`).
    pub key_type: KeyType,
}

/// Declares the scalar type of an attribute used in some key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// Name of the attribute.
    pub attribute_name: String,
    /// Scalar type of the attribute.
    pub attribute_type: ScalarAttributeType,
}

// ---------------------------------------------------------------------------
// Throughput, projection, secondary indexes
// ---------------------------------------------------------------------------

/// Read/write capacity for a provisioned table or index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    /// Strongly consistent reads per second.
    pub read_capacity_units: i64,
    /// Writes per second.
    pub write_capacity_units: i64,
}

/// Projection settings for a secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    /// Which attribute set is projected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_type: Option<ProjectionType>,
    /// Non-key attributes to project when the type is `INCLUDE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

/// Global secondary index definition (input side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// Key schema of the index (own partition key, optional sort key).
    pub key_schema: Vec<KeySchemaElement>,
    /// Attributes projected into the index.
    pub projection: Projection,
    /// Throughput, required under `PROVISIONED` billing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

/// Local secondary index definition (input side).
///
/// An LSI shares the base table's partition key and supplies its own sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// Key schema of the index.
    pub key_schema: Vec<KeySchemaElement>,
    /// Attributes projected into the index.
    pub projection: Projection,
}

// ---------------------------------------------------------------------------
// Table description (DescribeTable output payload)
// ---------------------------------------------------------------------------

/// Description of a global secondary index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndexDescription {
    /// Index name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Key schema of the index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_schema: Vec<KeySchemaElement>,
    /// Attributes projected into the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
}

/// Description of a local secondary index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndexDescription {
    /// Index name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Key schema of the index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_schema: Vec<KeySchemaElement>,
    /// Attributes projected into the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
}

/// Table metadata as reported by `DescribeTable`.
///
/// Only the fields the schema resolver consumes are modeled; the store may
/// send more and they are ignored on deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    /// Table name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Current lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_status: Option<TableStatus>,
    /// Key schema of the base table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_schema: Vec<KeySchemaElement>,
    /// Declared key attribute types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Global secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndexDescription>,
    /// Local secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndexDescription>,
}
