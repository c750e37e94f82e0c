//! Table descriptors and the memoizing schema resolver.
//!
//! The planner works against a [`TableDescriptor`]: the primary key, declared
//! key attribute types, and the secondary indexes of one table. Descriptors
//! come from a [`SchemaSource`] (the driver implements one over the store's
//! `DescribeTable`) and are memoized by [`SchemaCache`] with single-flight
//! fetching and an optional TTL.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use dynasql_model::types::{
    KeyType, ProjectionType, ScalarAttributeType, TableDescription,
};

use crate::error::{Error, SchemaError};

/// A key attribute: name plus declared scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// Attribute name.
    pub name: String,
    /// Declared scalar type, when the description carried one.
    pub attr_type: Option<ScalarAttributeType>,
}

/// Which attributes a secondary index carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionPolicy {
    /// Only key attributes.
    KeysOnly,
    /// Every table attribute.
    All,
    /// Keys plus the listed attributes.
    Include(Vec<String>),
}

/// Kind of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Global secondary index: independent partition key.
    Global,
    /// Local secondary index: shares the base table's partition key.
    Local,
}

/// A secondary index of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Global or local.
    pub kind: IndexKind,
    /// Partition key attribute name.
    pub partition: String,
    /// Sort key attribute name, if the index has one.
    pub sort: Option<String>,
    /// Projection policy.
    pub projection: ProjectionPolicy,
}

/// Everything the planner needs to know about one table.
///
/// Immutable for the life of one compilation; the cache hands out shared
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Partition key.
    pub partition: KeyAttribute,
    /// Sort key, if the table has one.
    pub sort: Option<KeyAttribute>,
    /// Declared attribute types, covering every attribute that appears in
    /// some key schema.
    pub attr_types: HashMap<String, ScalarAttributeType>,
    /// Secondary indexes: globals first (declared order), then locals.
    pub indexes: Vec<IndexDescriptor>,
}

impl TableDescriptor {
    /// Build a descriptor from a `DescribeTable` payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDescriptor`] when the description lacks
    /// a partition key or an index is malformed.
    pub fn from_description(description: &TableDescription) -> Result<Self, SchemaError> {
        let name = description.table_name.clone().unwrap_or_default();
        let invalid = |reason: &str| SchemaError::InvalidDescriptor {
            table: name.clone(),
            reason: reason.to_owned(),
        };

        let attr_type = |attr: &str| {
            description
                .attribute_definitions
                .iter()
                .find(|def| def.attribute_name == attr)
                .map(|def| def.attribute_type)
        };
        let key_of = |schema: &[dynasql_model::types::KeySchemaElement], kind: KeyType| {
            schema
                .iter()
                .find(|e| e.key_type == kind)
                .map(|e| e.attribute_name.clone())
        };

        let partition_name = key_of(&description.key_schema, KeyType::Hash)
            .ok_or_else(|| invalid("no partition key in key schema"))?;
        let partition = KeyAttribute {
            attr_type: attr_type(&partition_name),
            name: partition_name,
        };
        let sort = key_of(&description.key_schema, KeyType::Range).map(|sort_name| KeyAttribute {
            attr_type: attr_type(&sort_name),
            name: sort_name,
        });

        let projection_of = |p: Option<&dynasql_model::types::Projection>| match p {
            Some(p) => match p.projection_type.clone().unwrap_or_default() {
                ProjectionType::All => ProjectionPolicy::All,
                ProjectionType::KeysOnly => ProjectionPolicy::KeysOnly,
                ProjectionType::Include => {
                    ProjectionPolicy::Include(p.non_key_attributes.clone())
                }
            },
            None => ProjectionPolicy::All,
        };

        let mut indexes = Vec::new();
        for gsi in &description.global_secondary_indexes {
            let index_name = gsi.index_name.clone().unwrap_or_default();
            let index_partition = key_of(&gsi.key_schema, KeyType::Hash)
                .ok_or_else(|| invalid("global index without partition key"))?;
            indexes.push(IndexDescriptor {
                name: index_name,
                kind: IndexKind::Global,
                partition: index_partition,
                sort: key_of(&gsi.key_schema, KeyType::Range),
                projection: projection_of(gsi.projection.as_ref()),
            });
        }
        for lsi in &description.local_secondary_indexes {
            let index_name = lsi.index_name.clone().unwrap_or_default();
            // A local index shares the base partition key even when the
            // description omits it from the index key schema.
            let index_partition =
                key_of(&lsi.key_schema, KeyType::Hash).unwrap_or_else(|| partition.name.clone());
            let sort = key_of(&lsi.key_schema, KeyType::Range)
                .ok_or_else(|| invalid("local index without sort key"))?;
            indexes.push(IndexDescriptor {
                name: index_name,
                kind: IndexKind::Local,
                partition: index_partition,
                sort: Some(sort),
                projection: projection_of(lsi.projection.as_ref()),
            });
        }

        let attr_types = description
            .attribute_definitions
            .iter()
            .map(|def| (def.attribute_name.clone(), def.attribute_type))
            .collect();

        Ok(Self {
            name,
            partition,
            sort,
            attr_types,
            indexes,
        })
    }

    /// Find a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Declared type of an attribute, when it appears in some key schema.
    #[must_use]
    pub fn declared_type(&self, attr: &str) -> Option<ScalarAttributeType> {
        self.attr_types.get(attr).copied()
    }
}

/// Boxed future type used by the object-safe [`SchemaSource`] trait.
pub type SchemaFuture = Pin<Box<dyn Future<Output = Result<TableDescriptor, Error>> + Send>>;

/// Fetches table descriptors on demand.
///
/// Implementations map the store's "resource not found" onto
/// [`SchemaError::TableNotFound`] and pass transport failures through as
/// [`Error::Store`].
pub trait SchemaSource: Send + Sync + std::fmt::Debug {
    /// Fetch the descriptor of `table`.
    fn fetch(&self, table: &str) -> SchemaFuture;
}

#[derive(Debug, Clone)]
struct CachedDescriptor {
    descriptor: Arc<TableDescriptor>,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct Slot {
    cell: OnceCell<CachedDescriptor>,
}

/// Memoizing descriptor resolver.
///
/// One fetch per table is in flight at a time: the first caller runs the
/// fetch, concurrent callers for the same table await the same cell, and
/// later callers get the cached value until it expires or is invalidated.
/// Errors are never cached.
#[derive(Debug)]
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    ttl: Option<Duration>,
    slots: DashMap<String, Arc<Slot>>,
}

impl SchemaCache {
    /// Create a cache over `source`. A `ttl` of `None` caches forever
    /// (until explicit invalidation).
    #[must_use]
    pub fn new(source: Arc<dyn SchemaSource>, ttl: Option<Duration>) -> Self {
        Self {
            source,
            ttl,
            slots: DashMap::new(),
        }
    }

    /// Resolve the descriptor of `table`, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Propagates the source's error; nothing is cached on failure.
    pub async fn resolve(&self, table: &str) -> Result<Arc<TableDescriptor>, Error> {
        loop {
            let slot = self
                .slots
                .entry(table.to_owned())
                .or_default()
                .clone();

            if let Some(cached) = slot.cell.get() {
                if self.is_fresh(cached) {
                    return Ok(Arc::clone(&cached.descriptor));
                }
                // Expired: retire this slot and fetch through a fresh one.
                self.slots
                    .remove_if(table, |_, current| Arc::ptr_eq(current, &slot));
                continue;
            }

            let result = slot
                .cell
                .get_or_try_init(|| {
                    debug!(table, "fetching table descriptor");
                    let fetch = self.source.fetch(table);
                    async move {
                        let descriptor = fetch.await?;
                        Ok::<_, Error>(CachedDescriptor {
                            descriptor: Arc::new(descriptor),
                            fetched_at: Instant::now(),
                        })
                    }
                })
                .await;

            match result {
                Ok(cached) => return Ok(Arc::clone(&cached.descriptor)),
                Err(err) => {
                    self.slots
                        .remove_if(table, |_, current| Arc::ptr_eq(current, &slot));
                    return Err(err);
                }
            }
        }
    }

    /// Drop the cached descriptor of one table.
    pub fn invalidate(&self, table: &str) {
        self.slots.remove(table);
    }

    /// Drop every cached descriptor.
    pub fn invalidate_all(&self) {
        self.slots.clear();
    }

    fn is_fresh(&self, cached: &CachedDescriptor) -> bool {
        match self.ttl {
            Some(ttl) => cached.fetched_at.elapsed() < ttl,
            None => true,
        }
    }
}
