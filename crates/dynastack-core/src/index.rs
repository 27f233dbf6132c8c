//! Secondary index projections.
//!
//! Each global or local secondary index is a materialized [`ItemTree`]
//! keyed by the index hash key, then the index range key and the owning
//! item's table key. The owning table refreshes every index whenever it
//! writes an item, so readers holding the table lock always see the primary
//! store and its indexes in step.

use dynastack_model::types::{Item, Projection, ProjectionType};

use crate::storage::{
    ItemTree, KeyAttribute, KeySchema, KeyValue, PrimaryKey, RangeKey, StorageError,
    calculate_item_size,
};

/// Whether an index is global or local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Independent hash and range keys.
    Global,
    /// Same hash key as the table, different range key.
    Local,
}

/// A materialized secondary index.
#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    name: String,
    kind: IndexKind,
    key_schema: KeySchema,
    projection: Projection,
    items: ItemTree,
}

impl SecondaryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(name: String, kind: IndexKind, key_schema: KeySchema, projection: Projection) -> Self {
        Self {
            name,
            kind,
            key_schema,
            projection,
            items: ItemTree::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The projected entries in index order.
    #[must_use]
    pub fn items(&self) -> &ItemTree {
        &self.items
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    /// Summed size of the projected entries.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.items
            .iter()
            .map(|(_, _, item)| calculate_item_size(item))
            .sum()
    }

    /// Check the index key attributes an item is about to carry.
    ///
    /// Absent attributes are fine (the item is left out of the index).
    ///
    /// # Errors
    ///
    /// Returns `IndexKeyTypeMismatch` for a mistyped key, and `EmptyIndexKey`
    /// (put) or `EmptyIndexKeyOnUpdate` (update) for an empty string/binary.
    pub fn validate_item(&self, item: &Item, for_update: bool) -> Result<(), StorageError> {
        for attr in self.key_attributes() {
            let Some(value) = item.get(&attr.name) else {
                continue;
            };
            if !attr.attr_type.matches(value) {
                return Err(StorageError::IndexKeyTypeMismatch {
                    attr: attr.name.clone(),
                    expected: attr.attr_type.to_string(),
                    actual: value.type_descriptor().to_owned(),
                    index: self.name.clone(),
                });
            }
            if value.is_empty_scalar() {
                return Err(if for_update {
                    StorageError::EmptyIndexKeyOnUpdate
                } else {
                    StorageError::EmptyIndexKey {
                        index: self.name.clone(),
                        attr: attr.name.clone(),
                    }
                });
            }
        }
        Ok(())
    }

    /// Add the projection of `item` owned by `table_key`.
    pub fn insert(&mut self, table_schema: &KeySchema, table_key: &PrimaryKey, item: &Item) {
        if let Some((hash, range)) = self.position(table_key, item) {
            let projected = self.project(table_schema, item);
            self.items.insert(hash, range, projected);
        }
    }

    /// Drop the entry `item` produced, if any.
    pub fn remove(&mut self, table_key: &PrimaryKey, item: &Item) {
        if let Some((hash, range)) = self.position(table_key, item) {
            self.items.remove(&hash, &range);
        }
    }

    /// Build the attributes of `item` this index carries.
    #[must_use]
    pub fn project(&self, table_schema: &KeySchema, item: &Item) -> Item {
        let projection_type = self
            .projection
            .projection_type
            .as_ref()
            .unwrap_or(&ProjectionType::All);
        if *projection_type == ProjectionType::All {
            return item.clone();
        }
        item.iter()
            .filter(|(name, _)| {
                table_schema.is_key_attribute(name)
                    || self.key_schema.is_key_attribute(name)
                    || (*projection_type == ProjectionType::Include
                        && self.projection.non_key_attributes.contains(name))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn key_attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.key_schema.partition_key).chain(self.key_schema.sort_key.as_ref())
    }

    fn position(&self, table_key: &PrimaryKey, item: &Item) -> Option<(KeyValue, RangeKey)> {
        let hash = key_value(&self.key_schema.partition_key, item)?;
        let range = match &self.key_schema.sort_key {
            Some(sort_key) => Some(key_value(sort_key, item)?),
            None => None,
        };
        Some((
            hash,
            RangeKey {
                range,
                table_key: Some(table_key.clone()),
            },
        ))
    }
}

fn key_value(attr: &KeyAttribute, item: &Item) -> Option<KeyValue> {
    item.get(&attr.name)
        .filter(|v| attr.attr_type.matches(v) && !v.is_empty_scalar())
        .and_then(KeyValue::from_attribute)
}
