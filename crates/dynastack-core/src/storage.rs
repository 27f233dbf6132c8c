//! In-memory item storage for DynamoDB tables.
//!
//! Items are kept in an [`ItemTree`]: a [`BTreeMap`] of hash-key values to an
//! ordered group of items, keyed by [`RangeKey`]. The same structure backs
//! both the primary index and every secondary index, so the query engine
//! walks them identically.
//!
//! # Architecture
//!
//! ```text
//! BTreeMap<KeyValue, BTreeMap<RangeKey, Item>>
//! ```
//!
//! - Hash groups are ordered by hash-key value, so scans are deterministic.
//! - Within a group, items are ordered by range key ([`KeyValue`] implements
//!   [`Ord`] following DynamoDB comparison rules), then by the owning table
//!   key for secondary indexes whose keys are not unique.
//! - For tables without a range key the group holds a single entry whose
//!   range is `None`.
//!
//! Synchronization is the caller's concern: a table's storage and indexes
//! live together behind one lock (see [`crate::state`]).

use std::collections::{BTreeMap, btree_map};
use std::ops::Bound;

use thiserror::Error;
use tracing::debug;

use dynastack_model::types::{AttributeDefinition, Item, KeySchemaElement, KeyType, ScalarAttributeType};
use dynastack_model::{AttributeValue, Number, NumberError};

/// Largest item a write may store (400 KB).
pub const MAX_ITEM_SIZE: u64 = 400 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
///
/// Messages are the exact `ValidationException` text DynamoDB returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A required key attribute was not found in the item.
    #[error("One or more parameter values were invalid: Missing the key {attr} in the item")]
    MissingKeyAttribute { attr: String },
    /// A key attribute has the wrong type.
    #[error(
        "One or more parameter values were invalid: Type mismatch for key {attr} expected: {expected} actual: {actual}"
    )]
    InvalidKeyType {
        attr: String,
        expected: String,
        actual: String,
    },
    /// A key attribute is an empty string or binary.
    #[error(
        "One or more parameter values were invalid: An AttributeValue may not contain an empty string. Key: {attr}"
    )]
    EmptyKeyAttribute { attr: String },
    /// A `Key` parameter does not name exactly the table's key attributes.
    #[error("The provided key element does not match the schema")]
    KeySchemaMismatch,
    /// An `ExclusiveStartKey` does not hold the keys of the index being read.
    #[error("The provided starting key is invalid: The provided key element does not match the schema")]
    InvalidStartKey,
    /// A query's `ExclusiveStartKey` names a different hash key.
    #[error("The provided starting key is outside query boundaries based on provided conditions")]
    StartKeyOutOfBounds,
    /// A secondary-index key attribute has the wrong type.
    #[error(
        "One or more parameter values were invalid: Type mismatch for Index Key {attr} Expected: {expected} Actual: {actual} IndexName: {index}"
    )]
    IndexKeyTypeMismatch {
        attr: String,
        expected: String,
        actual: String,
        index: String,
    },
    /// A put wrote an empty string or binary into a secondary-index key.
    #[error(
        "One or more parameter values are not valid. A value specified for a secondary index key is not supported. The AttributeValue for a key attribute cannot contain an empty string value. IndexName: {index}, IndexKey: {attr}"
    )]
    EmptyIndexKey { index: String, attr: String },
    /// An update wrote an empty string or binary into a secondary-index key.
    #[error(
        "One or more parameter values are not valid. The update expression attempted to update a secondary index key to a value that is not supported. The AttributeValue for a key attribute cannot contain an empty string value."
    )]
    EmptyIndexKeyOnUpdate,
    /// A put item exceeds the size ceiling.
    #[error("Item size has exceeded the maximum allowed size")]
    ItemTooLarge,
    /// An updated item exceeds the size ceiling.
    #[error("Item size to update has exceeded the maximum allowed size")]
    UpdatedItemTooLarge,
    /// A number in a key does not parse.
    #[error(transparent)]
    Number(#[from] NumberError),
}

// ---------------------------------------------------------------------------
// Key types
// ---------------------------------------------------------------------------

/// Parsed key schema for a table or index, containing the partition key
/// definition and an optional sort key definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (HASH) key name and type.
    pub partition_key: KeyAttribute,
    /// Optional sort (RANGE) key name and type.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Resolve key schema elements against attribute definitions.
    ///
    /// Returns `None` if an element has no definition or there is no HASH element.
    #[must_use]
    pub fn resolve(
        elements: &[KeySchemaElement],
        definitions: &[AttributeDefinition],
    ) -> Option<Self> {
        let lookup = |key_type: KeyType| -> Option<Option<KeyAttribute>> {
            let Some(element) = elements.iter().find(|e| e.key_type == key_type) else {
                return Some(None);
            };
            let definition = definitions
                .iter()
                .find(|d| d.attribute_name == element.attribute_name)?;
            Some(Some(KeyAttribute {
                name: element.attribute_name.clone(),
                attr_type: definition.attribute_type.clone(),
            }))
        };
        Some(Self {
            partition_key: lookup(KeyType::Hash)??,
            sort_key: lookup(KeyType::Range)?,
        })
    }

    /// Names of the key attributes, hash first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.name.as_str())
            .chain(self.sort_key.as_ref().map(|k| k.name.as_str()))
    }

    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    /// Copy only the key attributes out of an item.
    #[must_use]
    pub fn key_of(&self, item: &Item) -> Item {
        self.names()
            .filter_map(|n| item.get(n).map(|v| (n.to_owned(), v.clone())))
            .collect()
    }

    /// The key schema elements in wire form.
    #[must_use]
    pub fn elements(&self) -> Vec<KeySchemaElement> {
        std::iter::once((&self.partition_key, KeyType::Hash))
            .chain(self.sort_key.as_ref().map(|k| (k, KeyType::Range)))
            .map(|(k, key_type)| KeySchemaElement {
                attribute_name: k.name.clone(),
                key_type,
            })
            .collect()
    }
}

/// A single key attribute definition with its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type (S, N, or B).
    pub attr_type: ScalarAttributeType,
}

/// A key-eligible attribute value with DynamoDB ordering.
///
/// - **Strings (S)**: UTF-8 byte ordering.
/// - **Numbers (N)**: exact numeric ordering via [`Number`].
/// - **Binary (B)**: unsigned byte ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// String key.
    S(String),
    /// Number key.
    N(Number),
    /// Binary key.
    B(bytes::Bytes),
}

impl KeyValue {
    /// Convert a scalar attribute value. Returns `None` for other types and
    /// for numbers that do not parse.
    #[must_use]
    pub fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(s) => Some(Self::S(s.clone())),
            AttributeValue::N(n) => n.parse().ok().map(Self::N),
            AttributeValue::B(b) => Some(Self::B(b.clone())),
            _ => None,
        }
    }

    /// A hash of the value that is stable across runs, used to assign
    /// hash groups to parallel scan segments.
    #[must_use]
    pub fn stable_hash(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        match self {
            Self::S(s) => {
                hasher.update(b"S");
                hasher.update(s.as_bytes());
            }
            Self::N(n) => {
                hasher.update(b"N");
                hasher.update(n.to_string().as_bytes());
            }
            Self::B(b) => {
                hasher.update(b"B");
                hasher.update(b);
            }
        }
        hasher.finalize()
    }
}

/// A primary key consisting of a partition key and an optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    /// The partition (HASH) key value.
    pub partition_key: KeyValue,
    /// The optional sort (RANGE) key value.
    pub sort_key: Option<KeyValue>,
}

impl PrimaryKey {
    /// The position of this key within the primary [`ItemTree`].
    #[must_use]
    pub fn range_key(&self) -> RangeKey {
        RangeKey {
            range: self.sort_key.clone(),
            table_key: None,
        }
    }
}

/// Position of an item within its hash group.
///
/// Secondary indexes set `table_key` so items sharing an index key still
/// have a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeKey {
    /// Range-key value, `None` for hash-only schemas.
    pub range: Option<KeyValue>,
    /// The owning item's table key (secondary indexes only).
    pub table_key: Option<PrimaryKey>,
}

// ---------------------------------------------------------------------------
// ItemTree
// ---------------------------------------------------------------------------

/// One hash group, ordered by [`RangeKey`].
pub type Group = BTreeMap<RangeKey, Item>;

/// Items grouped by hash key and ordered by range key.
#[derive(Debug, Clone, Default)]
pub struct ItemTree {
    groups: BTreeMap<KeyValue, Group>,
    len: usize,
}

impl ItemTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert or replace an item, returning the replaced one.
    pub fn insert(&mut self, hash: KeyValue, range: RangeKey, item: Item) -> Option<Item> {
        let old = self.groups.entry(hash).or_default().insert(range, item);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Remove an item, dropping its group when it becomes empty.
    pub fn remove(&mut self, hash: &KeyValue, range: &RangeKey) -> Option<Item> {
        let group = self.groups.get_mut(hash)?;
        let removed = group.remove(range)?;
        if group.is_empty() {
            self.groups.remove(hash);
        }
        self.len -= 1;
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, hash: &KeyValue, range: &RangeKey) -> Option<&Item> {
        self.groups.get(hash)?.get(range)
    }

    /// The group for one hash-key value.
    #[must_use]
    pub fn group(&self, hash: &KeyValue) -> Option<&Group> {
        self.groups.get(hash)
    }

    /// Groups in hash-key order, starting at `start` (inclusive) when given.
    pub fn groups_from(&self, start: Option<&KeyValue>) -> btree_map::Range<'_, KeyValue, Group> {
        let lower = start.map_or(Bound::Unbounded, |h| Bound::Included(h.clone()));
        self.groups.range((lower, Bound::Unbounded))
    }

    /// Every item in hash then range order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyValue, &RangeKey, &Item)> {
        self.groups
            .iter()
            .flat_map(|(h, group)| group.iter().map(move |(r, item)| (h, r, item)))
    }
}

// ---------------------------------------------------------------------------
// TableStorage
// ---------------------------------------------------------------------------

/// Primary item storage for a single DynamoDB table.
#[derive(Debug, Clone)]
pub struct TableStorage {
    /// The key schema for this table.
    key_schema: KeySchema,
    /// Items in primary-key order.
    items: ItemTree,
    /// Total size of all items in bytes, following DynamoDB rules.
    total_size: u64,
}

impl TableStorage {
    /// Creates a new empty `TableStorage` with the given key schema.
    #[must_use]
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            key_schema,
            items: ItemTree::new(),
            total_size: 0,
        }
    }

    /// Returns a reference to the key schema.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Returns the current item count.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    /// Returns the total size of all items in bytes.
    #[must_use]
    pub fn total_size_bytes(&self) -> u64 {
        self.total_size
    }

    /// The ordered items.
    #[must_use]
    pub fn items(&self) -> &ItemTree {
        &self.items
    }

    /// Inserts or replaces an item in the table.
    ///
    /// Returns the previously stored item if one existed with the same key.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if a key attribute is missing, mistyped or empty.
    pub fn put_item(&mut self, item: Item) -> Result<Option<Item>, StorageError> {
        let key = extract_primary_key(&self.key_schema, &item)?;
        let new_size = calculate_item_size(&item);
        let range = key.range_key();

        let old = self.items.insert(key.partition_key, range, item);
        if let Some(old) = &old {
            let old_size = calculate_item_size(old);
            self.total_size = self.total_size + new_size - old_size;
            debug!(old_size, new_size, "replaced existing item");
        } else {
            self.total_size += new_size;
            debug!(new_size, "inserted new item");
        }
        Ok(old)
    }

    /// Retrieves an item by its primary key.
    #[must_use]
    pub fn get_item(&self, key: &PrimaryKey) -> Option<&Item> {
        self.items.get(&key.partition_key, &key.range_key())
    }

    /// Deletes an item by its primary key, returning it if it existed.
    pub fn delete_item(&mut self, key: &PrimaryKey) -> Option<Item> {
        let removed = self.items.remove(&key.partition_key, &key.range_key())?;
        let size = calculate_item_size(&removed);
        self.total_size -= size;
        debug!(size, "deleted item");
        Some(removed)
    }
}

// ---------------------------------------------------------------------------
// Key extraction
// ---------------------------------------------------------------------------

/// Extracts the primary key from an item according to the key schema.
///
/// # Errors
///
/// Returns `StorageError::MissingKeyAttribute`, `InvalidKeyType` or
/// `EmptyKeyAttribute` for the first offending key attribute.
pub fn extract_primary_key(key_schema: &KeySchema, item: &Item) -> Result<PrimaryKey, StorageError> {
    let partition_key = item_key_value(&key_schema.partition_key, item)?;
    let sort_key = key_schema
        .sort_key
        .as_ref()
        .map(|sk| item_key_value(sk, item))
        .transpose()?;
    Ok(PrimaryKey {
        partition_key,
        sort_key,
    })
}

fn item_key_value(attr: &KeyAttribute, item: &Item) -> Result<KeyValue, StorageError> {
    let value = item
        .get(&attr.name)
        .ok_or_else(|| StorageError::MissingKeyAttribute {
            attr: attr.name.clone(),
        })?;
    if !attr.attr_type.matches(value) {
        return Err(StorageError::InvalidKeyType {
            attr: attr.name.clone(),
            expected: attr.attr_type.to_string(),
            actual: value.type_descriptor().to_owned(),
        });
    }
    if value.is_empty_scalar() {
        return Err(StorageError::EmptyKeyAttribute {
            attr: attr.name.clone(),
        });
    }
    to_key_value(value)
}

/// Parses a `Key` request parameter, which must hold exactly the key attributes.
///
/// # Errors
///
/// Returns `StorageError::KeySchemaMismatch` when attributes are missing,
/// extra or mistyped, and `EmptyKeyAttribute` for an empty key value.
pub fn parse_key(key_schema: &KeySchema, key: &Item) -> Result<PrimaryKey, StorageError> {
    let expected = 1 + usize::from(key_schema.sort_key.is_some());
    if key.len() != expected {
        return Err(StorageError::KeySchemaMismatch);
    }
    match extract_primary_key(key_schema, key) {
        Err(StorageError::MissingKeyAttribute { .. } | StorageError::InvalidKeyType { .. }) => {
            Err(StorageError::KeySchemaMismatch)
        }
        other => other,
    }
}

fn to_key_value(value: &AttributeValue) -> Result<KeyValue, StorageError> {
    match value {
        AttributeValue::N(n) => Ok(KeyValue::N(n.parse()?)),
        other => KeyValue::from_attribute(other).ok_or_else(|| StorageError::InvalidKeyType {
            attr: String::new(),
            expected: "S, N, or B".to_owned(),
            actual: other.type_descriptor().to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Item size calculation
// ---------------------------------------------------------------------------

/// Reject items above [`MAX_ITEM_SIZE`].
///
/// # Errors
///
/// Returns `ItemTooLarge` for puts, `UpdatedItemTooLarge` for updates.
pub fn check_item_size(item: &Item, max_size: u64, for_update: bool) -> Result<(), StorageError> {
    if calculate_item_size(item) <= max_size {
        return Ok(());
    }
    Err(if for_update {
        StorageError::UpdatedItemTooLarge
    } else {
        StorageError::ItemTooLarge
    })
}

/// Calculates the size of a DynamoDB item in bytes, following DynamoDB's
/// item size calculation rules.
///
/// Each attribute contributes: `len(attribute_name) + size(attribute_value)`.
///
/// Value sizes:
/// - **S**: length of the UTF-8 string
/// - **N**: `significant_digits.div_ceil(2) + 1`
/// - **B**: byte length
/// - **Bool / Null**: 1 byte
/// - **SS / NS / BS**: sum of element sizes
/// - **L**: `3 + sum(1 + element_size)` for each element
/// - **M**: `3 + sum(key_len + 1 + value_size)` for each entry
#[must_use]
pub fn calculate_item_size(item: &Item) -> u64 {
    item.iter()
        .map(|(name, value)| name.len() as u64 + calculate_value_size(value))
        .sum()
}

fn number_size(n: &str) -> u64 {
    let digits = n
        .parse::<Number>()
        .map_or(n.len(), |num| num.significant_digits());
    (digits.div_ceil(2) + 1) as u64
}

/// Calculates the size of a single attribute value.
#[must_use]
fn calculate_value_size(value: &AttributeValue) -> u64 {
    match value {
        AttributeValue::S(s) => s.len() as u64,
        AttributeValue::N(n) => number_size(n),
        AttributeValue::B(b) => b.len() as u64,
        AttributeValue::Bool(_) | AttributeValue::Null(_) => 1,
        AttributeValue::Ss(v) => v.iter().map(|s| s.len() as u64).sum(),
        AttributeValue::Ns(v) => v.iter().map(|n| number_size(n)).sum(),
        AttributeValue::Bs(v) => v.iter().map(|b| b.len() as u64).sum(),
        AttributeValue::L(list) => {
            3 + list
                .iter()
                .map(|elem| 1 + calculate_value_size(elem))
                .sum::<u64>()
        }
        AttributeValue::M(map) => {
            3 + map
                .iter()
                .map(|(k, v)| k.len() as u64 + 1 + calculate_value_size(v))
                .sum::<u64>()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
