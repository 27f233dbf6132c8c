//! DynamoDB service state management.
//!
//! [`DynamoDBServiceState`] maps table names to [`DynamoDBTable`] handles.
//! Each table keeps its item store and secondary indexes together in one
//! [`TableData`] behind a single `RwLock`, so a write updates the store and
//! every index in the same critical section.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use dynastack_model::error::DynamoDBError;
use dynastack_model::types::{
    AttributeDefinition, BillingMode, BillingModeSummary, GlobalSecondaryIndex,
    GlobalSecondaryIndexDescription, IndexStatus, Item, KeySchemaElement, LocalSecondaryIndex,
    LocalSecondaryIndexDescription, ProvisionedThroughput, ProvisionedThroughputDescription,
    RestoreSummary, TableDescription, TableStatus,
};

use crate::index::SecondaryIndex;
use crate::query::IndexView;
use crate::storage::{
    KeySchema, PrimaryKey, StorageError, TableStorage, check_item_size, extract_primary_key,
};

/// Top-level DynamoDB service state.
#[derive(Debug)]
pub struct DynamoDBServiceState {
    /// All tables keyed by name.
    tables: DashMap<String, Arc<DynamoDBTable>>,
}

impl DynamoDBServiceState {
    /// Create a new empty service state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Get a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Arc<DynamoDBTable>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Get a table for an item operation or return `ResourceNotFoundException`.
    pub fn require_table(&self, name: &str) -> Result<Arc<DynamoDBTable>, DynamoDBError> {
        self.get_table(name)
            .ok_or_else(|| DynamoDBError::resource_not_found("Requested resource not found"))
    }

    /// Get a table for an admin operation, naming it in the error.
    pub fn require_named_table(&self, name: &str) -> Result<Arc<DynamoDBTable>, DynamoDBError> {
        self.get_table(name).ok_or_else(|| table_not_found(name))
    }

    /// Insert a new table. Returns `ResourceInUseException` if the name is taken.
    pub fn create_table(&self, table: DynamoDBTable) -> Result<Arc<DynamoDBTable>, DynamoDBError> {
        match self.tables.entry(table.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(DynamoDBError::resource_in_use(
                format!("Table already exists: {}", e.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let table = Arc::new(table);
                e.insert(Arc::clone(&table));
                debug!(table = %table.name, "registered table");
                Ok(table)
            }
        }
    }

    /// Remove a table by name. Returns the removed table.
    pub fn delete_table(&self, name: &str) -> Result<Arc<DynamoDBTable>, DynamoDBError> {
        self.tables
            .remove(name)
            .map(|(_, t)| t)
            .ok_or_else(|| table_not_found(name))
    }

    /// List all table names (sorted).
    #[must_use]
    pub fn list_table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Remove every table.
    pub fn reset(&self) {
        self.tables.clear();
    }
}

impl Default for DynamoDBServiceState {
    fn default() -> Self {
        Self::new()
    }
}

fn table_not_found(name: &str) -> DynamoDBError {
    DynamoDBError::resource_not_found(format!(
        "Requested resource not found: Table: {name} not found"
    ))
}

/// The mutable contents of a table: items plus secondary indexes.
#[derive(Debug, Clone)]
pub struct TableData {
    /// Primary item store.
    pub storage: TableStorage,
    /// Secondary indexes, GSIs then LSIs in definition order.
    pub indexes: Vec<SecondaryIndex>,
}

impl TableData {
    #[must_use]
    pub fn new(key_schema: KeySchema, indexes: Vec<SecondaryIndex>) -> Self {
        Self {
            storage: TableStorage::new(key_schema),
            indexes,
        }
    }

    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        self.storage.key_schema()
    }

    /// Look up a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.iter().find(|i| i.name() == name)
    }

    /// Comma separated index names, for error messages.
    #[must_use]
    pub fn index_names(&self) -> String {
        self.indexes
            .iter()
            .map(SecondaryIndex::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The primary index, or the named secondary index.
    #[must_use]
    pub fn view(&self, index_name: Option<&str>) -> Option<IndexView<'_>> {
        let table_schema = self.storage.key_schema();
        match index_name {
            None => Some(IndexView {
                name: None,
                key_schema: table_schema,
                table_schema,
                items: self.storage.items(),
            }),
            Some(name) => self.index(name).map(|index| IndexView {
                name: Some(index.name()),
                key_schema: index.key_schema(),
                table_schema,
                items: index.items(),
            }),
        }
    }

    /// A deep copy with every index rebuilt from the stored items.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a stored item no longer carries its key.
    pub fn rebuilt(&self) -> Result<Self, StorageError> {
        let indexes = self
            .indexes
            .iter()
            .map(|index| {
                SecondaryIndex::new(
                    index.name().to_owned(),
                    index.kind(),
                    index.key_schema().clone(),
                    index.projection().clone(),
                )
            })
            .collect();
        let mut copy = Self::new(self.key_schema().clone(), indexes);
        for (_, _, item) in self.storage.items().iter() {
            copy.put(item.clone())?;
        }
        Ok(copy)
    }

    /// Returns the stored item for `key`.
    #[must_use]
    pub fn get(&self, key: &PrimaryKey) -> Option<&Item> {
        self.storage.get_item(key)
    }

    /// Check an item before it is written: table keys, index keys and size.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` found.
    pub fn validate(&self, item: &Item, max_item_size: u64, for_update: bool) -> Result<PrimaryKey, StorageError> {
        let key = extract_primary_key(self.key_schema(), item)?;
        for index in &self.indexes {
            index.validate_item(item, for_update)?;
        }
        check_item_size(item, max_item_size, for_update)?;
        Ok(key)
    }

    /// Store an item and refresh every index, returning the replaced item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item's key is invalid.
    pub fn put(&mut self, item: Item) -> Result<Option<Item>, StorageError> {
        let key = extract_primary_key(self.key_schema(), &item)?;
        let table_schema = self.storage.key_schema().clone();
        for index in &mut self.indexes {
            if let Some(old) = self.storage.get_item(&key) {
                index.remove(&key, old);
            }
            index.insert(&table_schema, &key, &item);
        }
        self.storage.put_item(item)
    }

    /// Remove an item and its index entries.
    pub fn delete(&mut self, key: &PrimaryKey) -> Option<Item> {
        let removed = self.storage.delete_item(key)?;
        for index in &mut self.indexes {
            index.remove(key, &removed);
        }
        Some(removed)
    }
}

/// A single DynamoDB table with metadata and storage.
#[derive(Debug)]
pub struct DynamoDBTable {
    /// Table name.
    pub name: String,
    /// Table status.
    pub status: TableStatus,
    /// Key schema elements.
    pub key_schema_elements: Vec<KeySchemaElement>,
    /// Attribute definitions.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Billing mode.
    pub billing_mode: BillingMode,
    /// Provisioned throughput (accepted but not enforced).
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Global secondary index definitions.
    pub gsi_definitions: Vec<GlobalSecondaryIndex>,
    /// Local secondary index definitions.
    pub lsi_definitions: Vec<LocalSecondaryIndex>,
    /// Table ARN.
    pub arn: String,
    /// Stable table ID (UUID v4), assigned at creation time.
    pub table_id: String,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Set when the table was restored from a backup.
    pub restore_summary: Option<RestoreSummary>,
    /// Items and indexes.
    pub data: RwLock<TableData>,
}

impl DynamoDBTable {
    /// Creation time as epoch seconds.
    #[must_use]
    pub fn creation_time(&self) -> f64 {
        epoch_seconds(self.created_at)
    }

    /// Build a `TableDescription` from this table's metadata.
    #[must_use]
    pub fn to_description(&self) -> TableDescription {
        let creation_time = self.creation_time();
        let data = self.data.read();
        let index_stats = |name: &str| {
            data.index(name).map_or((0, 0), |index| {
                (clamp_i64(index.size_bytes()), clamp_i64(index.item_count()))
            })
        };
        TableDescription {
            table_name: Some(self.name.clone()),
            table_status: Some(self.status.clone()),
            key_schema: self.key_schema_elements.clone(),
            attribute_definitions: self.attribute_definitions.clone(),
            table_arn: Some(self.arn.clone()),
            table_id: Some(self.table_id.clone()),
            creation_date_time: Some(creation_time),
            item_count: Some(clamp_i64(data.storage.item_count())),
            table_size_bytes: Some(clamp_i64(data.storage.total_size_bytes())),
            billing_mode_summary: Some(BillingModeSummary {
                billing_mode: Some(self.billing_mode.clone()),
            }),
            provisioned_throughput: Some(self.provisioned_throughput_description()),
            global_secondary_indexes: self
                .gsi_definitions
                .iter()
                .map(|gsi| {
                    let (size, count) = index_stats(&gsi.index_name);
                    GlobalSecondaryIndexDescription {
                        index_name: Some(gsi.index_name.clone()),
                        key_schema: gsi.key_schema.clone(),
                        projection: Some(gsi.projection.clone()),
                        index_status: Some(IndexStatus::Active),
                        provisioned_throughput: gsi
                            .provisioned_throughput
                            .as_ref()
                            .map(ProvisionedThroughputDescription::from),
                        index_size_bytes: Some(size),
                        item_count: Some(count),
                        index_arn: Some(format!("{}/index/{}", self.arn, gsi.index_name)),
                    }
                })
                .collect(),
            local_secondary_indexes: self
                .lsi_definitions
                .iter()
                .map(|lsi| {
                    let (size, count) = index_stats(&lsi.index_name);
                    LocalSecondaryIndexDescription {
                        index_name: Some(lsi.index_name.clone()),
                        key_schema: lsi.key_schema.clone(),
                        projection: Some(lsi.projection.clone()),
                        index_size_bytes: Some(size),
                        item_count: Some(count),
                        index_arn: Some(format!("{}/index/{}", self.arn, lsi.index_name)),
                    }
                })
                .collect(),
            restore_summary: self.restore_summary.clone(),
        }
    }

    /// Build a stripped `TableDescription` for the `DeleteTable` response.
    ///
    /// `DeleteTable` omits the key schema, attribute definitions, creation
    /// time and index descriptions.
    #[must_use]
    pub fn to_delete_description(&self) -> TableDescription {
        let data = self.data.read();
        TableDescription {
            table_name: Some(self.name.clone()),
            table_status: Some(TableStatus::Deleting),
            table_arn: Some(self.arn.clone()),
            table_id: Some(self.table_id.clone()),
            item_count: Some(clamp_i64(data.storage.item_count())),
            table_size_bytes: Some(clamp_i64(data.storage.total_size_bytes())),
            billing_mode_summary: Some(BillingModeSummary {
                billing_mode: Some(self.billing_mode.clone()),
            }),
            provisioned_throughput: Some(self.provisioned_throughput_description()),
            ..Default::default()
        }
    }

    /// Build the `ProvisionedThroughputDescription` for this table.
    fn provisioned_throughput_description(&self) -> ProvisionedThroughputDescription {
        let mut description = self
            .provisioned_throughput
            .as_ref()
            .map(ProvisionedThroughputDescription::from)
            .unwrap_or_default();
        description.number_of_decreases_today = Some(0);
        description
    }
}

/// Epoch seconds with millisecond precision, as DynamoDB reports times.
#[must_use]
pub fn epoch_seconds(at: chrono::DateTime<chrono::Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)] // DynamoDB returns epoch seconds as f64
    let millis = at.timestamp_millis() as f64;
    millis / 1000.0
}

/// Saturating `u64` to `i64` conversion for wire counters.
#[must_use]
pub fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dynastack_model::AttributeValue;
    use dynastack_model::types::{Projection, ProjectionType, ScalarAttributeType};

    use super::*;
    use crate::index::IndexKind;
    use crate::storage::{KeyAttribute, KeyValue};

    fn attr(name: &str) -> KeyAttribute {
        KeyAttribute {
            name: name.to_owned(),
            attr_type: ScalarAttributeType::S,
        }
    }

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn data() -> TableData {
        let index = SecondaryIndex::new(
            "by_alt".to_owned(),
            IndexKind::Global,
            KeySchema {
                partition_key: attr("alt"),
                sort_key: None,
            },
            Projection {
                projection_type: Some(ProjectionType::All),
                non_key_attributes: Vec::new(),
            },
        );
        TableData::new(
            KeySchema {
                partition_key: attr("pk"),
                sort_key: None,
            },
            vec![index],
        )
    }

    fn item(pk: &str, alt: Option<&str>) -> Item {
        let mut item = HashMap::from([("pk".to_owned(), s(pk))]);
        if let Some(alt) = alt {
            item.insert("alt".to_owned(), s(alt));
        }
        item
    }

    fn index_count(data: &TableData) -> u64 {
        data.index("by_alt").unwrap().item_count()
    }

    #[test]
    fn test_should_keep_index_in_step_with_store() {
        let mut data = data();
        data.put(item("1", Some("a"))).unwrap();
        data.put(item("2", Some("a"))).unwrap();
        assert_eq!(index_count(&data), 2);

        // Moving the index key replaces the old entry.
        data.put(item("1", Some("b"))).unwrap();
        assert_eq!(index_count(&data), 2);
        let view = data.view(Some("by_alt")).unwrap();
        let under_a = KeyValue::S("a".to_owned());
        assert_eq!(view.items.group(&under_a).map_or(0, |g| g.len()), 1);

        // Dropping the index key drops the entry.
        data.put(item("1", None)).unwrap();
        assert_eq!(index_count(&data), 1);

        let key = extract_primary_key(data.key_schema(), &item("2", None)).unwrap();
        data.delete(&key);
        assert_eq!(index_count(&data), 0);
        assert_eq!(data.storage.item_count(), 1);
    }

    #[test]
    fn test_should_validate_index_keys_before_write() {
        let data = data();
        let err = data
            .validate(&item("1", Some("")), 400 * 1024, false)
            .unwrap_err();
        assert!(matches!(err, StorageError::EmptyIndexKey { .. }));
        assert!(data.validate(&item("1", Some("a")), 400 * 1024, false).is_ok());
    }

    #[test]
    fn test_should_report_unknown_index() {
        let data = data();
        assert!(data.view(Some("missing")).is_none());
        assert!(data.view(None).is_some());
        assert_eq!(data.index_names(), "by_alt");
    }

    #[test]
    fn test_should_register_and_remove_tables() {
        let state = DynamoDBServiceState::new();
        assert_eq!(
            state.require_table("t").unwrap_err().message,
            "Requested resource not found"
        );
        assert_eq!(
            state.delete_table("t").unwrap_err().message,
            "Requested resource not found: Table: t not found"
        );
        assert!(state.list_table_names().is_empty());
    }
}
