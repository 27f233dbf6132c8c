//! On-demand backups.
//!
//! A backup is a deep copy of a table's definition and data taken under the
//! table's read lock. Restoring builds a fresh table from that copy, so the
//! source table, the backup and every restored table own separate storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use dynastack_model::error::DynamoDBError;
use dynastack_model::types::{
    AttributeDefinition, BackupDescription, BackupDetails, BackupStatus, BackupSummary,
    BackupType, BackupTypeFilter, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    LocalSecondaryIndex, ProvisionedThroughput, RestoreSummary, SecondaryIndexInfo,
    SourceTableDetails, SourceTableFeatureDetails, TableStatus,
};

use crate::state::{DynamoDBTable, TableData, clamp_i64, epoch_seconds};
use crate::storage::{StorageError, calculate_item_size};

/// A stored backup: metadata plus the copied table.
#[derive(Debug)]
pub struct BackupRecord {
    /// Backup ARN.
    pub arn: String,
    /// Caller-supplied backup name.
    pub name: String,
    /// When the backup was taken.
    pub created_at: DateTime<Utc>,
    /// Summed size of the copied items.
    pub size_bytes: u64,
    /// Source table name.
    pub table_name: String,
    /// Source table ARN.
    pub table_arn: String,
    /// Source table id.
    pub table_id: String,
    /// Source table creation time.
    pub table_created_at: DateTime<Utc>,
    /// Source key schema.
    pub key_schema_elements: Vec<KeySchemaElement>,
    /// Source attribute definitions.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Source billing mode.
    pub billing_mode: BillingMode,
    /// Source provisioned throughput.
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Source global secondary indexes.
    pub gsi_definitions: Vec<GlobalSecondaryIndex>,
    /// Source local secondary indexes.
    pub lsi_definitions: Vec<LocalSecondaryIndex>,
    /// The copied items and indexes.
    pub data: TableData,
}

impl BackupRecord {
    /// Copy `table` into a new backup.
    #[must_use]
    pub fn capture(table: &DynamoDBTable, name: String) -> Self {
        let created_at = Utc::now();
        let data = table.data.read().clone();
        let size_bytes = data
            .storage
            .items()
            .iter()
            .map(|(_, _, item)| calculate_item_size(item))
            .sum();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let arn = format!(
            "{}/backup/{:017}-{}",
            table.arn,
            created_at.timestamp_millis(),
            &suffix[..8]
        );
        Self {
            arn,
            name,
            created_at,
            size_bytes,
            table_name: table.name.clone(),
            table_arn: table.arn.clone(),
            table_id: table.table_id.clone(),
            table_created_at: table.created_at,
            key_schema_elements: table.key_schema_elements.clone(),
            attribute_definitions: table.attribute_definitions.clone(),
            billing_mode: table.billing_mode.clone(),
            provisioned_throughput: table.provisioned_throughput.clone(),
            gsi_definitions: table.gsi_definitions.clone(),
            lsi_definitions: table.lsi_definitions.clone(),
            data,
        }
    }

    /// The `BackupDetails` with the given status.
    #[must_use]
    pub fn details(&self, status: BackupStatus) -> BackupDetails {
        BackupDetails {
            backup_arn: self.arn.clone(),
            backup_name: self.name.clone(),
            backup_size_bytes: Some(clamp_i64(self.size_bytes)),
            backup_status: status,
            backup_type: BackupType::User,
            backup_creation_date_time: epoch_seconds(self.created_at),
        }
    }

    /// The full `BackupDescription` with the given status.
    #[must_use]
    pub fn description(&self, status: BackupStatus) -> BackupDescription {
        BackupDescription {
            backup_details: self.details(status),
            source_table_details: SourceTableDetails {
                table_name: self.table_name.clone(),
                table_id: self.table_id.clone(),
                table_arn: Some(self.table_arn.clone()),
                table_size_bytes: Some(clamp_i64(self.size_bytes)),
                key_schema: self.key_schema_elements.clone(),
                table_creation_date_time: epoch_seconds(self.table_created_at),
                provisioned_throughput: self.provisioned_throughput.clone().unwrap_or_default(),
                item_count: Some(clamp_i64(self.data.storage.item_count())),
                billing_mode: Some(self.billing_mode.clone()),
            },
            source_table_feature_details: SourceTableFeatureDetails {
                local_secondary_indexes: self
                    .lsi_definitions
                    .iter()
                    .map(|lsi| SecondaryIndexInfo {
                        index_name: lsi.index_name.clone(),
                        key_schema: lsi.key_schema.clone(),
                        projection: lsi.projection.clone(),
                    })
                    .collect(),
                global_secondary_indexes: self
                    .gsi_definitions
                    .iter()
                    .map(|gsi| SecondaryIndexInfo {
                        index_name: gsi.index_name.clone(),
                        key_schema: gsi.key_schema.clone(),
                        projection: gsi.projection.clone(),
                    })
                    .collect(),
            },
        }
    }

    /// The `ListBackups` entry for this backup.
    #[must_use]
    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            table_name: Some(self.table_name.clone()),
            table_id: Some(self.table_id.clone()),
            table_arn: Some(self.table_arn.clone()),
            backup_arn: Some(self.arn.clone()),
            backup_name: Some(self.name.clone()),
            backup_creation_date_time: Some(epoch_seconds(self.created_at)),
            backup_status: Some(BackupStatus::Available),
            backup_type: Some(BackupType::User),
            backup_size_bytes: Some(clamp_i64(self.size_bytes)),
        }
    }

    /// Build a new table named `target_name` from this backup.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the copied items cannot be re-indexed.
    pub fn restore(&self, target_name: String, target_arn: String) -> Result<DynamoDBTable, StorageError> {
        let now = Utc::now();
        Ok(DynamoDBTable {
            name: target_name,
            status: TableStatus::Active,
            key_schema_elements: self.key_schema_elements.clone(),
            attribute_definitions: self.attribute_definitions.clone(),
            billing_mode: self.billing_mode.clone(),
            provisioned_throughput: self.provisioned_throughput.clone(),
            gsi_definitions: self.gsi_definitions.clone(),
            lsi_definitions: self.lsi_definitions.clone(),
            arn: target_arn,
            table_id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            restore_summary: Some(RestoreSummary {
                source_backup_arn: Some(self.arn.clone()),
                source_table_arn: Some(self.table_arn.clone()),
                restore_date_time: epoch_seconds(now),
                restore_in_progress: false,
            }),
            data: RwLock::new(self.data.rebuilt()?),
        })
    }
}

/// All backups keyed by ARN.
#[derive(Debug, Default)]
pub struct BackupStore {
    backups: DashMap<String, Arc<BackupRecord>>,
}

impl BackupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a backup of `table`.
    pub fn create(&self, table: &DynamoDBTable, name: String) -> Arc<BackupRecord> {
        let record = Arc::new(BackupRecord::capture(table, name));
        self.backups.insert(record.arn.clone(), Arc::clone(&record));
        debug!(backup = %record.arn, table = %table.name, "stored backup");
        record
    }

    /// Look up a backup or return `BackupNotFoundException`.
    pub fn get(&self, arn: &str) -> Result<Arc<BackupRecord>, DynamoDBError> {
        self.backups
            .get(arn)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| DynamoDBError::backup_not_found(arn))
    }

    /// Remove a backup or return `BackupNotFoundException`.
    pub fn delete(&self, arn: &str) -> Result<Arc<BackupRecord>, DynamoDBError> {
        self.backups
            .remove(arn)
            .map(|(_, r)| r)
            .ok_or_else(|| DynamoDBError::backup_not_found(arn))
    }

    /// Backups ordered by creation time, optionally for one table.
    #[must_use]
    pub fn list(&self, table_name: Option<&str>, filter: &BackupTypeFilter) -> Vec<Arc<BackupRecord>> {
        let mut records: Vec<Arc<BackupRecord>> = self
            .backups
            .iter()
            .filter(|r| table_name.is_none_or(|name| r.table_name == name))
            .filter(|_| filter.accepts(&BackupType::User))
            .map(|r| Arc::clone(r.value()))
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.arn.cmp(&b.arn)));
        records
    }

    /// Remove every backup.
    pub fn reset(&self) {
        self.backups.clear();
    }
}
