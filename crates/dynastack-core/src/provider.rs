//! DynamoDB provider implementing every supported operation.
//!
//! Each handler validates its input, rewrites legacy parameters into
//! expressions, binds the expressions to the request's placeholders and only
//! then takes the table lock. Mutations check, evaluate, write and refresh
//! indexes under one write lock, so a failure leaves the table untouched.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use dynastack_model::error::DynamoDBError;
use dynastack_model::input::{
    CreateBackupInput, CreateTableInput, DeleteBackupInput, DeleteItemInput, DeleteTableInput,
    DescribeBackupInput, DescribeTableInput, GetItemInput, ListBackupsInput, ListTablesInput,
    PutItemInput, QueryInput, RestoreTableFromBackupInput, ScanInput, UpdateItemInput,
};
use dynastack_model::output::{
    CreateBackupOutput, CreateTableOutput, DeleteBackupOutput, DeleteItemOutput,
    DeleteTableOutput, DescribeBackupOutput, DescribeTableOutput, GetItemOutput,
    ListBackupsOutput, ListTablesOutput, PutItemOutput, QueryOutput,
    RestoreTableFromBackupOutput, ScanOutput, UpdateItemOutput,
};
use dynastack_model::types::{
    AttributeDefinition, BackupStatus, BillingMode, Item, KeySchemaElement, KeyType,
    ProvisionedThroughput, ReturnValue, Select, TableStatus,
};
use dynastack_model::{AttributeValue, Number};

use crate::backup::BackupStore;
use crate::config::DynamoDBConfig;
use crate::error::{
    expression_error_to_dynamodb, legacy_error_to_dynamodb, storage_error_to_dynamodb,
};
use crate::expression::{
    DocumentPath, Expr, ExpressionKind, KeySlot, RequestExpressions, extract_key_condition,
    project,
};
use crate::index::{IndexKind, SecondaryIndex};
use crate::legacy::{LegacyExpressions, check_mixing, check_placeholders_used};
use crate::query::{self, PageLimits, ReadResult, Segment};
use crate::state::{DynamoDBServiceState, DynamoDBTable, TableData};
use crate::storage::{KeySchema, KeyValue, parse_key};

/// Largest `TotalSegments` a parallel scan accepts.
const MAX_TOTAL_SEGMENTS: i32 = 1_000_000;

/// Largest `Limit` for `ListTables`.
const MAX_LIST_TABLES_LIMIT: i32 = 100;

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a table name against DynamoDB rules: 3-255 characters, `[a-zA-Z0-9._-]+`.
fn validate_table_name(name: &str) -> Result<(), DynamoDBError> {
    if name.len() < 3 || name.len() > 255 {
        return Err(DynamoDBError::validation(format!(
            "TableName must be at least 3 characters long and at most 255 characters long, \
             but was {} characters",
            name.len()
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
    {
        return Err(DynamoDBError::validation(format!(
            "1 validation error detected: Value '{name}' at 'tableName' failed to satisfy \
             constraint: Member must satisfy regular expression pattern: [a-zA-Z0-9_.-]+"
        )));
    }
    Ok(())
}

fn parse_number(text: &str) -> Result<Number, DynamoDBError> {
    text.parse::<Number>()
        .map_err(|e| DynamoDBError::validation(e.to_string()))
}

/// Check numbers and sets inside a value, recursively, rewriting every
/// number into its canonical form.
fn canonicalize_value(value: &mut AttributeValue) -> Result<(), DynamoDBError> {
    match value {
        AttributeValue::N(n) => {
            *n = parse_number(n)?.to_string();
            Ok(())
        }
        AttributeValue::Ns(ns) => {
            let numbers = ns
                .iter()
                .map(|n| parse_number(n))
                .collect::<Result<Vec<_>, _>>()?;
            check_set(&numbers, "number", value)?;
            *value = AttributeValue::Ns(numbers.iter().map(ToString::to_string).collect());
            Ok(())
        }
        AttributeValue::Ss(_) | AttributeValue::Bs(_) => check_plain_set(value),
        AttributeValue::L(list) => list.iter_mut().try_for_each(canonicalize_value),
        AttributeValue::M(map) => map.values_mut().try_for_each(canonicalize_value),
        _ => Ok(()),
    }
}

fn check_plain_set(value: &AttributeValue) -> Result<(), DynamoDBError> {
    match value {
        AttributeValue::Ss(ss) => check_set(ss, "string", value),
        AttributeValue::Bs(bs) => check_set(bs, "binary", value),
        _ => Ok(()),
    }
}

fn check_set<T: Eq + Hash>(
    elements: &[T],
    set_type: &str,
    value: &AttributeValue,
) -> Result<(), DynamoDBError> {
    if elements.is_empty() {
        return Err(DynamoDBError::validation(format!(
            "One or more parameter values were invalid: An {set_type} set  may not be empty"
        )));
    }
    let mut seen = HashSet::with_capacity(elements.len());
    if elements.iter().all(|e| seen.insert(e)) {
        Ok(())
    } else {
        Err(DynamoDBError::validation(format!(
            "One or more parameter values were invalid: Input collection {value} contains duplicates."
        )))
    }
}

fn canonicalize_item(item: &mut Item) -> Result<(), DynamoDBError> {
    item.values_mut().try_for_each(canonicalize_value)
}

fn canonicalize_expression_values(
    values: &mut HashMap<String, AttributeValue>,
) -> Result<(), DynamoDBError> {
    for (key, value) in values {
        canonicalize_value(value).map_err(|e| {
            DynamoDBError::validation(format!(
                "ExpressionAttributeValues contains invalid value: {} for key {key}",
                e.message
            ))
        })?;
    }
    Ok(())
}

/// `NONE`/`ALL_OLD` are always allowed; the rest only on `UpdateItem`.
fn validate_return_values(
    return_values: Option<&ReturnValue>,
    allow_updated: bool,
) -> Result<(), DynamoDBError> {
    match return_values {
        None | Some(ReturnValue::None | ReturnValue::AllOld) => Ok(()),
        Some(ReturnValue::AllNew | ReturnValue::UpdatedOld | ReturnValue::UpdatedNew)
            if allow_updated =>
        {
            Ok(())
        }
        Some(_) => Err(DynamoDBError::validation("Return values set to invalid value")),
    }
}

fn validate_limit(limit: Option<i32>) -> Result<Option<usize>, DynamoDBError> {
    match limit {
        None => Ok(None),
        Some(limit) => usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .map(Some)
            .ok_or_else(|| DynamoDBError::validation("Limit must be greater than 0")),
    }
}

/// Validate the `Select` parameter for Query/Scan, checking conflicts with
/// `ProjectionExpression` and `AttributesToGet`.
///
/// Returns `true` when only a count is requested.
fn validate_select(
    select: Option<&Select>,
    on_index: bool,
    has_projection: bool,
    has_attributes_to_get: bool,
) -> Result<bool, DynamoDBError> {
    let Some(select) = select else {
        return Ok(false);
    };
    match select {
        Select::Unknown(value) => {
            return Err(DynamoDBError::validation(format!(
                "1 validation error detected: Value '{value}' at 'select' failed to satisfy \
                 constraint: Member must satisfy enum value set: [SPECIFIC_ATTRIBUTES, COUNT, \
                 ALL_ATTRIBUTES, ALL_PROJECTED_ATTRIBUTES]"
            )));
        }
        Select::AllProjectedAttributes if !on_index => {
            return Err(DynamoDBError::validation(
                "ALL_PROJECTED_ATTRIBUTES is only supported for queries on secondary indexes",
            ));
        }
        Select::SpecificAttributes => {
            if !has_projection && !has_attributes_to_get {
                return Err(DynamoDBError::validation(
                    "SPECIFIC_ATTRIBUTES requires either ProjectionExpression or AttributesToGet",
                ));
            }
        }
        Select::AllAttributes | Select::AllProjectedAttributes | Select::Count => {
            if has_attributes_to_get {
                return Err(DynamoDBError::validation(format!(
                    "Cannot specify the AttributesToGet when choosing to get {} results",
                    select.as_str()
                )));
            }
            if has_projection {
                return Err(DynamoDBError::validation(format!(
                    "Cannot specify the ProjectionExpression when choosing to get {} results",
                    select.as_str()
                )));
            }
        }
    }
    Ok(*select == Select::Count)
}

/// Validate `Segment` / `TotalSegments`.
fn validate_parallel_scan(
    segment: Option<i32>,
    total_segments: Option<i32>,
) -> Result<Option<Segment>, DynamoDBError> {
    match (segment, total_segments) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(DynamoDBError::validation(
            "The TotalSegments parameter is required but was not present in the request \
             when parameter Segment is present",
        )),
        (None, Some(_)) => Err(DynamoDBError::validation(
            "The Segment parameter is required but was not present in the request \
             when parameter TotalSegments is present",
        )),
        (Some(seg), Some(total)) => {
            if !(1..=MAX_TOTAL_SEGMENTS).contains(&total) {
                return Err(DynamoDBError::validation(format!(
                    "1 validation error detected: Value '{total}' at 'totalSegments' failed \
                     to satisfy constraint: Member must have value between 1 and \
                     {MAX_TOTAL_SEGMENTS}"
                )));
            }
            if seg < 0 || seg >= total {
                return Err(DynamoDBError::validation(format!(
                    "The Segment parameter is zero-indexed and must be less than \
                     parameter TotalSegments. Segment: {seg}, TotalSegments: {total}"
                )));
            }
            Ok(Some(Segment {
                segment: u32::try_from(seg).unwrap_or_default(),
                total: u32::try_from(total).unwrap_or(1),
            }))
        }
    }
}

/// Validate key schema structure: exactly one HASH, at most two elements.
fn validate_key_schema_structure(elements: &[KeySchemaElement]) -> Result<(), DynamoDBError> {
    let hash_count = elements
        .iter()
        .filter(|e| e.key_type == KeyType::Hash)
        .count();
    if hash_count != 1 {
        return Err(DynamoDBError::validation(
            "Invalid KeySchema: Some index key schema element is not valid",
        ));
    }
    if elements.len() > 2 {
        return Err(DynamoDBError::validation(
            "Too many KeySchema elements; expected at most 2",
        ));
    }
    Ok(())
}

/// Every table and index key attribute must appear in `AttributeDefinitions`.
fn validate_key_attributes_defined(input: &CreateTableInput) -> Result<(), DynamoDBError> {
    let mut keys: Vec<&str> = Vec::new();
    let elements = input
        .key_schema
        .iter()
        .chain(input.global_secondary_indexes.iter().flat_map(|g| &g.key_schema))
        .chain(input.local_secondary_indexes.iter().flat_map(|l| &l.key_schema));
    for element in elements {
        if !keys.contains(&element.attribute_name.as_str()) {
            keys.push(&element.attribute_name);
        }
    }
    let defined: Vec<&str> = input
        .attribute_definitions
        .iter()
        .map(|d| d.attribute_name.as_str())
        .collect();
    if keys.iter().all(|k| defined.contains(k)) {
        return Ok(());
    }
    Err(DynamoDBError::validation(format!(
        "One or more parameter values were invalid: Some index key attributes are not defined \
         in AttributeDefinitions. Keys: [{}], AttributeDefinitions: [{}]",
        keys.join(", "),
        defined.join(", ")
    )))
}

/// Validate `AttributeDefinitions`: no duplicates, key types only.
fn validate_attribute_definitions(definitions: &[AttributeDefinition]) -> Result<(), DynamoDBError> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(&def.attribute_name) {
            return Err(DynamoDBError::validation(format!(
                "Duplicate AttributeName in AttributeDefinitions: {}",
                def.attribute_name,
            )));
        }
        if !def.attribute_type.is_valid_key_type() {
            return Err(DynamoDBError::validation(format!(
                "1 validation error detected: Value '{}' at 'attributeDefinitions.member.\
                 attributeType' failed to satisfy constraint: Member must satisfy enum value \
                 set: [B, N, S]",
                def.attribute_type
            )));
        }
    }
    Ok(())
}

/// Resolve the billing mode; without one, the presence of throughput decides.
fn resolve_billing_mode(
    billing_mode: Option<&BillingMode>,
    provisioned_throughput: Option<&ProvisionedThroughput>,
) -> Result<BillingMode, DynamoDBError> {
    match billing_mode {
        Some(BillingMode::Unknown(value)) => Err(DynamoDBError::validation(format!(
            "1 validation error detected: Value '{value}' at 'billingMode' failed to satisfy \
             constraint: Member must satisfy enum value set: [PROVISIONED, PAY_PER_REQUEST]"
        ))),
        Some(BillingMode::PayPerRequest) if provisioned_throughput.is_some() => {
            Err(DynamoDBError::validation(
                "One or more parameter values were invalid: Neither ReadCapacityUnits nor \
                 WriteCapacityUnits can be specified when BillingMode is PAY_PER_REQUEST",
            ))
        }
        Some(BillingMode::Provisioned) if provisioned_throughput.is_none() => Err(
            DynamoDBError::validation("No provisioned throughput specified for the table"),
        ),
        Some(mode) => Ok(mode.clone()),
        None if provisioned_throughput.is_some() => Ok(BillingMode::Provisioned),
        None => Ok(BillingMode::PayPerRequest),
    }
}

fn resolve_key_schema(
    elements: &[KeySchemaElement],
    definitions: &[AttributeDefinition],
) -> Result<KeySchema, DynamoDBError> {
    validate_key_schema_structure(elements)?;
    KeySchema::resolve(elements, definitions).ok_or_else(|| {
        DynamoDBError::validation("Invalid KeySchema: Some index key schema element is not valid")
    })
}

/// Build the empty secondary indexes of a new table, GSIs first.
fn build_indexes(
    input: &CreateTableInput,
    table_schema: &KeySchema,
) -> Result<Vec<SecondaryIndex>, DynamoDBError> {
    let globals = input
        .global_secondary_indexes
        .iter()
        .map(|g| (IndexKind::Global, &g.index_name, &g.key_schema, &g.projection));
    let locals = input
        .local_secondary_indexes
        .iter()
        .map(|l| (IndexKind::Local, &l.index_name, &l.key_schema, &l.projection));

    let mut seen = HashSet::new();
    let mut indexes = Vec::new();
    for (kind, name, elements, projection) in globals.chain(locals) {
        if !seen.insert(name.as_str()) {
            return Err(DynamoDBError::validation(format!(
                "One or more parameter values were invalid: Duplicate index name: {name}"
            )));
        }
        let key_schema = resolve_key_schema(elements, &input.attribute_definitions)?;
        if kind == IndexKind::Local {
            if table_schema.sort_key.is_none() {
                return Err(DynamoDBError::validation(
                    "One or more parameter values were invalid: Table KeySchema does not have a \
                     range key, which is required when specifying a LocalSecondaryIndex",
                ));
            }
            if key_schema.partition_key != table_schema.partition_key {
                return Err(DynamoDBError::validation(format!(
                    "One or more parameter values were invalid: Index KeySchema does not have \
                     the same leading hash key as table KeySchema for index: {name}. index hash \
                     key: {}, table hash key: {}",
                    key_schema.partition_key.name, table_schema.partition_key.name
                )));
            }
        }
        indexes.push(SecondaryIndex::new(
            name.clone(),
            kind,
            key_schema,
            projection.clone(),
        ));
    }
    Ok(indexes)
}

/// Evaluate a write's condition against the stored item (empty if absent).
fn check_condition(
    exprs: &RequestExpressions<'_>,
    existing: Option<&Item>,
    condition: &Expr,
    table_name: &str,
) -> Result<(), DynamoDBError> {
    let empty = Item::new();
    let item = existing.unwrap_or(&empty);
    let passed = exprs
        .context(item, ExpressionKind::Condition)
        .evaluate(condition)
        .map_err(expression_error_to_dynamodb)?;
    if passed {
        return Ok(());
    }
    warn!(table = %table_name, "conditional check failed");
    Err(DynamoDBError::conditional_check_failed())
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Split a read result into `Items`, `Count`, `ScannedCount` and `LastEvaluatedKey`.
fn read_output(result: ReadResult, count_only: bool) -> (Option<Vec<Item>>, i32, i32, Item) {
    (
        (!count_only).then_some(result.items),
        to_i32(result.count),
        to_i32(result.scanned_count),
        result.last_evaluated_key.unwrap_or_default(),
    )
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Main DynamoDB provider implementing all operations.
#[derive(Debug)]
pub struct DynastackDynamoDB {
    /// Service state owning all tables.
    pub state: Arc<DynamoDBServiceState>,
    /// On-demand backups.
    pub backups: Arc<BackupStore>,
    /// Configuration.
    pub config: Arc<DynamoDBConfig>,
}

impl DynastackDynamoDB {
    /// Create a new DynamoDB provider.
    #[must_use]
    pub fn new(config: DynamoDBConfig) -> Self {
        Self {
            state: Arc::new(DynamoDBServiceState::new()),
            backups: Arc::new(BackupStore::new()),
            config: Arc::new(config),
        }
    }

    /// Drop every table and backup.
    pub fn reset(&self) {
        self.state.reset();
        self.backups.reset();
    }

    fn page_limits(&self, limit: Option<usize>) -> PageLimits {
        PageLimits {
            limit,
            max_bytes: self.config.max_page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

impl DynastackDynamoDB {
    /// Handle `CreateTable`.
    pub fn handle_create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError> {
        validate_table_name(&input.table_name)?;
        if input.attribute_definitions.is_empty() {
            return Err(DynamoDBError::validation(
                "One or more parameter values were invalid: Some AttributeDefinitions are not \
                 valid. AttributeDefinitions must be provided for all key attributes",
            ));
        }
        validate_attribute_definitions(&input.attribute_definitions)?;
        validate_key_schema_structure(&input.key_schema)?;
        validate_key_attributes_defined(&input)?;
        let key_schema = resolve_key_schema(&input.key_schema, &input.attribute_definitions)?;
        let billing_mode = resolve_billing_mode(
            input.billing_mode.as_ref(),
            input.provisioned_throughput.as_ref(),
        )?;
        let indexes = build_indexes(&input, &key_schema)?;

        let table = DynamoDBTable {
            arn: self.config.table_arn(&input.table_name),
            name: input.table_name,
            status: TableStatus::Active,
            key_schema_elements: input.key_schema,
            attribute_definitions: input.attribute_definitions,
            billing_mode,
            provisioned_throughput: input.provisioned_throughput,
            gsi_definitions: input.global_secondary_indexes,
            lsi_definitions: input.local_secondary_indexes,
            table_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
            restore_summary: None,
            data: RwLock::new(TableData::new(key_schema, indexes)),
        };

        let table = self.state.create_table(table)?;
        info!(
            table = %table.name,
            gsis = table.gsi_definitions.len(),
            lsis = table.lsi_definitions.len(),
            "created table"
        );
        Ok(CreateTableOutput {
            table_description: Some(table.to_description()),
        })
    }

    /// Handle `DeleteTable`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_delete_table(
        &self,
        input: DeleteTableInput,
    ) -> Result<DeleteTableOutput, DynamoDBError> {
        let table = self.state.delete_table(&input.table_name)?;
        info!(table = %table.name, "deleted table");
        Ok(DeleteTableOutput {
            table_description: Some(table.to_delete_description()),
        })
    }

    /// Handle `DescribeTable`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError> {
        let table = self.state.require_named_table(&input.table_name)?;
        Ok(DescribeTableOutput {
            table: Some(table.to_description()),
        })
    }

    /// Handle `ListTables`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_list_tables(
        &self,
        input: ListTablesInput,
    ) -> Result<ListTablesOutput, DynamoDBError> {
        if let Some(limit) = input.limit {
            if !(1..=MAX_LIST_TABLES_LIMIT).contains(&limit) {
                return Err(DynamoDBError::validation(format!(
                    "1 validation error detected: Value '{limit}' at 'limit' failed to satisfy \
                     constraint: Member must have value between 1 and {MAX_LIST_TABLES_LIMIT}"
                )));
            }
        }

        let all_names = self.state.list_table_names();
        let limit = usize::try_from(input.limit.unwrap_or(MAX_LIST_TABLES_LIMIT)).unwrap_or(100);
        let start_idx = input.exclusive_start_table_name.as_ref().map_or(0, |start| {
            all_names
                .iter()
                .position(|n| n.as_str() > start.as_str())
                .unwrap_or(all_names.len())
        });

        let mut table_names: Vec<String> = all_names.into_iter().skip(start_idx).collect();
        let last_evaluated_table_name = if table_names.len() > limit {
            table_names.truncate(limit);
            table_names.last().cloned()
        } else {
            None
        };

        Ok(ListTablesOutput {
            table_names,
            last_evaluated_table_name,
        })
    }
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

impl DynastackDynamoDB {
    /// Handle `PutItem`.
    pub fn handle_put_item(&self, mut input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, "PutItem");

        validate_return_values(input.return_values.as_ref(), false)?;
        check_mixing(
            &[
                ("Expected", !input.expected.is_empty()),
                ("ConditionalOperator", input.conditional_operator.is_some()),
            ],
            &[("ConditionExpression", input.condition_expression.is_some())],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            input.condition_expression.is_some(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_item(&mut input.item)?;
        canonicalize_expression_values(&mut input.expression_attribute_values)?;

        let mut legacy = LegacyExpressions::new();
        if let Some(condition) = legacy
            .expected(&input.expected, input.conditional_operator.as_ref())
            .map_err(legacy_error_to_dynamodb)?
        {
            input.condition_expression = Some(condition);
        }
        legacy.merge_into(
            &mut input.expression_attribute_names,
            &mut input.expression_attribute_values,
        );

        let mut exprs = RequestExpressions::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let condition = input
            .condition_expression
            .as_deref()
            .map(|c| exprs.condition(c, ExpressionKind::Condition))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let mut data = table.data.write();
        let key = data
            .validate(&input.item, self.config.max_item_size, false)
            .map_err(storage_error_to_dynamodb)?;
        if let Some(condition) = &condition {
            check_condition(&exprs, data.get(&key), condition, &table.name)?;
        }
        let old = data.put(input.item).map_err(storage_error_to_dynamodb)?;
        drop(data);

        let attributes = match input.return_values {
            Some(ReturnValue::AllOld) => old.unwrap_or_default(),
            _ => HashMap::new(),
        };
        Ok(PutItemOutput { attributes })
    }

    /// Handle `GetItem`.
    pub fn handle_get_item(&self, mut input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, "GetItem");

        check_mixing(
            &[("AttributesToGet", !input.attributes_to_get.is_empty())],
            &[("ProjectionExpression", input.projection_expression.is_some())],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            input.projection_expression.is_some(),
            &input.expression_attribute_names,
            &HashMap::new(),
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_item(&mut input.key)?;

        let mut legacy = LegacyExpressions::new();
        if let Some(projection) = legacy
            .attributes_to_get(&input.attributes_to_get)
            .map_err(legacy_error_to_dynamodb)?
        {
            input.projection_expression = Some(projection);
        }
        let mut values = HashMap::new();
        legacy.merge_into(&mut input.expression_attribute_names, &mut values);

        let mut exprs = RequestExpressions::new(&input.expression_attribute_names, &values);
        let projection = input
            .projection_expression
            .as_deref()
            .map(|p| exprs.projection(p))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let data = table.data.read();
        let key = parse_key(data.key_schema(), &input.key).map_err(storage_error_to_dynamodb)?;
        let item = data.get(&key).map(|item| match &projection {
            Some(paths) => project(item, paths),
            None => item.clone(),
        });
        Ok(GetItemOutput { item })
    }

    /// Handle `DeleteItem`.
    pub fn handle_delete_item(
        &self,
        mut input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, "DeleteItem");

        validate_return_values(input.return_values.as_ref(), false)?;
        check_mixing(
            &[
                ("Expected", !input.expected.is_empty()),
                ("ConditionalOperator", input.conditional_operator.is_some()),
            ],
            &[("ConditionExpression", input.condition_expression.is_some())],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            input.condition_expression.is_some(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_item(&mut input.key)?;
        canonicalize_expression_values(&mut input.expression_attribute_values)?;

        let mut legacy = LegacyExpressions::new();
        if let Some(condition) = legacy
            .expected(&input.expected, input.conditional_operator.as_ref())
            .map_err(legacy_error_to_dynamodb)?
        {
            input.condition_expression = Some(condition);
        }
        legacy.merge_into(
            &mut input.expression_attribute_names,
            &mut input.expression_attribute_values,
        );

        let mut exprs = RequestExpressions::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let condition = input
            .condition_expression
            .as_deref()
            .map(|c| exprs.condition(c, ExpressionKind::Condition))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let mut data = table.data.write();
        let key = parse_key(data.key_schema(), &input.key).map_err(storage_error_to_dynamodb)?;
        if let Some(condition) = &condition {
            check_condition(&exprs, data.get(&key), condition, &table.name)?;
        }
        let old = data.delete(&key);
        drop(data);

        let attributes = match input.return_values {
            Some(ReturnValue::AllOld) => old.unwrap_or_default(),
            _ => HashMap::new(),
        };
        Ok(DeleteItemOutput { attributes })
    }

    /// Handle `UpdateItem`.
    ///
    /// A missing item is updated starting from its key alone; the result is
    /// stored only if the condition and every update action succeed.
    pub fn handle_update_item(
        &self,
        mut input: UpdateItemInput,
    ) -> Result<UpdateItemOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, "UpdateItem");

        validate_return_values(input.return_values.as_ref(), true)?;
        let uses_expressions =
            input.update_expression.is_some() || input.condition_expression.is_some();
        check_mixing(
            &[
                ("AttributeUpdates", !input.attribute_updates.is_empty()),
                ("Expected", !input.expected.is_empty()),
                ("ConditionalOperator", input.conditional_operator.is_some()),
            ],
            &[
                ("UpdateExpression", input.update_expression.is_some()),
                ("ConditionExpression", input.condition_expression.is_some()),
            ],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            uses_expressions,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_item(&mut input.key)?;
        canonicalize_expression_values(&mut input.expression_attribute_values)?;
        for update in input.attribute_updates.values_mut() {
            if let Some(value) = &mut update.value {
                canonicalize_value(value)?;
            }
        }

        let mut legacy = LegacyExpressions::new();
        if let Some(update) = legacy
            .attribute_updates(&input.attribute_updates)
            .map_err(legacy_error_to_dynamodb)?
        {
            input.update_expression = Some(update);
        }
        if let Some(condition) = legacy
            .expected(&input.expected, input.conditional_operator.as_ref())
            .map_err(legacy_error_to_dynamodb)?
        {
            input.condition_expression = Some(condition);
        }
        legacy.merge_into(
            &mut input.expression_attribute_names,
            &mut input.expression_attribute_values,
        );

        let mut exprs = RequestExpressions::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let update = input
            .update_expression
            .as_deref()
            .map(|u| exprs.update(u))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        let condition = input
            .condition_expression
            .as_deref()
            .map(|c| exprs.condition(c, ExpressionKind::Condition))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let mut data = table.data.write();
        let key = parse_key(data.key_schema(), &input.key).map_err(storage_error_to_dynamodb)?;
        if let Some(update) = &update {
            let schema = data.key_schema();
            if let Some(attr) = update
                .targets
                .iter()
                .filter_map(DocumentPath::root)
                .find(|root| schema.is_key_attribute(root))
            {
                return Err(DynamoDBError::validation(format!(
                    "One or more parameter values were invalid: Cannot update attribute {attr}. \
                     This attribute is part of the key"
                )));
            }
        }

        let existing = data.get(&key).cloned();
        if let Some(condition) = &condition {
            check_condition(&exprs, existing.as_ref(), condition, &table.name)?;
        }

        let base = existing.clone().unwrap_or_else(|| input.key.clone());
        let updated = match &update {
            Some(update) => exprs
                .context(&base, ExpressionKind::Update)
                .apply_update(&update.expr)
                .map_err(expression_error_to_dynamodb)?,
            None => base,
        };
        data.validate(&updated, self.config.max_item_size, true)
            .map_err(storage_error_to_dynamodb)?;
        data.put(updated.clone()).map_err(storage_error_to_dynamodb)?;
        drop(data);

        let targets = update.as_ref().map_or(&[][..], |u| u.targets.as_slice());
        let attributes = match input.return_values {
            Some(ReturnValue::AllOld) => existing.unwrap_or_default(),
            Some(ReturnValue::AllNew) => updated,
            Some(ReturnValue::UpdatedOld) => existing
                .map(|old| project(&old, targets))
                .unwrap_or_default(),
            Some(ReturnValue::UpdatedNew) => project(&updated, targets),
            _ => HashMap::new(),
        };
        Ok(UpdateItemOutput { attributes })
    }
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

impl DynastackDynamoDB {
    /// Handle `Query`.
    pub fn handle_query(&self, mut input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, index = ?input.index_name, "Query");

        let limit = validate_limit(input.limit)?;
        let uses_expressions = input.key_condition_expression.is_some()
            || input.filter_expression.is_some()
            || input.projection_expression.is_some();
        check_mixing(
            &[
                ("AttributesToGet", !input.attributes_to_get.is_empty()),
                ("QueryFilter", !input.query_filter.is_empty()),
                ("ConditionalOperator", input.conditional_operator.is_some()),
                ("KeyConditions", !input.key_conditions.is_empty()),
            ],
            &[
                ("ProjectionExpression", input.projection_expression.is_some()),
                ("FilterExpression", input.filter_expression.is_some()),
                (
                    "KeyConditionExpression",
                    input.key_condition_expression.is_some(),
                ),
            ],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            uses_expressions,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_expression_values(&mut input.expression_attribute_values)?;
        canonicalize_item(&mut input.exclusive_start_key)?;

        let data = table.data.read();
        let view = data.view(input.index_name.as_deref()).ok_or_else(|| {
            DynamoDBError::resource_not_found(format!(
                "Invalid index: {} for table: {}. Available indexes are: {}",
                input.index_name.as_deref().unwrap_or_default(),
                table.name,
                data.index_names()
            ))
        })?;
        let count_only = validate_select(
            input.select.as_ref(),
            view.is_secondary(),
            input.projection_expression.is_some(),
            !input.attributes_to_get.is_empty(),
        )?;

        let mut legacy = LegacyExpressions::new();
        if let Some(projection) = legacy
            .attributes_to_get(&input.attributes_to_get)
            .map_err(legacy_error_to_dynamodb)?
        {
            input.projection_expression = Some(projection);
        }
        if let Some(key_condition) = legacy
            .key_conditions(&input.key_conditions)
            .map_err(legacy_error_to_dynamodb)?
        {
            input.key_condition_expression = Some(key_condition);
        }
        if let Some(filter) = legacy
            .conditions(&input.query_filter, input.conditional_operator.as_ref())
            .map_err(legacy_error_to_dynamodb)?
        {
            input.filter_expression = Some(filter);
        }
        legacy.merge_into(
            &mut input.expression_attribute_names,
            &mut input.expression_attribute_values,
        );

        let mut exprs = RequestExpressions::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let projection = input
            .projection_expression
            .as_deref()
            .map(|p| exprs.projection(p))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        let Some(key_condition) = input.key_condition_expression.as_deref() else {
            return Err(DynamoDBError::validation(
                "Either KeyConditions or QueryFilter should be present",
            ));
        };
        let key_expr = exprs
            .condition(key_condition, ExpressionKind::KeyCondition)
            .map_err(expression_error_to_dynamodb)?;
        let filter = input
            .filter_expression
            .as_deref()
            .map(|f| exprs.condition(f, ExpressionKind::Filter))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let hash = KeySlot {
            name: &view.key_schema.partition_key.name,
            attribute_type: &view.key_schema.partition_key.attr_type,
        };
        let range = view.key_schema.sort_key.as_ref().map(|k| KeySlot {
            name: &k.name,
            attribute_type: &k.attr_type,
        });
        let condition =
            extract_key_condition(&key_expr, exprs.names(), exprs.values(), hash, range)
                .map_err(expression_error_to_dynamodb)?;

        let start = (!input.exclusive_start_key.is_empty()).then_some(&input.exclusive_start_key);
        let page = query::query(
            view,
            &condition,
            input.scan_index_forward.unwrap_or(true),
            start,
            self.page_limits(limit),
        )
        .map_err(storage_error_to_dynamodb)?;
        let result = page
            .finish(&exprs, filter.as_ref(), projection.as_deref(), count_only)
            .map_err(expression_error_to_dynamodb)?;

        let (items, count, scanned_count, last_evaluated_key) = read_output(result, count_only);
        Ok(QueryOutput {
            items,
            count,
            scanned_count,
            last_evaluated_key,
        })
    }

    /// Handle `Scan`.
    pub fn handle_scan(&self, mut input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let table = self.state.require_table(&input.table_name)?;
        debug!(table = %table.name, index = ?input.index_name, "Scan");

        let limit = validate_limit(input.limit)?;
        let segment = validate_parallel_scan(input.segment, input.total_segments)?;
        let uses_expressions =
            input.filter_expression.is_some() || input.projection_expression.is_some();
        check_mixing(
            &[
                ("AttributesToGet", !input.attributes_to_get.is_empty()),
                ("ScanFilter", !input.scan_filter.is_empty()),
                ("ConditionalOperator", input.conditional_operator.is_some()),
            ],
            &[
                ("ProjectionExpression", input.projection_expression.is_some()),
                ("FilterExpression", input.filter_expression.is_some()),
            ],
        )
        .map_err(legacy_error_to_dynamodb)?;
        check_placeholders_used(
            uses_expressions,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )
        .map_err(legacy_error_to_dynamodb)?;
        canonicalize_expression_values(&mut input.expression_attribute_values)?;
        canonicalize_item(&mut input.exclusive_start_key)?;

        let data = table.data.read();
        let view = data.view(input.index_name.as_deref()).ok_or_else(|| {
            DynamoDBError::validation(format!(
                "The table does not have the specified index: {}",
                input.index_name.as_deref().unwrap_or_default()
            ))
        })?;
        let count_only = validate_select(
            input.select.as_ref(),
            view.is_secondary(),
            input.projection_expression.is_some(),
            !input.attributes_to_get.is_empty(),
        )?;

        if let (Some(segment), Some(hash)) = (
            segment,
            input.exclusive_start_key.get(&view.key_schema.partition_key.name),
        ) {
            if KeyValue::from_attribute(hash).is_some_and(|h| !segment.contains(&h)) {
                return Err(DynamoDBError::validation(
                    "The provided Exclusive start key does not map to the provided Segment and \
                     TotalSegments values.",
                ));
            }
        }

        let mut legacy = LegacyExpressions::new();
        if let Some(projection) = legacy
            .attributes_to_get(&input.attributes_to_get)
            .map_err(legacy_error_to_dynamodb)?
        {
            input.projection_expression = Some(projection);
        }
        if let Some(filter) = legacy
            .conditions(&input.scan_filter, input.conditional_operator.as_ref())
            .map_err(legacy_error_to_dynamodb)?
        {
            input.filter_expression = Some(filter);
        }
        legacy.merge_into(
            &mut input.expression_attribute_names,
            &mut input.expression_attribute_values,
        );

        let mut exprs = RequestExpressions::new(
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        );
        let projection = input
            .projection_expression
            .as_deref()
            .map(|p| exprs.projection(p))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        let filter = input
            .filter_expression
            .as_deref()
            .map(|f| exprs.condition(f, ExpressionKind::Filter))
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        exprs.finish().map_err(expression_error_to_dynamodb)?;

        let start = (!input.exclusive_start_key.is_empty()).then_some(&input.exclusive_start_key);
        let page = query::scan(view, segment, start, self.page_limits(limit))
            .map_err(storage_error_to_dynamodb)?;
        let result = page
            .finish(&exprs, filter.as_ref(), projection.as_deref(), count_only)
            .map_err(expression_error_to_dynamodb)?;

        let (items, count, scanned_count, last_evaluated_key) = read_output(result, count_only);
        Ok(ScanOutput {
            items,
            count,
            scanned_count,
            last_evaluated_key,
        })
    }
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

impl DynastackDynamoDB {
    /// Handle `CreateBackup`.
    pub fn handle_create_backup(
        &self,
        input: CreateBackupInput,
    ) -> Result<CreateBackupOutput, DynamoDBError> {
        let table = self.state.get_table(&input.table_name).ok_or_else(|| {
            DynamoDBError::table_not_found(format!("Table not found: {}", input.table_name))
        })?;
        let backup = self.backups.create(&table, input.backup_name);
        info!(table = %table.name, backup = %backup.arn, "created backup");
        Ok(CreateBackupOutput {
            backup_details: backup.details(BackupStatus::Available),
        })
    }

    /// Handle `DescribeBackup`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_describe_backup(
        &self,
        input: DescribeBackupInput,
    ) -> Result<DescribeBackupOutput, DynamoDBError> {
        let backup = self.backups.get(&input.backup_arn)?;
        Ok(DescribeBackupOutput {
            backup_description: backup.description(BackupStatus::Available),
        })
    }

    /// Handle `DeleteBackup`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_delete_backup(
        &self,
        input: DeleteBackupInput,
    ) -> Result<DeleteBackupOutput, DynamoDBError> {
        let backup = self.backups.delete(&input.backup_arn)?;
        info!(backup = %backup.arn, "deleted backup");
        Ok(DeleteBackupOutput {
            backup_description: backup.description(BackupStatus::Deleted),
        })
    }

    /// Handle `ListBackups`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_list_backups(
        &self,
        input: ListBackupsInput,
    ) -> Result<ListBackupsOutput, DynamoDBError> {
        let limit = validate_limit(input.limit)?;
        let filter = input.backup_type.unwrap_or_default();
        let records = self.backups.list(input.table_name.as_deref(), &filter);

        let start_idx = input.exclusive_start_backup_arn.as_ref().map_or(0, |start| {
            records
                .iter()
                .position(|r| &r.arn == start)
                .map_or(0, |idx| idx + 1)
        });
        let mut page: Vec<_> = records.into_iter().skip(start_idx).collect();
        let last_evaluated_backup_arn = match limit {
            Some(limit) if page.len() > limit => {
                page.truncate(limit);
                page.last().map(|r| r.arn.clone())
            }
            _ => None,
        };

        Ok(ListBackupsOutput {
            backup_summaries: page.iter().map(|r| r.summary()).collect(),
            last_evaluated_backup_arn,
        })
    }

    /// Handle `RestoreTableFromBackup`.
    pub fn handle_restore_table_from_backup(
        &self,
        input: RestoreTableFromBackupInput,
    ) -> Result<RestoreTableFromBackupOutput, DynamoDBError> {
        let backup = self.backups.get(&input.backup_arn)?;
        validate_table_name(&input.target_table_name)?;
        if self.state.get_table(&input.target_table_name).is_some() {
            return Err(DynamoDBError::table_already_exists(&input.target_table_name));
        }

        let arn = self.config.table_arn(&input.target_table_name);
        let table = backup
            .restore(input.target_table_name.clone(), arn)
            .map_err(storage_error_to_dynamodb)?;
        let table = self
            .state
            .create_table(table)
            .map_err(|_| DynamoDBError::table_already_exists(&input.target_table_name))?;
        info!(table = %table.name, backup = %backup.arn, "restored table from backup");
        Ok(RestoreTableFromBackupOutput {
            table_description: Some(table.to_description()),
        })
    }
}
