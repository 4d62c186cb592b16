use crate::api::AppError;
use crate::execution_record::model::{ExecutionRecord, RecordFilter};
use crate::persistence::model::ConditionSet;
use crate::persistence::repo::Table;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::sync::Arc;
use tracing::debug;

pub struct ExecutionRecordOperations {
    pub(crate) client: Arc<Client>,
}

/// Records are partitioned by interface so per-interface reads stay a single query.
pub(crate) struct ExecutionRecordsTable();

impl Table<ExecutionRecord> for ExecutionRecordsTable {
    fn table_name() -> String {
        "execution_records".to_string()
    }

    fn partition_key_name() -> String {
        "interface_id".to_string()
    }

    fn sort_key_name() -> Option<String> {
        Some("id".to_string())
    }

    fn partition_key_from_entity(entity: &ExecutionRecord) -> (String, AttributeValue) {
        Self::partition_key(entity.interface_id.clone())
    }

    fn sort_key_from_entity(entity: &ExecutionRecord) -> Option<(String, AttributeValue)> {
        Some(("id".to_string(), AttributeValue::S(entity.id.clone())))
    }
}

fn number(value: u64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Server-side narrowing for everything but the interface id (a key condition) and the
/// executor name, whose case-insensitive match DynamoDB cannot express.
pub(crate) fn filter_conditions(filter: &RecordFilter) -> ConditionSet {
    let mut conditions = ConditionSet::new();
    if let Some(executor_id) = &filter.executor_id {
        conditions = conditions.compare(
            "executor_id",
            "=",
            "executor_id",
            AttributeValue::S(executor_id.clone()),
        );
    }
    if let Some(success) = filter.success {
        conditions = conditions.compare("success", "=", "success", AttributeValue::Bool(success));
    }
    if let Some(min) = filter.min_elapsed_ms {
        conditions = conditions.compare("elapsed_ms", ">=", "min_elapsed", number(min));
    }
    if let Some(max) = filter.max_elapsed_ms {
        conditions = conditions.compare("elapsed_ms", "<=", "max_elapsed", number(max));
    }
    if let Some(from) = filter.created_from {
        conditions = conditions.compare("created_at", ">=", "created_from", number(from));
    }
    if let Some(to) = filter.created_to {
        conditions = conditions.compare("created_at", "<=", "created_to", number(to));
    }
    conditions
}

impl ExecutionRecordOperations {
    pub async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AppError> {
        ExecutionRecordsTable::put_item(self.client.clone(), record).await
    }

    /// Lookups by id alone cannot use the key, so this scans.
    pub async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, AppError> {
        let conditions = ConditionSet::new().compare("id", "=", "id", AttributeValue::S(id.to_string()));
        let builder = ExecutionRecordsTable::scan_builder(self.client.clone())
            .set_filter_expression(conditions.expression())
            .set_expression_attribute_names(conditions.names())
            .set_expression_attribute_values(conditions.values());
        Ok(ExecutionRecordsTable::collect_scan(builder).await?.pop())
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, AppError> {
        let conditions = filter_conditions(filter);
        let mut records = match &filter.interface_id {
            Some(interface_id) => {
                let key = ConditionSet::new().compare(
                    "interface_id",
                    "=",
                    "interface_id",
                    AttributeValue::S(interface_id.clone()),
                );
                let placeholders = conditions.clone().with_placeholders_of(&key);
                let builder = ExecutionRecordsTable::query_builder(self.client.clone())
                    .set_key_condition_expression(key.expression())
                    .set_filter_expression(conditions.expression())
                    .set_expression_attribute_names(placeholders.names())
                    .set_expression_attribute_values(placeholders.values());
                ExecutionRecordsTable::collect_query(builder).await?
            }
            None => {
                debug!("scanning execution records without an interface id");
                let builder = ExecutionRecordsTable::scan_builder(self.client.clone())
                    .set_filter_expression(conditions.expression())
                    .set_expression_attribute_names(conditions.names())
                    .set_expression_attribute_values(conditions.values());
                ExecutionRecordsTable::collect_scan(builder).await?
            }
        };
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    pub async fn delete_created_before(&self, cutoff: u64) -> Result<usize, AppError> {
        let conditions = ConditionSet::new().compare("created_at", "<", "cutoff", number(cutoff));
        let builder = ExecutionRecordsTable::scan_builder(self.client.clone())
            .set_filter_expression(conditions.expression())
            .set_expression_attribute_names(conditions.names())
            .set_expression_attribute_values(conditions.values());
        let expired = ExecutionRecordsTable::collect_scan(builder).await?;
        if expired.is_empty() {
            return Ok(0);
        }
        let keys = expired.iter().map(ExecutionRecordsTable::key_of).collect();
        ExecutionRecordsTable::batch_delete_items(self.client.clone(), keys).await
    }
}
