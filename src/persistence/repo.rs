use crate::api::AppError;
use crate::execution_record::model::{ExecutionRecord, RecordFilter};
use crate::execution_record::service::ExecutionRecordStore;
use crate::interface::model::{ApiInterface, InterfaceStatus};
use crate::interface::service::InterfaceStore;
use crate::persistence::execution_records::ExecutionRecordOperations;
use crate::persistence::interfaces::InterfaceOperations;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder;
use aws_sdk_dynamodb::operation::update_item::builders::UpdateItemFluentBuilder;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, KeysAndAttributes, WriteRequest};
use aws_sdk_dynamodb::Client;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub type Item = HashMap<String, AttributeValue>;

const BATCH_GET_LIMIT: usize = 100;
const BATCH_WRITE_LIMIT: usize = 25;

pub(crate) trait Table<T>
where
    T: DeserializeOwned + Serialize + Clone + Send,
{
    fn table_name() -> String;
    fn partition_key_name() -> String;

    fn sort_key_name() -> Option<String> {
        None
    }

    fn partition_key(value: String) -> (String, AttributeValue) {
        (Self::partition_key_name(), AttributeValue::S(value))
    }

    fn partition_key_from_entity(entity: &T) -> (String, AttributeValue);

    fn sort_key_from_entity(_entity: &T) -> Option<(String, AttributeValue)> {
        None
    }

    fn main_key(partition_key: String, sort_key: Option<String>) -> Item {
        let mut key = HashMap::from([Self::partition_key(partition_key)]);
        if let (Some(name), Some(value)) = (Self::sort_key_name(), sort_key) {
            key.insert(name, AttributeValue::S(value));
        }
        key
    }

    fn key_of(entity: &T) -> Item {
        let mut key = HashMap::from([Self::partition_key_from_entity(entity)]);
        if let Some((name, value)) = Self::sort_key_from_entity(entity) {
            key.insert(name, value);
        }
        key
    }

    fn sdk_error(operation: &str, err: impl std::error::Error) -> AppError {
        AppError::Internal(format!(
            "{} on {} failed: {}",
            operation,
            Self::table_name(),
            DisplayErrorContext(err)
        ))
    }

    fn from_items(items: Vec<Item>) -> Result<Vec<T>, AppError> {
        items
            .into_iter()
            .map(|item| {
                from_item(item).map_err(|err| {
                    AppError::Internal(format!("malformed item in {}: {}", Self::table_name(), err))
                })
            })
            .collect()
    }

    async fn get_item(client: Arc<Client>, partition_key: String, sort_key: Option<String>) -> Result<Option<T>, AppError> {
        let output = client
            .get_item()
            .table_name(Self::table_name())
            .set_key(Some(Self::main_key(partition_key, sort_key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| Self::sdk_error("get_item", err))?;
        match output.item {
            Some(item) => Ok(Self::from_items(vec![item])?.pop()),
            None => Ok(None),
        }
    }

    async fn put_item(client: Arc<Client>, entity: T) -> Result<T, AppError> {
        let mut item: Item = to_item(entity.clone())
            .map_err(|err| AppError::Internal(format!("failed to serialize item: {}", err)))?;
        Self::add_main_key_attributes(&entity, &mut item);
        client
            .put_item()
            .table_name(Self::table_name())
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| Self::sdk_error("put_item", err))?;
        Ok(entity)
    }

    fn query_builder(client: Arc<Client>) -> QueryFluentBuilder {
        client.query().table_name(Self::table_name())
    }

    fn scan_builder(client: Arc<Client>) -> ScanFluentBuilder {
        client.scan().table_name(Self::table_name())
    }

    fn update_builder(client: Arc<Client>) -> UpdateItemFluentBuilder {
        client.update_item().table_name(Self::table_name())
    }

    /// Follows `last_evaluated_key` until the query is exhausted.
    async fn collect_query(builder: QueryFluentBuilder) -> Result<Vec<T>, AppError> {
        let mut items: Vec<Item> = vec![];
        let mut start_key: Option<Item> = None;
        loop {
            let output = builder
                .clone()
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| Self::sdk_error("query", err))?;
            items.extend(output.items.unwrap_or_default());
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Self::from_items(items)
    }

    /// Follows `last_evaluated_key` until the scan is exhausted.
    async fn collect_scan(builder: ScanFluentBuilder) -> Result<Vec<T>, AppError> {
        let mut items: Vec<Item> = vec![];
        let mut start_key: Option<Item> = None;
        loop {
            let output = builder
                .clone()
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| Self::sdk_error("scan", err))?;
            items.extend(output.items.unwrap_or_default());
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Self::from_items(items)
    }

    /// Chunked to the service limit; unprocessed keys are retried until none remain.
    async fn batch_get_items(client: Arc<Client>, keys: Vec<Item>) -> Result<Vec<T>, AppError> {
        let table_name = Self::table_name();
        let requests = keys.chunks(BATCH_GET_LIMIT).map(|chunk| {
            let client = client.clone();
            let table_name = table_name.clone();
            let chunk = chunk.to_vec();
            async move {
                let mut pending = Some(
                    KeysAndAttributes::builder()
                        .consistent_read(true)
                        .set_keys(Some(chunk))
                        .build()
                        .map_err(|err| Self::sdk_error("batch_get_item", err))?,
                );
                let mut items: Vec<Item> = vec![];
                while let Some(request) = pending.take() {
                    let output = client
                        .batch_get_item()
                        .request_items(&table_name, request)
                        .send()
                        .await
                        .map_err(|err| Self::sdk_error("batch_get_item", err))?;
                    if let Some(mut responses) = output.responses {
                        items.extend(responses.remove(&table_name).unwrap_or_default());
                    }
                    pending = output
                        .unprocessed_keys
                        .and_then(|mut unprocessed| unprocessed.remove(&table_name))
                        .filter(|retry| !retry.keys().is_empty());
                }
                Ok::<Vec<Item>, AppError>(items)
            }
        });
        let chunks = try_join_all(requests).await?;
        Self::from_items(chunks.into_iter().flatten().collect())
    }

    /// Deletes in chunks of the service limit and returns how many keys were removed.
    async fn batch_delete_items(client: Arc<Client>, keys: Vec<Item>) -> Result<usize, AppError> {
        let table_name = Self::table_name();
        let mut deleted = 0;
        for chunk in keys.chunks(BATCH_WRITE_LIMIT) {
            let mut pending: Vec<WriteRequest> = chunk
                .iter()
                .map(|key| {
                    DeleteRequest::builder()
                        .set_key(Some(key.clone()))
                        .build()
                        .map(|delete| WriteRequest::builder().delete_request(delete).build())
                        .map_err(|err| Self::sdk_error("batch_write_item", err))
                })
                .collect::<Result<_, _>>()?;
            while !pending.is_empty() {
                let attempted = pending.len();
                let output = client
                    .batch_write_item()
                    .set_request_items(Some(HashMap::from([(table_name.clone(), pending)])))
                    .send()
                    .await
                    .map_err(|err| Self::sdk_error("batch_write_item", err))?;
                pending = output
                    .unprocessed_items
                    .and_then(|mut unprocessed| unprocessed.remove(&table_name))
                    .unwrap_or_default();
                if !pending.is_empty() {
                    warn!("{} deletes unprocessed on {}, retrying", pending.len(), table_name);
                }
                deleted += attempted - pending.len();
            }
        }
        Ok(deleted)
    }

    fn add_main_key_attributes(entity: &T, item: &mut Item) {
        item.extend(Self::key_of(entity));
        Self::add_index_key_attributes(entity, item);
    }

    fn add_index_key_attributes(_entity: &T, _item: &mut Item) {}
}

#[derive(Clone)]
pub struct Repository {
    client: Arc<Client>,
}

impl Repository {
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Repository {
            client: Arc::new(client),
        }
    }

    pub fn interfaces(&self) -> InterfaceOperations {
        InterfaceOperations {
            client: Arc::clone(&self.client),
        }
    }

    pub fn execution_records(&self) -> ExecutionRecordOperations {
        ExecutionRecordOperations {
            client: Arc::clone(&self.client),
        }
    }
}

#[async_trait]
impl InterfaceStore for Repository {
    async fn get(&self, id: &str) -> Result<Option<ApiInterface>, AppError> {
        self.interfaces().get(id).await
    }

    async fn batch_get(&self, ids: Vec<String>) -> Result<Vec<ApiInterface>, AppError> {
        self.interfaces().batch_get(ids).await
    }

    async fn create(&self, interface: ApiInterface) -> Result<ApiInterface, AppError> {
        self.interfaces().create(interface).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: InterfaceStatus,
        updated_at: u64,
    ) -> Result<Option<ApiInterface>, AppError> {
        self.interfaces().update_status(id, status, updated_at).await
    }
}

#[async_trait]
impl ExecutionRecordStore for Repository {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AppError> {
        self.execution_records().create(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, AppError> {
        self.execution_records().get(id).await
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, AppError> {
        self.execution_records().list(filter).await
    }

    async fn delete_created_before(&self, cutoff: u64) -> Result<usize, AppError> {
        self.execution_records().delete_created_before(cutoff).await
    }
}
