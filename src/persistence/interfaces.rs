use crate::api::AppError;
use crate::interface::model::{ApiInterface, InterfaceStatus};
use crate::persistence::repo::Table;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value};
use std::sync::Arc;

pub struct InterfaceOperations {
    pub(crate) client: Arc<Client>,
}

pub(crate) struct InterfacesTable();

impl Table<ApiInterface> for InterfacesTable {
    fn table_name() -> String {
        "api_interfaces".to_string()
    }

    fn partition_key_name() -> String {
        "id".to_string()
    }

    fn partition_key_from_entity(entity: &ApiInterface) -> (String, AttributeValue) {
        Self::partition_key(entity.id.clone())
    }
}

impl InterfaceOperations {
    pub async fn create(&self, interface: ApiInterface) -> Result<ApiInterface, AppError> {
        InterfacesTable::put_item(self.client.clone(), interface).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<ApiInterface>, AppError> {
        InterfacesTable::get_item(self.client.clone(), id.to_string(), None).await
    }

    pub async fn batch_get(&self, ids: Vec<String>) -> Result<Vec<ApiInterface>, AppError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let keys = ids
            .into_iter()
            .map(|id| InterfacesTable::main_key(id, None))
            .collect();
        InterfacesTable::batch_get_items(self.client.clone(), keys).await
    }

    /// `None` when no interface has this id.
    pub async fn update_status(
        &self,
        id: &str,
        status: InterfaceStatus,
        updated_at: u64,
    ) -> Result<Option<ApiInterface>, AppError> {
        let status_value: AttributeValue = to_attribute_value(status)
            .map_err(|err| AppError::Internal(format!("failed to serialize status: {}", err)))?;
        let result = InterfacesTable::update_builder(self.client.clone())
            .set_key(Some(InterfacesTable::main_key(id.to_string(), None)))
            .expression_attribute_names("#id", "id")
            .expression_attribute_names("#s", "status")
            .expression_attribute_names("#ua", "updated_at")
            .expression_attribute_values(":s", status_value)
            .expression_attribute_values(":ua", AttributeValue::N(updated_at.to_string()))
            .condition_expression("attribute_exists(#id)")
            .update_expression("SET #s = :s, #ua = :ua")
            .return_values(ReturnValue::AllNew)
            .send()
            .await;
        match result {
            Ok(output) => match output.attributes {
                Some(item) => from_item(item)
                    .map(Some)
                    .map_err(|err| AppError::Internal(format!("malformed interface {}: {}", id, err))),
                None => Ok(None),
            },
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_conditional_check_failed_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(InterfacesTable::sdk_error("update_item", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn interfaces_are_keyed_by_id_alone() {
        let interface = ApiInterface::builder()
            .id("if-1".to_string())
            .name("weather")
            .method(HttpMethod::GET)
            .url("https://api.example.com")
            .build();
        let key = InterfacesTable::key_of(&interface);
        assert_eq!(key.len(), 1);
        assert_eq!(key.get("id"), Some(&AttributeValue::S("if-1".to_string())));
        assert_eq!(InterfacesTable::main_key("if-1".to_string(), Some("ignored".to_string())), key);
    }

    #[test]
    fn status_is_stored_as_its_wire_name() {
        let value: AttributeValue = to_attribute_value(InterfaceStatus::Disabled).unwrap();
        assert_eq!(value, AttributeValue::S("DISABLED".to_string()));
    }
}
