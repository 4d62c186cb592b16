use crate::binding::model::{to_json_object, BoundParams};
use crate::binding::service::bind;
use crate::execution_record::model::ExecutionRecord;
use crate::execution_record::service::ExecutionRecordStore;
use crate::http::{resolve_timeout, ApiClient, HttpError, HttpExchange, HttpRequest};
use crate::interface::model::ApiInterface;
use crate::interface::service::InterfaceStore;
use crate::invocation::model::{Actor, ClientInfo, InvocationError, InvocationRequest, InvocationResult};
use crate::json_path::utils::extract_value;
use crate::request::build_request;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Binds, builds, sends, extracts and records one invocation at a time. Holds no
/// per-call state, so a single engine serves concurrent callers.
#[derive(Clone)]
pub struct InvocationEngine {
    interfaces: Arc<dyn InterfaceStore>,
    records: Arc<dyn ExecutionRecordStore>,
    client: Arc<ApiClient>,
    fallback_timeout_secs: u64,
}

impl InvocationEngine {
    pub fn new(
        interfaces: Arc<dyn InterfaceStore>,
        records: Arc<dyn ExecutionRecordStore>,
        client: Arc<ApiClient>,
        fallback_timeout_secs: u64,
    ) -> Self {
        InvocationEngine {
            interfaces,
            records,
            client,
            fallback_timeout_secs,
        }
    }

    /// Rejections (unknown or disabled interface, binding failures) return early and leave
    /// no record. Everything past binding is recorded, and the record is written before
    /// this returns. A failed write is logged and does not alter the result.
    pub async fn execute(
        &self,
        request: InvocationRequest,
        actor: &Actor,
        client_info: &ClientInfo,
    ) -> Result<InvocationResult, InvocationError> {
        let interface = self
            .interfaces
            .get(&request.interface_id)
            .await?
            .ok_or_else(|| InvocationError::NotFound(request.interface_id.clone()))?;
        if !interface.is_enabled() {
            return Err(InvocationError::Disabled(interface.id.clone()));
        }

        let bound = bind(&interface, &request)?;
        let timeout = resolve_timeout(request.timeout, interface.timeout, self.fallback_timeout_secs);
        info!(
            "user {} invoking interface {} ({}) with timeout {:?}",
            actor.id, interface.name, interface.id, timeout
        );

        let (outbound, exchange) = match build_request(&interface, &bound, &request.headers) {
            Ok(outbound) => {
                let exchange = self.client.execute(outbound.clone(), timeout).await;
                (Some(outbound), exchange)
            }
            Err(err) => {
                warn!("could not build request for interface {}: {}", interface.id, err);
                (None, HttpExchange::failed(HttpError::Request(err.to_string()), 0))
            }
        };

        let extracted_value = match (&exchange.error, &exchange.body) {
            (None, Some(body)) => extract_value(body, interface.value_path.as_ref()),
            _ => None,
        };
        let result = InvocationResult {
            status: exchange.status,
            headers: exchange.headers.clone(),
            body: exchange.body.clone(),
            extracted_value,
            elapsed_ms: exchange.elapsed_ms,
            success: exchange.is_success(),
            error: exchange.error.as_ref().map(ToString::to_string),
        };

        let record = build_record(&interface, &bound, outbound.as_ref(), &result, &request, actor, client_info);
        if let Err(err) = self.records.create(record).await {
            error!("failed to record execution of interface {}: {}", interface.id, err);
        }
        Ok(result)
    }
}

fn build_record(
    interface: &ApiInterface,
    bound: &BoundParams,
    outbound: Option<&HttpRequest>,
    result: &InvocationResult,
    request: &InvocationRequest,
    actor: &Actor,
    client_info: &ClientInfo,
) -> ExecutionRecord {
    let request_headers = match outbound {
        Some(outbound) => serde_json::to_string(&outbound.headers_map()).ok(),
        None => Some(to_json_object(&bound.headers).to_string()),
    };
    ExecutionRecord::builder()
        .interface_id(interface.id.clone())
        .interface_name(interface.name.clone())
        .executor_id(actor.id.clone())
        .executor_name(actor.display_name())
        .request_params(to_json_object(&bound.url).to_string())
        .maybe_request_headers(request_headers)
        .maybe_request_body(outbound.and_then(|outbound| outbound.body.clone()))
        .maybe_response_status(result.status)
        .maybe_response_headers(
            Some(&result.headers)
                .filter(|headers| !headers.is_empty())
                .and_then(|headers| serde_json::to_string(headers).ok()),
        )
        .maybe_response_body(result.body.clone())
        .elapsed_ms(result.elapsed_ms)
        .success(result.success)
        .maybe_error_message(result.error.clone())
        .maybe_remark(request.remark.clone())
        .maybe_client_ip(client_info.ip.clone())
        .maybe_user_agent(client_info.user_agent.clone())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_record::model::RecordFilter;
    use crate::http::HttpMethod;
    use crate::interface::model::{ApiParam, BodyKind, DataType, InterfaceStatus, ParamKind};
    use crate::json_path::model::Expression;
    use crate::persistence::memory::MemoryRepository;
    use crate::testing::{spawn_truncating_upstream, spawn_upstream, unreachable_base_url};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    struct Fixture {
        engine: InvocationEngine,
        repository: Arc<MemoryRepository>,
    }

    impl Fixture {
        fn new() -> Self {
            let repository = Arc::new(MemoryRepository::new());
            let engine = InvocationEngine::new(
                repository.clone(),
                repository.clone(),
                Arc::new(ApiClient::new()),
                60,
            );
            Fixture { engine, repository }
        }

        async fn register(&self, interface: ApiInterface) -> String {
            InterfaceStore::create(self.repository.as_ref(), interface)
                .await
                .unwrap()
                .id
        }

        async fn records(&self) -> Vec<ExecutionRecord> {
            self.repository.scan(&RecordFilter::default()).await.unwrap()
        }

        async fn run(&self, request: InvocationRequest) -> Result<InvocationResult, InvocationError> {
            self.engine
                .execute(request, &actor(), &client_info())
                .await
        }
    }

    fn actor() -> Actor {
        Actor::new("u-7", Some("Ada".to_string()))
    }

    fn client_info() -> ClientInfo {
        ClientInfo {
            ip: Some("10.0.0.9".to_string()),
            user_agent: Some("integration-test".to_string()),
        }
    }

    fn user_lookup(base_url: &str) -> ApiInterface {
        ApiInterface::builder()
            .name("user lookup")
            .method(HttpMethod::GET)
            .url(format!("{}/user", base_url))
            .value_path(Expression::new("$.data.name"))
            .build()
    }

    fn echo(base_url: &str) -> ApiInterface {
        let mut tenant = ApiParam::builder()
            .name("X-Tenant")
            .kind(ParamKind::HeaderParam)
            .default_value(json!("acme"))
            .build();
        tenant.changeable = false;
        ApiInterface::builder()
            .name("echo")
            .method(HttpMethod::POST)
            .url(format!("{}/echo?v=1", base_url))
            .body_kind(BodyKind::Json)
            .value_path(Expression::new("$.method"))
            .params(vec![
                ApiParam::builder()
                    .name("page")
                    .kind(ParamKind::UrlParam)
                    .data_type(DataType::Integer)
                    .default_value(json!(1))
                    .build(),
                tenant,
                ApiParam::builder()
                    .name("order_id")
                    .kind(ParamKind::BodyParam)
                    .data_type(DataType::Long)
                    .required(true)
                    .build(),
                ApiParam::builder()
                    .name("express")
                    .kind(ParamKind::BodyParam)
                    .data_type(DataType::Boolean)
                    .build(),
            ])
            .build()
    }

    #[tokio::test]
    async fn successful_call_extracts_and_records() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;

        let mut request = InvocationRequest::builder().interface_id(id.clone()).build();
        request.remark = Some("smoke".to_string());
        let result = fixture.run(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.extracted_value.as_deref(), Some("ada"));
        assert_eq!(result.error, None);

        let records = fixture.records().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.interface_id, id);
        assert_eq!(record.interface_name, "user lookup");
        assert_eq!(record.executor_id, "u-7");
        assert_eq!(record.executor_name, "Ada");
        assert_eq!(record.response_status, Some(200));
        assert_eq!(record.response_body, result.body);
        assert_eq!(record.elapsed_ms, Some(result.elapsed_ms));
        assert_eq!(record.remark.as_deref(), Some("smoke"));
        assert_eq!(record.client_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(record.user_agent.as_deref(), Some("integration-test"));
        assert!(record.success);
    }

    #[tokio::test]
    async fn request_is_assembled_from_bound_parameters() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let id = fixture.register(echo(&base_url)).await;

        let request = InvocationRequest::builder()
            .interface_id(id)
            .headers(HashMap::from([
                ("x-tenant".to_string(), "evil".to_string()),
                ("X-Trace".to_string(), "t-1".to_string()),
            ]))
            .body_params(HashMap::from([
                ("order_id".to_string(), json!("9000000000")),
                ("express".to_string(), json!("TRUE")),
                ("undeclared".to_string(), json!("dropped")),
            ]))
            .build();
        let result = fixture.run(request).await.unwrap();
        assert_eq!(result.extracted_value.as_deref(), Some("POST"));

        let echoed: Value = serde_json::from_str(result.body.as_deref().unwrap()).unwrap();
        assert_eq!(echoed["query"], json!("v=1&page=1"));
        assert_eq!(echoed["headers"]["x-tenant"], json!("acme"));
        assert_eq!(echoed["headers"]["x-trace"], json!("t-1"));
        assert_eq!(echoed["headers"]["content-type"], json!("application/json"));
        let sent: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
        assert_eq!(sent, json!({"order_id": 9000000000i64, "express": true}));

        let record = fixture.records().await.remove(0);
        assert_eq!(record.request_params.as_deref(), Some(r#"{"page":1}"#));
        let recorded_body: Value = serde_json::from_str(record.request_body.as_deref().unwrap()).unwrap();
        assert_eq!(recorded_body, sent);
        let recorded_headers: Value = serde_json::from_str(record.request_headers.as_deref().unwrap()).unwrap();
        assert_eq!(recorded_headers["X-Tenant"], json!("acme"));
    }

    #[tokio::test]
    async fn error_status_is_still_a_success() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let mut interface = user_lookup(&base_url);
        interface.url = format!("{}/missing", base_url);
        let id = fixture.register(interface).await;

        let result = fixture
            .run(InvocationRequest::builder().interface_id(id).build())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status, Some(404));
        assert_eq!(result.extracted_value, None);
        assert!(fixture.records().await[0].success);
    }

    #[tokio::test]
    async fn unreachable_host_is_recorded_as_failure() {
        let base_url = unreachable_base_url().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;

        let result = fixture
            .run(InvocationRequest::builder().interface_id(id).build())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.status, None);
        assert_eq!(result.extracted_value, None);
        assert!(result.error.is_some());

        let record = fixture.records().await.remove(0);
        assert!(!record.success);
        assert_eq!(record.response_status, None);
        assert_eq!(record.error_message, result.error);
    }

    #[tokio::test]
    async fn per_call_timeout_wins() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let mut interface = user_lookup(&base_url);
        interface.url = format!("{}/slow", base_url);
        interface.timeout = Some(30);
        let id = fixture.register(interface).await;

        let started_at = Instant::now();
        let mut request = InvocationRequest::builder().interface_id(id).build();
        request.timeout = Some(1);
        let result = fixture.run(request).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("request timed out after 1000 ms"));
        assert!(started_at.elapsed() < Duration::from_secs(3));
        assert_eq!(fixture.records().await.len(), 1);
    }

    #[tokio::test]
    async fn maximum_per_call_timeout_is_capped() {
        let base_url = unreachable_base_url().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;

        let mut request = InvocationRequest::builder().interface_id(id).build();
        request.timeout = Some(u64::MAX);
        let result = fixture.run(request).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("connection failed"));
        assert_eq!(fixture.records().await.len(), 1);
    }

    #[tokio::test]
    async fn truncated_body_is_recorded_with_partial_response() {
        let base_url = spawn_truncating_upstream().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;

        let result = fixture
            .run(InvocationRequest::builder().interface_id(id).build())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.body, None);
        assert_eq!(result.extracted_value, None);
        assert!(result.error.as_deref().unwrap().starts_with("failed to read response body"));

        let records = fixture.records().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert_eq!(records[0].response_status, Some(200));
        assert_eq!(records[0].error_message, result.error);
    }

    #[tokio::test]
    async fn rejected_invocations_leave_no_record() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let mut disabled = user_lookup(&base_url);
        disabled.status = InterfaceStatus::Disabled;
        let disabled_id = fixture.register(disabled).await;
        let echo_id = fixture.register(echo(&base_url)).await;

        assert!(matches!(
            fixture.run(InvocationRequest::builder().interface_id(disabled_id).build()).await,
            Err(InvocationError::Disabled(_))
        ));
        assert!(matches!(
            fixture.run(InvocationRequest::builder().interface_id("nope").build()).await,
            Err(InvocationError::NotFound(_))
        ));
        assert!(matches!(
            fixture.run(InvocationRequest::builder().interface_id(echo_id).build()).await,
            Err(InvocationError::Binding(_))
        ));
        assert!(fixture.records().await.is_empty());
    }

    #[tokio::test]
    async fn unbuildable_request_is_recorded_without_sending() {
        let fixture = Fixture::new();
        let mut interface = user_lookup("http://127.0.0.1:1");
        interface.url = "::not a url::".to_string();
        let id = fixture.register(interface).await;

        let result = fixture
            .run(InvocationRequest::builder().interface_id(id).build())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid interface url"));
        assert_eq!(fixture.records().await.len(), 1);
    }

    #[tokio::test]
    async fn record_store_failure_does_not_change_the_result() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;
        fixture.repository.fail_record_writes(true);

        let result = fixture
            .run(InvocationRequest::builder().interface_id(id).build())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.extracted_value.as_deref(), Some("ada"));
        assert!(fixture.records().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_invocations_are_independent() {
        let base_url = spawn_upstream().await;
        let fixture = Fixture::new();
        let id = fixture.register(user_lookup(&base_url)).await;

        let calls = (0..8).map(|_| {
            let engine = fixture.engine.clone();
            let id = id.clone();
            async move {
                engine
                    .execute(InvocationRequest::builder().interface_id(id).build(), &actor(), &client_info())
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|result| matches!(result, Ok(result) if result.success)));
        assert_eq!(fixture.records().await.len(), 8);
    }
}
