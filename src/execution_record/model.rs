use crate::clock::now_millis;
use crate::interface::model::{ApiInterface, InterfaceStatus};
use bon::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 200;

/// Audit trail of one invocation. Written once, never updated, removed only by cleanup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
pub struct ExecutionRecord {
    #[builder(default = uuid::Uuid::new_v4().to_string())]
    pub id: String,
    #[builder(into)]
    pub interface_id: String,
    #[builder(into)]
    pub interface_name: String,
    #[builder(into)]
    pub executor_id: String,
    #[builder(into)]
    pub executor_name: String,
    /// Bound URL parameters as a JSON object text.
    pub request_params: Option<String>,
    /// Final outbound headers as a JSON object text.
    pub request_headers: Option<String>,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    pub response_headers: Option<String>,
    pub response_body: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub remark: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    #[builder(default = now_millis())]
    pub created_at: u64,
}

/// Store-level predicate. Every bound is inclusive; unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub interface_id: Option<String>,
    pub executor_id: Option<String>,
    /// Case-insensitive substring match.
    pub executor_name: Option<String>,
    pub success: Option<bool>,
    pub min_elapsed_ms: Option<u64>,
    pub max_elapsed_ms: Option<u64>,
    pub created_from: Option<u64>,
    pub created_to: Option<u64>,
}

impl RecordFilter {
    pub fn for_interface(interface_id: impl Into<String>) -> Self {
        RecordFilter {
            interface_id: Some(interface_id.into()),
            ..RecordFilter::default()
        }
    }

    pub fn created_between(from: u64, to: u64) -> Self {
        RecordFilter {
            created_from: Some(from),
            created_to: Some(to),
            ..RecordFilter::default()
        }
    }

    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        if let Some(interface_id) = &self.interface_id {
            if &record.interface_id != interface_id {
                return false;
            }
        }
        if let Some(executor_id) = &self.executor_id {
            if &record.executor_id != executor_id {
                return false;
            }
        }
        if let Some(name) = &self.executor_name {
            if !record
                .executor_name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        if let Some(success) = self.success {
            if record.success != success {
                return false;
            }
        }
        if self.min_elapsed_ms.is_some() || self.max_elapsed_ms.is_some() {
            let Some(elapsed) = record.elapsed_ms else {
                return false;
            };
            if self.min_elapsed_ms.is_some_and(|min| elapsed < min)
                || self.max_elapsed_ms.is_some_and(|max| elapsed > max)
            {
                return false;
            }
        }
        !(self.created_from.is_some_and(|from| record.created_at < from)
            || self.created_to.is_some_and(|to| record.created_at > to))
    }
}

/// Query-string shape of the record search. `page` is 1-based.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionRecordQuery {
    pub interface_id: Option<String>,
    pub executor_id: Option<String>,
    pub executor_name: Option<String>,
    pub success: Option<bool>,
    pub min_execution_time: Option<u64>,
    pub max_execution_time: Option<u64>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl ExecutionRecordQuery {
    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            interface_id: self.interface_id.clone().filter(|id| !id.trim().is_empty()),
            executor_id: self.executor_id.clone().filter(|id| !id.trim().is_empty()),
            executor_name: self.executor_name.clone().filter(|name| !name.trim().is_empty()),
            success: self.success,
            min_elapsed_ms: self.min_execution_time,
            max_elapsed_ms: self.max_execution_time,
            created_from: self.start_time,
            created_to: self.end_time,
        }
    }

    pub fn page(&self) -> usize {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn size(&self) -> usize {
        self.size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InterfaceUsage {
    pub interface_id: String,
    pub count: usize,
}

/// Aggregates over all records of one interface. Timings only consider records that
/// carry an elapsed time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExecutionStats {
    pub interface_id: String,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Fraction in `[0, 1]`.
    pub success_rate: f64,
    pub avg_elapsed_ms: Option<f64>,
    pub min_elapsed_ms: Option<u64>,
    pub max_elapsed_ms: Option<u64>,
    pub last_executed_at: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InterfaceSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    pub method: String,
    pub status: InterfaceStatus,
    pub execution_count: usize,
}

impl InterfaceSummary {
    pub fn from_interface(interface: &ApiInterface, execution_count: usize) -> Self {
        InterfaceSummary {
            id: interface.id.clone(),
            name: interface.name.clone(),
            url: interface.url.clone(),
            method: interface.method.to_string(),
            status: interface.status,
            execution_count,
        }
    }
}
