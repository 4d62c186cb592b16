use crate::api::AppError;
use crate::execution_record::model::{ExecutionRecord, RecordFilter};
use crate::execution_record::service::ExecutionRecordStore;
use crate::interface::model::{ApiInterface, InterfaceStatus};
use crate::interface::service::InterfaceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-process stores. Backs the test suite and `CONDUIT_STORAGE=memory`.
#[derive(Default)]
pub struct MemoryRepository {
    interfaces: RwLock<HashMap<String, ApiInterface>>,
    records: RwLock<Vec<ExecutionRecord>>,
    fail_record_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent record write fail, to observe how callers cope.
    pub fn fail_record_writes(&self, fail: bool) {
        self.fail_record_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl InterfaceStore for MemoryRepository {
    async fn get(&self, id: &str) -> Result<Option<ApiInterface>, AppError> {
        Ok(self.interfaces.read().await.get(id).cloned())
    }

    async fn batch_get(&self, ids: Vec<String>) -> Result<Vec<ApiInterface>, AppError> {
        let interfaces = self.interfaces.read().await;
        Ok(ids.iter().filter_map(|id| interfaces.get(id).cloned()).collect())
    }

    async fn create(&self, interface: ApiInterface) -> Result<ApiInterface, AppError> {
        self.interfaces
            .write()
            .await
            .insert(interface.id.clone(), interface.clone());
        Ok(interface)
    }

    async fn update_status(
        &self,
        id: &str,
        status: InterfaceStatus,
        updated_at: u64,
    ) -> Result<Option<ApiInterface>, AppError> {
        let mut interfaces = self.interfaces.write().await;
        Ok(interfaces.get_mut(id).map(|interface| {
            interface.status = status;
            interface.updated_at = updated_at;
            interface.clone()
        }))
    }
}

#[async_trait]
impl ExecutionRecordStore for MemoryRepository {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AppError> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("execution record store is unavailable".to_string()));
        }
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn delete_created_before(&self, cutoff: u64) -> Result<usize, AppError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.created_at >= cutoff);
        Ok(before - records.len())
    }
}
