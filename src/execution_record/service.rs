use crate::api::AppError;
use crate::clock::{now_millis, MILLIS_PER_DAY};
use crate::execution_record::analytics::{paginate, rank_usage, sort_newest_first, summarize};
use crate::execution_record::model::{
    ExecutionRecord, ExecutionRecordQuery, ExecutionStats, InterfaceSummary, Page, RecordFilter,
};
use crate::interface::model::ApiInterface;
use crate::interface::service::InterfaceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Append-only audit store.
#[async_trait]
pub trait ExecutionRecordStore: Send + Sync {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AppError>;

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, AppError>;

    /// Every record the filter matches, in no particular order.
    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, AppError>;

    /// Removes records created strictly before `cutoff` and returns how many went.
    async fn delete_created_before(&self, cutoff: u64) -> Result<usize, AppError>;
}

/// Read side over the execution records: rankings, stats, search and retention.
#[derive(Clone)]
pub struct UsageAnalytics {
    interfaces: Arc<dyn InterfaceStore>,
    records: Arc<dyn ExecutionRecordStore>,
}

impl UsageAnalytics {
    pub fn new(interfaces: Arc<dyn InterfaceStore>, records: Arc<dyn ExecutionRecordStore>) -> Self {
        UsageAnalytics { interfaces, records }
    }

    /// Interfaces with the most executions in `[now - days, now]`. Interfaces that no longer
    /// exist are left out of the result.
    pub async fn most_used(&self, days: u64, limit: usize) -> Result<Vec<InterfaceSummary>, AppError> {
        let now = now_millis();
        let from = now.saturating_sub(days.saturating_mul(MILLIS_PER_DAY));
        let records = self.records.scan(&RecordFilter::created_between(from, now)).await?;
        let usage = rank_usage(&records, limit);
        if usage.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = usage.iter().map(|entry| entry.interface_id.clone()).collect();
        let interfaces = self.interfaces.batch_get(ids).await?;
        let by_id: HashMap<&str, &ApiInterface> = interfaces
            .iter()
            .map(|interface| (interface.id.as_str(), interface))
            .collect();
        Ok(usage
            .iter()
            .filter_map(|entry| match by_id.get(entry.interface_id.as_str()) {
                Some(interface) => Some(InterfaceSummary::from_interface(interface, entry.count)),
                None => {
                    debug!("skipping usage of missing interface {}", entry.interface_id);
                    None
                }
            })
            .collect())
    }

    pub async fn stats(&self, interface_id: &str) -> Result<Option<ExecutionStats>, AppError> {
        let records = self.records.scan(&RecordFilter::for_interface(interface_id)).await?;
        Ok(summarize(interface_id, &records))
    }

    /// Both ends inclusive.
    pub async fn count_between(&self, start_time: u64, end_time: u64) -> Result<usize, AppError> {
        if start_time > end_time {
            return Err(AppError::Validation(format!(
                "start time {} is after end time {}",
                start_time, end_time
            )));
        }
        let records = self
            .records
            .scan(&RecordFilter::created_between(start_time, end_time))
            .await?;
        Ok(records.len())
    }

    pub async fn cleanup(&self, before_time: u64) -> Result<usize, AppError> {
        let removed = self.records.delete_created_before(before_time).await?;
        info!("removed {} execution records created before {}", removed, before_time);
        Ok(removed)
    }

    pub async fn search_records(&self, query: &ExecutionRecordQuery) -> Result<Page<ExecutionRecord>, AppError> {
        let records = self.records.scan(&query.filter()).await?;
        Ok(paginate(records, query.page(), query.size()))
    }

    pub async fn get_record(&self, id: &str) -> Result<Option<ExecutionRecord>, AppError> {
        self.records.get(id).await
    }

    pub async fn recent_by_interface(&self, interface_id: &str, limit: usize) -> Result<Vec<ExecutionRecord>, AppError> {
        self.recent(RecordFilter::for_interface(interface_id), limit).await
    }

    pub async fn recent_by_executor(&self, executor_id: &str, limit: usize) -> Result<Vec<ExecutionRecord>, AppError> {
        let filter = RecordFilter {
            executor_id: Some(executor_id.to_string()),
            ..RecordFilter::default()
        };
        self.recent(filter, limit).await
    }

    async fn recent(&self, filter: RecordFilter, limit: usize) -> Result<Vec<ExecutionRecord>, AppError> {
        let mut records = self.records.scan(&filter).await?;
        sort_newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::persistence::memory::MemoryRepository;

    fn record(interface_id: &str, executor_id: &str, created_at: u64) -> ExecutionRecord {
        ExecutionRecord::builder()
            .interface_id(interface_id)
            .interface_name(interface_id)
            .executor_id(executor_id)
            .executor_name(format!("user {}", executor_id))
            .success(true)
            .elapsed_ms(10)
            .created_at(created_at)
            .build()
    }

    fn interface(id: &str) -> ApiInterface {
        ApiInterface::builder()
            .id(id.to_string())
            .name(format!("interface {}", id))
            .method(HttpMethod::GET)
            .url("https://api.example.com")
            .build()
    }

    async fn analytics_with(records: Vec<ExecutionRecord>) -> UsageAnalytics {
        let repository = Arc::new(MemoryRepository::new());
        for id in ["a", "b", "c"] {
            InterfaceStore::create(repository.as_ref(), interface(id)).await.unwrap();
        }
        for record in records {
            ExecutionRecordStore::create(repository.as_ref(), record).await.unwrap();
        }
        UsageAnalytics::new(repository.clone(), repository)
    }

    #[tokio::test]
    async fn most_used_returns_top_interfaces_in_order() {
        let now = now_millis();
        let mut records = vec![];
        for (id, count) in [("a", 5), ("b", 3), ("c", 1)] {
            for _ in 0..count {
                records.push(record(id, "u-1", now - 1_000));
            }
        }
        for _ in 0..5 {
            records.push(record("c", "u-1", now - 30 * MILLIS_PER_DAY));
        }
        let analytics = analytics_with(records).await;

        let top = analytics.most_used(7, 2).await.unwrap();
        let ids: Vec<&str> = top.iter().map(|summary| summary.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(top[0].execution_count, 5);
        assert_eq!(top[0].name, "interface a");
    }

    #[tokio::test]
    async fn most_used_skips_deleted_interfaces() {
        let now = now_millis();
        let analytics = analytics_with(vec![
            record("gone", "u-1", now - 10),
            record("gone", "u-1", now - 10),
            record("a", "u-1", now - 10),
        ])
        .await;
        let top = analytics.most_used(1, 5).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "a");
    }

    #[tokio::test]
    async fn cleanup_removes_strictly_older_records() {
        let analytics = analytics_with(vec![
            record("a", "u-1", 0),
            record("a", "u-1", 10),
            record("a", "u-1", 20),
        ])
        .await;
        assert_eq!(analytics.cleanup(15).await.unwrap(), 2);
        let left = analytics.recent_by_interface("a", 10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].created_at, 20);
        assert_eq!(analytics.cleanup(20).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_without_executions_is_no_data() {
        let analytics = analytics_with(vec![record("a", "u-1", 5)]).await;
        assert_eq!(analytics.stats("b").await.unwrap(), None);
        let stats = analytics.stats("a").await.unwrap().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[tokio::test]
    async fn count_between_is_inclusive() {
        let analytics = analytics_with(vec![
            record("a", "u-1", 10),
            record("b", "u-1", 15),
            record("c", "u-1", 20),
            record("c", "u-1", 21),
        ])
        .await;
        assert_eq!(analytics.count_between(10, 20).await.unwrap(), 3);
        assert!(matches!(
            analytics.count_between(20, 10).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn search_filters_and_pages() {
        let analytics = analytics_with(vec![
            record("a", "u-1", 1),
            record("a", "u-2", 2),
            record("a", "u-1", 3),
            record("b", "u-1", 4),
        ])
        .await;
        let query = ExecutionRecordQuery {
            interface_id: Some("a".to_string()),
            executor_id: Some("u-1".to_string()),
            size: Some(1),
            ..ExecutionRecordQuery::default()
        };
        let page = analytics.search_records(&query).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].created_at, 3);
    }

    #[tokio::test]
    async fn recent_by_executor_is_newest_first_and_limited() {
        let analytics = analytics_with(vec![
            record("a", "u-1", 1),
            record("b", "u-1", 3),
            record("c", "u-1", 2),
            record("c", "u-2", 9),
        ])
        .await;
        let recent = analytics.recent_by_executor("u-1", 2).await.unwrap();
        let created: Vec<u64> = recent.iter().map(|record| record.created_at).collect();
        assert_eq!(created, vec![3, 2]);

        let id = recent[0].id.clone();
        assert_eq!(analytics.get_record(&id).await.unwrap().map(|record| record.created_at), Some(3));
        assert_eq!(analytics.get_record("nope").await.unwrap(), None);
    }
}
