use crate::execution_record::model::{ExecutionRecord, ExecutionStats, InterfaceUsage, Page};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Counts records per interface, highest count first. Ties go to the smaller interface id.
pub fn rank_usage(records: &[ExecutionRecord], limit: usize) -> Vec<InterfaceUsage> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.interface_id.as_str()).or_default() += 1;
    }
    let mut usage: Vec<InterfaceUsage> = counts
        .into_iter()
        .map(|(interface_id, count)| InterfaceUsage {
            interface_id: interface_id.to_string(),
            count,
        })
        .collect();
    usage.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.interface_id.cmp(&b.interface_id))
    });
    usage.truncate(limit);
    usage
}

/// `None` when there is nothing to summarize.
pub fn summarize(interface_id: &str, records: &[ExecutionRecord]) -> Option<ExecutionStats> {
    if records.is_empty() {
        return None;
    }
    let total = records.len();
    let success_count = records.iter().filter(|record| record.success).count();
    let timings: Vec<u64> = records.iter().filter_map(|record| record.elapsed_ms).collect();
    let avg_elapsed_ms = if timings.is_empty() {
        None
    } else {
        Some(timings.iter().sum::<u64>() as f64 / timings.len() as f64)
    };
    Some(ExecutionStats {
        interface_id: interface_id.to_string(),
        total,
        success_count,
        failure_count: total - success_count,
        success_rate: success_count as f64 / total as f64,
        avg_elapsed_ms,
        min_elapsed_ms: timings.iter().min().copied(),
        max_elapsed_ms: timings.iter().max().copied(),
        last_executed_at: records.iter().map(|record| record.created_at).max(),
    })
}

pub fn sort_newest_first(records: &mut [ExecutionRecord]) {
    records.sort_by_key(|record| (Reverse(record.created_at), Reverse(record.id.clone())));
}

/// Newest first, `page` is 1-based.
pub fn paginate(mut records: Vec<ExecutionRecord>, page: usize, size: usize) -> Page<ExecutionRecord> {
    sort_newest_first(&mut records);
    let total = records.len();
    let items = records
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(size))
        .take(size)
        .collect();
    Page {
        items,
        total,
        page,
        size,
    }
}
