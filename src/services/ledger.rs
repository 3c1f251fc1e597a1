use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::ToSchema;

/// A finished optimization, as handed to the ledger.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub original_name: String,
    pub original_size: u64,
    pub optimized_size: u64,
    pub format: String,
    pub quality: u8,
    pub compression_ratio: i32,
    pub processing_time_ms: u64,
}

/// A recorded optimization. Immutable after creation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: u64,
    pub original_name: String,
    pub original_size: u64,
    pub optimized_size: u64,
    pub format: String,
    pub quality: u8,
    pub compression_ratio: i32,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Append-only store of optimization outcomes, used for aggregate statistics.
#[async_trait]
pub trait OptimizationLedger: Send + Sync {
    /// Records an outcome, assigning a monotonically increasing id and a
    /// creation timestamp.
    async fn record(&self, entry: NewLedgerEntry) -> LedgerEntry;

    /// Most recently created entries, newest first, truncated to `limit`.
    async fn recent(&self, limit: usize) -> Vec<LedgerEntry>;

    /// Current number of retained entries.
    async fn len(&self) -> usize;
}

/// In-memory ledger backed by a concurrent map. Holds at most `capacity`
/// entries; ids are contiguous, so the oldest live id is always
/// `newest - capacity + 1` and eviction is a single keyed remove.
pub struct MemoryLedger {
    entries: DashMap<u64, LedgerEntry>,
    next_id: AtomicU64,
    capacity: usize,
}

impl MemoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl OptimizationLedger for MemoryLedger {
    async fn record(&self, entry: NewLedgerEntry) -> LedgerEntry {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let entry = LedgerEntry {
            id,
            original_name: entry.original_name,
            original_size: entry.original_size,
            optimized_size: entry.optimized_size,
            format: entry.format,
            quality: entry.quality,
            compression_ratio: entry.compression_ratio,
            processing_time_ms: entry.processing_time_ms,
            created_at: Utc::now(),
        };

        self.entries.insert(id, entry.clone());

        if id > self.capacity as u64 {
            self.entries.remove(&(id - self.capacity as u64));
        }

        entry
    }

    async fn recent(&self, limit: usize) -> Vec<LedgerEntry> {
        let mut snapshot: Vec<LedgerEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        snapshot.sort_by(|a, b| b.id.cmp(&a.id));
        snapshot.truncate(limit);
        snapshot
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Aggregate view over a set of ledger entries.
#[derive(Debug, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_images: usize,
    pub total_savings: i64,
    pub average_reduction: i32,
    pub average_processing_time: u64,
}

/// Computes the stats the `/api/stats` endpoint reports. Averages round to
/// the nearest integer; an empty slice yields zeros.
pub fn aggregate(entries: &[LedgerEntry]) -> LedgerStats {
    if entries.is_empty() {
        return LedgerStats {
            total_images: 0,
            total_savings: 0,
            average_reduction: 0,
            average_processing_time: 0,
        };
    }

    let count = entries.len();
    let total_savings: i64 = entries
        .iter()
        .map(|e| e.original_size as i64 - e.optimized_size as i64)
        .sum();
    let ratio_sum: i64 = entries.iter().map(|e| e.compression_ratio as i64).sum();
    let time_sum: u64 = entries.iter().map(|e| e.processing_time_ms).sum();

    LedgerStats {
        total_images: count,
        total_savings,
        average_reduction: (ratio_sum as f64 / count as f64).round() as i32,
        average_processing_time: (time_sum as f64 / count as f64).round() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_entry(name: &str, original: u64, optimized: u64, ratio: i32) -> NewLedgerEntry {
        NewLedgerEntry {
            original_name: name.to_string(),
            original_size: original,
            optimized_size: optimized,
            format: "jpeg".to_string(),
            quality: 85,
            compression_ratio: ratio,
            processing_time_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_record_assigns_monotonic_ids() {
        let ledger = MemoryLedger::new(100);

        let first = ledger.record(new_entry("a.jpg", 1000, 500, 50)).await;
        let second = ledger.record(new_entry("b.jpg", 1000, 800, 20)).await;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let ledger = MemoryLedger::new(100);
        for i in 0..5 {
            ledger
                .record(new_entry(&format!("{i}.jpg"), 1000, 500, 50))
                .await;
        }

        let recent = ledger.recent(3).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].original_name, "4.jpg");
        assert_eq!(recent[1].original_name, "3.jpg");
        assert_eq!(recent[2].original_name, "2.jpg");
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let ledger = MemoryLedger::new(3);
        for i in 0..5 {
            ledger
                .record(new_entry(&format!("{i}.jpg"), 1000, 500, 50))
                .await;
        }

        assert_eq!(ledger.len().await, 3);
        let recent = ledger.recent(10).await;
        assert_eq!(recent.len(), 3);
        // Entries 1 and 2 are gone, 3..=5 survive
        assert_eq!(recent[0].id, 5);
        assert_eq!(recent[2].id, 3);
    }

    #[test]
    fn test_aggregate_means() {
        let entries: Vec<LedgerEntry> = [(10, 90), (20, 100), (30, 110)]
            .iter()
            .enumerate()
            .map(|(i, (ratio, time))| LedgerEntry {
                id: i as u64 + 1,
                original_name: format!("{i}.jpg"),
                original_size: 1000,
                optimized_size: 600,
                format: "jpeg".to_string(),
                quality: 85,
                compression_ratio: *ratio,
                processing_time_ms: *time,
                created_at: Utc::now(),
            })
            .collect();

        let stats = aggregate(&entries);
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.total_savings, 1200);
        assert_eq!(stats.average_reduction, 20);
        assert_eq!(stats.average_processing_time, 100);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let stats = aggregate(&[]);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.total_savings, 0);
        assert_eq!(stats.average_reduction, 0);
        assert_eq!(stats.average_processing_time, 0);
    }

    #[test]
    fn test_aggregate_negative_savings() {
        let entries = vec![LedgerEntry {
            id: 1,
            original_name: "grew.png".to_string(),
            original_size: 1000,
            optimized_size: 1200,
            format: "png".to_string(),
            quality: 85,
            compression_ratio: -20,
            processing_time_ms: 50,
            created_at: Utc::now(),
        }];

        let stats = aggregate(&entries);
        assert_eq!(stats.total_savings, -200);
        assert_eq!(stats.average_reduction, -20);
    }
}
