//! Last observed round-trip latency per replica
//!
//! A replica missing from the tracker has never produced a definitive answer.
//! Entries are overwritten, never averaged: routing reacts to the most recent
//! observation only.

use crate::client::types::ReplicaAddress;
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct LatencyTracker {
    stats: DashMap<ReplicaAddress, Duration>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the replica's latency with this observation
    pub fn record(&self, replica: &ReplicaAddress, latency: Duration) {
        self.stats.insert(replica.clone(), latency);
    }

    pub fn get(&self, replica: &ReplicaAddress) -> Option<Duration> {
        self.stats.get(replica).map(|entry| *entry.value())
    }

    pub fn is_measured(&self, replica: &ReplicaAddress) -> bool {
        self.stats.contains_key(replica)
    }

    /// Number of replicas with at least one observation
    pub fn measured_count(&self) -> usize {
        self.stats.len()
    }

    /// Split `replicas` into never-measured ones (input order kept) and
    /// measured ones paired with their latency.
    pub fn partition(
        &self,
        replicas: &[ReplicaAddress],
    ) -> (Vec<ReplicaAddress>, Vec<(ReplicaAddress, Duration)>) {
        let mut unmeasured = Vec::new();
        let mut measured = Vec::new();
        for replica in replicas {
            match self.get(replica) {
                Some(latency) => measured.push((replica.clone(), latency)),
                None => unmeasured.push(replica.clone()),
            }
        }
        (unmeasured, measured)
    }

    /// Unmeasured replicas first, then measured ones slowest first.
    pub fn rank_worst_first(&self, replicas: &[ReplicaAddress]) -> Vec<ReplicaAddress> {
        let (mut ranked, mut measured) = self.partition(replicas);
        measured.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.extend(measured.into_iter().map(|(replica, _)| replica));
        ranked
    }

    /// Measured replicas fastest first, then unmeasured ones.
    pub fn rank_best_first(&self, replicas: &[ReplicaAddress]) -> Vec<ReplicaAddress> {
        let (unmeasured, mut measured) = self.partition(replicas);
        measured.sort_by(|a, b| a.1.cmp(&b.1));
        let mut ranked: Vec<_> = measured.into_iter().map(|(replica, _)| replica).collect();
        ranked.extend(unmeasured);
        ranked
    }

    /// Up to `n` measured replicas from `replicas`, fastest first
    pub fn best_measured(&self, replicas: &[ReplicaAddress], n: usize) -> Vec<ReplicaAddress> {
        let (_, mut measured) = self.partition(replicas);
        measured.sort_by(|a, b| a.1.cmp(&b.1));
        measured.into_iter().take(n).map(|(replica, _)| replica).collect()
    }

    /// Point-in-time copy of all entries
    pub fn snapshot(&self) -> Vec<(ReplicaAddress, Duration)> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicas(names: &[&str]) -> Vec<ReplicaAddress> {
        names.iter().map(|n| ReplicaAddress::from(*n)).collect()
    }

    #[test]
    fn test_record_overwrites() {
        let tracker = LatencyTracker::new();
        let a = ReplicaAddress::from("a");
        assert!(!tracker.is_measured(&a));

        tracker.record(&a, Duration::from_millis(900));
        tracker.record(&a, Duration::from_millis(10));

        assert_eq!(tracker.get(&a), Some(Duration::from_millis(10)));
        assert_eq!(tracker.measured_count(), 1);
    }

    #[test]
    fn test_rank_worst_first() {
        let tracker = LatencyTracker::new();
        let all = replicas(&["a", "b", "c", "d"]);
        tracker.record(&all[0], Duration::from_millis(10));
        tracker.record(&all[2], Duration::from_millis(500));

        let ranked = tracker.rank_worst_first(&all);
        assert_eq!(ranked, replicas(&["b", "d", "c", "a"]));
    }

    #[test]
    fn test_rank_best_first() {
        let tracker = LatencyTracker::new();
        let all = replicas(&["a", "b", "c", "d"]);
        tracker.record(&all[1], Duration::from_millis(300));
        tracker.record(&all[3], Duration::from_millis(20));

        let ranked = tracker.rank_best_first(&all);
        assert_eq!(ranked, replicas(&["d", "b", "a", "c"]));
    }

    #[test]
    fn test_best_measured_ignores_unknown_and_foreign() {
        let tracker = LatencyTracker::new();
        let all = replicas(&["a", "b", "c"]);
        tracker.record(&all[0], Duration::from_millis(30));
        tracker.record(&all[1], Duration::from_millis(20));
        tracker.record(&ReplicaAddress::from("gone"), Duration::from_millis(1));

        assert_eq!(tracker.best_measured(&all, 1), replicas(&["b"]));
        assert_eq!(tracker.best_measured(&all, 5), replicas(&["b", "a"]));
    }

    #[test]
    fn test_concurrent_records() {
        let tracker = std::sync::Arc::new(LatencyTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    let replica = ReplicaAddress::from(format!("r{}", i % 4));
                    for ms in 0..100 {
                        tracker.record(&replica, Duration::from_millis(ms));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.measured_count(), 4);
        assert_eq!(tracker.snapshot().len(), 4);
    }
}
