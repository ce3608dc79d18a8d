//! Which replicas a strategy contacts, and in what order

use crate::client::latency::LatencyTracker;
use crate::client::types::ReplicaAddress;
use rand::seq::SliceRandom;
use rand::Rng;

/// Share of the fanout cap reserved for the best-measured replicas
const BEST_SHARE_NUM: usize = 4;
const BEST_SHARE_DEN: usize = 5;

/// Replica ordering used by each dispatch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaOrdering {
    /// One uniformly random replica
    Random,
    /// Unmeasured first, then measured slowest first (re-measure the suspects)
    WorstFirst,
    /// Measured fastest first, then unmeasured (exploit, then explore)
    BestFirst,
    /// Every replica, configured order
    All,
    /// At most `cap` replicas: best-measured share plus random fill, shuffled
    Bounded { cap: usize },
}

impl ReplicaOrdering {
    pub fn arrange<R: Rng + ?Sized>(
        &self,
        replicas: &[ReplicaAddress],
        stats: &LatencyTracker,
        rng: &mut R,
    ) -> Vec<ReplicaAddress> {
        match self {
            ReplicaOrdering::Random => replicas.choose(rng).cloned().into_iter().collect(),
            ReplicaOrdering::WorstFirst => stats.rank_worst_first(replicas),
            ReplicaOrdering::BestFirst => stats.rank_best_first(replicas),
            ReplicaOrdering::All => replicas.to_vec(),
            ReplicaOrdering::Bounded { cap } => bounded_selection(replicas, stats, *cap, rng),
        }
    }
}

/// Pick at most `cap` distinct replicas.
///
/// When statistics exist for at least 80% of the cap, the best-measured 80%
/// of the cap is taken first; the remainder is a random fill. The final list
/// is shuffled so launch order does not leak the ranking.
pub fn bounded_selection<R: Rng + ?Sized>(
    replicas: &[ReplicaAddress],
    stats: &LatencyTracker,
    cap: usize,
    rng: &mut R,
) -> Vec<ReplicaAddress> {
    let cap = cap.min(replicas.len());
    let best_share = cap * BEST_SHARE_NUM / BEST_SHARE_DEN;

    let measured = replicas.iter().filter(|r| stats.is_measured(r)).count();
    let mut selected = if best_share > 0 && measured >= best_share {
        stats.best_measured(replicas, best_share)
    } else {
        Vec::new()
    };

    let mut rest: Vec<_> = replicas
        .iter()
        .filter(|r| !selected.contains(r))
        .cloned()
        .collect();
    rest.shuffle(rng);
    selected.extend(rest.into_iter().take(cap - selected.len()));

    selected.shuffle(rng);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::time::Duration;

    fn replicas(n: usize) -> Vec<ReplicaAddress> {
        (0..n)
            .map(|i| ReplicaAddress::from(format!("http://r{}/m/", i)))
            .collect()
    }

    #[test]
    fn test_random_picks_one() {
        let all = replicas(5);
        let stats = LatencyTracker::new();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = ReplicaOrdering::Random.arrange(&all, &stats, &mut rng);
        assert_eq!(picked.len(), 1);
        assert!(all.contains(&picked[0]));

        assert!(ReplicaOrdering::Random
            .arrange(&[], &stats, &mut rng)
            .is_empty());
    }

    #[test]
    fn test_all_keeps_order() {
        let all = replicas(3);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            ReplicaOrdering::All.arrange(&all, &LatencyTracker::new(), &mut rng),
            all
        );
    }

    #[test]
    fn test_bounded_caps_and_dedups() {
        let all = replicas(25);
        let stats = LatencyTracker::new();
        let mut rng = StdRng::seed_from_u64(42);

        let picked = bounded_selection(&all, &stats, 10, &mut rng);
        assert_eq!(picked.len(), 10);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 10);
    }

    #[test]
    fn test_bounded_with_fewer_replicas_than_cap() {
        let all = replicas(4);
        let mut rng = StdRng::seed_from_u64(3);
        let picked = bounded_selection(&all, &LatencyTracker::new(), 10, &mut rng);
        assert_eq!(picked.iter().collect::<HashSet<_>>(), all.iter().collect());
    }

    #[test]
    fn test_bounded_prefers_best_measured() {
        let all = replicas(20);
        let stats = LatencyTracker::new();
        // Replicas 0..8 are measured; 0..8 get the best (lowest) latencies
        for (i, replica) in all.iter().enumerate().take(8) {
            stats.record(replica, Duration::from_millis(10 + i as u64));
        }
        // A slow measured one that must not make the best share
        stats.record(&all[19], Duration::from_secs(5));

        let mut rng = StdRng::seed_from_u64(9);
        let picked = bounded_selection(&all, &stats, 10, &mut rng);
        assert_eq!(picked.len(), 10);
        for best in &all[..8] {
            assert!(picked.contains(best), "missing best replica {}", best);
        }
    }

    #[test]
    fn test_bounded_random_only_without_enough_stats() {
        let all = replicas(20);
        let stats = LatencyTracker::new();
        // 7 measured < 8 required for a cap of 10
        for replica in all.iter().take(7) {
            stats.record(replica, Duration::from_millis(1));
        }

        // With pure random fill some seed must leave a measured replica out
        let left_out = (0..20).any(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = bounded_selection(&all, &stats, 10, &mut rng);
            assert_eq!(picked.len(), 10);
            all[..7].iter().any(|r| !picked.contains(r))
        });
        assert!(left_out, "selection never fell back to random fill");
    }
}
