use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};

/// Decides the order in which queues are polled each round.
///
/// Weighted mode draws queues one at a time without replacement, each draw
/// proportional to the weights still in play. A queue with weight 6 therefore
/// comes first six times as often as one with weight 1, yet every queue is
/// part of every round and can never be starved. A round costs
/// O(queues²) regardless of how large the weights are.
#[derive(Debug, Clone)]
pub struct QueueScheduler {
    queues: Vec<(String, u32)>,
    strict: bool,
}

impl QueueScheduler {
    /// Build a scheduler over `queue name -> weight`
    pub fn new(queues: &BTreeMap<String, u32>, strict: bool) -> Self {
        let mut queues: Vec<(String, u32)> = queues.iter().map(|(name, weight)| (name.clone(), *weight)).collect();
        // Heaviest first, ties by name, so strict mode is deterministic
        queues.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { queues, strict }
    }

    /// Queue names in the order to try for the next pull
    pub fn round(&self) -> Vec<&str> {
        if self.strict || self.queues.len() == 1 {
            return self.queues.iter().map(|(name, _)| name.as_str()).collect();
        }

        let mut rng = rand::thread_rng();
        let mut remaining: Vec<(&str, u64)> = self
            .queues
            .iter()
            .map(|(name, weight)| (name.as_str(), u64::from(*weight)))
            .collect();
        let mut order: Vec<&str> = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            // Zero weights leave nothing to draw from; keep the rest in weight order
            let Ok(draw) = WeightedIndex::new(remaining.iter().map(|(_, weight)| *weight)) else {
                order.extend(remaining.iter().map(|(name, _)| *name));
                break;
            };
            let (name, _) = remaining.remove(draw.sample(&mut rng));
            order.push(name);
        }
        order
    }

    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn weights() -> BTreeMap<String, u32> {
        BTreeMap::from([
            ("critical".to_string(), 6),
            ("default".to_string(), 3),
            ("low".to_string(), 1),
        ])
    }

    #[test]
    fn test_strict_order() {
        let scheduler = QueueScheduler::new(&weights(), true);
        for _ in 0..10 {
            assert_eq!(scheduler.round(), vec!["critical", "default", "low"]);
        }
    }

    #[test]
    fn test_every_queue_in_every_round() {
        let scheduler = QueueScheduler::new(&weights(), false);
        for _ in 0..500 {
            let mut round = scheduler.round();
            round.sort();
            assert_eq!(round, vec!["critical", "default", "low"]);
        }
    }

    #[test]
    fn test_weighted_share() {
        let scheduler = QueueScheduler::new(&weights(), false);
        let mut first: HashMap<&str, u32> = HashMap::new();
        let rounds = 10_000;

        for _ in 0..rounds {
            *first.entry(scheduler.round()[0]).or_default() += 1;
        }

        let share = |name: &str| f64::from(first.get(name).copied().unwrap_or(0)) / f64::from(rounds);
        assert!((0.55..0.65).contains(&share("critical")), "critical share {}", share("critical"));
        assert!((0.25..0.35).contains(&share("default")), "default share {}", share("default"));
        assert!((0.07..0.13).contains(&share("low")), "low share {}", share("low"));
    }

    #[test]
    fn test_huge_weights_round_is_cheap() {
        let queues = BTreeMap::from([
            ("bulk".to_string(), u32::MAX),
            ("default".to_string(), u32::MAX - 1),
            ("low".to_string(), 1),
        ]);
        let scheduler = QueueScheduler::new(&queues, false);

        let started = std::time::Instant::now();
        for _ in 0..1_000 {
            let mut round = scheduler.round();
            round.sort();
            assert_eq!(round, vec!["bulk", "default", "low"]);
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_zero_weights_still_listed() {
        let queues = BTreeMap::from([("a".to_string(), 0), ("b".to_string(), 0)]);
        let scheduler = QueueScheduler::new(&queues, false);
        assert_eq!(scheduler.round(), vec!["a", "b"]);
    }
}
