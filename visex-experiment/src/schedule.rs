//! Trial scheduling: per block, half the trials carry the target, and the
//! order is shuffled.

use rand::seq::SliceRandom;
use rand::Rng;
use visex_core::BlockConfig;

/// One trial as planned before the session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrial {
    /// Index into the block table.
    pub block: usize,
    /// Trial index within its block.
    pub trial: usize,
    pub target_present: bool,
}

/// Target-presence sequence for one block: exactly `n / 2` present trials,
/// shuffled.
pub fn target_sequence<R: Rng>(n: usize, rng: &mut R) -> Vec<bool> {
    let mut trials: Vec<bool> = (0..n).map(|i| i < n / 2).collect();
    trials.shuffle(rng);
    trials
}

/// The full session schedule, blocks in configuration order.
pub fn build_schedule<R: Rng>(blocks: &[BlockConfig], rng: &mut R) -> Vec<PlannedTrial> {
    let mut schedule = Vec::with_capacity(blocks.iter().map(|b| b.repetitions).sum());
    for (block, config) in blocks.iter().enumerate() {
        for (trial, target_present) in target_sequence(config.repetitions, rng)
            .into_iter()
            .enumerate()
        {
            schedule.push(PlannedTrial {
                block,
                trial,
                target_present,
            });
        }
    }
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn half_of_the_trials_carry_the_target() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [1, 2, 9, 10, 16] {
            let seq = target_sequence(n, &mut rng);
            assert_eq!(seq.len(), n);
            assert_eq!(seq.iter().filter(|&&t| t).count(), n / 2);
        }
    }

    #[test]
    fn schedule_covers_every_block_in_order() {
        let blocks = vec![
            BlockConfig::new(8, 10.0, 10),
            BlockConfig::new(12, 12.0, 4),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let schedule = build_schedule(&blocks, &mut rng);

        assert_eq!(schedule.len(), 14);
        assert!(schedule[..10].iter().all(|t| t.block == 0));
        assert!(schedule[10..].iter().all(|t| t.block == 1));
        // within-block trial indices count up
        let indices: Vec<usize> = schedule[10..].iter().map(|t| t.trial).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn identical_seeds_give_identical_schedules() {
        let blocks = vec![BlockConfig::new(8, 10.0, 20)];
        let a = build_schedule(&blocks, &mut StdRng::seed_from_u64(3));
        let b = build_schedule(&blocks, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
