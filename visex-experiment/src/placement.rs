//! Search-array construction: stimulus drawing and circle placement.

use crate::stimuli::StimulusSet;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::f32::consts::TAU;
use visex_core::{BlockConfig, ImageStimulus, Placement};

/// Positions for `n` stimuli on a circle of `radius`, equally spaced,
/// rotated by `offset` radians. Positions are fixation-relative units,
/// y pointing up.
pub fn circle_positions(n: usize, radius: f32, offset: f32) -> Vec<(f32, f32)> {
    let step = TAU / n as f32;
    (0..n)
        .map(|i| {
            let angle = step * i as f32 + offset;
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Draw the stimuli for one trial: one target (uniformly chosen) plus
/// `set_size - 1` distractors when the target is present, `set_size`
/// distractors otherwise. Distractors are drawn with replacement, so small
/// catalogues still fill large arrays.
pub fn draw_stimuli<R: Rng>(
    set: &StimulusSet,
    set_size: usize,
    target_present: bool,
    rng: &mut R,
) -> Vec<ImageStimulus> {
    if set_size == 0 {
        return Vec::new();
    }

    let mut stimuli = Vec::with_capacity(set_size);
    let distractor_count = if target_present {
        // choose() only returns None on an empty slice, which scan() rejects
        if let Some(target) = set.targets().choose(rng) {
            stimuli.push(target.clone());
        }
        set_size - 1
    } else {
        set_size
    };

    for _ in 0..distractor_count {
        if let Some(distractor) = set.distractors().choose(rng) {
            stimuli.push(distractor.clone());
        }
    }

    stimuli.shuffle(rng);
    stimuli
}

/// Build the full search array for a trial: drawn stimuli placed on the
/// block's circle, with a random rotation offset when the block asks for it.
pub fn build_array<R: Rng>(
    set: &StimulusSet,
    block: &BlockConfig,
    target_present: bool,
    rng: &mut R,
) -> Vec<Placement<ImageStimulus>> {
    let stimuli = draw_stimuli(set, block.set_size, target_present, rng);
    let offset = if block.rotate {
        rng.random_range(0.0..TAU)
    } else {
        0.0
    };
    let positions = circle_positions(stimuli.len(), block.radius, offset);

    stimuli
        .into_iter()
        .zip(positions)
        .map(|(stimulus, position)| Placement { stimulus, position })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use visex_core::{Stimulus, StimulusKind};

    fn test_set(targets: usize, distractors: usize) -> StimulusSet {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::create_dir(dir.path().join("distractor")).unwrap();
        for i in 0..targets {
            std::fs::write(dir.path().join("target").join(format!("t{i}.png")), b"x").unwrap();
        }
        for i in 0..distractors {
            std::fs::write(
                dir.path().join("distractor").join(format!("d{i}.png")),
                b"x",
            )
            .unwrap();
        }
        StimulusSet::scan(dir.path()).unwrap()
    }

    #[test]
    fn positions_sit_on_the_circle() {
        for (n, radius) in [(1, 5.0_f32), (8, 10.0), (16, 14.0)] {
            for (x, y) in circle_positions(n, radius, 0.8) {
                assert!((x.hypot(y) - radius).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn positions_are_equally_spaced() {
        let positions = circle_positions(8, 10.0, 0.0);
        assert_eq!(positions.len(), 8);
        // without an offset the first stimulus sits at angle zero
        assert!((positions[0].0 - 10.0).abs() < 1e-4);
        assert!(positions[0].1.abs() < 1e-4);

        // neighboring angular gaps are all 2*pi/8
        let angles: Vec<f32> = positions.iter().map(|(x, y)| y.atan2(*x)).collect();
        for pair in angles.windows(2) {
            let gap = (pair[1] - pair[0]).rem_euclid(std::f32::consts::TAU);
            assert!((gap - std::f32::consts::TAU / 8.0).abs() < 1e-3);
        }
    }

    #[test]
    fn present_arrays_hold_exactly_one_target() {
        let set = test_set(3, 4);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let stimuli = draw_stimuli(&set, 8, true, &mut rng);
            assert_eq!(stimuli.len(), 8);
            assert_eq!(stimuli.iter().filter(|s| s.is_target()).count(), 1);
        }
    }

    #[test]
    fn absent_arrays_hold_no_target() {
        let set = test_set(3, 4);
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..50 {
            let stimuli = draw_stimuli(&set, 8, false, &mut rng);
            assert_eq!(stimuli.len(), 8);
            assert!(stimuli.iter().all(|s| s.kind == StimulusKind::Distractor));
        }
    }

    #[test]
    fn set_size_zero_yields_an_empty_array() {
        let set = test_set(2, 2);
        let mut rng = StdRng::seed_from_u64(21);
        assert!(draw_stimuli(&set, 0, true, &mut rng).is_empty());
        assert!(draw_stimuli(&set, 0, false, &mut rng).is_empty());
    }

    #[test]
    fn set_size_one_with_target_is_just_the_target() {
        let set = test_set(2, 2);
        let mut rng = StdRng::seed_from_u64(13);
        let stimuli = draw_stimuli(&set, 1, true, &mut rng);
        assert_eq!(stimuli.len(), 1);
        assert!(stimuli[0].is_target());
    }

    #[test]
    fn array_respects_block_radius_and_rotation_flag() {
        let set = test_set(1, 2);
        let mut block = BlockConfig::new(6, 12.0, 1);
        block.rotate = false;
        let mut rng = StdRng::seed_from_u64(5);

        let array = build_array(&set, &block, true, &mut rng);
        assert_eq!(array.len(), 6);
        for placement in &array {
            let (x, y) = placement.position;
            assert!((x.hypot(y) - 12.0).abs() < 1e-3);
        }
        // rotation disabled: one stimulus sits exactly at angle zero
        assert!(array
            .iter()
            .any(|p| (p.position.0 - 12.0).abs() < 1e-3 && p.position.1.abs() < 1e-3));
    }
}
