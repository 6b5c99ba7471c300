use itertools::Itertools;
use rand::Rng;
use serde::Serialize;

use crate::config::CoverStory;
use crate::stage::StageArea;

pub const PREFERRED_SEPARATION: i32 = 60;
pub const REDUCED_SEPARATION: i32 = 40;
const MAX_PLACEMENT_ATTEMPTS: usize = 5000;
const EVEN_SPACING_JITTER: f32 = 0.3;

// Reference height the scale factor is measured against.
const DESIGN_HEIGHT: f32 = 1080.0;
const PROGRESS_BAR_WIDTH: f32 = 12.0;
const PROGRESS_BAR_PADDING: f32 = 20.0;
const SPRITE_BASE_SIZE: f32 = 200.0;

/// Horizontal band the spawner may place candidates in, with the
/// progress-indicator zone already carved out of the left edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnLane {
    pub min_x: i32,
    pub max_x: i32,
}

/// Cover-story flavored motion and sizing profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnProfile {
    pub scale_min: f32,
    pub scale_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Candidates rise from the bottom instead of falling from the top.
    pub upward: bool,
}

impl SpawnProfile {
    pub fn for_story(story: CoverStory) -> Self {
        match story {
            CoverStory::MoonMission => Self {
                scale_min: 0.18,
                scale_max: 0.35,
                speed_min: 30.0,
                speed_max: 65.0,
                upward: false,
            },
            CoverStory::HomeworkHelper => Self {
                scale_min: 0.28,
                scale_max: 0.45,
                speed_min: 30.0,
                speed_max: 65.0,
                upward: true,
            },
        }
    }
}

/// One candidate to hand to the stage: its value, lane position, visual
/// scale and vertical speed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpawnSpec {
    pub value: i32,
    pub x: i32,
    pub scale: f32,
    pub vy: f32,
}

/// Usable horizontal band for the given stage size: everything right of the
/// progress indicator (plus half the widest possible sprite) and short of
/// the right margin.
pub fn lane_for(area: StageArea, profile: &SpawnProfile) -> SpawnLane {
    let scale_factor = area.height / DESIGN_HEIGHT;
    let progress_x = (75.0 * scale_factor).floor();
    let max_object_size = profile.scale_max * scale_factor * SPRITE_BASE_SIZE;
    let progress_right =
        progress_x + PROGRESS_BAR_WIDTH + PROGRESS_BAR_PADDING + max_object_size * 0.5;
    let min_x = (progress_right.ceil() as i32).max(12);
    let max_x = area.width as i32 - 50;
    SpawnLane { min_x, max_x }
}

/// Draw `count` X positions inside the lane. Random placement first at the
/// preferred separation, then at the reduced one, sharing a bounded attempt
/// budget; an evenly spaced layout with bounded jitter is the last resort.
/// The result is ascending and duplicate-free.
pub fn positions(count: usize, lane: SpawnLane, rng: &mut impl Rng) -> Vec<i32> {
    if count == 0 || lane.max_x < lane.min_x {
        return Vec::new();
    }

    let mut positions: Vec<i32> = Vec::new();
    let mut attempts = 0;
    for min_dist in [PREFERRED_SEPARATION, REDUCED_SEPARATION] {
        while positions.len() < count && attempts < MAX_PLACEMENT_ATTEMPTS {
            let x = rng.gen_range(lane.min_x..=lane.max_x);
            let far_enough = positions.iter().all(|px| (px - x).abs() >= min_dist);
            if far_enough {
                positions.push(x);
            }
            attempts += 1;
        }
        if positions.len() >= count {
            break;
        }
    }

    positions.sort_unstable();
    positions.dedup();

    if positions.len() < count {
        // Even spacing with jitter bounded to 30% of the base gap, which
        // cannot reorder neighbours.
        let available = (lane.max_x - lane.min_x) as f32;
        let base_spacing = available / (count as f32 + 1.0);
        let jitter = base_spacing * EVEN_SPACING_JITTER;
        positions = (1..=count)
            .map(|i| {
                let offset = rng.gen_range(-jitter..=jitter);
                (lane.min_x as f32 + base_spacing * i as f32 + offset).floor() as i32
            })
            .collect();
    }

    positions.truncate(count);
    positions
}

/// Linear interpolation of each candidate's visual scale by where its value
/// sits between the option set's min and max. All-equal sets collapse to
/// the midpoint scale.
pub fn scales(options: &[i32], profile: &SpawnProfile, scale_factor: f32) -> Vec<f32> {
    let min_size = profile.scale_min * scale_factor;
    let max_size = profile.scale_max * scale_factor;
    let min_value = options.iter().min().copied().unwrap_or(0);
    let max_value = options.iter().max().copied().unwrap_or(0);
    options
        .iter()
        .map(|&value| {
            if max_value == min_value {
                (min_size + max_size) / 2.0
            } else {
                let normalized = (value - min_value) as f32 / (max_value - min_value) as f32;
                min_size + normalized * (max_size - min_size)
            }
        })
        .collect()
}

/// Full layout for one question's option set.
pub fn layout(
    options: &[i32],
    area: StageArea,
    profile: &SpawnProfile,
    rng: &mut impl Rng,
) -> Vec<SpawnSpec> {
    let lane = lane_for(area, profile);
    let xs = positions(options.len(), lane, rng);
    let scale_factor = area.height / DESIGN_HEIGHT;
    let scales = scales(options, profile, scale_factor);
    options
        .iter()
        .zip(xs)
        .zip(scales)
        .map(|((&value, x), scale)| {
            let speed = rng.gen_range(profile.speed_min..=profile.speed_max) * 0.5;
            let vy = if profile.upward { -speed } else { speed };
            SpawnSpec {
                value,
                x,
                scale,
                vy,
            }
        })
        .collect()
}

/// Minimum pairwise gap of an ascending position list, if it has at least
/// two entries.
pub fn min_gap(positions: &[i32]) -> Option<i32> {
    positions.iter().tuple_windows().map(|(a, b)| b - a).min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn wide_lane() -> SpawnLane {
        SpawnLane {
            min_x: 100,
            max_x: 1800,
        }
    }

    #[test]
    fn test_positions_respect_preferred_separation_in_wide_lane() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let xs = positions(6, wide_lane(), &mut rng);
            assert_eq!(xs.len(), 6);
            assert!(min_gap(&xs).unwrap() >= PREFERRED_SEPARATION);
            assert!(xs.iter().all(|&x| (100..=1800).contains(&x)));
        }
    }

    #[test]
    fn test_positions_are_sorted_ascending() {
        let mut rng = rand::thread_rng();
        let xs = positions(6, wide_lane(), &mut rng);
        let mut sorted = xs.clone();
        sorted.sort_unstable();
        assert_eq!(xs, sorted);
    }

    #[test]
    fn test_narrow_lane_falls_back_to_even_spacing() {
        // 6 positions cannot keep even the reduced separation in 120px.
        let lane = SpawnLane {
            min_x: 0,
            max_x: 120,
        };
        let mut rng = rand::thread_rng();
        let xs = positions(6, lane, &mut rng);
        assert_eq!(xs.len(), 6);
        assert!(xs.iter().all(|&x| (-10..=130).contains(&x)));
        // Jitter is bounded so neighbours never swap.
        let mut sorted = xs.clone();
        sorted.sort_unstable();
        assert_eq!(xs, sorted);
    }

    #[test]
    fn test_zero_count_yields_empty_layout() {
        let mut rng = rand::thread_rng();
        assert!(positions(0, wide_lane(), &mut rng).is_empty());
    }

    #[test]
    fn test_scales_interpolate_between_profile_bounds() {
        let profile = SpawnProfile::for_story(CoverStory::MoonMission);
        let scales = scales(&[10, 20, 30], &profile, 1.0);
        assert!((scales[0] - profile.scale_min).abs() < 1e-6);
        assert!((scales[2] - profile.scale_max).abs() < 1e-6);
        let midpoint = (profile.scale_min + profile.scale_max) / 2.0;
        assert!((scales[1] - midpoint).abs() < 1e-6);
    }

    #[test]
    fn test_equal_values_collapse_to_midpoint_scale() {
        let profile = SpawnProfile::for_story(CoverStory::HomeworkHelper);
        let scales = scales(&[7, 7, 7], &profile, 1.0);
        let midpoint = (profile.scale_min + profile.scale_max) / 2.0;
        for s in scales {
            assert!((s - midpoint).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scale_factor_shrinks_small_stages() {
        let profile = SpawnProfile::for_story(CoverStory::MoonMission);
        let full = scales(&[1, 2], &profile, 1.0);
        let half = scales(&[1, 2], &profile, 0.5);
        assert!((half[0] - full[0] / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_lane_excludes_progress_indicator_zone() {
        let area = StageArea {
            width: 1920.0,
            height: 1080.0,
        };
        let profile = SpawnProfile::for_story(CoverStory::MoonMission);
        let lane = lane_for(area, &profile);
        // 75 + 12 + 20 + (0.35 * 200) / 2 = 142
        assert_eq!(lane.min_x, 142);
        assert_eq!(lane.max_x, 1870);
    }

    #[test]
    fn test_layout_directions_follow_cover_story() {
        let area = StageArea {
            width: 1920.0,
            height: 1080.0,
        };
        let mut rng = rand::thread_rng();
        let falling = layout(
            &[1, 2, 3],
            area,
            &SpawnProfile::for_story(CoverStory::MoonMission),
            &mut rng,
        );
        assert!(falling.iter().all(|s| s.vy > 0.0));
        let rising = layout(
            &[1, 2, 3],
            area,
            &SpawnProfile::for_story(CoverStory::HomeworkHelper),
            &mut rng,
        );
        assert!(rising.iter().all(|s| s.vy < 0.0));
        // Between(30, 65) * 0.5 keeps speeds in [15, 32.5].
        for s in falling.iter().chain(rising.iter()) {
            assert!((15.0..=32.5).contains(&s.vy.abs()));
        }
    }

    #[test]
    fn test_layout_is_deterministic_with_fixed_rng() {
        let area = StageArea {
            width: 1920.0,
            height: 1080.0,
        };
        let profile = SpawnProfile::for_story(CoverStory::MoonMission);
        let a = layout(&[5, 9, 2], area, &profile, &mut StepRng::new(7, 11));
        let b = layout(&[5, 9, 2], area, &profile, &mut StepRng::new(7, 11));
        assert_eq!(a, b);
    }
}
