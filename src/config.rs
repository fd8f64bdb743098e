use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

const WEIGHTS_SUM_TOLERANCE: f32 = 1e-5;

/// Weights of the five motion cues. Built only through [`MotionCostWeights::new`],
/// which enforces that they sum to 1.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "RawWeights")]
pub struct MotionCostWeights {
    sad: f32,
    height: f32,
    polar_dist: f32,
    polar_sad: f32,
    dense_tracking: f32,
}

#[derive(Deserialize)]
struct RawWeights {
    sad: f32,
    height: f32,
    polar_dist: f32,
    polar_sad: f32,
    dense_tracking: f32,
}

impl TryFrom<RawWeights> for MotionCostWeights {
    type Error = Error;

    fn try_from(raw: RawWeights) -> Result<Self, Error> {
        Self::new(
            raw.sad,
            raw.height,
            raw.polar_dist,
            raw.polar_sad,
            raw.dense_tracking,
        )
    }
}

impl MotionCostWeights {
    pub fn new(
        sad: f32,
        height: f32,
        polar_dist: f32,
        polar_sad: f32,
        dense_tracking: f32,
    ) -> Result<Self, Error> {
        let all = [sad, height, polar_dist, polar_sad, dense_tracking];
        let sum: f32 = all.iter().sum();

        if all.iter().any(|w| !w.is_finite() || *w < 0.0)
            || (sum - 1.0).abs() > WEIGHTS_SUM_TOLERANCE
        {
            return Err(Error::InvalidMotionCostWeights { sum });
        }

        Ok(Self {
            sad,
            height,
            polar_dist,
            polar_sad,
            dense_tracking,
        })
    }

    /// Appearance only.
    pub fn sad_only() -> Self {
        Self {
            sad: 1.0,
            height: 0.0,
            polar_dist: 0.0,
            polar_sad: 0.0,
            dense_tracking: 0.0,
        }
    }

    #[inline(always)]
    pub fn sad(&self) -> f32 {
        self.sad
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline(always)]
    pub fn polar_dist(&self) -> f32 {
        self.polar_dist
    }

    #[inline(always)]
    pub fn polar_sad(&self) -> f32 {
        self.polar_sad
    }

    #[inline(always)]
    pub fn dense_tracking(&self) -> f32 {
        self.dense_tracking
    }
}

impl Default for MotionCostWeights {
    fn default() -> Self {
        Self {
            sad: 0.3,
            height: 0.0,
            polar_dist: 0.0,
            polar_sad: 0.0,
            dense_tracking: 0.7,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Maximum weight bipartite matching over the pruned candidate pairs.
    GraphMatching,
    /// Order preserving alignment over the shift axis of the cost matrix.
    DynamicProgramming,
}

impl Default for AssignmentKind {
    fn default() -> Self {
        AssignmentKind::GraphMatching
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub weights: MotionCostWeights,
    pub assignment: AssignmentKind,

    /// in meters
    pub min_object_width: f32,
    /// in meters
    pub min_distance_between_clusters: f32,
    pub min_cluster_size: usize,
    pub min_polar_sad_for_static: f32,

    /// number of frames kept in every track and in the snapshot history
    pub max_history: usize,

    pub max_disparity: usize,
    pub video_frame_rate: f32,
    /// in meters per second
    pub max_pedestrian_speed: f32,
    /// in meters
    pub max_depth_difference: f32,
    /// in meters
    pub max_real_height_difference: f32,
    /// in pixels
    pub max_polar_distance: f32,

    pub stixel_horizontal_padding: i32,
    pub stixel_representation_height: usize,

    pub classify_static: bool,
    pub estimate_direction: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            weights: MotionCostWeights::default(),
            assignment: AssignmentKind::default(),
            min_object_width: 0.3,
            min_distance_between_clusters: 0.3,
            min_cluster_size: 3,
            min_polar_sad_for_static: 10.0,
            max_history: 5,
            max_disparity: 128,
            video_frame_rate: 15.0,
            max_pedestrian_speed: 3.0,
            max_depth_difference: 1.0,
            max_real_height_difference: 0.5,
            max_polar_distance: 50.0,
            stixel_horizontal_padding: 8,
            stixel_representation_height: 30,
            classify_static: false,
            estimate_direction: false,
        }
    }
}

impl TrackerConfig {
    /// Largest metric displacement a pedestrian can make between two frames.
    #[inline]
    pub fn max_displacement_between_frames(&self) -> f32 {
        self.max_pedestrian_speed / self.video_frame_rate
    }

    pub fn validate(&self) -> Result<(), Error> {
        // weights deserialized or built in place still go through the same check
        MotionCostWeights::new(
            self.weights.sad,
            self.weights.height,
            self.weights.polar_dist,
            self.weights.polar_sad,
            self.weights.dense_tracking,
        )?;

        let positive = [
            ("video_frame_rate", self.video_frame_rate),
            ("max_pedestrian_speed", self.max_pedestrian_speed),
            ("max_depth_difference", self.max_depth_difference),
            ("max_real_height_difference", self.max_real_height_difference),
            ("max_polar_distance", self.max_polar_distance),
            (
                "min_distance_between_clusters",
                self.min_distance_between_clusters,
            ),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} should be positive, got {}",
                    name, value
                )));
            }
        }

        if self.max_history == 0 {
            return Err(Error::InvalidConfig("max_history should be at least 1".into()));
        }

        if self.max_disparity == 0 {
            return Err(Error::InvalidConfig("max_disparity should be at least 1".into()));
        }

        if self.stixel_representation_height == 0 {
            return Err(Error::InvalidConfig(
                "stixel_representation_height should be at least 1".into(),
            ));
        }

        if self.stixel_horizontal_padding < 0 {
            return Err(Error::InvalidConfig(format!(
                "stixel_horizontal_padding should not be negative, got {}",
                self.stixel_horizontal_padding
            )));
        }

        if self.min_cluster_size == 0 {
            return Err(Error::InvalidConfig("min_cluster_size should be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(MotionCostWeights::new(0.3, 0.0, 0.0, 0.0, 0.7).is_ok());
        assert!(MotionCostWeights::new(0.2, 0.2, 0.2, 0.2, 0.2).is_ok());

        match MotionCostWeights::new(0.5, 0.5, 0.5, 0.0, 0.0) {
            Err(Error::InvalidMotionCostWeights { sum }) => assert!((sum - 1.5).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }

        assert!(MotionCostWeights::new(1.5, -0.5, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.max_displacement_between_frames() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config() {
        let config = TrackerConfig {
            max_history: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = TrackerConfig {
            video_frame_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
