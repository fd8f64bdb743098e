use std::collections::VecDeque;

use nalgebra as na;
use tracing::debug;

use crate::assignment::Correspondence;
use crate::track::TrackStore;

/// Tracks shorter than this never form an object.
const MIN_OBJECT_TRACK_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    NoObject,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint {
    pub point: na::Point3<f32>,
    pub label: PointLabel,
}

/// Region growing over `points`: two points closer than `tolerance` share a cluster.
///
/// Members are sorted by index, clusters by size (largest first, then by first member).
/// Clusters with a size outside `min_size..=max_size` are dropped.
pub fn euclidean_clusters(
    points: &[na::Point3<f32>],
    tolerance: f32,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let mut processed = vec![false; points.len()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..points.len() {
        if processed[seed] {
            continue;
        }

        processed[seed] = true;
        queue.push_back(seed);

        let mut cluster = Vec::new();
        while let Some(idx) = queue.pop_front() {
            cluster.push(idx);

            for (other, pt) in points.iter().enumerate() {
                if !processed[other] && na::distance(&points[idx], pt) <= tolerance {
                    processed[other] = true;
                    queue.push_back(other);
                }
            }
        }

        if (min_size..=max_size).contains(&cluster.len()) {
            cluster.sort_unstable();
            clusters.push(cluster);
        }
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
    clusters
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    /// cluster of every column, `None` for unclustered ones
    pub labels: Vec<Option<usize>>,
    /// columns of every accepted object
    pub objects: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct ObjectClusterer {
    /// in meters
    pub tolerance: f32,
    /// in meters
    pub min_object_width: f32,
    pub min_cluster_size: usize,
}

impl ObjectClusterer {
    pub fn new(tolerance: f32, min_object_width: f32, min_cluster_size: usize) -> Self {
        Self {
            tolerance,
            min_object_width,
            min_cluster_size,
        }
    }

    /// Ground plane position of every column; unmatched columns sit at the origin.
    pub fn points(&self, store: &TrackStore, corresp: &Correspondence) -> Vec<LabeledPoint> {
        (0..store.len())
            .map(|column| {
                let bottom = store
                    .track_for_column(column)
                    .and_then(|track| track.latest())
                    .map(|s3d| s3d.bottom3d);

                match (corresp.get(column), bottom) {
                    (Some(_), Some(bottom)) => LabeledPoint {
                        point: na::Point3::new(bottom.x, 0.0, bottom.z),
                        label: PointLabel::Object,
                    },
                    _ => LabeledPoint {
                        point: na::Point3::origin(),
                        label: PointLabel::NoObject,
                    },
                }
            })
            .collect()
    }

    pub fn cluster(&self, store: &TrackStore, corresp: &Correspondence) -> Clustering {
        let points = self.points(store, corresp);
        let positions: Vec<_> = points.iter().map(|p| p.point).collect();
        let clusters = euclidean_clusters(
            &positions,
            self.tolerance,
            self.min_cluster_size,
            points.len(),
        );

        let bottom_x = |column: usize| {
            store
                .track_for_column(column)
                .and_then(|track| track.latest())
                .map_or(0.0, |s3d| s3d.bottom3d.x)
        };

        let mut clustering = Clustering {
            labels: vec![None; points.len()],
            objects: Vec::with_capacity(clusters.len()),
        };

        for (cluster_idx, members) in clusters.into_iter().enumerate() {
            let (first, last) = match (members.first(), members.last()) {
                (Some(&first), Some(&last)) => (first, last),
                _ => continue,
            };

            let width = (bottom_x(last) - bottom_x(first)).abs();
            let wide_enough = width >= self.min_object_width;
            let mut track_len = 0;

            for &column in &members {
                if points[column].label == PointLabel::NoObject || !wide_enough {
                    continue;
                }

                clustering.labels[column] = Some(cluster_idx);
                track_len = track_len.max(store.track_for_column(column).map_or(0, |t| t.len()));
            }

            if wide_enough
                && points[first].label == PointLabel::Object
                && track_len >= MIN_OBJECT_TRACK_LEN
            {
                clustering.objects.push(members);
            }
        }

        debug!(
            columns = points.len(),
            objects = clustering.objects.len(),
            "stixels clustered"
        );

        clustering
    }
}
