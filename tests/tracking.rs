use nalgebra as na;
use ndarray::Array3;

use stixel_track::dense::PrecomputedFlow;
use stixel_track::error::Error;
use stixel_track::polar::PolarCalibration;
use stixel_track::{
    AssignmentKind, Frame, MotionCostWeights, PinholeStereoCamera, Stixel, StixelsTracker,
    TrackerConfig, Tracking,
};

const WIDTH: usize = 64;
const HEIGHT: usize = 40;

fn camera() -> PinholeStereoCamera {
    PinholeStereoCamera::new(500.0, 500.0, 32.0, 20.0, 0.2)
}

fn uniform_image() -> Array3<u8> {
    Array3::from_elem((HEIGHT, WIDTH, 3), 128u8)
}

fn gradient_image() -> Array3<u8> {
    Array3::from_shape_fn((HEIGHT, WIDTH, 3), |(_, x, c)| (x * 4 + c) as u8)
}

fn stixels(xs: &[i32]) -> Vec<Stixel> {
    xs.iter().map(|&x| Stixel::new(x, 10, 30, 1, 5.0)).collect()
}

fn sad_only() -> TrackerConfig {
    TrackerConfig {
        weights: MotionCostWeights::sad_only(),
        ..Default::default()
    }
}

fn tracker(config: TrackerConfig) -> StixelsTracker<PinholeStereoCamera, PrecomputedFlow> {
    StixelsTracker::new(config, camera(), PrecomputedFlow::new()).unwrap()
}

fn step(
    tracker: &mut StixelsTracker<PinholeStereoCamera, PrecomputedFlow>,
    image: &Array3<u8>,
    xs: &[i32],
) -> Result<(), Error> {
    let polar = PolarCalibration::identity(image.clone(), image.clone());
    tracker.update(Frame::new(image.clone(), stixels(xs)), &polar)
}

#[test]
fn test_stixel_moving_by_one_pixel_is_matched() {
    for kind in [AssignmentKind::GraphMatching, AssignmentKind::DynamicProgramming] {
        let mut tracker = tracker(sad_only());
        tracker.set_assignment(kind);

        let image = uniform_image();
        step(&mut tracker, &image, &[10]).unwrap();
        step(&mut tracker, &image, &[11]).unwrap();

        assert_eq!(tracker.last_correspondence().as_slice(), &[Some(0)]);

        let costs = tracker.last_costs().unwrap();
        let row = costs.row_for_shift(-1).unwrap();
        assert!(costs.is_feasible(row, 0));
        assert!(costs.cost(row, 0).abs() < 1e-4);

        // the dense cue is off, so the flow is never advanced
        assert_eq!(tracker.dense_tracker().steps(), 0);
    }
}

#[test]
fn test_dense_tracker_advances_only_with_dense_weight() {
    let mut tracker = tracker(TrackerConfig::default());
    let image = uniform_image();

    step(&mut tracker, &image, &[10]).unwrap();
    step(&mut tracker, &image, &[11]).unwrap();
    assert_eq!(tracker.dense_tracker().steps(), 2);

    tracker
        .set_motion_cost_weights(1.0, 0.0, 0.0, 0.0, 0.0)
        .unwrap();
    step(&mut tracker, &image, &[12]).unwrap();
    assert_eq!(tracker.dense_tracker().steps(), 2);
}

#[test]
fn test_extra_column_starts_a_fresh_track() {
    let mut tracker = tracker(sad_only());
    let image = uniform_image();

    step(&mut tracker, &image, &[10]).unwrap();
    step(&mut tracker, &image, &[11, 50]).unwrap();

    let corresp = tracker.last_correspondence();
    assert_eq!(corresp.as_slice(), &[Some(0), None]);

    let tracks = tracker.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].len(), 2);
    assert_eq!(tracks[1].len(), 1);

    let fresh = tracks[1].latest().unwrap();
    assert_eq!(fresh.backward(), None);
    assert_eq!(fresh.forward(), None);
}

#[test]
fn test_links_are_symmetric() {
    let mut tracker = tracker(sad_only());
    let image = gradient_image();

    step(&mut tracker, &image, &[12, 30, 50]).unwrap();
    step(&mut tracker, &image, &[13, 31, 51]).unwrap();

    let corresp = tracker.last_correspondence().clone();
    assert!(corresp.is_one_to_one());
    assert_eq!(corresp.matched().count(), 3);

    let history: Vec<_> = tracker.track_store().history().iter().collect();
    let (previous, current) = (history[0], history[1]);

    for (i, s3d) in current.iter().enumerate() {
        match corresp.get(i) {
            Some(prev) => {
                assert_eq!(previous[prev].forward(), Some(i));
                assert_eq!(s3d.backward(), Some(prev));
            }
            None => assert_eq!(s3d.backward(), None),
        }
        assert_eq!(s3d.forward(), None);
    }
}

#[test]
fn test_cluster_becomes_an_object_once_tracked_long_enough() {
    let mut tracker = tracker(sad_only());
    let image = gradient_image();
    // 1 px is 4 cm at 20 m: columns 2, 3 and 4 are 20 cm apart, the rest at least 32 cm
    let xs = [12, 22, 30, 35, 40, 50];

    step(&mut tracker, &image, &xs).unwrap();
    assert!(tracker.objects().is_empty());

    step(&mut tracker, &image, &xs).unwrap();
    assert_eq!(
        tracker.clustering().labels,
        vec![None, None, Some(0), Some(0), Some(0), None]
    );
    // tracks are only two frames old
    assert!(tracker.objects().is_empty());

    step(&mut tracker, &image, &xs).unwrap();
    step(&mut tracker, &image, &xs).unwrap();

    assert_eq!(tracker.objects(), &[vec![2, 3, 4]]);
    assert!(tracker.tracks().iter().all(|t| t.len() == 4));
}

#[test]
fn test_tracks_are_capped_to_the_history() {
    let config = TrackerConfig {
        max_history: 3,
        ..sad_only()
    };
    let mut tracker = tracker(config);
    let image = gradient_image();

    for _ in 0..6 {
        step(&mut tracker, &image, &[20, 40]).unwrap();

        assert!(tracker.track_store().history().len() <= 3);
        assert!(tracker.tracks().iter().all(|t| t.len() <= 3));
    }

    assert!(tracker.tracks().iter().all(|t| t.len() == 3));
}

#[test]
fn test_invalid_weights_are_rejected() {
    let mut tracker = tracker(sad_only());

    let res = tracker.set_motion_cost_weights(0.5, 0.5, 0.5, 0.0, 0.0);
    assert!(matches!(res, Err(Error::InvalidMotionCostWeights { .. })));
    assert_eq!(tracker.config().weights, MotionCostWeights::sad_only());

    // the strategy is switched on its own, whatever happened to the weights
    tracker.set_assignment(AssignmentKind::DynamicProgramming);
    assert_eq!(tracker.config().assignment, AssignmentKind::DynamicProgramming);
    assert_eq!(tracker.config().weights, MotionCostWeights::sad_only());

    tracker
        .set_motion_cost_weights(0.5, 0.5, 0.0, 0.0, 0.0)
        .unwrap();
    assert_eq!(tracker.config().weights.height(), 0.5);
}

#[test]
fn test_even_width_stixel_fails_the_update() {
    let mut tracker = tracker(sad_only());
    let image = uniform_image();
    step(&mut tracker, &image, &[10, 30]).unwrap();

    let polar = PolarCalibration::identity(image.clone(), image.clone());
    let frame = Frame::new(image.clone(), vec![Stixel::new(11, 10, 30, 2, 5.0)]);

    assert!(matches!(
        tracker.update(frame, &polar),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(tracker.tracks().len(), 2);
    assert_eq!(tracker.track_store().history().len(), 1);

    step(&mut tracker, &image, &[11, 31]).unwrap();
    assert_eq!(tracker.last_correspondence().as_slice(), &[Some(0), Some(1)]);
}

#[test]
fn test_empty_frame_leaves_everything_unmatched() {
    let mut tracker = tracker(sad_only());
    let image = uniform_image();

    step(&mut tracker, &image, &[]).unwrap();
    step(&mut tracker, &image, &[10, 30]).unwrap();

    assert_eq!(tracker.last_correspondence().as_slice(), &[None, None]);
    assert_eq!(tracker.last_costs().unwrap().evaluated_pairs, 0);
    assert!(tracker.tracks().iter().all(|t| t.len() == 1));
}

#[test]
fn test_static_flag_and_direction() {
    let config = TrackerConfig {
        classify_static: true,
        estimate_direction: true,
        ..sad_only()
    };
    let mut tracker = tracker(config);
    let image = gradient_image();

    step(&mut tracker, &image, &[20]).unwrap();

    for y in 10..=30 {
        tracker
            .dense_tracker_mut()
            .insert(na::Point2::new(20, y), na::Point2::new(19, y));
    }
    step(&mut tracker, &image, &[20]).unwrap();

    let latest = tracker.tracks()[0].latest().unwrap().clone();
    assert!(latest.is_static);
    assert!((latest.direction - na::Vector2::new(-1.0, 0.0)).norm() < 1e-5);
}
