use std::collections::HashMap;
use std::fmt;
use std::mem;

use tracing::trace;

use crate::assignment::Correspondence;
use crate::camera::StereoCamera;
use crate::circular_queue::CircularQueue;
use crate::error::Error;
use crate::stixel::{Stixel, Stixel3d};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Time series of one tracked stixel, oldest entry first.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    entries: CircularQueue<Stixel3d>,
}

impl Track {
    fn new(id: TrackId, first: Stixel3d, max_history: usize) -> Self {
        let mut entries = CircularQueue::with_capacity(max_history);
        entries.push(first);

        Self { id, entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn latest(&self) -> Option<&Stixel3d> {
        self.entries.latest()
    }

    #[inline]
    pub fn latest_mut(&mut self) -> Option<&mut Stixel3d> {
        self.entries.latest_mut()
    }

    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Stixel3d> + ExactSizeIterator {
        self.entries.iter()
    }
}

/// Tracks of the latest frame addressed by current column, plus the per-frame snapshots.
#[derive(Debug, Clone)]
pub struct TrackStore {
    max_history: usize,
    next_id: u64,
    tracks: HashMap<TrackId, Track>,
    columns: Vec<TrackId>,
    history: CircularQueue<Vec<Stixel3d>>,
}

impl TrackStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            next_id: 0,
            tracks: HashMap::new(),
            columns: Vec::new(),
            history: CircularQueue::with_capacity(max_history),
        }
    }

    /// Number of columns of the latest frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn track_for_column(&self, column: usize) -> Option<&Track> {
        self.tracks.get(self.columns.get(column)?)
    }

    pub fn track_for_column_mut(&mut self, column: usize) -> Option<&mut Track> {
        let id = self.columns.get(column)?;

        self.tracks.get_mut(id)
    }

    /// Tracks in the column order of the latest frame.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.columns.iter().filter_map(move |id| self.tracks.get(id))
    }

    #[inline]
    pub fn history(&self) -> &CircularQueue<Vec<Stixel3d>> {
        &self.history
    }

    #[inline]
    pub fn latest(&self) -> Option<&[Stixel3d]> {
        self.history.latest().map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.columns.clear();
        self.history.clear();
    }

    /// Marks `previous` of the latest snapshot as continued by `current`.
    ///
    /// The snapshot entry and the newest entry of its track are the only
    /// historic records that are ever written after being stored.
    pub fn link_forward(&mut self, previous: usize, current: usize) {
        if let Some(s3d) = self
            .history
            .latest_mut()
            .and_then(|snapshot| snapshot.get_mut(previous))
        {
            s3d.set_forward(current);
        }

        if let Some(s3d) = self
            .track_for_column_mut(previous)
            .and_then(Track::latest_mut)
        {
            s3d.set_forward(current);
        }
    }

    pub fn update<C: StereoCamera + ?Sized>(
        &mut self,
        corresp: &Correspondence,
        stixels: &[Stixel],
        camera: &C,
    ) -> Result<(), Error> {
        let stixels3d = stixels
            .iter()
            .map(|s| Stixel3d::from_stixel(s, camera))
            .collect();

        self.push_frame(corresp, stixels3d)
    }

    /// Advances every track by the new frame.
    ///
    /// Tracks follow their matched stixel into its current column; tracks of
    /// unmatched previous stixels end here.
    pub fn push_frame(
        &mut self,
        corresp: &Correspondence,
        mut stixels3d: Vec<Stixel3d>,
    ) -> Result<(), Error> {
        if self.history.is_empty() {
            self.columns = stixels3d
                .iter()
                .map(|s3d| self.start_track(s3d.clone()))
                .collect();
            self.history.push(stixels3d);

            return Ok(());
        }

        self.check(corresp, stixels3d.len())?;

        for (curr, prev) in corresp.matched() {
            self.link_forward(prev, curr);
            stixels3d[curr].set_backward(prev);
        }

        let previous_columns = mem::take(&mut self.columns);
        let mut previous_tracks = mem::take(&mut self.tracks);
        let mut columns = Vec::with_capacity(stixels3d.len());

        for (i, s3d) in stixels3d.iter().enumerate() {
            let continued = corresp
                .get(i)
                .and_then(|prev| previous_tracks.remove(&previous_columns[prev]));

            let id = match continued {
                Some(mut track) => {
                    let id = track.id;
                    track.entries.push(s3d.clone());
                    self.tracks.insert(id, track);
                    id
                }
                None => self.start_track(s3d.clone()),
            };

            columns.push(id);
        }

        trace!(
            ended = previous_tracks.len(),
            tracks = self.tracks.len(),
            "tracks advanced"
        );

        self.columns = columns;
        self.history.push(stixels3d);

        Ok(())
    }

    fn start_track(&mut self, first: Stixel3d) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.insert(id, Track::new(id, first, self.max_history));

        id
    }

    fn check(&self, corresp: &Correspondence, columns: usize) -> Result<(), Error> {
        if corresp.len() != columns {
            return Err(Error::InvalidArgument(format!(
                "correspondence covers {} stixels, frame has {}",
                corresp.len(),
                columns
            )));
        }

        if let Some((curr, prev)) = corresp.matched().find(|&(_, prev)| prev >= self.columns.len()) {
            return Err(Error::InvalidArgument(format!(
                "stixel {} is matched to previous stixel {}, previous frame has {}",
                curr,
                prev,
                self.columns.len()
            )));
        }

        if !corresp.is_one_to_one() {
            return Err(Error::InvalidArgument(
                "a previous stixel is matched more than once".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeStereoCamera;

    fn camera() -> PinholeStereoCamera {
        PinholeStereoCamera::new(500.0, 500.0, 320.0, 240.0, 0.2)
    }

    fn frame(xs: &[i32]) -> Vec<Stixel> {
        xs.iter().map(|&x| Stixel::new(x, 100, 200, 1, 10.0)).collect()
    }

    #[test]
    fn test_first_frame_starts_tracks() {
        let mut store = TrackStore::new(5);
        store
            .update(&Correspondence::unmatched(3), &frame(&[10, 20, 30]), &camera())
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.tracks().count(), 3);
        for track in store.tracks() {
            assert_eq!(track.len(), 1);
            let s3d = track.latest().unwrap();
            assert_eq!(s3d.forward(), None);
            assert_eq!(s3d.backward(), None);
        }
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_links_are_symmetric() {
        let camera = camera();
        let mut store = TrackStore::new(5);
        store
            .update(&Correspondence::unmatched(2), &frame(&[10, 20]), &camera)
            .unwrap();
        let first = store.track_for_column(1).unwrap().id;

        // previous 1 moves to column 0, previous 0 disappears, column 1 is new
        let corresp = Correspondence::from(vec![Some(1), None]);
        store.update(&corresp, &frame(&[21, 40]), &camera).unwrap();

        let snapshots: Vec<_> = store.history().iter().collect();
        assert_eq!(snapshots[0][1].forward(), Some(0));
        assert_eq!(snapshots[0][0].forward(), None);
        assert_eq!(snapshots[1][0].backward(), Some(1));
        assert_eq!(snapshots[1][1].backward(), None);
        assert_eq!(snapshots[1][1].forward(), None);

        let moved = store.track_for_column(0).unwrap();
        assert_eq!(moved.id, first);
        assert_eq!(moved.len(), 2);
        assert_eq!(moved.iter().next().unwrap().forward(), Some(0));
        assert_eq!(moved.latest().unwrap().stixel.x, 21);

        let fresh = store.track_for_column(1).unwrap();
        assert_eq!(fresh.len(), 1);
        assert_ne!(fresh.id, first);
        assert_eq!(store.tracks().count(), 2);
    }

    #[test]
    fn test_history_is_capped() {
        let camera = camera();
        let mut store = TrackStore::new(3);
        store
            .update(&Correspondence::unmatched(1), &frame(&[10]), &camera)
            .unwrap();

        for x in 11..20 {
            store
                .update(&Correspondence::from(vec![Some(0)]), &frame(&[x]), &camera)
                .unwrap();

            let track = store.track_for_column(0).unwrap();
            assert!(track.len() <= 3);
            assert!(store.history().len() <= 3);
        }

        let track = store.track_for_column(0).unwrap();
        let xs: Vec<_> = track.iter().map(|s| s.stixel.x).collect();
        assert_eq!(xs, vec![17, 18, 19]);
    }

    #[test]
    fn test_invalid_correspondence_keeps_state() {
        let camera = camera();
        let mut store = TrackStore::new(5);
        store
            .update(&Correspondence::unmatched(2), &frame(&[10, 20]), &camera)
            .unwrap();

        let twice = Correspondence::from(vec![Some(0), Some(0)]);
        assert!(store.update(&twice, &frame(&[11, 12]), &camera).is_err());

        let out_of_range = Correspondence::from(vec![Some(5)]);
        assert!(store.update(&out_of_range, &frame(&[11]), &camera).is_err());

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.latest().unwrap().iter().all(|s| s.forward().is_none()));
    }
}
