use crate::detect::{BoundingBox, Detection};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Identity of a tracked object: category plus the box's top-left corner.
/// Positional keying means an object that moves between cycles gets a new
/// track and its old one ages out. Kept deliberately; IoU association is a
/// separate feature, not a bugfix for this scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub category: String,
    pub x: u32,
    pub y: u32,
}

impl TrackKey {
    fn from_detection(det: &Detection) -> Self {
        Self {
            category: det.category.clone(),
            x: det.bbox.x,
            y: det.bbox.y,
        }
    }
}

/// One short-lived track with its most recent observation
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub category: String,
    pub bbox: BoundingBox,
    pub distance: f64,
    pub confidence: f32,
    pub last_seen: Instant,
}

impl TrackedObject {
    /// Age of the track relative to `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Keeps objects alive across brief detection gaps. Tracks are refreshed
/// when re-observed and evicted once unobserved for longer than the
/// eviction window.
pub struct ObjectTracker {
    tracks: HashMap<TrackKey, TrackedObject>,
    eviction_window: Duration,
}

impl ObjectTracker {
    pub fn new(eviction_window: Duration) -> Self {
        Self {
            tracks: HashMap::new(),
            eviction_window,
        }
    }

    /// Fold one cycle's detections into the track table. Every observed
    /// track is inserted or refreshed at `now`; unobserved tracks older
    /// than the eviction window are removed in the same pass.
    pub fn update(&mut self, detections: &[Detection], now: Instant) {
        for det in detections {
            let key = TrackKey::from_detection(det);
            let entry = self.tracks.entry(key).or_insert_with(|| TrackedObject {
                category: det.category.clone(),
                bbox: det.bbox,
                distance: det.distance,
                confidence: det.confidence,
                last_seen: now,
            });
            entry.bbox = det.bbox;
            entry.distance = det.distance;
            entry.confidence = det.confidence;
            entry.last_seen = now;
        }

        let window = self.eviction_window;
        let before = self.tracks.len();
        self.tracks.retain(|key, track| {
            let keep = track.age(now) <= window;
            if !keep {
                trace!(
                    "Evicting {} track at ({}, {})",
                    key.category, key.x, key.y
                );
            }
            keep
        });
        let evicted = before - self.tracks.len();
        if evicted > 0 {
            debug!("Evicted {} stale tracks, {} remain", evicted, self.tracks.len());
        }
    }

    /// Number of live tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current live tracks, in unspecified order
    pub fn snapshot(&self) -> Vec<TrackedObject> {
        self.tracks.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(category: &str, x: u32, y: u32) -> Detection {
        let mut det = Detection::new(category, BoundingBox::new(x, y, 50, 50), 0.9);
        det.distance = 100.0;
        det
    }

    #[test]
    fn test_track_survives_gap_then_ages_out() {
        let mut tracker = ObjectTracker::new(Duration::from_millis(2000));
        let start = Instant::now();

        // Observed once at t=0
        tracker.update(&[detection("dog", 10, 10)], start);
        assert_eq!(tracker.len(), 1);

        // Unobserved at t=1000, within the window
        tracker.update(&[], start + Duration::from_millis(1000));
        assert_eq!(tracker.len(), 1);

        // Still unobserved at t=2500, past the window
        tracker.update(&[], start + Duration::from_millis(2500));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_reobservation_refreshes_age() {
        let mut tracker = ObjectTracker::new(Duration::from_millis(2000));
        let start = Instant::now();

        tracker.update(&[detection("person", 10, 20)], start);
        tracker.update(
            &[detection("person", 10, 20)],
            start + Duration::from_millis(1500),
        );

        // 3000ms after the first observation but only 1500ms after the
        // refresh, so the track stays
        tracker.update(&[], start + Duration::from_millis(3000));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_moved_object_gets_new_track() {
        let mut tracker = ObjectTracker::new(Duration::from_millis(2000));
        let start = Instant::now();

        tracker.update(&[detection("dog", 10, 20)], start);
        tracker.update(
            &[detection("dog", 30, 20)],
            start + Duration::from_millis(50),
        );

        // Same dog, new corner, two tracks until the old one ages out
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_refresh_updates_observation_fields() {
        let mut tracker = ObjectTracker::new(Duration::from_millis(2000));
        let start = Instant::now();

        tracker.update(&[detection("cat", 5, 5)], start);

        let mut updated = detection("cat", 5, 5);
        updated.distance = 42.0;
        updated.confidence = 0.7;
        tracker.update(&[updated], start + Duration::from_millis(100));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].distance, 42.0);
        assert_eq!(snapshot[0].confidence, 0.7);
    }
}
