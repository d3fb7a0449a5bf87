use crate::interpolation::interpolate;
use crate::transform::StampedTransform;
use crate::FrameIdString;
use cu29::clock::{CuDuration, CuTime, CuTimeRange};
use serde::Serialize;
use std::collections::VecDeque;

/// Default shortest-path weight of a freshly created link.
pub const DEFAULT_LINK_WEIGHT: f64 = 1.0;

/// One undirected link between two frames and its bounded history of
/// transformations.
///
/// Samples are always stored oriented parent→child; a caller naming the
/// child as its source gets the inverse applied on ingress and on egress.
/// The history is kept sorted by stamp and bounded to the storage horizon
/// behind the newest sample.
#[derive(Clone, Debug, Serialize)]
pub struct Link {
    parent: FrameIdString,
    child: FrameIdString,
    history: VecDeque<StampedTransform>,
    horizon: CuDuration,
    weight: f64,
}

impl Link {
    pub fn new(parent: FrameIdString, child: FrameIdString, horizon: CuDuration) -> Self {
        Self {
            parent,
            child,
            history: VecDeque::new(),
            horizon,
            weight: DEFAULT_LINK_WEIGHT,
        }
    }

    pub fn parent(&self) -> &FrameIdString {
        &self.parent
    }

    pub fn child(&self) -> &FrameIdString {
        &self.child
    }

    /// The endpoint opposite to `id`. None when `id` is not an endpoint.
    pub fn other_end(&self, id: &str) -> Option<&FrameIdString> {
        if self.parent.as_str() == id {
            Some(&self.child)
        } else if self.child.as_str() == id {
            Some(&self.parent)
        } else {
            None
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The raw [oldest, newest] span of the history, orientation-independent.
    pub fn time_range(&self) -> Option<CuTimeRange> {
        Some(CuTimeRange {
            start: self.history.front()?.stamp,
            end: self.history.back()?.stamp,
        })
    }

    /// Records a sample observed from `src`, one of the two endpoints.
    ///
    /// Returns false without inserting when the stamp falls behind the
    /// storage horizon window. A sample with a stamp already present
    /// replaces the earlier entry.
    pub fn insert(&mut self, src: &str, mut sample: StampedTransform) -> bool {
        debug_assert!(
            self.other_end(src).is_some(),
            "insert source '{src}' is not an endpoint of link '{}'-'{}'",
            self.parent,
            self.child
        );

        if src == self.child.as_str() {
            sample.transform = sample.transform.inverse();
        }

        if let Some(newest) = self.history.back() {
            let cutoff = newest.stamp.as_nanos().saturating_sub(self.horizon.as_nanos());
            if sample.stamp.as_nanos() < cutoff {
                return false;
            }
        }

        let pos = self.history.partition_point(|t| t.stamp < sample.stamp);
        if pos < self.history.len() && self.history[pos].stamp == sample.stamp {
            self.history[pos] = sample;
        } else {
            self.history.insert(pos, sample);
        }

        self.evict();
        true
    }

    fn evict(&mut self) {
        let Some(newest) = self.history.back() else {
            return;
        };
        let cutoff = newest.stamp.as_nanos().saturating_sub(self.horizon.as_nanos());
        while let Some(front) = self.history.front() {
            if front.stamp.as_nanos() < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// The transformation from `src` to the opposite endpoint at `time`.
    ///
    /// Times at or before the oldest sample clamp to it, times at or after
    /// the newest clamp to it (the boundary's own stamp is returned);
    /// in between, the bracketing samples are interpolated and the result
    /// carries the query time. None on empty history.
    pub fn transform_at(&self, src: &str, time: CuTime) -> Option<StampedTransform> {
        let first = self.history.front()?;
        let last = self.history.back()?;

        let stored = if time <= first.stamp {
            *first
        } else if time >= last.stamp {
            *last
        } else {
            let pos = self.history.partition_point(|t| t.stamp <= time);
            let interpolated =
                interpolate(&self.history[pos - 1], &self.history[pos], time);
            StampedTransform::new(time, interpolated)
        };

        Some(self.oriented(src, stored))
    }

    /// The oldest sample, oriented for `src`.
    pub fn oldest(&self, src: &str) -> Option<StampedTransform> {
        self.history.front().map(|s| self.oriented(src, *s))
    }

    /// The newest sample, oriented for `src`.
    pub fn newest(&self, src: &str) -> Option<StampedTransform> {
        self.history.back().map(|s| self.oriented(src, *s))
    }

    /// |time − s.stamp| for the sample s closest to `time`.
    pub fn distance_to_nearest(&self, time: CuTime) -> Option<CuDuration> {
        if self.history.is_empty() {
            return None;
        }

        let t = time.as_nanos();
        let pos = self.history.partition_point(|s| s.stamp < time);

        let mut best = u64::MAX;
        if pos > 0 {
            best = best.min(t - self.history[pos - 1].stamp.as_nanos());
        }
        if pos < self.history.len() {
            best = best.min(self.history[pos].stamp.as_nanos().saturating_sub(t));
        }
        Some(CuDuration(best))
    }

    pub(crate) fn history(&self) -> impl Iterator<Item = &StampedTransform> {
        self.history.iter()
    }

    fn oriented(&self, src: &str, sample: StampedTransform) -> StampedTransform {
        if src == self.child.as_str() {
            StampedTransform::new(sample.stamp, sample.transform.inverse())
        } else {
            sample
        }
    }
}
