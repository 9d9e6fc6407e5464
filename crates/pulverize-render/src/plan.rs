//! Frame ranges and chunk planning.
//!
//! A project's frame range is split into one contiguous sub-range per worker.
//! Integer-division leftovers go to the last chunk rather than to an extra
//! worker, so the last worker may render a few more frames than the others.

use serde::Serialize;
use std::fmt;

use crate::error::{RenderError, RenderResult};

/// Largest frame number Blender accepts (`MAXFRAME`).
pub const MAX_FRAME: i64 = 1_048_574;

/// Inclusive range of frame indices within `-MAX_FRAME..=MAX_FRAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRange {
    start: i64,
    end: i64,
}

impl FrameRange {
    /// Creates a new range, rejecting `start > end` and frames beyond
    /// [`MAX_FRAME`] in either direction.
    pub fn new(start: i64, end: i64) -> RenderResult<Self> {
        let in_bounds = |frame: i64| (-MAX_FRAME..=MAX_FRAME).contains(&frame);
        if start > end || !in_bounds(start) || !in_bounds(end) {
            return Err(RenderError::InvalidFrameRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of frames in the range, bounds included.
    pub fn len(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }

    /// Always false: a range holds at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, frame: i64) -> bool {
        self.start <= frame && frame <= self.end
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Ordered, gap-free chunk assignment covering a whole frame range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    total: FrameRange,
    chunks: Vec<FrameRange>,
}

impl ChunkPlan {
    /// The range this plan covers.
    pub fn total(&self) -> FrameRange {
        self.total
    }

    pub fn chunks(&self) -> &[FrameRange] {
        &self.chunks
    }

    /// Number of chunks (one per worker).
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameRange> {
        self.chunks.iter()
    }
}

/// Splits `range` into `worker_count` contiguous chunks.
///
/// When the range holds fewer frames than `worker_count`, the worker count is
/// capped at the frame count so every chunk renders at least one frame; the
/// returned plan's [`ChunkPlan::len`] is the effective worker count.
///
/// # Errors
///
/// Returns [`RenderError::InvalidWorkerCount`] if `worker_count <= 0`.
pub fn plan(range: FrameRange, worker_count: i64) -> RenderResult<ChunkPlan> {
    if worker_count <= 0 {
        return Err(RenderError::InvalidWorkerCount {
            count: worker_count,
        });
    }

    let total_frames = range.len();
    let workers = (worker_count as u64).min(total_frames);
    let chunk_frames = (total_frames / workers) as i64;
    let chunks = (0..workers as i64)
        .map(|i| {
            let start = range.start + i * chunk_frames;
            let end = if i == workers as i64 - 1 {
                range.end
            } else {
                start + chunk_frames - 1
            };
            FrameRange { start, end }
        })
        .collect();

    Ok(ChunkPlan {
        total: range,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ranges(plan: &ChunkPlan) -> Vec<(i64, i64)> {
        plan.iter().map(|r| (r.start(), r.end())).collect()
    }

    #[test]
    fn test_even_split() {
        let plan = plan(FrameRange::new(1, 100).unwrap(), 4).unwrap();
        assert_eq!(ranges(&plan), vec![(1, 25), (26, 50), (51, 75), (76, 100)]);
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        let plan = plan(FrameRange::new(1, 103).unwrap(), 4).unwrap();
        assert_eq!(ranges(&plan), vec![(1, 25), (26, 50), (51, 75), (76, 103)]);
    }

    #[test]
    fn test_single_worker_gets_everything() {
        let plan = plan(FrameRange::new(10, 20).unwrap(), 1).unwrap();
        assert_eq!(ranges(&plan), vec![(10, 20)]);
    }

    #[test]
    fn test_more_workers_than_frames_is_capped() {
        let plan = plan(FrameRange::new(1, 3).unwrap(), 8).unwrap();
        assert_eq!(ranges(&plan), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_single_frame() {
        let plan = plan(FrameRange::new(0, 0).unwrap(), 6).unwrap();
        assert_eq!(ranges(&plan), vec![(0, 0)]);
    }

    #[test]
    fn test_invalid_worker_count() {
        let range = FrameRange::new(1, 100).unwrap();
        assert!(matches!(
            plan(range, 0),
            Err(RenderError::InvalidWorkerCount { count: 0 })
        ));
        assert!(matches!(
            plan(range, -3),
            Err(RenderError::InvalidWorkerCount { count: -3 })
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            FrameRange::new(10, 1),
            Err(RenderError::InvalidFrameRange { start: 10, end: 1 })
        ));
    }

    #[test]
    fn test_frames_beyond_blender_limit_rejected() {
        assert!(FrameRange::new(0, MAX_FRAME).is_ok());
        assert!(matches!(
            FrameRange::new(0, MAX_FRAME + 1),
            Err(RenderError::InvalidFrameRange { .. })
        ));
        assert!(matches!(
            FrameRange::new(i64::MIN, i64::MAX),
            Err(RenderError::InvalidFrameRange { .. })
        ));
    }

    #[test]
    fn test_widest_range_plans_without_overflow() {
        let range = FrameRange::new(-MAX_FRAME, MAX_FRAME).unwrap();
        assert_eq!(range.len(), 2 * MAX_FRAME as u64 + 1);

        let plan = plan(range, 4).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.chunks()[0].start(), -MAX_FRAME);
        assert_eq!(plan.chunks()[3].end(), MAX_FRAME);
    }

    #[test]
    fn test_frame_range_len_and_display() {
        let range = FrameRange::new(-5, 5).unwrap();
        assert_eq!(range.len(), 11);
        assert!(range.contains(-5));
        assert!(!range.contains(6));
        assert_eq!(range.to_string(), "[-5, 5]");
    }

    proptest! {
        /// Chunks are contiguous, cover the range exactly and match the worker count.
        #[test]
        fn plan_covers_range_without_gaps(
            start in -10_000i64..10_000,
            span in 0i64..5_000,
            workers in 1i64..64,
        ) {
            let range = FrameRange::new(start, start + span).unwrap();
            let plan = plan(range, workers).unwrap();

            let expected = (workers as u64).min(range.len()) as usize;
            prop_assert_eq!(plan.len(), expected);
            prop_assert_eq!(plan.chunks()[0].start(), range.start());
            prop_assert_eq!(plan.chunks()[plan.len() - 1].end(), range.end());
            for pair in plan.chunks().windows(2) {
                prop_assert_eq!(pair[0].end() + 1, pair[1].start());
            }
            for chunk in plan.iter() {
                prop_assert!(chunk.start() <= chunk.end());
            }
            let covered: u64 = plan.iter().map(FrameRange::len).sum();
            prop_assert_eq!(covered, range.len());
        }
    }
}
