//! Samples and time windows.

use super::call_path::CallPathId;
use serde::{Deserialize, Serialize};

/// One weighted observation of a call path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Leaf node of the sampled call path
    pub call_path: CallPathId,

    /// Signed weight (time, bytes, count, ...)
    pub metric: f64,

    /// Milliseconds since the start of the trace
    pub time_relative_msec: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

/// Closed-open time window `[start, end)` in relative milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_relative_msec: f64,
    pub end_relative_msec: f64,
}

impl TimeRange {
    /// Every finite timestamp
    pub const ALL: TimeRange = TimeRange {
        start_relative_msec: f64::NEG_INFINITY,
        end_relative_msec: f64::INFINITY,
    };

    pub fn new(start_relative_msec: f64, end_relative_msec: f64) -> Self {
        Self {
            start_relative_msec,
            end_relative_msec,
        }
    }

    /// Build from optional bounds; a missing bound is unbounded
    pub fn from_bounds(start: Option<f64>, end: Option<f64>) -> Self {
        Self {
            start_relative_msec: start.unwrap_or(f64::NEG_INFINITY),
            end_relative_msec: end.unwrap_or(f64::INFINITY),
        }
    }

    /// Start inclusive, end exclusive
    pub fn contains(&self, time_relative_msec: f64) -> bool {
        time_relative_msec >= self.start_relative_msec && time_relative_msec < self.end_relative_msec
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::ALL
    }
}
