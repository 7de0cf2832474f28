//! The stack sample model.
//!
//! A `StackSource` is an immutable sequence of weighted call-stack samples
//! together with the frame and call path tables they refer to. Sources are
//! only constructed through `StackSourceBuilder`; every transform (folding,
//! diffing) produces a new source and leaves its input untouched.

use super::call_path::{CallPathId, CallPathTable};
use super::grouping::GroupingRule;
use super::interner::{Frame, FrameId, FrameInterner};
use super::sample::{Sample, TimeRange};
use log::debug;
use std::collections::BTreeMap;

/// Immutable stack sample model for one logical stream
#[derive(Debug, Clone)]
pub struct StackSource {
    name: String,
    metric_unit: String,
    frames: FrameInterner,
    call_paths: CallPathTable,
    samples: Vec<Sample>,
}

impl StackSource {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit label of the sample metric (e.g. "msec", "bytes", "count")
    pub fn metric_unit(&self) -> &str {
        &self.metric_unit
    }

    pub fn frames(&self) -> &FrameInterner {
        &self.frames
    }

    pub fn call_paths(&self) -> &CallPathTable {
        &self.call_paths
    }

    /// All samples in producer order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Samples whose timestamp lies in the closed-open `range`.
    ///
    /// Each call starts a fresh iterator, so enumeration is restartable.
    pub fn enumerate(&self, range: TimeRange) -> impl Iterator<Item = &Sample> + '_ {
        self.samples
            .iter()
            .filter(move |sample| range.contains(sample.time_relative_msec))
    }

    /// Like `enumerate`, additionally keeping only samples accepted by `predicate`
    pub fn enumerate_filtered<'a, P>(
        &'a self,
        range: TimeRange,
        predicate: P,
    ) -> impl Iterator<Item = &'a Sample> + 'a
    where
        P: Fn(&Sample) -> bool + 'a,
    {
        self.enumerate(range).filter(move |sample| predicate(sample))
    }

    /// Sum of sample metrics inside `range`
    pub fn total_metric(&self, range: TimeRange) -> f64 {
        self.enumerate(range).map(|sample| sample.metric).sum()
    }

    /// Earliest and latest sample timestamps
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        self.samples.iter().fold(None, |bounds, sample| {
            let t = sample.time_relative_msec;
            Some(match bounds {
                None => (t, t),
                Some((lo, hi)) => (f64::min(lo, t), f64::max(hi, t)),
            })
        })
    }

    /// Display names of a call path, root first
    pub fn path_names(&self, path: CallPathId) -> Vec<String> {
        self.call_paths
            .frames_root_first(path)
            .into_iter()
            .map(|frame| self.frame_display_name(frame))
            .collect()
    }

    /// Display name of one frame, or the unknown sentinel for a dangling id
    pub fn frame_display_name(&self, frame: FrameId) -> String {
        self.frames
            .get(frame)
            .map(Frame::display_name)
            .unwrap_or_else(|| crate::utils::config::UNKNOWN_FRAME_NAME.to_string())
    }

    /// Aggregate metric per root-first path of display names.
    ///
    /// Paths are compared by name rather than by id so the result is comparable
    /// across independently interned sources.
    pub fn totals_by_path(&self) -> BTreeMap<Vec<String>, f64> {
        let mut per_id: BTreeMap<CallPathId, f64> = BTreeMap::new();
        for sample in &self.samples {
            *per_id.entry(sample.call_path).or_insert(0.0) += sample.metric;
        }

        let mut totals = BTreeMap::new();
        for (path, metric) in per_id {
            *totals.entry(self.path_names(path)).or_insert(0.0) += metric;
        }
        totals
    }

    /// Apply a grouping rule and return the transformed source
    pub fn fold(&self, rule: &GroupingRule) -> StackSource {
        rule.apply(self)
    }
}

/// Incremental constructor for `StackSource`.
///
/// The builder is the only place interning tables are mutated; `build`
/// hands them over to the immutable source.
#[derive(Debug, Clone)]
pub struct StackSourceBuilder {
    name: String,
    metric_unit: String,
    frames: FrameInterner,
    call_paths: CallPathTable,
    samples: Vec<Sample>,
}

impl StackSourceBuilder {
    pub fn new(name: impl Into<String>, metric_unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metric_unit: metric_unit.into(),
            frames: FrameInterner::new(),
            call_paths: CallPathTable::new(),
            samples: Vec::new(),
        }
    }

    pub fn intern_frame(&mut self, module: &str, name: &str) -> FrameId {
        self.frames.intern(module, name)
    }

    /// Intern a `module!name` string
    pub fn intern_qualified(&mut self, qualified: &str) -> FrameId {
        let frame = Frame::parse(qualified);
        self.frames.intern(&frame.module, &frame.name)
    }

    pub fn intern_unknown(&mut self) -> FrameId {
        self.frames.intern_unknown()
    }

    pub fn intern_broken(&mut self) -> FrameId {
        self.frames.intern_broken()
    }

    pub fn call_path(&mut self, frame: FrameId, caller: Option<CallPathId>) -> CallPathId {
        self.call_paths.intern(frame, caller)
    }

    /// Frame at the leaf of an already interned path
    pub fn path_frame(&self, path: CallPathId) -> Option<FrameId> {
        self.call_paths.frame(path)
    }

    /// Intern a path given root first; empty input yields `None`
    pub fn intern_path_root_first(&mut self, frames: &[FrameId]) -> Option<CallPathId> {
        self.call_paths.intern_root_first(frames.iter().copied())
    }

    /// Add a sample; a missing path is recorded against the unknown sentinel frame
    pub fn add_sample(
        &mut self,
        call_path: Option<CallPathId>,
        metric: f64,
        time_relative_msec: f64,
        process_id: Option<u32>,
    ) {
        let call_path = match call_path {
            Some(path) => path,
            None => {
                let unknown = self.frames.intern_unknown();
                self.call_paths.intern(unknown, None)
            }
        };

        self.samples.push(Sample {
            call_path,
            metric,
            time_relative_msec,
            process_id,
        });
    }

    /// Intern `module!name` frames given root first and add one sample for them
    pub fn add_stack<'a, I>(
        &mut self,
        root_first: I,
        metric: f64,
        time_relative_msec: f64,
        process_id: Option<u32>,
    ) -> Option<CallPathId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut caller = None;
        for qualified in root_first {
            let frame = self.intern_qualified(qualified);
            caller = Some(self.call_paths.intern(frame, caller));
        }
        self.add_sample(caller, metric, time_relative_msec, process_id);
        caller
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn build(self) -> StackSource {
        debug!(
            "Built stack source '{}': {} samples, {} frames, {} call paths",
            self.name,
            self.samples.len(),
            self.frames.len(),
            self.call_paths.len()
        );

        StackSource {
            name: self.name,
            metric_unit: self.metric_unit,
            frames: self.frames,
            call_paths: self.call_paths,
            samples: self.samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> StackSource {
        let mut builder = StackSourceBuilder::new("cpu", "msec");
        builder.add_stack(["app!main", "app!foo"], 10.0, 1.0, Some(4));
        builder.add_stack(["app!main", "app!foo"], 5.0, 2.0, Some(4));
        builder.add_stack(["app!main", "app!bar"], 3.0, 3.0, None);
        builder.build()
    }

    #[test]
    fn test_identical_stacks_share_call_path() {
        let source = sample_source();
        let samples = source.samples();
        assert_eq!(samples[0].call_path, samples[1].call_path);
        assert_ne!(samples[0].call_path, samples[2].call_path);
    }

    #[test]
    fn test_enumerate_is_restartable_and_closed_open() {
        let source = sample_source();
        let range = TimeRange::new(1.0, 3.0);

        let first: Vec<_> = source.enumerate(range).copied().collect();
        let second: Vec<_> = source.enumerate(range).copied().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_enumerate_filtered() {
        let source = sample_source();
        let heavy: Vec<_> = source
            .enumerate_filtered(TimeRange::ALL, |sample| sample.metric > 4.0)
            .collect();
        assert_eq!(heavy.len(), 2);
    }

    #[test]
    fn test_totals_by_path() {
        let source = sample_source();
        let totals = source.totals_by_path();

        let foo = vec!["app!main".to_string(), "app!foo".to_string()];
        assert_eq!(totals[&foo], 15.0);
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_missing_path_uses_unknown_sentinel() {
        let mut builder = StackSourceBuilder::new("s", "count");
        builder.add_sample(None, 1.0, 0.0, None);
        let source = builder.build();

        let path = source.samples()[0].call_path;
        assert_eq!(source.path_names(path), vec!["?".to_string()]);
    }

    #[test]
    fn test_time_bounds() {
        let source = sample_source();
        assert_eq!(source.time_bounds(), Some((1.0, 3.0)));
        assert_eq!(source.total_metric(TimeRange::ALL), 18.0);
    }

    #[test]
    fn test_qualified_names_split_like_frame_parse() {
        let mut builder = StackSourceBuilder::new("s", "count");
        let spaced = builder.intern_qualified(" app ! main ");
        let plain = builder.intern_frame("app", "main");
        let bare = builder.intern_qualified("idle");
        assert_eq!(spaced, plain);

        let source = builder.build();
        assert_eq!(source.frame(spaced), Some(&Frame::parse("app!main")));
        assert_eq!(source.frame(bare), Some(&Frame::new("", "idle")));
    }
}
