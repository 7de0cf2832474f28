//! Frame grouping and folding.
//!
//! A `GroupingRule` rewrites the frames of a stack source:
//! - group patterns (`pattern->group`) rename every matching frame to a
//!   synthetic group frame; consecutive frames landing in the same group
//!   collapse into one
//! - fold patterns remove matching frames so their cost is charged to the
//!   caller (the root-most frame is never removed)
//!
//! Patterns are globs matched anywhere in the `module!name` display string.
//! `*` matches any run of characters; `{...}` captures, and the capture can
//! be referenced as `$1` in the group name. Several patterns in one string
//! are separated by `;`, and an entry may start with a bracketed
//! description such as `[group CLR]` which is ignored.

use super::call_path::CallPathId;
use super::interner::FrameId;
use super::stack_source::{StackSource, StackSourceBuilder};
use crate::formats::view_state::ViewState;
use crate::utils::error::GroupingError;
use log::debug;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct GroupPattern {
    regex: Regex,
    replacement: String,
}

/// What happens to one frame under a rule
#[derive(Debug, Clone, PartialEq, Eq)]
enum FrameAction {
    Keep,
    Group(String),
    Fold,
}

/// Compiled group and fold patterns
#[derive(Debug, Clone, Default)]
pub struct GroupingRule {
    groups: Vec<GroupPattern>,
    folds: Vec<Regex>,
}

impl GroupingRule {
    /// A rule that changes nothing
    pub fn identity() -> Self {
        Self::default()
    }

    /// Parse `;`-separated group and fold pattern lists
    pub fn parse(group_patterns: &str, fold_patterns: &str) -> Result<Self, GroupingError> {
        let mut rule = Self::default();
        rule.add_group_patterns(group_patterns)?;
        rule.add_fold_patterns(fold_patterns)?;
        Ok(rule)
    }

    /// Build a rule from persisted view state
    pub fn from_view_state(state: &ViewState) -> Result<Self, GroupingError> {
        let mut rule = Self::default();
        for patterns in &state.group_patterns {
            rule.add_group_patterns(patterns)?;
        }
        for patterns in &state.fold_patterns {
            rule.add_fold_patterns(patterns)?;
        }
        Ok(rule)
    }

    pub fn add_group_patterns(&mut self, patterns: &str) -> Result<(), GroupingError> {
        for entry in split_entries(patterns) {
            let (pattern, replacement) = match entry.split_once("->") {
                Some((pattern, replacement)) => (pattern.trim(), replacement.trim()),
                // A bare pattern groups into its own text
                None => (entry, entry),
            };
            self.groups.push(GroupPattern {
                regex: compile_glob(pattern)?,
                replacement: replacement.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_fold_patterns(&mut self, patterns: &str) -> Result<(), GroupingError> {
        for entry in split_entries(patterns) {
            self.folds.push(compile_glob(entry)?);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.folds.is_empty()
    }

    fn classify(&self, display_name: &str) -> FrameAction {
        if self.folds.iter().any(|regex| regex.is_match(display_name)) {
            return FrameAction::Fold;
        }

        for group in &self.groups {
            if let Some(captures) = group.regex.captures(display_name) {
                let mut name = String::new();
                captures.expand(&group.replacement, &mut name);
                return FrameAction::Group(name);
            }
        }

        FrameAction::Keep
    }

    /// Produce a new source with this rule applied to every sample
    pub(crate) fn apply(&self, source: &StackSource) -> StackSource {
        let mut builder = StackSourceBuilder::new(source.name(), source.metric_unit());
        let paths = source.call_paths();

        // Only map paths some sample actually reaches.
        let mut needed = vec![false; paths.len()];
        for sample in source.samples() {
            let mut current = Some(sample.call_path);
            while let Some(path) = current {
                if needed[path.index()] {
                    break;
                }
                needed[path.index()] = true;
                current = paths.caller(path);
            }
        }

        let mut actions: HashMap<FrameId, FrameAction> = HashMap::new();
        let mut mapped: Vec<Option<CallPathId>> = vec![None; paths.len()];
        let mut group_frames: HashMap<String, FrameId> = HashMap::new();

        // Callers precede callees, so a single pass in id order suffices.
        for (id, node) in paths.iter() {
            if !needed[id.index()] {
                continue;
            }
            let new_caller = node.caller.and_then(|caller| mapped[caller.index()]);

            let action = actions
                .entry(node.frame)
                .or_insert_with(|| self.classify(&source.frame_display_name(node.frame)))
                .clone();

            let new_path = match action {
                FrameAction::Fold if new_caller.is_some() => new_caller,
                FrameAction::Fold | FrameAction::Keep => {
                    let frame = source.frame(node.frame);
                    let new_frame = match frame {
                        Some(frame) => builder.intern_frame(&frame.module, &frame.name),
                        None => builder.intern_broken(),
                    };
                    Some(builder.call_path(new_frame, new_caller))
                }
                FrameAction::Group(name) => {
                    let group_frame = *group_frames
                        .entry(name)
                        .or_insert_with_key(|name| builder.intern_frame("", name));

                    let caller_frame = new_caller.and_then(|caller| builder.path_frame(caller));
                    if caller_frame == Some(group_frame) {
                        new_caller
                    } else {
                        Some(builder.call_path(group_frame, new_caller))
                    }
                }
            };
            mapped[id.index()] = new_path;
        }

        for sample in source.samples() {
            builder.add_sample(
                mapped[sample.call_path.index()],
                sample.metric,
                sample.time_relative_msec,
                sample.process_id,
            );
        }

        debug!(
            "Applied {} group and {} fold patterns to '{}'",
            self.groups.len(),
            self.folds.len(),
            source.name()
        );
        builder.build()
    }
}

/// Split a pattern list on `;`, dropping blanks and bracketed descriptions
fn split_entries(patterns: &str) -> impl Iterator<Item = &str> {
    patterns.split(';').filter_map(|entry| {
        let mut entry = entry.trim();
        if entry.starts_with('[') {
            entry = entry.find(']').map_or("", |end| entry[end + 1..].trim());
        }
        (!entry.is_empty()).then_some(entry)
    })
}

/// Translate a glob to an unanchored regex
fn compile_glob(pattern: &str) -> Result<Regex, GroupingError> {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '{' => regex.push('('),
            '}' => regex.push(')'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }

    Regex::new(&regex).map_err(|source| GroupingError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;

    fn names(source: &StackSource, index: usize) -> Vec<String> {
        source.path_names(source.samples()[index].call_path)
    }

    fn clr_source() -> StackSource {
        let mut builder = StackSourceBuilder::new("alloc", "bytes");
        builder.add_stack(
            [
                "app!Main",
                "System.Private.CoreLib!System.String.Concat",
                "System.Private.CoreLib!System.Buffer.Memmove",
            ],
            8.0,
            0.0,
            None,
        );
        builder.add_stack(
            ["app!Main", "Microsoft.Extensions!Microsoft.Host.Run", "app!Work"],
            2.0,
            1.0,
            None,
        );
        builder.build()
    }

    #[test]
    fn test_group_collapses_consecutive_frames() {
        let rule = GroupingRule::parse("[group CLR] System.*->CLR;Microsoft.*->CLR", "").unwrap();
        let folded = clr_source().fold(&rule);

        assert_eq!(names(&folded, 0), vec!["app!Main", "CLR"]);
        assert_eq!(names(&folded, 1), vec!["app!Main", "CLR", "app!Work"]);
    }

    #[test]
    fn test_fold_charges_caller() {
        let source = clr_source();
        let rule = GroupingRule::parse("", "Memmove").unwrap();
        let folded = source.fold(&rule);

        assert_eq!(
            names(&folded, 0),
            vec!["app!Main", "System.Private.CoreLib!System.String.Concat"]
        );
        assert_eq!(folded.total_metric(TimeRange::ALL), 10.0);
    }

    #[test]
    fn test_fold_never_removes_root() {
        let rule = GroupingRule::parse("", "app!*").unwrap();
        let folded = clr_source().fold(&rule);
        assert_eq!(names(&folded, 1)[0], "app!Main");
    }

    #[test]
    fn test_capture_in_group_name() {
        let rule = GroupingRule::parse("{*}!*->module $1", "").unwrap();
        let folded = clr_source().fold(&rule);
        assert_eq!(
            names(&folded, 0),
            vec!["module app", "module System.Private.CoreLib"]
        );
    }

    #[test]
    fn test_original_is_unmodified() {
        let source = clr_source();
        let before = source.totals_by_path();
        let rule = GroupingRule::parse("System.*->CLR", "").unwrap();
        let _ = source.fold(&rule);
        assert_eq!(source.totals_by_path(), before);
    }

    #[test]
    fn test_identity_rule_preserves_paths() {
        let source = clr_source();
        let folded = source.fold(&GroupingRule::identity());
        assert_eq!(folded.totals_by_path(), source.totals_by_path());
    }

    #[test]
    fn test_split_entries_skips_description() {
        let entries: Vec<_> = split_entries("[group CLR] a->b; ;c").collect();
        assert_eq!(entries, vec!["a->b", "c"]);
    }
}
