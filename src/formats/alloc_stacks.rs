//! Allocation stack dumps.
//!
//! ```text
//! Alloc Type=System.String Size=64 Time=12.5 PID=1234
//!     app!Leaf
//!     app!Caller
//!     app!Main
//!
//! ```
//!
//! Frames are listed leaf first. The allocated type is added as a leaf
//! frame `Type <t>`. One file yields two streams over the same stacks:
//! allocated bytes and allocation count.

use super::adapter::{DataFile, FormatAdapter, LogicalStream, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use crate::model::{StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub const ALLOCATED_BYTES_STREAM: &str = "Allocated Bytes";
pub const ALLOCATION_COUNT_STREAM: &str = "Allocation Count";

lazy_static! {
    static ref ALLOC_HEADER: Regex = Regex::new(
        r"^Alloc\s+Type=(\S+)\s+Size=(\d+)(?:\s+Time=([-+0-9.eE]+))?(?:\s+PID=(\d+))?\s*$"
    )
    .expect("Invalid allocation header regex");
}

#[derive(Debug)]
struct Allocation {
    type_name: String,
    size: u64,
    time: f64,
    process_id: Option<u32>,
    frames_leaf_first: Vec<String>,
}

fn parse_blocks(path: &Path, stream: &str, text: &str) -> Result<Vec<Allocation>, FormatError> {
    let mut allocations = Vec::new();
    let mut current: Option<Allocation> = None;

    for (n, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            allocations.extend(current.take());
            continue;
        }

        if let Some(caps) = ALLOC_HEADER.captures(trimmed) {
            allocations.extend(current.take());
            let corrupt = |what: &str| {
                FormatError::corrupt(path, stream, format!("line {}: invalid {}", n + 1, what))
            };
            current = Some(Allocation {
                type_name: caps[1].to_string(),
                size: caps[2].parse().map_err(|_| corrupt("Size"))?,
                time: match caps.get(3) {
                    Some(time) => time.as_str().parse().map_err(|_| corrupt("Time"))?,
                    None => 0.0,
                },
                process_id: match caps.get(4) {
                    Some(pid) => Some(pid.as_str().parse().map_err(|_| corrupt("PID"))?),
                    None => None,
                },
                frames_leaf_first: Vec::new(),
            });
            continue;
        }

        match current.as_mut() {
            Some(allocation) if line.starts_with(char::is_whitespace) => {
                allocation.frames_leaf_first.push(trimmed.to_string())
            }
            _ => {
                return Err(FormatError::corrupt(
                    path,
                    stream,
                    format!("line {}: expected an 'Alloc' header, found '{}'", n + 1, trimmed),
                ))
            }
        }
    }
    allocations.extend(current);
    Ok(allocations)
}

pub fn parse(path: &Path, stream: &str, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let count_only = match stream {
        ALLOCATED_BYTES_STREAM => false,
        ALLOCATION_COUNT_STREAM => true,
        other => {
            return Err(FormatError::UnsupportedStream {
                path: path.to_path_buf(),
                stream: other.to_string(),
            })
        }
    };
    let unit = if count_only { "count" } else { "bytes" };
    let mut builder = StackSourceBuilder::new(stream, unit);

    for allocation in parse_blocks(path, stream, text)? {
        let mut caller = None;
        for frame in allocation.frames_leaf_first.iter().rev() {
            let frame = builder.intern_qualified(frame);
            caller = Some(builder.call_path(frame, caller));
        }
        let type_frame = builder.intern_frame("", &format!("Type {}", allocation.type_name));
        let leaf = builder.call_path(type_frame, caller);

        let metric = if count_only { 1.0 } else { allocation.size as f64 };
        builder.add_sample(Some(leaf), metric, allocation.time, allocation.process_id);
    }

    let _ = writeln!(
        log,
        "Read {} allocations from {}",
        builder.sample_count(),
        path.display()
    );
    Ok(builder.build())
}

pub struct AllocStacksAdapter;

impl FormatAdapter for AllocStacksAdapter {
    fn format_name(&self) -> &'static str {
        "Allocation Stacks"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".allocStacks"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, ALLOCATED_BYTES_STREAM)?;
        let owned = path.to_path_buf();
        let loader = Box::new(move |stream: &str, log: &mut dyn Write| {
            parse(&owned, stream, &text, log).map(|source| LogicalStream::Stack(Arc::new(source)))
        });

        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![
                StreamDescriptor::new(ALLOCATED_BYTES_STREAM, StreamKind::Stack),
                StreamDescriptor::new(ALLOCATION_COUNT_STREAM, StreamKind::Stack),
            ],
            loader,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;

    const SAMPLE: &str = "\
Alloc Type=System.String Size=64 Time=1.5 PID=7
    app!Concat
    app!Main

Alloc Type=Node Size=32
    app!Main
";

    #[test]
    fn test_bytes_stream() {
        let source = parse(Path::new("a.allocStacks"), ALLOCATED_BYTES_STREAM, SAMPLE, &mut Vec::new()).unwrap();
        assert_eq!(source.total_metric(TimeRange::ALL), 96.0);

        let first = source.samples()[0];
        assert_eq!(first.process_id, Some(7));
        assert_eq!(first.time_relative_msec, 1.5);
        assert_eq!(
            source.path_names(first.call_path),
            vec!["app!Main", "app!Concat", "Type System.String"]
        );
    }

    #[test]
    fn test_count_stream() {
        let source = parse(Path::new("a.allocStacks"), ALLOCATION_COUNT_STREAM, SAMPLE, &mut Vec::new()).unwrap();
        assert_eq!(source.total_metric(TimeRange::ALL), 2.0);
        assert_eq!(source.metric_unit(), "count");
    }

    #[test]
    fn test_frame_without_header() {
        let err = parse(Path::new("a.allocStacks"), ALLOCATED_BYTES_STREAM, "app!Main\n", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FormatError::CorruptData { .. }));
    }
}
