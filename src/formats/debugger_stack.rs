//! Debugger `k`-command stack captures (`.cdbStack`, `.windbgStack`).
//!
//! Output may cover several threads, each introduced by a header such as
//! `.  0  Id: 1a2c.1b30 Suspend: 1 Teb: ...`. Frame lines are
//! `<nn> <child-sp> <retaddr> module!function+0xoffset`, innermost first.
//! Every thread becomes one sample of weight 1 rooted at `Thread (<tid>)`.

use super::adapter::{single_stack_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use crate::model::{StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;
use std::path::Path;

pub const THREAD_STACKS_STREAM: &str = "Thread Stacks";

lazy_static! {
    static ref THREAD_HEADER: Regex =
        Regex::new(r"^\s*[.#]?\s*\d+\s+Id:\s*([0-9a-fA-F]+)\.([0-9a-fA-F]+)")
            .expect("Invalid thread header regex");
    static ref FRAME_LINE: Regex =
        Regex::new(r"^\s*[0-9a-fA-F]+\s+[0-9a-fA-F`]+\s+[0-9a-fA-F`]+\s+(\S+)")
            .expect("Invalid frame line regex");
}

#[derive(Debug, Default)]
struct ThreadStack {
    process_id: Option<u32>,
    thread_id: u32,
    frames_leaf_first: Vec<String>,
}

/// `module!function+0x1a` -> `module!function`
fn strip_offset(call_site: &str) -> &str {
    match call_site.rfind("+0x") {
        Some(at) => &call_site[..at],
        None => call_site,
    }
}

fn flush(builder: &mut StackSourceBuilder, thread: ThreadStack) {
    if thread.frames_leaf_first.is_empty() {
        return;
    }
    let root = builder.intern_frame("", &format!("Thread ({})", thread.thread_id));
    let mut caller = Some(builder.call_path(root, None));
    for frame in thread.frames_leaf_first.iter().rev() {
        let frame = builder.intern_qualified(frame);
        caller = Some(builder.call_path(frame, caller));
    }
    builder.add_sample(caller, 1.0, 0.0, thread.process_id);
}

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let mut builder = StackSourceBuilder::new(THREAD_STACKS_STREAM, "count");
    // Frames before any header belong to an anonymous thread 0.
    let mut current = ThreadStack::default();

    for (n, line) in text.lines().enumerate() {
        if let Some(caps) = THREAD_HEADER.captures(line) {
            let parse_hex = |value: &str| {
                u32::from_str_radix(value, 16).map_err(|_| {
                    FormatError::corrupt(
                        path,
                        THREAD_STACKS_STREAM,
                        format!("line {}: invalid id '{}'", n + 1, value),
                    )
                })
            };
            let next = ThreadStack {
                process_id: Some(parse_hex(&caps[1])?),
                thread_id: parse_hex(&caps[2])?,
                frames_leaf_first: Vec::new(),
            };
            flush(&mut builder, std::mem::replace(&mut current, next));
        } else if let Some(caps) = FRAME_LINE.captures(line) {
            current
                .frames_leaf_first
                .push(strip_offset(&caps[1]).to_string());
        }
    }
    flush(&mut builder, current);

    let _ = writeln!(log, "Read {} thread stacks from {}", builder.sample_count(), path.display());
    Ok(builder.build())
}

pub struct DebuggerStackAdapter;

impl FormatAdapter for DebuggerStackAdapter {
    fn format_name(&self) -> &'static str {
        "Debugger Stacks"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".cdbStack", ".windbgStack"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, THREAD_STACKS_STREAM)?;
        let owned = path.to_path_buf();
        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![StreamDescriptor::new(THREAD_STACKS_STREAM, StreamKind::Stack)],
            single_stack_loader(move |log| parse(&owned, &text, log)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
.  0  Id: 1a2c.10 Suspend: 1 Teb: 00000000`00201000 Unfrozen
 # Child-SP          RetAddr           Call Site
00 00000000`0014f2a8 00007ffa`1c3e2f3e ntdll!NtWaitForSingleObject+0x14
01 00000000`0014f2b0 00007ff6`4a0c1234 KERNELBASE!WaitForSingleObjectEx+0x8e
02 00000000`0014f350 00000000`00000000 app!main+0x44

   1  Id: 1a2c.20 Suspend: 1 Teb: 00000000`00203000 Unfrozen
 # Child-SP          RetAddr           Call Site
00 00000000`0024f8a8 00000000`00000000 ntdll!NtDelayExecution+0x14
";

    #[test]
    fn test_one_sample_per_thread() {
        let source = parse(Path::new("a.cdbStack"), SAMPLE, &mut Vec::new()).unwrap();
        assert_eq!(source.sample_count(), 2);

        let first = source.samples()[0];
        assert_eq!(first.process_id, Some(0x1a2c));
        assert_eq!(
            source.path_names(first.call_path),
            vec![
                "Thread (16)",
                "app!main",
                "KERNELBASE!WaitForSingleObjectEx",
                "ntdll!NtWaitForSingleObject"
            ]
        );
    }

    #[test]
    fn test_strip_offset() {
        assert_eq!(strip_offset("app!main+0x44"), "app!main");
        assert_eq!(strip_offset("app!main"), "app!main");
    }
}
