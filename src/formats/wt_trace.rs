//! Debugger `wt` (watch trace) output.
//!
//! Lines look like `  12    0 [  2] module!Function`: instructions executed,
//! child calls, call depth, and the function. The stack is rebuilt from the
//! depth column; time advances by the instruction count.

use super::adapter::{single_stack_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use crate::model::{CallPathId, StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::io::Write;
use std::path::Path;

pub const INSTRUCTIONS_STREAM: &str = "Instructions";

lazy_static! {
    static ref WT_LINE: Regex =
        Regex::new(r"^\s*(\d+)\s+(\d+)\s+\[\s*(\d+)\]\s+(.*)$").expect("Invalid wt line regex");
}

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let mut builder = StackSourceBuilder::new(INSTRUCTIONS_STREAM, "instructions");
    let mut stack: Vec<CallPathId> = Vec::new();
    let mut total_instructions: u64 = 0;
    let mut skipped = 0usize;

    for (n, line) in text.lines().enumerate() {
        let Some(caps) = WT_LINE.captures(line) else {
            skipped += 1;
            continue;
        };
        let corrupt = |what: &str| {
            FormatError::corrupt(path, INSTRUCTIONS_STREAM, format!("line {}: invalid {}", n + 1, what))
        };
        let instructions: u64 = caps[1].parse().map_err(|_| corrupt("instruction count"))?;
        let depth: usize = caps[3].parse().map_err(|_| corrupt("depth"))?;

        stack.truncate(depth);
        let caller = stack.last().copied();
        let frame = builder.intern_qualified(caps[4].trim());
        let call_path = builder.call_path(frame, caller);
        stack.push(call_path);

        builder.add_sample(Some(call_path), instructions as f64, total_instructions as f64, None);
        total_instructions += instructions;
    }

    debug!("Skipped {} non-trace lines in {}", skipped, path.display());
    let _ = writeln!(
        log,
        "Read {} calls, {} instructions from {}",
        builder.sample_count(),
        total_instructions,
        path.display()
    );
    Ok(builder.build())
}

pub struct WtTraceAdapter;

impl FormatAdapter for WtTraceAdapter {
    fn format_name(&self) -> &'static str {
        "Watch Trace"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".wt"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, INSTRUCTIONS_STREAM)?;
        let owned = path.to_path_buf();
        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![StreamDescriptor::new(INSTRUCTIONS_STREAM, StreamKind::Stack)],
            single_stack_loader(move |log| parse(&owned, &text, log)),
        )))
    }
}
