//! Code size listings: one `<size> <module>!<method>` per line.
//!
//! Each method becomes a sample weighted by its size, under a path of
//! `[module, method]`. Lines starting with `#` are comments.

use super::adapter::{single_stack_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use super::parse_size;
use crate::model::{StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CODE_SIZE_STREAM: &str = "Code Size";

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let mut builder = StackSourceBuilder::new(CODE_SIZE_STREAM, "bytes");

    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let corrupt = |detail: &str| {
            FormatError::corrupt(path, CODE_SIZE_STREAM, format!("line {}: {}", n + 1, detail))
        };
        let (size, symbol) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| corrupt("expected '<size> <module>!<method>'"))?;
        let size = parse_size(size).ok_or_else(|| corrupt("invalid size"))?;
        let (module, method) = symbol.trim().split_once('!').unwrap_or(("", symbol.trim()));

        let module_frame = builder.intern_frame("", module);
        let method_frame = builder.intern_frame(module, method);
        let path = builder.intern_path_root_first(&[module_frame, method_frame]);
        builder.add_sample(path, size as f64, 0.0, None);
    }

    let _ = writeln!(log, "Read {} methods from {}", builder.sample_count(), path.display());
    Ok(builder.build())
}

pub struct CodeSizeAdapter;

impl FormatAdapter for CodeSizeAdapter {
    fn format_name(&self) -> &'static str {
        "Code Size"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".codesize"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, CODE_SIZE_STREAM)?;
        let owned: PathBuf = path.to_path_buf();
        let loader = single_stack_loader(move |log| parse(&owned, &text, log));

        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![StreamDescriptor::new(CODE_SIZE_STREAM, StreamKind::Stack)],
            loader,
        )))
    }
}
