//! Indented inclusive-cost trees (`.offtree`).
//!
//! Each line is `<name> <inclusive>`; deeper indentation means a callee of
//! the nearest shallower line above. A node's exclusive cost (inclusive minus
//! its children's inclusive) becomes one sample.

use super::adapter::{single_stack_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use crate::model::{CallPathId, StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use log::warn;
use std::io::Write;
use std::path::Path;

pub const TREE_STREAM: &str = "Tree";

struct OpenNode {
    indent: usize,
    path: CallPathId,
    inclusive: f64,
    children: f64,
}

fn close(builder: &mut StackSourceBuilder, node: OpenNode) {
    let exclusive = node.inclusive - node.children;
    if exclusive < 0.0 {
        warn!("Tree node children exceed its inclusive cost by {}", -exclusive);
    }
    if exclusive != 0.0 {
        builder.add_sample(Some(node.path), exclusive, 0.0, None);
    }
}

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let mut builder = StackSourceBuilder::new(TREE_STREAM, "msec");
    let mut open: Vec<OpenNode> = Vec::new();

    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let (name, inclusive) = line
            .trim()
            .rsplit_once(char::is_whitespace)
            .and_then(|(name, value)| Some((name.trim(), value.parse::<f64>().ok()?)))
            .ok_or_else(|| {
                FormatError::corrupt(
                    path,
                    TREE_STREAM,
                    format!("line {}: expected '<name> <inclusive>'", n + 1),
                )
            })?;

        while open.last().is_some_and(|top| top.indent >= indent) {
            if let Some(node) = open.pop() {
                close(&mut builder, node);
            }
        }

        let caller = open.last().map(|parent| parent.path);
        if let Some(parent) = open.last_mut() {
            parent.children += inclusive;
        }
        let frame = builder.intern_qualified(name);
        let node_path = builder.call_path(frame, caller);
        open.push(OpenNode {
            indent,
            path: node_path,
            inclusive,
            children: 0.0,
        });
    }

    while let Some(node) = open.pop() {
        close(&mut builder, node);
    }

    let _ = writeln!(log, "Read {} tree nodes from {}", builder.sample_count(), path.display());
    Ok(builder.build())
}

pub struct OffTreeAdapter;

impl FormatAdapter for OffTreeAdapter {
    fn format_name(&self) -> &'static str {
        "Tree"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".offtree"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, TREE_STREAM)?;
        let owned = path.to_path_buf();
        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![StreamDescriptor::new(TREE_STREAM, StreamKind::Stack)],
            single_stack_loader(move |log| parse(&owned, &text, log)),
        )))
    }
}
