//! Serialized call trees (`.tree.xml`): nested `<Node Name [Module] [Metric]>`.
//!
//! `Metric` is the node's exclusive cost; each node that has one becomes a
//! sample.

use super::adapter::{single_stack_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use super::xml_tree::{parse_document, XmlElement};
use crate::model::{CallPathId, StackSource, StackSourceBuilder};
use crate::utils::error::FormatError;
use std::io::Write;
use std::path::Path;

pub const TREE_STREAM: &str = "Tree";

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<StackSource, FormatError> {
    let corrupt = |detail: String| FormatError::corrupt(path, TREE_STREAM, detail);
    let root = parse_document(text).map_err(corrupt)?;
    let mut builder = StackSourceBuilder::new(TREE_STREAM, "msec");

    // Either the document element is itself a Node, or it wraps top-level Nodes.
    let mut pending: Vec<(&XmlElement, Option<CallPathId>)> = if root.name == "Node" {
        vec![(&root, None)]
    } else {
        root.children_named("Node").rev().map(|node| (node, None)).collect()
    };

    while let Some((node, caller)) = pending.pop() {
        let name: String = node.require_attr("Name").map_err(corrupt)?;
        let module = node.attr("Module").unwrap_or_default();
        let frame = builder.intern_frame(module, &name);
        let node_path = builder.call_path(frame, caller);

        if let Some(metric) = node.parse_attr::<f64>("Metric").map_err(corrupt)? {
            builder.add_sample(Some(node_path), metric, 0.0, None);
        }
        // Reversed so children are visited in document order.
        pending.extend(node.children_named("Node").rev().map(|child| (child, Some(node_path))));
    }

    let _ = writeln!(log, "Read {} tree samples from {}", builder.sample_count(), path.display());
    Ok(builder.build())
}

pub struct TreeXmlAdapter;

impl FormatAdapter for TreeXmlAdapter {
    fn format_name(&self) -> &'static str {
        "XML Tree"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".tree.xml"]
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_nodes() {
        let text = r#"<Tree>
            <Node Name="main" Module="app" Metric="1">
              <Node Name="foo" Module="app" Metric="4"/>
              <Node Name="bar" Module="lib"/>
            </Node>
          </Tree>"#;
        let source = parse(Path::new("t.tree.xml"), text, &mut Vec::new()).unwrap();

        assert_eq!(source.sample_count(), 2);
        assert_eq!(
            source.path_names(source.samples()[1].call_path),
            vec!["app!main", "app!foo"]
        );
    }

    #[test]
    fn test_missing_name() {
        let err = parse(Path::new("t.tree.xml"), "<Node Metric=\"1\"/>", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FormatError::CorruptData { .. }));
    }
}
