//! Image size breakdowns (`.imageSize.xml`, `.pdb.xml`).
//!
//! `<Section Name Size>` elements hold `<Symbol Name Size [Type]>` elements.
//! The graph is image root -> sections -> symbols; a section node's own size
//! is whatever its symbols do not account for.

use super::adapter::{single_graph_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_text;
use super::xml_tree::{parse_document, XmlElement};
use crate::graph::{GraphBuilder, MemoryGraph};
use crate::utils::error::FormatError;
use std::io::Write;
use std::path::Path;

pub const IMAGE_SIZE_STREAM: &str = "Image Size";

/// Type of the image root node
pub const IMAGE_NODE_TYPE: &str = "[image]";

fn size_attr(element: &XmlElement) -> Result<u64, String> {
    let text = element.attr("Size").unwrap_or("0");
    super::parse_size(text).ok_or_else(|| format!("invalid Size '{}' on <{}>", text, element.name))
}

/// Every `Section` element in document order, at any depth
fn sections(root: &XmlElement) -> Vec<&XmlElement> {
    let mut found = Vec::new();
    let mut pending = vec![root];
    while let Some(element) = pending.pop() {
        if element.name == "Section" {
            found.push(element);
        } else {
            pending.extend(element.children.iter().rev());
        }
    }
    found
}

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<MemoryGraph, FormatError> {
    let corrupt = |detail: String| FormatError::corrupt(path, IMAGE_SIZE_STREAM, detail);
    let document = parse_document(text).map_err(corrupt)?;

    let mut builder = GraphBuilder::new();
    let root = builder.create_node();
    let mut section_nodes = Vec::new();
    let mut symbol_count = 0usize;

    for section in sections(&document) {
        let section_name: String = section.require_attr("Name").map_err(corrupt)?;
        let section_size = size_attr(section).map_err(corrupt)?;
        let section_node = builder.create_node();

        let mut symbol_nodes = Vec::new();
        let mut symbols_size: u64 = 0;
        for symbol in section.children_named("Symbol") {
            let name: String = symbol.require_attr("Name").map_err(corrupt)?;
            let size = size_attr(symbol).map_err(corrupt)?;
            let type_name = symbol.attr("Type").unwrap_or(&name);
            let type_index = builder.type_index(type_name, Some(&section_name));

            let node = builder.create_node();
            builder.set_node(node, type_index, size, Vec::new());
            symbol_nodes.push(node);
            symbols_size = symbols_size.saturating_add(size);
        }
        symbol_count += symbol_nodes.len();

        let section_type = builder.type_index(&section_name, None);
        let padding = section_size.saturating_sub(symbols_size);
        builder.set_node(section_node, section_type, padding, symbol_nodes);
        section_nodes.push(section_node);
    }

    let image_type = builder.type_index(IMAGE_NODE_TYPE, None);
    let sections_found = section_nodes.len();
    builder.set_node(root, image_type, 0, section_nodes);
    builder.set_root(root);

    let _ = writeln!(
        log,
        "Read {} sections, {} symbols from {}",
        sections_found,
        symbol_count,
        path.display()
    );
    builder.build().map_err(|source| FormatError::Graph {
        path: path.to_path_buf(),
        source,
    })
}

pub struct ImageSizeAdapter;

impl FormatAdapter for ImageSizeAdapter {
    fn format_name(&self) -> &'static str {
        "Image Size"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".imageSize.xml", ".pdb.xml"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, IMAGE_SIZE_STREAM)?;
        let owned = path.to_path_buf();
        Ok(OpenedFile::Data(DataFile::new(
            path,
            self.format_name(),
            vec![StreamDescriptor::new(IMAGE_SIZE_STREAM, StreamKind::Graph)],
            single_graph_loader(move |log| parse(&owned, &text, log)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<ImageSize Name="app.dll">
  <Section Name=".text" Size="0x100">
    <Symbol Name="main" Size="64" Type="Function"/>
    <Symbol Name="helper" Size="32" Type="Function"/>
  </Section>
  <Section Name=".data" Size="16">
    <Symbol Name="table" Size="16"/>
  </Section>
</ImageSize>"#;

    #[test]
    fn test_sections_and_padding() {
        let graph = parse(Path::new("app.imageSize.xml"), SAMPLE, &mut Vec::new()).unwrap();

        assert_eq!(graph.total_size(), 256 + 16);
        let root = graph.node(graph.root().unwrap()).unwrap();
        assert_eq!(root.references.len(), 2);

        let text = graph.node(root.references[0]).unwrap();
        assert_eq!(text.size, 256 - 96);
        assert_eq!(graph.node_type(text.type_index).unwrap().name, ".text");
    }

    #[test]
    fn test_symbol_type_falls_back_to_name() {
        let graph = parse(Path::new("app.imageSize.xml"), SAMPLE, &mut Vec::new()).unwrap();
        let names: Vec<String> = graph.types().map(|(_, t)| t.full_name()).collect();
        assert!(names.contains(&".text!Function".to_string()));
        assert!(names.contains(&".data!table".to_string()));
    }

    #[test]
    fn test_bad_size() {
        let text = r#"<Image><Section Name="x" Size="lots"/></Image>"#;
        let err = parse(Path::new("a.pdb.xml"), text, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FormatError::CorruptData { .. }));
    }
}
