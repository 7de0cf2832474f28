//! Minimal element tree over quick-xml, shared by the XML-based formats.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str::FromStr;

/// One XML element with its attributes, children and concatenated text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse an attribute; `Ok(None)` when it is absent
    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Result<Option<T>, String> {
        match self.attr(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| format!("<{}> has invalid {}=\"{}\"", self.name, key, raw)),
        }
    }

    /// Parse a mandatory attribute
    pub fn require_attr<T: FromStr>(&self, key: &str) -> Result<T, String> {
        self.parse_attr(key)?
            .ok_or_else(|| format!("<{}> is missing attribute {}", self.name, key))
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl DoubleEndedIterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Serialize with two-space indentation
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.write_into(&mut out, 0);
        out
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
        }

        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>\n");
            return;
        }

        out.push('>');
        out.push_str(&escape(self.text.as_str()));
        if !self.children.is_empty() {
            out.push('\n');
            for child in &self.children {
                child.write_into(out, depth + 1);
            }
            out.push_str(&indent);
        }
        out.push_str(&format!("</{}>\n", self.name));
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

/// Parse a whole document and return its root element
pub fn parse_document(text: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <Root A="1">
              <Item Name="x &amp; y">text</Item>
              <Item Name="z"/>
            </Root>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "Root");
        assert_eq!(doc.parse_attr::<u32>("A").unwrap(), Some(1));
        let items: Vec<_> = doc.children_named("Item").collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].attr("Name"), Some("x & y"));
        assert_eq!(items[0].text, "text");
    }

    #[test]
    fn test_write_then_parse() {
        let element = XmlElement::new("A")
            .with_attr("K", "<v>")
            .with_child(XmlElement::new("B").with_text("a & b"));
        let parsed = parse_document(&element.to_xml_string()).unwrap();
        assert_eq!(parsed, element);
    }

    #[test]
    fn test_unclosed_document() {
        assert!(parse_document("<A><B></B>").is_err());
    }

    #[test]
    fn test_require_attr() {
        let element = XmlElement::new("N").with_attr("Size", "abc");
        assert!(element.require_attr::<u64>("Size").is_err());
        assert!(element.require_attr::<u64>("Missing").is_err());
    }
}
