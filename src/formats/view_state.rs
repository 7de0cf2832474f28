//! Persisted stack-window configuration.
//!
//! The analysis core never interprets this; it is carried through the native
//! formats and offered as adapter defaults. `GroupingRule::from_view_state`
//! is the only place it takes effect.

use super::xml_tree::{parse_document, XmlElement};
use crate::utils::config::{DEFAULT_CLR_GROUP_PATTERN, DEFAULT_FOLD_PERCENT};
use serde::{Deserialize, Serialize};

/// Name of the element holding a serialized view state
pub const VIEW_STATE_ELEMENT: &str = "StackWindowGuiState";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ViewState {
    pub fold_percent: f64,
    #[serde(alias = "GroupRegEx")]
    pub group_patterns: Vec<String>,
    #[serde(alias = "FoldRegEx")]
    pub fold_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub notes: String,
    pub log: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            fold_percent: DEFAULT_FOLD_PERCENT,
            group_patterns: Vec::new(),
            fold_patterns: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            notes: String::new(),
            log: String::new(),
        }
    }
}

impl ViewState {
    /// Default state for heap views: framework frames grouped first
    pub fn with_clr_grouping() -> Self {
        Self {
            group_patterns: vec![DEFAULT_CLR_GROUP_PATTERN.to_string()],
            ..Self::default()
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Read a view state element; unknown children are ignored
    pub fn from_xml_element(element: &XmlElement) -> Result<Self, String> {
        let mut state = Self::default();
        for child in &element.children {
            match child.name.as_str() {
                "FoldPercent" => {
                    state.fold_percent = child
                        .text
                        .trim()
                        .parse()
                        .map_err(|_| format!("invalid FoldPercent '{}'", child.text))?;
                }
                "GroupPatterns" | "GroupRegEx" => state.group_patterns = pattern_list(child),
                "FoldPatterns" | "FoldRegEx" => state.fold_patterns = pattern_list(child),
                "IncludePatterns" => state.include_patterns = pattern_list(child),
                "ExcludePatterns" => state.exclude_patterns = pattern_list(child),
                "Notes" => state.notes = child.text.clone(),
                "Log" => state.log = child.text.clone(),
                _ => {}
            }
        }
        Ok(state)
    }

    /// Parse a standalone `<StackWindowGuiState>` fragment
    pub fn parse_xml(text: &str) -> Result<Self, String> {
        Self::from_xml_element(&parse_document(text)?)
    }

    pub fn to_xml_element(&self) -> XmlElement {
        let patterns = |name: &str, list: &[String]| {
            list.iter().fold(XmlElement::new(name), |element, pattern| {
                element.with_child(XmlElement::new("Pattern").with_text(pattern.clone()))
            })
        };

        let mut element = XmlElement::new(VIEW_STATE_ELEMENT)
            .with_child(XmlElement::new("FoldPercent").with_text(self.fold_percent.to_string()))
            .with_child(patterns("GroupPatterns", &self.group_patterns))
            .with_child(patterns("FoldPatterns", &self.fold_patterns))
            .with_child(patterns("IncludePatterns", &self.include_patterns))
            .with_child(patterns("ExcludePatterns", &self.exclude_patterns));
        if !self.notes.is_empty() {
            element = element.with_child(XmlElement::new("Notes").with_text(self.notes.clone()));
        }
        if !self.log.is_empty() {
            element = element.with_child(XmlElement::new("Log").with_text(self.log.clone()));
        }
        element
    }
}

/// `<Pattern>` children, or the element text for old single-string lists
fn pattern_list(element: &XmlElement) -> Vec<String> {
    let patterns: Vec<String> = element
        .children_named("Pattern")
        .map(|p| p.text.clone())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() && !element.text.trim().is_empty() {
        return vec![element.text.trim().to_string()];
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_legacy_xml_names() {
        let state = ViewState::parse_xml(
            r#"<StackWindowGuiState>
                 <FoldPercent>2.5</FoldPercent>
                 <GroupRegEx><Pattern>System.*->CLR</Pattern></GroupRegEx>
                 <FoldRegEx>Memmove</FoldRegEx>
                 <ColumnWidths>ignored</ColumnWidths>
               </StackWindowGuiState>"#,
        )
        .unwrap();

        assert_eq!(state.fold_percent, 2.5);
        assert_eq!(state.group_patterns, vec!["System.*->CLR"]);
        assert_eq!(state.fold_patterns, vec!["Memmove"]);
    }

    #[test]
    fn test_xml_round_trip() {
        let state = ViewState {
            notes: "checked build".to_string(),
            include_patterns: vec!["app!*".to_string()],
            ..ViewState::with_clr_grouping()
        };
        let parsed = ViewState::from_xml_element(&state.to_xml_element()).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_json_aliases_and_unknown_fields() {
        let state: ViewState =
            serde_json::from_str(r#"{"GroupRegEx": ["a->b"], "Extra": 1}"#).unwrap();
        assert_eq!(state.group_patterns, vec!["a->b"]);
        assert_eq!(state.fold_percent, DEFAULT_FOLD_PERCENT);
    }

    #[test]
    fn test_bad_fold_percent() {
        assert!(ViewState::parse_xml(
            "<StackWindowGuiState><FoldPercent>x</FoldPercent></StackWindowGuiState>"
        )
        .is_err());
    }
}
