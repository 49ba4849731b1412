//! YAML TOC files (`toc.yml`).
//!
//! Either a bare list of items or a mapping with `items` and `metadata`.
//! An item with a `uid` and no `href` links through `xref:`.

use serde::Deserialize;
use serde_json::{Map, Value};

use docgraph_markdown::TocOutline;
use docgraph_shared::{Diagnostic, TocItem, codes};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YamlToc {
    List(Vec<YamlTocItem>),
    Document {
        #[serde(default)]
        items: Vec<YamlTocItem>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlTocItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    moniker_range: Option<String>,
    #[serde(default)]
    items: Vec<YamlTocItem>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<YamlTocItem> for TocItem {
    fn from(item: YamlTocItem) -> Self {
        let href = item
            .href
            .or_else(|| item.uid.map(|uid| format!("xref:{uid}")));
        TocItem {
            title: item.name.unwrap_or_default(),
            href,
            moniker_range: item.moniker_range,
            metadata: item.metadata,
            children: item.items.into_iter().map(TocItem::from).collect(),
            ..TocItem::default()
        }
    }
}

/// Parse a YAML TOC into the same outline shape as a markdown TOC.
pub fn parse_yaml_toc(content: &str) -> TocOutline {
    if content.trim().is_empty() {
        return TocOutline::default();
    }
    match serde_yaml::from_str::<YamlToc>(content) {
        Ok(YamlToc::List(items)) => TocOutline {
            items: items.into_iter().map(TocItem::from).collect(),
            ..TocOutline::default()
        },
        Ok(YamlToc::Document { items, metadata }) => TocOutline {
            items: items.into_iter().map(TocItem::from).collect(),
            metadata,
            diagnostics: Vec::new(),
        },
        Err(e) => {
            let mut diagnostic =
                Diagnostic::error(codes::INVALID_TOC, format!("invalid YAML TOC: {e}"));
            if let Some(location) = e.location() {
                diagnostic = diagnostic.with_line(location.line());
            }
            TocOutline {
                diagnostics: vec![diagnostic],
                ..TocOutline::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_root() {
        let outline = parse_yaml_toc(
            "- name: Install\n  href: install.md\n- name: Reference\n  items:\n    - name: Client\n      uid: api.client\n",
        );
        assert_eq!(outline.items.len(), 2);
        assert_eq!(outline.items[0].href.as_deref(), Some("install.md"));
        let client = &outline.items[1].children[0];
        assert_eq!(client.title, "Client");
        assert_eq!(client.href.as_deref(), Some("xref:api.client"));
        assert!(outline.diagnostics.is_empty());
    }

    #[test]
    fn document_root_with_metadata() {
        let outline = parse_yaml_toc(
            "metadata:\n  monikerRange: '>= 2.0'\nitems:\n  - name: New\n    href: new.md\n    monikerRange: '> 3.0'\n",
        );
        assert_eq!(outline.metadata["monikerRange"], ">= 2.0");
        assert_eq!(outline.items[0].moniker_range.as_deref(), Some("> 3.0"));
    }

    #[test]
    fn malformed_yaml_is_an_invalid_toc() {
        let outline = parse_yaml_toc("- name: [unclosed\n");
        assert!(outline.items.is_empty());
        assert_eq!(outline.diagnostics.len(), 1);
        assert_eq!(outline.diagnostics[0].code, codes::INVALID_TOC);
        assert!(outline.diagnostics[0].is_error());
    }

    #[test]
    fn empty_file_is_empty() {
        assert!(parse_yaml_toc("  \n").items.is_empty());
    }
}
