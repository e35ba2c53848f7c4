//! JSON-LD extraction.

use scraper::{Html, Selector};
use serde_json::Value;

use super::{ExtractedItem, Syntax};
use crate::payload::StructuredObject;
use structmail_mime::LD_JSON;

/// Collects the objects of every JSON-LD script in a document.
pub(super) fn extract(document: &Html) -> Vec<StructuredObject> {
    let Ok(selector) = Selector::parse("script[type]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case(LD_JSON))
        })
        .flat_map(|script| {
            let text: String = script.text().collect();
            parse_objects(&text)
        })
        .collect()
}

/// Parses a raw JSON-LD document (such as a dedicated part body).
///
/// A top-level array yields one item per object and an `@graph` yields
/// one item per node. Unparsable text yields no items.
#[must_use]
pub fn extract_json_str(text: &str) -> Vec<ExtractedItem> {
    parse_objects(text)
        .into_iter()
        .map(|object| ExtractedItem::new(Syntax::JsonLd, object))
        .collect()
}

fn parse_objects(text: &str) -> Vec<StructuredObject> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => {
            let mut objects = Vec::new();
            flatten(value, &mut objects);
            objects
        }
        Err(e) => {
            tracing::debug!("Skipping unparsable JSON-LD block: {}", e);
            Vec::new()
        }
    }
}

fn flatten(value: Value, objects: &mut Vec<StructuredObject>) {
    match value {
        Value::Array(values) => {
            for value in values {
                flatten(value, objects);
            }
        }
        Value::Object(mut object) if matches!(object.get("@graph"), Some(Value::Array(_))) => {
            let context = object.get("@context").cloned();
            let Some(Value::Array(nodes)) = object.get_mut("@graph").map(Value::take) else {
                return;
            };
            for node in nodes {
                if let Value::Object(mut node) = node {
                    if let Some(context) = &context {
                        node.entry("@context").or_insert_with(|| context.clone());
                    }
                    objects.push(node);
                }
            }
        }
        Value::Object(object) => objects.push(object),
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn names(items: &[ExtractedItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| item.object.get("name").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_scripts_in_document() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type": "Event", "name": "one"}</script>
            <script type="text/javascript">var x = 1;</script>
            <script type=" Application/LD+JSON ">[{"name": "two"}, {"name": "three"}]</script>
            <script type="application/ld+json">{ not json</script>
            </head></html>"#;

        let document = Html::parse_document(html);
        let objects = extract(&document);
        let names: Vec<&str> = objects
            .iter()
            .filter_map(|o| o.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_graph_nodes_inherit_context() {
        let items = extract_json_str(
            r#"{"@context": "https://schema.org", "@graph": [
                {"@type": "WebPage", "name": "page"},
                {"@type": "Event", "name": "gig", "@context": "http://schema.org"}
            ]}"#,
        );
        assert_eq!(names(&items), vec!["page", "gig"]);
        assert_eq!(items[0].object["@context"], "https://schema.org");
        assert_eq!(items[1].object["@context"], "http://schema.org");
    }

    #[test]
    fn test_non_array_graph_stays_in_place() {
        let items = extract_json_str(r#"{"@type": "Dataset", "@graph": "g", "name": "d"}"#);
        assert_eq!(items.len(), 1);
        let keys: Vec<&str> = items[0].object.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["@type", "@graph", "name"]);
    }

    #[test]
    fn test_scalar_and_garbage_yield_nothing() {
        assert!(extract_json_str("42").is_empty());
        assert!(extract_json_str("<html>").is_empty());
        assert!(extract_json_str("").is_empty());
    }

    #[test]
    fn test_array_skips_non_objects() {
        let items = extract_json_str(r#"[{"name": "a"}, "b", null]"#);
        assert_eq!(names(&items), vec!["a"]);
        assert!(items.iter().all(|item| item.syntax == Syntax::JsonLd));
    }
}
