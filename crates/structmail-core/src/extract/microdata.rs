//! Microdata extraction.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use crate::payload::StructuredObject;

/// Converts every top-level `itemscope` element into an object.
pub(super) fn extract(document: &Html) -> Vec<StructuredObject> {
    let Ok(selector) = Selector::parse("[itemscope]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("itemprop").is_none())
        .map(item_object)
        .collect()
}

fn item_object(scope: ElementRef<'_>) -> StructuredObject {
    let mut object = Map::new();

    if let Some(item_type) = scope
        .value()
        .attr("itemtype")
        .and_then(|types| types.split_whitespace().next())
    {
        let (context, kind) = split_item_type(item_type);
        if let Some(context) = context {
            object.insert("@context".to_string(), Value::String(context));
        }
        object.insert("@type".to_string(), Value::String(kind));
    }

    if let Some(id) = scope.value().attr("itemid") {
        object.insert("@id".to_string(), Value::String(id.to_string()));
    }

    collect_properties(scope, &mut object);
    object
}

/// Splits `https://schema.org/Event` into its origin and last path segment.
fn split_item_type(item_type: &str) -> (Option<String>, String) {
    if let Ok(url) = Url::parse(item_type) {
        let kind = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(ToString::to_string);
        if let Some(kind) = kind {
            let origin = url.origin();
            let context = origin.is_tuple().then(|| origin.ascii_serialization());
            return (context, kind);
        }
    }

    let kind = item_type
        .rsplit('/')
        .next()
        .unwrap_or(item_type)
        .to_string();
    (None, kind)
}

fn collect_properties(parent: ElementRef<'_>, object: &mut StructuredObject) {
    for child in parent.children().filter_map(ElementRef::wrap) {
        let is_scope = child.value().attr("itemscope").is_some();

        if let Some(names) = child.value().attr("itemprop") {
            let value = if is_scope {
                Value::Object(item_object(child))
            } else {
                Value::String(property_value(child))
            };
            for name in names.split_whitespace() {
                insert_property(object, name, value.clone());
            }
        }

        // Nested scopes own their descendants.
        if !is_scope {
            collect_properties(child, object);
        }
    }
}

fn property_value(element: ElementRef<'_>) -> String {
    let attributes = ["content", "href", "src", "datetime", "value"];
    if let Some(value) = attributes
        .iter()
        .find_map(|name| element.value().attr(name))
    {
        return value.trim().to_string();
    }

    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inserts a property, turning repeated names into arrays.
fn insert_property(object: &mut StructuredObject, name: &str, value: Value) {
    match object.get_mut(name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            object.insert(name.to_string(), value);
        }
    }
}
