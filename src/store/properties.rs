use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::util::truncate_chars;

/// The document store rejects text values longer than this.
pub const RICH_TEXT_MAX_CHARS: usize = 2000;

/// A field value in the wrapper its target property type expects.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Date(NaiveDate),
    Select(String),
    Checkbox(bool),
    Number(f64),
    Relation(Vec<String>),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Title(text) => json!({ "title": text_content(text) }),
            Self::RichText(text) => json!({ "rich_text": text_content(text) }),
            Self::Date(date) => json!({ "date": { "start": date.to_string() } }),
            // Commas are not allowed in select option names.
            Self::Select(name) => json!({ "select": { "name": name.replace(',', " ") } }),
            Self::Checkbox(checked) => json!({ "checkbox": checked }),
            Self::Number(number) => json!({ "number": number }),
            Self::Relation(ids) => json!({
                "relation": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
            }),
        }
    }
}

fn text_content(text: &str) -> Value {
    if text.is_empty() {
        return json!([]);
    }
    json!([{ "text": { "content": truncate_chars(text, RICH_TEXT_MAX_CHARS) } }])
}

/// Property name → typed value, in a stable order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: PropertyValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Skips the property when `value` is `None`, leaving the field unset.
    pub fn with_optional(self, name: &str, value: Option<PropertyValue>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    TitleContains { property: String, value: String },
    DateEquals { property: String, date: NaiveDate },
    And(Vec<Filter>),
}

impl Filter {
    pub fn title_contains(property: &str, value: &str) -> Self {
        Self::TitleContains {
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    pub fn date_equals(property: &str, date: NaiveDate) -> Self {
        Self::DateEquals {
            property: property.to_string(),
            date,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::TitleContains { property, value } => json!({
                "property": property,
                "title": { "contains": value },
            }),
            Self::DateEquals { property, date } => json!({
                "property": property,
                "date": { "equals": date.to_string() },
            }),
            Self::And(filters) => json!({
                "and": filters.iter().map(Filter::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

/// Plain text of a title or rich-text property as returned by the store.
pub fn plain_text(property: &Value) -> String {
    ["title", "rich_text"]
        .iter()
        .filter_map(|key| property.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|part| {
            part.get("plain_text")
                .or_else(|| part.get("text").and_then(|text| text.get("content")))
                .and_then(Value::as_str)
        })
        .collect()
}
