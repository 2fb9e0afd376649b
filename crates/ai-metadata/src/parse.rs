//! Reply parsing: pull the JSON object out of free text and sanitise
//! keywords.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stockmeta_core_types::ImageType;
use tracing::{debug, warn};

use crate::types::MetadataResult;

static JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

const MIN_KEYWORD_CHARS: usize = 3;
const MAX_KEYWORD_CHARS: usize = 49;

/// Greedy span from the first `{` to the last `}`.
pub fn extract_json_span(text: &str) -> Option<&str> {
    JSON_SPAN.find(text).map(|m| m.as_str())
}

/// Lower-case, strip, trim, length-filter and dedupe, first occurrence wins.
pub fn sanitize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| DISALLOWED.replace_all(&k.as_ref().to_lowercase(), "").trim().to_string())
        .filter(|k| (MIN_KEYWORD_CHARS..=MAX_KEYWORD_CHARS).contains(&k.chars().count()))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn keyword_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => sanitize_keywords(items.iter().filter_map(Value::as_str)),
        Value::String(joined) => sanitize_keywords(joined.split(',')),
        _ => Vec::new(),
    }
}

fn text_field(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Interpret a model reply. Text without a parseable object comes back as
/// [`MetadataResult::raw`].
pub fn parse_reply(text: &str) -> MetadataResult {
    let Some(span) = extract_json_span(text) else {
        return MetadataResult::raw(text);
    };
    let object: Value = match serde_json::from_str(span) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return MetadataResult::raw(text),
        Err(err) => {
            warn!(%err, "Could not parse JSON in AI reply");
            return MetadataResult::raw(text);
        }
    };

    let image_type = text_field(&object, "imageType").and_then(|s| match s.parse::<ImageType>() {
        Ok(kind) => Some(kind),
        Err(err) => {
            debug!(%err, "ignoring image type");
            None
        }
    });

    MetadataResult {
        title: text_field(&object, "title"),
        keywords: object.get("keywords").map(keyword_list).unwrap_or_default(),
        category1: text_field(&object, "category1"),
        category2: text_field(&object, "category2"),
        image_type,
        raw: None,
    }
}
