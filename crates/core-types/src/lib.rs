//! Shared primitives for the stockmeta crates.
//!
//! Everything here is plain data: identifiers extracted from the host page,
//! handles into DOM snapshots and the small enums that travel between the
//! locator, the writers and the drivers.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for parsing the primitives below.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown image type: {0}")]
    UnknownImageType(String),
}

static STRICT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{7,})").expect("static regex"));
static LENIENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.").expect("static regex"));

/// Numeric identifier of a stock item, taken from its image URL.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub String);

impl ImageId {
    pub const UNKNOWN: &'static str = "unknown";

    /// Strict extraction: a run of at least seven digits.
    pub fn strict(url: &str) -> Option<Self> {
        STRICT_ID
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    /// Digits right before a dot (`.../123.jpg`).
    pub fn lenient(url: &str) -> Option<Self> {
        LENIENT_ID
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    /// Strict extraction, falling back to [`ImageId::lenient`].
    pub fn from_url(url: &str) -> Option<Self> {
        Self::strict(url).or_else(|| Self::lenient(url))
    }

    /// Like [`ImageId::from_url`] but never fails; unparseable URLs map to `unknown`.
    pub fn from_url_or_unknown(url: &str) -> Self {
        Self::from_url(url).unwrap_or_else(|| Self(Self::UNKNOWN.to_string()))
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `url` mentions this id anywhere.
    pub fn appears_in(&self, url: &str) -> bool {
        !self.is_unknown() && url.contains(&self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of an element inside one DOM snapshot (document order).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node addressed together with the snapshot generation it came from.
///
/// Page drivers refuse handles from an older generation instead of acting on
/// whatever element now sits at the same index.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ElementHandle {
    pub generation: u64,
    pub node: NodeId,
}

impl ElementHandle {
    pub fn new(generation: u64, node: NodeId) -> Self {
        Self { generation, node }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}{}", self.generation, self.node)
    }
}

/// Image type selector value on the submission form.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ImageType {
    Photo,
    Illustration,
}

impl ImageType {
    pub fn label(self) -> &'static str {
        match self {
            ImageType::Photo => "Photo",
            ImageType::Illustration => "Illustration",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ImageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" | "photograph" => Ok(ImageType::Photo),
            "illustration" | "vector" => Ok(ImageType::Illustration),
            other => Err(CoreError::UnknownImageType(other.to_string())),
        }
    }
}

/// Identifier for one CLI run, used to correlate log lines.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_id_prefers_long_digit_runs() {
        let url = "https://image.example.com/image-photo/sunset-260nw-2345678901.jpg";
        assert_eq!(ImageId::from_url(url).unwrap().as_str(), "2345678901");
    }

    #[test]
    fn lenient_id_falls_back_to_digits_before_dot() {
        assert!(ImageId::strict("https://cdn.example.com/thumb/123.jpg").is_none());
        let id = ImageId::from_url("https://cdn.example.com/thumb/123.jpg").unwrap();
        assert_eq!(id.as_str(), "123");
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let id = ImageId::from_url_or_unknown("data:image/png;base64,AAAA");
        assert!(id.is_unknown());
        assert!(!id.appears_in("unknown"));
    }

    #[test]
    fn image_type_parses_case_insensitively() {
        assert_eq!("PHOTO".parse::<ImageType>().unwrap(), ImageType::Photo);
        assert_eq!(
            " illustration ".parse::<ImageType>().unwrap(),
            ImageType::Illustration
        );
        assert!("video".parse::<ImageType>().is_err());
    }
}
