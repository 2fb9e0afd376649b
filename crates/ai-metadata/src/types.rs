use serde::{Deserialize, Serialize};
use stockmeta_core_types::ImageType;

/// Fields generated for one image. Produced once, consumed once by the
/// applier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
    /// Reply text that held no parseable JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl MetadataResult {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            raw: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    /// True when there is nothing the applier could write.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.keywords.is_empty()
            && self.category1.is_none()
            && self.category2.is_none()
            && self.image_type.is_none()
    }
}
