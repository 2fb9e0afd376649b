//! Site-specific selector constants.
//!
//! Everything the heuristics key on lives here so a site release can be
//! followed from the config file.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Host the submission page is served from; used to pick the tab.
    pub host: String,
    /// `img[data-test-id=...]` of the editor preview.
    pub preview_image_test_id: String,
    /// `textarea[data-test-id=...]` of the description (title) field.
    pub description_test_id: String,
    /// `div[data-test-id=...] input` wrapping the keyword tokenizer.
    pub keywords_test_id: String,
    /// `div[data-testid=...]` of a portfolio card.
    pub card_test_id: String,
    pub category1_label: String,
    pub category2_label: String,
    pub image_type_label: String,
    pub tour_banner_text: String,
    /// Element id of any overlay injected by us; never treated as an option.
    pub overlay_id: String,
    pub no_people_label: String,
    pub ai_generated_label: String,
    pub min_main_image_px: f64,
    pub min_thumbnail_px: f64,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            host: "submit.shutterstock.com".to_string(),
            preview_image_test_id: "preview-image".to_string(),
            description_test_id: "description-input".to_string(),
            keywords_test_id: "keywords-input".to_string(),
            card_test_id: "asset-card".to_string(),
            category1_label: "Category 1".to_string(),
            category2_label: "Category 2".to_string(),
            image_type_label: "Image type".to_string(),
            tour_banner_text: "Welcome to the new Shutterstock Contributor experience"
                .to_string(),
            overlay_id: "shutterstock-ai-overlay".to_string(),
            no_people_label: "No people".to_string(),
            ai_generated_label: "AI generated".to_string(),
            min_main_image_px: 100.0,
            min_thumbnail_px: 30.0,
        }
    }
}
