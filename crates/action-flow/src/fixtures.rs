//! Page and collaborator doubles shared by the flow tests.

use std::sync::Arc;
use std::time::Duration;

use action_locator::{DomNode, SnapshotBuilder};
use action_primitives::testing::FakePage;
use action_primitives::Timing;
use ai_metadata::{AiError, AiResult, GenerateRequest, MetadataResult, MetadataService};
use async_trait::async_trait;
use parking_lot::Mutex;
use stockmeta_core_types::{ImageType, NodeId};

use crate::deps::FlowDeps;
use crate::settings::{MemorySettings, StoredSettings};

pub const PREVIEW_SRC: &str = "https://cdn.shutterstock.com/preview/2000001.jpg";

pub fn card_src(index: usize) -> String {
    format!("https://cdn.shutterstock.com/photos/{}.jpg", 2_000_101 + index)
}

pub struct FormPage {
    pub page: Arc<FakePage>,
    pub cards: Vec<NodeId>,
    pub card_images: Vec<NodeId>,
    pub preview: NodeId,
    pub category1: NodeId,
    pub category2: NodeId,
    pub image_type: NodeId,
    pub ai_generated: NodeId,
    pub no_people: NodeId,
    pub keywords: NodeId,
    pub title: NodeId,
}

fn categories(select: DomNode) -> DomNode {
    select
        .option("Select a category", "")
        .option("Animals/Wildlife", "animals")
        .option("Nature", "nature")
        .option("Parks/Outdoor", "parks")
}

/// Submission page with `cards` portfolio cards above the editor panel.
pub fn page_with_cards(cards: usize) -> FormPage {
    let mut b = SnapshotBuilder::new();
    let body = b.push(None, DomNode::new("body"));

    let grid = b.push(Some(body), DomNode::new("section"));
    let mut card_nodes = Vec::new();
    let mut card_images = Vec::new();
    for index in 0..cards {
        let card = b.push(Some(grid), DomNode::new("div").attr("data-testid", "asset-card"));
        let img = b.push(Some(card), DomNode::img(&card_src(index), 150.0, 150.0));
        card_nodes.push(card);
        card_images.push(img);
    }

    let main = b.push(Some(body), DomNode::new("main"));
    let preview = b.push(
        Some(main),
        DomNode::img(PREVIEW_SRC, 600.0, 400.0).attr("data-test-id", "preview-image"),
    );

    let panel = b.push(Some(body), DomNode::new("aside"));
    let g1 = b.push(Some(panel), DomNode::new("div"));
    b.push(Some(g1), DomNode::new("span").text("Category 1"));
    let category1 = b.push(Some(g1), categories(DomNode::new("select")).value(""));
    let g2 = b.push(Some(panel), DomNode::new("div"));
    b.push(Some(g2), DomNode::new("span").text("Category 2"));
    let category2 = b.push(Some(g2), categories(DomNode::new("select")).value(""));
    let g3 = b.push(Some(panel), DomNode::new("div"));
    b.push(Some(g3), DomNode::new("span").text("Image type"));
    let image_type = b.push(
        Some(g3),
        DomNode::new("select")
            .option("Photo", "photo")
            .option("Illustration", "illustration")
            .value(""),
    );

    b.push(Some(panel), DomNode::new("label").attr("for", "ai-gen").text("AI generated content"));
    let ai_generated = b.push(
        Some(panel),
        DomNode::new("input").attr("id", "ai-gen").attr("type", "checkbox").checked(false),
    );
    b.push(Some(panel), DomNode::new("label").attr("for", "no-people").text("No people"));
    let no_people = b.push(
        Some(panel),
        DomNode::new("input").attr("id", "no-people").attr("type", "checkbox").checked(false),
    );

    let wrapper = b.push(Some(panel), DomNode::new("div").attr("data-test-id", "keywords-input"));
    let keywords = b.push(Some(wrapper), DomNode::new("input").value(""));
    let title = b.push(
        Some(panel),
        DomNode::new("textarea").attr("data-test-id", "description-input").value(""),
    );

    FormPage {
        page: Arc::new(FakePage::new(b)),
        cards: card_nodes,
        card_images,
        preview,
        category1,
        category2,
        image_type,
        ai_generated,
        no_people,
        keywords,
        title,
    }
}

pub fn form_page() -> FormPage {
    page_with_cards(0)
}

pub fn sample_metadata() -> MetadataResult {
    MetadataResult {
        title: Some("Red fox hunting in deep snow".into()),
        keywords: vec!["fox".into(), "snow".into(), "winter".into()],
        category1: Some("Nature".into()),
        category2: Some("Animals/Wildlife".into()),
        image_type: Some(ImageType::Photo),
        raw: None,
    }
}

/// AI double: records image URLs and answers after `delay`.
pub struct ScriptedAi {
    pub delay: Duration,
    pub fail: bool,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedAi {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Image URLs in call order.
    pub fn images(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl MetadataService for ScriptedAi {
    async fn generate(&self, request: &GenerateRequest) -> AiResult<MetadataResult> {
        self.requests
            .lock()
            .push((request.image_url.clone(), request.system_prompt.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AiError::Provider("model overloaded".into()));
        }
        Ok(sample_metadata())
    }
}

pub fn keyed_settings() -> StoredSettings {
    StoredSettings {
        api_key: Some("sk-test".into()),
        ..StoredSettings::default()
    }
}

pub fn deps(form: &FormPage, ai: Arc<ScriptedAi>, settings: StoredSettings) -> FlowDeps {
    FlowDeps::new(form.page.clone(), ai, Arc::new(MemorySettings::new(settings)))
        .with_timing(Timing::instant())
}
