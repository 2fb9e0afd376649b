//! Element location strategies for the form roles.
//!
//! Each strategy is a pure function of the snapshot. Chains are tried in
//! order and the first `Some` wins; see [`crate::Locator`].

use crate::snapshot::{DomNode, DomSnapshot};
use crate::types::{LocateContext, Located};
use stockmeta_core_types::NodeId;
use tracing::debug;

/// One way of finding an element.
pub trait Strategy: Send + Sync {
    /// Stable name reported in [`Located::strategy`] and in traces.
    fn name(&self) -> &'static str;

    fn attempt(&self, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<Located>;
}

/// Ordered fallback chain.
pub struct Chain {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Chain {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<Located> {
        for strategy in &self.strategies {
            if let Some(found) = strategy.attempt(snapshot, ctx) {
                return Some(found);
            }
            debug!("Strategy {} found nothing", strategy.name());
        }
        None
    }
}

pub(crate) fn is_img(node: &DomNode) -> bool {
    node.is("img")
}

/// `a, button, div[role=button]`
pub(crate) fn is_clickable(node: &DomNode) -> bool {
    node.is_any(&["a", "button"]) || (node.is("div") && node.role() == Some("button"))
}

pub(crate) fn inside_card(snapshot: &DomSnapshot, id: NodeId, card_test_id: &str) -> bool {
    snapshot
        .closest(id, |n| n.is("div") && n.get_attr("data-testid") == Some(card_test_id))
        .is_some()
}

/// Thumbnail of the card the batch driver pinned. Matched by URL, then by id.
pub struct PinnedThumbnail;

impl Strategy for PinnedThumbnail {
    fn name(&self) -> &'static str {
        "pinned_thumbnail"
    }

    fn attempt(&self, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<Located> {
        let pinned = ctx.pinned.as_ref()?;
        let by_src = snapshot
            .select(|n| is_img(n) && n.src() == Some(pinned.src.as_str()))
            .next();
        let found = by_src.or_else(|| {
            snapshot
                .select(|n| is_img(n) && n.src().is_some_and(|s| pinned.image_id.appears_in(s)))
                .next()
        })?;
        Some(Located::new(found, self.name()))
    }
}

/// First element with `tag` whose test-id attribute equals `value`.
pub struct ByTestId {
    name: &'static str,
    tag: &'static str,
    attr: &'static str,
    value: String,
}

impl ByTestId {
    pub fn new(name: &'static str, tag: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            tag,
            attr: "data-test-id",
            value: value.into(),
        }
    }
}

impl Strategy for ByTestId {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        snapshot
            .select(|n| n.is(self.tag) && n.get_attr(self.attr) == Some(self.value.as_str()))
            .next()
            .map(|id| Located::new(id, self.name))
    }
}

/// Largest rendered image that is clearly not an icon or a card thumbnail.
pub struct LargestVisibleImage {
    pub min_px: f64,
    pub card_test_id: String,
}

impl Strategy for LargestVisibleImage {
    fn name(&self) -> &'static str {
        "largest_visible_image"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        let mut candidates: Vec<(NodeId, f64)> = snapshot
            .iter()
            .filter(|(_, n)| {
                is_img(n)
                    && n.visible
                    && n.rect.y >= 0.0
                    && n.rect.width > self.min_px
                    && n.rect.height > self.min_px
            })
            .filter(|(id, _)| !inside_card(snapshot, *id, &self.card_test_id))
            .map(|(id, n)| (id, n.rect.area()))
            .collect();
        // Stable sort keeps document order among equal areas.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (best, _) = candidates.first().copied()?;
        let rect = snapshot.node(best).rect;
        debug!(
            "Found {} candidate images. Best: {}x{}",
            candidates.len(),
            rect.width,
            rect.height
        );
        Some(Located::new(best, self.name()))
    }
}

/// First `input` inside `div[data-test-id=<wrapper>]`.
pub struct InputInsideWrapper {
    pub wrapper_test_id: String,
}

impl Strategy for InputInsideWrapper {
    fn name(&self) -> &'static str {
        "keywords_wrapper_input"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        snapshot
            .iter()
            .filter(|(_, n)| n.is("input"))
            .find(|(id, _)| {
                snapshot.ancestors(*id).any(|a| {
                    let node = snapshot.node(a);
                    node.is("div")
                        && node.get_attr("data-test-id") == Some(self.wrapper_test_id.as_str())
                })
            })
            .map(|(id, _)| Located::new(id, self.name()))
    }
}

/// Text control whose name/id/placeholder/aria-label mentions a description
/// or title, ignoring search boxes.
pub struct TitleByAttributes;

impl Strategy for TitleByAttributes {
    fn name(&self) -> &'static str {
        "title_by_attributes"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        snapshot
            .select(|n| {
                let text_control = n.is("textarea")
                    || (n.is("input") && n.get_attr("type").map(str::to_lowercase).as_deref() == Some("text"));
                if !text_control {
                    return false;
                }
                let fingerprint = n.field_fingerprint();
                (fingerprint.contains("description") || fingerprint.contains("title"))
                    && !fingerprint.contains("search")
            })
            .next()
            .map(|id| Located::new(id, self.name()))
    }
}

pub struct KeywordsByAttributes;

impl Strategy for KeywordsByAttributes {
    fn name(&self) -> &'static str {
        "keywords_by_attributes"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        snapshot
            .select(|n| {
                if !n.is_any(&["input", "textarea"]) {
                    return false;
                }
                let fingerprint = n.field_fingerprint();
                fingerprint.contains("keyword") || fingerprint.contains("tag")
            })
            .next()
            .map(|id| Located::new(id, self.name()))
    }
}

/// `select, input, [role=button], [role=combobox], div[class*=select], div[class*=dropdown]`
pub(crate) fn is_form_control(node: &DomNode) -> bool {
    node.is_any(&["select", "input"])
        || matches!(node.role(), Some("button") | Some("combobox"))
        || (node.is("div") && (node.class_contains("select") || node.class_contains("dropdown")))
}

/// Dropdown grouped with a visible label such as "Category 1".
///
/// Walks up from the label at most five containers and takes the first
/// control that does not precede the label, so a shared parent never yields
/// the control of an earlier label.
pub struct LabelledControl {
    name: &'static str,
    label: String,
}

const LABEL_CONTAINER_DEPTH: usize = 5;

impl LabelledControl {
    pub fn new(name: &'static str, label: impl Into<String>) -> Self {
        Self {
            name,
            label: label.into(),
        }
    }

    fn control_near(&self, snapshot: &DomSnapshot, label: NodeId) -> Option<NodeId> {
        for container in snapshot.ancestors(label).take(LABEL_CONTAINER_DEPTH) {
            let found = snapshot.descendants(container).find(|candidate| {
                let node = snapshot.node(*candidate);
                *candidate > label
                    && is_form_control(node)
                    && !(node.is("input") && node.input_type() == "hidden")
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

impl Strategy for LabelledControl {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        let wanted = self.label.to_lowercase();
        let labels: Vec<NodeId> = snapshot
            .select(|n| n.is_any(&["div", "span", "p", "label"]))
            .filter(|id| {
                snapshot
                    .inner_text(*id)
                    .trim()
                    .to_lowercase()
                    .starts_with(&wanted)
            })
            .collect();
        labels
            .into_iter()
            .find_map(|label| self.control_near(snapshot, label))
            .map(|id| Located::new(id, self.name))
    }
}
