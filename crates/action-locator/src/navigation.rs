//! Strategies for finding the control that advances to the next item.
//!
//! All of them start from the current main image, so they share the
//! main-image chain with the locator.

use std::sync::Arc;

use stockmeta_core_types::{ImageId, NodeId};
use tracing::debug;

use crate::snapshot::{DomNode, DomSnapshot};
use crate::strategies::{is_clickable, is_img, Chain, Strategy};
use crate::types::{LocateContext, Located};

const NEXT_PHRASES: [&str; 6] = [
    "next item",
    "next image",
    "next",
    "navigate next",
    "forward",
    "chevron right",
];

fn main_src(chain: &Chain, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<(NodeId, String)> {
    let main = chain.run(snapshot, ctx)?;
    let src = snapshot.node(main.node).src()?.to_string();
    Some((main.node, src))
}

/// Portfolio cards in document order.
pub struct CardSequence {
    pub main_image: Arc<Chain>,
    pub card_test_id: String,
}

impl CardSequence {
    fn active_card(&self, snapshot: &DomSnapshot, cards: &[NodeId], main_id: &ImageId) -> Option<usize> {
        let by_image = cards.iter().position(|card| {
            snapshot
                .first_descendant(*card, is_img)
                .and_then(|img| snapshot.node(img).src())
                .is_some_and(|src| main_id.appears_in(src))
        });
        by_image.or_else(|| {
            cards.iter().position(|card| {
                std::iter::once(*card)
                    .chain(snapshot.descendants(*card))
                    .any(|n| {
                        let node = snapshot.node(n);
                        node.get_attr("aria-selected") == Some("true")
                            || (node.is("input")
                                && node.input_type() == "checkbox"
                                && node.checked == Some(true))
                    })
            })
        })
    }
}

impl Strategy for CardSequence {
    fn name(&self) -> &'static str {
        "card_sequence"
    }

    fn attempt(&self, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<Located> {
        let (_, src) = main_src(&self.main_image, snapshot, ctx)?;
        let main_id = ImageId::strict(&src)?;
        debug!("Card navigation from main id {}", main_id);

        let cards: Vec<NodeId> = snapshot
            .select(|n| n.is("div") && n.get_attr("data-testid") == Some(self.card_test_id.as_str()))
            .collect();
        let current = self.active_card(snapshot, &cards, &main_id)?;
        let next_card = *cards.get(current + 1)?;
        let next_img = snapshot.first_descendant(next_card, is_img);
        let next_id = next_img
            .and_then(|img| snapshot.node(img).src())
            .and_then(ImageId::strict);
        Some(Located::new(next_img.unwrap_or(next_card), self.name()).with_next_id(next_id))
    }
}

/// Thumbnail strip: the image after the current one among all non-icon images.
pub struct ThumbnailSequence {
    pub main_image: Arc<Chain>,
    pub min_px: f64,
}

impl Strategy for ThumbnailSequence {
    fn name(&self) -> &'static str {
        "thumbnail_sequence"
    }

    fn attempt(&self, snapshot: &DomSnapshot, ctx: &LocateContext) -> Option<Located> {
        let (main, src) = main_src(&self.main_image, snapshot, ctx)?;
        let main_id = ImageId::from_url(&src)?;

        let thumbs: Vec<NodeId> = snapshot
            .select(|n| is_img(n) && n.rect.width >= self.min_px && n.rect.height >= self.min_px)
            .filter(|id| *id != main)
            .collect();
        let current = thumbs.iter().position(|id| {
            snapshot
                .node(*id)
                .src()
                .is_some_and(|s| main_id.appears_in(s))
        });
        let Some(current) = current else {
            debug!("Thumbnail navigation: {} not among {} thumbnails", main_id, thumbs.len());
            return None;
        };
        let next = *thumbs.get(current + 1)?;
        let next_id = snapshot.node(next).src().and_then(ImageId::lenient);
        let target = snapshot.closest(next, is_clickable).unwrap_or(next);
        Some(Located::new(target, self.name()).with_next_id(next_id))
    }
}

/// Sibling of whatever the page marks as selected inside a grid or list.
pub struct SelectedSibling;

fn looks_selected(node: &DomNode) -> bool {
    node.get_attr("aria-selected") == Some("true")
        || node.class_contains("selected")
        || node.class_contains("active")
        || node.get_attr("style").is_some_and(|s| s.contains("border"))
}

fn is_collection(node: &DomNode) -> bool {
    (node.is("div") && (node.class_contains("grid") || node.class_contains("list")))
        || node.is_any(&["ul", "section"])
}

impl Strategy for SelectedSibling {
    fn name(&self) -> &'static str {
        "selected_sibling"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        for active in snapshot.select(looks_selected) {
            if snapshot.closest(active, is_collection).is_none() {
                continue;
            }
            let next = snapshot.next_sibling(active).or_else(|| {
                let parent = snapshot.parent(active)?;
                let wrapper = snapshot.node(parent);
                (wrapper.is("li") || wrapper.class_contains("item"))
                    .then(|| snapshot.next_sibling(parent))
                    .flatten()
            });
            let Some(next) = next else {
                continue;
            };
            let target = snapshot
                .first_descendant(next, |n| n.is_any(&["a", "button", "img"]))
                .unwrap_or(next);
            let next_id = std::iter::once(target)
                .chain(snapshot.descendants(target))
                .find_map(|n| snapshot.node(n).src())
                .and_then(ImageId::from_url);
            return Some(Located::new(target, self.name()).with_next_id(next_id));
        }
        None
    }
}

/// Toolbar control labelled as "next", never pagination.
pub struct NextLabelledControl;

impl NextLabelledControl {
    fn mentions_next(text: &str) -> bool {
        NEXT_PHRASES.iter().any(|phrase| text.contains(phrase))
    }
}

impl Strategy for NextLabelledControl {
    fn name(&self) -> &'static str {
        "next_labelled_control"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        snapshot
            .select(is_clickable)
            .find(|id| {
                let node = snapshot.node(*id);
                let aria = node.attr_lower("aria-label");
                let text = snapshot.inner_text(*id).to_lowercase();
                if aria.contains("page") || text.contains("page") {
                    return false;
                }
                if node.visible && (Self::mentions_next(&aria) || Self::mentions_next(&text)) {
                    return true;
                }
                if node.attr_lower("data-test-id").contains("next") {
                    return true;
                }
                snapshot
                    .first_descendant(*id, |n| n.is("svg"))
                    .and_then(|svg| snapshot.first_descendant(svg, |n| n.is("title")))
                    .is_some_and(|title| Self::mentions_next(&snapshot.inner_text(title).to_lowercase()))
            })
            .map(|id| Located::new(id, self.name()))
    }
}

/// `i.fa-chevron-right, i.icon-next, svg[data-icon=chevron-right]` and its button.
pub struct ChevronIcon;

impl Strategy for ChevronIcon {
    fn name(&self) -> &'static str {
        "chevron_icon"
    }

    fn attempt(&self, snapshot: &DomSnapshot, _ctx: &LocateContext) -> Option<Located> {
        let icon = snapshot
            .select(|n| {
                (n.is("i") && (n.has_class("fa-chevron-right") || n.has_class("icon-next")))
                    || (n.is("svg") && n.get_attr("data-icon") == Some("chevron-right"))
            })
            .next()?;
        let target = snapshot.closest(icon, is_clickable).unwrap_or(icon);
        Some(Located::new(target, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use crate::strategies::{ByTestId, LargestVisibleImage};

    fn main_chain() -> Arc<Chain> {
        Arc::new(Chain::new(vec![
            Box::new(ByTestId::new("preview_image", "img", "preview-image")),
            Box::new(LargestVisibleImage {
                min_px: 100.0,
                card_test_id: "asset-card".into(),
            }),
        ]))
    }

    fn cards_page() -> (DomSnapshot, Vec<NodeId>) {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        b.push(
            Some(body),
            DomNode::img("https://cdn/preview/2000002.jpg", 600.0, 400.0).attr("data-test-id", "preview-image"),
        );
        let mut imgs = Vec::new();
        for id in ["2000001", "2000002", "2000003"] {
            let card = b.push(Some(body), DomNode::new("div").attr("data-testid", "asset-card"));
            imgs.push(b.push(Some(card), DomNode::img(&format!("https://cdn/thumb/{id}.jpg"), 80.0, 80.0)));
        }
        (b.build().unwrap(), imgs)
    }

    #[test]
    fn card_sequence_returns_following_card_image() {
        let (snap, imgs) = cards_page();
        let strategy = CardSequence {
            main_image: main_chain(),
            card_test_id: "asset-card".into(),
        };
        let found = strategy.attempt(&snap, &LocateContext::default()).unwrap();
        assert_eq!(found.node, imgs[2]);
        assert_eq!(found.next_id, Some(ImageId("2000003".into())));
    }

    #[test]
    fn thumbnail_sequence_prefers_clickable_wrapper() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        b.push(Some(body), DomNode::img("https://cdn/large/55.jpg", 700.0, 500.0));
        let strip = b.push(Some(body), DomNode::new("div"));
        b.push(Some(strip), DomNode::img("https://cdn/s/55.jpg", 40.0, 40.0));
        b.push(Some(strip), DomNode::img("https://cdn/s/spacer.gif", 10.0, 10.0));
        let link = b.push(Some(strip), DomNode::new("a"));
        b.push(Some(link), DomNode::img("https://cdn/s/56.jpg", 40.0, 40.0));
        let snap = b.build().unwrap();

        let strategy = ThumbnailSequence {
            main_image: main_chain(),
            min_px: 30.0,
        };
        let found = strategy.attempt(&snap, &LocateContext::default()).unwrap();
        assert_eq!(found.node, link);
        assert_eq!(found.next_id, Some(ImageId("56".into())));
    }

    #[test]
    fn selected_sibling_climbs_out_of_list_items() {
        let mut b = SnapshotBuilder::new();
        let list = b.push(None, DomNode::new("ul"));
        let li1 = b.push(Some(list), DomNode::new("li"));
        b.push(Some(li1), DomNode::new("div").attr("aria-selected", "true"));
        let li2 = b.push(Some(list), DomNode::new("li"));
        let img = b.push(Some(li2), DomNode::img("https://cdn/t/9876543.jpg", 50.0, 50.0));
        let snap = b.build().unwrap();

        let found = SelectedSibling.attempt(&snap, &LocateContext::default()).unwrap();
        assert_eq!(found.node, img);
        assert_eq!(found.next_id, Some(ImageId("9876543".into())));
    }

    #[test]
    fn labelled_control_skips_pagination() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        b.push(Some(body), DomNode::new("button").text("Next page"));
        b.push(Some(body), DomNode::new("button").attr("aria-label", "Next image").hidden());
        let by_svg = b.push(Some(body), DomNode::new("button"));
        let svg = b.push(Some(by_svg), DomNode::new("svg"));
        b.push(Some(svg), DomNode::new("title").text("Chevron Right"));
        let snap = b.build().unwrap();

        let found = NextLabelledControl.attempt(&snap, &LocateContext::default()).unwrap();
        assert_eq!(found.node, by_svg);
    }

    #[test]
    fn chevron_icon_resolves_to_its_button() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let button = b.push(Some(body), DomNode::new("button"));
        b.push(Some(button), DomNode::new("i").attr("class", "fa fa-chevron-right"));
        let snap = b.build().unwrap();
        let found = ChevronIcon.attempt(&snap, &LocateContext::default()).unwrap();
        assert_eq!(found.node, button);
    }
}
