//! Locator: per-role strategy chains plus the auxiliary finders the writers
//! and drivers use.

use std::collections::HashMap;
use std::sync::Arc;

use stockmeta_core_types::{ImageId, NodeId};
use tracing::{debug, info};

use crate::navigation::{CardSequence, ChevronIcon, NextLabelledControl, SelectedSibling, ThumbnailSequence};
use crate::profile::SiteProfile;
use crate::snapshot::{DomNode, DomSnapshot};
use crate::strategies::{
    is_img, ByTestId, Chain, InputInsideWrapper, KeywordsByAttributes, LabelledControl,
    LargestVisibleImage, PinnedThumbnail, TitleByAttributes,
};
use crate::types::{CardRef, LocateContext, Located, Role};

/// Onboarding banner that steals focus from the title field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TourBanner {
    pub text_node: NodeId,
    pub container: Option<NodeId>,
    pub close: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckboxRef {
    pub node: NodeId,
    pub checked: bool,
}

/// `any_element`: `[aria-label=close|Close]` on any tag; otherwise only
/// `button[aria-label=Close]`. Both accept `button[title=Close]` and the MUI
/// close icon.
fn is_close_marker(node: &DomNode, any_element: bool) -> bool {
    let labelled = if any_element {
        matches!(node.get_attr("aria-label"), Some("close") | Some("Close"))
    } else {
        node.is("button") && node.get_attr("aria-label") == Some("Close")
    };
    labelled
        || (node.is("button") && node.get_attr("title") == Some("Close"))
        || (node.is("svg") && node.get_attr("data-testid") == Some("CloseIcon"))
}

fn is_modal_container(node: &DomNode) -> bool {
    matches!(node.role(), Some("dialog") | Some("presentation"))
        || node.has_class("MuiModal-root")
        || node.has_class("MuiDrawer-root")
}

fn is_unsafe_menu_area(node: &DomNode) -> bool {
    node.is_any(&["header", "footer", "nav"])
        || node.get_attr("data-testid") == Some("user-profile-menu")
        || node.has_class("user-menu")
        || node.get_attr("aria-label") == Some("User menu")
}

/// Resolves [`Role`]s against snapshots of the submission page.
pub struct Locator {
    profile: SiteProfile,
    chains: HashMap<Role, Chain>,
}

impl Locator {
    pub fn new(profile: SiteProfile) -> Self {
        let main_image = Arc::new(Self::main_image_chain(&profile));
        let mut chains = HashMap::new();
        chains.insert(Role::MainImage, Self::main_image_chain(&profile));
        chains.insert(
            Role::TitleField,
            Chain::new(vec![
                Box::new(ByTestId::new(
                    "description_test_id",
                    "textarea",
                    profile.description_test_id.clone(),
                )),
                Box::new(TitleByAttributes),
            ]),
        );
        chains.insert(
            Role::KeywordsField,
            Chain::new(vec![
                Box::new(InputInsideWrapper {
                    wrapper_test_id: profile.keywords_test_id.clone(),
                }),
                Box::new(KeywordsByAttributes),
            ]),
        );
        chains.insert(
            Role::Category1,
            Chain::new(vec![Box::new(LabelledControl::new(
                "category1_label",
                profile.category1_label.clone(),
            ))]),
        );
        chains.insert(
            Role::Category2,
            Chain::new(vec![Box::new(LabelledControl::new(
                "category2_label",
                profile.category2_label.clone(),
            ))]),
        );
        chains.insert(
            Role::ImageType,
            Chain::new(vec![Box::new(LabelledControl::new(
                "image_type_label",
                profile.image_type_label.clone(),
            ))]),
        );
        chains.insert(
            Role::NextItem,
            Chain::new(vec![
                Box::new(CardSequence {
                    main_image: main_image.clone(),
                    card_test_id: profile.card_test_id.clone(),
                }),
                Box::new(ThumbnailSequence {
                    main_image,
                    min_px: profile.min_thumbnail_px,
                }),
                Box::new(SelectedSibling),
                Box::new(NextLabelledControl),
                Box::new(ChevronIcon),
            ]),
        );
        Self { profile, chains }
    }

    fn main_image_chain(profile: &SiteProfile) -> Chain {
        Chain::new(vec![
            Box::new(PinnedThumbnail),
            Box::new(ByTestId::new(
                "preview_image_test_id",
                "img",
                profile.preview_image_test_id.clone(),
            )),
            Box::new(LargestVisibleImage {
                min_px: profile.min_main_image_px,
                card_test_id: profile.card_test_id.clone(),
            }),
        ])
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Strategy names for `role`, in the order they are tried.
    pub fn chain_names(&self, role: Role) -> Vec<&'static str> {
        self.chains.get(&role).map(Chain::names).unwrap_or_default()
    }

    pub fn locate(&self, snapshot: &DomSnapshot, role: Role, ctx: &LocateContext) -> Option<Located> {
        let chain = self.chains.get(&role)?;
        let found = chain.run(snapshot, ctx);
        match &found {
            Some(located) => debug!(
                "Located {} at {} via {}",
                role, located.node, located.strategy
            ),
            None => info!("No element found for {}", role),
        }
        found
    }

    fn is_card(&self, node: &DomNode) -> bool {
        node.is("div") && node.get_attr("data-testid") == Some(self.profile.card_test_id.as_str())
    }

    /// Card containers in document order.
    pub fn cards(&self, snapshot: &DomSnapshot) -> Vec<CardRef> {
        snapshot
            .select(|n| self.is_card(n))
            .enumerate()
            .map(|(index, node)| {
                let image = snapshot.first_descendant(node, is_img);
                let src = image
                    .and_then(|img| snapshot.node(img).src())
                    .map(str::to_string);
                let image_id = src
                    .as_deref()
                    .and_then(ImageId::strict)
                    .unwrap_or_else(|| ImageId(ImageId::UNKNOWN.to_string()));
                CardRef {
                    index,
                    node,
                    image,
                    image_id,
                    src,
                }
            })
            .collect()
    }

    /// The card showing `src` in a fresh snapshot, else the card at `index`.
    pub fn refind_card(&self, snapshot: &DomSnapshot, src: Option<&str>, index: usize) -> Option<CardRef> {
        let cards = self.cards(snapshot);
        let by_src = src.and_then(|src| cards.iter().find(|c| c.src.as_deref() == Some(src)));
        by_src.or_else(|| cards.get(index)).cloned()
    }

    /// Card whose image shows `id`, else any image showing it wrapped in its
    /// nearest `a, div, button`.
    pub fn card_for_id(&self, snapshot: &DomSnapshot, id: &ImageId) -> Option<NodeId> {
        let card = self
            .cards(snapshot)
            .into_iter()
            .find(|c| c.src.as_deref().is_some_and(|s| id.appears_in(s)))
            .map(|c| c.node);
        card.or_else(|| {
            let img = self.image_with_id(snapshot, id)?;
            Some(self.thumbnail_wrapper(snapshot, img))
        })
    }

    pub fn image_with_id(&self, snapshot: &DomSnapshot, id: &ImageId) -> Option<NodeId> {
        snapshot
            .select(|n| is_img(n) && n.src().is_some_and(|s| id.appears_in(s)))
            .next()
    }

    /// The `img` right after the first image showing `id`, in document order.
    pub fn image_following(&self, snapshot: &DomSnapshot, id: &ImageId) -> Option<NodeId> {
        let images: Vec<NodeId> = snapshot.select(is_img).collect();
        let position = images
            .iter()
            .position(|img| snapshot.node(*img).src().is_some_and(|s| id.appears_in(s)))?;
        images.get(position + 1).copied()
    }

    /// Nearest `a, div, button` around a thumbnail, or the thumbnail itself.
    pub fn thumbnail_wrapper(&self, snapshot: &DomSnapshot, img: NodeId) -> NodeId {
        snapshot
            .ancestors(img)
            .find(|a| snapshot.node(*a).is_any(&["a", "div", "button"]))
            .unwrap_or(img)
    }

    /// Every close control on the page, resolved to its button when wrapped.
    pub fn close_controls(&self, snapshot: &DomSnapshot) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for marker in snapshot.select(|n| is_close_marker(n, true)) {
            let target = snapshot.closest(marker, |n| n.is("button")).unwrap_or(marker);
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    /// Close buttons that belong to a modal, drawer or dialog.
    pub fn modal_close_controls(&self, snapshot: &DomSnapshot) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for marker in snapshot.select(|n| is_close_marker(n, false)) {
            let Some(button) = snapshot.closest(marker, |n| n.is("button")) else {
                continue;
            };
            if snapshot.closest(button, is_modal_container).is_some() && !out.contains(&button) {
                out.push(button);
            }
        }
        out
    }

    pub fn find_tour_banner(&self, snapshot: &DomSnapshot) -> Option<TourBanner> {
        let needle = self.profile.tour_banner_text.as_str();
        let mut text_node = snapshot
            .select(|n| n.is_any(&["div", "h1", "h2", "h3", "p"]))
            .find(|id| snapshot.inner_text(*id).contains(needle))?;
        // Narrow down to the innermost element carrying the text.
        while let Some(child) = snapshot
            .children(text_node)
            .into_iter()
            .find(|c| snapshot.inner_text(*c).contains(needle))
        {
            text_node = child;
        }
        let container = snapshot
            .closest(text_node, |n| {
                matches!(n.role(), Some("dialog") | Some("tooltip"))
                    || n.has_class("MuiDrawer-root")
                    || n.has_class("MuiPopover-root")
            })
            .or_else(|| snapshot.parent(text_node).and_then(|p| snapshot.parent(p)));
        let close = container.and_then(|c| {
            let marker = snapshot.first_descendant(c, |n| is_close_marker(n, false))?;
            snapshot.closest(marker, |n| n.is("button"))
        });
        Some(TourBanner {
            text_node,
            container,
            close,
        })
    }

    /// Visible MUI backdrops left behind by dropdown menus.
    pub fn backdrops(&self, snapshot: &DomSnapshot) -> Vec<NodeId> {
        snapshot
            .select(|n| n.visible && (n.has_class("MuiBackdrop-root") || n.has_class("MuiModal-backdrop")))
            .collect()
    }

    /// Checkbox tied to the first `label` whose text contains `label_text`.
    pub fn checkbox_by_label(&self, snapshot: &DomSnapshot, label_text: &str) -> Option<CheckboxRef> {
        let wanted = label_text.to_lowercase();
        let label = snapshot
            .select(|n| n.is("label"))
            .find(|id| snapshot.inner_text(*id).to_lowercase().contains(&wanted))?;
        let by_for = snapshot.node(label).get_attr("for").and_then(|target| {
            snapshot
                .select(move |n| n.get_attr("id") == Some(target))
                .next()
        });
        let input = by_for.or_else(|| snapshot.first_descendant(label, |n| n.is("input")))?;
        let node = snapshot.node(input);
        (node.is("input") && node.input_type() == "checkbox").then(|| CheckboxRef {
            node: input,
            checked: node.checked.unwrap_or(false),
        })
    }

    /// Visible option-like element whose own text contains `text`, resolved to
    /// its `[role=option]` or `li` container. Page chrome is never returned.
    pub fn find_option(&self, snapshot: &DomSnapshot, text: &str) -> Option<NodeId> {
        let wanted = text.to_lowercase();
        let overlay = self.profile.overlay_id.as_str();
        let found = snapshot
            .select(|n| {
                n.visible
                    && !n.is_any(&["script", "style", "noscript"])
                    && n.text.to_lowercase().contains(&wanted)
            })
            .filter(|id| {
                snapshot
                    .closest(*id, |n| n.get_attr("id") == Some(overlay))
                    .is_none()
            })
            .map(|id| {
                snapshot
                    .closest(id, |n| n.role() == Some("option"))
                    .or_else(|| snapshot.closest(id, |n| n.is("li")))
                    .unwrap_or(id)
            })
            .find(|container| {
                let unsafe_area = snapshot.closest(*container, is_unsafe_menu_area).is_some();
                if unsafe_area {
                    debug!("Skipping option candidate {} inside page chrome", container);
                }
                !unsafe_area
            });
        found
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(SiteProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use crate::types::PinnedCard;

    fn batch_page() -> (DomSnapshot, Vec<NodeId>) {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let grid = b.push(Some(body), DomNode::new("div").attr("class", "grid"));
        let mut imgs = Vec::new();
        for id in ["1000001", "1000002"] {
            let card = b.push(Some(grid), DomNode::new("div").attr("data-testid", "asset-card"));
            imgs.push(b.push(Some(card), DomNode::img(&format!("https://cdn/{id}.jpg"), 120.0, 120.0)));
        }
        b.push(Some(grid), DomNode::new("div").attr("data-testid", "asset-card"));
        let panel = b.push(Some(body), DomNode::new("aside"));
        b.push(
            Some(panel),
            DomNode::new("textarea").attr("data-test-id", "description-input"),
        );
        (b.build().unwrap(), imgs)
    }

    #[test]
    fn pinned_card_wins_over_everything() {
        let (snap, imgs) = batch_page();
        let locator = Locator::default();
        assert!(locator
            .locate(&snap, Role::MainImage, &LocateContext::default())
            .is_none());

        let cards = locator.cards(&snap);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[1].image_id, ImageId("1000002".into()));
        assert!(cards[2].image.is_none());
        assert!(cards[2].image_id.is_unknown());

        let ctx = LocateContext::pinned(cards[1].pin().unwrap());
        let main = locator.locate(&snap, Role::MainImage, &ctx).unwrap();
        assert_eq!(main.node, imgs[1]);
        assert_eq!(main.strategy, "pinned_thumbnail");
    }

    #[test]
    fn refind_card_falls_back_to_index() {
        let (snap, _) = batch_page();
        let locator = Locator::default();
        let by_src = locator.refind_card(&snap, Some("https://cdn/1000002.jpg"), 0).unwrap();
        assert_eq!(by_src.index, 1);
        let by_index = locator.refind_card(&snap, Some("https://cdn/gone.jpg"), 2).unwrap();
        assert_eq!(by_index.index, 2);
    }

    #[test]
    fn next_item_from_pinned_card() {
        let (snap, imgs) = batch_page();
        let locator = Locator::default();
        let ctx = LocateContext::pinned(PinnedCard {
            image_id: ImageId("1000001".into()),
            src: "https://cdn/1000001.jpg".into(),
        });
        let next = locator.locate(&snap, Role::NextItem, &ctx).unwrap();
        assert_eq!(next.node, imgs[1]);
        assert_eq!(next.next_id, Some(ImageId("1000002".into())));
        assert_eq!(
            locator.image_following(&snap, &ImageId("1000001".into())),
            Some(imgs[1])
        );
    }

    #[test]
    fn close_controls_resolve_to_buttons_once() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let dialog = b.push(Some(body), DomNode::new("div").attr("role", "dialog"));
        let close = b.push(Some(dialog), DomNode::new("button").attr("aria-label", "Close"));
        b.push(Some(close), DomNode::new("svg").attr("data-testid", "CloseIcon"));
        let loose = b.push(Some(body), DomNode::new("span").attr("aria-label", "close"));
        let snap = b.build().unwrap();
        let locator = Locator::default();

        assert_eq!(locator.close_controls(&snap), vec![close, loose]);
        assert_eq!(locator.modal_close_controls(&snap), vec![close]);
    }

    #[test]
    fn tour_banner_close_button_is_found_in_dialog() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let drawer = b.push(Some(body), DomNode::new("div").attr("class", "MuiDrawer-root"));
        let heading = b.push(
            Some(drawer),
            DomNode::new("h2").text("Welcome to the new Shutterstock Contributor experience"),
        );
        let close = b.push(Some(drawer), DomNode::new("button").attr("title", "Close"));
        let snap = b.build().unwrap();

        let banner = Locator::default().find_tour_banner(&snap).unwrap();
        assert_eq!(banner.text_node, heading);
        assert_eq!(banner.container, Some(drawer));
        assert_eq!(banner.close, Some(close));
    }

    #[test]
    fn tour_banner_with_bold_brand_name_is_found() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let dialog = b.push(Some(body), DomNode::new("div").attr("role", "dialog"));
        let copy = b.push(
            Some(dialog),
            DomNode::new("p")
                .text("Welcome to the new")
                .text_at(1, "Contributor experience"),
        );
        b.push(Some(copy), DomNode::new("b").text("Shutterstock"));
        let close = b.push(Some(dialog), DomNode::new("button").attr("aria-label", "Close"));
        let snap = b.build().unwrap();

        let banner = Locator::default().find_tour_banner(&snap).unwrap();
        assert_eq!(banner.text_node, copy);
        assert_eq!(banner.container, Some(dialog));
        assert_eq!(banner.close, Some(close));
    }

    #[test]
    fn checkbox_by_label_follows_for_attribute() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        b.push(Some(body), DomNode::new("label").attr("for", "np").text("No people in image"));
        let input = b.push(
            Some(body),
            DomNode::new("input").attr("id", "np").attr("type", "checkbox").checked(true),
        );
        let snap = b.build().unwrap();
        let found = Locator::default().checkbox_by_label(&snap, "no people").unwrap();
        assert_eq!(found, CheckboxRef { node: input, checked: true });
        assert!(Locator::default().checkbox_by_label(&snap, "AI generated").is_none());
    }

    #[test]
    fn option_search_skips_page_chrome_and_overlay() {
        let mut b = SnapshotBuilder::new();
        let body = b.push(None, DomNode::new("body"));
        let nav = b.push(Some(body), DomNode::new("nav"));
        b.push(Some(nav), DomNode::new("a").text("Nature"));
        let overlay = b.push(Some(body), DomNode::new("div").attr("id", "shutterstock-ai-overlay"));
        b.push(Some(overlay), DomNode::new("div").text("Setting Category 1: Nature"));
        b.push(Some(body), DomNode::new("span").text("Nature").hidden());
        let list = b.push(Some(body), DomNode::new("ul").attr("role", "listbox"));
        let option = b.push(Some(list), DomNode::new("li"));
        b.push(Some(option), DomNode::new("span").text("Nature"));
        let snap = b.build().unwrap();

        assert_eq!(Locator::default().find_option(&snap, "nature"), Some(option));
        assert_eq!(Locator::default().find_option(&snap, "Vintage"), None);
    }

    #[test]
    fn every_role_has_a_chain() {
        let locator = Locator::default();
        for role in Role::ALL {
            assert!(!locator.chain_names(role).is_empty(), "{role}");
        }
        assert_eq!(locator.chain_names(Role::MainImage)[0], "pinned_thumbnail");
    }
}
