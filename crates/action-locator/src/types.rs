//! Core types for element location

use serde::{Deserialize, Serialize};
use std::fmt;
use stockmeta_core_types::{ImageId, NodeId};

/// Something on the submission page the drivers need to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MainImage,
    TitleField,
    KeywordsField,
    Category1,
    Category2,
    ImageType,
    NextItem,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::MainImage,
        Role::TitleField,
        Role::KeywordsField,
        Role::Category1,
        Role::Category2,
        Role::ImageType,
        Role::NextItem,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::MainImage => "main_image",
            Role::TitleField => "title_field",
            Role::KeywordsField => "keywords_field",
            Role::Category1 => "category1",
            Role::Category2 => "category2",
            Role::ImageType => "image_type",
            Role::NextItem => "next_item",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    pub node: NodeId,
    /// Name of the strategy that produced the match
    pub strategy: &'static str,
    /// Image id of the navigation target, set by `NextItem` strategies.
    pub next_id: Option<ImageId>,
}

impl Located {
    pub fn new(node: NodeId, strategy: &'static str) -> Self {
        Self {
            node,
            strategy,
            next_id: None,
        }
    }

    pub fn with_next_id(mut self, next_id: Option<ImageId>) -> Self {
        self.next_id = next_id;
        self
    }
}

/// Thumbnail of the card the batch driver selected, identified by URL so it
/// survives re-snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedCard {
    pub image_id: ImageId,
    pub src: String,
}

/// Run-scoped hints consulted by some strategies.
#[derive(Clone, Debug, Default)]
pub struct LocateContext {
    pub pinned: Option<PinnedCard>,
}

impl LocateContext {
    pub fn pinned(card: PinnedCard) -> Self {
        Self { pinned: Some(card) }
    }
}

/// A card container enumerated by [`crate::Locator::cards`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardRef {
    /// Position among cards in document order
    pub index: usize,
    pub node: NodeId,
    /// First `img` inside the card, if any
    pub image: Option<NodeId>,
    pub image_id: ImageId,
    pub src: Option<String>,
}

impl CardRef {
    pub fn pin(&self) -> Option<PinnedCard> {
        self.src.as_ref().map(|src| PinnedCard {
            image_id: self.image_id.clone(),
            src: src.clone(),
        })
    }
}
