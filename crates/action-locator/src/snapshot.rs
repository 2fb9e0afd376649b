//! Flat, document-ordered view of the page DOM.
//!
//! Nodes are listed in pre-order, so the subtree of a node is the contiguous
//! index range right after it. That makes "is inside", "comes before" and
//! "next sibling" O(1) lookups instead of tree walks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stockmeta_core_types::{ElementHandle, NodeId};

use crate::errors::LocatorError;

/// Bounding client rect in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

/// A direct text-node run, placed before the element child at `slot`
/// (`slot == children.len()` means after the last child).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub slot: usize,
    pub text: String,
}

/// One element of the snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    #[serde(default)]
    pub parent: Option<u32>,
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Text of the direct text-node children, whitespace-collapsed.
    #[serde(default)]
    pub text: String,
    /// The same text split by position among the element children. Empty
    /// means all of `text` comes before the first child.
    #[serde(default)]
    pub runs: Vec<TextRun>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

impl DomNode {
    /// A visible element with no attributes; builder methods fill in the rest.
    pub fn new(tag: &str) -> Self {
        Self {
            parent: None,
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            runs: Vec::new(),
            rect: Rect::default(),
            visible: true,
            value: None,
            checked: None,
            options: Vec::new(),
        }
    }

    pub fn img(src: &str, width: f64, height: f64) -> Self {
        Self::new("img").attr("src", src).size(width, height)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    /// Own text ahead of any child element.
    pub fn text(self, text: &str) -> Self {
        self.text_at(0, text)
    }

    /// Own text placed before the child element at `slot`.
    pub fn text_at(mut self, slot: usize, text: &str) -> Self {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !self.text.is_empty() && !text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&text);
        self.runs.push(TextRun { slot, text });
        self
    }

    /// Runs before child `slot`; `last` also takes runs whose child was
    /// cut off by the collector's node limit.
    fn runs_at(&self, slot: usize, last: bool) -> impl Iterator<Item = &str> {
        let leading_only = self.runs.is_empty() && slot == 0;
        let fallback = leading_only.then_some(self.text.as_str());
        self.runs
            .iter()
            .filter(move |run| run.slot == slot || (last && run.slot > slot))
            .map(|run| run.text.as_str())
            .chain(fallback)
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.rect.width = width;
        self.rect.height = height;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn option(mut self, text: &str, value: &str) -> Self {
        self.options.push(SelectOption {
            text: text.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Attribute value or the empty string, lower-cased.
    pub fn attr_lower(&self, name: &str) -> String {
        self.get_attr(name).unwrap_or_default().to_lowercase()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    pub fn is_any(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.tag == *t)
    }

    /// CSS `[class*=fragment]`: substring of the whole class attribute.
    pub fn class_contains(&self, fragment: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.contains(fragment))
            .unwrap_or(false)
    }

    /// CSS `.name`: whole class token.
    pub fn has_class(&self, name: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.split_whitespace().any(|token| token == name))
            .unwrap_or(false)
    }

    pub fn role(&self) -> Option<&str> {
        self.get_attr("role")
    }

    pub fn src(&self) -> Option<&str> {
        self.get_attr("src").filter(|s| !s.is_empty())
    }

    pub fn input_type(&self) -> String {
        self.attr_lower("type")
    }

    /// `name + id + placeholder + aria-label`, lower-cased, the fingerprint the
    /// form-field heuristics search in.
    pub fn field_fingerprint(&self) -> String {
        ["name", "id", "placeholder", "aria-label"]
            .iter()
            .map(|a| self.get_attr(a).unwrap_or_default())
            .collect::<String>()
            .to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    generation: u64,
    #[serde(default)]
    nodes: Vec<DomNode>,
}

/// Immutable DOM snapshot tagged with the generation it was taken at.
#[derive(Clone, Debug)]
pub struct DomSnapshot {
    generation: u64,
    nodes: Vec<DomNode>,
    subtree_end: Vec<u32>,
}

impl DomSnapshot {
    pub fn new(generation: u64, nodes: Vec<DomNode>) -> Result<Self, LocatorError> {
        for (index, node) in nodes.iter().enumerate() {
            let Some(parent) = node.parent else {
                continue;
            };
            let index = index as u32;
            if parent >= index {
                return Err(LocatorError::OutOfOrder {
                    node: index,
                    reason: format!("parent {parent} does not precede it"),
                });
            }
            // In pre-order the parent must be the previous node or one of its ancestors.
            let mut cursor = Some(index - 1);
            while let Some(candidate) = cursor {
                if candidate == parent {
                    break;
                }
                cursor = nodes[candidate as usize].parent;
            }
            if cursor.is_none() {
                return Err(LocatorError::OutOfOrder {
                    node: index,
                    reason: format!("parent {parent} subtree was already closed"),
                });
            }
        }

        let mut subtree_end: Vec<u32> = (1..=nodes.len() as u32).collect();
        for index in (0..nodes.len()).rev() {
            if let Some(parent) = nodes[index].parent {
                let end = subtree_end[index];
                let slot = &mut subtree_end[parent as usize];
                *slot = (*slot).max(end);
            }
        }

        Ok(Self {
            generation,
            nodes,
            subtree_end,
        })
    }

    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            nodes: Vec::new(),
            subtree_end: Vec::new(),
        }
    }

    /// Decode the JSON produced by the page-side collector.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LocatorError> {
        let raw: RawSnapshot = serde_json::from_value(value)
            .map_err(|err| LocatorError::MalformedSnapshot(err.to_string()))?;
        Self::new(raw.generation, raw.nodes)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[DomNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<DomNode> {
        self.nodes
    }

    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.index())
    }

    pub fn handle(&self, id: NodeId) -> ElementHandle {
        ElementHandle::new(self.generation, id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DomNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    /// Nodes satisfying `pred`, in document order.
    pub fn select<'a, F>(&'a self, pred: F) -> impl Iterator<Item = NodeId> + 'a
    where
        F: Fn(&DomNode) -> bool + 'a,
    {
        self.iter().filter(move |(_, n)| pred(n)).map(|(id, _)| id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent.map(NodeId)
    }

    /// Ancestors from the parent upwards, not including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Like `Element.closest`: `id` itself or its nearest matching ancestor.
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| pred(self.node(*candidate)))
    }

    /// Strict descendants of `id` in document order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        let end = self.subtree_end[id.index()];
        (id.0 + 1..end).map(NodeId)
    }

    /// Like `Element.querySelector`: first strict descendant matching `pred`.
    pub fn first_descendant<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.descendants(id).find(|d| pred(self.node(*d)))
    }

    pub fn is_descendant(&self, id: NodeId, of: NodeId) -> bool {
        id.0 > of.0 && id.0 < self.subtree_end[of.index()]
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|d| self.node(*d).parent == Some(id.0))
            .collect()
    }

    /// Like `nextElementSibling`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let candidate = self.subtree_end[id.index()] as usize;
        let parent = self.node(id).parent?;
        (candidate < self.nodes.len() && self.nodes[candidate].parent == Some(parent))
            .then_some(NodeId(candidate as u32))
    }

    /// Rendered text of the subtree in document order, whitespace-collapsed.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_text<'a>(&'a self, id: NodeId, out: &mut Vec<&'a str>) {
        let node = self.node(id);
        let children = self.children(id);
        for slot in 0..=children.len() {
            out.extend(node.runs_at(slot, slot == children.len()));
            if let Some(child) = children.get(slot) {
                self.collect_text(*child, out);
            }
        }
    }
}

/// Assembles snapshots in document order; mainly for tests and fixtures.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    generation: u64,
    nodes: Vec<DomNode>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Append `node` under `parent`. Nodes must be pushed in document order.
    pub fn push(&mut self, parent: Option<NodeId>, mut node: DomNode) -> NodeId {
        node.parent = parent.map(|p| p.0);
        self.nodes.push(node);
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn build(self) -> Result<DomSnapshot, LocatorError> {
        DomSnapshot::new(self.generation, self.nodes)
    }
}
