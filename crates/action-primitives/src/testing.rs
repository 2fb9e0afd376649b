//! In-memory page for exercising writers and drivers without a browser.
//!
//! The fake keeps a mutable node list, records every side effect as a
//! [`PageEvent`], and runs registered reactions after each one so tests can
//! script how the page responds (menus opening, panels swapping images).

use action_locator::{DomNode, DomSnapshot, SnapshotBuilder};
use async_trait::async_trait;
use parking_lot::Mutex;
use stockmeta_core_types::{ElementHandle, NodeId};

use crate::driver::{KeyStroke, KeyTarget, PageDriver, Setter};
use crate::errors::ActionError;
use crate::scripts::RETAINED_GENERATIONS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    Focus(NodeId),
    Assign {
        node: NodeId,
        value: String,
        setter: Setter,
    },
    Click(NodeId),
    PointerClick(NodeId),
    Key {
        target: KeyTarget,
        stroke: KeyStroke,
    },
    SelectOption {
        node: NodeId,
        value: String,
    },
    ScrollIntoView(NodeId),
    ScrollPage,
    Clipboard(String),
}

/// Mutable page state handed to reactions.
#[derive(Debug, Default)]
pub struct FakeDom {
    pub nodes: Vec<DomNode>,
    pub context_lost: bool,
}

impl FakeDom {
    /// Append a node; callers keep document order.
    pub fn push(&mut self, parent: Option<NodeId>, mut node: DomNode) -> NodeId {
        node.parent = parent.map(|p| p.0);
        self.nodes.push(node);
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DomNode {
        &mut self.nodes[id.index()]
    }
}

type Reaction = Box<dyn FnMut(&PageEvent, &mut FakeDom) + Send>;

#[derive(Default)]
struct FakeState {
    dom: FakeDom,
    generation: u64,
    snapshots: usize,
    events: Vec<PageEvent>,
    reactions: Vec<Reaction>,
    clipboard_denied: bool,
}

pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    /// # Panics
    /// When the builder's nodes are not in document order.
    pub fn new(builder: SnapshotBuilder) -> Self {
        let nodes = builder
            .build()
            .expect("fixture nodes must be in document order")
            .into_nodes();
        Self {
            state: Mutex::new(FakeState {
                dom: FakeDom {
                    nodes,
                    context_lost: false,
                },
                ..FakeState::default()
            }),
        }
    }

    /// Run `reaction` after every recorded event.
    pub fn on_event<F>(&self, reaction: F)
    where
        F: FnMut(&PageEvent, &mut FakeDom) + Send + 'static,
    {
        self.state.lock().reactions.push(Box::new(reaction));
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshots
    }

    pub fn value_of(&self, node: NodeId) -> Option<String> {
        self.state.lock().dom.nodes.get(node.index())?.value.clone()
    }

    pub fn with_dom<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        f(&mut self.state.lock().dom)
    }

    pub fn lose_context(&self) {
        self.state.lock().dom.context_lost = true;
    }

    pub fn deny_clipboard(&self) {
        self.state.lock().clipboard_denied = true;
    }

    fn check_alive(state: &FakeState) -> Result<(), ActionError> {
        if state.dom.context_lost {
            return Err(ActionError::ContextLost("fake page detached".into()));
        }
        Ok(())
    }

    fn resolve(state: &FakeState, handle: ElementHandle) -> Result<NodeId, ActionError> {
        Self::check_alive(state)?;
        if handle.generation + RETAINED_GENERATIONS <= state.generation
            || handle.generation > state.generation
        {
            return Err(ActionError::StaleHandle {
                handle,
                current: state.generation,
            });
        }
        if handle.node.index() >= state.dom.nodes.len() {
            return Err(ActionError::ElementGone(handle));
        }
        Ok(handle.node)
    }

    /// Apply the event's default effect, record it, then run reactions.
    fn record(&self, event: PageEvent) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match &event {
            PageEvent::Assign { node, value, .. } | PageEvent::SelectOption { node, value } => {
                state.dom.node_mut(*node).value = Some(value.clone());
            }
            PageEvent::Click(node) | PageEvent::PointerClick(node) => {
                let target = state.dom.node_mut(*node);
                if target.is("input") && target.input_type() == "checkbox" {
                    target.checked = Some(!target.checked.unwrap_or(false));
                }
            }
            _ => {}
        }
        state.events.push(event.clone());
        for reaction in state.reactions.iter_mut() {
            reaction(&event, &mut state.dom);
        }
    }

    fn element_event(
        &self,
        handle: ElementHandle,
        make: impl FnOnce(NodeId) -> PageEvent,
    ) -> Result<(), ActionError> {
        let node = Self::resolve(&self.state.lock(), handle)?;
        self.record(make(node));
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn snapshot(&self) -> Result<DomSnapshot, ActionError> {
        let mut state = self.state.lock();
        Self::check_alive(&state)?;
        state.generation += 1;
        state.snapshots += 1;
        Ok(DomSnapshot::new(state.generation, state.dom.nodes.clone())?)
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.element_event(el, PageEvent::Focus)
    }

    async fn assign_value(
        &self,
        el: ElementHandle,
        value: &str,
        setter: Setter,
    ) -> Result<(), ActionError> {
        self.element_event(el, |node| PageEvent::Assign {
            node,
            value: value.to_string(),
            setter,
        })
    }

    async fn read_value(&self, el: ElementHandle) -> Result<Option<String>, ActionError> {
        let state = self.state.lock();
        let node = Self::resolve(&state, el)?;
        Ok(state.dom.nodes[node.index()].value.clone())
    }

    async fn click(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.element_event(el, PageEvent::Click)
    }

    async fn pointer_click(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.element_event(el, PageEvent::PointerClick)
    }

    async fn dispatch_key(&self, target: KeyTarget, stroke: KeyStroke) -> Result<(), ActionError> {
        {
            let state = self.state.lock();
            match target {
                KeyTarget::Element(handle) => {
                    Self::resolve(&state, handle)?;
                }
                _ => Self::check_alive(&state)?,
            }
        }
        self.record(PageEvent::Key { target, stroke });
        Ok(())
    }

    async fn select_native_option(
        &self,
        el: ElementHandle,
        value: &str,
    ) -> Result<(), ActionError> {
        self.element_event(el, |node| PageEvent::SelectOption {
            node,
            value: value.to_string(),
        })
    }

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.element_event(el, PageEvent::ScrollIntoView)
    }

    async fn scroll_page(&self) -> Result<(), ActionError> {
        Self::check_alive(&self.state.lock())?;
        self.record(PageEvent::ScrollPage);
        Ok(())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), ActionError> {
        {
            let state = self.state.lock();
            Self::check_alive(&state)?;
            if state.clipboard_denied {
                return Err(ActionError::Clipboard("Document is not focused.".into()));
            }
        }
        self.record(PageEvent::Clipboard(text.to_string()));
        Ok(())
    }
}
