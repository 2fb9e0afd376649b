//! The seam between page logic and the browser.

use action_locator::DomSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stockmeta_core_types::ElementHandle;

use crate::errors::ActionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    ArrowRight,
}

impl Key {
    /// `(key, code, keyCode)` as the page's listeners see them.
    pub fn dom_codes(self) -> (&'static str, &'static str, u32) {
        match self {
            Key::Enter => ("Enter", "Enter", 13),
            Key::Escape => ("Escape", "Escape", 27),
            Key::ArrowRight => ("ArrowRight", "ArrowRight", 39),
        }
    }
}

/// `Down` is a lone keydown; `Press` is keydown followed by keyup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStroke {
    Down(Key),
    Press(Key),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyTarget {
    Document,
    /// `document.body` then `document.documentElement`, same event object
    BodyAndRoot,
    Element(ElementHandle),
}

/// How a value is written into a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setter {
    /// Base prototype setter (`HTMLInputElement.prototype.value`), which
    /// bypasses instance overrides installed by the page framework.
    Prototype,
    /// Plain `el.value = ...`
    Property,
}

/// Everything the writers and drivers need from a page.
///
/// Handles are only valid for snapshots the page still retains; acting on an
/// evicted or detached one fails with a stale error instead of hitting
/// whatever element now sits at that index.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn snapshot(&self) -> Result<DomSnapshot, ActionError>;

    async fn focus(&self, el: ElementHandle) -> Result<(), ActionError>;

    /// Write `value` and dispatch bubbling `input` and `change` events. Never blurs.
    async fn assign_value(
        &self,
        el: ElementHandle,
        value: &str,
        setter: Setter,
    ) -> Result<(), ActionError>;

    async fn read_value(&self, el: ElementHandle) -> Result<Option<String>, ActionError>;

    /// `HTMLElement.click()`
    async fn click(&self, el: ElementHandle) -> Result<(), ActionError>;

    /// pointerdown, mousedown, pointerup, mouseup, click with the primary button held.
    async fn pointer_click(&self, el: ElementHandle) -> Result<(), ActionError>;

    async fn dispatch_key(&self, target: KeyTarget, stroke: KeyStroke) -> Result<(), ActionError>;

    /// Set a native `select` to `value` and dispatch `change`.
    async fn select_native_option(&self, el: ElementHandle, value: &str)
        -> Result<(), ActionError>;

    /// Center the element in the viewport.
    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), ActionError>;

    /// Scroll to the bottom of the page to trigger lazy loading.
    async fn scroll_page(&self) -> Result<(), ActionError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), ActionError>;
}
