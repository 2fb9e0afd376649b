//! Field writer: puts values into the page's form controls so the page's own
//! framework notices, and checks that they stuck.

use std::sync::Arc;

use action_locator::{CheckboxRef, DomNode, DomSnapshot, Locator};
use stockmeta_core_types::{ElementHandle, NodeId};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::driver::{Key, KeyStroke, KeyTarget, PageDriver, Setter};
use crate::errors::ActionError;
use crate::timing::Timing;

/// Result of a dropdown write. Only `Applied` means the page changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Native select without a matching option; nothing was touched
    NoMatch,
    /// Custom dropdown opened but the option never showed up
    OptionNotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Value was present on first read
    Held,
    /// Value had been lost and was written once more
    Retried { held: bool },
}

impl Verification {
    pub fn held(self) -> bool {
        matches!(self, Verification::Held | Verification::Retried { held: true })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropdownShape {
    NativeSelect,
    Combobox,
    Custom,
}

impl DropdownShape {
    pub fn of(node: &DomNode) -> Self {
        if node.is("select") {
            DropdownShape::NativeSelect
        } else if node.is("input") || node.role() == Some("combobox") {
            DropdownShape::Combobox
        } else {
            DropdownShape::Custom
        }
    }
}

pub struct FieldWriter {
    page: Arc<dyn PageDriver>,
    locator: Arc<Locator>,
    timing: Timing,
}

impl FieldWriter {
    pub fn new(page: Arc<dyn PageDriver>, locator: Arc<Locator>, timing: Timing) -> Self {
        Self {
            page,
            locator,
            timing,
        }
    }

    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    pub fn locator(&self) -> &Arc<Locator> {
        &self.locator
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    async fn settle(&self, ms: u64) {
        if ms > 0 {
            sleep(Timing::ms(ms)).await;
        }
    }

    /// Focus, write through the base prototype setter, fire `input` and
    /// `change`. The field keeps focus: blurring opens the site's help panel.
    pub async fn write_text(&self, el: ElementHandle, value: &str) -> Result<(), ActionError> {
        self.page.focus(el).await?;
        self.page.assign_value(el, value, Setter::Prototype).await
    }

    /// Re-read `el`; when `value` is gone, click and write it once more.
    pub async fn verify_text(
        &self,
        el: ElementHandle,
        value: &str,
    ) -> Result<Verification, ActionError> {
        if self.page.read_value(el).await?.as_deref() == Some(value) {
            return Ok(Verification::Held);
        }
        warn!("Value did not stick on {}; retrying with click", el);
        self.page.click(el).await?;
        self.settle(self.timing.title_click_settle_ms).await;
        self.write_text(el, value).await?;
        self.settle(self.timing.title_retry_settle_ms).await;
        let held = self.page.read_value(el).await?.as_deref() == Some(value);
        if !held {
            warn!("Value still missing on {} after retry", el);
        }
        Ok(Verification::Retried { held })
    }

    pub async fn write_text_verified(
        &self,
        el: ElementHandle,
        value: &str,
    ) -> Result<Verification, ActionError> {
        self.write_text(el, value).await?;
        self.verify_text(el, value).await
    }

    /// Pick `target` in the dropdown at `node`, using the interaction its
    /// element shape calls for.
    pub async fn choose_option(
        &self,
        snapshot: &DomSnapshot,
        node: NodeId,
        target: &str,
    ) -> Result<Outcome, ActionError> {
        let el = snapshot.handle(node);
        let control = snapshot.node(node);
        match DropdownShape::of(control) {
            DropdownShape::NativeSelect => {
                let wanted = target.to_lowercase();
                let Some(option) = control.options.iter().find(|o| {
                    o.text.to_lowercase().contains(&wanted)
                        || o.value.to_lowercase().contains(&wanted)
                }) else {
                    info!("No option matching {:?} in select {}", target, el);
                    return Ok(Outcome::NoMatch);
                };
                self.page.select_native_option(el, &option.value).await?;
                Ok(Outcome::Applied)
            }
            DropdownShape::Combobox => {
                debug!("Typing {:?} into dropdown {}", target, el);
                self.page.focus(el).await?;
                self.page.assign_value(el, target, Setter::Property).await?;
                self.page
                    .dispatch_key(KeyTarget::Element(el), KeyStroke::Down(Key::Enter))
                    .await?;
                Ok(Outcome::Applied)
            }
            DropdownShape::Custom => self.choose_from_custom(el, target).await,
        }
    }

    async fn choose_from_custom(
        &self,
        control: ElementHandle,
        target: &str,
    ) -> Result<Outcome, ActionError> {
        debug!("Opening dropdown {} for {:?}", control, target);
        self.page.pointer_click(control).await?;

        for _ in 0..self.timing.option_poll_attempts {
            self.settle(self.timing.option_poll_interval_ms).await;
            let snapshot = self.page.snapshot().await?;
            let Some(option) = self.locator.find_option(&snapshot, target) else {
                continue;
            };
            let option = snapshot.handle(option);
            debug!("Found option {:?} at {}", target, option);
            self.page.scroll_into_view(option).await?;
            self.settle(self.timing.option_scroll_settle_ms).await;
            self.page.pointer_click(option).await?;
            self.page
                .dispatch_key(KeyTarget::Element(option), KeyStroke::Down(Key::Enter))
                .await?;
            self.settle(self.timing.option_click_settle_ms).await;
            return Ok(Outcome::Applied);
        }

        warn!(
            "Could not find option {:?} in the list. Please select manually.",
            target
        );
        Ok(Outcome::OptionNotFound)
    }

    /// Click the checkbox only when its state differs from `checked`.
    /// Returns whether it was toggled.
    pub async fn ensure_checked(
        &self,
        snapshot: &DomSnapshot,
        checkbox: CheckboxRef,
        checked: bool,
    ) -> Result<bool, ActionError> {
        if checkbox.checked == checked {
            return Ok(false);
        }
        self.page.click(snapshot.handle(checkbox.node)).await?;
        Ok(true)
    }
}
