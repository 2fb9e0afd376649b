//! Duplicate-item recovery: the page kept showing the item that was just
//! processed, so navigation failed and has to be forced.

use std::sync::Arc;

use action_locator::{DomSnapshot, Locator, Role};
use action_primitives::{ActionError, Key, KeyStroke, KeyTarget, PageDriver, Timing};
use stockmeta_core_types::ImageId;
use tracing::{error, info, warn};

use crate::errors::FlowError;
use crate::item::ItemOutcome;
use crate::session::RunSession;

/// Attempts before switching from thumbnail clicks to the pointer sequence.
const CLICK_ATTEMPTS: u32 = 2;
/// Thumbnails narrower than this are not trusted as the next item.
const MIN_TRUSTED_THUMB_PX: f64 = 40.0;

fn tolerate(result: Result<(), ActionError>) -> Result<(), FlowError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            warn!(%err, "Recovery click failed");
            Ok(())
        }
    }
}

pub struct Recovery {
    page: Arc<dyn PageDriver>,
    locator: Arc<Locator>,
    timing: Timing,
    stuck_cap: u32,
}

impl Recovery {
    pub fn new(page: Arc<dyn PageDriver>, locator: Arc<Locator>, timing: Timing, stuck_cap: u32) -> Self {
        Self {
            page,
            locator,
            timing,
            stuck_cap,
        }
    }

    /// The item after `current`: the NextItem chain, else the image after it
    /// in document order when wide enough.
    fn derive_target(&self, snapshot: &DomSnapshot, session: &RunSession, current: &ImageId) -> Option<ImageId> {
        let ctx = session.cursor().locate_context();
        if let Some(next) = self
            .locator
            .locate(snapshot, Role::NextItem, &ctx)
            .and_then(|found| found.next_id)
            .filter(|id| id != current)
        {
            return Some(next);
        }
        let next = self.locator.image_following(snapshot, current)?;
        let node = snapshot.node(next);
        if node.rect.width <= MIN_TRUSTED_THUMB_PX {
            return None;
        }
        node.src().and_then(ImageId::lenient)
    }

    async fn arrow_right(&self) -> Result<(), FlowError> {
        tolerate(
            self.page
                .dispatch_key(KeyTarget::BodyAndRoot, KeyStroke::Down(Key::ArrowRight))
                .await,
        )
    }

    pub async fn recover(
        &self,
        session: &RunSession,
        snapshot: &DomSnapshot,
        current: &ImageId,
    ) -> Result<ItemOutcome, FlowError> {
        let attempts = session.cursor().stuck_attempts;
        if attempts >= self.stuck_cap {
            warn!(
                "Still stuck on image {} after {} attempts. Manual intervention needed.",
                current, attempts
            );
            return Ok(ItemOutcome::Stuck {
                image_id: current.clone(),
            });
        }

        let known = session.cursor().target_next.clone();
        let target = match known {
            Some(target) => Some(target),
            None => {
                let derived = self.derive_target(snapshot, session, current);
                session.cursor().target_next = derived.clone();
                derived
            }
        };
        session.cursor().stuck_attempts = attempts + 1;

        let wait = if attempts < CLICK_ATTEMPTS {
            warn!(
                "Navigation failed! Stuck on image {}. Retrying hard click (Attempt {})...",
                current,
                attempts + 1
            );
            let thumb = match &target {
                Some(id) => self.locator.image_with_id(snapshot, id),
                None => self.locator.image_following(snapshot, current),
            };
            match thumb {
                Some(thumb) => {
                    info!("Found fallback thumbnail to click...");
                    let wrapper = self.locator.thumbnail_wrapper(snapshot, thumb);
                    tolerate(self.page.click(snapshot.handle(wrapper)).await)?;
                }
                None => warn!("Fallback: Dispatching 'ArrowRight' keyboard event..."),
            }
            self.timing.recovery_short_wait_ms
        } else {
            warn!(
                "Still stuck on {} after retries. Trying pointer sequence on the asset card...",
                current
            );
            let card = target
                .as_ref()
                .and_then(|id| self.locator.card_for_id(snapshot, id));
            match card {
                Some(card) => {
                    info!(
                        "Found target card for ID {}. Simulating full pointer sequence...",
                        target.as_ref().map(ImageId::as_str).unwrap_or(ImageId::UNKNOWN)
                    );
                    tolerate(self.page.pointer_click(snapshot.handle(card)).await)?;
                    let image = snapshot.first_descendant(card, |n| n.is("img"));
                    if let Some(image) = image {
                        tolerate(self.page.pointer_click(snapshot.handle(image)).await)?;
                    }
                }
                None => error!("Could not find target asset card to click."),
            }
            self.timing.recovery_long_wait_ms
        };

        self.arrow_right().await?;
        if !session.pause(Timing::ms(wait)).await {
            return Ok(ItemOutcome::Stopped);
        }
        Ok(ItemOutcome::Recovering {
            attempt: attempts + 1,
        })
    }
}
