//! Batch driver: walk every card in the portfolio grid once.

use std::time::Instant;

use action_locator::CardRef;
use action_primitives::menus::dismiss_modals;
use action_primitives::{ActionError, Timing};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::deps::FlowDeps;
use crate::errors::FlowError;
use crate::item::{ItemDriver, ItemOutcome};
use crate::session::RunSession;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Cards found when the batch started
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    /// Cards without an image or that vanished before their turn
    pub skipped: usize,
    pub stuck: usize,
    pub stopped: bool,
    pub elapsed_ms: u64,
}

fn soft(result: Result<(), ActionError>, step: &str) -> Result<(), FlowError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            warn!(%err, "{} failed", step);
            Ok(())
        }
    }
}

pub struct BatchDriver {
    item: ItemDriver,
}

impl BatchDriver {
    pub fn new(deps: FlowDeps) -> Self {
        Self {
            item: ItemDriver::new(deps),
        }
    }

    fn deps(&self) -> &FlowDeps {
        self.item.deps()
    }

    /// Process every card on the page. Refused with [`FlowError::Busy`] when
    /// the session is already claimed.
    pub async fn run(&self, session: &RunSession) -> Result<BatchSummary, FlowError> {
        if !session.try_begin_batch() {
            error!("Already processing...");
            return Err(FlowError::Busy);
        }
        info!(run = %session.run_id(), "Batch started");
        let started = Instant::now();
        self.deps().status.busy("Starting batch...");

        let mut summary = BatchSummary::default();
        let result = self.run_cards(session, &mut summary).await;
        summary.stopped = summary.stopped || !session.is_processing();
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        session.finish_batch();
        self.deps().status.idle();
        self.deps().status.run_finished();

        match &result {
            Ok(()) if summary.stopped => warn!(
                "Batch stopped after {}/{} cards",
                summary.processed, summary.total
            ),
            Ok(()) => info!(
                processed = summary.processed,
                failed = summary.failed,
                skipped = summary.skipped,
                stuck = summary.stuck,
                "Batch complete"
            ),
            Err(err) => error!("Batch aborted: {}", err),
        }
        result.map(|()| summary)
    }

    async fn enumerate(&self, session: &RunSession) -> Result<Vec<CardRef>, FlowError> {
        let deps = self.deps();
        let snapshot = deps.page.snapshot().await?;
        let cards = deps.locator.cards(&snapshot);
        if !cards.is_empty() {
            return Ok(cards);
        }
        warn!("No cards found; scrolling to trigger lazy loading");
        soft(deps.page.scroll_page().await, "Scroll")?;
        if !session.pause(Timing::ms(deps.timing.lazy_load_wait_ms)).await {
            return Ok(Vec::new());
        }
        let snapshot = deps.page.snapshot().await?;
        Ok(deps.locator.cards(&snapshot))
    }

    async fn run_cards(&self, session: &RunSession, summary: &mut BatchSummary) -> Result<(), FlowError> {
        let deps = self.deps();
        if let Err(err) = dismiss_modals(deps.page.as_ref(), &deps.locator, &deps.timing).await {
            if err.is_fatal() {
                return Err(err.into());
            }
            warn!(%err, "Closing modals failed");
        }

        let cards = self.enumerate(session).await?;
        summary.total = cards.len();
        info!("Found {} cards to process", cards.len());

        for card in &cards {
            if !session.is_processing() {
                summary.stopped = true;
                break;
            }
            let Some(src) = card.src.as_deref() else {
                warn!("Card {} has no image; skipping", card.index + 1);
                summary.skipped += 1;
                continue;
            };
            deps.status.item(card.index + 1, cards.len(), &card.image_id);

            let snapshot = deps.page.snapshot().await?;
            let Some(fresh) = deps.locator.refind_card(&snapshot, Some(src), card.index) else {
                warn!("Card {} disappeared from the grid; skipping", card.index + 1);
                summary.skipped += 1;
                continue;
            };
            let handle = snapshot.handle(fresh.node);
            soft(deps.page.scroll_into_view(handle).await, "Scroll to card")?;
            if !session.pause(Timing::ms(deps.timing.card_scroll_settle_ms)).await {
                summary.stopped = true;
                break;
            }
            soft(deps.page.click(handle).await, "Card click")?;
            if !session.pause(Timing::ms(deps.timing.panel_load_ms)).await {
                summary.stopped = true;
                break;
            }
            session.cursor().pinned_card = fresh.pin();

            match self.process_card(session).await {
                Ok(ItemOutcome::Done { .. }) => summary.processed += 1,
                Ok(ItemOutcome::Stuck { .. }) => summary.stuck += 1,
                Ok(ItemOutcome::Stopped) => {
                    summary.stopped = true;
                    break;
                }
                Ok(other) => {
                    warn!(?other, "Unexpected item outcome");
                    summary.failed += 1;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!("Card {} failed: {}", card.index + 1, err);
                    summary.failed += 1;
                }
            }

            if !session.pause(Timing::ms(deps.timing.between_items_ms)).await {
                summary.stopped = true;
                break;
            }
        }
        Ok(())
    }

    /// Run the item driver until it stops asking for another look.
    async fn process_card(&self, session: &RunSession) -> Result<ItemOutcome, FlowError> {
        loop {
            match self.item.process(session, true).await? {
                ItemOutcome::Recovering { attempt } => {
                    info!("Re-checking page after recovery attempt {}", attempt);
                }
                outcome => return Ok(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{card_src, deps, keyed_settings, page_with_cards, ScriptedAi};
    use action_primitives::testing::PageEvent;
    use action_primitives::KeyTarget;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn every_card_is_processed_once_in_order() {
        let form = page_with_cards(3);
        let ai = Arc::new(ScriptedAi::new());
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = RunSession::new();

        let summary = driver.run(&session).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 3);
        assert!(!summary.stopped);
        assert_eq!(ai.images(), (0..3).map(card_src).collect::<Vec<_>>());

        let clicked: Vec<_> = form
            .page
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PageEvent::Click(node) if form.cards.contains(&node) => Some(node),
                _ => None,
            })
            .collect();
        assert_eq!(clicked, form.cards);
        assert!(!session.is_processing());
        assert!(!session.is_batch());
    }

    #[tokio::test]
    async fn second_batch_is_refused_while_one_runs() {
        let form = page_with_cards(1);
        let ai = Arc::new(ScriptedAi::new());
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = RunSession::new();
        assert!(session.try_begin_batch());

        assert!(matches!(driver.run(&session).await, Err(FlowError::Busy)));
        assert!(ai.images().is_empty());
    }

    #[tokio::test]
    async fn empty_grid_scrolls_then_finishes() {
        let form = page_with_cards(0);
        let ai = Arc::new(ScriptedAi::new());
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()));

        let summary = driver.run(&RunSession::new()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.processed, 0);
        assert!(form.page.events().contains(&PageEvent::ScrollPage));
        assert!(ai.images().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_the_batch() {
        let form = page_with_cards(3);
        let ai = Arc::new(ScriptedAi::slow(Duration::from_secs(5)));
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = Arc::new(RunSession::new());

        let stopper = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            stopper.request_stop();
        });

        let summary = driver.run(&session).await.unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.processed, 0);
        assert_eq!(ai.images().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cuts_the_lazy_load_wait_short() {
        let form = page_with_cards(0);
        let ai = Arc::new(ScriptedAi::new());
        let timing = Timing {
            lazy_load_wait_ms: 60_000,
            ..Timing::instant()
        };
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()).with_timing(timing));
        let session = Arc::new(RunSession::new());

        let stopper = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.request_stop();
        });

        let started = tokio::time::Instant::now();
        let summary = driver.run(&session).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(summary.stopped);
        assert_eq!(summary.total, 0);
        assert!(form.page.events().contains(&PageEvent::ScrollPage));
    }

    #[tokio::test]
    async fn lost_page_aborts_the_batch() {
        let form = page_with_cards(2);
        let first = form.cards[0];
        form.page.on_event(move |event, dom| {
            if *event == PageEvent::Click(first) {
                dom.context_lost = true;
            }
        });
        let ai = Arc::new(ScriptedAi::new());
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = RunSession::new();

        let err = driver.run(&session).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(ai.images().is_empty());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn repeated_item_is_recovered_without_a_second_ai_call() {
        let form = page_with_cards(2);
        // Second card shows the same asset as the first, so the panel never moves on.
        let (a, b) = (form.card_images[0], form.card_images[1]);
        form.page.with_dom(|dom| {
            let src = dom.node_mut(a).attrs["src"].clone();
            dom.node_mut(b).attrs.insert("src".into(), src);
        });
        let ai = Arc::new(ScriptedAi::new());
        let driver = BatchDriver::new(deps(&form, ai.clone(), keyed_settings()).with_stuck_cap(3));

        let summary = driver.run(&RunSession::new()).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.stuck, 1);
        assert_eq!(ai.images(), vec![card_src(0)]);

        let arrows = form
            .page
            .events()
            .iter()
            .filter(|e| matches!(e, PageEvent::Key { target: KeyTarget::BodyAndRoot, .. }))
            .count();
        assert_eq!(arrows, 3);
    }
}
