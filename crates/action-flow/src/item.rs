//! Single-item driver: locate the current image, ask the AI for metadata,
//! apply it.

use std::fmt;

use action_locator::{LocateContext, Role};
use action_primitives::Timing;
use ai_metadata::{effective_prompt, GenerateRequest, MetadataResult};
use serde::Serialize;
use stockmeta_core_types::ImageId;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::applier::{ApplyOptions, ApplyReport, MetadataApplier};
use crate::deps::FlowDeps;
use crate::errors::FlowError;
use crate::recovery::Recovery;
use crate::session::RunSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemState {
    Idle,
    Locating,
    DuplicateRecovery,
    Fetching,
    Applying,
    Done,
    Error,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Done {
        image_id: ImageId,
        /// `None` when the application timed out or the reply was unusable
        report: Option<ApplyReport>,
        timed_out: bool,
    },
    /// Navigation was forced; call again to see where the page landed
    Recovering { attempt: u32 },
    /// Recovery gave up on this item
    Stuck { image_id: ImageId },
    /// Processing flag cleared mid-item; nothing further was written
    Stopped,
    /// Another run holds the session
    Busy,
}

pub struct ItemDriver {
    deps: FlowDeps,
    applier: MetadataApplier,
    recovery: Recovery,
}

impl ItemDriver {
    pub fn new(deps: FlowDeps) -> Self {
        let applier = MetadataApplier::new(deps.page.clone(), deps.locator.clone(), deps.timing.clone());
        let recovery = Recovery::new(
            deps.page.clone(),
            deps.locator.clone(),
            deps.timing.clone(),
            deps.stuck_cap,
        );
        Self {
            deps,
            applier,
            recovery,
        }
    }

    pub fn deps(&self) -> &FlowDeps {
        &self.deps
    }

    /// Process whatever item the page shows, outside a batch.
    pub async fn run_single(&self, session: &RunSession) -> Result<ItemOutcome, FlowError> {
        if !session.try_begin_single() {
            error!("Already processing...");
            return Ok(ItemOutcome::Busy);
        }
        self.deps.status.busy("Starting analysis...");
        let result = self.process(session, false).await;
        session.finish_single();
        self.deps.status.idle();
        self.deps.status.run_finished();
        if let Err(err) = &result {
            error!("{}", err);
        }
        result
    }

    fn transition(&self, from: &mut ItemState, to: ItemState) {
        debug!(from = %from, to = %to, "item state");
        *from = to;
    }

    /// One pass over the current item. In batch mode a repeat of the last
    /// processed id triggers recovery instead of a second AI call.
    pub async fn process(&self, session: &RunSession, batch: bool) -> Result<ItemOutcome, FlowError> {
        let mut state = ItemState::Idle;
        let result = self.process_inner(session, batch, &mut state).await;
        let end = if result.is_ok() { ItemState::Done } else { ItemState::Error };
        self.transition(&mut state, end);
        result
    }

    async fn process_inner(
        &self,
        session: &RunSession,
        batch: bool,
        state: &mut ItemState,
    ) -> Result<ItemOutcome, FlowError> {
        info!("Starting analysis...");
        self.transition(state, ItemState::Locating);
        let snapshot = self.deps.page.snapshot().await?;
        let ctx: LocateContext = session.cursor().locate_context();
        let Some(found) = self.deps.locator.locate(&snapshot, Role::MainImage, &ctx) else {
            warn!("Total images on page: {}", snapshot.select(|n| n.is("img")).count());
            return Err(FlowError::NoImage);
        };
        let image_url = snapshot.node(found.node).src().unwrap_or_default().to_string();
        let image_id = ImageId::from_url_or_unknown(&image_url);
        info!(
            "Found image: {:.30}... (ID: {})",
            image_url, image_id
        );

        if batch {
            let repeat = session.cursor().last_processed.as_ref() == Some(&image_id);
            if repeat {
                self.transition(state, ItemState::DuplicateRecovery);
                return self.recovery.recover(session, &snapshot, &image_id).await;
            }
            session.cursor().advance(image_id.clone());
        }

        if !session.is_processing() {
            return Ok(ItemOutcome::Stopped);
        }
        if self
            .deps
            .locator
            .locate(&snapshot, Role::TitleField, &LocateContext::default())
            .is_none()
        {
            warn!("Title input not found yet.");
        }

        self.transition(state, ItemState::Fetching);
        info!("Reading settings...");
        let settings = self.deps.settings.load().await?;
        if !session.is_processing() {
            return Ok(ItemOutcome::Stopped);
        }
        let Some(api_key) = settings.api_key() else {
            return Err(FlowError::MissingApiKey);
        };
        let provider = settings.provider()?;
        let request = GenerateRequest {
            provider,
            api_key: api_key.to_string(),
            system_prompt: effective_prompt(settings.system_prompt.as_deref()),
            image_url,
            model: settings.model_for(provider),
        };

        info!("Sending to {}...", provider);
        let Some(reply) = session.unless_stopped(self.deps.ai.generate(&request)).await else {
            return Ok(ItemOutcome::Stopped);
        };
        if !session.is_processing() {
            return Ok(ItemOutcome::Stopped);
        }
        let meta: MetadataResult = reply?;
        info!("AI Response received!");

        self.transition(state, ItemState::Applying);
        if meta.is_empty() {
            warn!(
                "AI reply held no usable fields: {:.80}",
                meta.raw.as_deref().unwrap_or_default()
            );
            return Ok(ItemOutcome::Done {
                image_id,
                report: None,
                timed_out: false,
            });
        }

        let bound = Timing::ms(self.deps.timing.apply_timeout_ms);
        let options = ApplyOptions::from(&settings);
        let applied = timeout(bound, self.applier.apply(&meta, options, session)).await;
        let (report, timed_out) = match applied {
            Ok(Ok(report)) if report.stopped => return Ok(ItemOutcome::Stopped),
            Ok(Ok(report)) => (Some(report), false),
            Ok(Err(err)) if err.is_fatal() => return Err(err),
            Ok(Err(err)) => {
                warn!("Processing Warning: {}. Skipping to next step.", err);
                (None, false)
            }
            Err(_) => {
                warn!(
                    "Processing Warning: metadata application took longer than {:?}. Skipping to next step.",
                    bound
                );
                (None, true)
            }
        };
        info!("Analysis complete!");
        Ok(ItemOutcome::Done {
            image_id,
            report,
            timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::Field;
    use crate::fixtures::{deps, form_page, keyed_settings, ScriptedAi, PREVIEW_SRC};
    use crate::settings::StoredSettings;
    use action_primitives::testing::PageEvent;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn single_run_applies_metadata_and_releases_session() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::new());
        let driver = ItemDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = RunSession::new();

        let outcome = driver.run_single(&session).await.unwrap();
        let ItemOutcome::Done { image_id, report, timed_out } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(image_id.as_str(), "2000001");
        assert!(!timed_out);
        assert_eq!(report.unwrap().written.last(), Some(&Field::Title));
        assert_eq!(ai.images(), vec![PREVIEW_SRC.to_string()]);
        assert!(ai.prompts()[0].contains("\"category1\""));
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn busy_session_is_refused() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::new());
        let driver = ItemDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = RunSession::new();
        assert!(session.try_begin_single());

        assert_eq!(driver.run_single(&session).await.unwrap(), ItemOutcome::Busy);
        assert!(ai.images().is_empty());
    }

    #[tokio::test]
    async fn missing_key_stops_before_the_ai() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::new());
        let driver = ItemDriver::new(deps(&form, ai.clone(), StoredSettings::default()));
        let session = RunSession::new();

        let err = driver.run_single(&session).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingApiKey));
        assert!(ai.images().is_empty());
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn page_without_large_image_reports_no_image() {
        let form = form_page();
        form.page.with_dom(|dom| {
            let preview = dom.node_mut(form.preview);
            preview.attrs.clear();
            preview.rect.width = 80.0;
            preview.rect.height = 80.0;
        });
        let ai = Arc::new(ScriptedAi::new());
        let driver = ItemDriver::new(deps(&form, ai, keyed_settings()));
        let err = driver.run_single(&RunSession::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::NoImage));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_ai_call_writes_nothing() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::slow(Duration::from_secs(5)));
        let driver = ItemDriver::new(deps(&form, ai.clone(), keyed_settings()));
        let session = Arc::new(RunSession::new());

        let stopper = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            stopper.request_stop();
        });

        let outcome = driver.run_single(&session).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Stopped);
        assert_eq!(ai.images().len(), 1);
        assert!(form
            .page
            .events()
            .iter()
            .all(|e| !matches!(e, PageEvent::Assign { .. } | PageEvent::SelectOption { .. })));
    }

    #[tokio::test]
    async fn ai_failure_surfaces_as_item_error() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::failing());
        let driver = ItemDriver::new(deps(&form, ai, keyed_settings()));
        let err = driver.run_single(&RunSession::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::Ai(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_application_times_out_as_a_warning() {
        let form = form_page();
        let ai = Arc::new(ScriptedAi::new());
        let mut timing = Timing::default();
        timing.apply_timeout_ms = 2000;
        let driver = ItemDriver::new(deps(&form, ai, keyed_settings()).with_timing(timing));

        let outcome = driver.run_single(&RunSession::new()).await.unwrap();
        assert!(matches!(
            outcome,
            ItemOutcome::Done {
                timed_out: true,
                report: None,
                ..
            }
        ));
    }
}
