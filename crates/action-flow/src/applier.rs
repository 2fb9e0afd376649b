//! Writes a metadata result into the submission form.
//!
//! Order matters: the form clears the description whenever a category or the
//! image type changes, so dropdowns go first and the title goes last.

use std::fmt;
use std::sync::Arc;

use action_locator::{LocateContext, Locator, Role};
use action_primitives::menus::{close_active_menus, dismiss_popups, dismiss_tour_banner};
use action_primitives::{
    ActionError, BannerOutcome, FieldWriter, Key, KeyStroke, KeyTarget, Outcome, PageDriver, Timing,
};
use ai_metadata::MetadataResult;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::FlowError;
use crate::session::RunSession;
use crate::settings::StoredSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category1,
    Category2,
    ImageType,
    AiGenerated,
    NoPeople,
    Keywords,
    Title,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Category1 => "category 1",
            Field::Category2 => "category 2",
            Field::ImageType => "image type",
            Field::AiGenerated => "AI generated",
            Field::NoPeople => "no people",
            Field::Keywords => "keywords",
            Field::Title => "title",
        };
        f.write_str(name)
    }
}

/// What one application did, in the order it happened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub written: Vec<Field>,
    /// Fields with a value whose control or option was not found
    pub missing: Vec<Field>,
    /// Whether the title was still in place after the tour check
    pub title_held: Option<bool>,
    pub tour_banner_dismissed: bool,
    /// A stop arrived before every field was written
    pub stopped: bool,
}

/// Optional checkboxes ticked during application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub auto_ai_check: bool,
    pub auto_no_people: bool,
}

impl From<&StoredSettings> for ApplyOptions {
    fn from(settings: &StoredSettings) -> Self {
        Self {
            auto_ai_check: settings.auto_ai_check,
            auto_no_people: settings.auto_no_people,
        }
    }
}

/// Log and swallow a failed step unless the page is gone.
fn soft(err: ActionError, step: Field) -> Result<(), FlowError> {
    if err.is_fatal() {
        return Err(err.into());
    }
    warn!(%err, "Writing {} failed", step);
    Ok(())
}

pub struct MetadataApplier {
    writer: FieldWriter,
}

impl MetadataApplier {
    pub fn new(page: Arc<dyn PageDriver>, locator: Arc<Locator>, timing: Timing) -> Self {
        Self {
            writer: FieldWriter::new(page, locator, timing),
        }
    }

    fn page(&self) -> &dyn PageDriver {
        self.writer.page().as_ref()
    }

    fn locator(&self) -> &Locator {
        self.writer.locator()
    }

    fn timing(&self) -> &Timing {
        self.writer.timing()
    }

    async fn settle(&self, ms: u64) {
        if ms > 0 {
            sleep(Timing::ms(ms)).await;
        }
    }

    /// Writes every present field, checking for a stop before each one.
    pub async fn apply(
        &self,
        meta: &MetadataResult,
        options: ApplyOptions,
        session: &RunSession,
    ) -> Result<ApplyReport, FlowError> {
        let mut report = ApplyReport::default();
        let halted = |report: &mut ApplyReport| {
            if session.is_processing() {
                return false;
            }
            info!("Stop requested; leaving the remaining fields untouched");
            report.stopped = true;
            true
        };

        if halted(&mut report) {
            return Ok(report);
        }
        if let Some(category) = meta.category1.as_deref() {
            self.dropdown(&mut report, Field::Category1, Role::Category1, category)
                .await?;
        }
        if halted(&mut report) {
            return Ok(report);
        }
        if let Some(category) = meta.category2.as_deref() {
            self.dropdown(&mut report, Field::Category2, Role::Category2, category)
                .await?;
        }
        if halted(&mut report) {
            return Ok(report);
        }
        if let Some(kind) = meta.image_type {
            self.dropdown(&mut report, Field::ImageType, Role::ImageType, kind.label())
                .await?;
        }

        if halted(&mut report) {
            return Ok(report);
        }
        if options.auto_ai_check {
            let label = self.locator().profile().ai_generated_label.clone();
            self.checkbox(&mut report, Field::AiGenerated, &label).await?;
        }
        if halted(&mut report) {
            return Ok(report);
        }
        if options.auto_no_people {
            let label = self.locator().profile().no_people_label.clone();
            self.checkbox(&mut report, Field::NoPeople, &label).await?;
        }

        if halted(&mut report) {
            return Ok(report);
        }
        if !meta.keywords.is_empty() {
            self.keywords(&mut report, &meta.keywords.join(", ")).await?;
        }

        if halted(&mut report) {
            return Ok(report);
        }
        self.title(&mut report, meta.title.as_deref()).await?;

        info!("Waiting for autosave ({}ms)...", self.timing().autosave_ms);
        self.settle(self.timing().autosave_ms).await;
        Ok(report)
    }

    async fn dropdown(
        &self,
        report: &mut ApplyReport,
        field: Field,
        role: Role,
        value: &str,
    ) -> Result<(), FlowError> {
        let snapshot = self.page().snapshot().await?;
        let Some(found) = self
            .locator()
            .locate(&snapshot, role, &LocateContext::default())
        else {
            info!("{} input not found", field);
            report.missing.push(field);
            return Ok(());
        };

        info!("Setting {}: {}", field, value);
        match self.writer.choose_option(&snapshot, found.node, value).await {
            Ok(Outcome::Applied) => report.written.push(field),
            Ok(outcome) => {
                debug!(?outcome, "{} left unchanged", field);
                report.missing.push(field);
            }
            Err(err) => soft(err, field)?,
        }

        self.settle(self.timing().dropdown_settle_ms).await;
        if let Err(err) = close_active_menus(self.page(), self.locator(), self.timing(), None).await {
            soft(err, field)?;
        }
        Ok(())
    }

    async fn checkbox(
        &self,
        report: &mut ApplyReport,
        field: Field,
        label: &str,
    ) -> Result<(), FlowError> {
        let snapshot = self.page().snapshot().await?;
        let Some(checkbox) = self.locator().checkbox_by_label(&snapshot, label) else {
            info!("'{}' checkbox not found", label);
            report.missing.push(field);
            return Ok(());
        };
        match self.writer.ensure_checked(&snapshot, checkbox, true).await {
            Ok(toggled) => {
                if toggled {
                    info!("Checked '{}'", label);
                }
                report.written.push(field);
            }
            Err(err) => soft(err, field)?,
        }
        Ok(())
    }

    async fn keywords(&self, report: &mut ApplyReport, joined: &str) -> Result<(), FlowError> {
        match self.page().write_clipboard(joined).await {
            Ok(()) => info!("Keywords copied to clipboard"),
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => info!(%err, "Clipboard access skipped (not focused)"),
        }

        let snapshot = self.page().snapshot().await?;
        match self
            .locator()
            .locate(&snapshot, Role::KeywordsField, &LocateContext::default())
        {
            Some(found) => {
                info!("Found keywords input. Filling...");
                let el = snapshot.handle(found.node);
                let written = async {
                    self.writer.write_text(el, joined).await?;
                    self.settle(self.timing().keywords_enter_delay_ms).await;
                    self.page()
                        .dispatch_key(KeyTarget::Element(el), KeyStroke::Press(Key::Enter))
                        .await
                }
                .await;
                match written {
                    Ok(()) => report.written.push(Field::Keywords),
                    Err(err) => soft(err, Field::Keywords)?,
                }
            }
            None => {
                info!("Keywords input auto-detect failed. Please paste manually.");
                report.missing.push(Field::Keywords);
            }
        }
        self.settle(self.timing().keywords_settle_ms).await;
        Ok(())
    }

    async fn title(&self, report: &mut ApplyReport, title: Option<&str>) -> Result<(), FlowError> {
        info!("Waiting for UI to stabilize before setting title...");
        self.settle(self.timing().title_stabilize_ms).await;

        info!("Dismissing any popups before setting description...");
        if let Err(err) = dismiss_popups(self.page(), self.locator()).await {
            soft(err, Field::Title)?;
        }
        self.settle(self.timing().popup_dismiss_settle_ms).await;

        let snapshot = self.page().snapshot().await?;
        let field = self
            .locator()
            .locate(&snapshot, Role::TitleField, &LocateContext::default());
        let (Some(found), Some(title)) = (field, title) else {
            warn!("Skipping title (input not found or no title data)");
            if title.is_some() {
                report.missing.push(Field::Title);
            }
            return Ok(());
        };
        let el = snapshot.handle(found.node);

        let first_write = async {
            self.page().click(el).await?;
            self.settle(self.timing().title_click_settle_ms).await;
            info!("Setting title: \"{:.20}...\"", title);
            self.writer.write_text(el, title).await
        }
        .await;
        if let Err(err) = first_write {
            soft(err, Field::Title)?;
        }
        self.settle(self.timing().title_write_settle_ms).await;

        info!("Checking for the onboarding tour...");
        match dismiss_tour_banner(self.page(), self.locator()).await {
            Ok(outcome) => report.tour_banner_dismissed = outcome != BannerOutcome::NotPresent,
            Err(err) => soft(err, Field::Title)?,
        }
        self.settle(self.timing().banner_dismiss_settle_ms).await;

        match self.writer.verify_text(el, title).await {
            Ok(verification) => {
                report.title_held = Some(verification.held());
                if verification.held() {
                    report.written.push(Field::Title);
                } else {
                    report.missing.push(Field::Title);
                }
            }
            Err(err) => soft(err, Field::Title)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{form_page, sample_metadata, FormPage};
    use action_primitives::testing::PageEvent;
    use tokio::time::Instant;

    fn applier(form: &FormPage, timing: Timing) -> MetadataApplier {
        MetadataApplier::new(form.page.clone(), Arc::new(Locator::default()), timing)
    }

    fn running() -> RunSession {
        let session = RunSession::new();
        assert!(session.try_begin_single());
        session
    }

    fn position(events: &[PageEvent], wanted: impl Fn(&PageEvent) -> bool) -> usize {
        events
            .iter()
            .position(wanted)
            .unwrap_or_else(|| panic!("event missing from {:#?}", events))
    }

    #[tokio::test]
    async fn dropdowns_precede_keywords_and_title_comes_last() {
        let form = form_page();
        let options = ApplyOptions {
            auto_ai_check: true,
            auto_no_people: true,
        };
        let report = applier(&form, Timing::instant())
            .apply(&sample_metadata(), options, &running())
            .await
            .unwrap();

        assert_eq!(
            report.written,
            vec![
                Field::Category1,
                Field::Category2,
                Field::ImageType,
                Field::AiGenerated,
                Field::NoPeople,
                Field::Keywords,
                Field::Title,
            ]
        );
        assert!(report.missing.is_empty());
        assert_eq!(report.title_held, Some(true));

        let events = form.page.events();
        let cat1 = position(&events, |e| matches!(e, PageEvent::SelectOption { node, .. } if *node == form.category1));
        let cat2 = position(&events, |e| matches!(e, PageEvent::SelectOption { node, .. } if *node == form.category2));
        let kind = position(&events, |e| matches!(e, PageEvent::SelectOption { node, .. } if *node == form.image_type));
        let keywords = position(&events, |e| matches!(e, PageEvent::Assign { node, .. } if *node == form.keywords));
        let title = position(&events, |e| matches!(e, PageEvent::Assign { node, .. } if *node == form.title));
        assert!(cat1 < cat2 && cat2 < kind && kind < keywords && keywords < title);

        assert_eq!(form.page.value_of(form.category1).as_deref(), Some("nature"));
        assert_eq!(form.page.value_of(form.image_type).as_deref(), Some("photo"));
        assert_eq!(form.page.value_of(form.keywords).as_deref(), Some("fox, snow, winter"));
        assert_eq!(form.page.value_of(form.title).as_deref(), Some("Red fox hunting in deep snow"));
        assert!(events.contains(&PageEvent::Clipboard("fox, snow, winter".into())));
    }

    #[tokio::test]
    async fn keywords_get_enter_after_the_write() {
        let form = form_page();
        let meta = MetadataResult {
            keywords: vec!["fox".into(), "snow".into()],
            ..MetadataResult::default()
        };
        applier(&form, Timing::instant())
            .apply(&meta, ApplyOptions::default(), &running())
            .await
            .unwrap();

        let events = form.page.events();
        let assign = position(&events, |e| matches!(e, PageEvent::Assign { node, .. } if *node == form.keywords));
        assert!(matches!(
            events[assign + 1],
            PageEvent::Key {
                target: KeyTarget::Element(handle),
                stroke: KeyStroke::Press(Key::Enter),
            } if handle.node == form.keywords
        ));
    }

    #[tokio::test]
    async fn clipboard_refusal_does_not_block_keywords() {
        let form = form_page();
        form.page.deny_clipboard();
        let meta = MetadataResult {
            keywords: vec!["fox".into()],
            ..MetadataResult::default()
        };
        let report = applier(&form, Timing::instant())
            .apply(&meta, ApplyOptions::default(), &running())
            .await
            .unwrap();
        assert_eq!(report.written, vec![Field::Keywords]);
    }

    #[tokio::test(start_paused = true)]
    async fn title_only_run_keeps_page_pacing() {
        let form = form_page();
        let meta = MetadataResult {
            title: Some("Red fox".into()),
            ..MetadataResult::default()
        };
        let started = Instant::now();
        let report = applier(&form, Timing::default())
            .apply(&meta, ApplyOptions::default(), &running())
            .await
            .unwrap();
        assert_eq!(report.written, vec![Field::Title]);
        // stabilize, popups, click, write, banner, autosave
        assert_eq!(
            started.elapsed(),
            Timing::ms(1000 + 800 + 300 + 1000 + 800 + 1500)
        );
    }

    #[tokio::test]
    async fn unknown_option_is_reported_missing() {
        let form = form_page();
        let meta = MetadataResult {
            category1: Some("Underwater".into()),
            ..MetadataResult::default()
        };
        let report = applier(&form, Timing::instant())
            .apply(&meta, ApplyOptions::default(), &running())
            .await
            .unwrap();
        assert_eq!(report.missing, vec![Field::Category1]);
        assert!(report.written.is_empty());
    }

    #[tokio::test]
    async fn stop_mid_application_leaves_title_untouched() {
        let form = form_page();
        let session = Arc::new(running());
        let stopper = session.clone();
        let category1 = form.category1;
        form.page.on_event(move |event, _| {
            if matches!(event, PageEvent::SelectOption { node, .. } if *node == category1) {
                stopper.request_stop();
            }
        });

        let report = applier(&form, Timing::instant())
            .apply(&sample_metadata(), ApplyOptions::default(), &session)
            .await
            .unwrap();
        assert!(report.stopped);
        assert_eq!(report.written, vec![Field::Category1]);
        assert_eq!(report.title_held, None);
        assert!(!form
            .page
            .events()
            .iter()
            .any(|e| matches!(e, PageEvent::Assign { node, .. } if *node == form.title)));
    }

    #[tokio::test]
    async fn lost_page_aborts_application() {
        let form = form_page();
        form.page.lose_context();
        let err = applier(&form, Timing::instant())
            .apply(&sample_metadata(), ApplyOptions::default(), &running())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
