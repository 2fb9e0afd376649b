//! Dismissal helpers: open dropdown menus, popups, modals and the
//! onboarding tour. None of them blur the active element, which on this site
//! pops the help sidebar.

use action_locator::Locator;
use stockmeta_core_types::ElementHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::driver::{Key, KeyStroke, KeyTarget, PageDriver};
use crate::errors::ActionError;
use crate::timing::Timing;

const MENU_ESCAPES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerOutcome {
    NotPresent,
    Closed,
    /// No close control in the banner; Escape was pressed instead
    Escaped,
}

async fn settle(ms: u64) {
    if ms > 0 {
        sleep(Timing::ms(ms)).await;
    }
}

/// Treat a vanished element as already dismissed.
fn tolerate_stale(result: Result<(), ActionError>) -> Result<bool, ActionError> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_stale() => {
            debug!(%err, "element vanished before click");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

async fn escape(page: &dyn PageDriver) -> Result<(), ActionError> {
    page.dispatch_key(KeyTarget::Document, KeyStroke::Down(Key::Escape))
        .await
}

/// Close whatever menu the last dropdown interaction left open.
///
/// Escape twice on the document, click every visible backdrop, optionally
/// pointer-click `safe_focus` to move focus away, then a short pause.
/// Returns the number of backdrops clicked.
pub async fn close_active_menus(
    page: &dyn PageDriver,
    locator: &Locator,
    timing: &Timing,
    safe_focus: Option<ElementHandle>,
) -> Result<usize, ActionError> {
    debug!("Closing active menus");
    for _ in 0..MENU_ESCAPES {
        escape(page).await?;
        settle(timing.escape_gap_ms).await;
    }

    let snapshot = page.snapshot().await?;
    let mut clicked = 0;
    for backdrop in locator.backdrops(&snapshot) {
        if tolerate_stale(page.click(snapshot.handle(backdrop)).await)? {
            clicked += 1;
        }
    }

    if let Some(target) = safe_focus {
        tolerate_stale(page.pointer_click(target).await)?;
    }

    settle(timing.menu_close_settle_ms).await;
    Ok(clicked)
}

/// Click every close-labelled control on the page, then Escape.
pub async fn dismiss_popups(page: &dyn PageDriver, locator: &Locator) -> Result<usize, ActionError> {
    let snapshot = page.snapshot().await?;
    let mut clicked = 0;
    for control in locator.close_controls(&snapshot) {
        if tolerate_stale(page.click(snapshot.handle(control)).await)? {
            clicked += 1;
        }
    }
    escape(page).await?;
    Ok(clicked)
}

/// Close modals and side drawers that block the card grid.
pub async fn dismiss_modals(
    page: &dyn PageDriver,
    locator: &Locator,
    timing: &Timing,
) -> Result<usize, ActionError> {
    let snapshot = page.snapshot().await?;
    let mut closed = 0;
    for control in locator.modal_close_controls(&snapshot) {
        info!("Found and closing modal/sidebar");
        if tolerate_stale(page.click(snapshot.handle(control)).await)? {
            closed += 1;
        }
        settle(timing.modal_close_settle_ms).await;
    }
    escape(page).await?;
    settle(timing.modal_close_settle_ms).await;
    Ok(closed)
}

/// Close the onboarding tour if it is showing.
pub async fn dismiss_tour_banner(
    page: &dyn PageDriver,
    locator: &Locator,
) -> Result<BannerOutcome, ActionError> {
    let snapshot = page.snapshot().await?;
    let Some(banner) = locator.find_tour_banner(&snapshot) else {
        return Ok(BannerOutcome::NotPresent);
    };
    warn!("Found onboarding tour popup; closing it");
    if let Some(close) = banner.close {
        if tolerate_stale(page.click(snapshot.handle(close)).await)? {
            return Ok(BannerOutcome::Closed);
        }
    }
    info!("No close button on the tour popup; pressing Escape");
    escape(page).await?;
    Ok(BannerOutcome::Escaped)
}
