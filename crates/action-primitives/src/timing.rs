//! Settle delays and timeouts, all in milliseconds.
//!
//! The host page re-renders asynchronously after nearly every interaction;
//! these waits give it time to catch up. Overridable from the `timing`
//! section of the config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// After each dropdown write, before closing menus
    pub dropdown_settle_ms: u64,
    pub option_poll_interval_ms: u64,
    pub option_poll_attempts: u32,
    /// After scrolling a dropdown option into view
    pub option_scroll_settle_ms: u64,
    /// After clicking a dropdown option
    pub option_click_settle_ms: u64,
    /// Between the Escape presses of close-active-menus
    pub escape_gap_ms: u64,
    pub menu_close_settle_ms: u64,
    /// Keyword field write to Enter press
    pub keywords_enter_delay_ms: u64,
    pub keywords_settle_ms: u64,
    pub title_stabilize_ms: u64,
    /// After dismissing popups ahead of the title write
    pub popup_dismiss_settle_ms: u64,
    pub title_click_settle_ms: u64,
    pub title_write_settle_ms: u64,
    pub banner_dismiss_settle_ms: u64,
    pub title_retry_settle_ms: u64,
    pub autosave_ms: u64,
    /// Bound on a whole metadata application
    pub apply_timeout_ms: u64,
    pub recovery_short_wait_ms: u64,
    pub recovery_long_wait_ms: u64,
    pub modal_close_settle_ms: u64,
    pub card_scroll_settle_ms: u64,
    /// Card click to side panel populated
    pub panel_load_ms: u64,
    pub between_items_ms: u64,
    pub lazy_load_wait_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            dropdown_settle_ms: 500,
            option_poll_interval_ms: 200,
            option_poll_attempts: 10,
            option_scroll_settle_ms: 150,
            option_click_settle_ms: 300,
            escape_gap_ms: 50,
            menu_close_settle_ms: 100,
            keywords_enter_delay_ms: 100,
            keywords_settle_ms: 500,
            title_stabilize_ms: 1000,
            popup_dismiss_settle_ms: 800,
            title_click_settle_ms: 300,
            title_write_settle_ms: 1000,
            banner_dismiss_settle_ms: 800,
            title_retry_settle_ms: 500,
            autosave_ms: 1500,
            apply_timeout_ms: 15_000,
            recovery_short_wait_ms: 2000,
            recovery_long_wait_ms: 3000,
            modal_close_settle_ms: 500,
            card_scroll_settle_ms: 500,
            panel_load_ms: 2500,
            between_items_ms: 500,
            lazy_load_wait_ms: 1500,
        }
    }
}

impl Timing {
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Every delay zeroed; for tests that do not care about pacing.
    pub fn instant() -> Self {
        Self {
            dropdown_settle_ms: 0,
            option_poll_interval_ms: 0,
            option_scroll_settle_ms: 0,
            option_click_settle_ms: 0,
            escape_gap_ms: 0,
            menu_close_settle_ms: 0,
            keywords_enter_delay_ms: 0,
            keywords_settle_ms: 0,
            title_stabilize_ms: 0,
            popup_dismiss_settle_ms: 0,
            title_click_settle_ms: 0,
            title_write_settle_ms: 0,
            banner_dismiss_settle_ms: 0,
            title_retry_settle_ms: 0,
            autosave_ms: 0,
            recovery_short_wait_ms: 0,
            recovery_long_wait_ms: 0,
            modal_close_settle_ms: 0,
            card_scroll_settle_ms: 0,
            panel_load_ms: 0,
            between_items_ms: 0,
            lazy_load_wait_ms: 0,
            ..Self::default()
        }
    }
}
