//! Page actions for the submission form.
//!
//! - [`PageDriver`]: the seam every side effect goes through
//! - [`CdpPage`]: the driver backed by an attached CDP page
//! - [`FieldWriter`]: text and dropdown writes with verification
//! - [`menus`]: closing menus, popups, modals and the onboarding tour

pub mod driver;
pub mod errors;
pub mod menus;
mod page;
mod scripts;
pub mod timing;
pub mod writer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use driver::*;
pub use errors::*;
pub use menus::BannerOutcome;
pub use page::CdpPage;
pub use timing::Timing;
pub use writer::*;
