//! Page view-models. Each page owns its page-scoped state, fetches on
//! `load`/`mount`, and exposes the operations a front end triggers. Nothing
//! here outlives the page value.

pub mod announcements;
pub mod carousel;
pub mod discussion;
pub mod emergency;
pub mod format;
pub mod location;
pub mod polls;
pub mod search;
pub mod state;
pub mod verification;

#[cfg(test)]
pub(crate) mod testing;

pub use announcements::AnnouncementsPage;
pub use carousel::Carousel;
pub use discussion::DiscussionPage;
pub use emergency::EmergencyPage;
pub use location::LocationPage;
pub use polls::PollsPage;
pub use state::{PageState, Toast, ToastLevel};
pub use verification::VerificationPage;
