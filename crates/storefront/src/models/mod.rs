//! Session-scoped models.

mod session;

pub use session::{CurrentUser, session_keys};
