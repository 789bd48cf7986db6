//! Web front-end service models

pub mod session;

// Re-export for convenience
pub use session::{PendingProfile, SessionClaims, SessionView};
