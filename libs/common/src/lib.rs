//! Common library for the Skillmarket web front-end
//!
//! This crate provides shared functionality used by the front-end services:
//! the authentication error taxonomy and bearer-token inspection.

pub mod error;
pub mod token;
