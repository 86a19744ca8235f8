//! Core types shared across the crate.
//!
//! - [`error`] - the [`ComboError`](error::ComboError) enum and user-facing
//!   error rendering
//! - [`dep`] - the [`Dep`](dep::Dep) identity of a fetchable dependency

pub mod dep;
pub mod error;

pub use dep::Dep;
pub use error::{ComboError, ErrorContext, user_friendly_error};
