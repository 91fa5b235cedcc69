//! Credential models and the session terminator.

pub mod session;
pub mod token;

pub use session::*;
pub use token::{pair::*, secret::*};
