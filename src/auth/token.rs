//! Token secrets and the pairs rotated by the refresh endpoint.

pub mod pair;
pub mod secret;
