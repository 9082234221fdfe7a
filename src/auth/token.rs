//! Token models issued or consumed by the broker.

pub mod actor;
pub mod grant;
pub mod secret;
