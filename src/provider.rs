//! Identity provider integration points.
//!
//! [`ProviderDescriptor`] is data: tenant endpoints, redirect URI, client authentication mode and
//! provider quirks. [`ProviderStrategy`] is behavior: extra form fields on outgoing token
//! requests and classification of token endpoint failures.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
