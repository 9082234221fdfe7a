//! Unverified JWT claim peeking.
//!
//! The broker never validates tokens; providers and resource servers do. The subject is
//! read only to label sessions and audit entries.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

#[derive(serde::Deserialize)]
struct SubjectClaim {
	sub: Option<String>,
}

/// Returns the `sub` claim of a JWT-shaped token, or `None` for opaque tokens.
pub fn peek_subject(token: &str) -> Option<String> {
	let mut parts = token.split('.');
	let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);

	if parts.next().is_some() {
		return None;
	}

	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claims = serde_json::from_slice::<SubjectClaim>(&bytes).ok()?;

	claims.sub.filter(|sub| !sub.is_empty())
}
