//! Token endpoint results.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::TokenEndpointError,
	provider::GrantType,
};

/// Lifetime assumed when a provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::hours(1);

/// Access token returned by a token endpoint call.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenGrant {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: String,
	/// Scopes reported by the provider; empty when the reply omitted `scope`.
	pub scope: ScopeSet,
	/// RFC 8693 `issued_token_type`, when present.
	pub issued_token_type: Option<String>,
	/// Instant the broker received the token.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from `expires_in`.
	pub expires_at: OffsetDateTime,
}
impl TokenGrant {
	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_token_type", &self.issued_token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Derives an expiry from an optional `expires_in` (seconds), defaulting to one hour.
pub(crate) fn expiry_from(
	grant: GrantType,
	issued_at: OffsetDateTime,
	expires_in: Option<u64>,
) -> Result<OffsetDateTime, TokenEndpointError> {
	let lifetime = match expires_in {
		None => DEFAULT_EXPIRES_IN,
		Some(0) => return Err(TokenEndpointError::InvalidExpiresIn { grant }),
		Some(secs) => i64::try_from(secs)
			.map(Duration::seconds)
			.map_err(|_| TokenEndpointError::InvalidExpiresIn { grant })?,
	};

	issued_at.checked_add(lifetime).ok_or(TokenEndpointError::InvalidExpiresIn { grant })
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn expiry_defaults_and_rejects_zero() {
		let now = datetime!(2026-03-01 12:00 UTC);

		assert_eq!(
			expiry_from(GrantType::AuthorizationCode, now, None)
				.expect("Missing expires_in should default."),
			datetime!(2026-03-01 13:00 UTC)
		);
		assert_eq!(
			expiry_from(GrantType::AuthorizationCode, now, Some(90))
				.expect("Positive expires_in should be accepted."),
			datetime!(2026-03-01 12:01:30 UTC)
		);
		assert!(matches!(
			expiry_from(GrantType::TokenExchange, now, Some(0)),
			Err(TokenEndpointError::InvalidExpiresIn { grant: GrantType::TokenExchange })
		));
		assert!(expiry_from(GrantType::TokenExchange, now, Some(u64::MAX)).is_err());
	}
}
