//! Actor tokens proving the identity of an acting agent.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token issued to an agent identity through the three-step actor flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct ActorToken {
	/// Agent identifier the token was issued to.
	pub subject: String,
	/// Token value; callers must avoid logging it.
	pub token: TokenSecret,
	/// Expiry instant derived from the provider's `expires_in`.
	pub expires_at: OffsetDateTime,
}
impl ActorToken {
	/// Creates a token for `subject` expiring at `expires_at`.
	pub fn new(
		subject: impl Into<String>,
		token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self { subject: subject.into(), token: TokenSecret::new(token), expires_at }
	}

	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}

	/// Returns the token value. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		self.token.expose()
	}
}
impl Debug for ActorToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ActorToken")
			.field("subject", &self.subject)
			.field("token", &self.token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
