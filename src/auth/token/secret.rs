//! Secret strings that never print themselves.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const FINGERPRINT_BYTES: usize = 6;

/// Bearer token, agent password, or client secret.
///
/// `Debug` and `Display` both render a placeholder. Use [`TokenSecret::fingerprint`] to
/// correlate two log lines that refer to the same value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw value, for placing on the wire only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `true` for empty or whitespace-only values.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// First bytes of the SHA-256 digest, hex encoded.
	pub fn fingerprint(&self) -> String {
		Sha256::digest(self.0.as_bytes())[..FINGERPRINT_BYTES]
			.iter()
			.map(|byte| format!("{byte:02x}"))
			.collect()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(sha256:{})", self.fingerprint())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("***")
	}
}
