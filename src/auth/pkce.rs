//! PKCE (RFC 7636) verifier/challenge generation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	#[default]
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier/challenge pair generated once per authorization attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceChallenge {
	verifier: String,
	challenge: String,
}
impl PkceChallenge {
	/// Generates a random 64-character verifier and its S256 challenge.
	pub fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_s256_challenge(&verifier);

		Self { verifier, challenge }
	}

	/// Secret verifier presented at the token endpoint.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Challenge sent with the authorization request.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}

	/// Returns true if `challenge` is the S256 transform of `verifier`.
	pub fn verify(&self) -> bool {
		compute_s256_challenge(&self.verifier) == self.challenge
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.finish()
	}
}

/// Computes `BASE64URL(SHA256(verifier))` without padding.
pub fn compute_s256_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
