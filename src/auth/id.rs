//! Validated identifiers.
//!
//! Agent keys name entries of the agent table, session ids travel through the browser as the
//! OAuth `state`, and provider ids label descriptors. All three are restricted to a URL-safe
//! alphabet so they can be embedded in query strings and log fields without escaping.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, auth::pkce::random_string};

const MAX_LEN: usize = 128;
const SESSION_ID_LEN: usize = 32;

/// Identifier validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Empty value.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// Character outside `[A-Za-z0-9._~-]`.
	#[error("{kind} identifier contains `{character}`, which is not URL-safe.")]
	InvalidCharacter {
		/// Identifier kind.
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// Longer than the permitted length.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum length.
		max: usize,
	},
}

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check($kind, &value)?;

				Ok(Self(value))
			}

			/// Identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.as_str()
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.as_str()
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.as_str()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(self.as_str())
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $kind, self.0)
			}
		}
	};
}

identifier! {
	/// Key of an agent table entry (e.g. `hr_agent`).
	AgentKey => "Agent"
}
identifier! {
	/// Opaque session identifier, echoed back as the OAuth `state`.
	SessionId => "Session"
}
identifier! {
	/// Identity provider label.
	ProviderId => "Provider"
}

impl SessionId {
	/// Generates a random 32-character session identifier.
	pub fn generate() -> Self {
		Self(random_string(SESSION_ID_LEN))
	}
}

fn check(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(character) = value.chars().find(|c| !is_url_safe(*c)) {
		return Err(IdentifierError::InvalidCharacter { kind, character });
	}
	if value.len() > MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: MAX_LEN });
	}

	Ok(())
}

fn is_url_safe(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejects_empty_and_non_url_safe_values() {
		assert_eq!(SessionId::new(""), Err(IdentifierError::Empty { kind: "Session" }));
		assert_eq!(
			AgentKey::new("hr agent"),
			Err(IdentifierError::InvalidCharacter { kind: "Agent", character: ' ' })
		);
		assert!(SessionId::new("state&inject=1").is_err());
		assert!(SessionId::new(format!("session{}id", '\u{00A0}')).is_err());
		assert!(ProviderId::new("asgardeo.io").is_ok());
	}

	#[test]
	fn length_is_bounded() {
		assert!(SessionId::new("a".repeat(MAX_LEN)).is_ok());
		assert!(matches!(
			SessionId::new("a".repeat(MAX_LEN + 1)),
			Err(IdentifierError::TooLong { max: MAX_LEN, .. })
		));
	}

	#[test]
	fn deserialization_validates() {
		let key: AgentKey =
			serde_json::from_str("\"it_agent\"").expect("Agent key should deserialize.");

		assert_eq!(key.as_str(), "it_agent");
		assert_eq!(format!("{key:?}"), "Agent(it_agent)");
		assert!(serde_json::from_str::<AgentKey>("\"it agent\"").is_err());
	}

	#[test]
	fn generated_session_ids_are_valid_and_distinct() {
		let first = SessionId::generate();

		assert_eq!(first.len(), SESSION_ID_LEN);
		assert!(SessionId::new(first.as_str()).is_ok());
		assert_ne!(first, SessionId::generate());
	}

	#[test]
	fn agent_table_lookups_by_str() {
		let table = BTreeMap::from([(
			AgentKey::new("booking_agent").expect("Agent key should be valid."),
			"booking-agent-id",
		)]);

		assert_eq!(table.get("booking_agent"), Some(&"booking-agent-id"));
	}
}
