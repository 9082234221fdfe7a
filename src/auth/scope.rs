//! OAuth scope sets.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Scopes appended to every user authorization request.
pub const IDENTITY_SCOPES: [&str; 2] = ["openid", "profile"];

/// Scope rejected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// A scope token was empty.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// A scope token contains a character outside the RFC 6749 `scope-token` grammar.
	#[error("Scope `{scope}` contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Offending scope.
		scope: String,
		/// First disallowed character.
		character: char,
	},
	/// The operation needs at least one scope.
	#[error("At least one scope must be requested.")]
	EmptySet,
}

/// Sorted, deduplicated OAuth scopes.
///
/// Two sets built from the same scopes in any order compare equal and render identically.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(BTreeSet<String>);
impl ScopeSet {
	/// Validates every scope and collects them into a set.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		scopes
			.into_iter()
			.map(|scope| {
				let scope = scope.into();

				validate(&scope)?;

				Ok(scope)
			})
			.collect::<Result<_, _>>()
			.map(Self)
	}

	/// Parses a whitespace-separated `scope` parameter.
	pub fn from_delimited(value: &str) -> Result<Self, ScopeValidationError> {
		Self::new(value.split_whitespace())
	}

	/// Number of scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// `true` for the empty set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Membership test.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains(scope)
	}

	/// Scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Copy of the set with `extra` added.
	pub fn union<'a>(&self, extra: impl IntoIterator<Item = &'a str>) -> Self {
		let mut merged = self.0.clone();

		merged.extend(extra.into_iter().map(str::to_owned));

		Self(merged)
	}

	/// Scopes joined by `delimiter`; `None` when the set is empty.
	pub fn join(&self, delimiter: char) -> Option<String> {
		(!self.is_empty()).then(|| {
			self.iter().fold(String::new(), |mut buf, scope| {
				if !buf.is_empty() {
					buf.push(delimiter);
				}

				buf.push_str(scope);

				buf
			})
		})
	}

	/// Space-delimited rendering, empty for the empty set.
	pub fn normalized(&self) -> String {
		self.join(' ').unwrap_or_default()
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<ScopeSet> for Vec<String> {
	fn from(value: ScopeSet) -> Self {
		value.0.into_iter().collect()
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" => Ok(Self::default()),
			blank if blank.trim().is_empty() => Err(ScopeValidationError::Empty),
			raw => Self::from_delimited(raw),
		}
	}
}

// scope-token = 1*( %x21 / %x23-5B / %x5D-7E )
fn validate(scope: &str) -> Result<(), ScopeValidationError> {
	if scope.is_empty() {
		return Err(ScopeValidationError::Empty);
	}

	match scope.chars().find(|c| !matches!(c, '\x21' | '\x23'..='\x5B' | '\x5D'..='\x7E')) {
		Some(character) =>
			Err(ScopeValidationError::InvalidCharacter { scope: scope.to_owned(), character }),
		None => Ok(()),
	}
}
