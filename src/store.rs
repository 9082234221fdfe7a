//! Session Store contract and the built-in in-memory backend.
//!
//! A session is created when a login starts and completed exactly once when the callback
//! delivers a delegated token. Completion is a compare-and-set: the first writer wins and
//! later writers observe [`CompletionOutcome::AlreadyDelegated`]. Sessions are never deleted
//! here; retention belongs to whoever owns the backend.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{PkceChallenge, SessionId, TokenSecret},
};

/// Boxed future returned by [`SessionStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for user delegation sessions.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Stores a new session. Fails with [`StoreError::Conflict`] if the id is taken.
	fn insert(&self, session: Session) -> StoreFuture<'_, ()>;

	/// Fetches a session by id.
	fn get<'a>(&'a self, id: &'a SessionId) -> StoreFuture<'a, Option<Session>>;

	/// Atomically completes a pending session.
	fn complete<'a>(
		&'a self,
		id: &'a SessionId,
		completion: SessionCompletion,
	) -> StoreFuture<'a, CompletionOutcome>;

	/// Generates a session id and PKCE pair, stores the session, and returns it.
	fn create(&self) -> StoreFuture<'_, Session> {
		let session = Session::new(
			SessionId::generate(),
			PkceChallenge::generate(),
			OffsetDateTime::now_utc(),
		);

		Box::pin(async move {
			self.insert(session.clone()).await?;

			Ok(session)
		})
	}
}

/// Lifecycle position of a session, derived from its contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	/// Created; the user has not come back through the callback yet.
	AwaitingCallback,
	/// Holds a delegated token.
	Delegated,
}

/// User delegation session.
#[derive(Clone, Debug)]
pub struct Session {
	/// Opaque identifier, echoed back as the OAuth `state`.
	pub id: SessionId,
	/// PKCE pair bound to the authorization request.
	pub pkce: PkceChallenge,
	/// Subject of the delegated token, when it is a JWT carrying `sub`.
	pub user_subject: Option<String>,
	/// Delegated token bound to the orchestrator's actor identity.
	pub delegated_token: Option<TokenSecret>,
	/// Expiry of the delegated token.
	pub expires_at: Option<OffsetDateTime>,
	/// Creation instant.
	pub created_at: OffsetDateTime,
}
impl Session {
	/// Creates a pending session.
	pub fn new(id: SessionId, pkce: PkceChallenge, created_at: OffsetDateTime) -> Self {
		Self { id, pkce, user_subject: None, delegated_token: None, expires_at: None, created_at }
	}

	/// Current lifecycle position.
	pub fn status(&self) -> SessionStatus {
		if self.delegated_token.is_some() {
			SessionStatus::Delegated
		} else {
			SessionStatus::AwaitingCallback
		}
	}

	/// Returns `true` once the callback has completed.
	pub fn is_delegated(&self) -> bool {
		matches!(self.status(), SessionStatus::Delegated)
	}

	fn apply(&mut self, completion: SessionCompletion) {
		self.delegated_token = Some(completion.delegated_token);
		self.expires_at = Some(completion.expires_at);
		self.user_subject = completion.user_subject;
	}
}

/// Values written into a session when its callback completes.
#[derive(Clone, Debug)]
pub struct SessionCompletion {
	/// Delegated token.
	pub delegated_token: TokenSecret,
	/// Delegated token expiry.
	pub expires_at: OffsetDateTime,
	/// Subject of the delegated token, if known.
	pub user_subject: Option<String>,
}

/// Result of [`SessionStore::complete`].
#[derive(Clone, Debug)]
pub enum CompletionOutcome {
	/// The session was pending and now holds the delegated token.
	Completed(Session),
	/// The session was already completed; nothing was written.
	AlreadyDelegated,
	/// No session matched the id.
	Missing,
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A session with the same id already exists.
	#[error("Session `{id}` already exists.")]
	Conflict {
		/// Conflicting session id.
		id: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
