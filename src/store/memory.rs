//! Thread-safe in-memory [`SessionStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::SessionId,
	store::{CompletionOutcome, Session, SessionCompletion, SessionStore, StoreError, StoreFuture},
};

type SessionMap = Arc<RwLock<HashMap<SessionId, Session>>>;

/// Storage backend that keeps sessions in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionMap);
impl MemoryStore {
	/// Number of stored sessions.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no session is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn insert_now(map: SessionMap, session: Session) -> Result<(), StoreError> {
		let mut guard = map.write();

		if guard.contains_key(&session.id) {
			return Err(StoreError::Conflict { id: session.id.to_string() });
		}

		guard.insert(session.id.clone(), session);

		Ok(())
	}

	fn complete_now(
		map: SessionMap,
		id: SessionId,
		completion: SessionCompletion,
	) -> CompletionOutcome {
		let mut guard = map.write();

		match guard.get_mut(&id) {
			Some(session) if session.is_delegated() => CompletionOutcome::AlreadyDelegated,
			Some(session) => {
				session.apply(completion);

				CompletionOutcome::Completed(session.clone())
			},
			None => CompletionOutcome::Missing,
		}
	}
}
impl SessionStore for MemoryStore {
	fn insert(&self, session: Session) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::insert_now(map, session) })
	}

	fn get<'a>(&'a self, id: &'a SessionId) -> StoreFuture<'a, Option<Session>> {
		let map = self.0.clone();
		let id = id.to_owned();

		Box::pin(async move { Ok(map.read().get(&id).cloned()) })
	}

	fn complete<'a>(
		&'a self,
		id: &'a SessionId,
		completion: SessionCompletion,
	) -> StoreFuture<'a, CompletionOutcome> {
		let map = self.0.clone();
		let id = id.to_owned();

		Box::pin(async move { Ok(Self::complete_now(map, id, completion)) })
	}
}
