//! Actor Token Cache: one slot per agent identity, refreshed lazily.
//!
//! A slot is served only while `now < expires_at`. Refreshes for the same slot are
//! single-flighted: concurrent callers wait on one in-flight acquisition and then read its
//! result. A slot is written only after a refresh succeeds, so a failed or cancelled refresh
//! leaves the previous contents untouched.

// self
use crate::{
	_prelude::*,
	auth::{ActorToken, AgentKey},
};

/// Cache slot key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActorSlot {
	/// The orchestrator's own agent identity.
	Orchestrator,
	/// A configured sub-agent.
	Agent(AgentKey),
}
impl Display for ActorSlot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Orchestrator => f.write_str("orchestrator"),
			Self::Agent(key) => write!(f, "agent:{key}"),
		}
	}
}

/// Process-wide cache of actor tokens.
#[derive(Debug, Default)]
pub struct ActorTokenCache {
	slots: RwLock<HashMap<ActorSlot, ActorToken>>,
	guards: Mutex<HashMap<ActorSlot, Arc<AsyncMutex<()>>>>,
}
impl ActorTokenCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the slot contents regardless of expiry.
	pub fn peek(&self, slot: &ActorSlot) -> Option<ActorToken> {
		self.slots.read().get(slot).cloned()
	}

	/// Returns the slot contents if still valid at `now`.
	pub fn valid_at(&self, slot: &ActorSlot, now: OffsetDateTime) -> Option<ActorToken> {
		self.slots.read().get(slot).filter(|token| token.is_valid_at(now)).cloned()
	}

	/// Drops the slot so the next access refreshes it.
	pub fn invalidate(&self, slot: &ActorSlot) -> Option<ActorToken> {
		self.slots.write().remove(slot)
	}

	/// Returns the cached token, or runs `refresh` and stores its result.
	pub async fn get_or_refresh<F, Fut>(&self, slot: &ActorSlot, refresh: F) -> Result<ActorToken>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<ActorToken>>,
	{
		self.get_or_refresh_with_clock(slot, OffsetDateTime::now_utc, refresh).await
	}

	/// [`ActorTokenCache::get_or_refresh`] evaluated against a caller-supplied instant.
	pub async fn get_or_refresh_at<F, Fut>(
		&self,
		slot: &ActorSlot,
		now: OffsetDateTime,
		refresh: F,
	) -> Result<ActorToken>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<ActorToken>>,
	{
		self.get_or_refresh_with_clock(slot, || now, refresh).await
	}

	async fn get_or_refresh_with_clock<N, F, Fut>(
		&self,
		slot: &ActorSlot,
		now: N,
		refresh: F,
	) -> Result<ActorToken>
	where
		N: Fn() -> OffsetDateTime,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<ActorToken>>,
	{
		if let Some(token) = self.valid_at(slot, now()) {
			return Ok(token);
		}

		let guard = self.guard(slot);
		let _singleflight = guard.lock().await;

		// Another caller may have refreshed the slot while this one waited.
		if let Some(token) = self.valid_at(slot, now()) {
			return Ok(token);
		}

		let token = refresh().await?;

		#[cfg(feature = "tracing")]
		tracing::debug!(
			slot = %slot,
			token = %token.token.fingerprint(),
			expires_at = %token.expires_at,
			"Actor token slot refreshed."
		);

		self.slots.write().insert(slot.clone(), token.clone());

		Ok(token)
	}

	fn guard(&self, slot: &ActorSlot) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(slot.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const T0: OffsetDateTime = datetime!(2026-05-01 09:00 UTC);

	fn token(value: &str, expires_at: OffsetDateTime) -> ActorToken {
		ActorToken::new("orchestrator-agent", value, expires_at)
	}

	#[tokio::test]
	async fn valid_tokens_are_fetched_once() {
		let cache = ActorTokenCache::new();
		let calls = AtomicUsize::new(0);

		for offset in [0, 60, 3_000] {
			let now = T0 + Duration::seconds(offset);
			let actor = cache
				.get_or_refresh_at(&ActorSlot::Orchestrator, now, || async {
					calls.fetch_add(1, Ordering::SeqCst);

					Ok(token("actor-1", T0 + Duration::hours(1)))
				})
				.await
				.expect("Refresh should succeed.");

			assert_eq!(actor.expose(), "actor-1");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn expiry_triggers_exactly_one_refresh() {
		let cache = ActorTokenCache::new();
		let calls = AtomicUsize::new(0);
		let slot = ActorSlot::Agent(AgentKey::new("hr_agent").expect("Agent key should be valid."));
		let fetch = |value: &'static str, expires_at: OffsetDateTime| {
			calls.fetch_add(1, Ordering::SeqCst);

			async move { Ok::<_, Error>(token(value, expires_at)) }
		};

		cache
			.get_or_refresh_at(&slot, T0, || fetch("actor-1", T0 + Duration::minutes(5)))
			.await
			.expect("Initial fetch should succeed.");

		let at_expiry = T0 + Duration::minutes(5);

		for _ in 0..3 {
			let actor = cache
				.get_or_refresh_at(&slot, at_expiry, || fetch("actor-2", T0 + Duration::hours(1)))
				.await
				.expect("Refresh should succeed.");

			assert_eq!(actor.expose(), "actor-2");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn failed_refresh_leaves_the_slot_untouched() {
		let cache = ActorTokenCache::new();
		let stale = token("stale", T0);

		cache
			.get_or_refresh_at(&ActorSlot::Orchestrator, T0 - Duration::minutes(1), || async {
				Ok(stale.clone())
			})
			.await
			.expect("Seeding should succeed.");

		let err = cache
			.get_or_refresh_at(&ActorSlot::Orchestrator, T0, || async {
				Err(Error::Authentication { status: Some(200), reason: "no code".into() })
			})
			.await
			.expect_err("Refresh failure should propagate.");

		assert!(matches!(err, Error::Authentication { .. }));
		assert_eq!(
			cache.peek(&ActorSlot::Orchestrator).map(|token| token.expose().to_owned()),
			Some("stale".into())
		);
		assert!(cache.valid_at(&ActorSlot::Orchestrator, T0).is_none());
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let cache = ActorTokenCache::new();
		let calls = AtomicUsize::new(0);
		let refresh = || async {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(20)).await;

			Ok(token("shared", T0 + Duration::hours(1)))
		};
		let (first, second) = tokio::join!(
			cache.get_or_refresh_at(&ActorSlot::Orchestrator, T0, refresh),
			cache.get_or_refresh_at(&ActorSlot::Orchestrator, T0, refresh),
		);

		assert_eq!(first.expect("First caller should succeed.").expose(), "shared");
		assert_eq!(second.expect("Second caller should succeed.").expose(), "shared");
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn slots_are_independent() {
		let cache = ActorTokenCache::new();
		let hr = ActorSlot::Agent(AgentKey::new("hr_agent").expect("Agent key should be valid."));

		cache.slots.write().insert(ActorSlot::Orchestrator, token("orchestrator", T0));

		assert!(cache.peek(&hr).is_none());
		assert!(cache.invalidate(&ActorSlot::Orchestrator).is_some());
		assert!(cache.peek(&ActorSlot::Orchestrator).is_none());
		assert_eq!(hr.to_string(), "agent:hr_agent");
	}
}
