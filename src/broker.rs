//! Token Broker: the facade collaborators call.
//!
//! [`TokenBroker`] composes the [`IdentityProviderClient`], the [`ActorTokenCache`], a
//! [`SessionStore`], and the [`AuditLog`] into two lifecycles:
//!
//! - **User delegation**: [`TokenBroker::create_session`] →
//!   [`TokenBroker::get_authorization_url`] → (user logs in) → [`TokenBroker::handle_callback`],
//!   which binds the user's consent to the orchestrator's actor token.
//! - **Downscoping**: [`TokenBroker::exchange_token_for_agent`] trades a delegated token for an
//!   audience- and scope-restricted token carrying the sub-agent's actor token.
//!
//! The broker never retries. Failures leave sessions and cache slots as they were.

// self
use crate::{
	_prelude::*,
	audit::{AuditEntry, AuditLog, AuditOperation},
	auth::{ActorToken, ScopeSet, SessionId, TokenGrant, TokenSecret, peek_subject},
	cache::{ActorSlot, ActorTokenCache},
	config::{AgentIdentity, BrokerConfig},
	error::ConfigError,
	flows::{AuthorizeRequest, IdentityProviderClient, TokenExchangeRequest},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowSpan},
	provider::ProviderStrategy,
	store::{CompletionOutcome, MemoryStore, Session, SessionCompletion, SessionStore},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Audience recorded on delegation audit entries.
pub const DELEGATION_AUDIENCE: &str = "orchestrator";

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Delegation and token-exchange facade.
pub struct TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: BrokerConfig,
	identity_provider: IdentityProviderClient<C, M>,
	actor_tokens: ActorTokenCache,
	sessions: Arc<dyn SessionStore>,
	audit: AuditLog,
	callback_guards: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}
impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker over a caller-provided transport + mapper pair and an in-memory
	/// session store.
	pub fn with_http_client(
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let identity_provider =
			IdentityProviderClient::with_http_client(config.provider.clone(), http_client, mapper);

		Ok(Self {
			config,
			identity_provider,
			actor_tokens: ActorTokenCache::new(),
			sessions: Arc::new(MemoryStore::default()),
			audit: AuditLog::new(),
			callback_guards: Default::default(),
		})
	}

	/// Replaces the session store.
	pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
		self.sessions = store;

		self
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.identity_provider = self.identity_provider.with_strategy(strategy);

		self
	}

	/// Broker configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Underlying protocol driver.
	pub fn identity_provider(&self) -> &IdentityProviderClient<C, M> {
		&self.identity_provider
	}

	/// Actor token cache shared by every flow of this broker.
	pub fn actor_tokens(&self) -> &ActorTokenCache {
		&self.actor_tokens
	}

	/// Audit trail of every token operation.
	pub fn audit_log(&self) -> &AuditLog {
		&self.audit
	}

	/// Eagerly acquires the orchestrator's actor token.
	///
	/// Callers must not serve requests when this fails: no delegation can succeed without it.
	pub async fn initialize(&self) -> Result<ActorToken> {
		let token = self.orchestrator_actor_token().await?;

		#[cfg(feature = "tracing")]
		tracing::info!(
			agent = %token.subject,
			expires_at = %token.expires_at,
			"Token broker initialized."
		);

		Ok(token)
	}

	/// Starts a delegation session with fresh PKCE material.
	pub async fn create_session(&self) -> Result<Session> {
		let session = self.sessions.create().await?;

		#[cfg(feature = "tracing")]
		tracing::debug!(session = %session.id, "Delegation session created.");

		Ok(session)
	}

	/// Fetches a session.
	pub async fn session(&self, id: &SessionId) -> Result<Session> {
		self.sessions.get(id).await?.ok_or_else(|| Error::SessionNotFound { id: id.to_string() })
	}

	/// Delegated token of a session, once its callback has completed.
	pub async fn delegated_token(&self, id: &SessionId) -> Result<Option<TokenSecret>> {
		Ok(self.session(id).await?.delegated_token)
	}

	/// Builds the user authorization URL for `session_id`.
	///
	/// The session id is sent as `state` and the orchestrator's agent id as `requested_actor`.
	pub async fn get_authorization_url(
		&self,
		session_id: &SessionId,
		scopes: &ScopeSet,
	) -> Result<Url> {
		let session = self.session(session_id).await?;
		let orchestrator = &self.config.orchestrator;

		self.identity_provider.build_authorize_url(AuthorizeRequest {
			client_id: &orchestrator.client.client_id,
			scope: scopes,
			state: &session.id,
			pkce: &session.pkce,
			requested_actor: &orchestrator.agent.id,
		})
	}

	/// Completes the session named by `state` with the user's authorization `code`.
	///
	/// Unknown `state` values fail with [`Error::SessionNotFound`] and are not audited.
	/// Concurrent callbacks for one session are serialized and only the first may complete
	/// it; later ones fail with [`Error::SessionAlreadyDelegated`]. Provider and storage
	/// failures are audited and leave the session pending.
	pub async fn handle_callback(&self, code: &str, state: &str) -> Result<Session> {
		let id =
			SessionId::new(state).map_err(|_| Error::SessionNotFound { id: state.to_owned() })?;

		self.session(&id).await?;

		let guard = self.callback_guard(&id);
		let outcome = {
			let _callback = guard.lock().await;

			self.complete_callback(code, &id).await
		};

		self.release_callback_guard(&id, guard);

		outcome
	}

	/// Exchanges `source_token` for a token restricted to `target_audience` and
	/// `target_scopes`, acting as the sub-agent named by `agent_key`.
	///
	/// Unknown keys fail with [`Error::UnknownAgent`] before any provider call and are not
	/// audited. Every other call appends exactly one audit entry.
	pub async fn exchange_token_for_agent(
		&self,
		source_token: &str,
		agent_key: &str,
		target_audience: &str,
		target_scopes: &ScopeSet,
	) -> Result<TokenGrant> {
		let agent = self
			.config
			.agent(agent_key)
			.ok_or_else(|| Error::UnknownAgent { key: agent_key.to_owned() })?;
		let span =
			FlowSpan::new(FlowKind::TokenExchange, "exchange_token_for_agent").with_agent(&agent.key);
		let outcome = span
			.instrument(self.exchange_as(&agent, source_token, target_audience, target_scopes))
			.await;
		let entry = match &outcome {
			Ok(_) => AuditEntry::success(AuditOperation::TokenExchange, &agent.id),
			Err(err) => AuditEntry::failure(AuditOperation::TokenExchangeFailed, &agent.id, err),
		};

		self.audit.record(
			entry
				.with_user_subject(peek_subject(source_token))
				.with_target_audience(target_audience)
				.with_scopes(target_scopes.clone()),
		);

		outcome
	}

	/// Scopes of the agent named by `agent_key`, applying the configured fallback policy.
	pub fn agent_scopes(&self, agent_key: &str) -> Result<ScopeSet> {
		let agent = self
			.config
			.agent(agent_key)
			.ok_or_else(|| Error::UnknownAgent { key: agent_key.to_owned() })?;

		Ok(self.config.resolve_scopes(&agent)?)
	}

	async fn complete_callback(&self, code: &str, id: &SessionId) -> Result<Session> {
		let session = self.session(id).await?;

		if session.is_delegated() {
			return Err(Error::SessionAlreadyDelegated { id: id.to_string() });
		}

		let orchestrator = &self.config.orchestrator.agent.id;
		let span = FlowSpan::new(FlowKind::Delegation, "handle_callback").with_agent(orchestrator);

		match span.instrument(self.delegate_and_store(code, &session)).await {
			Ok((session, scopes)) => {
				self.audit.record(
					AuditEntry::success(AuditOperation::DelegatedTokenObtained, orchestrator)
						.with_user_subject(session.user_subject.clone())
						.with_target_audience(DELEGATION_AUDIENCE)
						.with_scopes(scopes),
				);

				Ok(session)
			},
			Err(err) => {
				self.audit.record(
					AuditEntry::failure(AuditOperation::DelegatedTokenObtained, orchestrator, &err)
						.with_target_audience(DELEGATION_AUDIENCE),
				);

				Err(err)
			},
		}
	}

	// Everything after the provider call is part of the audited operation: a token that was
	// issued but could not be stored still produces a failure entry.
	async fn delegate_and_store(
		&self,
		code: &str,
		session: &Session,
	) -> Result<(Session, ScopeSet)> {
		let TokenGrant { access_token, scope, expires_at, .. } = self.delegate(code, session).await?;
		let completion = SessionCompletion {
			user_subject: peek_subject(access_token.expose()),
			delegated_token: access_token,
			expires_at,
		};
		let id = &session.id;

		match self.sessions.complete(id, completion).await? {
			CompletionOutcome::Completed(session) => Ok((session, scope)),
			CompletionOutcome::AlreadyDelegated =>
				Err(Error::SessionAlreadyDelegated { id: id.to_string() }),
			CompletionOutcome::Missing => Err(Error::SessionNotFound { id: id.to_string() }),
		}
	}

	async fn orchestrator_actor_token(&self) -> Result<ActorToken> {
		let orchestrator = &self.config.orchestrator;

		self.actor_tokens
			.get_or_refresh(&ActorSlot::Orchestrator, || {
				self.identity_provider.get_actor_token(&orchestrator.client, &orchestrator.agent)
			})
			.await
	}

	async fn delegate(&self, code: &str, session: &Session) -> Result<TokenGrant> {
		let actor_token = self.orchestrator_actor_token().await?;

		self.identity_provider
			.exchange_code_for_delegated_token(
				&self.config.orchestrator.client,
				code,
				session.pkce.verifier(),
				&actor_token,
			)
			.await
	}

	async fn exchange_as(
		&self,
		agent: &AgentIdentity,
		source_token: &str,
		target_audience: &str,
		target_scopes: &ScopeSet,
	) -> Result<TokenGrant> {
		let exchanger =
			self.config.token_exchanger.as_ref().ok_or(ConfigError::MissingTokenExchanger)?;
		let credentials = agent.credentials();
		// The orchestrator application vouches for the sub-agent's identity.
		let actor_token = self
			.actor_tokens
			.get_or_refresh(&ActorSlot::Agent(agent.key.clone()), || {
				self.identity_provider.get_actor_token(&self.config.orchestrator.client, &credentials)
			})
			.await?;
		let request = TokenExchangeRequest::new(source_token)
			.with_actor_token(actor_token.expose())
			.with_audience(target_audience)
			.with_scope(target_scopes);
		let grant = self.identity_provider.perform_token_exchange(exchanger, request).await?;

		#[cfg(feature = "tracing")]
		tracing::info!(
			agent = %agent.key,
			audience = target_audience,
			scopes = %target_scopes,
			token = %grant.access_token.fingerprint(),
			expires_at = %grant.expires_at,
			"Token exchanged for agent."
		);

		Ok(grant)
	}

	fn callback_guard(&self, id: &SessionId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.callback_guards.lock();

		guards.entry(id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_callback_guard(&self, id: &SessionId, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.callback_guards.lock();

		drop(guard);

		// Only the map still holds it, so no callback is waiting on this session.
		if guards.get(id).is_some_and(|guard| Arc::strong_count(guard) == 1) {
			guards.remove(id);
		}
	}

	#[cfg(test)]
	fn tracked_callback_guards(&self) -> usize {
		self.callback_guards.lock().len()
	}
}
#[cfg(feature = "reqwest")]
impl TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport bounded by the configured timeout.
	pub fn new(config: BrokerConfig) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new(config.request_timeout())?;

		Self::with_http_client(config, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("identity_provider", &self.identity_provider)
			.field("audit_entries", &self.audit.len())
			.finish()
	}
}
