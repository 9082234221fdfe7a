//! Broker configuration: provider endpoints, orchestrator and exchanger credentials, and the
//! agent identity table.
//!
//! Configuration is plain data. It is usually loaded from TOML:
//!
//! ```toml
//! scope_fallback = "deny"
//! request_timeout_secs = 30
//!
//! [provider]
//! id = "asgardeo"
//! redirect_uri = "http://localhost:8000/callback"
//!
//! [provider.endpoints]
//! authorization = "https://api.asgardeo.io/t/acme/oauth2/authorize"
//! authentication = "https://api.asgardeo.io/t/acme/oauth2/authn"
//! token = "https://api.asgardeo.io/t/acme/oauth2/token"
//!
//! [orchestrator.client]
//! client_id = "orchestrator-app"
//! client_secret = "orchestrator-secret"
//!
//! [orchestrator.agent]
//! id = "orchestrator-agent-id"
//! secret = "orchestrator-agent-secret"
//!
//! [token_exchanger]
//! client_id = "exchanger-app"
//! client_secret = "exchanger-secret"
//!
//! [agents.hr_agent]
//! id = "hr-agent-id"
//! secret = "hr-agent-secret"
//! scopes = ["hr:read", "hr:write"]
//! ```

// std
use std::{fs, path::Path, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{AgentKey, ScopeSet, TokenSecret},
	error::ConfigError,
	provider::ProviderDescriptor,
};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// OAuth client credentials (application registration).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// Registered client identifier.
	pub client_id: String,
	/// Registered client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates a credential pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	fn validate(&self, path: &str) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::missing(format!("{path}.client_id")));
		}
		if self.client_secret.is_blank() {
			return Err(ConfigError::missing(format!("{path}.client_secret")));
		}

		Ok(())
	}
}

/// Username/password of an agent identity registered at the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCredentials {
	/// Agent identifier, presented as the username in the authenticate step.
	pub id: String,
	/// Agent secret, presented as the password in the authenticate step.
	pub secret: TokenSecret,
}
impl AgentCredentials {
	/// Creates an agent credential pair.
	pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { id: id.into(), secret: TokenSecret::new(secret) }
	}

	fn validate(&self, path: &str) -> Result<(), ConfigError> {
		if self.id.trim().is_empty() {
			return Err(ConfigError::missing(format!("{path}.id")));
		}
		if self.secret.is_blank() {
			return Err(ConfigError::missing(format!("{path}.secret")));
		}

		Ok(())
	}
}

/// The orchestrator's application client and its own agent identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
	/// Client used for the actor flow, user delegation, and sub-agent authentication.
	pub client: ClientCredentials,
	/// Agent identity the orchestrator acts as.
	pub agent: AgentCredentials,
}

/// One entry of the agent table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
	/// Agent identifier registered at the provider.
	pub id: String,
	/// Agent secret registered at the provider.
	pub secret: TokenSecret,
	/// Scopes the agent is expected to request.
	#[serde(default)]
	pub scopes: ScopeSet,
}

/// Resolved agent identity handed to the actor token cache and the exchange flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
	/// Configuration key.
	pub key: AgentKey,
	/// Agent identifier registered at the provider.
	pub id: String,
	/// Agent secret registered at the provider.
	pub secret: TokenSecret,
	/// Scopes declared in configuration.
	pub declared_scopes: ScopeSet,
}
impl AgentIdentity {
	/// Credentials used by the three-step actor flow.
	pub fn credentials(&self) -> AgentCredentials {
		AgentCredentials { id: self.id.clone(), secret: self.secret.clone() }
	}
}

/// Policy applied when an agent declares no scopes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFallback {
	/// Fail closed with [`ConfigError::MissingAgentScopes`].
	#[default]
	Deny,
	/// Derive `{prefix}:read` and `{prefix}:write` from the key, where `prefix` is the key
	/// without a trailing `_agent`. Every use is logged.
	DeriveFromKey,
}

/// Top-level broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Identity provider descriptor.
	pub provider: ProviderDescriptor,
	/// Orchestrator client and agent identity.
	pub orchestrator: OrchestratorConfig,
	/// Dedicated client for RFC 8693 exchanges.
	#[serde(default)]
	pub token_exchanger: Option<ClientCredentials>,
	/// Agent identities keyed by configuration key.
	#[serde(default)]
	pub agents: BTreeMap<AgentKey, AgentConfig>,
	/// Policy for agents without declared scopes.
	#[serde(default)]
	pub scope_fallback: ScopeFallback,
	/// Bound applied to every provider request.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}
impl BrokerConfig {
	/// Creates a configuration with no agents, no exchanger, and default policies.
	pub fn new(provider: ProviderDescriptor, orchestrator: OrchestratorConfig) -> Self {
		Self {
			provider,
			orchestrator,
			token_exchanger: None,
			agents: BTreeMap::new(),
			scope_fallback: ScopeFallback::default(),
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
		let config = toml::from_str::<Self>(document)?;

		config.validate()?;

		Ok(config)
	}

	/// Reads, parses, and validates a TOML file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let document = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

		Self::from_toml_str(&document)
	}

	/// Sets the token-exchanger client.
	pub fn with_token_exchanger(mut self, client: ClientCredentials) -> Self {
		self.token_exchanger = Some(client);

		self
	}

	/// Adds or replaces an agent entry.
	pub fn with_agent(mut self, key: AgentKey, agent: AgentConfig) -> Self {
		self.agents.insert(key, agent);

		self
	}

	/// Overrides the scope fallback policy.
	pub fn with_scope_fallback(mut self, fallback: ScopeFallback) -> Self {
		self.scope_fallback = fallback;

		self
	}

	/// Overrides the request timeout.
	pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
		self.request_timeout_secs = secs;

		self
	}

	/// Request timeout as a [`StdDuration`].
	pub fn request_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.request_timeout_secs)
	}

	/// Rejects empty credentials, a zero timeout, and invalid provider descriptors.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.provider.validate()?;
		self.orchestrator.client.validate("orchestrator.client")?;
		self.orchestrator.agent.validate("orchestrator.agent")?;

		if let Some(exchanger) = &self.token_exchanger {
			exchanger.validate("token_exchanger")?;
		}

		for (key, agent) in &self.agents {
			if agent.id.trim().is_empty() {
				return Err(ConfigError::missing(format!("agents.{key}.id")));
			}
			if agent.secret.is_blank() {
				return Err(ConfigError::missing(format!("agents.{key}.secret")));
			}
		}

		if self.request_timeout_secs == 0 {
			return Err(ConfigError::InvalidTimeout);
		}

		Ok(())
	}

	/// Looks up an agent identity by key.
	pub fn agent(&self, key: &str) -> Option<AgentIdentity> {
		self.agents.get_key_value(key).map(|(key, agent)| AgentIdentity {
			key: key.clone(),
			id: agent.id.clone(),
			secret: agent.secret.clone(),
			declared_scopes: agent.scopes.clone(),
		})
	}

	/// Resolves the scopes for `agent`, applying [`ScopeFallback`] when none are declared.
	pub fn resolve_scopes(&self, agent: &AgentIdentity) -> Result<ScopeSet, ConfigError> {
		if !agent.declared_scopes.is_empty() {
			return Ok(agent.declared_scopes.clone());
		}

		match self.scope_fallback {
			ScopeFallback::Deny =>
				Err(ConfigError::MissingAgentScopes { key: agent.key.to_string() }),
			ScopeFallback::DeriveFromKey => {
				let prefix = agent.key.strip_suffix("_agent").unwrap_or(agent.key.as_ref());
				let scopes = ScopeSet::new([format!("{prefix}:read"), format!("{prefix}:write")])?;

				#[cfg(feature = "tracing")]
				tracing::warn!(
					agent = %agent.key,
					scopes = %scopes,
					"Agent declares no scopes; derived scopes from its key."
				);

				Ok(scopes)
			},
		}
	}
}

fn default_request_timeout_secs() -> u64 {
	DEFAULT_REQUEST_TIMEOUT_SECS
}
