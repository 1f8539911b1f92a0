use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::gateway::GenerativeApi;

/// Environment keys checked for the API key, in order.
pub const CREDENTIAL_KEYS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// API key for the generative service. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

type Lookup<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

/// Reads the API key on first use and hands it to the client exactly once.
///
/// A failed attempt (no key, or the client rejecting it) leaves the gate
/// unconfigured so a later call can still succeed.
pub struct CredentialGate<'a> {
    api: &'a dyn GenerativeApi,
    lookup: Lookup<'a>,
    credential: OnceLock<Credential>,
}

impl<'a> CredentialGate<'a> {
    /// Looks keys up in the process environment, loading a local `.env`
    /// file first if one exists.
    pub fn from_env(api: &'a dyn GenerativeApi) -> Self {
        Self::with_lookup(api, |key| dotenvy::var(key).ok())
    }

    pub fn with_lookup(
        api: &'a dyn GenerativeApi,
        lookup: impl Fn(&str) -> Option<String> + 'a,
    ) -> Self {
        Self {
            api,
            lookup: Box::new(lookup),
            credential: OnceLock::new(),
        }
    }

    pub fn api(&self) -> &'a dyn GenerativeApi {
        self.api
    }

    pub fn is_configured(&self) -> bool {
        self.credential.get().is_some()
    }

    pub fn ensure_configured(&self) -> Result<(), ChatError> {
        if self.is_configured() {
            return Ok(());
        }

        let credential = self.read_credential()?;
        self.api
            .configure(&credential)
            .map_err(|cause| ChatError::CredentialRejected { cause })?;

        if self.credential.set(credential).is_ok() {
            info!("generative API configured");
        }
        Ok(())
    }

    fn read_credential(&self) -> Result<Credential, ChatError> {
        for key in CREDENTIAL_KEYS {
            let value = (self.lookup)(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            if let Some(secret) = value {
                debug!(source = key, "found API credential");
                return Ok(Credential::new(secret));
            }
        }

        Err(ChatError::MissingCredential {
            searched: CREDENTIAL_KEYS.join(" or "),
        })
    }
}
