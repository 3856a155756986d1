//! Resolves the credentials and region a new environment is created with.
//!
//! Exactly one credential source is used: a named profile, then static
//! temporary credentials, then an interactive choice. The region comes from
//! the flag, else the session's own default, else a prompt.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cloud::CloudResult;
use crate::domain::{ProvisionError, Result};
use crate::prompt::Prompter;

pub const DEFAULT_REGION: &str = "us-west-2";

const REGION_PROMPT: &str = "Which region?";
const CREDS_HELP: &str = "The credentials are used to create your environment in an account and region. To learn more about named profiles, see the cloud provider's CLI documentation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Profile(String),
    StaticCredentials { access_key_id: String },
    /// Chosen interactively; holds the label of the chosen entry.
    Selected(String),
}

/// An authenticated context bound to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub source: CredentialSource,
    pub account_id: String,
    pub region: Option<String>,
}

/// Credential flags as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFlags {
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

fn given(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.is_empty())
}

impl CredentialFlags {
    pub fn validate(&self) -> Result<()> {
        if !given(&self.profile) {
            return Ok(());
        }
        for (flag, value) in [
            ("--aws-access-key-id", &self.access_key_id),
            ("--aws-secret-access-key", &self.secret_access_key),
            ("--aws-session-token", &self.session_token),
        ] {
            if given(value) {
                return Err(ProvisionError::config(format!(
                    "cannot specify both --profile and {}",
                    flag
                )));
            }
        }
        Ok(())
    }

    /// Static credentials need both the key id and the secret.
    pub fn has_static_credentials(&self) -> bool {
        given(&self.access_key_id) && given(&self.secret_access_key)
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn from_profile(&self, profile: &str) -> CloudResult<Session>;

    async fn from_static_creds(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&str>,
    ) -> CloudResult<Session>;
}

#[async_trait]
pub trait CredsSelector: Send + Sync {
    async fn creds(&self, message: &str, help: &str) -> Result<Session>;
}

/// Lets the user pick one of the configured profiles.
pub struct ProfileCredsSelector {
    prompt: Arc<dyn Prompter>,
    provider: Arc<dyn SessionProvider>,
    profiles: Vec<String>,
}

impl ProfileCredsSelector {
    pub fn new(
        prompt: Arc<dyn Prompter>,
        provider: Arc<dyn SessionProvider>,
        profiles: Vec<String>,
    ) -> Self {
        Self {
            prompt,
            provider,
            profiles,
        }
    }
}

#[async_trait]
impl CredsSelector for ProfileCredsSelector {
    async fn creds(&self, message: &str, help: &str) -> Result<Session> {
        if self.profiles.is_empty() {
            return Err(ProvisionError::config(
                "no named profiles are configured; pass --profile or static credentials",
            ));
        }
        let choice = self.prompt.select_one(message, help, &self.profiles)?;
        let mut session = self
            .provider
            .from_profile(&choice)
            .await
            .map_err(|e| ProvisionError::cloud(format!("create session from profile {}", choice), e))?;
        session.source = CredentialSource::Selected(choice);
        Ok(session)
    }
}

pub struct SessionResolver {
    provider: Arc<dyn SessionProvider>,
    selector: Arc<dyn CredsSelector>,
    prompt: Arc<dyn Prompter>,
}

impl SessionResolver {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        selector: Arc<dyn CredsSelector>,
        prompt: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            provider,
            selector,
            prompt,
        }
    }

    /// Session for creating `env_name`, with its region resolved.
    pub async fn resolve(
        &self,
        flags: &CredentialFlags,
        env_name: &str,
        region_flag: Option<&str>,
    ) -> Result<Session> {
        flags.validate()?;
        let mut session = self.credentials(flags, env_name).await?;

        let region = match region_flag.filter(|r| !r.is_empty()) {
            Some(r) => r.to_string(),
            None => match session.region.as_deref().filter(|r| !r.is_empty()) {
                Some(r) => r.to_string(),
                None => self.prompt.get(REGION_PROMPT, "", Some(DEFAULT_REGION))?,
            },
        };
        session.region = Some(region);
        Ok(session)
    }

    async fn credentials(&self, flags: &CredentialFlags, env_name: &str) -> Result<Session> {
        if let Some(profile) = flags.profile.as_deref().filter(|p| !p.is_empty()) {
            return self.provider.from_profile(profile).await.map_err(|e| {
                ProvisionError::cloud(format!("create session from profile {}", profile), e)
            });
        }
        if flags.has_static_credentials() {
            let key = flags.access_key_id.as_deref().unwrap_or_default();
            let secret = flags.secret_access_key.as_deref().unwrap_or_default();
            return self
                .provider
                .from_static_creds(key, secret, flags.session_token.as_deref())
                .await
                .map_err(|e| ProvisionError::cloud("create session from static credentials", e));
        }
        let message = format!("Which credentials would you like to use to create {}?", env_name);
        self.selector.creds(&message, CREDS_HELP).await
    }
}
