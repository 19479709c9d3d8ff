use async_trait::async_trait;

use legalmind_core::backend::TokenProvider;
use legalmind_core::config::{read_token_from_credentials, read_user_from_credentials, Config};

/// Token provider backed by env/.env config with a credentials-file
/// fallback. The file is re-read on every token request so an external
/// session refresh is picked up without restarting.
pub struct EnvTokenProvider {
    token: Option<String>,
    credentials_path: String,
    user_id: Option<String>,
}

impl EnvTokenProvider {
    pub fn from_config(config: &Config) -> Self {
        let token = Some(config.access_token.clone()).filter(|t| !t.is_empty());
        let user_id = Some(config.user_id.clone())
            .filter(|u| !u.is_empty())
            .or_else(|| read_user_from_credentials(&config.credentials_path));
        Self {
            token,
            credentials_path: config.credentials_path.clone(),
            user_id,
        }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn access_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| read_token_from_credentials(&self.credentials_path))
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Anonymous sessions: no token, no user id.
pub struct NullTokenProvider;

#[async_trait]
impl TokenProvider for NullTokenProvider {
    async fn access_token(&self) -> Option<String> {
        None
    }

    fn user_id(&self) -> Option<String> {
        None
    }
}
