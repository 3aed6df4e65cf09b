//! External identity provider (Facebook Login)
//!
//! The provider only proves who the caller is; whether they may enter is
//! decided by the identity resolver.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::OAuthSettings;
use crate::error::{AppError, Result};
use crate::models::ExternalIdentity;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is redirected to in order to start the handshake.
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Exchange an authorization code for a verified identity assertion.
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity>;
}

#[derive(Clone)]
pub struct FacebookProvider {
    settings: OAuthSettings,
    http: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct FacebookUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

impl FacebookUser {
    fn into_identity(self) -> ExternalIdentity {
        ExternalIdentity {
            email: self.email,
            external_id: self.id,
            display_name: self.name,
            picture_url: self.picture.and_then(|p| p.data.url),
        }
    }
}

impl FacebookProvider {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            http: Client::new(),
        }
    }

    fn graph_url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!(
            "https://graph.facebook.com/{}/{}",
            self.settings.graph_api_version, path
        ))
        .map_err(|e| AppError::Internal(format!("invalid graph url: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for FacebookProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&format!(
            "https://www.facebook.com/{}/dialog/oauth",
            self.settings.graph_api_version
        ))
        .map_err(|e| AppError::Internal(format!("invalid authorize url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.facebook_app_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .append_pair("scope", "public_profile,email");
        Ok(url.to_string())
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity> {
        let token_resp = self
            .http
            .get(self.graph_url("oauth/access_token")?)
            .query(&[
                ("client_id", self.settings.facebook_app_id.as_str()),
                ("client_secret", self.settings.facebook_app_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if !token_resp.status().is_success() {
            return Err(AppError::OAuthProvider(format!(
                "token exchange returned {}",
                token_resp.status()
            )));
        }
        let token: TokenResponse = token_resp.json().await?;

        let profile_resp = self
            .http
            .get(self.graph_url("me")?)
            .query(&[
                ("fields", "id,name,email,picture.type(large)"),
                ("access_token", token.access_token.as_str()),
            ])
            .send()
            .await?;

        if !profile_resp.status().is_success() {
            return Err(AppError::OAuthProvider(format!(
                "profile request returned {}",
                profile_resp.status()
            )));
        }
        let user: FacebookUser = profile_resp.json().await?;
        Ok(user.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FacebookProvider {
        FacebookProvider::new(OAuthSettings {
            facebook_app_id: "1234".into(),
            facebook_app_secret: "secret".into(),
            redirect_uri: "http://localhost:5000/auth/facebook/callback".into(),
            graph_api_version: "v18.0".into(),
        })
    }

    #[test]
    fn test_authorize_url_carries_state_and_scope() {
        let url = Url::parse(&provider().authorize_url("state-abc").unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("www.facebook.com"));
        assert_eq!(url.path(), "/v18.0/dialog/oauth");

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "1234");
        assert_eq!(pairs["state"], "state-abc");
        assert_eq!(pairs["scope"], "public_profile,email");
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn test_profile_maps_to_identity() {
        let user: FacebookUser = serde_json::from_value(serde_json::json!({
            "id": "10001",
            "name": "Ann Lee",
            "picture": { "data": { "url": "https://cdn.example/p.jpg" } }
        }))
        .unwrap();
        let identity = user.into_identity();

        assert_eq!(identity.external_id, "10001");
        assert!(identity.email.is_none());
        assert_eq!(identity.picture_url.as_deref(), Some("https://cdn.example/p.jpg"));
    }
}
