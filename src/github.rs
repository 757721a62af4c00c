use crate::config::GithubConfig;
use crate::error::app_error::AppError;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth scopes requested on login: the user's email plus read access to
/// their organization memberships.
const OAUTH_SCOPES: &str = "user:email read:org";

const USER_AGENT: &str = concat!("turbine-console/", env!("CARGO_PKG_VERSION"));

/// An OAuth credential as returned by GitHub's token endpoint. Stored
/// opaquely on the user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
}

/// The authenticated account itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubIdentity {
    pub account_id: i64,
    pub login: String,
}

/// One active organization membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgMembership {
    pub account_id: i64,
    pub login: String,
}

/// The identity-provider boundary. Implemented by [`GithubClient`];
/// substituted by a canned fake in tests.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The URL to redirect the browser to when starting a login, carrying
    /// `state` as the CSRF token.
    fn authorize_url(&self, state: &Uuid) -> String;

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError>;

    async fn identity(&self, token: &AccessToken) -> Result<GithubIdentity, AppError>;

    async fn active_org_memberships(&self, token: &AccessToken) -> Result<Vec<OrgMembership>, AppError>;

    /// The user's primary, verified email address, if they have one.
    async fn primary_email(&self, token: &AccessToken) -> Result<Option<String>, AppError>;
}

pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build GitHub HTTP client");

        GithubClient { http, config }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: i64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiMembership {
    organization: ApiOrganization,
}

#[derive(Debug, Deserialize)]
struct ApiOrganization {
    id: i64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[async_trait::async_trait]
impl IdentityProvider for GithubClient {
    fn authorize_url(&self, state: &Uuid) -> String {
        format!(
            "{}?client_id={}&scope={}&state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(OAUTH_SCOPES),
            state
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::provider("could not exchange authorization code", e))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider("could not decode token response", e))?;

        // GitHub reports a rejected code as a 200 with an error payload, so
        // a missing access_token is the failure signal here.
        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(AccessToken {
                access_token,
                token_type: token.token_type.unwrap_or_default(),
                scope: token.scope.unwrap_or_default(),
            }),
            _ => Err(AppError::Provider {
                message: "token endpoint returned no access token".to_string(),
            }),
        }
    }

    async fn identity(&self, token: &AccessToken) -> Result<GithubIdentity, AppError> {
        let user: ApiUser = self
            .get(token, "/user")
            .await
            .map_err(|e| AppError::provider("could not get user", e))?;

        Ok(GithubIdentity {
            account_id: user.id,
            login: user.login,
        })
    }

    async fn active_org_memberships(&self, token: &AccessToken) -> Result<Vec<OrgMembership>, AppError> {
        let memberships: Vec<ApiMembership> = self
            .get(token, "/user/memberships/orgs?state=active")
            .await
            .map_err(|e| AppError::provider("could not list org memberships", e))?;

        Ok(memberships
            .into_iter()
            .map(|m| OrgMembership {
                account_id: m.organization.id,
                login: m.organization.login,
            })
            .collect())
    }

    async fn primary_email(&self, token: &AccessToken) -> Result<Option<String>, AppError> {
        let emails: Vec<ApiEmail> = self
            .get(token, "/user/emails")
            .await
            .map_err(|e| AppError::provider("could not list emails", e))?;

        Ok(emails.into_iter().find(|e| e.primary && e.verified).map(|e| e.email))
    }
}

impl GithubClient {
    async fn get<T: serde::de::DeserializeOwned>(&self, token: &AccessToken, path: &str) -> Result<T, reqwest::Error> {
        self.http
            .get(format!("{}{}", self.config.api_url, path))
            .bearer_auth(&token.access_token)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}
