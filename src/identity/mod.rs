//! Client for the managed identity provider.
//!
//! Every operation is one REST call: the provider validates ID tokens,
//! passwords and OTP codes; this crate only relays the answers.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use model::{
    ErrorEnvelope, LookupReq, LookupResp, PasswordSignInReq, PhoneSignInReq, SendCodeReq,
    SendCodeResp, SignInResp,
};

pub mod model;

pub const IDENTITY_API_BASE: &str = "https://identitytoolkit.googleapis.com/";

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider answered and refused (bad token, wrong password, wrong code...).
    #[error("{0}")]
    Rejected(String),
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected identity provider response: {0}")]
    Malformed(String),
}

/// Claims relayed from a successful token verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
}

/// Tokens issued by a password or phone sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignIn {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
}

impl From<SignInResp> for SignIn {
    fn from(resp: SignInResp) -> Self {
        Self {
            uid: resp.local_id,
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            expires_in: resp.expires_in.parse().unwrap_or(0),
            email: resp.email,
            phone_number: resp.phone_number,
            display_name: resp.display_name,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Ask the provider whether `id_token` is valid.
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedToken, IdentityError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignIn, IdentityError>;

    /// Send an OTP to `phone_number`; returns the session handle needed to confirm it.
    async fn send_verification_code(
        &self,
        phone_number: &str,
        recaptcha_token: &str,
    ) -> Result<String, IdentityError>;

    async fn sign_in_with_phone(
        &self,
        session_info: &str,
        code: &str,
    ) -> Result<SignIn, IdentityError>;
}

#[derive(Clone)]
pub struct IdentityClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    pub fn new(api_key: String) -> Result<Self, IdentityError> {
        let base_url = Url::parse(IDENTITY_API_BASE)
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: Url) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .user_agent(concat!("k2k-portal/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, IdentityError> {
        let base_url = Url::parse(&cfg.identity.base_url)
            .map_err(|e| IdentityError::Malformed(format!("identity.base_url: {e}")))?;
        Self::with_base_url(cfg.identity.api_key.clone(), base_url)
    }

    /// Build the POST for `v1/accounts:{method}` with the API key as query parameter.
    pub fn build_request<B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<reqwest::Request, IdentityError> {
        let mut endpoint = self
            .base_url
            .join(&format!("v1/accounts:{method}"))
            .map_err(|e| IdentityError::Malformed(format!("invalid base URL: {e}")))?;
        endpoint.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(body)
            .build()?)
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request = self.build_request(method, body)?;
        debug!(method, "identity provider request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let (code, message) = refusal(status, &text);
            warn!(method, %status, code, %message, "identity provider refused request");
            if status.is_client_error() {
                return Err(IdentityError::Rejected(message));
            }
            return Err(IdentityError::Malformed(message));
        }

        serde_json::from_str(&text).map_err(|e| IdentityError::Malformed(e.to_string()))
    }
}

/// Error code and message of a refused call, falling back to the HTTP status.
fn refusal(status: reqwest::StatusCode, text: &str) -> (u16, String) {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (status.as_u16(), format!("status {status}")),
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    #[instrument(skip_all)]
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedToken, IdentityError> {
        let resp: LookupResp = self.call("lookup", &LookupReq { id_token }).await?;
        let account = resp
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Rejected("USER_NOT_FOUND".into()))?;
        Ok(VerifiedToken {
            uid: account.local_id,
            email: account.email,
            email_verified: account.email_verified,
            phone_number: account.phone_number,
            display_name: account.display_name,
        })
    }

    #[instrument(skip_all)]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignIn, IdentityError> {
        let body = PasswordSignInReq {
            email,
            password,
            return_secure_token: true,
        };
        let resp: SignInResp = self.call("signInWithPassword", &body).await?;
        Ok(resp.into())
    }

    #[instrument(skip_all)]
    async fn send_verification_code(
        &self,
        phone_number: &str,
        recaptcha_token: &str,
    ) -> Result<String, IdentityError> {
        let body = SendCodeReq {
            phone_number,
            recaptcha_token,
        };
        let resp: SendCodeResp = self.call("sendVerificationCode", &body).await?;
        Ok(resp.session_info)
    }

    #[instrument(skip_all)]
    async fn sign_in_with_phone(
        &self,
        session_info: &str,
        code: &str,
    ) -> Result<SignIn, IdentityError> {
        let body = PhoneSignInReq { session_info, code };
        let resp: SignInResp = self.call("signInWithPhoneNumber", &body).await?;
        Ok(resp.into())
    }
}
