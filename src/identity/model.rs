//! Wire types of the identity provider's REST API.
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LookupReq<'a> {
    pub id_token: &'a str,
}

#[derive(Deserialize, Debug, Default)]
pub struct LookupResp {
    #[serde(default)]
    pub users: Vec<AccountInfo>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub local_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSignInReq<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeReq<'a> {
    pub phone_number: &'a str,
    pub recaptcha_token: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResp {
    pub session_info: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PhoneSignInReq<'a> {
    pub session_info: &'a str,
    pub code: &'a str,
}

/// Shared shape of the password and phone sign-in responses.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignInResp {
    pub local_id: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds, sent as a decimal string.
    #[serde(default)]
    pub expires_in: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    pub message: String,
}
