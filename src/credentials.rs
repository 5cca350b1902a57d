//! The OAuth client secret file downloaded from Google Cloud Console.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 4] = ["client_id", "client_secret", "auth_uri", "token_uri"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("File is not valid JSON")]
    InvalidJson,
    #[error("Invalid credentials format. Must be OAuth 2.0 Desktop App credentials")]
    InvalidFormat,
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Error reading file: {0}")]
    Read(String),
}

/// Check that `path` holds installed-app (or web) OAuth client credentials
/// with every field the token exchange needs.
pub fn validate_credentials(path: &Path) -> Result<ClientSecrets, CredentialsError> {
    if !path.exists() {
        return Err(CredentialsError::NotFound(path.display().to_string()));
    }
    let raw = fs::read_to_string(path).map_err(|e| CredentialsError::Read(e.to_string()))?;
    parse_credentials(&raw)
}

pub fn parse_credentials(raw: &str) -> Result<ClientSecrets, CredentialsError> {
    let data: Value = serde_json::from_str(raw).map_err(|_| CredentialsError::InvalidJson)?;
    let installed = data.get("installed");
    let web = data.get("web");
    // An empty `installed` section does not shadow a usable `web` one.
    let section = installed
        .filter(|v| has_content(v))
        .or_else(|| web.filter(|v| has_content(v)))
        .or(installed)
        .or(web)
        .filter(|v| v.is_object())
        .ok_or(CredentialsError::InvalidFormat)?;

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| section.get(**field).is_none())
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CredentialsError::MissingFields(missing));
    }

    serde_json::from_value(section.clone()).map_err(|e| CredentialsError::Read(e.to_string()))
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
