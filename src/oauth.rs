use crate::config::AppConfig;
use crate::credentials::{validate_credentials, ClientSecrets};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
const DEFAULT_REDIRECT: &str = "http://127.0.0.1";
const EXPIRY_MARGIN_SECS: i64 = 60;

/// What ends up in the token cache file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// Usable without a refresh. Unknown expiry counts as expired.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self
                .expires_at
                .is_some_and(|exp| now < exp - Duration::seconds(EXPIRY_MARGIN_SECS))
    }

    fn from_response(res: &BasicTokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: res.access_token().secret().to_string(),
            refresh_token: res
                .refresh_token()
                .map(|r| r.secret().to_string())
                .or(previous_refresh),
            expires_at: res
                .expires_in()
                .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::seconds(0))),
            scopes: res
                .scopes()
                .map(|s| s.iter().map(|scope| scope.to_string()).collect())
                .unwrap_or_else(|| vec![GMAIL_READONLY_SCOPE.to_string()]),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthStatus {
    pub has_credentials: bool,
    pub has_token: bool,
    pub credentials_valid: bool,
    pub token_valid: bool,
    pub authenticated: bool,
}

pub fn auth_status(config: &AppConfig) -> AuthStatus {
    let has_credentials = config.credentials_file.exists();
    let has_token = config.token_file.exists();
    let credentials_valid = has_credentials && validate_credentials(&config.credentials_file).is_ok();
    let token_valid = has_token
        && TokenStore::new(&config.token_file)
            .load()
            .ok()
            .flatten()
            .is_some_and(|t| t.is_valid());

    AuthStatus {
        has_credentials,
        has_token,
        credentials_valid,
        token_valid,
        authenticated: token_valid,
    }
}

/// Produce a usable access token: cached, refreshed, or freshly consented.
pub async fn authorize(config: &AppConfig) -> AppResult<StoredToken> {
    let secrets = validate_credentials(&config.credentials_file)
        .map_err(|e| AppError::Credentials(e.to_string()))?;
    let store = TokenStore::new(&config.token_file);

    let cached = match store.load() {
        Ok(tok) => tok,
        Err(e) => {
            warn!(error = %e, "Could not load saved token; will re-authenticate");
            None
        }
    };

    if let Some(tok) = &cached {
        if tok.is_valid() {
            debug!(path = %store.path().display(), "Using cached token");
            return Ok(tok.clone());
        }
    }

    let mut token = None;
    if let Some(refresh) = cached.and_then(|t| t.refresh_token) {
        info!("Refreshing expired token");
        let client = build_client(&secrets)?;
        token = try_refresh(&client, refresh).await?;
        if token.is_none() {
            warn!("Token refresh failed; starting new authentication flow");
        }
    }

    let token = match token {
        Some(t) => t,
        None => run_consent_flow(&secrets).await?,
    };

    if let Err(e) = store.save(&token) {
        warn!(error = %e, "Could not save token; you may need to re-authenticate on next run");
    } else {
        info!(path = %store.path().display(), "Authentication token saved");
    }
    Ok(token)
}

async fn run_consent_flow(secrets: &ClientSecrets) -> AppResult<StoredToken> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AppError::Unexpected(format!("failed to bind loopback port: {e}")))?;
    let local_port = listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| AppError::Unexpected(format!("failed to read local addr: {e}")))?;

    let redirect = loopback_redirect(secrets, local_port)?;
    info!(redirect = %redirect.url(), "Opening browser for Google OAuth consent");
    let client = build_client(secrets)?.set_redirect_uri(redirect);

    let (auth_url, verifier, csrf) = consent_url(&client);
    open_in_browser(auth_url.as_str());

    let code = listen_for_code(listener).await?;
    if code.state != *csrf.secret() {
        return Err(AppError::Unexpected(
            "OAuth callback state mismatch; try again".into(),
        ));
    }

    let token_res = client
        .exchange_code(AuthorizationCode::new(code.code))
        .set_pkce_verifier(verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| AppError::Network(format!("token exchange failed: {e}")))?;

    Ok(StoredToken::from_response(&token_res, None))
}

/// Redirect for the consent callback: the first loopback URI registered for
/// the client (127.0.0.1 if none is), pointed at the port we actually bound.
fn loopback_redirect(secrets: &ClientSecrets, port: u16) -> AppResult<RedirectUrl> {
    let registered = secrets
        .redirect_uris
        .iter()
        .map(String::as_str)
        .find(|uri| uri.starts_with("http://localhost") || uri.starts_with("http://127.0.0.1"))
        .unwrap_or(DEFAULT_REDIRECT);
    let mut url = url::Url::parse(registered)
        .map_err(|e| AppError::Credentials(format!("invalid redirect uri {registered}: {e}")))?;
    url.set_port(Some(port))
        .map_err(|_| AppError::Credentials(format!("redirect uri {registered} cannot take a port")))?;
    Ok(RedirectUrl::from_url(url))
}

fn build_client(secrets: &ClientSecrets) -> AppResult<BasicClient> {
    let auth_url = AuthUrl::new(secrets.auth_uri.clone())
        .map_err(|e| AppError::Credentials(format!("invalid auth_uri: {e}")))?;
    let token_url = TokenUrl::new(secrets.token_uri.clone())
        .map_err(|e| AppError::Credentials(format!("invalid token_uri: {e}")))?;
    let client = BasicClient::new(
        ClientId::new(secrets.client_id.clone()),
        Some(ClientSecret::new(secrets.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(oauth2::AuthType::RequestBody);

    Ok(client)
}

/// Consent page for read-only Gmail access. Offline access plus a forced
/// consent prompt make Google hand out a refresh token every time.
fn consent_url(client: &BasicClient) -> (url::Url, PkceCodeVerifier, CsrfToken) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();
    (url, verifier, csrf)
}

async fn try_refresh(client: &BasicClient, refresh_token: String) -> AppResult<Option<StoredToken>> {
    let refresh = RefreshToken::new(refresh_token.clone());
    let res = client
        .exchange_refresh_token(&refresh)
        .request_async(async_http_client)
        .await;
    match res {
        Ok(token_res) => {
            info!("Token refreshed successfully");
            Ok(Some(StoredToken::from_response(&token_res, Some(refresh_token))))
        }
        Err(err) => {
            warn!("Refresh token invalid or expired: {err}");
            Ok(None)
        }
    }
}

struct CodeResponse {
    code: String,
    state: String,
}

async fn listen_for_code(listener: TcpListener) -> AppResult<CodeResponse> {
    let (mut stream, _) = listener
        .accept()
        .await
        .map_err(|e| AppError::Unexpected(format!("redirect accept failed: {e}")))?;

    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| AppError::Unexpected(format!("reading auth callback failed: {e}")))?;
    let req = String::from_utf8_lossy(&buf[..n]);
    let parsed = parse_callback(&req);

    let body = match &parsed {
        Ok(_) => "Authentication complete. You can close this tab.",
        Err(_) => "Authentication failed. Return to the terminal for details.",
    };
    let response = format!("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n{body}");
    let _ = stream.write_all(response.as_bytes()).await;
    parsed
}

fn parse_callback(request: &str) -> AppResult<CodeResponse> {
    let first_line = request.lines().next().unwrap_or("");
    let path = first_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AppError::Unexpected("invalid HTTP request".into()))?;
    let full_url = format!("http://localhost{path}");
    let parsed = url::Url::parse(&full_url)
        .map_err(|e| AppError::Unexpected(format!("failed to parse callback url: {e}")))?;

    let param = |name: &str| {
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };
    if let Some(error) = param("error") {
        return Err(AppError::Credentials(format!("consent was not granted: {error}")));
    }
    let code = param("code")
        .ok_or_else(|| AppError::Unexpected("callback missing code parameter".into()))?;
    Ok(CodeResponse {
        code,
        state: param("state").unwrap_or_default(),
    })
}

/// Platform command that hands a URL to the default browser.
fn browser_opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("rundll32.exe", &["url.dll,FileProtocolHandler"])
    } else {
        ("xdg-open", &[])
    }
}

/// Best effort; the URL is always printed so it can be opened by hand.
pub fn open_in_browser(url: &str) {
    let (program, args) = browser_opener();
    match std::process::Command::new(program).args(args).arg(url).status() {
        Ok(status) if status.success() => debug!(program, "Opened browser"),
        Ok(status) => warn!(program, %status, "Browser opener exited with failure"),
        Err(e) => warn!(program, error = %e, "Could not launch browser opener"),
    }
    println!("If your browser did not open, visit:\n{url}");
}

/// JSON token cache, readable only by the owner on unix.
#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppResult<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| AppError::io(&self.path, e))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::Unexpected(format!("token decode: {e}")))
    }

    pub fn save(&self, token: &StoredToken) -> AppResult<()> {
        let serialized =
            serde_json::to_string_pretty(token).map_err(|e| AppError::Unexpected(format!("{e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| AppError::io(&self.path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
        }

        file.write_all(serialized.as_bytes())
            .map_err(|e| AppError::io(&self.path, e))?;
        file.sync_all().map_err(|e| AppError::io(&self.path, e))?;
        Ok(())
    }

    /// Returns whether there was anything to delete.
    pub fn delete(&self) -> AppResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| AppError::io(&self.path, e))?;
        Ok(true)
    }
}
