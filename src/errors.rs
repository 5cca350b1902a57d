use std::path::PathBuf;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Credentials validation failed: {0}")]
    Credentials(String),
    #[error("OAuth token expired or revoked")]
    AuthExpired,
    #[error("Gmail API rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Gmail API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("{} not found", .0.display())]
    AddressFileMissing(PathBuf),
    #[error("No email addresses found in {}", .0.display())]
    NoAddresses(PathBuf),
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors after which continuing the current run is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthExpired | Self::RateLimited(_) | Self::Credentials(_)
        )
    }

    /// Suggested next step for the user, if there is a useful one.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Credentials(_) => Some(
                "Run `gmail-extractor setup` to configure Gmail API access, or download \
                 OAuth 2.0 Desktop App credentials from https://console.cloud.google.com/ \
                 and save them as credentials.json",
            ),
            Self::AuthExpired => Some(
                "Run `gmail-extractor reset` and then extract again to re-authenticate",
            ),
            Self::RateLimited(_) => Some("Wait a few minutes and run the extraction again"),
            Self::AddressFileMissing(_) => Some(
                "Run `gmail-extractor init` and add email addresses (one per line)",
            ),
            Self::NoAddresses(_) => Some("Add email addresses to the file (one per line)"),
            Self::Network(_) => Some("Check your internet connection and try again"),
            _ => None,
        }
    }
}
