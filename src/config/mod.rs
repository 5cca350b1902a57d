use std::env;
use std::path::PathBuf;

pub const EMAIL_ADDRESSES_FILE: &str = "email_addresses.txt";
pub const OUTPUT_DIR: &str = "extracted_emails";
pub const TOKEN_FILE: &str = "token.json";
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// File locations used by every command. Defaults live in the working
/// directory and can be overridden by env vars (or a `.env` file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub addresses_file: PathBuf,
    pub output_dir: PathBuf,
    pub token_file: PathBuf,
    pub credentials_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addresses_file: PathBuf::from(EMAIL_ADDRESSES_FILE),
            output_dir: PathBuf::from(OUTPUT_DIR),
            token_file: PathBuf::from(TOKEN_FILE),
            credentials_file: PathBuf::from(CREDENTIALS_FILE),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            addresses_file: path_from_env("GMAIL_EXTRACTOR_ADDRESSES")
                .unwrap_or(defaults.addresses_file),
            output_dir: path_from_env("GMAIL_EXTRACTOR_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            token_file: path_from_env("GMAIL_EXTRACTOR_TOKEN").unwrap_or(defaults.token_file),
            credentials_file: path_from_env("GMAIL_EXTRACTOR_CREDENTIALS")
                .unwrap_or(defaults.credentials_file),
        }
    }

    /// All paths resolved against `dir`. Handy for tests and for running
    /// against a project directory other than the cwd.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            addresses_file: dir.join(EMAIL_ADDRESSES_FILE),
            output_dir: dir.join(OUTPUT_DIR),
            token_file: dir.join(TOKEN_FILE),
            credentials_file: dir.join(CREDENTIALS_FILE),
        }
    }
}

fn path_from_env(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
