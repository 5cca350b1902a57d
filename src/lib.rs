//! Extract Gmail messages to/from a list of addresses into local HTML, CSV
//! and attachment files.

pub mod addresses;
pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod credentials;
pub mod errors;
pub mod export;
pub mod extract;
pub mod gmail;
pub mod mime;
pub mod oauth;
pub mod onboarding;
pub mod sanitize;
