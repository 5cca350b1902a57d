//! Guided first-time setup: from an empty directory to a working token.

use crate::config::AppConfig;
use crate::console;
use crate::credentials::validate_credentials;
use crate::gmail::GmailClient;
use crate::oauth::{auth_status, authorize, open_in_browser, TokenStore};
use anyhow::Result;
use crossterm::style::Stylize;
use std::time::Duration;
use tracing::{info, warn};

const WIDTH: usize = 70;
const STEPS: u8 = 6;

const CONSOLE_PAGES: [(&str, &str); 3] = [
    ("https://console.cloud.google.com/projectcreate", "Create Project"),
    (
        "https://console.cloud.google.com/apis/library/gmail.googleapis.com",
        "Enable Gmail API",
    ),
    ("https://console.cloud.google.com/apis/credentials", "Create Credentials"),
];

pub async fn setup_wizard(config: &AppConfig) -> Result<()> {
    console::banner("Gmail Email Extractor - Setup Wizard", WIDTH);
    println!("\nThis wizard will guide you through setting up Gmail API access.");
    println!("Estimated time: 3-5 minutes\n");

    console::step(1, STEPS, "Checking current setup status");
    let status = auth_status(config);
    if status.authenticated {
        console::success("Already authenticated!");
        if !console::confirm("\nDo you want to re-authenticate?")? {
            println!("Setup wizard cancelled.");
            return Ok(());
        }
        if TokenStore::new(&config.token_file).delete()? {
            console::info("Deleted existing token");
        }
    }
    console::rule(WIDTH);

    console::step(2, STEPS, "Google Cloud Console Setup");
    println!("\nYou need to create OAuth 2.0 credentials in Google Cloud Console.");
    println!("Please complete these steps:");
    println!("\n  1. Create or select a project");
    println!("  2. Enable the Gmail API");
    println!("  3. Create OAuth 2.0 credentials (Desktop app)");
    println!("  4. Download the credentials file");
    console::prompt("\nPress Enter to open Google Cloud Console in your browser...")?;
    for (url, description) in CONSOLE_PAGES {
        console::info(&format!("Opening: {description}"));
        open_in_browser(url);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    console::rule(WIDTH);

    console::step(3, STEPS, "Detailed Instructions");
    print_instructions(config);
    console::rule(WIDTH);

    console::step(4, STEPS, "Waiting for credentials file");
    let creds = &config.credentials_file;
    println!("\nPlease save your downloaded credentials as: {}", creds.display().to_string().bold());
    loop {
        if creds.exists() {
            console::success(&format!("Found {}!", creds.display()));
            break;
        }
        let answer = console::prompt("\nFile saved? Press Enter to check (or 'q' to quit): ")?;
        if answer.eq_ignore_ascii_case("q") {
            console::warning("Setup wizard cancelled");
            return Ok(());
        }
    }
    console::rule(WIDTH);

    console::step(5, STEPS, "Validating credentials file");
    if let Err(e) = validate_credentials(creds) {
        console::error(&format!("Validation failed: {e}"));
        println!("\nPlease check:");
        println!("  1. You downloaded the correct file (OAuth 2.0 Desktop App credentials)");
        println!("  2. The file is named exactly '{}'", creds.display());
        println!("  3. The file is in the expected directory");
        return Ok(());
    }
    console::success("Credentials file is valid!");
    console::rule(WIDTH);

    console::step(6, STEPS, "Testing authentication");
    console::info("A browser window will open asking you to sign in and grant permissions.");
    console::info("Please sign in with the Google account you want to extract emails from.");
    console::prompt("\nPress Enter to start authentication...")?;

    match test_connection(config).await {
        Ok(email) => {
            console::success("Authentication successful!");
            console::success(&format!("Connected to Gmail account: {email}"));
        }
        Err(e) => {
            warn!(error = %e, "Setup authentication test failed");
            console::error(&format!("Authentication failed: {e}"));
            println!("\nTroubleshooting:");
            println!("  1. Make sure you granted all requested permissions");
            println!("  2. Try running the setup wizard again");
            println!("  3. Check that Gmail API is enabled in your project");
            return Ok(());
        }
    }

    println!("\n{}", "=".repeat(WIDTH));
    println!("{}", "Setup Complete!".green().bold());
    println!("{}", "=".repeat(WIDTH));
    println!("\nYou're all set! Next steps:");
    println!(
        "  1. Run {} to create {}",
        "gmail-extractor init".bold(),
        config.addresses_file.display()
    );
    println!("  2. Add email addresses to extract");
    println!("  3. Run {} (add --attachments to download them)", "gmail-extractor extract".bold());
    println!();
    Ok(())
}

/// Authorize and ask Gmail who we are.
async fn test_connection(config: &AppConfig) -> Result<String> {
    let token = authorize(config).await?;
    let profile = GmailClient::new(token.access_token).get_profile().await?;
    info!(email = %profile.email_address, "Connected to Gmail");
    Ok(profile.email_address)
}

fn print_instructions(config: &AppConfig) {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string());
    println!("\n{}\n", "In the Google Cloud Console:".bold());
    println!("{}", "A. Create a Project (if you don't have one):".cyan());
    println!("   - Click \"Create Project\"");
    println!("   - Enter a project name (e.g., \"Gmail Extractor\")");
    println!("   - Click \"Create\" and wait a few seconds\n");
    println!("{}", "B. Enable Gmail API:".cyan());
    println!("   - Make sure your project is selected (top left)");
    println!("   - Click the blue \"Enable\" button on the Gmail API page\n");
    println!("{}", "C. Create OAuth 2.0 Credentials:".cyan());
    println!("   - Go to the \"Credentials\" page");
    println!("   - Click \"Create Credentials\" → \"OAuth client ID\"");
    println!("   - If prompted to configure the consent screen:");
    println!("     * Choose \"Internal\" (Workspace) or \"External\" (personal Gmail)");
    println!("     * Fill in app name and your email, then \"Save and Continue\"");
    println!("   - Application type: {}", "\"Desktop app\"".bold());
    println!("   - Click \"Create\", then the download icon to download JSON\n");
    println!("{}", "D. Save the credentials file:".cyan());
    println!("   - Save the downloaded file as: {}", config.credentials_file.display().to_string().bold());
    println!("   - Working directory: {}", cwd.bold());
}
