use crate::addresses::{count_addresses, load_addresses, write_sample};
use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::console;
use crate::credentials::validate_credentials;
use crate::extract::{ExtractionSummary, Extractor, CSV_FILE};
use crate::gmail::GmailClient;
use crate::oauth::{auth_status, authorize, TokenStore};
use crate::onboarding;
use anyhow::Result;
use crossterm::style::Stylize;
use std::path::PathBuf;
use tracing::info;

const WIDTH: usize = 60;

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load();
    info!(?config, "Resolved file locations");

    match cli.command.unwrap_or(Command::Menu) {
        Command::Setup => onboarding::setup_wizard(&config).await,
        Command::Init { force } => init_addresses(&config, force),
        Command::Validate => {
            validate_setup(&config)?;
            Ok(())
        }
        Command::Extract {
            attachments,
            addresses,
            output,
        } => {
            let config = with_overrides(config, addresses, output);
            extract(&config, attachments).await
        }
        Command::Reset { all } => reset_authentication(&config, all),
        Command::Menu => menu(&config).await,
    }
}

fn with_overrides(mut config: AppConfig, addresses: Option<PathBuf>, output: Option<PathBuf>) -> AppConfig {
    if let Some(path) = addresses {
        config.addresses_file = path;
    }
    if let Some(dir) = output {
        config.output_dir = dir;
    }
    config
}

async fn menu(config: &AppConfig) -> Result<()> {
    console::banner("Gmail Email Extractor CLI", WIDTH);
    println!("\nWhat would you like to do?\n");
    let entries = [
        "Setup wizard (configure Gmail API)",
        "Initialize (create email_addresses.txt)",
        "Validate setup",
        "Extract emails (metadata only)",
        "Extract emails (with attachments)",
        "Reset authentication",
        "Exit",
    ];
    for (i, entry) in entries.iter().enumerate() {
        println!("{} {entry}", format!("{}.", i + 1).cyan());
    }

    let choice = console::prompt(&format!("\n{} ", "Enter choice (1-7):".bold()))?;
    match choice.as_str() {
        "1" => onboarding::setup_wizard(config).await,
        "2" => init_addresses(config, false),
        "3" => {
            validate_setup(config)?;
            Ok(())
        }
        "4" => extract(config, false).await,
        "5" => extract(config, true).await,
        "6" => reset_authentication(config, false),
        "7" => {
            println!("\nGoodbye!");
            Ok(())
        }
        _ => {
            console::error("Invalid choice. Please run again and choose 1-7.");
            Ok(())
        }
    }
}

pub fn init_addresses(config: &AppConfig, force: bool) -> Result<()> {
    let path = &config.addresses_file;
    let mut overwrite = force;
    if path.exists() && !force {
        println!("{} already exists.", path.display());
        overwrite = console::confirm("Do you want to overwrite it?")?;
        if !overwrite {
            println!("Cancelled.");
            return Ok(());
        }
    }
    write_sample(path, overwrite)?;
    console::success(&format!("Created {}", path.display()));
    console::info("Please edit this file and add the email addresses you want to extract.");
    Ok(())
}

/// Overall verdict of `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NeedsLogin,
    Incomplete,
}

pub fn validate_setup(config: &AppConfig) -> Result<Readiness> {
    console::banner("Gmail Email Extractor - Setup Validation", WIDTH);
    println!("\nChecking setup status...\n");
    let status = auth_status(config);

    print!("1. {}: ", config.credentials_file.display());
    if status.credentials_valid {
        console::success("Found and valid");
    } else if status.has_credentials {
        console::warning("Found but invalid");
        if let Err(e) = validate_credentials(&config.credentials_file) {
            println!("   Error: {e}");
        }
    } else {
        console::error("Not found");
    }

    print!("2. {}: ", config.token_file.display());
    if status.token_valid {
        console::success("Found and valid");
    } else if status.has_token {
        console::warning("Found but expired/invalid");
    } else {
        console::info("Not found (will be created on first auth)");
    }

    print!("3. {}: ", config.addresses_file.display());
    match count_addresses(&config.addresses_file)? {
        Some(0) => console::warning("Found but empty"),
        Some(n) => console::success(&format!("Found with {n} address(es)")),
        None => console::error("Not found"),
    }

    let readiness = if status.authenticated {
        Readiness::Ready
    } else if status.credentials_valid {
        Readiness::NeedsLogin
    } else {
        Readiness::Incomplete
    };

    println!("\n{}", "-".repeat(WIDTH));
    match readiness {
        Readiness::Ready => {
            console::success("Ready to extract emails!");
            println!("\nRun: {}", "gmail-extractor extract".bold());
        }
        Readiness::NeedsLogin => {
            console::warning("Credentials configured, but not authenticated yet");
            println!("\nRun: {}", "gmail-extractor extract".bold());
            println!("(You'll be prompted to authenticate)");
        }
        Readiness::Incomplete => {
            console::error("Setup incomplete");
            println!("\nRun: {}", "gmail-extractor setup".bold());
        }
    }
    println!();
    Ok(readiness)
}

pub fn reset_authentication(config: &AppConfig, all: bool) -> Result<()> {
    let token_file = &config.token_file;
    if TokenStore::new(token_file).delete()? {
        console::success(&format!("Deleted {}", token_file.display()));
        console::info("You'll need to re-authenticate on next run");
    } else {
        console::info(&format!("{} doesn't exist - nothing to reset", token_file.display()));
    }

    let creds = &config.credentials_file;
    let delete_creds = all || console::confirm(&format!("\nDo you also want to delete {}?", creds.display()))?;
    if delete_creds {
        if creds.exists() {
            std::fs::remove_file(creds)?;
            console::success(&format!("Deleted {}", creds.display()));
        } else {
            console::info(&format!("{} doesn't exist", creds.display()));
        }
    }
    Ok(())
}

async fn extract(config: &AppConfig, download_attachments: bool) -> Result<()> {
    console::banner(
        if download_attachments {
            "Gmail Email Extractor (With Attachments)"
        } else {
            "Gmail Email Extractor"
        },
        WIDTH,
    );

    let token = authorize(config).await?;
    console::success("Successfully connected to Gmail API");

    let addresses = load_addresses(&config.addresses_file)?;
    console::success(&format!("Loaded {} unique email address(es):", addresses.len()));
    for address in &addresses {
        println!("  - {address}");
    }

    let extractor = Extractor::new(GmailClient::new(token.access_token), &config.output_dir)
        .with_attachments(download_attachments);
    let summaries = extractor.run(&addresses).await?;
    for summary in &summaries {
        report(summary, download_attachments);
    }

    println!("\n{}", "=".repeat(WIDTH));
    println!("Extraction complete!");
    println!("All emails saved to: {}/", config.output_dir.display());
    if download_attachments {
        println!("Attachments were downloaded and saved");
    }
    println!("{}", "=".repeat(WIDTH));
    Ok(())
}

fn report(summary: &ExtractionSummary, download_attachments: bool) {
    println!("\n{}", summary.address.clone().bold());
    if let Some(err) = &summary.error {
        console::error(&format!("An error occurred: {err}"));
        if let Some(dir) = &summary.output_dir {
            console::warning(&format!(
                "Partially extracted {} of {} email(s) to: {}",
                summary.exported,
                summary.found,
                dir.display()
            ));
        }
        return;
    }
    match &summary.output_dir {
        None if summary.found == 0 => println!("No emails found for {}", summary.address),
        None => console::warning(&format!(
            "Found {} email(s) but none could be extracted",
            summary.found
        )),
        Some(dir) => {
            console::success(&format!(
                "Extracted {} of {} email(s) to: {}",
                summary.exported,
                summary.found,
                dir.display()
            ));
            println!("  - CSV file: {}", dir.join(CSV_FILE).display());
            println!("  - HTML files: {}", summary.exported);
            if download_attachments {
                println!("  - Attachments: {}", summary.attachments);
            }
            if summary.skipped > 0 {
                console::warning(&format!("Skipped {} email(s); see log for details", summary.skipped));
            }
        }
    }
}
