//! User-facing terminal output and prompts.
//!
//! Diagnostics go through `tracing`; this is what the user is meant to read.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;

pub fn success(msg: &str) {
    println!("{}", format!("✓ {msg}").green());
}

pub fn error(msg: &str) {
    eprintln!("{}", format!("✗ {msg}").red());
}

pub fn warning(msg: &str) {
    println!("{}", format!("⚠ {msg}").yellow());
}

pub fn info(msg: &str) {
    println!("{}", format!("ℹ {msg}").cyan());
}

pub fn step(current: u8, total: u8, msg: &str) {
    println!("{} {msg}", format!("[Step {current}/{total}]").bold());
}

pub fn banner(title: &str, width: usize) {
    let rule = "=".repeat(width);
    println!("{rule}");
    println!("{}", title.to_string().bold().magenta());
    println!("{rule}");
}

pub fn rule(width: usize) {
    println!("\n{}\n", "-".repeat(width));
}

/// Print `question` and read one trimmed line from stdin. Closed stdin is an
/// `UnexpectedEof` error, never an empty answer.
pub fn prompt(question: &str) -> io::Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    read_answer(&mut io::stdin().lock())
}

/// `(y/n)` question; only `y`/`Y` counts as yes.
pub fn confirm(question: &str) -> io::Result<bool> {
    Ok(is_yes(&prompt(&format!("{question} (y/n): "))?))
}

pub fn read_answer(input: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed while waiting for an answer",
        ));
    }
    Ok(line.trim().to_string())
}

pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
