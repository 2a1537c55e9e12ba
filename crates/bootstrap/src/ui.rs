//! UI helpers for the bootstrap CLI.
//!
//! Provides consistent formatting for console output during a bootstrap run.
//! Every line that reports remote state carries a timestamp so an operator can
//! tell "still waiting" from "stuck".

use std::time::Duration;

use colored::Colorize;

/// Local wall-clock timestamp for progress lines.
fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Print the banner.
pub fn print_banner() {
    println!();
    println!(
        "{}",
        "  ollama · eks · konnect: private inference bootstrap".cyan().bold()
    );
    println!(
        "  {}",
        "GPU model server → Istio gateway → Transit Gateway → Konnect".bright_black()
    );
    println!();
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print a progress step with step number.
pub fn print_progress_step(current: u8, total: u8, message: &str) {
    println!(
        "{} {} {} {}",
        stamp().bright_black(),
        format!("[{current}/{total}]").bright_black(),
        "▶".cyan(),
        message.bold()
    );
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!(
        "{} {} {}",
        stamp().bright_black(),
        "✓".green().bold(),
        message.green()
    );
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!(
        "{} {} {}",
        stamp().bright_black(),
        "⚠".yellow().bold(),
        message.yellow()
    );
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!(
        "{} {} {}",
        stamp().bright_black(),
        "✗".red().bold(),
        message.red()
    );
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {} {}", stamp().bright_black(), "ℹ".blue().bold(), message);
}

/// Print one poll observation.
pub fn print_poll_progress(what: &str, elapsed: Duration, observed: &str) {
    println!(
        "{} {} {} {} {}",
        stamp().bright_black(),
        "⟳".cyan(),
        what,
        format!("[{}s]", elapsed.as_secs()).bright_black(),
        observed.yellow()
    );
}

/// Print a key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Print a command the operator should run.
pub fn print_command(command: &str) {
    println!("    {} {}", "$".bright_black(), command.bold());
}

/// Print a list item.
pub fn print_list_item(item: &str) {
    println!("  {} {item}", "•".bright_black());
}
