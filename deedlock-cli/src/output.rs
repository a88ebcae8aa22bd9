//! Terminal output formatting.

use colored::Colorize;
use deedlock_core::Amount;
use deedlock_escrow::EscrowEvent;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print a warning message.
pub fn warn(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print a header.
pub fn header(msg: &str) {
    println!("\n{}", msg.white().bold());
    println!("{}", "─".repeat(msg.len()).dimmed());
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).dimmed(), value);
}

/// Render an amount in whole tokens, falling back to raw units.
pub fn tokens(amount: Amount) -> String {
    match amount.to_tokens() {
        Ok(value) => format!("{} tokens", value),
        Err(_) => format!("{} units", amount),
    }
}

/// Print one event log entry.
pub fn event(event: &EscrowEvent) {
    let token = event
        .kind
        .token_id()
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "  {:>3} {:<20} {:<4} {}",
        event.id.to_string().dimmed(),
        event.kind.name().cyan(),
        token,
        event.emitter.to_string().dimmed()
    );
}
