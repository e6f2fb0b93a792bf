//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::collections::BTreeMap;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Split a bcrypt hash like `$2b$12$...` into its version and cost
pub fn describe_hash(hash: &str) -> Option<(&str, u32)> {
    let mut parts = hash.split('$');
    if !parts.next()?.is_empty() {
        return None;
    }
    let version = parts.next()?;
    let cost = parts.next()?.parse().ok()?;
    parts.next()?;
    version.starts_with('2').then_some((version, cost))
}

/// Print a table of configured users, returning how many have an unusable hash
pub fn print_user_table(users: &BTreeMap<String, String>) -> usize {
    if users.is_empty() {
        info("No users configured. Add one under [users] with 'gatehouse hash-password'");
        return 0;
    }

    let mut invalid = 0;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("User").fg(Color::Cyan),
            Cell::new("Scheme").fg(Color::Cyan),
            Cell::new("Cost").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
        ]);

    for (username, hash) in users {
        let row = match describe_hash(hash) {
            Some((version, cost)) => vec![
                Cell::new(username),
                Cell::new(format!("bcrypt ${}$", version)),
                Cell::new(cost),
                Cell::new("ok").fg(Color::Green),
            ],
            None => {
                invalid += 1;
                vec![
                    Cell::new(username),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("invalid hash").fg(Color::Red),
                ]
            }
        };
        table.add_row(row);
    }

    println!("{table}");
    invalid
}
