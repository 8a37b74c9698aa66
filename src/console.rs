//! Console output shared by the samples.

use std::fmt::Display;

const RULE_WIDTH: usize = 60;

/// Banner lines for a sample, without printing them
pub fn banner(title: &str) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    vec![
        rule.clone(),
        format!(" Google API Samples (Rust) v{}", env!("CARGO_PKG_VERSION")),
        format!(" {}", title),
        rule,
    ]
}

pub fn display_header(title: &str) {
    for line in banner(title) {
        println!("{}", line);
    }
    println!();
}

/// "What is happening now" line
pub fn write_action(message: impl Display) {
    println!("📡 {}", message);
}

/// Format a labelled result the way [`write_result`] prints it
pub fn format_result(label: impl Display, value: impl Display) -> String {
    format!("   {}: {}", label, value)
}

pub fn write_result(label: impl Display, value: impl Display) {
    println!("{}", format_result(label, value));
}

pub fn write_error(message: impl Display) {
    eprintln!("❌ {}", message);
}

pub fn write_success(message: impl Display) {
    println!("✅ {}", message);
}
