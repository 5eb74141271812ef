//! Shared helper functions for CLI commands
//!
//! Parsing, prompting and formatting used across command modules.

use chrono::NaiveDate;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use miette::{IntoDiagnostic, Result};

/// Parse a date given as `YYYY-MM-DD` or the Brazilian `DD/MM/YYYY`
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .map_err(|_| format!("invalid date '{}': use YYYY-MM-DD or DD/MM/YYYY", s))
}

/// Parse a look-ahead window in days, bounded to a century
pub fn parse_days(s: &str) -> Result<i64, String> {
    let days: i64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of days '{}'", s))?;
    if !(0..=crate::core::maintenance::MAX_DAYS).contains(&days) {
        return Err(format!(
            "days must be between 0 and {}",
            crate::core::maintenance::MAX_DAYS
        ));
    }
    Ok(days)
}

/// Format an optional date, `-` when absent
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format an optional value, `-` when absent
pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Human description of days left until a due date
pub fn describe_days(days: Option<i64>) -> String {
    match days {
        None => "-".to_string(),
        Some(0) => "today".to_string(),
        Some(d) if d < 0 => format!("{} day(s) overdue", -d),
        Some(d) => format!("in {} day(s)", d),
    }
}

fn interactive() -> bool {
    Term::stderr().is_term()
}

/// Password from the command line (or `NR13_PASSWORD`, via clap), otherwise prompted
pub fn resolve_password(given: Option<String>, prompt: &str, confirm: bool) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if !interactive() {
        return Err(miette::miette!(
            help = "Pass --password or set NR13_PASSWORD",
            "A password is required and no terminal is available to prompt for it"
        ));
    }

    let theme = ColorfulTheme::default();
    let mut input = Password::with_theme(&theme).with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    input.interact().into_diagnostic()
}

/// Ask before a destructive action; `--yes` skips the question
pub fn confirm_action(yes: bool, prompt: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !interactive() {
        return Err(miette::miette!(
            help = "Re-run with --yes to confirm",
            "Refusing to continue without confirmation"
        ));
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(parse_date("2025-03-01").unwrap(), expected);
        assert_eq!(parse_date("01/03/2025").unwrap(), expected);
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("amanha").is_err());
    }

    #[test]
    fn test_parse_days_bounds() {
        assert_eq!(parse_days("30").unwrap(), 30);
        assert_eq!(parse_days("0").unwrap(), 0);
        assert!(parse_days("-1").is_err());
        assert!(parse_days("100000000").is_err());
        assert!(parse_days("soon").is_err());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("inspeção", 8), "inspeção");
    }

    #[test]
    fn test_describe_days() {
        assert_eq!(describe_days(Some(-3)), "3 day(s) overdue");
        assert_eq!(describe_days(Some(0)), "today");
        assert_eq!(describe_days(Some(12)), "in 12 day(s)");
        assert_eq!(describe_days(None), "-");
    }
}
