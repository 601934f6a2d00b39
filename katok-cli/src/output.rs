//! Output formatting.

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use katok::models::parse_timestamp;
use rust_i18n::t;
use serde::Serialize;

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table format
    Table,
    /// JSON format
    Json,
    /// Plain text format
    #[default]
    Plain,
}

/// Trait for plain text output.
pub trait PlainPrint {
    /// Print as plain text with formatting.
    fn plain_print(&self);
}

/// Trait for table row generation.
pub trait TableRow {
    /// Get table headers.
    fn headers() -> Vec<&'static str>;
    /// Get row data as strings.
    fn row(&self) -> Vec<String>;
}

/// Print items in plain text format.
pub fn print_plain<T: PlainPrint>(items: &[T]) {
    if items.is_empty() {
        println!("{}", t!("no_results"));
        return;
    }
    for item in items {
        item.plain_print();
    }
}

/// Print a single value: pretty JSON, or its plain rendering otherwise.
pub fn print_one<T: Serialize + PlainPrint>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Table | OutputFormat::Plain => item.plain_print(),
    }
}

/// Format a server timestamp for display.
pub fn format_time(raw: Option<&str>) -> String {
    match raw.and_then(parse_timestamp) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Format a relative time for display.
pub fn format_relative_time(at: Option<NaiveDateTime>) -> String {
    let Some(at) = at else {
        return "-".to_string();
    };

    let diff = (Local::now().naive_local() - at).num_seconds().max(0);

    if diff < 60 {
        t!("just_now").to_string()
    } else if diff < 3600 {
        t!("minutes_ago", n = diff / 60).to_string()
    } else if diff < 86400 {
        t!("hours_ago", n = diff / 3600).to_string()
    } else if diff < 604800 {
        t!("days_ago", n = diff / 86400).to_string()
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

/// Print a table of items with proper formatting for each output mode.
pub fn print_table<T: TableRow + Serialize + PlainPrint>(items: Vec<T>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default());
        }
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", t!("no_results"));
                return;
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(T::headers());
            for item in &items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            print_plain(&items);
        }
    }
}

/// Shorten text to `max` characters for table cells.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Some("2025-03-01T10:05:30")), "2025-03-01 10:05");
        assert_eq!(format_time(Some("garbage")), "-");
        assert_eq!(format_time(None), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("결혼식 초대합니다", 4), "결혼식…");
    }
}
