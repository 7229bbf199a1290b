//! Markdown rendering of result rows.

use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Longest cell text kept in a rendered table; longer values are cut.
const MAX_CELL_CHARS: usize = 400;

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Cell text safe to place inside a markdown table.
fn cell(value: &JsonValue) -> String {
    let text = format_value(value);
    let mut text: String = text
        .replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.chars().count() > MAX_CELL_CHARS {
        text = text.chars().take(MAX_CELL_CHARS).collect::<String>() + "...";
    }
    text
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

/// Render rows as a markdown table with a leading 1-based row index.
pub fn format_as_markdown(
    columns: &[String],
    rows: &[serde_json::Map<String, JsonValue>],
) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| cell(row.get(col).unwrap_or(&JsonValue::Null)))
                .collect()
        })
        .collect();

    let index_width = rows.len().to_string().len().max(1);
    let mut widths: Vec<usize> = columns.iter().map(|c| c.width().max(3)).collect();
    for row in &cells {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.width());
        }
    }

    let mut output = String::new();

    output.push_str(&format!("| {} ", pad("", index_width)));
    for (col, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(col, *w)));
    }
    output.push_str("|\n");

    output.push_str(&format!("|{}", "-".repeat(index_width + 2)));
    for w in &widths {
        output.push_str(&format!("|{}", "-".repeat(w + 2)));
    }
    output.push_str("|\n");

    for (n, row) in cells.iter().enumerate() {
        output.push_str(&format!("| {} ", pad(&(n + 1).to_string(), index_width)));
        for (value, w) in row.iter().zip(&widths) {
            output.push_str(&format!("| {} ", pad(value, *w)));
        }
        output.push_str("|\n");
    }

    output
}
