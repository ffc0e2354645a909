use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets::NOTHING};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    println!("{data}");
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("No results found.");
        return;
    }
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(Cell::new).collect())
        .collect();
    render(headers, rows);
}

pub fn print_table_with_count(headers: &[&str], rows: Vec<Vec<String>>) {
    let count = rows.len();
    print_table(headers, rows);
    if count > 0 {
        let label = if count == 1 { "result" } else { "results" };
        println!("\x1b[2m{count} {label}\x1b[0m");
    }
}

/// Borderless table with a tight first column; trailing whitespace trimmed
/// so output stays pipe-friendly.
fn render(headers: &[&str], rows: Vec<Vec<Cell>>) {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    for row in rows {
        table.add_row(row);
    }
    if let Some(col) = table.column_mut(0) {
        col.set_padding((0, 1));
    }
    for line in table.to_string().lines() {
        println!("{}", line.trim_end());
    }
}
