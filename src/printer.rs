/// Terminal rendering of check results
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::check::{OutcomeType, PrintableRecord, RunSummary};

fn status_color(status: OutcomeType) -> Color {
    match status {
        OutcomeType::Pass => Color::Green,
        OutcomeType::Fail => Color::Red,
        OutcomeType::Info => Color::Cyan,
        OutcomeType::Skip => Color::Yellow,
        OutcomeType::Unknown => Color::DarkGrey,
    }
}

/// Details column: diagnostics, then the error, then the suggestion
fn details(record: &PrintableRecord) -> String {
    let mut lines = Vec::new();
    if !record.diagnostics.is_empty() {
        lines.push(record.diagnostics.clone());
    }
    if let Some(error) = &record.error {
        lines.push(format!("Error: {:#}", error));
    }
    if let Some(suggestion) = &record.suggestion {
        lines.push(format!("Suggestion: {}", suggestion));
    }
    lines.join("\n")
}

pub fn results_table(records: &[PrintableRecord]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Check").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Details").fg(Color::Cyan),
    ]);

    for (index, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&record.description),
            Cell::new(record.status.as_str()).fg(status_color(record.status)),
            Cell::new(details(record)),
        ]);
    }

    table
}

pub fn summary_line(summary: &RunSummary) -> String {
    let text = format!("{} checks run, {} failed", summary.total, summary.failed);
    if summary.has_failures() {
        text.red().bold().to_string()
    } else {
        text.green().to_string()
    }
}

/// Print the table and summary for a finished run
pub fn print_results(records: &[PrintableRecord]) {
    let summary = RunSummary::from_records(records);
    println!("{}", results_table(records));
    println!("{}", summary_line(&summary));
}
