//! Text summary builder for CLI output.
//!
//! Formats the filtered listing as an aligned table, preceded by the status tallies.

use crate::entity::EntityKind;
use crate::model::{GroupingKey, Record};
use crate::status::PrintStatus;
use crate::table::TableView;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const MAX_CELL: usize = 40;

fn clip(s: &str) -> String {
    if s.chars().count() > MAX_CELL {
        let head: String = s.chars().take(MAX_CELL - 1).collect();
        format!("{head}…")
    } else {
        s.to_string()
    }
}

/// Build a text summary of `rows` as seen through `view`.
pub(crate) fn build_text_summary(
    entity: EntityKind,
    grouping: Option<&GroupingKey>,
    view: &TableView<Record>,
    rows: &[Record],
) -> TextSummary {
    let mut lines = Vec::new();

    match grouping {
        Some(g) => lines.push(format!("{} (event {g})", entity.title())),
        None => lines.push(entity.title().to_string()),
    }
    if let Some(counts) = view.status_counts(rows) {
        let parts: Vec<String> = counts
            .iter()
            .map(|(status, n)| format!("{status}: {n}"))
            .collect();
        lines.push(parts.join(" | "));
    }
    if let Some(field) = entity.print_status_field() {
        let printed = rows
            .iter()
            .filter(|r| PrintStatus::from_wire(r.get_str(field)) == PrintStatus::Printed)
            .count();
        lines.push(format!(
            "Printed: {printed} | Unprinted: {}",
            rows.len() - printed
        ));
    }
    if let Some(status) = view.status_filter() {
        lines.push(format!("Filter: {status}"));
    }
    lines.push(String::new());

    let projection = view.project(rows);
    let columns = view.visible_columns();
    let cells: Vec<Vec<String>> = projection
        .rows
        .iter()
        .map(|r| columns.iter().map(|c| clip(&r.text(c.id))).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    lines.push(render(columns.iter().map(|c| c.header).collect()));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    if cells.is_empty() {
        lines.push("No results.".into());
    }
    for row in &cells {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} of {} row(s)",
        projection.total_filtered,
        rows.len()
    ));

    TextSummary { lines }
}
