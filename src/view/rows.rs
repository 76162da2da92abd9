//! Rows of the selected table as a view model.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::fmt::{format_age, format_bool, format_datetime, format_features, format_value, truncate};
use crate::model::{RecordId, Row};
use crate::view::common::{RowStyleClass, TableViewModel, ViewCell, ViewRow};

/// Columns shown for device tables, in display order.
pub const DEVICE_COLUMNS: &[&str] = &[
    "hostname",
    "mac",
    "connected",
    "valid",
    "last_active_at",
    "features",
    "mark",
    "created_at",
];

const MIN_WIDTH: usize = 3;
const MAX_WIDTH: usize = 32;

/// Column names for `rows`.
///
/// Tables whose rows carry a hostname or MAC get the device layout followed
/// by any extra columns; other tables show their key and every column found.
pub fn columns_for(rows: &[Row]) -> Vec<String> {
    let device_layout = rows
        .iter()
        .any(|r| r.hostname.is_some() || r.mac.is_some());

    let mut columns: Vec<String> = if device_layout {
        DEVICE_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        let mut base = vec!["id".to_string()];
        if rows.iter().any(|r| r.mark.is_some()) {
            base.push("mark".to_string());
        }
        base
    };

    let extra: BTreeSet<&String> = rows
        .iter()
        .flat_map(|r| r.extra.keys())
        .filter(|k| !columns.iter().any(|c| c == *k))
        .collect();
    columns.extend(extra.into_iter().cloned());
    columns
}

/// Display cell for `column` of `row`.
pub fn format_cell(row: &Row, column: &str, now: DateTime<Utc>) -> ViewCell {
    match column {
        "id" => ViewCell::plain(row.id.key().to_string()),
        "connected" | "valid" => {
            let on = if column == "connected" {
                row.connected
            } else {
                row.valid
            };
            let class = if on {
                RowStyleClass::Good
            } else {
                RowStyleClass::Bad
            };
            ViewCell::styled(format_bool(on).to_string(), class)
        }
        "features" => ViewCell::plain(format_features(&row.features)),
        "created_at" => ViewCell::plain(
            row.field(column)
                .map(|v| format_datetime(&v))
                .unwrap_or_else(|| "-".to_string()),
        ),
        "last_active_at" => ViewCell::plain(
            row.field(column)
                .map(|v| format_age(&v, now))
                .unwrap_or_else(|| "-".to_string()),
        ),
        other => ViewCell::plain(
            row.field(other)
                .map(|v| format_value(&v))
                .unwrap_or_else(|| "-".to_string()),
        ),
    }
}

/// Builds the rows table.
///
/// `filter` keeps rows where any rendered cell contains it, ignoring case.
/// The first column shows the multi-select mark.
pub fn build_rows_view(
    table: &str,
    rows: &[Row],
    filter: Option<&str>,
    marked: &HashSet<RecordId>,
    now: DateTime<Utc>,
) -> TableViewModel<RecordId> {
    let columns = columns_for(rows);
    let needle = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);

    let mut view_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let cells: Vec<ViewCell> = columns.iter().map(|c| format_cell(row, c, now)).collect();
        if let Some(needle) = &needle
            && !cells.iter().any(|c| c.text.to_lowercase().contains(needle))
        {
            continue;
        }

        let mut all = Vec::with_capacity(cells.len() + 1);
        let is_marked = marked.contains(&row.id);
        all.push(ViewCell::plain(if is_marked { "●" } else { " " }.to_string()));
        all.extend(cells);

        let style = if row.connected {
            RowStyleClass::Active
        } else if row.mac.is_some() && !row.valid {
            RowStyleClass::Dimmed
        } else {
            RowStyleClass::Normal
        };
        view_rows.push(ViewRow {
            id: row.id.clone(),
            cells: all,
            style,
        });
    }

    let mut headers = vec![String::new()];
    headers.extend(columns.iter().map(|c| c.to_uppercase()));

    let mut widths = vec![1u16];
    for (i, header) in headers.iter().enumerate().skip(1) {
        let longest = view_rows
            .iter()
            .map(|r| r.cells[i].text.chars().count())
            .max()
            .unwrap_or(0)
            .max(header.chars().count());
        widths.push(longest.clamp(MIN_WIDTH, MAX_WIDTH) as u16);
    }
    for row in &mut view_rows {
        for (cell, width) in row.cells.iter_mut().zip(&widths).skip(1) {
            cell.text = truncate(&cell.text, *width as usize);
        }
    }

    let title = match &needle {
        Some(f) => format!(" {} [{}/{}] /{} ", table, view_rows.len(), rows.len(), f),
        None => format!(" {} [{}] ", table, rows.len()),
    };

    TableViewModel {
        title,
        headers,
        widths,
        rows: view_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn devices() -> Vec<Row> {
        vec![
            Row::from_json(
                "devices",
                json!({"id": "d1", "hostname": "Kitchen", "mac": "AA", "connected": true,
                    "valid": true, "features": ["USB", "Tidal"], "firmware": "1.2",
                    "last_active_at": "2025-03-01T11:58:00Z"}),
            )
            .unwrap(),
            Row::from_json(
                "devices",
                json!({"id": "d2", "hostname": "studio", "mac": "BB", "valid": false}),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_device_columns_then_extras() {
        let columns = columns_for(&devices());
        assert_eq!(&columns[..DEVICE_COLUMNS.len()], DEVICE_COLUMNS);
        assert_eq!(columns.last().map(String::as_str), Some("firmware"));
    }

    #[test]
    fn test_generic_table_columns() {
        let rows = vec![Row::from_json("ops", json!({"id": "a", "role": "x", "name": "n"})).unwrap()];
        assert_eq!(columns_for(&rows), vec!["id", "name", "role"]);
    }

    #[test]
    fn test_cells_and_styles() {
        let rows = devices();
        let vm = build_rows_view("devices", &rows, None, &HashSet::new(), now());
        assert_eq!(vm.rows.len(), 2);
        assert_eq!(vm.headers[1], "HOSTNAME");

        let first = &vm.rows[0];
        assert_eq!(first.style, RowStyleClass::Active);
        assert_eq!(first.cells[3].text, "✔");
        assert_eq!(first.cells[5].text, "2m ago");
        assert_eq!(first.cells[6].text, "Tidal, USB");
        assert_eq!(vm.rows[1].style, RowStyleClass::Dimmed);
    }

    #[test]
    fn test_filter_is_case_insensitive_over_cells() {
        let rows = devices();
        let vm = build_rows_view("devices", &rows, Some("kitch"), &HashSet::new(), now());
        assert_eq!(vm.rows.len(), 1);
        assert_eq!(vm.rows[0].id, RecordId::new("devices", "d1"));
        assert!(vm.title.contains("[1/2]"));

        let vm = build_rows_view("devices", &rows, Some("tidal"), &HashSet::new(), now());
        assert_eq!(vm.rows.len(), 1);

        let vm = build_rows_view("devices", &rows, Some("  "), &HashSet::new(), now());
        assert_eq!(vm.rows.len(), 2);
    }

    #[test]
    fn test_marked_rows_show_indicator() {
        let rows = devices();
        let marked = HashSet::from([RecordId::new("devices", "d2")]);
        let vm = build_rows_view("devices", &rows, None, &marked, now());
        assert_eq!(vm.rows[0].cells[0].text, " ");
        assert_eq!(vm.rows[1].cells[0].text, "●");
    }
}
