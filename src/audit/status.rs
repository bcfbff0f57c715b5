// dbkeeper/src/audit/status.rs
use crate::store::TextRow;

/// Column names of a `CHECK TABLE` / `REPAIR TABLE` result set.
pub const STATUS_COLUMNS: [&str; 3] = ["Table", "Msg_type", "Msg_text"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Status,
    Error,
    /// `info`, `note`, `warning`: carried but never change a verdict.
    Other(String),
}

impl MessageKind {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("status") {
            MessageKind::Status
        } else if raw.eq_ignore_ascii_case("error") {
            MessageKind::Error
        } else {
            MessageKind::Other(raw.to_ascii_lowercase())
        }
    }
}

/// One row of a check or repair result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatusRow {
    pub table: String,
    pub kind: MessageKind,
    pub text: String,
}

impl TableStatusRow {
    pub fn new(table: &str, kind: &str, text: &str) -> Self {
        Self {
            table: table.to_string(),
            kind: MessageKind::parse(kind),
            text: text.to_string(),
        }
    }

    /// Decodes a row fetched with [`STATUS_COLUMNS`]; NULL cells read as empty.
    pub fn from_text_row(row: TextRow) -> Self {
        let mut cells = row.into_iter().map(Option::unwrap_or_default);
        let table = cells.next().unwrap_or_default();
        let kind = cells.next().unwrap_or_default();
        let text = cells.next().unwrap_or_default();
        Self::new(&table, &kind, &text)
    }
}

/// Reduces check/repair rows to the tables that are still not OK.
///
/// Rows for one table are contiguous. Within a table, an `error` row marks it
/// bad and a `status` row decides outright: `OK` clears earlier errors, any
/// other status text marks it bad. The last deciding row wins.
pub fn reduce_status_rows<I>(rows: I) -> Vec<String>
where
    I: IntoIterator<Item = TableStatusRow>,
{
    let mut bad_tables = Vec::new();
    let mut current: Option<String> = None;
    let mut ok = true;

    for row in rows {
        if current.as_deref() != Some(row.table.as_str()) {
            if let Some(previous) = current.take() {
                if !ok {
                    bad_tables.push(previous);
                }
            }
            current = Some(row.table.clone());
            ok = true;
        }

        match row.kind {
            MessageKind::Status => ok = row.text.eq_ignore_ascii_case("ok"),
            MessageKind::Error => ok = false,
            MessageKind::Other(_) => {}
        }
    }

    if let Some(last) = current {
        if !ok {
            bad_tables.push(last);
        }
    }
    bad_tables
}
