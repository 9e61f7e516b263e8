//! The shape every report renders to.

use serde::Serialize;

/// A titled table of preformatted cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Label/value pairs shown under the table.
    pub summary: Vec<(String, String)>,
}

impl ReportTable {
    pub fn new<I, H>(title: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<String>,
    {
        Self {
            title: title.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            summary: Vec::new(),
        }
    }

    /// Appends a row. Short rows are padded with empty cells.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() < self.headers.len() {
            row.resize(self.headers.len(), String::new());
        }
        self.rows.push(row);
    }

    pub fn push_summary(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.summary.push((label.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Formats a quantity or amount with two decimals.
pub(crate) fn amount(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_are_padded() {
        let mut table = ReportTable::new("Test", ["a", "b", "c"]);
        table.push_row(vec!["1".to_string()]);
        assert_eq!(table.rows[0], vec!["1", "", ""]);
    }

    #[test]
    fn amounts_have_two_decimals() {
        assert_eq!(amount(3.0), "3.00");
        assert_eq!(amount(1234.567), "1234.57");
    }
}
