use rayon::prelude::*;

use crate::record::{Column, Record, TRACKED_COLUMNS};
use crate::view::{SortConfig, ViewState};

/// The rows and columns of a page that are currently rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<Column>,
    pub rows: Vec<usize>, // Index into the page records, in display order
}

// Stable, equal keys keep their fetch order
pub fn sort_records(records: &mut [Record], sort: SortConfig) {
    records.sort_by(|a, b| sort.compare(a, b));
}

/// True if any tracked column, visible or not, contains `filter`.
pub fn matches_filter(record: &Record, filter: &str) -> bool {
    TRACKED_COLUMNS
        .iter()
        .any(|c| c.value(record).contains(filter))
}

pub fn filter_rows(records: &[Record], filter: &str) -> Vec<usize> {
    if filter.is_empty() {
        return (0..records.len()).collect();
    }
    records
        .par_iter()
        .enumerate()
        .filter(|(_, r)| matches_filter(r, filter))
        .map(|(idx, _)| idx)
        .collect()
}

pub fn derive_rows(records: &[Record], view: &ViewState) -> RowSet {
    RowSet {
        columns: view.columns.visible(),
        rows: filter_rows(records, &view.filter),
    }
}

/// Cell values of one row for the given columns.
pub fn row_cells(record: &Record, columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.value(record)).collect()
}

pub fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.chars().any(|c| c == '"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

pub fn row_as_csv(record: &Record, columns: &[Column]) -> String {
    row_cells(record, columns)
        .iter()
        .map(|c| wrap_cell_content(c))
        .collect::<Vec<String>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::{FIXTURE, record};
    use crate::view::{Intent, SortDirection};

    fn fixture() -> Vec<Record> {
        serde_json::from_str(FIXTURE).unwrap()
    }

    fn ids(records: &[Record], rows: &[usize]) -> Vec<u64> {
        rows.iter().map(|&i| records[i].id).collect()
    }

    #[test]
    fn sorts_by_id_numerically() {
        let mut records = fixture();
        sort_records(&mut records, SortConfig::default());
        let sorted: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(sorted, vec![17, 812, 3056, 4721, 9930]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut records = vec![
            record(1, "Bo", "Ng", "1@x"),
            record(2, "Al", "Ng", "2@x"),
            record(3, "Cy", "Ng", "3@x"),
            record(4, "Di", "Ab", "4@x"),
        ];
        let by_last = SortConfig {
            key: Column::LastName,
            direction: SortDirection::Ascending,
        };
        sort_records(&mut records, by_last);
        let order: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![4, 1, 2, 3]);

        sort_records(&mut records, by_last.toggled(Column::LastName));
        let order: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn sorted_rows_are_totally_ordered() {
        let mut records = fixture();
        let sort = SortConfig {
            key: Column::Email,
            direction: SortDirection::Descending,
        };
        sort_records(&mut records, sort);
        assert!(records.windows(2).all(|w| sort.compare(&w[0], &w[1]).is_le()));
    }

    #[test]
    fn empty_filter_keeps_every_row_in_order() {
        let records = fixture();
        assert_eq!(filter_rows(&records, ""), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn filter_is_case_sensitive_substring_over_all_tracked_columns() {
        let records = fixture();
        // last_name "Smith" does not contain lowercase "smith", its email does
        let rows = filter_rows(&records, "smith");
        assert_eq!(ids(&records, &rows), vec![4721, 3056]);

        let rows = filter_rows(&records, "Smith");
        assert_eq!(ids(&records, &rows), vec![4721, 9930]);

        // id is matched on its decimal representation
        let rows = filter_rows(&records, "30");
        assert_eq!(ids(&records, &rows), vec![9930, 3056]);
    }

    #[test]
    fn hidden_columns_still_take_part_in_filtering() {
        let records = fixture();
        let view = ViewState::new(100)
            .reduce(Intent::ToggleColumn(Column::FirstName))
            .reduce(Intent::ToggleColumn(Column::Email))
            .reduce(Intent::SetFilter("smith".into()));

        let hidden = derive_rows(&records, &view);
        assert_eq!(hidden.columns, vec![Column::Id, Column::LastName]);

        let unhidden = ViewState::new(100).reduce(Intent::SetFilter("smith".into()));
        let shown = derive_rows(&records, &unhidden);
        assert_eq!(hidden.rows, shown.rows);
        assert_eq!(ids(&records, &hidden.rows), vec![4721, 3056]);
    }

    #[test]
    fn row_cells_follow_visible_columns() {
        let r = record(5, "Ann", "Lee", "ann@x");
        assert_eq!(
            row_cells(&r, &[Column::Email, Column::Id]),
            vec!["ann@x".to_string(), "5".to_string()]
        );
    }

    #[test]
    fn csv_rows_quote_when_needed() {
        let r = record(5, "Ann Marie", "O\"Lee", "ann@x");
        assert_eq!(
            row_as_csv(&r, &[Column::Id, Column::FirstName, Column::LastName]),
            "5,\"Ann Marie\",\"O\"\"Lee\""
        );
    }
}
