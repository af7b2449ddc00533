use std::cmp::Ordering;

use tracing::trace;

use crate::record::{Column, Record, TRACKED_COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub key: Column,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            key: Column::Id,
            direction: SortDirection::Ascending,
        }
    }
}

impl SortConfig {
    /// Selecting the active key flips the direction, any other key starts ascending.
    pub fn toggled(self, column: Column) -> Self {
        if self.key == column {
            SortConfig {
                key: column,
                direction: self.direction.flipped(),
            }
        } else {
            SortConfig {
                key: column,
                direction: SortDirection::Ascending,
            }
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = self.key.compare(a, b);
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// Visibility flag per tracked column. Indexed by `Column::idx`, so the key set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnVisibility([bool; 4]);

impl Default for ColumnVisibility {
    fn default() -> Self {
        ColumnVisibility([true; 4])
    }
}

impl ColumnVisibility {
    pub fn is_visible(&self, column: Column) -> bool {
        self.0[column.idx()]
    }

    pub fn toggle(&mut self, column: Column) {
        self.0[column.idx()] = !self.0[column.idx()];
    }

    pub fn visible(&self) -> Vec<Column> {
        TRACKED_COLUMNS
            .iter()
            .copied()
            .filter(|c| self.is_visible(*c))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    ToggleColumn(Column),
    SetFilter(String),
    SortBy(Column),
    OpenDetail(Record),
    CloseDetail,
}

/// Presentation configuration of the table. Replaced as a whole on every intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub sort: SortConfig,
    pub filter: String,
    pub columns: ColumnVisibility,
    pub page_size: usize,
    pub selected: Option<Record>,
    pub dialog_open: bool,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        ViewState {
            sort: SortConfig::default(),
            filter: String::new(),
            columns: ColumnVisibility::default(),
            page_size,
            selected: None,
            dialog_open: false,
        }
    }

    pub fn reduce(&self, intent: Intent) -> ViewState {
        trace!("Reduce view with {intent:?}");
        let mut next = self.clone();
        match intent {
            Intent::ToggleColumn(column) => next.columns.toggle(column),
            Intent::SetFilter(filter) => next.filter = filter,
            Intent::SortBy(column) => next.sort = self.sort.toggled(column),
            Intent::OpenDetail(record) => {
                next.selected = Some(record);
                next.dialog_open = true;
            }
            // The selected record stays around, only the dialog goes away.
            Intent::CloseDetail => next.dialog_open = false,
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;

    #[test]
    fn sorting_the_active_key_flips_direction() {
        let view = ViewState::new(100);
        assert_eq!(view.sort.key, Column::Id);

        let view = view.reduce(Intent::SortBy(Column::Id));
        assert_eq!(view.sort.key, Column::Id);
        assert_eq!(view.sort.direction, SortDirection::Descending);

        let view = view.reduce(Intent::SortBy(Column::Id));
        assert_eq!(view.sort.direction, SortDirection::Ascending);
    }

    #[test]
    fn sorting_another_key_resets_to_ascending() {
        let view = ViewState::new(100)
            .reduce(Intent::SortBy(Column::Id))
            .reduce(Intent::SortBy(Column::LastName));
        assert_eq!(
            view.sort,
            SortConfig {
                key: Column::LastName,
                direction: SortDirection::Ascending
            }
        );
    }

    #[test]
    fn descending_reverses_the_comparator() {
        let a = record(1, "Zed", "A", "a@x");
        let b = record(2, "Amy", "B", "b@x");
        let asc = SortConfig {
            key: Column::FirstName,
            direction: SortDirection::Ascending,
        };
        let desc = asc.toggled(Column::FirstName);
        assert_eq!(asc.compare(&a, &b), Ordering::Greater);
        assert_eq!(desc.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn toggling_columns_keeps_the_key_set() {
        let view = ViewState::new(100)
            .reduce(Intent::ToggleColumn(Column::FirstName))
            .reduce(Intent::ToggleColumn(Column::Email));
        assert_eq!(view.columns.visible(), vec![Column::Id, Column::LastName]);

        let view = view.reduce(Intent::ToggleColumn(Column::Email));
        assert_eq!(
            view.columns.visible(),
            vec![Column::Id, Column::LastName, Column::Email]
        );
    }

    #[test]
    fn closing_the_dialog_keeps_the_selection() {
        let r = record(7, "Ann", "Lee", "ann@x");
        let view = ViewState::new(100).reduce(Intent::OpenDetail(r.clone()));
        assert!(view.dialog_open);
        assert_eq!(view.selected.as_ref(), Some(&r));

        let view = view.reduce(Intent::CloseDetail);
        assert!(!view.dialog_open);
        assert_eq!(view.selected, Some(r));
    }

    #[test]
    fn reduce_leaves_the_previous_state_untouched() {
        let before = ViewState::new(100);
        let after = before.reduce(Intent::SetFilter("smith".into()));
        assert_eq!(before.filter, "");
        assert_eq!(after.filter, "smith");
    }
}
