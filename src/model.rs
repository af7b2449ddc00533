use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::mem;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{HELP_TEXT, Message, RUVConfig, RUVError};
use crate::inputter::{InputResult, Inputter};
use crate::pager::{Advance, FetchRequest, Page, PageCache, Slot};
use crate::record::{Column, Record, TRACKED_COLUMNS};
use crate::source::FetchOutcome;
use crate::table::{RowSet, derive_rows, row_as_csv, row_cells, sort_records};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, CONTROLS_HEIGHT, STATUSLINE_HEIGHT, TABLE_BORDER_HEIGHT,
    TABLE_HEADER_HEIGHT,
};
use crate::view::{Intent, ViewState};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    DETAIL,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize, // Rows passing the filter on the current page
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub columns: Vec<(String, bool)>,
    pub filter: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub total_records: usize,
    pub loading: bool,
    pub next_page_ready: bool,
    pub error: Option<String>,
    pub dialog: Option<Vec<(String, String)>>,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            columns: Vec::new(),
            filter: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            page_index: 0,
            page_count: 0,
            page_size: 0,
            total_records: 0,
            loading: true,
            next_page_ready: false,
            error: None,
            dialog: None,
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height
            .saturating_sub(CONTROLS_HEIGHT)
            .saturating_sub(STATUSLINE_HEIGHT)
            .saturating_sub(TABLE_HEADER_HEIGHT)
            .saturating_sub(TABLE_BORDER_HEIGHT)
            .max(1);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: RUVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    pager: PageCache,
    view: ViewState,
    rowset: RowSet,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    active_cmdinput: bool,
    requests: Vec<FetchRequest>,
    status_message: String,
}

impl Model {
    pub fn init(config: &RUVConfig, ui_width: usize, ui_height: usize) -> Result<Self, RUVError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            pager: PageCache::new(config.total_records, config.batch_size),
            view: ViewState::new(config.batch_size),
            rowset: RowSet::default(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            requests: Vec::new(),
            status_message: String::new(),
        };
        if let Some(request) = model.pager.start() {
            model.requests.push(request);
        }
        model.set_status_message("Loading ...");
        model.update_table_data();
        Ok(model)
    }

    /// Fetches the pager asked for since the last call. `main` hands them to the fetcher.
    pub fn take_fetch_requests(&mut self) -> Vec<FetchRequest> {
        mem::take(&mut self.requests)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    #[cfg(test)]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn page_index(&self) -> usize {
        self.pager.page_index()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RUVError> {
        if let Some(msg) = message {
            // Fetch results and resizes are handled in every modus
            let msg = match msg {
                Message::Fetched(outcome) => return self.fetched(outcome),
                Message::Resize(width, height) => {
                    self.ui_resize(width, height);
                    return Ok(());
                }
                msg => msg,
            };
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::Sort => self.sort_current_column(),
                    Message::ToggleColumn(idx) => self.toggle_column(idx),
                    Message::Filter => self.enter_cmd_mode(),
                    Message::Enter => self.enter(),
                    Message::NextPage => self.next_page(),
                    Message::Retry => self.retry(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::DETAIL => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------- Page handling ---------------------- //

    fn fetched(&mut self, outcome: FetchOutcome) -> Result<(), RUVError> {
        let FetchOutcome { request, result } = outcome;
        let sort = self.view.sort;
        let page = result.map(|mut records| {
            // Every page is ordered with the sort that is active when it arrives
            sort_records(&mut records, sort);
            Page {
                index: request.page_index,
                records,
                sorted_by: sort,
            }
        });
        let failed = page.is_err();

        if let Some(follow_up) = self.pager.complete(request.ticket, page) {
            self.requests.push(follow_up);
        }

        if let Some(err) = self.pager.error().filter(|_| failed) {
            error!("Loading page {} failed: {err}", request.page_index);
            self.set_status_message(format!(
                "Loading page {} failed, press r to retry",
                request.page_index + 1
            ));
        } else if request.slot == Slot::Current {
            self.reset_curser();
            self.set_status_message(format!("Loaded page {}", request.page_index + 1));
        } else if self.pager.prefetched().map(|p| p.index) == Some(request.page_index) {
            self.set_status_message(format!("Page {} is ready", request.page_index + 1));
        }
        self.update_table_data();
        Ok(())
    }

    fn next_page(&mut self) {
        match self.pager.advance() {
            Advance::Committed { prefetch } => {
                if let Some(request) = prefetch {
                    self.requests.push(request);
                }
                let sort = self.view.sort;
                if let Some(page) = self.pager.current_mut()
                    && page.sorted_by != sort
                {
                    debug!("Re-sorting page {} with {:?}", page.index, sort);
                    sort_records(&mut page.records, sort);
                    page.sorted_by = sort;
                }
                self.reset_curser();
                self.set_status_message(format!("Page {}", self.pager.page_index() + 1));
            }
            Advance::Pending => {
                if self.pager.error().is_some() {
                    self.set_status_message("Next page failed to load, press r to retry");
                } else if self.pager.is_prefetching() {
                    self.set_status_message("Next page is still loading ...");
                }
            }
            Advance::AtEnd => self.set_status_message("Already on the last page"),
        }
        self.update_table_data();
    }

    fn retry(&mut self) {
        if let Some(request) = self.pager.retry() {
            info!("Retrying {:?} fetch for page {}", request.slot, request.page_index);
            self.requests.push(request);
            self.set_status_message("Retrying ...");
            self.update_table_data();
        }
    }

    // -------------------- View handling ---------------------- //

    fn apply(&mut self, intent: Intent) {
        self.view = self.view.reduce(intent);
    }

    fn sort_current_column(&mut self) {
        let Some(&column) = self.rowset.columns.get(self.curser_column) else {
            return;
        };
        self.apply(Intent::SortBy(column));
        let sort = self.view.sort;
        // Only the displayed page is re-sorted, a prefetched page is checked when it is shown
        if let Some(page) = self.pager.current_mut() {
            sort_records(&mut page.records, sort);
            page.sorted_by = sort;
        }
        self.set_status_message(format!(
            "Sorted by {} {}",
            sort.key.name(),
            sort.direction.arrow()
        ));
        self.update_table_data();
    }

    fn toggle_column(&mut self, idx: usize) {
        if let Some(column) = Column::from_idx(idx) {
            self.apply(Intent::ToggleColumn(column));
            self.update_table_data();
        }
    }

    fn selected_record(&self) -> Option<&Record> {
        let page = self.pager.current()?;
        let ridx = self.rowset.rows.get(self.offset_row + self.curser_row)?;
        page.records.get(*ridx)
    }

    fn enter(&mut self) {
        if let Some(record) = self.selected_record().cloned() {
            trace!("Open detail of record {}", record.id);
            self.apply(Intent::OpenDetail(record));
            self.previous_modus = self.modus;
            self.modus = Modus::DETAIL;
            self.update_uidata_for_table();
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::DETAIL => {
                self.apply(Intent::CloseDetail);
                self.previous_modus = Modus::DETAIL;
                self.modus = Modus::TABLE;
                self.update_uidata_for_table();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    // -------------------- Filter input ---------------------- //

    fn enter_cmd_mode(&mut self) {
        trace!("Entering filter mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.active_cmdinput = true;
        self.input.set(&self.view.filter);
        self.last_input = self.input.get();
        self.update_uidata_for_table();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.input != self.view.filter {
            self.apply(Intent::SetFilter(self.last_input.input.clone()));
            self.reset_curser();
        }
        if self.last_input.finished {
            trace!("Filter set to {:?}", self.view.filter);
            self.active_cmdinput = false;
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            self.set_status_message(format!("{} matching rows", self.rowset_len_after_filter()));
        }
        self.update_table_data();
    }

    fn rowset_len_after_filter(&self) -> usize {
        self.pager
            .current()
            .map(|p| derive_rows(&p.records, &self.view).rows.len())
            .unwrap_or(0)
    }

    // -------------------- Clipboard ---------------------- //

    fn set_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    warn!("Clipboard is not available: {:?}", e);
                    self.set_status_message("Clipboard is not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => {
                    warn!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Copying to clipboard failed");
                }
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let Some(&column) = self.rowset.columns.get(self.curser_column) else {
            return;
        };
        if let Some(cell) = self.selected_record().map(|r| column.value(r)) {
            trace!("Cell content: {}", cell);
            self.set_clipboard(cell);
        }
    }

    fn copy_table_row(&mut self) {
        let columns = self.rowset.columns.clone();
        if let Some(row) = self.selected_record().map(|r| row_as_csv(r, &columns)) {
            self.set_clipboard(row);
        }
    }

    // -------------------- Rendering data ---------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_table_data();
    }

    fn reset_curser(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn calculate_column_width(
        column: Column,
        records: &[Record],
        max_column_width: usize,
    ) -> usize {
        let max_width = records
            .iter()
            .map(|r| column.value(r).chars().count())
            .max()
            .unwrap_or(0);
        // Header gets room for the sort arrow
        let width = std::cmp::max(column.name().len() + 2, max_width) + COLUMN_WIDTH_MARGIN;
        std::cmp::min(width, max_column_width)
    }

    fn update_table_data(&mut self) {
        self.status = match self.status {
            Status::QUITTING => Status::QUITTING,
            _ if self.pager.is_loading() => Status::LOADING,
            _ => Status::READY,
        };

        let records: &[Record] = self
            .pager
            .current()
            .map(|p| p.records.as_slice())
            .unwrap_or(&[]);
        self.rowset = derive_rows(records, &self.view);

        // A shrunk table pushes the curser into the offset so the selection stays drawn
        let table_height = self.uilayout.table_height;
        if self.curser_row >= table_height {
            self.offset_row += self.curser_row + 1 - table_height;
            self.curser_row = table_height - 1;
        }

        // Keep the curser inside the rows and columns that survived filtering / hiding
        let nrows = self.rowset.rows.len();
        if self.offset_row + self.curser_row >= nrows {
            self.reset_curser();
        }
        self.curser_column = std::cmp::min(
            self.curser_column,
            self.rowset.columns.len().saturating_sub(1),
        );

        self.update_uidata_for_table();
    }

    fn update_uidata_for_table(&mut self) {
        let records: &[Record] = self
            .pager
            .current()
            .map(|p| p.records.as_slice())
            .unwrap_or(&[]);

        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, self.rowset.rows.len());
        let visible_rows = &self.rowset.rows[rbegin.min(rend)..rend];

        let mut table: Vec<ColumnView> = self
            .rowset
            .columns
            .iter()
            .map(|&column| {
                let mut name = column.name().to_string();
                if self.view.sort.key == column {
                    name.push(' ');
                    name.push_str(self.view.sort.direction.arrow());
                }
                ColumnView {
                    name,
                    width: Self::calculate_column_width(
                        column,
                        records,
                        self.config.max_column_width,
                    ),
                    data: Vec::with_capacity(visible_rows.len()),
                }
            })
            .collect();
        for &ridx in visible_rows {
            for (cidx, cell) in row_cells(&records[ridx], &self.rowset.columns)
                .into_iter()
                .enumerate()
            {
                table[cidx].data.push(cell);
            }
        }

        let page_count = self.pager.max_page_index() + 1;
        let dialog: Option<Vec<(String, String)>> = self
            .view
            .selected
            .as_ref()
            .filter(|_| self.view.dialog_open)
            .map(|r| {
                r.detail_fields()
                    .into_iter()
                    .map(|(label, value)| (label.to_string(), value))
                    .collect()
            });

        self.uidata = UIData {
            name: format!("Random users, page {}/{}", self.pager.page_index() + 1, page_count),
            table,
            nrows: self.rowset.rows.len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: self.offset_row + self.curser_row,
            columns: TRACKED_COLUMNS
                .iter()
                .map(|c| (c.name().to_string(), self.view.columns.is_visible(*c)))
                .collect(),
            filter: self.view.filter.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_cmdinput,
            page_index: self.pager.page_index(),
            page_count,
            page_size: self.view.page_size,
            total_records: self.config.total_records,
            loading: self.pager.is_loading(),
            next_page_ready: self.pager.prefetched().is_some(),
            error: self.pager.error().map(|e| e.to_string()),
            dialog,
            show_popup: self.uidata.show_popup,
            popup_message: self.uidata.popup_message.clone(),
            status_message: self.status_message.clone(),
        };
    }

    // -------------------- Curser movement ---------------------- //

    fn move_table_selection_beginning(&mut self) {
        self.reset_curser();
        self.update_uidata_for_table();
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.rowset.rows.len();
        if nrows == 0 {
            return;
        }
        if nrows < self.uilayout.table_height {
            self.offset_row = 0;
            self.curser_row = nrows - 1;
        } else {
            self.offset_row = nrows - self.uilayout.table_height;
            self.curser_row = self.uilayout.table_height - 1;
        }
        self.update_uidata_for_table();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if self.curser_row > 0 {
            // Curser somewhere in the middle
            self.curser_row = self.curser_row.saturating_sub(size);
        } else if self.offset_row > 0 {
            // Curser at the top, shift table up
            self.offset_row = self.offset_row.saturating_sub(size);
        }
        self.update_uidata_for_table();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.rowset.rows.len();
        if self.curser_row + self.offset_row + 1 >= nrows {
            return;
        }
        let height = self.uilayout.table_height;
        if self.curser_row + 1 < height {
            // Somewhere in the middle of the table
            self.curser_row = std::cmp::min(
                self.curser_row + size,
                std::cmp::min(height, nrows - self.offset_row) - 1,
            );
        } else {
            // At the bottom of the table, need to shift table down
            self.offset_row = std::cmp::min(self.offset_row + size, nrows.saturating_sub(height));
            self.curser_row = std::cmp::min(height - 1, nrows - self.offset_row - 1);
        }
        self.update_uidata_for_table();
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.update_uidata_for_table();
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.rowset.columns.len() {
            self.curser_column += 1;
        }
        self.update_uidata_for_table();
    }
}
