use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use tracing::trace;

use crate::domain::{FtvConfig, FtvError, Message};
use crate::inputter::{InputResult, Inputter};
use crate::source::Source;
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, TABLE_HEADER_HEIGHT};
use crate::view::{ColumnKey, SortDirection, SortSpec, ViewState};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    FILTER,
    POPUP,
    CMDINPUT,
}

// Option picker for one column, fed by ViewState::options_for.
pub struct FilterMenu {
    pub key: ColumnKey,
    pub options: Vec<String>,
    pub curser_row: usize,
    pub offset_row: usize,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height: ui_height.saturating_sub(TABLE_HEADER_HEIGHT + CMDLINE_HEIGH),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    view: ViewState,
    columns: Vec<ColumnKey>,
    column_widths: Vec<usize>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    filter_menu: Option<FilterMenu>,
    input: Inputter,
    last_input: InputResult,
    active_cmdinput: bool,
    uilayout: UILayout,
    status_message: String,
    pub last_status_message_update: Instant,
}

impl Model {
    pub fn init(source: Source, config: &FtvConfig, ui_width: usize, ui_height: usize) -> Self {
        let view = ViewState::new(source.records);
        let columns = view.columns();
        let column_widths = calculate_column_widths(&view, &columns, config.max_column_width);
        let nrows = view.rows().len();

        let mut model = Self {
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name: source.name,
            view,
            columns,
            column_widths,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            filter_menu: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            uilayout: UILayout::from_values(ui_width, ui_height),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(format!("Loaded {} rows", nrows));
        model
    }

    pub fn update(&mut self, message: Message) -> Result<(), FtvError> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_selection_down(1),
                Message::MoveUp => self.move_selection_up(1),
                Message::MovePageDown => self.move_selection_down(self.table_height()),
                Message::MovePageUp => self.move_selection_up(self.table_height()),
                Message::MoveBeginning => self.select_row(0),
                Message::MoveEnd => {
                    self.select_row(self.view.rows().len().saturating_sub(1));
                }
                Message::MoveLeft => self.move_selection_left(),
                Message::MoveRight => self.move_selection_right(),
                Message::Search => self.enter_term_input(),
                Message::Filter => self.open_filter_menu(),
                Message::SortAscending => self.sort_current_column(SortDirection::Ascending),
                Message::SortDescending => self.sort_current_column(SortDirection::Descending),
                Message::ClearColumn => self.clear_current_column(),
                Message::ClearAll => self.clear_all(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::FILTER => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_menu_down(1),
                Message::MoveUp => self.move_menu_up(1),
                Message::MovePageDown => self.move_menu_down(self.menu_view_height()),
                Message::MovePageUp => self.move_menu_up(self.menu_view_height()),
                Message::Enter => self.toggle_menu_option(),
                Message::ClearColumn => self.clear_menu_column(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Filter => self.close_filter_menu(),
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Help => self.exit_popup(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key);
                } else if let Message::Resize(width, height) = message {
                    self.ui_resize(width, height);
                }
            }
        }
        Ok(())
    }

    // ------------------------ table mode ------------------------ //

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn clear_all(&mut self) {
        self.view.clear_all();
        self.curser_row = 0;
        self.offset_row = 0;
        self.set_status_message("Cleared search, filters and ordering".to_string());
    }

    fn clear_current_column(&mut self) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        self.view.clear_filter_column(&key);
        self.clamp_table_curser();
        self.set_status_message(format!("Cleared filters on \"{}\"", key));
    }

    fn sort_current_column(&mut self, direction: SortDirection) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        self.view.sort(SortSpec {
            key: key.clone(),
            direction,
        });
        let arrow = match direction {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        };
        self.set_status_message(format!("Sorted by \"{}\" {}", key, arrow));
    }

    fn current_column_key(&self) -> Option<ColumnKey> {
        self.columns.get(self.curser_column).cloned()
    }

    fn table_height(&self) -> usize {
        std::cmp::max(self.uilayout.table_height, 1)
    }

    fn move_selection_down(&mut self, size: usize) {
        let nrows = self.view.rows().len();
        if nrows == 0 {
            return;
        }
        let target = std::cmp::min(self.offset_row + self.curser_row + size, nrows - 1);
        self.select_row(target);
    }

    fn move_selection_up(&mut self, size: usize) {
        let target = (self.offset_row + self.curser_row).saturating_sub(size);
        self.select_row(target);
    }

    fn select_row(&mut self, row: usize) {
        let height = self.table_height();
        if row >= self.offset_row && row < self.offset_row + height {
            self.curser_row = row - self.offset_row;
        } else if row < self.offset_row {
            self.offset_row = row;
            self.curser_row = 0;
        } else {
            self.offset_row = row + 1 - height;
            self.curser_row = row - self.offset_row;
        }
    }

    fn move_selection_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
            if self.curser_column < self.offset_column {
                self.offset_column = self.curser_column;
            }
        }
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.columns.len() {
            self.curser_column += 1;
            self.scroll_curser_column_into_view();
        }
    }

    // Advance the column offset until the curser column fits on screen.
    fn scroll_curser_column_into_view(&mut self) {
        while self.offset_column < self.curser_column {
            let width: usize = self.column_widths[self.offset_column..=self.curser_column]
                .iter()
                .sum();
            if width <= self.uilayout.width {
                break;
            }
            self.offset_column += 1;
        }
    }

    // The view shrank or grew, keep the selection on a valid row.
    fn clamp_table_curser(&mut self) {
        let nrows = self.view.rows().len();
        if nrows == 0 {
            self.curser_row = 0;
            self.offset_row = 0;
        } else {
            let abs = std::cmp::min(self.offset_row + self.curser_row, nrows - 1);
            self.offset_row = std::cmp::min(self.offset_row, abs);
            self.select_row(abs);
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.clamp_table_curser();
        self.clamp_menu_curser();
    }

    // ------------------------ search input ------------------------ //

    fn enter_term_input(&mut self) {
        trace!("Entering search input ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.active_cmdinput = true;
        self.input.clear();
        self.input.seed(self.view.term());
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.active_cmdinput = false;
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            if !self.last_input.canceled {
                let term = self.last_input.input.clone();
                self.view.set_term(&term);
                self.clamp_table_curser();
                let found = self.view.rows().len();
                if term.is_empty() {
                    self.set_status_message("Cleared search".to_string());
                } else if found == 0 {
                    self.set_status_message(format!("No matches for \"{}\"", term));
                } else {
                    self.set_status_message(format!("Found {} matching rows", found));
                }
            }
        }
    }

    // ------------------------ filter menu ------------------------ //

    fn open_filter_menu(&mut self) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        let options = self.view.options_for(&key);
        trace!("Filter menu for \"{}\" with {} options", key, options.len());
        self.filter_menu = Some(FilterMenu {
            key,
            options,
            curser_row: 0,
            offset_row: 0,
        });
        self.previous_modus = self.modus;
        self.modus = Modus::FILTER;
    }

    fn close_filter_menu(&mut self) {
        self.filter_menu = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::FILTER;
    }

    pub fn menu_view_height(&self) -> usize {
        std::cmp::max(self.table_height().saturating_sub(4), 1)
    }

    fn move_menu_down(&mut self, size: usize) {
        let height = self.menu_view_height();
        let Some(menu) = self.filter_menu.as_mut() else {
            return;
        };
        if menu.options.is_empty() {
            return;
        }
        let target = std::cmp::min(menu.offset_row + menu.curser_row + size, menu.options.len() - 1);
        if target < menu.offset_row + height {
            menu.curser_row = target - menu.offset_row;
        } else {
            menu.offset_row = target + 1 - height;
            menu.curser_row = target - menu.offset_row;
        }
    }

    fn move_menu_up(&mut self, size: usize) {
        let Some(menu) = self.filter_menu.as_mut() else {
            return;
        };
        let target = (menu.offset_row + menu.curser_row).saturating_sub(size);
        if target >= menu.offset_row {
            menu.curser_row = target - menu.offset_row;
        } else {
            menu.offset_row = target;
            menu.curser_row = 0;
        }
    }

    fn clamp_menu_curser(&mut self) {
        let height = self.menu_view_height();
        if let Some(menu) = self.filter_menu.as_mut()
            && menu.curser_row >= height
        {
            menu.offset_row += menu.curser_row + 1 - height;
            menu.curser_row = height - 1;
        }
    }

    fn toggle_menu_option(&mut self) {
        let Some(menu) = self.filter_menu.as_ref() else {
            return;
        };
        let Some(value) = menu.options.get(menu.offset_row + menu.curser_row).cloned() else {
            return;
        };
        let key = menu.key.clone();
        let selected = !self.view.filters().accepts(&key, &value);
        self.view.toggle_filter(&key, &value, selected);
        self.clamp_table_curser();
        self.set_status_message(format!("{} rows match", self.view.rows().len()));
    }

    fn clear_menu_column(&mut self) {
        let Some(menu) = self.filter_menu.as_ref() else {
            return;
        };
        let key = menu.key.clone();
        self.view.clear_filter_column(&key);
        self.clamp_table_curser();
        self.set_status_message(format!("Cleared filters on \"{}\"", key));
    }

    // ------------------------ render access ------------------------ //

    fn set_status_message(&mut self, message: String) {
        self.status_message = message;
        self.last_status_message_update = Instant::now();
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn column_widths(&self) -> &[usize] {
        &self.column_widths
    }

    pub fn curser(&self) -> (usize, usize) {
        (self.offset_row + self.curser_row, self.curser_column)
    }

    pub fn offsets(&self) -> (usize, usize) {
        (self.offset_row, self.offset_column)
    }

    pub fn uilayout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn filter_menu(&self) -> Option<&FilterMenu> {
        self.filter_menu.as_ref()
    }

    pub fn cmdinput(&self) -> &InputResult {
        &self.last_input
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }
}

fn calculate_column_widths(
    view: &ViewState,
    columns: &[ColumnKey],
    max_column_width: usize,
) -> Vec<usize> {
    columns
        .iter()
        .map(|key| {
            let widest_cell = view
                .rows()
                .iter()
                .filter_map(|row| row.get(key))
                .map(|value| value.chars().count())
                .max()
                .unwrap_or(0);
            let width = std::cmp::max(key.chars().count() + 2, widest_cell) + COLUMN_WIDTH_MARGIN;
            std::cmp::min(width, max_column_width)
        })
        .collect()
}
