use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum FtvError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for FtvError {
    fn from(err: Error) -> Self {
        FtvError::IoError(err)
    }
}

impl From<PolarsError> for FtvError {
    fn from(err: PolarsError) -> Self {
        FtvError::PolarsError(err)
    }
}

#[derive(Debug, Clone)]
pub struct FtvConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for FtvConfig {
    fn default() -> Self {
        FtvConfig {
            event_poll_time: 100,
            max_column_width: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    Filter,
    ClearColumn,
    ClearAll,
    SortAscending,
    SortDescending,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
ftv key map

  arrows/hjkl     move the selection
  PgUp/PgDn       move a page up/down
  g / G           first / last row
  /               search all columns (Enter applies, Esc cancels)
  f               filter choices for the current column
  s / S           sort current column ascending / descending
  c               clear filters on the current column
  C               clear search, filters and ordering
  ?               this help
  Esc             close popup
  q               quit
";
