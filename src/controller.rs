use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{FtvConfig, FtvError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &FtvConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, FtvError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While a term is being typed every key goes to the inputter.
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

fn handle_key(key: event::KeyEvent) -> Option<Message> {
    let message = match key.code {
        KeyCode::Char('q') => Some(Message::Quit),
        KeyCode::Esc => Some(Message::Exit),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Message::Enter),
        KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
        KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
        KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
        KeyCode::PageDown => Some(Message::MovePageDown),
        KeyCode::PageUp => Some(Message::MovePageUp),
        KeyCode::Char('g') => Some(Message::MoveBeginning),
        KeyCode::Char('G') => Some(Message::MoveEnd),
        KeyCode::Char('/') => Some(Message::Search),
        KeyCode::Char('f') => Some(Message::Filter),
        KeyCode::Char('s') => Some(Message::SortAscending),
        KeyCode::Char('S') => Some(Message::SortDescending),
        KeyCode::Char('c') => Some(Message::ClearColumn),
        KeyCode::Char('C') => Some(Message::ClearAll),
        KeyCode::Char('?') => Some(Message::Help),
        _ => None,
    };
    trace!("Mapped: {key:?} => {message:?}");
    message
}
