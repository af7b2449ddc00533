use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, trace};

use crate::domain::{Message, RUVConfig, RUVError};
use crate::model::Model;
use crate::source::FetchOutcome;

pub struct Controller {
    event_poll_time: u64,
    outcomes: UnboundedReceiver<FetchOutcome>,
}

impl Controller {
    pub fn new(cfg: &RUVConfig, outcomes: UnboundedReceiver<FetchOutcome>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            outcomes,
        }
    }

    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, RUVError> {
        // Finished fetches go first so a page never waits behind the poll timeout
        match self.outcomes.try_recv() {
            Ok(outcome) => return Ok(Some(Message::Fetched(outcome))),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => debug!("Fetch channel is closed"),
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                // Only presses, crossterm also emits release and repeat events on Windows.
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(Self::handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char(c @ '1'..='4'), _) => {
                c.to_digit(10).map(|d| Message::ToggleColumn(d as usize - 1))
            }
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('n') | KeyCode::Char(']'), _) => Some(Message::NextPage),
            (KeyCode::Char('r'), _) => Some(Message::Retry),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('C'), _) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
