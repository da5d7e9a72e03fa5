use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::{LexiconConfig, LexiconError, Message};
use crate::model::{Model, Modus};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &LexiconConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, LexiconError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.handle_key(model, key));
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = match model.modus() {
            Modus::EXPORT => Self::map_export_key(key),
            _ => Self::map_table_key(key),
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn map_table_key(key: KeyEvent) -> Option<Message> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown | KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp | KeyCode::Char('p'), _) => Some(Message::PrevPage),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::FirstPage),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::LastPage),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('f'), _) => Some(Message::SearchInColumn),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilter),
            (KeyCode::Char('a'), _) => Some(Message::SortAscending),
            (KeyCode::Char('d'), _) => Some(Message::SortDescending),
            (KeyCode::Char('s'), _) => Some(Message::ToggleSummary),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('e'), _) => Some(Message::Export),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            (KeyCode::F(1) | KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        }
    }

    fn map_export_key(key: KeyEvent) -> Option<Message> {
        match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Char(' ') => Some(Message::ToggleExportColumn),
            KeyCode::Char('f') => Some(Message::ToggleExportScope),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_table_keys() {
        assert_eq!(Controller::map_table_key(press(KeyCode::Char('/'))), Some(Message::Search));
        assert_eq!(Controller::map_table_key(press(KeyCode::PageDown)), Some(Message::NextPage));
        assert_eq!(
            Controller::map_table_key(KeyEvent::new(KeyCode::Char('Y'), KeyModifiers::SHIFT)),
            Some(Message::CopyRow)
        );
        assert_eq!(
            Controller::map_table_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        );
        assert_eq!(Controller::map_table_key(press(KeyCode::Char('z'))), None);
    }

    #[test]
    fn export_dialog_reuses_keys() {
        assert_eq!(
            Controller::map_export_key(press(KeyCode::Char('f'))),
            Some(Message::ToggleExportScope)
        );
        assert_eq!(
            Controller::map_export_key(press(KeyCode::Char(' '))),
            Some(Message::ToggleExportColumn)
        );
        assert_eq!(Controller::map_export_key(press(KeyCode::Char('a'))), None);
    }
}
