use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line editor for search queries. The cursor counts chars, not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.clear();
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = self.byte_pos();
                    self.current_input.remove(at);
                }
            }
            (KeyCode::Delete, _) => {
                if self.cursor_pos < self.len() {
                    let at = self.byte_pos();
                    self.current_input.remove(at);
                }
            }
            (KeyCode::Left, _) => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor_pos = (self.cursor_pos + 1).min(self.len()),
            (KeyCode::Home, _) => self.cursor_pos = 0,
            (KeyCode::End, _) => self.cursor_pos = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.cursor_pos = 0;
            }
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_pos();
                self.current_input.insert(at, chr);
                self.cursor_pos += 1;
            }
            _ => {}
        }
        trace!("Input '{}' @ {}", self.current_input, self.cursor_pos);
        self.get()
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            input.read(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn edits_at_the_cursor() {
        let mut input = Inputter::default();
        type_str(&mut input, "alga");
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        type_str(&mut input, "a");
        assert_eq!(input.get().input, "alaga");

        input.read(key(KeyCode::Home));
        input.read(key(KeyCode::Delete));
        input.read(key(KeyCode::End));
        input.read(key(KeyCode::Backspace));
        let result = input.read(key(KeyCode::Enter));
        assert_eq!(result.input, "lag");
        assert!(result.finished);
        assert!(!result.canceled);
    }

    #[test]
    fn handles_multibyte_chars() {
        let mut input = Inputter::default();
        type_str(&mut input, "ñgä");
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Backspace));
        assert_eq!(input.get().input, "ñä");
        assert_eq!(input.get().cursor_pos, 1);
    }

    #[test]
    fn escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "query");
        let result = input.read(key(KeyCode::Esc));
        assert!(result.canceled);
        assert!(result.finished);
        assert!(result.input.is_empty());
    }
}
