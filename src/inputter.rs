use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for the filter text. Every key returns the full state so the
/// caller can apply the text while it is typed.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // In chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        trace!("Input key {:?}", key.code);
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (kc, km) => self.key(kc, km),
        }
    }

    /// Start editing with an existing text, curser at its end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            self.current_input.insert(self.getbytepos(), chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(input: &mut Inputter, s: &str) -> InputResult {
        let mut last = input.get();
        for c in s.chars() {
            last = press(input, KeyCode::Char(c));
        }
        last
    }

    #[test]
    fn typing_builds_the_text() {
        let mut input = Inputter::default();
        let result = type_str(&mut input, "smith");
        assert_eq!(result.input, "smith");
        assert_eq!(result.curser_pos, 5);
        assert!(!result.finished);
    }

    #[test]
    fn edits_happen_at_the_curser() {
        let mut input = Inputter::default();
        type_str(&mut input, "smth");
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Left);
        let result = press(&mut input, KeyCode::Char('i'));
        assert_eq!(result.input, "smith");

        press(&mut input, KeyCode::Home);
        let result = press(&mut input, KeyCode::Delete);
        assert_eq!(result.input, "mith");

        press(&mut input, KeyCode::End);
        let result = press(&mut input, KeyCode::Backspace);
        assert_eq!(result.input, "mit");
    }

    #[test]
    fn multibyte_characters_are_handled_per_char() {
        let mut input = Inputter::default();
        type_str(&mut input, "müller");
        press(&mut input, KeyCode::Home);
        press(&mut input, KeyCode::Right);
        press(&mut input, KeyCode::Right);
        let result = press(&mut input, KeyCode::Backspace);
        assert_eq!(result.input, "mller");
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        input.set("lee");
        assert_eq!(input.get().curser_pos, 3);
        let result = press(&mut input, KeyCode::Enter);
        assert!(result.finished);
        assert_eq!(result.input, "lee");

        input.set("lee");
        let result = press(&mut input, KeyCode::Esc);
        assert!(result.finished && result.canceled);
        assert_eq!(result.input, "");
    }
}
