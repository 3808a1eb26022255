// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Modal line editor for the input box.
//!
//! A small vi: Insert mode for typing, Normal mode for motions and
//! line-kills.  The editor is a pure state machine over key events so every
//! binding is unit-testable without a terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Insert,
    Normal,
}

/// What the surrounding event loop should do after a key was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    /// Enter was pressed; the buffer contents (already taken) are attached.
    Submit(String),
    /// Ctrl+D on an empty buffer.
    Eof,
    /// Ctrl+C — interrupt/exit semantics are decided by the caller.
    Interrupt,
}

pub struct Editor {
    chars: Vec<char>,
    cursor: usize,
    mode: Mode,
    /// Set after `d` in Normal mode, waiting for a motion.
    pending_delete: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self { chars: Vec::new(), cursor: 0, mode: Mode::Insert, pending_delete: false }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor as (row, display column) for rendering a multi-line buffer.
    /// The column accounts for wide characters (CJK).
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let mut row = 0;
        let mut col = 0;
        for &c in &self.chars[..self.cursor] {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += c.width().unwrap_or(0);
            }
        }
        (row, col)
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
        self.mode = Mode::Insert;
        self.pending_delete = false;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        // Bindings shared by both modes.
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return EditorAction::Interrupt,
                KeyCode::Char('d') if self.chars.is_empty() => return EditorAction::Eof,
                _ => {}
            }
        }
        if key.code == KeyCode::Enter && !key.modifiers.contains(KeyModifiers::ALT) {
            let text = self.text();
            self.clear();
            return EditorAction::Submit(text);
        }

        match self.mode {
            Mode::Insert => self.handle_insert(key),
            Mode::Normal => self.handle_normal(key),
        }
        EditorAction::None
    }

    // ── Insert mode ───────────────────────────────────────────────────────────

    fn handle_insert(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                // Newline without submitting.
                KeyCode::Char('j') => self.insert('\n'),
                KeyCode::Char('u') => self.kill_to_line_start(),
                KeyCode::Char('k') => self.kill_to_line_end(),
                KeyCode::Char('a') => self.cursor = self.line_start(),
                KeyCode::Char('e') => self.cursor = self.line_end(),
                KeyCode::Char('w') => self.delete_word_backward(),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.pending_delete = false;
            }
            KeyCode::Enter => self.insert('\n'), // Alt+Enter reaches here
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.chars.remove(self.cursor);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.chars.len() {
                    self.chars.remove(self.cursor);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.chars.len()),
            KeyCode::Home => self.cursor = self.line_start(),
            KeyCode::End => self.cursor = self.line_end(),
            _ => {}
        }
    }

    // ── Normal mode ───────────────────────────────────────────────────────────

    fn handle_normal(&mut self, key: KeyEvent) {
        if self.pending_delete {
            self.pending_delete = false;
            if key.code == KeyCode::Char('w') {
                self.delete_word_forward();
            }
            return;
        }
        match key.code {
            KeyCode::Char('i') => self.mode = Mode::Insert,
            KeyCode::Char('a') => {
                self.cursor = (self.cursor + 1).min(self.chars.len());
                self.mode = Mode::Insert;
            }
            KeyCode::Char('I') => {
                self.cursor = self.line_start();
                self.mode = Mode::Insert;
            }
            KeyCode::Char('A') => {
                self.cursor = self.line_end();
                self.mode = Mode::Insert;
            }
            KeyCode::Char('h') | KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Char('l') | KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.chars.len())
            }
            KeyCode::Char('0') => self.cursor = self.line_start(),
            KeyCode::Char('$') => self.cursor = self.line_end(),
            KeyCode::Char('w') => self.cursor = self.next_word_start(),
            KeyCode::Char('b') => self.cursor = self.prev_word_start(),
            KeyCode::Char('x') => {
                if self.cursor < self.chars.len() {
                    self.chars.remove(self.cursor);
                }
            }
            KeyCode::Char('D') => self.kill_to_line_end(),
            KeyCode::Char('d') => self.pending_delete = true,
            KeyCode::Esc => self.pending_delete = false,
            _ => {}
        }
    }

    // ── Editing primitives ────────────────────────────────────────────────────

    fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn line_start(&self) -> usize {
        self.chars[..self.cursor]
            .iter()
            .rposition(|&c| c == '\n')
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn line_end(&self) -> usize {
        self.chars[self.cursor..]
            .iter()
            .position(|&c| c == '\n')
            .map(|i| self.cursor + i)
            .unwrap_or(self.chars.len())
    }

    fn kill_to_line_start(&mut self) {
        let start = self.line_start();
        self.chars.drain(start..self.cursor);
        self.cursor = start;
    }

    fn kill_to_line_end(&mut self) {
        let end = self.line_end();
        self.chars.drain(self.cursor..end);
    }

    fn delete_word_forward(&mut self) {
        let end = self.next_word_start();
        self.chars.drain(self.cursor..end);
    }

    fn delete_word_backward(&mut self) {
        let start = self.prev_word_start();
        self.chars.drain(start..self.cursor);
        self.cursor = start;
    }

    /// Word characters are alphanumerics and underscore.
    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    fn next_word_start(&self) -> usize {
        let n = self.chars.len();
        let mut i = self.cursor;
        // Leave the current word, then skip separators to the next one.
        while i < n && Self::is_word_char(self.chars[i]) {
            i += 1;
        }
        while i < n && !Self::is_word_char(self.chars[i]) {
            i += 1;
        }
        i
    }

    fn prev_word_start(&self) -> usize {
        let mut i = self.cursor;
        while i > 0 && !Self::is_word_char(self.chars[i - 1]) {
            i -= 1;
        }
        while i > 0 && Self::is_word_char(self.chars[i - 1]) {
            i -= 1;
        }
        i
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(ed: &mut Editor, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                ed.handle_key(ctrl('j'));
            } else {
                ed.handle_key(press(KeyCode::Char(c)));
            }
        }
    }

    // ── Insert mode basics ────────────────────────────────────────────────────

    #[test]
    fn typing_inserts_at_cursor() {
        let mut ed = Editor::new();
        type_str(&mut ed, "hello");
        assert_eq!(ed.text(), "hello");
        assert_eq!(ed.cursor(), 5);
    }

    #[test]
    fn backspace_rubs_out_before_cursor() {
        let mut ed = Editor::new();
        type_str(&mut ed, "abc");
        ed.handle_key(press(KeyCode::Backspace));
        assert_eq!(ed.text(), "ab");
    }

    #[test]
    fn ctrl_j_inserts_newline() {
        let mut ed = Editor::new();
        type_str(&mut ed, "one\ntwo");
        assert_eq!(ed.text(), "one\ntwo");
        assert_eq!(ed.cursor_row_col(), (1, 3));
    }

    #[test]
    fn enter_submits_and_clears() {
        let mut ed = Editor::new();
        type_str(&mut ed, "run tests");
        let action = ed.handle_key(press(KeyCode::Enter));
        assert_eq!(action, EditorAction::Submit("run tests".into()));
        assert!(ed.is_empty());
        assert_eq!(ed.mode(), Mode::Insert);
    }

    #[test]
    fn enter_submits_from_normal_mode_too() {
        let mut ed = Editor::new();
        type_str(&mut ed, "x");
        ed.handle_key(press(KeyCode::Esc));
        let action = ed.handle_key(press(KeyCode::Enter));
        assert_eq!(action, EditorAction::Submit("x".into()));
    }

    // ── EOF / interrupt ───────────────────────────────────────────────────────

    #[test]
    fn ctrl_d_on_empty_is_eof() {
        let mut ed = Editor::new();
        assert_eq!(ed.handle_key(ctrl('d')), EditorAction::Eof);
    }

    #[test]
    fn ctrl_d_with_text_is_ignored() {
        let mut ed = Editor::new();
        type_str(&mut ed, "text");
        assert_eq!(ed.handle_key(ctrl('d')), EditorAction::None);
        assert_eq!(ed.text(), "text");
    }

    #[test]
    fn ctrl_c_reports_interrupt_in_both_modes() {
        let mut ed = Editor::new();
        assert_eq!(ed.handle_key(ctrl('c')), EditorAction::Interrupt);
        ed.handle_key(press(KeyCode::Esc));
        assert_eq!(ed.handle_key(ctrl('c')), EditorAction::Interrupt);
    }

    // ── Mode switching ────────────────────────────────────────────────────────

    #[test]
    fn esc_enters_normal_mode_and_i_returns() {
        let mut ed = Editor::new();
        type_str(&mut ed, "ab");
        ed.handle_key(press(KeyCode::Esc));
        assert_eq!(ed.mode(), Mode::Normal);
        // 'a' in normal mode must not insert the letter.
        ed.handle_key(press(KeyCode::Char('i')));
        assert_eq!(ed.mode(), Mode::Insert);
        assert_eq!(ed.text(), "ab");
    }

    #[test]
    fn append_moves_past_cursor() {
        let mut ed = Editor::new();
        type_str(&mut ed, "ab");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('0')));
        ed.handle_key(press(KeyCode::Char('a')));
        assert_eq!(ed.mode(), Mode::Insert);
        type_str(&mut ed, "X");
        assert_eq!(ed.text(), "aXb");
    }

    // ── Motions ───────────────────────────────────────────────────────────────

    #[test]
    fn h_l_move_by_character() {
        let mut ed = Editor::new();
        type_str(&mut ed, "abc");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('h')));
        assert_eq!(ed.cursor(), 2);
        ed.handle_key(press(KeyCode::Char('l')));
        assert_eq!(ed.cursor(), 3);
    }

    #[test]
    fn zero_and_dollar_jump_to_line_ends() {
        let mut ed = Editor::new();
        type_str(&mut ed, "first\nsecond line");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('0')));
        assert_eq!(ed.cursor(), 6, "line start of the second line");
        ed.handle_key(press(KeyCode::Char('$')));
        assert_eq!(ed.cursor(), ed.text().len());
    }

    #[test]
    fn w_and_b_move_by_word() {
        let mut ed = Editor::new();
        type_str(&mut ed, "foo bar_baz qux");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('0')));
        ed.handle_key(press(KeyCode::Char('w')));
        assert_eq!(ed.cursor(), 4, "start of bar_baz (underscore is a word char)");
        ed.handle_key(press(KeyCode::Char('w')));
        assert_eq!(ed.cursor(), 12, "start of qux");
        ed.handle_key(press(KeyCode::Char('b')));
        assert_eq!(ed.cursor(), 4);
    }

    // ── Kills ─────────────────────────────────────────────────────────────────

    #[test]
    fn ctrl_k_kills_to_end_of_line() {
        let mut ed = Editor::new();
        type_str(&mut ed, "keep remove");
        for _ in 0..6 {
            ed.handle_key(press(KeyCode::Left));
        }
        ed.handle_key(ctrl('k'));
        assert_eq!(ed.text(), "keep ");
    }

    #[test]
    fn ctrl_u_kills_to_beginning_of_line() {
        let mut ed = Editor::new();
        type_str(&mut ed, "remove keep");
        for _ in 0..4 {
            ed.handle_key(press(KeyCode::Left));
        }
        ed.handle_key(ctrl('u'));
        assert_eq!(ed.text(), "keep");
        assert_eq!(ed.cursor(), 0);
    }

    #[test]
    fn line_kills_stop_at_newlines() {
        let mut ed = Editor::new();
        type_str(&mut ed, "one\ntwo\nthree");
        // Cursor is at the end; move to the middle line.
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('b'))); // start of "three"
        ed.handle_key(press(KeyCode::Char('h'))); // onto the newline
        ed.handle_key(press(KeyCode::Char('0'))); // start of "two"
        ed.handle_key(press(KeyCode::Char('D')));
        assert_eq!(ed.text(), "one\n\nthree");
    }

    #[test]
    fn dw_deletes_word_forward() {
        let mut ed = Editor::new();
        type_str(&mut ed, "alpha beta gamma");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('0')));
        ed.handle_key(press(KeyCode::Char('d')));
        ed.handle_key(press(KeyCode::Char('w')));
        assert_eq!(ed.text(), "beta gamma");
    }

    #[test]
    fn d_followed_by_other_key_is_cancelled() {
        let mut ed = Editor::new();
        type_str(&mut ed, "text");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('d')));
        ed.handle_key(press(KeyCode::Char('h')));
        assert_eq!(ed.text(), "text", "no deletion on a non-w motion");
    }

    #[test]
    fn x_deletes_at_cursor() {
        let mut ed = Editor::new();
        type_str(&mut ed, "abc");
        ed.handle_key(press(KeyCode::Esc));
        ed.handle_key(press(KeyCode::Char('0')));
        ed.handle_key(press(KeyCode::Char('x')));
        assert_eq!(ed.text(), "bc");
    }

    #[test]
    fn ctrl_w_deletes_word_backward_in_insert_mode() {
        let mut ed = Editor::new();
        type_str(&mut ed, "first second");
        ed.handle_key(ctrl('w'));
        assert_eq!(ed.text(), "first ");
    }
}
