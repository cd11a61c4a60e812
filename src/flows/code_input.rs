use serde::{Deserialize, Serialize};

pub const CODE_LEN: usize = 6;

/// Result of feeding a key event into the input model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeEvent {
    Incomplete,
    /// All six cells are populated; the assembled code.
    Complete(String),
}

/// Six independent single-digit cells with a focus cursor.
///
/// Typing a digit advances focus to the next cell; backspace on an empty
/// cell moves focus back and clears the previous digit; a paste fills cells
/// from the left. The model reports `Complete` the instant the sixth digit
/// lands so the owning flow can decide whether to auto-submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInput {
    cells: [Option<u8>; CODE_LEN],
    focus: usize,
}

impl CodeInput {
    pub fn cell(&self, index: usize) -> Option<u8> {
        self.cells.get(index).copied().flatten()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// The assembled code, once all cells hold a digit.
    pub fn code(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        Some(
            self.cells
                .iter()
                .map(|c| char::from(b'0' + c.unwrap_or(0)))
                .collect(),
        )
    }

    /// Apply the new value of one cell. Non-digit input is ignored; the last
    /// typed character wins; an empty value clears the cell.
    pub fn enter(&mut self, cell: usize, value: &str) -> CodeEvent {
        if cell >= CODE_LEN || !value.chars().all(|c| c.is_ascii_digit()) {
            return self.completion();
        }
        match value.chars().last() {
            Some(c) => {
                self.cells[cell] = Some(c as u8 - b'0');
                self.focus = (cell + 1).min(CODE_LEN - 1);
            }
            None => {
                self.cells[cell] = None;
                self.focus = cell;
            }
        }
        self.completion()
    }

    pub fn backspace(&mut self, cell: usize) {
        if cell >= CODE_LEN {
            return;
        }
        if self.cells[cell].is_some() {
            self.cells[cell] = None;
            self.focus = cell;
        } else if cell > 0 {
            self.cells[cell - 1] = None;
            self.focus = cell - 1;
        }
    }

    /// Fill cells from pasted text, keeping only digits.
    pub fn paste(&mut self, text: &str) -> CodeEvent {
        let digits: Vec<u8> = text
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(CODE_LEN)
            .map(|c| c as u8 - b'0')
            .collect();
        self.cells = [None; CODE_LEN];
        for (i, d) in digits.iter().enumerate() {
            self.cells[i] = Some(*d);
        }
        self.focus = digits.len().min(CODE_LEN - 1);
        self.completion()
    }

    /// Empty every cell and return focus to the first one.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn completion(&self) -> CodeEvent {
        match self.code() {
            Some(code) => CodeEvent::Complete(code),
            None => CodeEvent::Incomplete,
        }
    }
}
