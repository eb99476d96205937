//! Bounded diagnostic log
//!
//! Fixed-capacity FIFO of text lines. Once full, each push overwrites the
//! oldest line. Lines are never modified after insertion.

use crate::constants::log::CAPACITY;

#[derive(Debug, Clone)]
pub struct LogRingBuffer {
    slots: Vec<String>,
    /// Next slot to write
    head: usize,
    /// Number of valid lines, saturates at capacity
    count: usize,
}

impl LogRingBuffer {
    /// Ring with the device's default capacity
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![String::new(); capacity],
            head: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append a line, overwriting the oldest one when full
    pub fn push(&mut self, line: impl Into<String>) {
        let cap = self.slots.len();
        self.slots[self.head] = line.into();
        self.head = (self.head + 1) % cap;
        if self.count < cap {
            self.count += 1;
        }
    }

    /// Lines oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let cap = self.slots.len();
        let start = (self.head + cap - self.count) % cap;
        (0..self.count).map(move |i| self.slots[(start + i) % cap].as_str())
    }

    pub fn read_all(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    /// Plain-text rendering served on `/api/logs`: one line per entry, each
    /// newline-terminated
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for line in self.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
