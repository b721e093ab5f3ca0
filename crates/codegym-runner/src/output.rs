//! Call-local capture of guest output.

/// Appended to output cut at the byte cap.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Byte-capped text buffer. Writes past the cap are dropped and the
/// result is marked as truncated.
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    cap: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        let room = self.cap.saturating_sub(self.text.len());
        if chunk.len() <= room {
            self.text.push_str(chunk);
            return;
        }
        let mut end = room;
        while !chunk.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&chunk[..end]);
        self.truncated = true;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Captured text, `None` if nothing was written.
    pub fn finish(self) -> Option<String> {
        if self.text.is_empty() && !self.truncated {
            return None;
        }
        let mut text = self.text;
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        Some(text)
    }
}

/// Line-capped sink for interpreter `print`/`debug` output.
#[derive(Debug)]
pub struct LineSink {
    lines: Vec<String>,
    max_lines: usize,
}

impl LineSink {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            max_lines,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if self.lines.len() < self.max_lines {
            self.lines.push(line.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn joined(&self) -> Option<String> {
        (!self.lines.is_empty()).then(|| self.lines.join("\n"))
    }
}
