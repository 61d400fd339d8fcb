/// Lexical state of a JSON text read one character at a time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JsonScanState {
    depth: i32,
    in_string: bool,
    escaped: bool,
}

impl JsonScanState {
    pub fn feed(&mut self, c: char) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return;
        }
        match c {
            '"' => self.in_string = true,
            '{' | '[' => self.depth += 1,
            '}' | ']' => self.depth -= 1,
            _ => {}
        }
    }

    pub fn in_string(&self) -> bool {
        self.in_string
    }

    /// Every bracket opened so far has been closed and no string is open
    pub fn is_balanced(&self) -> bool {
        self.depth == 0 && !self.in_string
    }
}

pub fn is_balanced(text: &str) -> bool {
    let mut state = JsonScanState::default();
    for c in text.chars() {
        state.feed(c);
        if state.depth < 0 {
            return false;
        }
    }
    state.is_balanced()
}

/// Byte offset of the first `needle` that does not sit inside a JSON string literal
pub fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let mut state = JsonScanState::default();
    for (index, c) in haystack.char_indices() {
        if !state.in_string() && haystack[index..].starts_with(needle) {
            return Some(index);
        }
        state.feed(c);
    }
    None
}
