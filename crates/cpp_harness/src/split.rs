/// Bracket depth tracker for `()`, `[]` and `<>`.
#[derive(Debug, Default, Clone, Copy)]
struct Depth {
    paren: usize,
    square: usize,
    angle: usize,
}

impl Depth {
    fn feed(&mut self, c: char) {
        match c {
            '(' => self.paren += 1,
            ')' => self.paren = self.paren.saturating_sub(1),
            '[' => self.square += 1,
            ']' => self.square = self.square.saturating_sub(1),
            '<' => self.angle += 1,
            '>' => self.angle = self.angle.saturating_sub(1),
            _ => {}
        }
    }

    fn is_top(&self) -> bool {
        self.paren == 0 && self.square == 0 && self.angle == 0
    }
}

/// Split `text` at every `sep` that is not nested inside brackets.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = Depth::default();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == sep && depth.is_top() {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        } else {
            depth.feed(c);
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split at top-level whitespace, so `map<int, int> m` is two words.
pub fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut depth = Depth::default();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() && depth.is_top() {
            if let Some(s) = start.take() {
                words.push(&text[s..i]);
            }
            continue;
        }
        depth.feed(c);
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    words
}

/// Offset of the first `:` at bracket depth zero that is not part of `::`.
pub fn find_single_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = Depth::default();
    for (i, c) in text.char_indices() {
        if c == ':' && depth.is_top() {
            let prev = i > 0 && bytes[i - 1] == b':';
            let next = bytes.get(i + 1) == Some(&b':');
            if !prev && !next {
                return Some(i);
            }
        }
        depth.feed(c);
    }
    None
}

/// Offset of the bracket closing the one opened at `open`.
pub fn matching_close(text: &str, open: usize, left: u8, right: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(open) {
        if b == left {
            depth += 1;
        } else if b == right {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
