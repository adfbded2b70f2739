/// Splitting outgoing messages that exceed the service length limit
///
/// The service caps single-line posts at a fixed character count but exempts
/// messages containing a newline, so splitting only ever applies to
/// single-line text.

/// How to break an over-long single-line message into multiple posts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Do not split; truncate to the limit
    None,
    /// Split at word boundaries
    Word,
    /// Split at newlines, packing whole lines into each part
    Newline,
}

impl SplitStrategy {
    /// Split `text` into parts of at most `max_len` characters.
    ///
    /// Always returns at least one part. Text within the limit is returned
    /// unchanged as a single part.
    pub fn split(&self, text: &str, max_len: usize) -> Vec<String> {
        if max_len == 0 || text.chars().count() <= max_len {
            return vec![text.to_string()];
        }

        match self {
            SplitStrategy::None => vec![truncate_chars(text, max_len)],
            SplitStrategy::Word => split_words(text, max_len),
            SplitStrategy::Newline => split_lines(text, max_len),
        }
    }
}

/// First `max_len` characters of `text`, respecting char boundaries
fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

fn split_words(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= max_len {
            parts.push(chars[start..].iter().collect::<String>().trim().to_string());
            break;
        }

        // Break at the last space inside the window; hard cut if there is none
        let limit = start + max_len;
        let end = if chars[limit].is_whitespace() {
            limit
        } else {
            match chars[start..limit].iter().rposition(|c| c.is_whitespace()) {
                Some(pos) if pos > 0 => start + pos,
                _ => limit,
            }
        };

        parts.push(chars[start..end].iter().collect::<String>().trim().to_string());
        start = end;

        // Skip the whitespace the cut landed on
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }

    parts.retain(|p| !p.is_empty());
    if parts.is_empty() {
        parts.push(String::new());
    }
    parts
}

fn split_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();

        if line_len > max_len {
            // A single oversized line falls back to hard cuts
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            for chunk in chars.chunks(max_len) {
                parts.push(chunk.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > max_len && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current.is_empty() {
            current.push_str(line);
            current_len = line_len;
        } else {
            current.push('\n');
            current.push_str(line);
            current_len += 1 + line_len;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    if parts.is_empty() {
        parts.push(String::new());
    }
    parts
}
