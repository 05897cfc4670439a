//! Greedy word wrapping against a measured width.

/// Splits `text` into lines no wider than `max_width` as reported by `measure`.
///
/// Words are appended one at a time. A candidate line is measured with a
/// trailing space; when it overflows and the line already holds a word, the
/// line is committed without the overflowing word, which starts the next
/// line. A single word wider than `max_width` therefore gets a line of its own.
/// The last line is always committed. Empty input gives no lines.
pub fn wrap_words<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };

        if measure(&format!("{} ", candidate)) > max_width && !line.is_empty() {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
