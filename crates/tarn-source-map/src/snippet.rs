//! Caret snippets for diagnostics

/// Characters that terminate a rendered line in either direction.
fn is_break(ch: char) -> bool {
    matches!(ch, '\0' | '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

/// Render the line around `position` with a caret under it.
///
/// `position` is a character offset. Long lines are trimmed to roughly
/// `max_length` characters around the position, with ` ... ` ellipses on the
/// trimmed side. Returns `None` for positions outside the buffer.
pub fn render_snippet(
    buffer: &str,
    position: usize,
    indent: usize,
    max_length: usize,
) -> Option<String> {
    let chars: Vec<char> = buffer.chars().collect();
    if position > chars.len() {
        return None;
    }

    let half = max_length / 2;

    let mut head = "";
    let mut start = position;
    while start > 0 && !is_break(chars[start - 1]) {
        start -= 1;
        if position - start > half.saturating_sub(1) {
            head = " ... ";
            start += 5;
            break;
        }
    }

    let mut tail = "";
    let mut end = position;
    while end < chars.len() && !is_break(chars[end]) {
        end += 1;
        if end - position > half.saturating_sub(1) {
            tail = " ... ";
            end -= 5;
            break;
        }
    }

    let excerpt: String = chars[start..end].iter().collect();
    let pad = " ".repeat(indent);
    let caret_pad = " ".repeat(indent + (position - start) + head.len());

    Some(format!("{pad}{head}{excerpt}{tail}\n{caret_pad}^"))
}
