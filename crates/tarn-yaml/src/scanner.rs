//! Low-level reading: whitespace, line breaks, document separators and the
//! five scalar styles.
//!
//! The functions here operate on the shared [`Loader`] state. They know
//! nothing about collections or tags; the composer in [`crate::loader`]
//! drives them according to the block/flow context.

use crate::error::{ErrorKind, Result};
use crate::loader::{Loader, Produced};
use crate::schema::Kind;

/// Chomping behavior of a block scalar header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chomping {
    Clip,
    Strip,
    Keep,
}

pub(crate) fn is_eol(c: char) -> bool {
    c == '\n' || c == '\r'
}

pub(crate) fn is_white_space(c: char) -> bool {
    c == '\t' || c == ' '
}

pub(crate) fn is_ws_or_eol(c: char) -> bool {
    is_white_space(c) || is_eol(c)
}

pub(crate) fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

/// The YAML printable set; everything else must be escaped in output and is
/// rejected in input.
pub(crate) fn is_printable(c: char) -> bool {
    let v = c as u32;
    v == 0x09
        || v == 0x0A
        || v == 0x0D
        || (0x20..=0x7E).contains(&v)
        || v == 0x85
        || (0xA0..=0xD7FF).contains(&v) && v != 0x2028 && v != 0x2029
        || (0xE000..=0xFFFD).contains(&v) && v != 0xFEFF
        || v > 0xFFFF
}

fn from_hex_code(c: char) -> Option<u32> {
    c.to_digit(16)
}

fn escaped_hex_len(c: char) -> usize {
    match c {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        _ => 0,
    }
}

fn simple_escape(c: char) -> Option<char> {
    Some(match c {
        '0' => '\0',
        'a' => '\u{07}',
        'b' => '\u{08}',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\u{0B}',
        'f' => '\u{0C}',
        'r' => '\r',
        'e' => '\u{1B}',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{A0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

impl<'a> Loader<'a> {
    /// Current character, `'\0'` past the end.
    pub(crate) fn ch(&self) -> char {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> char {
        self.input.get(self.position + offset).copied().unwrap_or('\0')
    }

    /// Append `input[start..end]` to the scalar under construction,
    /// validating printability (or the JSON character set for quoted
    /// styles).
    pub(crate) fn capture_segment(&mut self, start: usize, end: usize, check_json: bool) -> Result<()> {
        if start >= end {
            return Ok(());
        }

        for i in start..end {
            let c = self.input[i];
            if check_json {
                let v = c as u32;
                if !(v == 0x09 || v >= 0x20) {
                    return self.fail(ErrorKind::Structural, "expected valid JSON character");
                }
            } else if !is_printable(c) {
                return self.fail(
                    ErrorKind::Structural,
                    "the stream contains non-printable characters",
                );
            }
        }

        let segment: String = self.input[start..end].iter().collect();
        if let Produced::Raw(buf) = &mut self.result {
            buf.push_str(&segment);
        }
        Ok(())
    }

    pub(crate) fn read_line_break(&mut self) -> Result<()> {
        match self.ch() {
            '\n' => self.position += 1,
            '\r' => {
                self.position += 1;
                if self.ch() == '\n' {
                    self.position += 1;
                }
            }
            _ => return self.fail(ErrorKind::Structural, "a line break is expected"),
        }
        self.line += 1;
        self.line_start = self.position;
        Ok(())
    }

    /// Skip whitespace, comments and line breaks. Returns the number of line
    /// breaks consumed. With `check_indent >= 0`, resuming on a line
    /// indented less than that produces a warning (flow collections and
    /// multi-line quoted scalars tolerate it).
    pub(crate) fn skip_separation_space(
        &mut self,
        allow_comments: bool,
        check_indent: i64,
    ) -> Result<usize> {
        let mut line_breaks = 0;
        let mut warned_tab = false;

        while self.ch() != '\0' {
            while is_white_space(self.ch()) {
                if self.ch() == '\t' && !warned_tab && self.position > self.line_start {
                    warned_tab = true;
                    self.warn("tab characters are used as separation whitespace");
                }
                self.position += 1;
            }

            if allow_comments && self.ch() == '#' {
                while !is_eol(self.ch()) && self.ch() != '\0' {
                    self.position += 1;
                }
            }

            if is_eol(self.ch()) {
                self.read_line_break()?;
                line_breaks += 1;
                self.line_indent = 0;

                loop {
                    if self.ch() == ' ' {
                        self.line_indent += 1;
                        self.position += 1;
                    } else if self.ch() == '\t' {
                        // Tabs never count as indentation. In block context
                        // that position is indentation-significant and the
                        // tab is fatal, unless the rest of the line is only
                        // whitespace or a comment; flow collections and
                        // quoted scalars tolerate it with a warning.
                        if check_indent == -1 && !self.rest_of_line_is_blank_or_comment() {
                            return self.fail(
                                ErrorKind::Structural,
                                "found a tab character where an indentation space is expected",
                            );
                        }
                        if !warned_tab {
                            warned_tab = true;
                            self.warn("tab characters are used as separation whitespace");
                        }
                        self.position += 1;
                    } else {
                        break;
                    }
                }
            } else {
                break;
            }
        }

        if check_indent != -1 && line_breaks != 0 && self.line_indent < check_indent {
            self.warn("deficient indentation");
        }

        Ok(line_breaks)
    }

    fn rest_of_line_is_blank_or_comment(&self) -> bool {
        let mut offset = 0;
        while is_white_space(self.peek_at(offset)) {
            offset += 1;
        }
        matches!(self.peek_at(offset), '#' | '\r' | '\n' | '\0')
    }

    /// `---` or `...` at column 0 followed by whitespace or the end.
    pub(crate) fn test_document_separator(&self) -> bool {
        let c = self.ch();
        if (c == '-' || c == '.') && self.peek_at(1) == c && self.peek_at(2) == c {
            let after = self.peek_at(3);
            return after == '\0' || is_ws_or_eol(after);
        }
        false
    }

    /// Fold `count` consumed line breaks into scalar content: one break is a
    /// space, further breaks each contribute a newline.
    pub(crate) fn write_folded_lines(&mut self, count: usize) {
        if let Produced::Raw(buf) = &mut self.result {
            if count == 1 {
                buf.push(' ');
            } else if count > 1 {
                for _ in 0..count - 1 {
                    buf.push('\n');
                }
            }
        }
    }

    pub(crate) fn read_plain_scalar(&mut self, node_indent: i64, within_flow: bool) -> Result<bool> {
        let mut c = self.ch();

        if is_ws_or_eol(c)
            || is_flow_indicator(c)
            || matches!(c, '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`' | '\0')
        {
            return Ok(false);
        }

        if c == '?' || c == '-' {
            let following = self.peek_at(1);
            if is_ws_or_eol(following) || following == '\0' || (within_flow && is_flow_indicator(following)) {
                return Ok(false);
            }
        }

        let prev_kind = self.kind;
        let prev_result = std::mem::replace(&mut self.result, Produced::Raw(String::new()));
        self.kind = Some(Kind::Scalar);

        let mut capture_start = self.position;
        let mut capture_end = self.position;
        let mut has_pending_content = false;
        let mut saved_line = 0;
        let mut saved_line_start = 0;
        let mut saved_line_indent = 0;

        while c != '\0' {
            if c == ':' {
                let following = self.peek_at(1);
                if is_ws_or_eol(following)
                    || following == '\0'
                    || (within_flow && is_flow_indicator(following))
                {
                    break;
                }
            } else if c == '#' {
                if self.position > 0 && is_ws_or_eol(self.input[self.position - 1]) {
                    break;
                }
            } else if (self.position == self.line_start && self.test_document_separator())
                || (within_flow && is_flow_indicator(c))
            {
                break;
            } else if is_eol(c) {
                saved_line = self.line;
                saved_line_start = self.line_start;
                saved_line_indent = self.line_indent;
                self.skip_separation_space(false, -1)?;

                if self.line_indent >= node_indent {
                    has_pending_content = true;
                    c = self.ch();
                    continue;
                } else {
                    self.position = capture_end;
                    self.line = saved_line;
                    self.line_start = saved_line_start;
                    self.line_indent = saved_line_indent;
                    break;
                }
            }

            if has_pending_content {
                self.capture_segment(capture_start, capture_end, false)?;
                let folded = self.line - saved_line;
                self.write_folded_lines(folded);
                capture_start = self.position;
                capture_end = self.position;
                has_pending_content = false;
            }

            if !is_white_space(c) {
                capture_end = self.position + 1;
            }

            self.position += 1;
            c = self.ch();
        }

        self.capture_segment(capture_start, capture_end, false)?;

        if matches!(&self.result, Produced::Raw(s) if !s.is_empty()) {
            return Ok(true);
        }

        self.kind = prev_kind;
        self.result = prev_result;
        Ok(false)
    }

    pub(crate) fn read_single_quoted_scalar(&mut self, node_indent: i64) -> Result<bool> {
        if self.ch() != '\'' {
            return Ok(false);
        }

        self.kind = Some(Kind::Scalar);
        self.result = Produced::Raw(String::new());
        self.position += 1;

        let mut capture_start = self.position;
        let mut capture_end = self.position;

        loop {
            let c = self.ch();
            if c == '\0' {
                break;
            }

            if c == '\'' {
                self.capture_segment(capture_start, self.position, true)?;
                self.position += 1;
                if self.ch() == '\'' {
                    // Escaped quote.
                    capture_start = self.position;
                    self.position += 1;
                    capture_end = self.position;
                } else {
                    return Ok(true);
                }
            } else if is_eol(c) {
                self.capture_segment(capture_start, capture_end, true)?;
                let breaks = self.skip_separation_space(false, node_indent)?;
                self.write_folded_lines(breaks);
                capture_start = self.position;
                capture_end = self.position;
            } else if self.position == self.line_start && self.test_document_separator() {
                return self.fail(
                    ErrorKind::Structural,
                    "unexpected end of the document within a single quoted scalar",
                );
            } else {
                self.position += 1;
                capture_end = self.position;
            }
        }

        self.fail(
            ErrorKind::Structural,
            "unexpected end of the stream within a single quoted scalar",
        )
    }

    pub(crate) fn read_double_quoted_scalar(&mut self, node_indent: i64) -> Result<bool> {
        if self.ch() != '"' {
            return Ok(false);
        }

        self.kind = Some(Kind::Scalar);
        self.result = Produced::Raw(String::new());
        self.position += 1;

        let mut capture_start = self.position;
        let mut capture_end = self.position;

        loop {
            let c = self.ch();
            if c == '\0' {
                break;
            }

            if c == '"' {
                self.capture_segment(capture_start, self.position, true)?;
                self.position += 1;
                return Ok(true);
            } else if c == '\\' {
                self.capture_segment(capture_start, self.position, true)?;
                self.position += 1;
                let escaped = self.ch();

                if is_eol(escaped) {
                    // An escaped line break is consumed entirely.
                    self.skip_separation_space(false, node_indent)?;
                } else if let Some(replacement) = simple_escape(escaped) {
                    if let Produced::Raw(buf) = &mut self.result {
                        buf.push(replacement);
                    }
                    self.position += 1;
                } else {
                    let hex_len = escaped_hex_len(escaped);
                    if hex_len > 0 {
                        let mut value: u32 = 0;
                        for _ in 0..hex_len {
                            self.position += 1;
                            match from_hex_code(self.ch()) {
                                Some(digit) => value = (value << 4) + digit,
                                None => {
                                    return self.fail(
                                        ErrorKind::Structural,
                                        "expected hexadecimal character",
                                    );
                                }
                            }
                        }
                        match char::from_u32(value) {
                            Some(decoded) => {
                                if let Produced::Raw(buf) = &mut self.result {
                                    buf.push(decoded);
                                }
                            }
                            None => {
                                return self.fail(
                                    ErrorKind::Structural,
                                    "expected a valid Unicode codepoint in escape sequence",
                                );
                            }
                        }
                        self.position += 1;
                    } else {
                        return self.fail(ErrorKind::Structural, "unknown escape sequence");
                    }
                }

                capture_start = self.position;
                capture_end = self.position;
            } else if is_eol(c) {
                self.capture_segment(capture_start, capture_end, true)?;
                let breaks = self.skip_separation_space(false, node_indent)?;
                self.write_folded_lines(breaks);
                capture_start = self.position;
                capture_end = self.position;
            } else if self.position == self.line_start && self.test_document_separator() {
                return self.fail(
                    ErrorKind::Structural,
                    "unexpected end of the document within a double quoted scalar",
                );
            } else {
                self.position += 1;
                capture_end = self.position;
            }
        }

        self.fail(
            ErrorKind::Structural,
            "unexpected end of the stream within a double quoted scalar",
        )
    }

    pub(crate) fn read_block_scalar(&mut self, node_indent: i64) -> Result<bool> {
        let folding = match self.ch() {
            '|' => false,
            '>' => true,
            _ => return Ok(false),
        };

        self.kind = Some(Kind::Scalar);
        self.result = Produced::Raw(String::new());

        let mut chomping = Chomping::Clip;
        let mut did_read_content = false;
        let mut detected_indent = false;
        let mut text_indent = node_indent;
        let mut empty_lines: usize = 0;
        let mut at_more_indented = false;

        // Header: chomping indicator and/or explicit indentation indicator,
        // in either order, at most one of each.
        loop {
            self.position += 1;
            let c = self.ch();
            match c {
                '+' | '-' => {
                    if chomping != Chomping::Clip {
                        return self.fail(
                            ErrorKind::Structural,
                            "repeat of a chomping mode identifier",
                        );
                    }
                    chomping = if c == '+' { Chomping::Keep } else { Chomping::Strip };
                }
                '0' => {
                    return self.fail(
                        ErrorKind::Structural,
                        "bad explicit indentation width of a block scalar; it cannot be less than one",
                    );
                }
                '1'..='9' => {
                    if detected_indent {
                        return self.fail(
                            ErrorKind::Structural,
                            "repeat of an indentation width identifier",
                        );
                    }
                    text_indent = node_indent + (c as i64 - '0' as i64) - 1;
                    detected_indent = true;
                }
                _ => break,
            }
        }

        if is_white_space(self.ch()) {
            while is_white_space(self.ch()) {
                self.position += 1;
            }
            if self.ch() == '#' {
                while !is_eol(self.ch()) && self.ch() != '\0' {
                    self.position += 1;
                }
            }
        }

        while self.ch() != '\0' {
            self.read_line_break()?;
            self.line_indent = 0;

            while (!detected_indent || self.line_indent < text_indent) && self.ch() == ' ' {
                self.line_indent += 1;
                self.position += 1;
            }

            if !detected_indent && self.line_indent > text_indent {
                text_indent = self.line_indent;
            }

            if is_eol(self.ch()) {
                empty_lines += 1;
                continue;
            }

            // End of the scalar: perform the chomping.
            if self.line_indent < text_indent {
                match chomping {
                    Chomping::Keep => {
                        let count = if did_read_content { 1 + empty_lines } else { empty_lines };
                        self.raw_push_newlines(count);
                    }
                    Chomping::Clip => {
                        if did_read_content {
                            self.raw_push_newlines(1);
                        }
                    }
                    Chomping::Strip => {}
                }
                break;
            }

            if folding {
                if is_white_space(self.ch()) {
                    // More-indented lines are kept verbatim, except that the
                    // first content line carries no leading break.
                    at_more_indented = true;
                    let count = if did_read_content { 1 + empty_lines } else { empty_lines };
                    self.raw_push_newlines(count);
                } else if at_more_indented {
                    at_more_indented = false;
                    self.raw_push_newlines(empty_lines + 1);
                } else if empty_lines == 0 {
                    if did_read_content {
                        self.raw_push(' ');
                    }
                } else {
                    self.raw_push_newlines(empty_lines);
                }
            } else {
                let count = if did_read_content { 1 + empty_lines } else { empty_lines };
                self.raw_push_newlines(count);
            }

            did_read_content = true;
            detected_indent = true;
            empty_lines = 0;
            let capture_start = self.position;

            while !is_eol(self.ch()) && self.ch() != '\0' {
                self.position += 1;
            }
            self.capture_segment(capture_start, self.position, false)?;
        }

        Ok(true)
    }

    fn raw_push(&mut self, c: char) {
        if let Produced::Raw(buf) = &mut self.result {
            buf.push(c);
        }
    }

    fn raw_push_newlines(&mut self, count: usize) {
        for _ in 0..count {
            self.raw_push('\n');
        }
    }
}
