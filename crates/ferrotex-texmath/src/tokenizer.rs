use crate::error::{TexError, TexErrorId};
use once_cell::sync::Lazy;
use regex::Regex;
use rowan::{TextRange, TextSize};

static DIMEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?(?:\.\d+|\d+(?:\.\d*)?))\s*(pt|em|ex|mu|px|mm|cm|in|pc)\s*$")
        .expect("dimension pattern is valid")
});

static CONTROL_WORD_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\\])(?:\\\\)*\\[a-zA-Z]+$").expect("control word pattern is valid")
});

static DIMEN_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?(?:\.\d+|\d+(?:\.\d*)?))\s*(pt|em|ex|mu|px|mm|cm|in|pc) ?")
        .expect("dimension pattern is valid")
});

/// A lexical unit of TeX source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Char(char),
    /// A control sequence, stored without its backslash.
    ControlSequence(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

/// A character-level scanner over TeX source.
///
/// ## Overview
///
/// Unlike a conventional lexer, the tokenizer is driven by the parser: macros
/// pull their own arguments out of the stream with [`get_argument`],
/// [`get_brackets`], [`get_delimiter`], [`get_dimension`] and [`get_up_to`].
/// Macro expansion rewrites the unread part of the buffer in place via
/// [`replace_rest`], which is why the tokenizer owns its text.
///
/// All errors carry the name of the macro that asked for the argument.
///
/// ## Examples
///
/// ```
/// use ferrotex_texmath::tokenizer::{Tokenizer, TokenKind};
///
/// let mut tok = Tokenizer::new(r"\frac{a+b}[2]");
/// let first = tok.next_token().unwrap();
/// assert_eq!(first.kind, TokenKind::ControlSequence("frac".into()));
/// assert_eq!(tok.get_argument(r"\frac").unwrap(), "a+b");
/// assert_eq!(tok.get_brackets(r"\frac").unwrap().as_deref(), Some("2"));
/// assert!(tok.is_at_end());
/// ```
///
/// [`get_argument`]: Tokenizer::get_argument
/// [`get_brackets`]: Tokenizer::get_brackets
/// [`get_delimiter`]: Tokenizer::get_delimiter
/// [`get_dimension`]: Tokenizer::get_dimension
/// [`get_up_to`]: Tokenizer::get_up_to
/// [`replace_rest`]: Tokenizer::replace_rest
#[derive(Debug, Clone)]
pub struct Tokenizer {
    buffer: String,
    pos: usize,
    max_buffer: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            buffer: source.to_string(),
            pos: 0,
            max_buffer: usize::MAX,
        }
    }

    pub fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    /// Byte offset of the cursor in the current buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buffer.len()
    }

    /// The unread part of the buffer.
    pub fn rest(&self) -> &str {
        &self.buffer[self.pos..]
    }

    /// Moves the cursor forward by `bytes`, clamped to the buffer end.
    pub fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.buffer.len());
    }

    pub fn range_from(&self, start: usize) -> TextRange {
        TextRange::new(
            TextSize::from(start as u32),
            TextSize::from(self.pos as u32),
        )
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Reads one character or control sequence.
    pub fn next_token(&mut self) -> Option<Token> {
        let start = self.pos;
        let c = self.next_char()?;
        let kind = if c == '\\' {
            TokenKind::ControlSequence(self.get_cs())
        } else {
            TokenKind::Char(c)
        };
        Some(Token {
            kind,
            range: self.range_from(start),
        })
    }

    /// Reads a control-sequence name after its backslash: a run of ASCII
    /// letters (eating one trailing space) or a single other character.
    /// Returns an empty name at end of input.
    pub fn get_cs(&mut self) -> String {
        let rest = self.rest();
        let letters = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if letters > 0 {
            let name = rest[..letters].to_string();
            self.pos += letters;
            if self.peek() == Some(' ') {
                self.pos += 1;
            }
            name
        } else {
            self.next_char().map(String::from).unwrap_or_default()
        }
    }

    pub fn skip_spaces(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Reads a `{...}` group (returning its contents), a control sequence, or
    /// a single character.
    pub fn get_argument(&mut self, name: &str) -> Result<String, TexError> {
        self.skip_spaces();
        match self.next_char() {
            None => Err(TexError::missing_arg(name)),
            Some('{') => self.read_group(name),
            Some('}') => Err(TexError::new(
                TexErrorId::ExtraCloseMissingOpen,
                "Extra close brace or missing open brace",
            )
            .with_context(name)),
            Some('\\') => Ok(format!("\\{}", self.get_cs())),
            Some(c) => Ok(c.to_string()),
        }
    }

    /// Reads up to the `}` matching an already consumed `{`.
    fn read_group(&mut self, name: &str) -> Result<String, TexError> {
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.next_char() {
            match c {
                '\\' => {
                    self.next_char();
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.buffer[start..self.pos - 1].to_string());
                    }
                }
                _ => {}
            }
        }
        Err(TexError::new(
            TexErrorId::ExtraOpenMissingClose,
            "Missing close brace",
        )
        .with_context(name))
    }

    /// Reads an optional `[...]` argument. Braces inside protect `]`.
    pub fn get_brackets(&mut self, name: &str) -> Result<Option<String>, TexError> {
        self.skip_spaces();
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.pos += 1;
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.next_char() {
            match c {
                '\\' => {
                    self.next_char();
                }
                '{' => depth += 1,
                '}' => {
                    if depth == 0 {
                        return Err(TexError::new(
                            TexErrorId::ExtraCloseLooking,
                            "Extra close brace while looking for ']'",
                        )
                        .with_context(name));
                    }
                    depth -= 1;
                }
                ']' if depth == 0 => {
                    return Ok(Some(self.buffer[start..self.pos - 1].to_string()));
                }
                _ => {}
            }
        }
        Err(TexError::new(
            TexErrorId::MissingCloseBracket,
            format!("Could not find closing ']' for argument to {name}"),
        )
        .with_context(name))
    }

    /// Reads a delimiter (a character or control sequence) accepted by
    /// `is_delimiter`. With `brace_ok`, a braced group is also accepted.
    pub fn get_delimiter(
        &mut self,
        name: &str,
        brace_ok: bool,
        is_delimiter: impl Fn(&str) -> bool,
    ) -> Result<String, TexError> {
        self.skip_spaces();
        let delim = match self.next_char() {
            Some('\\') => format!("\\{}", self.get_cs()),
            Some('{') if brace_ok => self.read_group(name)?.trim().to_string(),
            Some(c) => c.to_string(),
            None => String::new(),
        };
        if !delim.is_empty() && is_delimiter(&delim) {
            Ok(delim)
        } else {
            Err(TexError::new(
                TexErrorId::MissingOrUnrecognizedDelim,
                format!("Missing or unrecognized delimiter for {name}"),
            )
            .with_context(name))
        }
    }

    /// Reads a TeX dimension such as `2pt` or `{-.5em}` and returns it in
    /// normalized `<number><unit>` form.
    pub fn get_dimension(&mut self, name: &str) -> Result<String, TexError> {
        self.skip_spaces();
        let missing = || {
            TexError::new(
                TexErrorId::MissingDimOrUnits,
                format!("Missing dimension or its units for {name}"),
            )
            .with_context(name)
        };
        if self.peek() == Some('{') {
            let arg = self.get_argument(name)?;
            let caps = DIMEN.captures(&arg).ok_or_else(missing)?;
            return Ok(format!("{}{}", &caps[1], &caps[2]));
        }
        let (dimension, len) = {
            let caps = DIMEN_START.captures(self.rest()).ok_or_else(missing)?;
            (format!("{}{}", &caps[1], &caps[2]), caps[0].len())
        };
        self.pos += len;
        Ok(dimension)
    }

    /// Reads everything up to `token` at brace depth zero and consumes the
    /// token itself.
    pub fn get_up_to(&mut self, name: &str, token: &str) -> Result<String, TexError> {
        self.skip_spaces();
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            if depth == 0 && self.at_token(token) {
                let text = self.buffer[start..self.pos].to_string();
                self.pos += token.len();
                return Ok(text);
            }
            match self.next_char() {
                None => {
                    return Err(TexError::new(
                        TexErrorId::TokenNotFound,
                        format!("Could not find {token} for {name}"),
                    )
                    .with_context(name));
                }
                Some('\\') => {
                    self.get_cs();
                }
                Some('{') => depth += 1,
                Some('}') => {
                    if depth == 0 {
                        return Err(TexError::new(
                            TexErrorId::ExtraCloseLooking,
                            format!("Extra close brace while looking for {token}"),
                        )
                        .with_context(name));
                    }
                    depth -= 1;
                }
                Some(_) => {}
            }
        }
    }

    fn at_token(&self, token: &str) -> bool {
        let rest = self.rest();
        if token.is_empty() || !rest.starts_with(token) {
            return false;
        }
        let ends_in_letter = token.ends_with(|c: char| c.is_ascii_alphabetic());
        let followed_by_letter = rest[token.len()..].starts_with(|c: char| c.is_ascii_alphabetic());
        !(token.starts_with('\\') && ends_in_letter && followed_by_letter)
    }

    /// Replaces the unread input with `text` followed by the old unread input.
    pub fn replace_rest(&mut self, text: &str) -> Result<(), TexError> {
        let new_len = text.len() + self.buffer.len() - self.pos;
        if new_len > self.max_buffer {
            return Err(TexError::new(
                TexErrorId::MaxBufferSize,
                "Internal buffer size exceeded; is there a recursive macro call?",
            ));
        }
        self.buffer = join_args(text, self.rest());
        self.pos = 0;
        Ok(())
    }

    /// Steps back over `bytes` already read bytes.
    pub fn retreat(&mut self, bytes: usize) {
        self.pos = self.pos.saturating_sub(bytes);
    }
}

/// Concatenates two pieces of source, separating a trailing control word
/// from a following letter so `\alpha` + `b` does not become `\alphab`.
pub fn join_args(first: &str, second: &str) -> String {
    let mut joined = String::with_capacity(first.len() + second.len() + 1);
    joined.push_str(first);
    if second.starts_with(|c: char| c.is_ascii_alphabetic()) && CONTROL_WORD_END.is_match(first) {
        joined.push(' ');
    }
    joined.push_str(second);
    joined
}

/// Trims TeX whitespace, keeping a trailing space that ends a control word
/// (`\ `).
pub fn trim_spaces(text: &str) -> &str {
    let trimmed = text.trim();
    let start = text.len() - text.trim_start().len();
    let end = start + trimmed.len();
    if trimmed.ends_with('\\') && text[end..].starts_with(' ') {
        &text[start..end + 1]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<TokenKind> {
        let mut tok = Tokenizer::new(input);
        std::iter::from_fn(|| tok.next_token().map(|t| t.kind)).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokenize(r"x^\alpha \,"),
            vec![
                TokenKind::Char('x'),
                TokenKind::Char('^'),
                TokenKind::ControlSequence("alpha".into()),
                TokenKind::ControlSequence(",".into()),
            ]
        );
    }

    #[test]
    fn test_token_ranges() {
        let mut tok = Tokenizer::new(r"\beta x");
        let t = tok.next_token().unwrap();
        assert_eq!(t.range, TextRange::new(0.into(), 6.into()));
    }

    #[test]
    fn test_multi_byte_chars() {
        assert_eq!(tokenize("αβ"), vec![TokenKind::Char('α'), TokenKind::Char('β')]);
    }

    #[test]
    fn test_get_argument_forms() {
        let mut tok = Tokenizer::new(r"  {a{b}c} x \beta }");
        assert_eq!(tok.get_argument("\\f").unwrap(), "a{b}c");
        assert_eq!(tok.get_argument("\\f").unwrap(), "x");
        assert_eq!(tok.get_argument("\\f").unwrap(), "\\beta");
        let err = tok.get_argument("\\f").unwrap_err();
        assert_eq!(err.id, TexErrorId::ExtraCloseMissingOpen);
        let err = tok.get_argument("\\f").unwrap_err();
        assert_eq!(err.id, TexErrorId::MissingArgFor);
        assert_eq!(err.context.as_deref(), Some("\\f"));
    }

    #[test]
    fn test_unterminated_group() {
        let mut tok = Tokenizer::new("{a{b}");
        let err = tok.get_argument("\\sqrt").unwrap_err();
        assert_eq!(err.id, TexErrorId::ExtraOpenMissingClose);
    }

    #[test]
    fn test_escaped_brace_in_group() {
        let mut tok = Tokenizer::new(r"{a\}b}");
        assert_eq!(tok.get_argument("\\x").unwrap(), r"a\}b");
    }

    #[test]
    fn test_get_brackets() {
        let mut tok = Tokenizer::new("[{]}x]y");
        assert_eq!(tok.get_brackets("\\sqrt").unwrap().as_deref(), Some("{]}x"));
        assert_eq!(tok.get_brackets("\\sqrt").unwrap(), None);
        assert_eq!(tok.rest(), "y");

        let mut tok = Tokenizer::new("[abc");
        assert_eq!(
            tok.get_brackets("\\sqrt").unwrap_err().id,
            TexErrorId::MissingCloseBracket
        );
    }

    #[test]
    fn test_get_delimiter() {
        let is_delim = |d: &str| matches!(d, "(" | ")" | "\\langle" | ".");
        let mut tok = Tokenizer::new(r" ( \langle x");
        assert_eq!(tok.get_delimiter("\\left", false, is_delim).unwrap(), "(");
        assert_eq!(tok.get_delimiter("\\left", false, is_delim).unwrap(), "\\langle");
        assert_eq!(
            tok.get_delimiter("\\left", false, is_delim).unwrap_err().id,
            TexErrorId::MissingOrUnrecognizedDelim
        );
    }

    #[test]
    fn test_get_dimension() {
        let mut tok = Tokenizer::new("1.5em{-.5 pt}3");
        assert_eq!(tok.get_dimension("\\hspace").unwrap(), "1.5em");
        assert_eq!(tok.get_dimension("\\hspace").unwrap(), "-.5pt");
        assert_eq!(
            tok.get_dimension("\\hspace").unwrap_err().id,
            TexErrorId::MissingDimOrUnits
        );
    }

    #[test]
    fn test_get_up_to() {
        let mut tok = Tokenizer::new(r"#1{\end}#2\endx\end rest");
        assert_eq!(tok.get_up_to("\\def", "\\end").unwrap(), r"#1{\end}#2\endx");
        assert_eq!(tok.rest(), " rest");

        let mut tok = Tokenizer::new("abc");
        assert_eq!(
            tok.get_up_to("\\def", "{").unwrap_err().id,
            TexErrorId::TokenNotFound
        );
    }

    #[test]
    fn test_replace_rest_respects_limit() {
        let mut tok = Tokenizer::new("ab").with_max_buffer(4);
        tok.next_char();
        tok.replace_rest("xy").unwrap();
        assert_eq!(tok.rest(), "xyb");
        assert_eq!(tok.replace_rest("long").unwrap_err().id, TexErrorId::MaxBufferSize);
    }

    #[test]
    fn test_join_args_separates_control_words() {
        assert_eq!(join_args(r"\alpha", "b"), r"\alpha b");
        assert_eq!(join_args(r"\alpha", "{b}"), r"\alpha{b}");
        assert_eq!(join_args(r"\\", "b"), r"\\b");
        assert_eq!(join_args("x", "y"), "xy");
    }

    #[test]
    fn test_trim_spaces() {
        assert_eq!(trim_spaces("  x  "), "x");
        assert_eq!(trim_spaces(r" a\  "), r"a\ ");
    }
}
