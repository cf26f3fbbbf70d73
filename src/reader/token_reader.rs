//! Low-level JSON tokenizer
//!
//! Produces scalar tokens and structural delimiters from the input byte
//! slice, with one token of pushback. In lazy-read mode tokens are
//! reconstructed from the descriptor table built by a pre-process pass
//! instead of rescanning bytes.

use std::ops::Range;

use super::skeleton::{ComputedValue, DescriptorCursor};
use super::{ReaderBuffers, ReaderError, SyntaxError, SyntaxErrorKind, TypeError, ValueKind};
use crate::number::{self, JsonNumber, NumberProps};
use crate::utf8;

/// Location of string value bytes
///
/// `Raw` is a slice of the input document between the quotes, escape
/// sequences unresolved (scan-only mode and member names). `Decoded` is a
/// slice of the char arena holding the unescaped contents, alongside the raw
/// input range the contents came from.
#[derive(PartialEq, Eq, Clone, Debug)]
pub(super) enum StringToken {
    Raw(Range<usize>),
    Decoded {
        arena: Range<usize>,
        raw: Range<usize>,
    },
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub(super) enum Token {
    Null,
    Bool(bool),
    Number(NumberProps),
    String(StringToken),
    Delimiter(u8),
}

impl Token {
    /// Kind of JSON value this token introduces; `None` for delimiters which
    /// do not begin a value
    fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Token::Null => Some(ValueKind::Null),
            Token::Bool(_) => Some(ValueKind::Boolean),
            Token::Number(_) => Some(ValueKind::Number),
            Token::String(_) => Some(ValueKind::String),
            Token::Delimiter(b'[') => Some(ValueKind::Array),
            Token::Delimiter(b'{') => Some(ValueKind::Object),
            Token::Delimiter(_) => None,
        }
    }

    /// Short rendering for diagnostics: the value kind, or the quoted
    /// delimiter character
    fn description(&self) -> String {
        match self.value_kind() {
            Some(kind) => kind.to_string(),
            None => match self {
                Token::Delimiter(b) => format!("'{}'", *b as char),
                _ => String::new(),
            },
        }
    }
}

/// A value-starting token, as consumed by `any`
#[derive(PartialEq, Eq, Clone, Debug)]
pub(super) enum ScannedValue {
    Null,
    Bool(bool),
    Number(NumberProps),
    String(StringToken),
    ArrayStart,
    ObjectStart,
}

impl ScannedValue {
    pub(super) fn kind(&self) -> ValueKind {
        match self {
            ScannedValue::Null => ValueKind::Null,
            ScannedValue::Bool(_) => ValueKind::Boolean,
            ScannedValue::Number(_) => ValueKind::Number,
            ScannedValue::String(_) => ValueKind::String,
            ScannedValue::ArrayStart => ValueKind::Array,
            ScannedValue::ObjectStart => ValueKind::Object,
        }
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub(super) struct ReaderOptions {
    /// Whether a pre-process walk is recording descriptors and computed values
    pub(super) lazy_parse: bool,
    /// Whether tokens are served from the descriptor table
    pub(super) lazy_read: bool,
    /// Whether string values are unescaped into the char arena
    pub(super) compute_strings: bool,
    /// Whether numbers are captured into the computed-numbers buffer
    pub(super) compute_numbers: bool,
    /// Whether the string currently being read is a member name
    pub(super) read_key: bool,
    /// Whether numeric conversions reparse the raw literal
    pub(super) read_raw_numbers: bool,
}

pub(super) struct TokenReader<'j> {
    pub(super) data: &'j [u8],
    pub(super) pos: usize,
    /// Offset at which the most recent token started, for diagnostics
    pub(super) last_pos: usize,
    unread: Option<Token>,
    pub(super) buffers: ReaderBuffers,
    pub(super) cursor: DescriptorCursor,
    pub(super) options: ReaderOptions,
}

impl<'j> TokenReader<'j> {
    pub(super) fn new(data: &'j [u8], buffers: ReaderBuffers) -> Self {
        let mut tr = TokenReader {
            data,
            pos: 0,
            last_pos: 0,
            unread: None,
            buffers,
            cursor: DescriptorCursor::default(),
            options: ReaderOptions::default(),
        };
        tr.reset(data);
        tr
    }

    pub(super) fn reset(&mut self, data: &'j [u8]) {
        self.data = data;
        self.pos = 0;
        self.last_pos = 0;
        self.unread = None;
        self.cursor.pos = 0;
        self.clear_index_buffers();
        self.options = ReaderOptions {
            compute_strings: self.buffers.string_values.is_some(),
            compute_numbers: self.buffers.number_values.is_some(),
            ..ReaderOptions::default()
        };
    }

    pub(super) fn into_buffers(self) -> ReaderBuffers {
        self.buffers
    }

    /// Truncates the descriptor table, char arena and computed-value buffers,
    /// keeping their capacity
    pub(super) fn clear_index_buffers(&mut self) {
        self.buffers.descriptors.clear();
        self.buffers.chars.clear();
        if let Some(values) = &mut self.buffers.string_values {
            values.clear();
        }
        if let Some(values) = &mut self.buffers.number_values {
            values.clear();
        }
    }

    /// True if only whitespace remains
    pub(super) fn eof(&mut self) -> bool {
        if self.unread.is_some() {
            return false;
        }
        if self.options.lazy_read {
            return !self.cursor.has_next(&self.buffers.descriptors);
        }
        self.skip_whitespace().is_none()
    }

    /// Advances past whitespace and returns the next byte without consuming
    /// it, recording its offset as the token start
    fn skip_whitespace(&mut self) -> Option<u8> {
        while let Some(&b) = self.data.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                self.pos += 1;
            } else {
                self.last_pos = self.pos;
                return Some(b);
            }
        }
        None
    }

    fn put_back(&mut self, token: Token) {
        self.unread = Some(token);
    }

    fn unexpected_end(&self) -> ReaderError {
        SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEnd,
            value: None,
            offset: self.pos,
        }
        .into()
    }

    fn unexpected_char(&self, b: u8) -> ReaderError {
        SyntaxError {
            kind: SyntaxErrorKind::UnexpectedCharacter,
            value: Some(char::from(b).to_string()),
            offset: self.last_pos,
        }
        .into()
    }

    fn invalid_string(&self) -> ReaderError {
        SyntaxError {
            kind: SyntaxErrorKind::InvalidString,
            value: None,
            offset: self.last_pos,
        }
        .into()
    }

    /// Parses and consumes the next token; a pushed-back token is returned
    /// first
    fn next(&mut self) -> Result<Token, ReaderError> {
        if let Some(token) = self.unread.take() {
            return Ok(token);
        }
        if self.options.lazy_read {
            return self.next_from_descriptor();
        }
        let b = match self.skip_whitespace() {
            Some(b) => b,
            None => return Err(self.unexpected_end()),
        };
        match b {
            b'a'..=b'z' => self.read_symbol(),
            b'-' | b'0'..=b'9' => self.read_number(),
            b'"' => {
                self.pos += 1;
                let token = self.read_string()?;
                Ok(Token::String(token))
            }
            b'[' | b']' | b'{' | b'}' | b':' | b',' => {
                self.pos += 1;
                Ok(Token::Delimiter(b))
            }
            _ => Err(self.unexpected_char(b)),
        }
    }

    /// Serves the next token from the descriptor table instead of the bytes
    fn next_from_descriptor(&mut self) -> Result<Token, ReaderError> {
        let descriptor = match self.cursor.current(&self.buffers.descriptors) {
            Some(descriptor) => descriptor.clone(),
            None => return Err(self.unexpected_end()),
        };
        self.last_pos = descriptor.start;
        let b = match self.data.get(descriptor.start) {
            Some(&b) => b,
            None => return Err(self.unexpected_end()),
        };
        match b {
            b'a'..=b'z' => {
                self.cursor.advance(&self.buffers.descriptors);
                match b {
                    b'n' => Ok(Token::Null),
                    b't' => Ok(Token::Bool(true)),
                    b'f' => Ok(Token::Bool(false)),
                    _ => Err(SyntaxError {
                        kind: SyntaxErrorKind::UnexpectedSymbol,
                        value: Some(char::from(b).to_string()),
                        offset: descriptor.start,
                    }
                    .into()),
                }
            }
            b'-' | b'0'..=b'9' => {
                let captured = match descriptor.computed {
                    Some(ComputedValue::Number(index)) => self
                        .buffers
                        .number_values
                        .as_ref()
                        .and_then(|values| values.get(index))
                        .cloned(),
                    _ => None,
                };
                // without a captured value the literal is re-scanned so that
                // lazy reads return exactly what streaming reads would
                let props = match captured {
                    Some(props) => props,
                    None => match number::scan_number(self.data, descriptor.start) {
                        Some(props) => props,
                        None => {
                            return Err(SyntaxError {
                                kind: SyntaxErrorKind::InvalidNumber,
                                value: None,
                                offset: descriptor.start,
                            }
                            .into())
                        }
                    },
                };
                self.cursor.advance(&self.buffers.descriptors);
                Ok(Token::Number(props))
            }
            b'"' => {
                let raw = descriptor.start + 1..descriptor.end.saturating_sub(1);
                let token = match descriptor.computed {
                    Some(ComputedValue::String(index)) if !self.options.read_key => {
                        match self.buffers.string_values.as_ref().and_then(|v| v.get(index)) {
                            Some(span) => StringToken::Decoded {
                                arena: span.clone(),
                                raw,
                            },
                            None => StringToken::Raw(raw),
                        }
                    }
                    _ => StringToken::Raw(raw),
                };
                self.cursor.advance(&self.buffers.descriptors);
                Ok(Token::String(token))
            }
            b'[' | b'{' => Ok(Token::Delimiter(b)),
            _ => Err(self.unexpected_char(b)),
        }
    }

    fn read_symbol(&mut self) -> Result<Token, ReaderError> {
        let start = self.pos;
        let mut end = self.pos;
        while let Some(&b) = self.data.get(end) {
            if b.is_ascii_lowercase() {
                end += 1;
            } else {
                break;
            }
        }
        self.pos = end;
        match &self.data[start..end] {
            b"null" => Ok(Token::Null),
            b"true" => Ok(Token::Bool(true)),
            b"false" => Ok(Token::Bool(false)),
            symbol => Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedSymbol,
                value: Some(String::from_utf8_lossy(symbol).into_owned()),
                offset: start,
            }
            .into()),
        }
    }

    fn read_number(&mut self) -> Result<Token, ReaderError> {
        match number::scan_number(self.data, self.pos) {
            Some(props) => {
                self.pos = props.raw.end;
                if self.options.lazy_parse && self.options.compute_numbers {
                    if let Some(values) = &mut self.buffers.number_values {
                        values.push(props.clone());
                    }
                }
                Ok(Token::Number(props))
            }
            None => Err(SyntaxError {
                kind: SyntaxErrorKind::InvalidNumber,
                value: None,
                offset: self.last_pos,
            }
            .into()),
        }
    }

    /// Reads a string whose opening quote has been consumed
    fn read_string(&mut self) -> Result<StringToken, ReaderError> {
        if self.options.read_key || !self.options.compute_strings {
            self.scan_string()
        } else {
            self.decode_string()
        }
    }

    /// Locates the string bounds without decoding or validating escapes
    fn scan_string(&mut self) -> Result<StringToken, ReaderError> {
        let start = self.pos;
        let mut escaped = false;
        while let Some(&b) = self.data.get(self.pos) {
            self.pos += 1;
            if b == b'\\' {
                escaped = !escaped;
            } else if b == b'"' && !escaped {
                return Ok(StringToken::Raw(start..self.pos - 1));
            } else {
                escaped = false;
            }
        }
        Err(self.invalid_string())
    }

    /// Copies the string into the char arena, resolving escape sequences
    fn decode_string(&mut self) -> Result<StringToken, ReaderError> {
        let raw_start = self.pos;
        let arena_start = self.buffers.chars.len();
        loop {
            let b = match self.data.get(self.pos) {
                Some(&b) => b,
                None => return Err(self.invalid_string()),
            };
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => self.decode_escape()?,
                _ if b < 0x80 => self.buffers.chars.push(b),
                _ => self.copy_multibyte(b)?,
            }
        }
        let raw = raw_start..self.pos - 1;
        let arena = arena_start..self.buffers.chars.len();
        if self.options.lazy_parse {
            if let Some(values) = &mut self.buffers.string_values {
                values.push(arena.clone());
            }
        }
        Ok(StringToken::Decoded { arena, raw })
    }

    /// Decodes the escape sequence following a consumed `\`
    fn decode_escape(&mut self) -> Result<(), ReaderError> {
        let b = match self.data.get(self.pos) {
            Some(&b) => b,
            None => return Err(self.invalid_string()),
        };
        self.pos += 1;
        let decoded = match b {
            b'"' | b'\\' | b'/' => b,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                let code_point = self.read_hex_escape()?;
                // each \uXXXX is emitted standalone; lone UTF-16 surrogates
                // cannot be encoded and degrade to the replacement character
                let ch = char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER);
                let mut encoded = [0u8; 4];
                self.buffers
                    .chars
                    .extend_from_slice(ch.encode_utf8(&mut encoded).as_bytes());
                return Ok(());
            }
            _ => return Err(self.invalid_string()),
        };
        self.buffers.chars.push(decoded);
        Ok(())
    }

    /// Reads the four hex digits of a `\u` escape, case-insensitive
    fn read_hex_escape(&mut self) -> Result<u32, ReaderError> {
        let mut code_point = 0u32;
        for _ in 0..4 {
            match self.data.get(self.pos).and_then(|&b| char::from(b).to_digit(16)) {
                Some(digit) => {
                    code_point = code_point << 4 | digit;
                    self.pos += 1;
                }
                None => return Err(self.invalid_string()),
            }
        }
        Ok(code_point)
    }

    /// Copies one complete unescaped multi-byte character into the arena
    fn copy_multibyte(&mut self, lead: u8) -> Result<(), ReaderError> {
        let len = match utf8::sequence_len(lead) {
            Some(len) if len > 1 => len,
            _ => return Err(self.invalid_string()),
        };
        let data = self.data;
        let start = self.pos - 1;
        let bytes = match data.get(start..start + len) {
            Some(bytes) if utf8::is_valid_sequence(bytes) => bytes,
            _ => return Err(self.invalid_string()),
        };
        self.buffers.chars.extend_from_slice(bytes);
        self.pos = start + len;
        Ok(())
    }

    /// Consumes a `null` token if present; `Ok(false)` leaves the next token
    /// unconsumed
    pub(super) fn null(&mut self) -> Result<bool, ReaderError> {
        if self.options.lazy_read {
            let descriptor = match self.cursor.current(&self.buffers.descriptors) {
                Some(descriptor) => descriptor,
                None => return Err(self.unexpected_end()),
            };
            if self.data.get(descriptor.start) == Some(&b'n') {
                self.cursor.advance(&self.buffers.descriptors);
                return Ok(true);
            }
            return Ok(false);
        }
        match self.next()? {
            Token::Null => Ok(true),
            Token::Delimiter(b) if b != b'[' && b != b'{' => {
                self.put_back(Token::Delimiter(b));
                Err(self.unexpected_char(b))
            }
            token => {
                self.put_back(token);
                Ok(false)
            }
        }
    }

    pub(super) fn bool(&mut self) -> Result<bool, ReaderError> {
        match self.next()? {
            Token::Bool(value) => Ok(value),
            token => Err(self.scalar_mismatch(ValueKind::Boolean, token)),
        }
    }

    pub(super) fn number(&mut self) -> Result<NumberProps, ReaderError> {
        match self.next()? {
            Token::Number(props) => Ok(props),
            token => Err(self.scalar_mismatch(ValueKind::Number, token)),
        }
    }

    pub(super) fn string(&mut self) -> Result<StringToken, ReaderError> {
        match self.next()? {
            Token::String(token) => Ok(token),
            token => Err(self.scalar_mismatch(ValueKind::String, token)),
        }
    }

    /// Builds the error for a scalar read which found something else
    fn scalar_mismatch(&self, expected: ValueKind, token: Token) -> ReaderError {
        match token {
            Token::Delimiter(b) if b != b'[' && b != b'{' => self.unexpected_char(b),
            token => TypeError {
                expected,
                actual: token.value_kind().unwrap_or(expected),
                offset: self.last_pos,
                nullable: false,
            }
            .into(),
        }
    }

    /// Reads a member name and the following `:`
    ///
    /// The returned range holds the raw name bytes within the input, escape
    /// sequences unresolved.
    pub(super) fn property_name(&mut self) -> Result<Range<usize>, ReaderError> {
        self.options.read_key = true;
        let result = self.string();
        self.options.read_key = false;
        let span = match result? {
            StringToken::Raw(span) | StringToken::Decoded { raw: span, .. } => span,
        };
        match self.skip_whitespace() {
            None => Err(self.unexpected_end()),
            Some(b':') => {
                self.pos += 1;
                Ok(span)
            }
            Some(_) => Err(self.syntax_error_on_next_token(SyntaxErrorKind::ExpectedColon)),
        }
    }

    /// Consumes the given delimiter if it is next
    ///
    /// `Ok(false)` means the next token is some other valid token and was
    /// not consumed.
    pub(super) fn delimiter(&mut self, delimiter: u8) -> Result<bool, ReaderError> {
        if self.options.lazy_read {
            let descriptor = match self.cursor.current(&self.buffers.descriptors) {
                Some(descriptor) => descriptor,
                None => return Err(self.unexpected_end()),
            };
            return Ok(self.data.get(descriptor.start) == Some(&delimiter));
        }
        if let Some(token) = &self.unread {
            if *token == Token::Delimiter(delimiter) {
                self.unread = None;
                return Ok(true);
            }
            return Ok(false);
        }
        let b = match self.skip_whitespace() {
            Some(b) => b,
            None => return Ok(false),
        };
        if b == delimiter {
            self.pos += 1;
            return Ok(true);
        }
        // parse a full token to distinguish valid JSON from malformed data
        let token = self.next()?;
        self.put_back(token);
        Ok(false)
    }

    /// Consumes the closing delimiter of the current container or the comma
    /// before its next element; `Ok(true)` means the container ended
    pub(super) fn end_delimiter_or_comma(&mut self, closer: u8) -> Result<bool, ReaderError> {
        if self.options.lazy_read {
            return Err(ReaderError::Other(
                "containers must be iterated through the descriptor cursor in lazy-read mode"
                    .to_owned(),
            ));
        }
        let bad_item_kind = if closer == b'}' {
            SyntaxErrorKind::BadObjectItem
        } else {
            SyntaxErrorKind::BadArrayItem
        };
        if let Some(token) = &self.unread {
            if let Token::Delimiter(b) = token {
                if *b == closer || *b == b',' {
                    let is_end = *b == closer;
                    self.unread = None;
                    return Ok(is_end);
                }
            }
            return Err(SyntaxError {
                kind: bad_item_kind,
                value: Some(token.description()),
                offset: self.last_pos,
            }
            .into());
        }
        let b = match self.skip_whitespace() {
            Some(b) => b,
            None => return Err(self.unexpected_end()),
        };
        if b == closer || b == b',' {
            self.pos += 1;
            return Ok(b == closer);
        }
        let token = self.next()?;
        Err(SyntaxError {
            kind: bad_item_kind,
            value: Some(token.description()),
            offset: self.last_pos,
        }
        .into())
    }

    /// Reads one value-starting token of any kind
    ///
    /// For arrays and objects only the opening delimiter is consumed in
    /// streaming mode; in lazy-read mode the descriptor cursor stays on the
    /// container so its iteration state can enter the children.
    pub(super) fn any(&mut self) -> Result<ScannedValue, ReaderError> {
        match self.next()? {
            Token::Null => Ok(ScannedValue::Null),
            Token::Bool(value) => Ok(ScannedValue::Bool(value)),
            Token::Number(props) => Ok(ScannedValue::Number(props)),
            Token::String(token) => Ok(ScannedValue::String(token)),
            Token::Delimiter(b'[') => Ok(ScannedValue::ArrayStart),
            Token::Delimiter(b'{') => Ok(ScannedValue::ObjectStart),
            Token::Delimiter(b) => Err(self.unexpected_char(b)),
        }
    }

    /// Builds a syntax error described by the token found where something
    /// else was required
    fn syntax_error_on_next_token(&mut self, kind: SyntaxErrorKind) -> ReaderError {
        match self.next() {
            Ok(token) => SyntaxError {
                kind,
                value: Some(token.description()),
                offset: self.last_pos,
            }
            .into(),
            Err(err) => err,
        }
    }

    /// Advances the descriptor cursor past the current subtree
    pub(super) fn skip_descriptor_subtree(&mut self) -> bool {
        self.cursor.skip_subtree(&self.buffers.descriptors)
    }

    /// Resolves string token bytes against the input or the char arena
    pub(super) fn string_bytes(&self, token: &StringToken) -> &[u8] {
        match token {
            StringToken::Raw(span) => &self.data[span.clone()],
            StringToken::Decoded { arena, .. } => &self.buffers.chars[arena.clone()],
        }
    }

    pub(super) fn input_bytes(&self, span: &Range<usize>) -> &[u8] {
        &self.data[span.clone()]
    }

    pub(super) fn json_number(&self, props: NumberProps) -> JsonNumber<'_> {
        JsonNumber {
            raw: &self.data[props.raw.clone()],
            props,
        }
    }
}
