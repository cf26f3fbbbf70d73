//! Module for pull-reading JSON data
//!
//! [`Reader`] is the typed pull reader over a byte slice. The caller asserts
//! the expected shape of each value ([`null`](Reader::null),
//! [`bool`](Reader::bool), [`int64`](Reader::int64), [`string`](Reader::string),
//! [`array`](Reader::array), [`object`](Reader::object), [`any`](Reader::any))
//! and the reader validates and extracts accordingly. The first error puts
//! the reader into a failed state which all later reads observe, so a whole
//! decoding pipeline can defer its error check to the end.

mod skeleton;
mod token_reader;

use std::ops::Range;

use thiserror::Error;

pub use self::skeleton::{ComputedValue, ValueDescriptor};
pub use crate::number::{JsonNumber, NumberProps};

use self::token_reader::{ScannedValue, TokenReader};
use crate::number;
use crate::utf8;

/// Type of a JSON value
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// JSON `null`
    Null,
    /// JSON boolean value, `true` or `false`
    Boolean,
    /// JSON number value, for example `123.4e+10`
    Number,
    /// JSON string value, for example `"text in \"quotes\""`
    String,
    /// JSON array: `[ ... ]`
    Array,
    /// JSON object: `{ ... }`
    Object,
}

/// Describes why a syntax error occurred
///
/// The display form of each kind is the stable message text used in rendered
/// errors.
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum SyntaxErrorKind {
    /// A byte which cannot start a token was encountered
    #[strum(serialize = "unexpected character")]
    UnexpectedCharacter,
    /// A lowercase symbol other than `null`, `true` or `false`
    #[strum(serialize = "unexpected symbol")]
    UnexpectedSymbol,
    /// A member name was not followed by a colon
    #[strum(serialize = "expected ':'")]
    ExpectedColon,
    /// A malformed number literal
    #[strum(serialize = "invalid number")]
    InvalidNumber,
    /// A malformed or unterminated string
    #[strum(serialize = "invalid string")]
    InvalidString,
    /// Non-whitespace data after the end of the top-level value
    #[strum(serialize = "unexpected data after end of JSON value")]
    DataAfterEnd,
    /// An array element was not followed by `,` or `]`
    #[strum(serialize = "bad array item")]
    BadArrayItem,
    /// An object member was not followed by `,` or `}`
    #[strum(serialize = "bad object item")]
    BadObjectItem,
    /// The document ended in the middle of a value
    #[strum(serialize = "unexpected end of input")]
    UnexpectedEnd,
}

/// Malformed JSON was encountered
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("{kind}{} at position {offset}", fmt_offending(.value))]
pub struct SyntaxError {
    /// Kind of the error; its display form is the message text
    pub kind: SyntaxErrorKind,
    /// The offending token or character, if known
    pub value: Option<String>,
    /// Byte offset at which the error occurred
    pub offset: usize,
}

fn fmt_offending(value: &Option<String>) -> String {
    value
        .as_ref()
        .map_or_else(String::new, |value| format!(" '{value}'"))
}

/// Well-formed JSON whose shape did not match the requested type
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("expected {expected}{}, got {actual} at position {offset}", fmt_nullable(.nullable))]
pub struct TypeError {
    /// The kind the caller asked for
    pub expected: ValueKind,
    /// The kind actually present
    pub actual: ValueKind,
    /// Byte offset of the value's first byte
    pub offset: usize,
    /// Whether the read would also have accepted a null
    pub nullable: bool,
}

fn fmt_nullable(nullable: &bool) -> &'static str {
    if *nullable {
        " or null"
    } else {
        ""
    }
}

/// A number conversion overflowed or required precision the target type
/// cannot represent
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("number out of range for {target_type} at position {offset}")]
pub struct RangeError {
    /// Name of the conversion target type
    pub target_type: &'static str,
    /// Byte offset of the number literal
    pub offset: usize,
}

/// Error latched by a [`Reader`]
#[non_exhaustive]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum ReaderError {
    /// Malformed JSON
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Well-formed JSON of an unexpected shape
    #[error(transparent)]
    Type(#[from] TypeError),
    /// A numeric conversion failure
    #[error(transparent)]
    Range(#[from] RangeError),
    /// An error injected by the caller through [`Reader::add_error`]
    #[error("{0}")]
    Other(String),
}

impl From<String> for ReaderError {
    fn from(message: String) -> Self {
        ReaderError::Other(message)
    }
}

impl From<&str> for ReaderError {
    fn from(message: &str) -> Self {
        ReaderError::Other(message.to_owned())
    }
}

/// Reusable buffers for a [`Reader`]
///
/// All buffers are truncated, keeping their capacity, at the start of each
/// parse. Moving them between readers with [`Reader::into_buffers`] or
/// reparsing with [`Reader::reset`] therefore avoids repeated allocations.
///
/// The two computed-value buffers double as mode switches: providing a
/// computed-strings buffer enables string decode mode, and providing a
/// computed-numbers buffer makes a [`pre_process`](Reader::pre_process) pass
/// capture each number's decomposed form for lazy reads.
#[derive(Default, Debug)]
pub struct ReaderBuffers {
    pub(crate) descriptors: Vec<ValueDescriptor>,
    pub(crate) chars: Vec<u8>,
    pub(crate) string_values: Option<Vec<Range<usize>>>,
    pub(crate) number_values: Option<Vec<NumberProps>>,
}

impl ReaderBuffers {
    /// Creates buffers with neither string decode mode nor number capture
    /// enabled
    pub fn new() -> Self {
        ReaderBuffers::default()
    }

    /// Enables string decode mode: string values are unescaped into the char
    /// arena instead of being returned as the raw bytes between the quotes
    pub fn with_computed_strings(mut self) -> Self {
        self.string_values.get_or_insert_with(Vec::new);
        self
    }

    /// Enables capturing each number's decomposed form during a pre-process
    /// pass
    pub fn with_computed_numbers(mut self) -> Self {
        self.number_values.get_or_insert_with(Vec::new);
        self
    }

    /// The descriptor table built by the most recent pre-process pass
    pub fn descriptors(&self) -> &[ValueDescriptor] {
        &self.descriptors
    }
}

/// A pull reader for a single JSON value held in a byte slice
///
/// Values are read in the order they appear. The caller normally knows what
/// type to expect; since properties are commonly nullable, every scalar read
/// has an `_or_null` variant which accepts a null in place of the value. For
/// values of unknown type there is [`any`](Self::any).
///
/// Arrays and objects are consumed through the [`ArrayState`] and
/// [`ObjectState`] returned by [`array`](Self::array) and
/// [`object`](Self::object); element values are read through the reader
/// itself between `next` calls.
///
/// # Failed state
/// When any method encounters an error, either malformed JSON or well-formed
/// JSON which does not match the expected type, the reader permanently enters a
/// failed state: the error is remembered, subsequent reads return zero
/// values, and iteration states stop. The caller can therefore run a whole
/// decoding pipeline without intermediate checks and inspect
/// [`error`](Self::error) once at the end.
///
/// # Borrowed values
/// String and number bytes returned by the reader borrow either the input
/// slice or the internal char arena; they are valid until the reader is
/// mutated again. Callers who need them longer must copy.
///
/// # Examples
/// ```
/// use jpull::reader::Reader;
///
/// let mut r = Reader::new(br#"{"a": [1, true]}"#);
/// let mut obj = r.object();
/// assert!(obj.next(&mut r));
/// assert_eq!(b"a", obj.name(&r));
///
/// let mut arr = r.array();
/// assert!(arr.next(&mut r));
/// assert_eq!(1, r.int64());
/// assert!(arr.next(&mut r));
/// assert_eq!(true, r.bool());
/// assert!(!arr.next(&mut r));
///
/// assert!(!obj.next(&mut r));
/// r.require_eof()?;
/// # Ok::<(), jpull::reader::ReaderError>(())
/// ```
pub struct Reader<'j> {
    tr: TokenReader<'j>,
    /// Set by iteration states when the caller must read or skip an element
    /// value before the iteration can continue
    awaiting_read_value: bool,
    err: Option<ReaderError>,
}

impl<'j> Reader<'j> {
    /// Creates a reader over `data` with private buffers
    ///
    /// String values are returned as the raw bytes between their quotes; use
    /// [`new_with_buffers`](Self::new_with_buffers) with a computed-strings
    /// buffer to have escape sequences decoded.
    pub fn new(data: &'j [u8]) -> Self {
        Reader::new_with_buffers(data, ReaderBuffers::new())
    }

    /// Creates a reader over `data` using the given buffers
    pub fn new_with_buffers(data: &'j [u8], buffers: ReaderBuffers) -> Self {
        Reader {
            tr: TokenReader::new(data, buffers),
            awaiting_read_value: false,
            err: None,
        }
    }

    /// Drops all state, including a latched error, and starts a new parse
    /// over `data` reusing the buffer capacity
    pub fn reset(&mut self, data: &'j [u8]) {
        self.err = None;
        self.awaiting_read_value = false;
        self.tr.reset(data);
    }

    /// Recovers the buffers for use with another reader
    pub fn into_buffers(self) -> ReaderBuffers {
        self.tr.into_buffers()
    }

    /// The first error this reader encountered, or `None` while it is in a
    /// good state
    pub fn error(&self) -> Option<&ReaderError> {
        self.err.as_ref()
    }

    /// Puts the reader into the failed state with the given error; does
    /// nothing if it has already failed
    pub fn add_error(&mut self, err: impl Into<ReaderError>) {
        if self.err.is_none() {
            self.err = Some(err.into());
        }
    }

    /// Puts the reader into the failed state, replacing any earlier error
    ///
    /// A failed reader cannot be returned to a good state other than by
    /// [`reset`](Self::reset).
    pub fn replace_error(&mut self, err: impl Into<ReaderError>) {
        self.err = Some(err.into());
    }

    /// Verifies that all input has been consumed, not counting whitespace
    ///
    /// The error is returned but not latched.
    pub fn require_eof(&mut self) -> Result<(), ReaderError> {
        if !self.tr.eof() {
            return Err(SyntaxError {
                kind: SyntaxErrorKind::DataAfterEnd,
                value: None,
                offset: self.tr.last_pos,
            }
            .into());
        }
        Ok(())
    }

    /// Reads a `null`, latching a type error for any other value
    pub fn null(&mut self) {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return;
        }
        match self.tr.null() {
            Ok(true) => {}
            Ok(false) => {
                let err = self.type_error_for_current_token(ValueKind::Null, false);
                self.err = Some(err);
            }
            Err(err) => self.err = Some(err),
        }
    }

    /// Reads a boolean value
    ///
    /// On a parse error, or if the next value is not a boolean, the return
    /// value is `false` and the reader enters the failed state.
    pub fn bool(&mut self) -> bool {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return false;
        }
        match self.tr.bool() {
            Ok(value) => value,
            Err(err) => {
                self.err = Some(err);
                false
            }
        }
    }

    /// Reads a boolean value or a null; a null yields `None`
    pub fn bool_or_null(&mut self) -> Option<bool> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.bool() {
            Ok(value) => Some(value),
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a number value and converts it to `i64`
    ///
    /// Latches a [`RangeError`] for literals with a fractional or exponent
    /// part and for values outside the `i64` range. Non-numeric values are
    /// never converted to numbers.
    pub fn int64(&mut self) -> i64 {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return 0;
        }
        match self.tr.number() {
            Ok(props) => self.convert_i64(&props),
            Err(err) => {
                self.err = Some(err);
                0
            }
        }
    }

    /// Reads an integer number value or a null; a null yields `None`
    pub fn int64_or_null(&mut self) -> Option<i64> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.number() {
            Ok(props) => {
                let value = self.convert_i64(&props);
                if self.err.is_some() {
                    None
                } else {
                    Some(value)
                }
            }
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a number value and converts it to `u64`
    ///
    /// Latches a [`RangeError`] for negative literals, literals with a
    /// fractional or exponent part and values outside the `u64` range.
    pub fn uint64(&mut self) -> u64 {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return 0;
        }
        match self.tr.number() {
            Ok(props) => self.convert_u64(&props),
            Err(err) => {
                self.err = Some(err);
                0
            }
        }
    }

    /// Reads an unsigned integer number value or a null; a null yields `None`
    pub fn uint64_or_null(&mut self) -> Option<u64> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.number() {
            Ok(props) => {
                let value = self.convert_u64(&props);
                if self.err.is_some() {
                    None
                } else {
                    Some(value)
                }
            }
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a number value and converts it to `f64`
    ///
    /// The conversion rounds the same way as the standard library float
    /// parser. Non-numeric values are never converted to numbers.
    pub fn float64(&mut self) -> f64 {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return 0.0;
        }
        match self.tr.number() {
            Ok(props) => self.convert_f64(&props),
            Err(err) => {
                self.err = Some(err);
                0.0
            }
        }
    }

    /// Reads a number value or a null; a null yields `None`
    pub fn float64_or_null(&mut self) -> Option<f64> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.number() {
            Ok(props) => {
                let value = self.convert_f64(&props);
                if self.err.is_some() {
                    None
                } else {
                    Some(value)
                }
            }
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a number value and returns the raw literal bytes
    pub fn number(&mut self) -> &[u8] {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return b"";
        }
        match self.tr.number() {
            Ok(props) => self.tr.input_bytes(&props.raw),
            Err(err) => {
                self.err = Some(err);
                b""
            }
        }
    }

    /// Reads a number value or a null, returning the raw literal bytes; a
    /// null yields `None`
    pub fn number_or_null(&mut self) -> Option<&[u8]> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.number() {
            Ok(props) => Some(self.tr.input_bytes(&props.raw)),
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a number value and returns its decomposed form together with
    /// the raw literal
    pub fn number_props(&mut self) -> Option<JsonNumber<'_>> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.number() {
            Ok(props) => Some(self.tr.json_number(props)),
            Err(err) => {
                self.err = Some(err);
                None
            }
        }
    }

    /// Reads a number value or a null in decomposed form; a null yields
    /// `None` without latching
    pub fn number_props_or_null(&mut self) -> Option<JsonNumber<'_>> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.number() {
            Ok(props) => Some(self.tr.json_number(props)),
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Reads a string value
    ///
    /// Without a computed-strings buffer the returned bytes are the raw
    /// contents between the quotes, escape sequences unresolved; in decode
    /// mode they are the unescaped UTF-8 contents borrowed from the char
    /// arena. Non-string values are never converted to strings.
    pub fn string(&mut self) -> &[u8] {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return b"";
        }
        match self.tr.string() {
            Ok(token) => self.tr.string_bytes(&token),
            Err(err) => {
                self.err = Some(err);
                b""
            }
        }
    }

    /// Reads a string value or a null; a null yields `None`
    pub fn string_or_null(&mut self) -> Option<&[u8]> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        match self.tr.null() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        }
        match self.tr.string() {
            Ok(token) => Some(self.tr.string_bytes(&token)),
            Err(err) => {
                self.err = Some(nullable_type_error(err));
                None
            }
        }
    }

    /// Begins reading an array
    ///
    /// On failure the returned state is undefined: its `next` always returns
    /// `false` and the reader enters the failed state.
    pub fn array(&mut self) -> ArrayState {
        self.try_array(false)
    }

    /// Begins reading an array, also accepting a null
    ///
    /// For a null the returned state is undefined and its
    /// [`is_defined`](ArrayState::is_defined) returns `false`, without an
    /// error.
    pub fn array_or_null(&mut self) -> ArrayState {
        self.try_array(true)
    }

    fn try_array(&mut self, allow_null: bool) -> ArrayState {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return ArrayState::undefined();
        }
        if allow_null {
            match self.tr.null() {
                Ok(true) => return ArrayState::undefined(),
                Ok(false) => {}
                Err(err) => {
                    self.err = Some(err);
                    return ArrayState::undefined();
                }
            }
        }
        match self.tr.delimiter(b'[') {
            Ok(true) => ArrayState::open(self.tr.cursor.pos),
            Ok(false) => {
                let err = self.type_error_for_current_token(ValueKind::Array, allow_null);
                self.err = Some(err);
                ArrayState::undefined()
            }
            Err(err) => {
                self.err = Some(err);
                ArrayState::undefined()
            }
        }
    }

    /// Begins reading an object
    ///
    /// On failure the returned state is undefined: its `next` always returns
    /// `false` and the reader enters the failed state.
    pub fn object(&mut self) -> ObjectState {
        self.try_object(false)
    }

    /// Begins reading an object, also accepting a null
    ///
    /// For a null the returned state is undefined and its
    /// [`is_defined`](ObjectState::is_defined) returns `false`, without an
    /// error.
    pub fn object_or_null(&mut self) -> ObjectState {
        self.try_object(true)
    }

    fn try_object(&mut self, allow_null: bool) -> ObjectState {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return ObjectState::undefined();
        }
        if allow_null {
            match self.tr.null() {
                Ok(true) => return ObjectState::undefined(),
                Ok(false) => {}
                Err(err) => {
                    self.err = Some(err);
                    return ObjectState::undefined();
                }
            }
        }
        match self.tr.delimiter(b'{') {
            Ok(true) => ObjectState::open(self.tr.cursor.pos),
            Ok(false) => {
                let err = self.type_error_for_current_token(ValueKind::Object, allow_null);
                self.err = Some(err);
                ObjectState::undefined()
            }
            Err(err) => {
                self.err = Some(err);
                ObjectState::undefined()
            }
        }
    }

    /// Reads a single value of any type
    ///
    /// Scalars are returned directly. For an array or object only the
    /// opening delimiter is consumed and the embedded iteration state,
    /// positioned at the just-opened container, must be used to consume it.
    ///
    /// Returns `None` and latches the error on malformed input.
    pub fn any(&mut self) -> Option<AnyValue<'_>> {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return None;
        }
        let scanned = match self.tr.any() {
            Ok(scanned) => scanned,
            Err(err) => {
                self.err = Some(err);
                return None;
            }
        };
        Some(match scanned {
            ScannedValue::Null => AnyValue::Null,
            ScannedValue::Bool(value) => AnyValue::Bool(value),
            ScannedValue::Number(props) => AnyValue::Number(self.tr.json_number(props)),
            ScannedValue::String(token) => AnyValue::String(self.tr.string_bytes(&token)),
            ScannedValue::ArrayStart => AnyValue::Array(ArrayState::open(self.tr.cursor.pos)),
            ScannedValue::ObjectStart => AnyValue::Object(ObjectState::open(self.tr.cursor.pos)),
        })
    }

    /// Consumes and discards the next value, recursing through array
    /// elements and object members
    ///
    /// In lazy-read mode this is a constant-time descriptor-cursor jump.
    pub fn skip_value(&mut self) {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return;
        }
        if self.tr.options.lazy_read {
            if !self.tr.skip_descriptor_subtree() {
                self.add_error("subtree can't be skipped");
            }
            return;
        }
        let scanned = match self.tr.any() {
            Ok(scanned) => scanned,
            Err(err) => {
                self.err = Some(err);
                return;
            }
        };
        match scanned {
            ScannedValue::ArrayStart => {
                let mut arr = ArrayState::open(self.tr.cursor.pos);
                while arr.next(self) {}
            }
            ScannedValue::ObjectStart => {
                let mut obj = ObjectState::open(self.tr.cursor.pos);
                while obj.next(self) {}
            }
            _ => {}
        }
    }

    /// Selects whether numeric conversions reparse the raw literal with the
    /// standard library parsers instead of using the decomposed mantissa and
    /// exponent
    ///
    /// The two paths differ in their tolerance for long literals: the raw
    /// `f64` path reads truncated literals at full precision, while the raw
    /// integer path latches a range error for any literal `i64`/`u64`
    /// parsing rejects, including ones with a fraction or exponent.
    pub fn set_number_raw_read(&mut self, raw: bool) {
        self.tr.options.read_raw_numbers = raw;
    }

    /// Walks the whole next value, building the descriptor table and the
    /// computed-value buffers, then enters lazy-read mode
    ///
    /// In lazy-read mode subsequent reads are served from the descriptor
    /// table without rescanning bytes, and [`skip_value`](Self::skip_value)
    /// jumps whole subtrees in constant time. If the walk fails the reader
    /// enters the failed state and the table must not be used.
    ///
    /// # Examples
    /// ```
    /// use jpull::reader::Reader;
    ///
    /// let mut r = Reader::new(br#"{"skip":[1,2,3],"want":true}"#);
    /// r.pre_process();
    ///
    /// let mut obj = r.object();
    /// while obj.next(&mut r) {
    ///     if obj.name(&r) == b"want" {
    ///         assert_eq!(true, r.bool());
    ///     } else {
    ///         r.skip_value();
    ///     }
    /// }
    /// assert!(r.error().is_none());
    /// ```
    pub fn pre_process(&mut self) {
        self.tr.options.lazy_parse = true;
        self.tr.options.lazy_read = false;
        self.tr.clear_index_buffers();
        self.tr.cursor.pos = 0;
        self.pre_process_value();
        self.tr.options.lazy_read = true;
        self.tr.options.lazy_parse = false;
        self.tr.cursor.pos = 0;
    }

    /// Recursive pre-process walk: reads one value, appends its descriptor
    /// and accumulates subtree sizes bottom-up
    fn pre_process_value(&mut self) {
        self.awaiting_read_value = false;
        if self.err.is_some() {
            return;
        }
        let scanned = match self.tr.any() {
            Ok(scanned) => scanned,
            Err(err) => {
                self.err = Some(err);
                return;
            }
        };

        let pos = self.tr.buffers.descriptors.len();
        let start = self.tr.last_pos;
        self.tr.buffers.descriptors.push(ValueDescriptor::leaf(start));

        match scanned {
            ScannedValue::Number(_) => {
                if let Some(index) = self
                    .tr
                    .buffers
                    .number_values
                    .as_ref()
                    .and_then(|values| values.len().checked_sub(1))
                {
                    self.tr.buffers.descriptors[pos].computed = Some(ComputedValue::Number(index));
                }
            }
            ScannedValue::String(_) => {
                if let Some(index) = self
                    .tr
                    .buffers
                    .string_values
                    .as_ref()
                    .and_then(|values| values.len().checked_sub(1))
                {
                    self.tr.buffers.descriptors[pos].computed = Some(ComputedValue::String(index));
                }
            }
            ScannedValue::ArrayStart => {
                let mut arr = ArrayState::open(self.tr.cursor.pos);
                while arr.next(self) {
                    let child_pos = self.tr.buffers.descriptors.len();
                    self.pre_process_value();
                    if self.tr.buffers.descriptors.len() > child_pos {
                        let child_size = self.tr.buffers.descriptors[child_pos].subtree_size;
                        self.tr.buffers.descriptors[pos].subtree_size += child_size;
                    }
                }
            }
            ScannedValue::ObjectStart => {
                let mut obj = ObjectState::open(self.tr.cursor.pos);
                while obj.next(self) {
                    let child_pos = self.tr.buffers.descriptors.len();
                    let key = obj.name_span.clone();
                    self.pre_process_value();
                    if self.tr.buffers.descriptors.len() > child_pos {
                        let child_size = self.tr.buffers.descriptors[child_pos].subtree_size;
                        self.tr.buffers.descriptors[pos].subtree_size += child_size;
                        self.tr.buffers.descriptors[child_pos].key = Some(key);
                    }
                }
            }
            _ => {}
        }
        self.tr.buffers.descriptors[pos].end = self.tr.pos;
    }

    /// Leaves lazy-read mode and resumes byte-level reading at the end of
    /// the pre-processed value
    ///
    /// This allows an application to pre-process one member value
    /// mid-document, consume it through the descriptor table and then fall
    /// back to streaming reads for the rest of the document.
    pub fn sync_with_preprocess(&mut self) {
        if self.tr.options.lazy_read {
            self.tr.options.lazy_read = false;
            if let Some(first) = self.tr.buffers.descriptors.first() {
                self.tr.pos = first.end;
            }
        }
    }

    /// True while lazy-read mode is active and unread descriptors remain
    pub fn is_pre_processed(&self) -> bool {
        self.tr.options.lazy_read && self.tr.cursor.has_next(&self.tr.buffers.descriptors)
    }

    fn convert_i64(&mut self, props: &NumberProps) -> i64 {
        let converted = if self.tr.options.read_raw_numbers {
            utf8::to_str_unchecked(self.tr.input_bytes(&props.raw))
                .parse::<i64>()
                .ok()
        } else {
            number::props_to_i64(props)
        };
        match converted {
            Some(value) => value,
            None => {
                self.err = Some(
                    RangeError {
                        target_type: "i64",
                        offset: props.raw.start,
                    }
                    .into(),
                );
                0
            }
        }
    }

    fn convert_u64(&mut self, props: &NumberProps) -> u64 {
        let converted = if self.tr.options.read_raw_numbers {
            utf8::to_str_unchecked(self.tr.input_bytes(&props.raw))
                .parse::<u64>()
                .ok()
        } else {
            number::props_to_u64(props)
        };
        match converted {
            Some(value) => value,
            None => {
                self.err = Some(
                    RangeError {
                        target_type: "u64",
                        offset: props.raw.start,
                    }
                    .into(),
                );
                0
            }
        }
    }

    fn convert_f64(&mut self, props: &NumberProps) -> f64 {
        if self.tr.options.read_raw_numbers {
            match utf8::to_str_unchecked(self.tr.input_bytes(&props.raw)).parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    self.err = Some(
                        RangeError {
                            target_type: "f64",
                            offset: props.raw.start,
                        }
                        .into(),
                    );
                    0.0
                }
            }
        } else {
            number::props_to_f64(props, self.tr.input_bytes(&props.raw))
        }
    }

    /// Consumes the current token to name its actual kind in a type error
    fn type_error_for_current_token(&mut self, expected: ValueKind, nullable: bool) -> ReaderError {
        match self.tr.any() {
            Err(err) => err,
            Ok(scanned) => TypeError {
                expected,
                actual: scanned.kind(),
                offset: self.tr.last_pos,
                nullable,
            }
            .into(),
        }
    }
}

/// Turns a type error from the non-null branch of an `_or_null` read into
/// its nullable form
fn nullable_type_error(err: ReaderError) -> ReaderError {
    match err {
        ReaderError::Type(mut e) => {
            e.nullable = true;
            ReaderError::Type(e)
        }
        err => err,
    }
}

/// Iteration state for reading a JSON array
///
/// The state only tracks the iteration; element values are read through the
/// reader between `next` calls.
///
/// # Examples
/// ```
/// use jpull::reader::Reader;
///
/// let mut r = Reader::new(b"[1,2]");
/// let mut values = Vec::new();
/// let mut arr = r.array();
/// while arr.next(&mut r) {
///     values.push(r.int64());
/// }
/// assert_eq!(values, [1, 2]);
/// assert!(r.error().is_none());
/// ```
#[derive(Default, Debug)]
pub struct ArrayState {
    defined: bool,
    after_first: bool,
    /// Descriptor index of the container itself, in lazy-read mode
    container_index: usize,
}

impl ArrayState {
    fn undefined() -> Self {
        ArrayState::default()
    }

    fn open(container_index: usize) -> Self {
        ArrayState {
            defined: true,
            after_first: false,
            container_index,
        }
    }

    /// Whether an array was actually present, as opposed to a null or a
    /// failed read
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Advances to the next element, consuming the element separator or the
    /// closing bracket
    ///
    /// If the previous element value was not read it is skipped first.
    /// Returns `false` at the end of the array, for an undefined state, and
    /// once the reader has failed.
    pub fn next(&mut self, r: &mut Reader<'_>) -> bool {
        if !self.defined || r.err.is_some() {
            return false;
        }
        if r.tr.options.lazy_read {
            return self.next_lazy(r);
        }
        if self.after_first {
            if r.awaiting_read_value {
                r.skip_value();
                if r.err.is_some() {
                    return false;
                }
            }
            match r.tr.end_delimiter_or_comma(b']') {
                Ok(true) => return false,
                Ok(false) => {}
                Err(err) => {
                    r.add_error(err);
                    return false;
                }
            }
        } else {
            match r.tr.delimiter(b']') {
                Ok(true) => return false,
                Ok(false) => {}
                Err(err) => {
                    r.add_error(err);
                    return false;
                }
            }
            self.after_first = true;
        }
        r.awaiting_read_value = true;
        true
    }

    fn next_lazy(&mut self, r: &mut Reader<'_>) -> bool {
        let end = match r.tr.buffers.descriptors.get(self.container_index) {
            Some(descriptor) => self.container_index + descriptor.subtree_size,
            None => return false,
        };
        if self.after_first {
            if r.awaiting_read_value {
                r.awaiting_read_value = false;
                if !r.tr.skip_descriptor_subtree() {
                    return false;
                }
            }
        } else {
            r.tr.cursor.pos = self.container_index + 1;
            self.after_first = true;
        }
        if r.tr.cursor.pos >= end {
            return false;
        }
        r.awaiting_read_value = true;
        true
    }
}

/// Iteration state for reading a JSON object
///
/// `next` consumes the member name, available through [`name`](Self::name)
/// until the next call; the member value must then be read, or skipped,
/// through the reader.
///
/// # Examples
/// ```
/// use jpull::reader::Reader;
///
/// let mut r = Reader::new(br#"{"a":1,"b":2}"#);
/// let mut members = Vec::new();
/// let mut obj = r.object();
/// while obj.next(&mut r) {
///     let name = obj.name(&r).to_vec();
///     members.push((name, r.int64()));
/// }
/// assert_eq!(members, [(b"a".to_vec(), 1), (b"b".to_vec(), 2)]);
/// assert!(r.error().is_none());
/// ```
#[derive(Debug)]
pub struct ObjectState {
    defined: bool,
    after_first: bool,
    /// Descriptor index of the container itself, in lazy-read mode
    container_index: usize,
    name_span: Range<usize>,
}

impl ObjectState {
    fn undefined() -> Self {
        ObjectState {
            defined: false,
            after_first: false,
            container_index: 0,
            name_span: 0..0,
        }
    }

    fn open(container_index: usize) -> Self {
        ObjectState {
            defined: true,
            after_first: false,
            container_index,
            name_span: 0..0,
        }
    }

    /// Whether an object was actually present, as opposed to a null or a
    /// failed read
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Raw bytes of the member name consumed by the preceding
    /// [`next`](Self::next), escape sequences unresolved
    pub fn name<'r>(&self, r: &'r Reader<'_>) -> &'r [u8] {
        &r.tr.data[self.name_span.clone()]
    }

    /// Advances to the next member, consuming the member separator or the
    /// closing bracket plus the member name
    ///
    /// If the previous member value was not read it is skipped first.
    /// Returns `false` at the end of the object, for an undefined state, and
    /// once the reader has failed.
    pub fn next(&mut self, r: &mut Reader<'_>) -> bool {
        if !self.defined || r.err.is_some() {
            return false;
        }
        if r.tr.options.lazy_read {
            return self.next_lazy(r);
        }
        if self.after_first {
            if r.awaiting_read_value {
                r.skip_value();
                if r.err.is_some() {
                    return false;
                }
            }
            match r.tr.end_delimiter_or_comma(b'}') {
                Ok(true) => return false,
                Ok(false) => {}
                Err(err) => {
                    r.add_error(err);
                    return false;
                }
            }
        } else {
            match r.tr.delimiter(b'}') {
                Ok(true) => return false,
                Ok(false) => {}
                Err(err) => {
                    r.add_error(err);
                    return false;
                }
            }
            self.after_first = true;
        }
        match r.tr.property_name() {
            Ok(span) => {
                self.name_span = span;
                r.awaiting_read_value = true;
                true
            }
            Err(err) => {
                r.add_error(err);
                false
            }
        }
    }

    fn next_lazy(&mut self, r: &mut Reader<'_>) -> bool {
        let end = match r.tr.buffers.descriptors.get(self.container_index) {
            Some(descriptor) => self.container_index + descriptor.subtree_size,
            None => return false,
        };
        if self.after_first {
            if r.awaiting_read_value {
                r.awaiting_read_value = false;
                if !r.tr.skip_descriptor_subtree() {
                    return false;
                }
            }
        } else {
            r.tr.cursor.pos = self.container_index + 1;
            self.after_first = true;
        }
        if r.tr.cursor.pos >= end {
            return false;
        }
        self.name_span = r.tr.buffers.descriptors[r.tr.cursor.pos]
            .key
            .clone()
            .unwrap_or(0..0);
        r.awaiting_read_value = true;
        true
    }
}

/// A value of any type read by [`Reader::any`]
///
/// Scalars carry their value directly. For arrays and objects the embedded
/// iteration state is positioned at the just-opened container and must be
/// used to consume it.
#[derive(Debug)]
pub enum AnyValue<'v> {
    /// JSON `null`
    Null,
    /// A boolean value
    Bool(bool),
    /// A number value
    Number(JsonNumber<'v>),
    /// String contents: decoded if decode mode is enabled, raw otherwise
    String(&'v [u8]),
    /// An opened array
    Array(ArrayState),
    /// An opened object
    Object(ObjectState),
}

impl AnyValue<'_> {
    /// The [`ValueKind`] of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyValue::Null => ValueKind::Null,
            AnyValue::Bool(_) => ValueKind::Boolean,
            AnyValue::Number(_) => ValueKind::Number,
            AnyValue::String(_) => ValueKind::String,
            AnyValue::Array(_) => ValueKind::Array,
            AnyValue::Object(_) => ValueKind::Object,
        }
    }
}
