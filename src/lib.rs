#![warn(missing_docs)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]

//! jpull is a streaming pull reader for [RFC 8259](https://www.rfc-editor.org/rfc/rfc8259.html)
//! JSON held in a byte slice, designed for hand-written decoders of
//! application types.
//!
//! The reader is optimized for zero and low allocation: string and number
//! values are returned as borrowed byte slices, all working buffers are
//! reusable across parses, and the caller controls whether escape sequences
//! are decoded at all. The API is type-asserted rather than reflective: the
//! caller states the expected shape of each value and the reader validates
//! and extracts it. Errors latch: the first failure poisons the reader, so a
//! whole decoding pipeline can run without intermediate checks and inspect
//! the error once at the end.
//!
//! # Terminology
//!
//! This crate uses the same terminology as the JSON specification:
//!
//! - *object*: `{ ... }`
//!   - *member*: entry in an object; in `{"a": 1}` the member has *name*
//!     `"a"` and value `1`
//! - *array*: `[ ... ]`
//! - *number*: number value, for example `123.4e+10`
//! - *string*: string value, for example `"text in \"quotes\""`
//!
//! # Reading
//!
//! ```
//! use jpull::reader::Reader;
//!
//! let mut r = Reader::new(br#"{"name": "socket-7", "port": 4100, "tags": [1, 2]}"#);
//! let mut port = 0;
//! let mut tags = Vec::new();
//!
//! let mut obj = r.object();
//! while obj.next(&mut r) {
//!     match obj.name(&r) {
//!         b"port" => port = r.int64(),
//!         b"tags" => {
//!             let mut arr = r.array();
//!             while arr.next(&mut r) {
//!                 tags.push(r.int64());
//!             }
//!         }
//!         _ => r.skip_value(),
//!     }
//! }
//! r.require_eof()?;
//!
//! assert_eq!(4100, port);
//! assert_eq!(vec![1, 2], tags);
//! # Ok::<(), jpull::reader::ReaderError>(())
//! ```
//!
//! # Two-pass reading
//!
//! [`Reader::pre_process`](reader::Reader::pre_process) walks the document
//! once and records a flat descriptor per value (offsets, subtree size, and
//! optionally the decoded string or decomposed number). Subsequent reads are
//! served from that structural index without rescanning bytes, and skipping
//! a subtree of any size becomes a constant-time cursor jump. This pays off
//! for applications which look up a few members of a large document, or
//! replay parts of it.

pub mod reader;

mod number;
mod utf8;
