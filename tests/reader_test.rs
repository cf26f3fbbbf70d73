use duplicate::duplicate;
use jpull::reader::{AnyValue, Reader, ReaderBuffers, ReaderError, ValueKind};

fn decode_buffers() -> ReaderBuffers {
    ReaderBuffers::new().with_computed_strings()
}

#[test]
fn string_default_keeps_escapes() {
    let mut r = Reader::new(br#""a \"good\" string""#);
    assert_eq!(br#"a \"good\" string"#, r.string());
    assert!(r.error().is_none());
}

#[test]
fn string_decoded() {
    let mut r = Reader::new_with_buffers(br#""a \"good\" string""#, decode_buffers());
    assert_eq!(b"a \"good\" string", r.string());
    assert!(r.error().is_none());
}

#[test]
fn string_decoded_unicode_escape() {
    let mut r = Reader::new_with_buffers(br#""\u00bf""#, decode_buffers());
    assert_eq!(&[0xC2u8, 0xBF][..], r.string());
    assert!(r.error().is_none());
}

#[test]
fn require_eof_reports_trailing_data() {
    let mut r = Reader::new(br#"100,"extra""#);
    assert_eq!(100, r.int64());
    let err = r.require_eof().unwrap_err();
    assert_eq!(
        "unexpected data after end of JSON value at position 3",
        err.to_string()
    );
    // the error is reported, not latched
    assert!(r.error().is_none());
}

#[test]
fn require_eof_accepts_trailing_whitespace() {
    let mut r = Reader::new(b" 100 \t\r\n");
    assert_eq!(100, r.int64());
    r.require_eof().unwrap();
}

#[test]
fn null_value() {
    let mut r = Reader::new(b"null");
    r.null();
    assert!(r.error().is_none());

    let mut r = Reader::new(b"true");
    r.null();
    match r.error() {
        Some(ReaderError::Type(err)) => {
            assert_eq!(ValueKind::Null, err.expected);
            assert_eq!(ValueKind::Boolean, err.actual);
            assert!(!err.nullable);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn bool_values() {
    let mut r = Reader::new(b" true ");
    assert_eq!(true, r.bool());
    assert!(r.error().is_none());

    let mut r = Reader::new(b"false");
    assert_eq!(false, r.bool());
    assert!(r.error().is_none());
}

duplicate! {
    [
        method;
        [bool_or_null];
        [int64_or_null];
        [uint64_or_null];
        [float64_or_null];
        [number_or_null];
        [string_or_null];
        [number_props_or_null];
    ]
    #[test]
    fn method() {
        // a null yields None without an error
        let mut r = Reader::new(b"null");
        assert!(r.method().is_none());
        assert!(r.error().is_none());
        r.require_eof().unwrap();
    }
}

#[test]
fn or_null_values() {
    let mut r = Reader::new(b"false");
    assert_eq!(Some(false), r.bool_or_null());

    let mut r = Reader::new(b"0");
    assert_eq!(Some(0), r.int64_or_null());

    let mut r = Reader::new(b"18446744073709551");
    assert_eq!(Some(18446744073709551), r.uint64_or_null());

    let mut r = Reader::new(b"1234.5");
    assert_eq!(Some(1234.5), r.float64_or_null());

    let mut r = Reader::new(b"1.25e2");
    assert_eq!(Some(b"1.25e2".as_slice()), r.number_or_null());

    let mut r = Reader::new(br#""""#);
    assert_eq!(Some(b"".as_slice()), r.string_or_null());
}

#[test]
fn or_null_type_error_is_nullable() {
    let mut r = Reader::new(b"true");
    assert_eq!(None, r.string_or_null());
    match r.error() {
        Some(ReaderError::Type(err)) => {
            assert_eq!(ValueKind::String, err.expected);
            assert_eq!(ValueKind::Boolean, err.actual);
            assert!(err.nullable);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn int64_values() {
    for (json, expected) in [
        ("0", 0i64),
        ("1", 1),
        ("  123123213213  ", 123123213213),
        ("-123123213213", -123123213213),
        ("  9223372036854775807", i64::MAX),
        ("-9223372036854775808  ", i64::MIN),
    ] {
        let mut r = Reader::new(json.as_bytes());
        assert_eq!(expected, r.int64(), "{json}");
        assert!(r.error().is_none(), "{json}");
    }
}

#[test]
fn int64_range_errors() {
    for json in [
        "9223372036854775808",
        "-9223372036854775809",
        "-0.1",
        "1e3",
    ] {
        let mut r = Reader::new(json.as_bytes());
        assert_eq!(0, r.int64(), "{json}");
        assert!(
            matches!(r.error(), Some(ReaderError::Range(_))),
            "{json}: {:?}",
            r.error()
        );
    }

    // a sign other than '-' is rejected by the tokenizer, not the conversion
    let mut r = Reader::new(b"+0.1");
    assert_eq!(0, r.int64());
    assert!(matches!(r.error(), Some(ReaderError::Syntax(_))));
}

#[test]
fn uint64_values() {
    let mut r = Reader::new(b"123123213213");
    assert_eq!(123123213213, r.uint64());
    assert!(r.error().is_none());

    for json in ["-1", "-123123213213", "0.5", "18446744073709551615"] {
        let mut r = Reader::new(json.as_bytes());
        assert_eq!(0, r.uint64(), "{json}");
        assert!(matches!(r.error(), Some(ReaderError::Range(_))), "{json}");
    }
}

#[test]
fn uint64_raw_read_accepts_twenty_digit_values() {
    // the raw path reparses the literal and covers the full u64 range,
    // which the 19 digit mantissa cannot represent
    let mut r = Reader::new(b"18446744073709551615");
    r.set_number_raw_read(true);
    assert_eq!(u64::MAX, r.uint64());
    assert!(r.error().is_none());
}

#[test]
fn raw_read_integer_rejects_fractions() {
    let mut r = Reader::new(b"1.5");
    r.set_number_raw_read(true);
    assert_eq!(0, r.int64());
    assert!(matches!(r.error(), Some(ReaderError::Range(_))));
}

#[test]
fn float64_matches_std_parser() {
    for json in [
        "0",
        "-0.1",
        "1234.5",
        "-1121211.1e+3",
        "0.123456789111315171921232527",
        "18446744073709551615",
        "1e400",
    ] {
        let expected: f64 = json.parse().unwrap();
        let mut r = Reader::new(json.as_bytes());
        assert_eq!(expected.to_bits(), r.float64().to_bits(), "{json}");
        assert!(r.error().is_none(), "{json}");

        let mut r = Reader::new(json.as_bytes());
        r.set_number_raw_read(true);
        assert_eq!(expected.to_bits(), r.float64().to_bits(), "{json} (raw)");
        assert!(r.error().is_none(), "{json} (raw)");
    }
}

#[test]
fn number_returns_raw_literal() {
    let mut r = Reader::new(b" -12.5e+03 ");
    assert_eq!(b"-12.5e+03", r.number());
    assert!(r.error().is_none());
}

#[test]
fn number_props_exposes_decomposition() {
    let mut r = Reader::new(b"-12.5");
    let n = r.number_props().unwrap();
    assert_eq!(b"-12.5", n.raw());
    assert_eq!(125, n.props().mantissa);
    assert_eq!(-1, n.props().exponent);
    assert!(n.props().negative);
    assert!(!n.props().truncated);
    assert!(n.as_i64().is_err());
    assert_eq!(-12.5, n.as_f64());
}

#[test]
fn array_iteration() {
    let mut r = Reader::new(b"[1,2]");
    let mut values = Vec::new();
    let mut arr = r.array();
    while arr.next(&mut r) {
        values.push(r.int64());
    }
    assert_eq!(vec![1, 2], values);
    assert!(arr.is_defined());
    assert!(r.error().is_none());
    r.require_eof().unwrap();
}

#[test]
fn empty_containers() {
    let mut r = Reader::new(b" [ ] ");
    let mut arr = r.array();
    assert!(!arr.next(&mut r));
    r.require_eof().unwrap();

    let mut r = Reader::new(b" { } ");
    let mut obj = r.object();
    assert!(!obj.next(&mut r));
    r.require_eof().unwrap();
}

#[test]
fn array_or_null() {
    let mut r = Reader::new(b"null");
    let mut arr = r.array_or_null();
    assert!(!arr.next(&mut r));
    assert!(!arr.is_defined());
    assert!(r.error().is_none());

    let mut r = Reader::new(b"[1,2]");
    let mut values = Vec::new();
    let mut arr = r.array_or_null();
    while arr.next(&mut r) {
        values.push(r.int64());
    }
    assert_eq!(vec![1, 2], values);
    assert!(arr.is_defined());
    assert!(r.error().is_none());
}

#[test]
fn object_iteration() {
    let mut r = Reader::new(br#"{"a":1,"b":2}"#);
    let mut members = Vec::new();
    let mut obj = r.object();
    while obj.next(&mut r) {
        let name = obj.name(&r).to_vec();
        members.push((name, r.int64()));
    }
    assert_eq!(vec![(b"a".to_vec(), 1), (b"b".to_vec(), 2)], members);
    assert!(r.error().is_none());
    r.require_eof().unwrap();
}

#[test]
fn object_or_null() {
    let mut r = Reader::new(b"null");
    let mut obj = r.object_or_null();
    assert!(!obj.next(&mut r));
    assert!(!obj.is_defined());
    assert!(r.error().is_none());

    let mut r = Reader::new(br#"{"a":1}"#);
    let mut obj = r.object_or_null();
    assert!(obj.next(&mut r));
    assert!(obj.is_defined());
    assert_eq!(b"a", obj.name(&r));
    assert_eq!(1, r.int64());
    assert!(!obj.next(&mut r));
}

#[test]
fn unread_values_are_skipped_by_next() {
    let mut r = Reader::new(br#"{"a": {"x": [1,2,3]}, "b": 2}"#);
    let mut obj = r.object();
    assert!(obj.next(&mut r));
    assert_eq!(b"a", obj.name(&r));
    // the member value is intentionally not read; next() skips it
    assert!(obj.next(&mut r));
    assert_eq!(b"b", obj.name(&r));
    assert_eq!(2, r.int64());
    assert!(!obj.next(&mut r));
    r.require_eof().unwrap();
    assert!(r.error().is_none());
}

#[test]
fn skip_value_consumes_whole_subtree() {
    let mut r = Reader::new(br#"[{"a":[1,2,{"b":"c"}],"d":null}, 42]"#);
    let mut arr = r.array();
    assert!(arr.next(&mut r));
    r.skip_value();
    assert!(arr.next(&mut r));
    assert_eq!(42, r.int64());
    assert!(!arr.next(&mut r));
    r.require_eof().unwrap();
    assert!(r.error().is_none());
}

#[test]
fn add_error_stops_array_parsing() {
    let mut r = Reader::new(b"[1,2,3,4,5]");
    let mut values = Vec::new();
    let mut arr = r.array();
    while arr.next(&mut r) {
        let n = r.int64();
        values.push(n);
        if n > 1 {
            r.add_error(format!("got an error after {n}"));
        }
    }
    assert_eq!(vec![1, 2], values);
    assert_eq!(
        Some(&ReaderError::Other("got an error after 2".to_owned())),
        r.error()
    );

    // the latch keeps the first error
    r.add_error("later");
    assert_eq!(
        Some(&ReaderError::Other("got an error after 2".to_owned())),
        r.error()
    );
    r.replace_error("replaced");
    assert_eq!(Some(&ReaderError::Other("replaced".to_owned())), r.error());
}

#[test]
fn syntax_error_stops_array_parsing() {
    let mut r = Reader::new(b"[bad,1,2]");
    let mut arr = r.array();
    assert!(!arr.next(&mut r));
    assert_eq!(0, r.int64());
    assert!(matches!(r.error(), Some(ReaderError::Syntax(_))));
    // the latch is unchanged by further reads
    assert!(!arr.next(&mut r));
    assert_eq!(0, r.int64());
    assert_eq!(false, r.bool());
    assert_eq!(b"", r.string());
    assert!(matches!(r.error(), Some(ReaderError::Syntax(_))));
}

#[test]
fn add_error_stops_object_parsing() {
    let mut r = Reader::new(br#"{"a":1, "b":2}"#);
    let mut obj = r.object();
    assert!(obj.next(&mut r));
    assert_eq!(b"a", obj.name(&r));
    assert_eq!(1, r.int64());

    r.add_error("sorry");
    assert_eq!(Some(&ReaderError::Other("sorry".to_owned())), r.error());
    assert!(!obj.next(&mut r));
    assert_eq!(Some(&ReaderError::Other("sorry".to_owned())), r.error());
}

#[test]
fn syntax_error_stops_object_parsing() {
    let mut r = Reader::new(br#"{"a":1, x: 2, "c":3}"#);
    let mut obj = r.object();
    assert!(obj.next(&mut r));
    assert_eq!(b"a", obj.name(&r));
    assert_eq!(1, r.int64());

    assert!(!obj.next(&mut r));
    assert_eq!(0, r.int64());
    assert!(matches!(r.error(), Some(ReaderError::Syntax(_))));
    assert!(!obj.next(&mut r));
}

#[test]
fn type_mismatch_on_container_reads() {
    let mut r = Reader::new(b"12");
    let arr = r.array();
    assert!(!arr.is_defined());
    match r.error() {
        Some(ReaderError::Type(err)) => {
            assert_eq!(ValueKind::Array, err.expected);
            assert_eq!(ValueKind::Number, err.actual);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut r = Reader::new(b"[1]");
    let obj = r.object_or_null();
    assert!(!obj.is_defined());
    match r.error() {
        Some(ReaderError::Type(err)) => {
            assert_eq!(ValueKind::Object, err.expected);
            assert_eq!(ValueKind::Array, err.actual);
            assert!(err.nullable);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn any_scalars() {
    let mut r = Reader::new(b"123");
    match r.any() {
        Some(AnyValue::Number(n)) => {
            assert_eq!(b"123", n.raw());
            assert_eq!(Ok(123), n.as_i64());
            assert_eq!(Ok(123), n.as_u64());
        }
        other => panic!("unexpected value: {other:?}"),
    }

    let mut r = Reader::new(b"null");
    assert!(matches!(r.any(), Some(AnyValue::Null)));

    let mut r = Reader::new(b"true");
    assert!(matches!(r.any(), Some(AnyValue::Bool(true))));

    let mut r = Reader::new(br#""text""#);
    match r.any() {
        Some(AnyValue::String(s)) => assert_eq!(b"text", s),
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn any_containers() {
    let mut r = Reader::new(br#"["a","b"]"#);
    let mut count = 0;
    match r.any() {
        Some(AnyValue::Array(mut arr)) => {
            while arr.next(&mut r) {
                r.skip_value();
                count += 1;
            }
        }
        other => panic!("unexpected value: {other:?}"),
    }
    assert_eq!(2, count);
    r.require_eof().unwrap();

    let mut r = Reader::new(br#"{"a":1,"b":2,"c":3}"#);
    let mut count = 0;
    match r.any() {
        Some(AnyValue::Object(mut obj)) => {
            while obj.next(&mut r) {
                r.skip_value();
                count += 1;
            }
        }
        other => panic!("unexpected value: {other:?}"),
    }
    assert_eq!(3, count);
    r.require_eof().unwrap();
}

#[test]
fn any_kind() {
    for (json, kind) in [
        ("null", ValueKind::Null),
        ("true", ValueKind::Boolean),
        ("1", ValueKind::Number),
        (r#""s""#, ValueKind::String),
        ("[]", ValueKind::Array),
        ("{}", ValueKind::Object),
    ] {
        let mut r = Reader::new(json.as_bytes());
        assert_eq!(kind, r.any().unwrap().kind(), "{json}");
    }
}

#[test]
fn reset_clears_the_latch_and_reuses_the_reader() {
    let mut r = Reader::new(b"bad");
    r.bool();
    assert!(r.error().is_some());

    r.reset(b"true");
    assert!(r.error().is_none());
    assert_eq!(true, r.bool());
    r.require_eof().unwrap();
}

#[test]
fn raw_property_names_keep_escapes() {
    // member names are returned raw even in decode mode
    let mut r = Reader::new_with_buffers(br#"{"a\tb": "a\tb"}"#, decode_buffers());
    let mut obj = r.object();
    assert!(obj.next(&mut r));
    assert_eq!(br"a\tb", obj.name(&r));
    assert_eq!(b"a\tb", r.string());
    assert!(!obj.next(&mut r));
    assert!(r.error().is_none());
}

#[test]
fn deeply_nested_document() {
    let depth = 200;
    let json = format!("{}true{}", "[".repeat(depth), "]".repeat(depth));
    let mut r = Reader::new(json.as_bytes());
    r.skip_value();
    r.require_eof().unwrap();
    assert!(r.error().is_none());
}
