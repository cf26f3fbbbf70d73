//! Internal module for scanning JSON number literals and converting the
//! decomposed form to machine types
//!
//! The scanner follows the classic decimal float decomposition: up to 19
//! mantissa digits are accumulated into a `u64`, leading zeros shift the
//! decimal point instead of counting, and digits beyond the mantissa
//! capacity only set a truncation flag. On top of that sits the JSON
//! grammar: no `+` sign, no leading zeros in the integer part, and fraction
//! and exponent parts must contain at least one digit.

use std::ops::Range;

use crate::reader::RangeError;
use crate::utf8;

/// Largest number of decimal mantissa digits that always fits in a `u64`
const MAX_MANTISSA_DIGITS: i32 = 19;

/// Exponent magnitude at which digit accumulation stops; precision is lost
/// long before this point, the cap only bounds the arithmetic
const EXPONENT_CAP: i32 = 10_000;

/// Decomposed form of a JSON number literal
///
/// When [`truncated`](Self::truncated) is `false`,
/// `sign * mantissa * 10^exponent` is exactly the rational value of the
/// literal. When it is `true` the literal had more than 19 significant
/// digits and the decomposition only approximates it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct NumberProps {
    /// Absolute mantissa value accumulated from up to 19 significant digits
    pub mantissa: u64,
    /// Decimal exponent to apply to the mantissa
    pub exponent: i32,
    /// Whether the literal carries a leading `-`
    pub negative: bool,
    /// Whether significant digits beyond the mantissa capacity were seen
    pub truncated: bool,
    /// Byte range of the literal within the input document
    pub raw: Range<usize>,
}

/// Scans a number literal starting at `start`, which must point at a `-` or
/// a digit
///
/// Returns `None` if the bytes at `start` are not a valid JSON number. The
/// scan stops at the first byte which cannot continue the literal; the
/// consumed range is recorded in [`NumberProps::raw`].
pub(crate) fn scan_number(data: &[u8], start: usize) -> Option<NumberProps> {
    let mut i = start;
    let mut negative = false;
    if data.get(i) == Some(&b'-') {
        negative = true;
        i += 1;
    }
    if !data.get(i).map_or(false, u8::is_ascii_digit) {
        return None;
    }
    // a 0 integer part must stand alone
    if data[i] == b'0' && data.get(i + 1).map_or(false, u8::is_ascii_digit) {
        return None;
    }

    let mut mantissa = 0u64;
    let mut truncated = false;
    let mut saw_dot = false;
    let mut saw_frac_digit = false;
    let mut nd = 0i32;
    let mut nd_mant = 0i32;
    let mut dp = 0i32;

    while let Some(&b) = data.get(i) {
        if b == b'.' {
            if saw_dot {
                break;
            }
            saw_dot = true;
            dp = nd;
            i += 1;
            continue;
        }
        if !b.is_ascii_digit() {
            break;
        }
        if saw_dot {
            saw_frac_digit = true;
        }
        if b == b'0' && nd == 0 {
            // leading zeros shift the decimal point instead of counting
            dp -= 1;
            i += 1;
            continue;
        }
        nd += 1;
        if nd_mant < MAX_MANTISSA_DIGITS {
            mantissa = mantissa * 10 + u64::from(b - b'0');
            nd_mant += 1;
        } else if b != b'0' {
            truncated = true;
        }
        i += 1;
    }

    if saw_dot && !saw_frac_digit {
        return None;
    }
    if !saw_dot {
        dp = nd;
    }

    if let Some(&b) = data.get(i) {
        if b == b'e' || b == b'E' {
            i += 1;
            let mut exp_sign = 1i32;
            match data.get(i) {
                Some(&b'+') => i += 1,
                Some(&b'-') => {
                    exp_sign = -1;
                    i += 1;
                }
                _ => {}
            }
            if !data.get(i).map_or(false, u8::is_ascii_digit) {
                return None;
            }
            let mut e = 0i32;
            while let Some(&b) = data.get(i) {
                if !b.is_ascii_digit() {
                    break;
                }
                if e < EXPONENT_CAP {
                    e = e * 10 + i32::from(b - b'0');
                }
                i += 1;
            }
            dp += e * exp_sign;
        }
    }

    let exponent = if mantissa != 0 { dp - nd_mant } else { 0 };
    Some(NumberProps {
        mantissa,
        exponent,
        negative,
        truncated,
        raw: start..i,
    })
}

pub(crate) fn props_to_i64(props: &NumberProps) -> Option<i64> {
    if props.truncated || props.exponent != 0 {
        return None;
    }
    if props.negative {
        if props.mantissa > i64::MAX as u64 + 1 {
            return None;
        }
        Some((props.mantissa as i64).wrapping_neg())
    } else {
        if props.mantissa > i64::MAX as u64 {
            return None;
        }
        Some(props.mantissa as i64)
    }
}

pub(crate) fn props_to_u64(props: &NumberProps) -> Option<u64> {
    if props.negative || props.truncated || props.exponent != 0 {
        return None;
    }
    Some(props.mantissa)
}

/// Exact powers of ten representable as `f64`
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Converts the decomposed number to `f64`, falling back to the standard
/// library parser on the raw literal where the decomposition cannot produce
/// a correctly rounded result
pub(crate) fn props_to_f64(props: &NumberProps, raw: &[u8]) -> f64 {
    if !props.truncated && props.mantissa < (1u64 << 53) {
        // the mantissa is exact and a single multiplication or division by
        // an exact power of ten rounds once
        if (0..=22).contains(&props.exponent) {
            let f = props.mantissa as f64 * POW10[props.exponent as usize];
            return if props.negative { -f } else { f };
        }
        if (-22..0).contains(&props.exponent) {
            let f = props.mantissa as f64 / POW10[(-props.exponent) as usize];
            return if props.negative { -f } else { f };
        }
    }
    match utf8::to_str_unchecked(raw).parse::<f64>() {
        Ok(f) => f,
        Err(_) => {
            if props.negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        }
    }
}

/// A JSON number as read from the document: the decomposed properties
/// together with the raw literal bytes
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct JsonNumber<'j> {
    pub(crate) props: NumberProps,
    pub(crate) raw: &'j [u8],
}

impl<'j> JsonNumber<'j> {
    /// The literal bytes exactly as they appeared in the document
    pub fn raw(&self) -> &'j [u8] {
        self.raw
    }

    /// The decomposed properties of the literal
    pub fn props(&self) -> &NumberProps {
        &self.props
    }

    /// Converts to `i64`
    ///
    /// Fails for literals with a fractional or exponent part, truncated
    /// literals and values outside the `i64` range.
    pub fn as_i64(&self) -> Result<i64, RangeError> {
        props_to_i64(&self.props).ok_or(RangeError {
            target_type: "i64",
            offset: self.props.raw.start,
        })
    }

    /// Converts to `u64`
    ///
    /// Fails for negative literals, literals with a fractional or exponent
    /// part and truncated literals.
    pub fn as_u64(&self) -> Result<u64, RangeError> {
        props_to_u64(&self.props).ok_or(RangeError {
            target_type: "u64",
            offset: self.props.raw.start,
        })
    }

    /// Converts to `f64`, with the same rounding as the standard library
    /// float parser
    pub fn as_f64(&self) -> f64 {
        props_to_f64(&self.props, self.raw)
    }
}
