//! Typed header values and their FITS text form.

use alloc::format;
use alloc::string::{String, ToString};

use crate::error::{Error, Result};

/// A typed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
    /// FITS complex integer `(real, imaginary)`.
    ComplexInt(i64, i64),
    /// FITS complex float `(real, imaginary)`.
    ComplexFloat(f64, f64),
    /// A keyword with a value indicator but an empty value field.
    Undefined,
}

impl Value {
    /// Short name of the variant, used in cast errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::ComplexInt(..) => "complex integer",
            Value::ComplexFloat(..) => "complex float",
            Value::Undefined => "undefined",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i64)
            }
        }
    )*};
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<(f64, f64)> for Value {
    fn from((re, im): (f64, f64)) -> Self {
        Value::ComplexFloat(re, im)
    }
}

impl From<(i64, i64)> for Value {
    fn from((re, im): (i64, i64)) -> Self {
        Value::ComplexInt(re, im)
    }
}

// ── Typed extraction ──

/// Conversion from a parsed header [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(value: &Value, target: &'static str) -> Error {
    let shown = match value {
        Value::String(s) => s.clone(),
        Value::Logical(b) => String::from(if *b { "T" } else { "F" }),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        other => String::from(other.type_name()),
    };
    Error::cast(shown, target)
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Logical(b) => Ok(*b),
            other => Err(mismatch(other, "bool")),
        }
    }
}

macro_rules! int_from_value {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Integer(n) => {
                        <$t>::try_from(*n).map_err(|_| mismatch(value, stringify!($t)))
                    }
                    other => Err(mismatch(other, stringify!($t))),
                }
            }
        }
    )*};
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(n) => Ok(*n as f64),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value)
            .map(|f| f as f32)
            .map_err(|_| mismatch(value, "f32"))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl FromValue for (f64, f64) {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::ComplexFloat(re, im) => Ok((*re, *im)),
            Value::ComplexInt(re, im) => Ok((*re as f64, *im as f64)),
            other => Err(mismatch(other, "complex")),
        }
    }
}

// ── Parsing ──

/// Split the value area of a card (bytes 10..80) at the first `/` that is
/// not inside a quoted string.
///
/// Returns the value text (untrimmed) and the comment, if any, with one
/// leading space and trailing spaces removed.
pub fn split_value_comment(field: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    for (i, b) in field.bytes().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'/' if !in_string => {
                let comment = field[i + 1..].strip_prefix(' ').unwrap_or(&field[i + 1..]);
                let comment = comment.trim_end();
                return (&field[..i], Some(comment));
            }
            _ => {}
        }
    }
    (field, None)
}

/// Parse the content of a quoted string, handling doubled quotes.
fn parse_string(text: &str) -> String {
    let inner = &text[1..];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                out.push('\'');
                chars.next();
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    // Trailing blanks are not significant in FITS strings.
    out.truncate(out.trim_end().len());
    out
}

/// Parse a float, accepting the FITS `D` exponent marker.
pub fn parse_fits_float(s: &str) -> Option<f64> {
    if s.contains(['D', 'd']) {
        s.replace(['D', 'd'], "E").parse::<f64>().ok()
    } else {
        s.parse::<f64>().ok()
    }
}

fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (left, right) = inner.split_once(',')?;
    let (left, right) = (left.trim(), right.trim());

    if let (Ok(re), Ok(im)) = (left.parse::<i64>(), right.parse::<i64>()) {
        return Some(Value::ComplexInt(re, im));
    }
    Some(Value::ComplexFloat(
        parse_fits_float(left)?,
        parse_fits_float(right)?,
    ))
}

/// Parse the value text of a card (without its comment) into a [`Value`].
pub fn parse_value(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Undefined);
    }
    if text.starts_with('\'') {
        return Ok(Value::String(parse_string(text)));
    }
    match text {
        "T" => return Ok(Value::Logical(true)),
        "F" => return Ok(Value::Logical(false)),
        _ => {}
    }
    if text.starts_with('(') {
        return parse_complex(text).ok_or_else(|| Error::cast(text, "complex"));
    }
    if !text.contains(['.', 'E', 'e', 'D', 'd']) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Integer(n));
        }
    }
    parse_fits_float(text)
        .map(Value::Float)
        .ok_or_else(|| Error::cast(text, "FITS value"))
}

// ── Formatting ──

/// Width of the fixed-format value column (card columns 11-30).
pub const FIXED_VALUE_WIDTH: usize = 20;

/// Right-justify `s` in a field of `width` characters. Longer text is
/// returned unchanged.
pub fn right_justify(s: &str, width: usize) -> String {
    format!("{:>width$}", s, width = width)
}

/// Shortest text for `f` that parses back to the same value and is
/// recognisably a float, no longer than `max_len` when possible.
pub fn format_float(f: f64, max_len: usize) -> String {
    let abs = libm::fabs(f);
    if f == 0.0 || (1e-4..1e15).contains(&abs) {
        // Debug keeps a trailing `.0` on integral values.
        let s = format!("{:?}", f);
        if s.len() <= max_len {
            return s;
        }
    } else if f.is_finite() {
        let s = format!("{:E}", f);
        if s.len() <= max_len {
            return s;
        }
    }
    let mut precision = 16usize;
    loop {
        let s = format!("{:.prec$E}", f, prec = precision);
        if s.len() <= max_len || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

/// Quote a string value, doubling embedded quotes and padding the content
/// to the customary minimum of 8 characters.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 10);
    out.push('\'');
    let mut content_len = 0;
    for c in s.chars() {
        if c == '\'' {
            out.push_str("''");
            content_len += 2;
        } else {
            out.push(c);
            content_len += 1;
        }
    }
    while content_len < 8 {
        out.push(' ');
        content_len += 1;
    }
    out.push('\'');
    out
}

/// Render a value as the text that follows `= ` on a card.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Logical(b) => right_justify(if *b { "T" } else { "F" }, FIXED_VALUE_WIDTH),
        Value::Integer(n) => right_justify(&n.to_string(), FIXED_VALUE_WIDTH),
        Value::Float(f) => right_justify(&format_float(*f, FIXED_VALUE_WIDTH), FIXED_VALUE_WIDTH),
        Value::String(s) => quote_string(s),
        Value::ComplexInt(re, im) => right_justify(&format!("({}, {})", re, im), FIXED_VALUE_WIDTH),
        Value::ComplexFloat(re, im) => right_justify(
            &format!("({}, {})", format_float(*re, 20), format_float(*im, 20)),
            FIXED_VALUE_WIDTH,
        ),
        Value::Undefined => String::new(),
    }
}
