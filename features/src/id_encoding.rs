//! Mapping free-form labels onto ArUco marker ids.
//!
//! A label that reads as a base-10 integer (optionally signed, with single
//! `_` separators between digits) is used as the id directly, with no range
//! check. Any other label is turned into a number by concatenating
//! the decimal code point of each character, and that number is halved until
//! it fits the 250-symbol dictionary. Distinct labels may share an id.

use std::fmt;
use std::num::IntErrorKind;

/// Bounded marker identifier. Text-derived ids are always `<= MarkerId::MAX_ENCODED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u32);

impl MarkerId {
    /// Largest id produced from a non-numeric label.
    pub const MAX_ENCODED: u32 = 249;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for MarkerId {
    fn from(v: u16) -> Self {
        Self(u32::from(v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("cannot encode an empty label")]
    EmptyLabel,

    #[error("numeric label {0} is negative")]
    Negative(i64),

    #[error("numeric label '{0}' does not fit a marker id")]
    OutOfRange(String),
}

/// Encodes `label` into a marker id.
pub fn encode_label(label: &str) -> Result<MarkerId, EncodingError> {
    if label.is_empty() {
        return Err(EncodingError::EmptyLabel);
    }
    match parse_numeric(label) {
        Some(parsed) => parsed,
        None => Ok(encode_text(label)),
    }
}

// `None` means the label is not an integer and takes the text path.
fn parse_numeric(label: &str) -> Option<Result<MarkerId, EncodingError>> {
    let trimmed = label.trim();
    let cleaned = strip_digit_separators(trimmed)?;
    match cleaned.parse::<i64>() {
        Ok(n) if n < 0 => Some(Err(EncodingError::Negative(n))),
        Ok(n) => Some(
            u32::try_from(n)
                .map(MarkerId)
                .map_err(|_| EncodingError::OutOfRange(trimmed.to_string())),
        ),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Some(Err(EncodingError::OutOfRange(trimmed.to_string())))
            }
            _ => None,
        },
    }
}

/// Accepts an optional sign followed by ASCII digits, where single
/// underscores may separate digit groups (`1_000`). Returns the literal
/// without underscores, or `None` if it is not an integer literal.
fn strip_digit_separators(literal: &str) -> Option<String> {
    let (sign, body) = match literal.as_bytes().first() {
        Some(b'+') | Some(b'-') => literal.split_at(1),
        _ => ("", literal),
    };
    if body.is_empty() || body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return None;
    }
    if !body.bytes().all(|b| b.is_ascii_digit() || b == b'_') {
        return None;
    }
    let mut out = String::with_capacity(literal.len());
    out.push_str(sign);
    out.extend(body.chars().filter(|&c| c != '_'));
    Some(out)
}

fn encode_text(label: &str) -> MarkerId {
    let mut digits = String::new();
    for c in label.chars() {
        digits.push_str(&(c as u32).to_string());
    }
    MarkerId(halve_into_range(&digits))
}

const LIMB_DIGITS: usize = 18;
const LIMB_BASE: u128 = 1_000_000_000_000_000_000;

/// Floor-halves the decimal number `digits` until it is at most
/// `MarkerId::MAX_ENCODED`.
///
/// Repeated floor halving equals one floor division by a power of two, so
/// large values are shifted right 64 bits per pass before finishing bit by
/// bit.
fn halve_into_range(digits: &str) -> u32 {
    let mut limbs = decimal_limbs(digits);
    let mut start = 0;
    loop {
        while start + 1 < limbs.len() && limbs[start] == 0 {
            start += 1;
        }
        // Three significant limbs means at least 10^36, far above range after a 64-bit shift.
        if limbs.len() - start <= 2 {
            break;
        }
        shift_right_64(&mut limbs[start..]);
    }
    let mut n = limbs[start..]
        .iter()
        .fold(0u128, |acc, &limb| acc * LIMB_BASE + u128::from(limb));
    while n > u128::from(MarkerId::MAX_ENCODED) {
        n /= 2;
    }
    n as u32
}

// Big-endian base-10^18 limbs. Never empty.
fn decimal_limbs(digits: &str) -> Vec<u64> {
    let bytes = digits.as_bytes();
    let head = bytes.len() % LIMB_DIGITS;
    let mut limbs = Vec::with_capacity(bytes.len() / LIMB_DIGITS + 1);
    let parse = |chunk: &[u8]| {
        chunk
            .iter()
            .fold(0u64, |acc, &b| acc * 10 + u64::from(b - b'0'))
    };
    if head > 0 || bytes.is_empty() {
        limbs.push(parse(&bytes[..head]));
    }
    limbs.extend(bytes[head..].chunks(LIMB_DIGITS).map(parse));
    limbs
}

fn shift_right_64(limbs: &mut [u64]) {
    let mut rem = 0u128;
    for limb in limbs.iter_mut() {
        let cur = rem * LIMB_BASE + u128::from(*limb);
        *limb = (cur >> 64) as u64;
        rem = cur & u128::from(u64::MAX);
    }
}
