//! Exact decimal numbers.
//!
//! DynamoDB numbers carry up to 38 significant digits with a magnitude between
//! `1E-130` and `9.99..E+125`. They never pass through binary floating point:
//! parsing, comparison and arithmetic all work on the decimal digits directly.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum number of significant digits a DynamoDB number may hold.
pub const MAX_SIGNIFICANT_DIGITS: usize = 38;

/// Largest allowed power of ten of the most significant digit.
const MAX_LEADING_EXPONENT: i64 = 125;

/// Smallest allowed power of ten of the most significant digit.
const MIN_LEADING_EXPONENT: i64 = -130;

/// Errors raised when a string cannot be stored as a DynamoDB number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    /// The text is not a decimal number at all.
    #[error("The parameter cannot be converted to a numeric value: {0}")]
    Invalid(String),
    /// More than 38 significant digits.
    #[error("Attempting to store more than 38 significant digits in a Number")]
    TooManyDigits,
    /// Magnitude above `9.99..E+125`.
    #[error(
        "Number overflow. Attempting to store a number with magnitude larger than supported range"
    )]
    Overflow,
    /// Non-zero magnitude below `1E-130`.
    #[error(
        "Number underflow. Attempting to store a number with magnitude smaller than supported range"
    )]
    Underflow,
}

/// An exact decimal: `(-1)^negative * digits * 10^exponent`.
///
/// `digits` is kept normalized (no leading or trailing zeros, most significant
/// first), so structural equality is numeric equality: `1`, `1.0` and `10e-1`
/// all parse to the same value. Zero is the empty digit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number {
    negative: bool,
    digits: Vec<u8>,
    exponent: i64,
}

impl Number {
    /// The number zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            negative: false,
            digits: Vec::new(),
            exponent: 0,
        }
    }

    /// Returns `true` if this number is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Returns `true` if this number is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Number of significant decimal digits (zero has none).
    #[must_use]
    pub fn significant_digits(&self) -> usize {
        self.digits.len()
    }

    /// Returns the additive inverse.
    #[must_use]
    pub fn negated(&self) -> Self {
        let mut n = self.clone();
        if !n.is_zero() {
            n.negative = !n.negative;
        }
        n
    }

    /// Exact addition, validated against the storable range.
    pub fn checked_add(&self, other: &Self) -> Result<Self, NumberError> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }

        let exponent = self.exponent.min(other.exponent);
        let a = self.scaled_digits(exponent);
        let b = other.scaled_digits(exponent);

        if self.negative == other.negative {
            return Self::from_parts(self.negative, add_magnitudes(&a, &b), exponent);
        }
        match compare_magnitudes(&a, &b) {
            Ordering::Equal => Ok(Self::zero()),
            Ordering::Greater => Self::from_parts(self.negative, sub_magnitudes(&a, &b), exponent),
            Ordering::Less => Self::from_parts(other.negative, sub_magnitudes(&b, &a), exponent),
        }
    }

    /// Exact subtraction, validated against the storable range.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, NumberError> {
        self.checked_add(&other.negated())
    }

    /// Build a normalized number and check it fits DynamoDB's limits.
    fn from_parts(negative: bool, mut digits: Vec<u8>, mut exponent: i64) -> Result<Self, NumberError> {
        let leading = digits.iter().take_while(|d| **d == 0).count();
        digits.drain(..leading);
        while digits.last() == Some(&0) {
            digits.pop();
            exponent += 1;
        }
        if digits.is_empty() {
            return Ok(Self::zero());
        }
        if digits.len() > MAX_SIGNIFICANT_DIGITS {
            return Err(NumberError::TooManyDigits);
        }

        let n = Self {
            negative,
            digits,
            exponent,
        };
        let leading_exponent = n.leading_exponent();
        if leading_exponent > MAX_LEADING_EXPONENT {
            return Err(NumberError::Overflow);
        }
        if leading_exponent < MIN_LEADING_EXPONENT {
            return Err(NumberError::Underflow);
        }
        Ok(n)
    }

    /// Power of ten of the most significant digit.
    #[allow(clippy::cast_possible_wrap)]
    fn leading_exponent(&self) -> i64 {
        self.exponent + self.digits.len() as i64 - 1
    }

    /// The digits re-expressed against a smaller exponent (zero padded).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn scaled_digits(&self, exponent: i64) -> Vec<u8> {
        let padding = (self.exponent - exponent).max(0) as usize;
        let mut digits = Vec::with_capacity(self.digits.len() + padding);
        digits.extend_from_slice(&self.digits);
        digits.resize(self.digits.len() + padding, 0);
        digits
    }

    fn signum(&self) -> i8 {
        if self.is_zero() {
            0
        } else if self.negative {
            -1
        } else {
            1
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Number {
    type Err = NumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NumberError::Invalid(s.to_owned());
        let bytes = s.as_bytes();

        let (negative, mut pos) = match bytes.first() {
            Some(b'-') => (true, 1),
            Some(b'+') => (false, 1),
            _ => (false, 0),
        };

        let mut digits = Vec::with_capacity(bytes.len());
        let mut fraction_len: i64 = 0;
        let mut seen_point = false;
        while let Some(&b) = bytes.get(pos) {
            match b {
                b'0'..=b'9' => {
                    digits.push(b - b'0');
                    if seen_point {
                        fraction_len += 1;
                    }
                }
                b'.' if !seen_point => seen_point = true,
                _ => break,
            }
            pos += 1;
        }
        if digits.is_empty() {
            return Err(invalid());
        }

        let mut exponent = 0;
        if pos < bytes.len() {
            if !matches!(bytes[pos], b'e' | b'E') {
                return Err(invalid());
            }
            exponent = parse_exponent(&s[pos + 1..]).ok_or_else(invalid)?;
        }

        Self::from_parts(negative, digits, exponent - fraction_len)
    }
}

/// Parse an exponent suffix, saturating far outside the storable range.
fn parse_exponent(text: &str) -> Option<i64> {
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let significant = body.trim_start_matches('0');
    let magnitude = if significant.len() > 9 {
        1_000_000_000
    } else {
        significant.parse::<i64>().unwrap_or(0)
    };
    Some(if negative { -magnitude } else { magnitude })
}

impl fmt::Display for Number {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        let mut out = String::with_capacity(self.digits.len() + 8);
        if self.negative {
            out.push('-');
        }
        let push_digits = |out: &mut String, digits: &[u8]| {
            out.extend(digits.iter().map(|d| char::from(b'0' + d)));
        };

        let integer_len = self.digits.len() as i64 + self.exponent;
        if self.exponent >= 0 {
            push_digits(&mut out, &self.digits);
            out.extend(std::iter::repeat_n('0', self.exponent as usize));
        } else if integer_len > 0 {
            let split = integer_len as usize;
            push_digits(&mut out, &self.digits[..split]);
            out.push('.');
            push_digits(&mut out, &self.digits[split..]);
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', (-integer_len) as usize));
            push_digits(&mut out, &self.digits);
        }
        f.write_str(&out)
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_sign = self.signum().cmp(&other.signum());
        if by_sign != Ordering::Equal || self.is_zero() {
            return by_sign;
        }
        let magnitude = self
            .leading_exponent()
            .cmp(&other.leading_exponent())
            .then_with(|| self.digits.cmp(&other.digits));
        if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_magnitudes(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn add_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut xs = a.iter().rev();
    let mut ys = b.iter().rev();
    let mut carry = 0;
    loop {
        let (x, y) = (xs.next(), ys.next());
        if x.is_none() && y.is_none() {
            break;
        }
        let sum = x.copied().unwrap_or(0) + y.copied().unwrap_or(0) + carry;
        out.push(sum % 10);
        carry = sum / 10;
    }
    if carry > 0 {
        out.push(carry);
    }
    out.reverse();
    out
}

/// `a - b` where `a >= b`.
fn sub_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    let mut ys = b.iter().rev();
    let mut borrow = 0;
    for &x in a.iter().rev() {
        let y = ys.next().copied().unwrap_or(0) + borrow;
        if x >= y {
            out.push(x - y);
            borrow = 0;
        } else {
            out.push(x + 10 - y);
            borrow = 1;
        }
    }
    out.reverse();
    out
}
