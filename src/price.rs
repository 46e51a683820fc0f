//! Price handling for German-formatted listing prices.
//!
//! Prices are displayed as `10.000,00 €`: `.` groups thousands, `,` separates
//! decimals. Both the original and the discounted price are rendered back in
//! the same style without the currency symbol.

use crate::error::PriceError;
use regex::Regex;
use std::sync::LazyLock;

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d,]").expect("static price pattern is valid"));

/// Parses a displayed price such as `"12.345,67 €"` into a number.
///
/// Everything except digits and the decimal comma is discarded, so grouping
/// dots, currency symbols and whitespace never reach the number parser.
pub fn parse_price(display: &str) -> Result<f64, PriceError> {
    let cleaned = NON_PRICE_CHARS.replace_all(display, "");
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(PriceError::Empty(display.to_string()));
    }

    let normalized = cleaned.replacen(',', ".", 1);
    match normalized.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(PriceError::Invalid(display.to_string())),
    }
}

/// Applies a percentage discount to a price.
pub fn apply_discount(price: f64, discount_percent: f64) -> f64 {
    price * (1.0 - discount_percent / 100.0)
}

/// Formats a price with two decimals and `de-DE` separators, e.g. `1.234,50`.
///
/// Rounding works on the shortest decimal form of `value` and goes half away
/// from zero, the way the browser's `Intl.NumberFormat` rounds. `1.005` becomes
/// `1,01` even though the nearest binary value lies just below the tie.
pub fn format_price(value: f64) -> Result<String, PriceError> {
    if !value.is_finite() {
        return Err(PriceError::Invalid(value.to_string()));
    }

    // `Display` prints the shortest round-trip digits and never an exponent.
    let shortest = value.abs().to_string();
    let (whole, fraction) = shortest.split_once('.').unwrap_or((&shortest, ""));

    let mut digits: Vec<u8> = whole
        .bytes()
        .chain(fraction.bytes().chain(std::iter::repeat(b'0')).take(2))
        .map(|b| b - b'0')
        .collect();
    if fraction.as_bytes().get(2).is_some_and(|&d| d >= b'5') {
        round_up(&mut digits);
    }

    let (units, cents) = digits.split_at(digits.len() - 2);
    let units: String = units.iter().map(|d| char::from(b'0' + d)).collect();
    let units = units.trim_start_matches('0');
    let sign = if value.is_sign_negative() && digits.iter().any(|&d| d != 0) {
        "-"
    } else {
        ""
    };

    Ok(format!(
        "{sign}{},{}{}",
        group_thousands(if units.is_empty() { "0" } else { units }),
        cents[0],
        cents[1]
    ))
}

/// Adds one unit in the last place to a decimal digit string
fn round_up(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, 1);
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    grouped
}

/// Original and discounted price, both already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePair {
    pub original: String,
    pub discounted: String,
}

/// Parses a displayed price and renders it together with its discounted value.
pub fn discount_display_price(display: &str, discount_percent: f64) -> Result<PricePair, PriceError> {
    let price = parse_price(display)?;
    Ok(PricePair {
        original: format_price(price)?,
        discounted: format_price(apply_discount(price, discount_percent))?,
    })
}
