use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid number '{0}'")]
pub struct InvalidNumber(pub String);

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '₹'];
const CURRENCY_CODES: &[&str] = &["inr", "rs.", "rs", "usd", "eur", "gbp"];

/// Parse a money or quantity string into a Decimal.
///
/// Handles formats like:
/// - "30" -> 30
/// - "1,250.00" -> 1250.00
/// - "$ 10.00", "₹10.00", "Rs. 450", "INR 450" -> currency stripped
/// - "-5.00" -> -5.00
/// - "", "-", "N/A" -> None
///
/// A trailing minus ("5.00-") is rejected.
pub fn parse_amount(s: &str) -> Result<Option<Decimal>, InvalidNumber> {
    let s = s.trim();

    if s.is_empty() || matches!(s, "-" | "—" | "–" | "*") || s.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };

    let body = strip_currency(body);
    if body.is_empty() {
        return Err(InvalidNumber(s.to_string()));
    }

    let digits: String = body.chars().filter(|c| *c != ',').collect();
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(InvalidNumber(s.to_string()));
    }

    let value = Decimal::from_str(&digits).map_err(|_| InvalidNumber(s.to_string()))?;
    Ok(Some(if negative { -value } else { value }))
}

fn strip_currency(s: &str) -> &str {
    let mut rest = s.trim();
    loop {
        let before = rest;
        rest = rest
            .trim_start_matches(CURRENCY_SYMBOLS)
            .trim_end_matches(CURRENCY_SYMBOLS)
            .trim();
        let lower = rest.to_ascii_lowercase();
        for code in CURRENCY_CODES {
            if lower.starts_with(code) {
                rest = rest[code.len()..].trim_start();
                break;
            }
            if lower.ends_with(code) {
                rest = rest[..rest.len() - code.len()].trim_end();
                break;
            }
        }
        if rest == before {
            return rest;
        }
    }
}

/// Parse a whole-number string such as an article number.
pub fn parse_integer(s: &str) -> Result<i64, InvalidNumber> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| InvalidNumber(s.trim().to_string()))
}

/// `count / total` as a percentage rounded to one decimal place.
pub fn percent(count: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(count) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(1)
}
