use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;

/// Decodes file bytes as UTF-8, falling back to Latin-1 (as Windows-1252,
/// its superset). A leading byte-order mark is dropped.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0,
    }
}

/// Parses a pt-BR formatted amount (`"1.234,56"`) into its absolute value.
///
/// Thousands dots are dropped, the decimal comma becomes a dot and any minus
/// sign is removed before parsing.
pub fn parse_locale_decimal(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace('.', "").replace(',', ".").replace('-', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
        .map(|d| d.abs())
}

/// Absolute decimal value of a spreadsheet number; `None` for NaN/infinity.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.abs())
}
