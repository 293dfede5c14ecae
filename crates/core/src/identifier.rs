use serde::{Deserialize, Serialize};
use std::fmt;

pub const TAX_ID_LEN: usize = 14;

const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Strips every character that is not an ASCII digit.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Checksum validation of a 14-digit tax identifier.
///
/// Total over every input: anything that is not exactly fourteen ASCII
/// digits, or whose digits are all the same, is simply invalid.
pub fn is_valid_tax_id(code: &str) -> bool {
    if code.len() != TAX_ID_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = code.bytes().map(|b| u32::from(b - b'0')).collect();
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..12], &FIRST_WEIGHTS) == digits[12]
        && check_digit(&digits[..13], &SECOND_WEIGHTS) == digits[13]
}

/// Canonical tax identifier form: digits only, with a spreadsheet float
/// suffix (`".0"`) removed and leading zeros restored up to fourteen digits.
pub fn canonical_tax_id(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    let digits = digits_only(raw);
    if digits.is_empty() || digits.len() >= TAX_ID_LEN {
        return digits;
    }
    format!("{digits:0>width$}", width = TAX_ID_LEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Unresolved,
    TaxId,
    RegistryCode,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Unresolved => write!(f, "unresolved"),
            IdentifierKind::TaxId => write!(f, "tax_id"),
            IdentifierKind::RegistryCode => write!(f, "registry_code"),
        }
    }
}

impl std::str::FromStr for IdentifierKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unresolved" => Ok(IdentifierKind::Unresolved),
            "tax_id" => Ok(IdentifierKind::TaxId),
            "registry_code" => Ok(IdentifierKind::RegistryCode),
            other => Err(format!("Unknown identifier kind: '{other}'")),
        }
    }
}

/// An entity identifier tagged with the scheme it belongs to.
///
/// Rows leave the normalizer as `Unresolved`; the reconciler turns them into
/// `TaxId` or, when a registry code has no reference match, `RegistryCode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    Unresolved(String),
    TaxId(String),
    RegistryCode(String),
}

impl Identifier {
    pub fn new(kind: IdentifierKind, value: impl Into<String>) -> Self {
        let value = value.into();
        match kind {
            IdentifierKind::Unresolved => Identifier::Unresolved(value),
            IdentifierKind::TaxId => Identifier::TaxId(value),
            IdentifierKind::RegistryCode => Identifier::RegistryCode(value),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identifier::Unresolved(_) => IdentifierKind::Unresolved,
            Identifier::TaxId(_) => IdentifierKind::TaxId,
            Identifier::RegistryCode(_) => IdentifierKind::RegistryCode,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Unresolved(v) | Identifier::TaxId(v) | Identifier::RegistryCode(v) => v,
        }
    }

    pub fn tax_id(&self) -> Option<&str> {
        match self {
            Identifier::TaxId(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "11222333000181";

    #[test]
    fn accepts_known_valid_codes() {
        assert!(is_valid_tax_id(VALID));
        assert!(is_valid_tax_id("33000167000101"));
    }

    #[test]
    fn rejects_wrong_check_digits() {
        assert!(!is_valid_tax_id("11222333000182"));
        assert!(!is_valid_tax_id("11222333000191"));
    }

    #[test]
    fn rejects_structural_violations() {
        assert!(!is_valid_tax_id(""));
        assert!(!is_valid_tax_id("1122233300018"));
        assert!(!is_valid_tax_id("112223330001811"));
        assert!(!is_valid_tax_id("11.222.333/0001-81"));
        assert!(!is_valid_tax_id("1122233300018a"));
        assert!(!is_valid_tax_id("١١٢٢٢٣٣٣٠٠٠١٨١"));
    }

    #[test]
    fn rejects_repeated_digits() {
        for d in 0..=9u8 {
            let code: String = std::iter::repeat(char::from(b'0' + d)).take(14).collect();
            assert!(!is_valid_tax_id(&code), "{code}");
        }
        assert!(!is_valid_tax_id(&digits_only("11.111.111/1111-11")));
    }

    #[test]
    fn single_digit_changes_rarely_stay_valid() {
        let original: Vec<u8> = VALID.bytes().collect();
        let mut still_valid = 0;
        let mut mutations = 0;

        for pos in 0..TAX_ID_LEN {
            for d in b'0'..=b'9' {
                if d == original[pos] {
                    continue;
                }
                let mut code = original.clone();
                code[pos] = d;
                let code = String::from_utf8(code).unwrap();
                mutations += 1;
                if is_valid_tax_id(&code) {
                    assert!(pos < 12, "check digit mutation accepted: {code}");
                    still_valid += 1;
                }
            }
        }

        assert!(still_valid * 11 <= mutations, "{still_valid} of {mutations}");
    }

    #[test]
    fn canonical_form_restores_leading_zeros() {
        assert_eq!(canonical_tax_id("191000000117"), "00191000000117");
        assert_eq!(canonical_tax_id("191000000117.0"), "00191000000117");
        assert_eq!(canonical_tax_id("11.222.333/0001-81"), VALID);
        assert_eq!(canonical_tax_id(""), "");
    }

    #[test]
    fn identifier_accessors() {
        let id = Identifier::TaxId(VALID.to_string());
        assert_eq!(id.kind(), IdentifierKind::TaxId);
        assert_eq!(id.tax_id(), Some(VALID));
        assert_eq!(Identifier::RegistryCode("123456".into()).tax_id(), None);
        assert_eq!(
            Identifier::new("registry_code".parse().unwrap(), "42"),
            Identifier::RegistryCode("42".into())
        );
    }
}
