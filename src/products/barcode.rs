//! Barcode validation and digit selection
//!
//! OCR returns up to three digit strings with confidences. The first one (by
//! confidence) that passes its checksum is used; if none does, no barcode is
//! reported at all. A wrong lookup is worse than none.

use serde::{Deserialize, Serialize};

/// Maximum OCR candidates considered
pub const MAX_DIGIT_CANDIDATES: usize = 3;

/// One OCR reading of the digits under a barcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitCandidate {
    pub digits: String,
    pub confidence: f64,
}

impl DigitCandidate {
    pub fn new(digits: impl Into<String>, confidence: f64) -> Self {
        Self {
            digits: digits.into(),
            confidence,
        }
    }
}

/// A checksum-verified barcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedBarcode {
    /// 13 digits for EAN-13/UPC-A, 8 for EAN-8
    pub code: String,
    pub confidence: f64,
}

fn to_digits(code: &str) -> Option<Vec<u8>> {
    code.bytes()
        .map(|b| b.is_ascii_digit().then(|| b - b'0'))
        .collect()
}

/// Strip spaces and dashes; pad 12-digit UPC-A to 13 digits
pub fn normalize_code(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if compact.is_empty() || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match compact.len() {
        12 => Some(format!("0{compact}")),
        8 | 13 => Some(compact),
        _ => None,
    }
}

/// EAN-13 check digit over the first 12 digits (weights 1,3,1,3,...)
pub fn ean13_check_digit(first12: &[u8]) -> Option<u8> {
    if first12.len() != 12 || first12.iter().any(|d| *d > 9) {
        return None;
    }
    let sum: u32 = first12
        .iter()
        .enumerate()
        .map(|(i, d)| *d as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    Some(((10 - sum % 10) % 10) as u8)
}

/// EAN-8 check digit over the first 7 digits (weights 3,1,3,...)
pub fn ean8_check_digit(first7: &[u8]) -> Option<u8> {
    if first7.len() != 7 || first7.iter().any(|d| *d > 9) {
        return None;
    }
    let sum: u32 = first7
        .iter()
        .enumerate()
        .map(|(i, d)| *d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    Some(((10 - sum % 10) % 10) as u8)
}

/// Validate a normalized 8- or 13-digit code
pub fn is_valid_code(code: &str) -> bool {
    let Some(digits) = to_digits(code) else {
        return false;
    };
    match digits.len() {
        13 => ean13_check_digit(&digits[..12]) == Some(digits[12]),
        8 => ean8_check_digit(&digits[..7]) == Some(digits[7]),
        _ => false,
    }
}

/// Normalize and validate a single raw reading
pub fn validate(raw: &str) -> Option<String> {
    normalize_code(raw).filter(|code| is_valid_code(code))
}

/// Pick the highest-confidence candidate that passes its checksum
pub fn select_barcode(candidates: &[DigitCandidate]) -> Option<ValidatedBarcode> {
    let mut ordered: Vec<&DigitCandidate> = candidates.iter().collect();
    let confidence = |c: &DigitCandidate| if c.confidence.is_finite() { c.confidence } else { 0.0 };
    ordered.sort_by(|a, b| confidence(b).total_cmp(&confidence(a)));

    ordered
        .into_iter()
        .take(MAX_DIGIT_CANDIDATES)
        .find_map(|candidate| {
            let code = validate(&candidate.digits);
            if code.is_none() {
                tracing::debug!(digits = %candidate.digits, "barcode candidate failed checksum");
            }
            code.map(|code| ValidatedBarcode {
                code,
                confidence: confidence(candidate),
            })
        })
}
