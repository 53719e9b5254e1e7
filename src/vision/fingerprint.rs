//! Bitmap fingerprints
//!
//! A fingerprint is `0x` followed by one fixed-width upper-case hex group per
//! mask row. Each row is read as an unsigned integer whose most significant
//! bit is the leftmost column, padded on the left to `ceil(width / 4)` digits.
//! The string is part of the training data format: cells of a different size
//! produce different fingerprints.

use super::bitmap::CharacterBitmap;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Hex digits used per mask row for a given cell width
pub fn digits_per_row(width: u32) -> usize {
    (width as usize).div_ceil(4)
}

/// Fingerprint a bitmap's foreground mask
///
/// Depends on `data` only; colors and label are ignored.
pub fn fingerprint(bitmap: &CharacterBitmap) -> String {
    fingerprint_mask(&bitmap.data, bitmap.width)
}

/// Fingerprint a raw mask of the given width
pub fn fingerprint_mask(data: &[Vec<bool>], width: u32) -> String {
    let digits = digits_per_row(width);
    let pad = digits * 4 - width as usize;

    let mut out = String::with_capacity(2 + digits * data.len());
    out.push_str("0x");

    for row in data {
        // Left-pad with zero bits so the row splits into whole nibbles
        let bits = std::iter::repeat(false).take(pad).chain(row.iter().copied());
        let mut nibble = 0u8;
        for (i, bit) in bits.enumerate() {
            nibble = (nibble << 1) | bit as u8;
            if i % 4 == 3 {
                out.push(HEX_DIGITS[nibble as usize] as char);
                nibble = 0;
            }
        }
    }

    out
}

/// Recover the mask from a fingerprint, given the cell width it was made with
///
/// Returns `None` when the string is not a well-formed fingerprint for that
/// width (bad prefix, non-hex digits, partial row, or bits set in padding).
pub fn decode(fingerprint: &str, width: u32) -> Option<Vec<Vec<bool>>> {
    let hex = fingerprint.strip_prefix("0x")?;
    let digits = digits_per_row(width);
    if digits == 0 || hex.is_empty() || hex.len() % digits != 0 || !hex.is_ascii() {
        return None;
    }
    let pad = digits * 4 - width as usize;

    hex.as_bytes()
        .chunks(digits)
        .map(|group| {
            let mut bits = Vec::with_capacity(digits * 4);
            for &c in group {
                let value = (c as char).to_digit(16)?;
                bits.extend((0..4).rev().map(|shift| (value >> shift) & 1 == 1));
            }
            if bits[..pad].iter().any(|&b| b) {
                return None;
            }
            Some(bits.split_off(pad))
        })
        .collect()
}
