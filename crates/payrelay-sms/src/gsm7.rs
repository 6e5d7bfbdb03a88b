// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GSM 03.38 default alphabet and septet unpacking.

use crate::error::PduError;

const ESCAPE: u8 = 0x1B;

#[rustfmt::skip]
const DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

fn extension(septet: u8) -> Option<char> {
    Some(match septet {
        0x0A => '\u{0C}',
        0x14 => '^',
        0x28 => '{',
        0x29 => '}',
        0x2F => '\\',
        0x3C => '[',
        0x3D => '~',
        0x3E => ']',
        0x40 => '|',
        0x65 => '€',
        _ => return None,
    })
}

/// Unpack `count` 7-bit septets from packed octets.
pub fn unpack_septets(packed: &[u8], count: usize) -> Result<Vec<u8>, PduError> {
    let mut septets = Vec::with_capacity(count);
    for i in 0..count {
        let bit = i * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        let low = *packed.get(byte).ok_or(PduError::Truncated("user data"))?;
        let mut value = u16::from(low) >> shift;
        if shift > 1 {
            let high = *packed.get(byte + 1).ok_or(PduError::Truncated("user data"))?;
            value |= u16::from(high) << (8 - shift);
        }
        septets.push((value & 0x7F) as u8);
    }
    Ok(septets)
}

/// Map septets to text. An escape followed by an unknown code falls back to
/// the default-alphabet character, as 3GPP TS 23.038 requires.
pub fn decode_septets(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(septet) = iter.next() {
        if septet == ESCAPE {
            match iter.next() {
                Some(next) => {
                    out.push(extension(next).unwrap_or(DEFAULT_ALPHABET[usize::from(next & 0x7F)]))
                }
                None => break,
            }
        } else {
            out.push(DEFAULT_ALPHABET[usize::from(septet & 0x7F)]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_classic_hello() {
        // "hellohello" packed, from the GSM 03.38 worked example.
        let packed = [0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37];
        let septets = unpack_septets(&packed, 10).unwrap();
        assert_eq!(decode_septets(&septets), "hellohello");
    }

    #[test]
    fn extension_table_characters() {
        assert_eq!(decode_septets(&[0x1B, 0x65, 0x35]), "€5");
        assert_eq!(decode_septets(&[0x1B, 0x28, 0x1B, 0x29]), "{}");
    }

    #[test]
    fn trailing_escape_is_dropped() {
        assert_eq!(decode_septets(&[0x41, 0x1B]), "A");
    }

    #[test]
    fn short_input_is_truncation_error() {
        assert_eq!(
            unpack_septets(&[0xE8], 3),
            Err(PduError::Truncated("user data"))
        );
    }
}
