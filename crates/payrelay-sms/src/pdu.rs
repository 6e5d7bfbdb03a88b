// SPDX-FileCopyrightText: 2026 Payrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS-DELIVER PDU decoding (3GPP TS 23.040).
//!
//! Input PDUs carry the SMSC information prefix the way handset telephony
//! stacks hand them over. Only the fields the relay needs are kept: the
//! originating address, the service-centre timestamp, and the body text.
//! Concatenation headers are skipped rather than interpreted; fragments are
//! grouped by the reassembler using sender and timestamp.

use chrono::{FixedOffset, NaiveDate, TimeZone};
use payrelay_core::EpochMillis;

use crate::error::PduError;
use crate::gsm7;

/// One decoded SMS fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPdu {
    /// Originating address: `+` prefixed digits, plain digits, or an alphanumeric name.
    pub sender: String,
    /// Service-centre timestamp in epoch milliseconds.
    pub timestamp: EpochMillis,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Gsm7,
    EightBit,
    Ucs2,
}

impl Coding {
    fn from_dcs(dcs: u8) -> Result<Self, PduError> {
        match dcs & 0xC0 {
            // General data coding, with or without automatic deletion.
            0x00 | 0x40 => match (dcs >> 2) & 0x03 {
                0 => Ok(Coding::Gsm7),
                1 => Ok(Coding::EightBit),
                2 => Ok(Coding::Ucs2),
                _ => Err(PduError::UnsupportedCoding(dcs)),
            },
            0xC0 => match dcs & 0xF0 {
                0xC0 | 0xD0 => Ok(Coding::Gsm7),
                0xE0 => Ok(Coding::Ucs2),
                _ if dcs & 0x04 != 0 => Ok(Coding::EightBit),
                _ => Ok(Coding::Gsm7),
            },
            _ => Err(PduError::UnsupportedCoding(dcs)),
        }
    }
}

/// Byte cursor that reports which field ran out of input.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, PduError> {
        let b = *self.bytes.get(self.pos).ok_or(PduError::Truncated(field))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], PduError> {
        let end = self.pos.checked_add(len).ok_or(PduError::Truncated(field))?;
        let slice = self.bytes.get(self.pos..end).ok_or(PduError::Truncated(field))?;
        self.pos = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Swapped-nibble BCD octet to its two-digit value.
fn semi_octet(b: u8) -> u32 {
    u32::from(b & 0x0F) * 10 + u32::from(b >> 4)
}

fn decode_address(reader: &mut Reader<'_>) -> Result<String, PduError> {
    let digits = usize::from(reader.byte("address length")?);
    let type_of_address = reader.byte("address type")?;
    let octets = reader.take(digits.div_ceil(2), "address")?;

    match type_of_address & 0x70 {
        0x50 => {
            let septets = gsm7::unpack_septets(octets, digits * 4 / 7)?;
            Ok(gsm7::decode_septets(&septets))
        }
        numbering => {
            let mut out = String::with_capacity(digits + 1);
            if numbering == 0x10 {
                out.push('+');
            }
            for &b in octets {
                for nibble in [b & 0x0F, b >> 4] {
                    if out.trim_start_matches('+').len() == digits || nibble == 0x0F {
                        break;
                    }
                    out.push(char::from_digit(u32::from(nibble), 16).unwrap_or('?'));
                }
            }
            Ok(out)
        }
    }
}

fn decode_timestamp(raw: &[u8]) -> Result<EpochMillis, PduError> {
    let year = 2000 + semi_octet(raw[0]) as i32;
    let date = NaiveDate::from_ymd_opt(year, semi_octet(raw[1]), semi_octet(raw[2]))
        .and_then(|d| d.and_hms_opt(semi_octet(raw[3]), semi_octet(raw[4]), semi_octet(raw[5])))
        .ok_or(PduError::InvalidTimestamp)?;

    // Zone is in quarter hours; bit 3 of the low nibble is the sign.
    let tz = raw[6];
    let quarters = i32::from(tz & 0x07) * 10 + i32::from(tz >> 4);
    let sign = if tz & 0x08 != 0 { -1 } else { 1 };
    let seconds = sign * quarters * 15 * 60;
    let offset = FixedOffset::east_opt(seconds).ok_or(PduError::InvalidTimestamp)?;

    offset
        .from_local_datetime(&date)
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or(PduError::InvalidTimestamp)
}

/// Decode one SMS-DELIVER PDU, including its SMSC prefix.
pub fn decode_pdu(bytes: &[u8]) -> Result<DecodedPdu, PduError> {
    let mut reader = Reader::new(bytes);

    let smsc_len = usize::from(reader.byte("SMSC length")?);
    reader.take(smsc_len, "SMSC")?;

    let first_octet = reader.byte("first octet")?;
    if first_octet & 0x03 != 0x00 {
        return Err(PduError::UnsupportedMessageType(first_octet & 0x03));
    }
    let has_header = first_octet & 0x40 != 0;

    let sender = decode_address(&mut reader)?;
    let _protocol_id = reader.byte("protocol identifier")?;
    let coding = Coding::from_dcs(reader.byte("data coding scheme")?)?;
    let timestamp = decode_timestamp(reader.take(7, "timestamp")?)?;
    let udl = usize::from(reader.byte("user data length")?);
    let user_data = reader.rest();

    let header_octets = if has_header {
        1 + usize::from(*user_data.first().ok_or(PduError::Truncated("user data header"))?)
    } else {
        0
    };

    let body = match coding {
        Coding::Gsm7 => {
            let septets = gsm7::unpack_septets(user_data, udl)?;
            let skip = (header_octets * 8).div_ceil(7);
            gsm7::decode_septets(septets.get(skip..).unwrap_or_default())
        }
        Coding::EightBit => user_data
            .get(header_octets..udl)
            .ok_or(PduError::Truncated("user data"))?
            .iter()
            .map(|&b| char::from(b))
            .collect(),
        Coding::Ucs2 => {
            let payload = user_data
                .get(header_octets..udl)
                .ok_or(PduError::Truncated("user data"))?;
            let units: Vec<u16> = payload
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| PduError::InvalidUcs2)?
        }
    };

    Ok(DecodedPdu {
        sender,
        timestamp,
        body,
    })
}

/// Parse hex-encoded PDUs as delivered by text-based intake sources.
pub fn decode_hex_pdus<S: AsRef<str>>(hex_pdus: &[S]) -> Result<Vec<Vec<u8>>, PduError> {
    hex_pdus
        .iter()
        .map(|h| hex::decode(h.as_ref().trim()).map_err(|e| PduError::InvalidHex(e.to_string())))
        .collect()
}
