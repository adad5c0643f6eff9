//! `ECD` data.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..3     | magic `ECD` |
//! | 3        | `1` compressed, `0` stored |
//! | 4..8     | `u32` BE length of the body |
//! | 8..12    | `u32` BE decompressed size |
//!
//! ## Body
//! Flag bytes, least significant bit first, set bit = literal. Matches address
//! a 0x400 byte ring whose write head starts at 0x3BE:
//!
//! ```text
//! ssssssss SSLLLLLL    slot low byte, slot high bits, length - 3
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size, Ring};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::{KompressionError, Result};
use crate::format::{expect_magic, remaining};
use crate::matching::{FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 3] = b"ECD";
const NAME: &str = "LzECD";
const HEADER_SIZE: usize = 12;
const RING_SIZE: usize = 0x400;
const RING_PRESET: usize = 0x3BE;

const STORED: u8 = 0;
const COMPRESSED: u8 = 1;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x42, 1, RING_SIZE)]).with_pre_buffer(RING_PRESET)
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, _: usize, _: usize) -> u32 {
        17
    }
}

fn write_header(out: &mut Vec<u8>, mode: u8, body_len: usize, size: u32) -> Result<()> {
    out.write_all(MAGIC)?;
    out.write_u8(mode)?;
    out.write_u32::<BigEndian>(u32_size(NAME, body_len)?)?;
    out.write_u32::<BigEndian>(size)?;
    Ok(())
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut body = Vec::with_capacity(input.len());
    let mut flags = FlagWriter::lsb_byte();
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.push(&mut body, true);
                    body.push(byte);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.push(&mut body, false);
                let slot = Ring::slot(RING_SIZE, RING_PRESET, m.position, m.displacement);
                body.push(slot as u8);
                body.push(((slot >> 8) << 6 | (m.length - 3)) as u8);
            }
        }
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len().min(input.len()));
    if body.len() >= input.len() {
        debug!("LzECD: storing {} bytes", input.len());
        write_header(&mut out, STORED, input.len(), size)?;
        out.extend_from_slice(input);
    } else {
        debug!(
            "LzECD: {} bytes into a {} byte body with {} matches",
            input.len(),
            body.len(),
            matches.len()
        );
        write_header(&mut out, COMPRESSED, body.len(), size)?;
        out.extend_from_slice(&body);
    }
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let mode = rdr.read_u8()?;
    let body_len = rdr.read_u32::<BigEndian>()? as usize;
    let size = rdr.read_u32::<BigEndian>()? as usize;

    if remaining(&rdr) < body_len {
        return Err(KompressionError::SizeMismatch {
            expected: body_len,
            found: remaining(&rdr),
        });
    }
    let body = &input[HEADER_SIZE..HEADER_SIZE + body_len];

    match mode {
        STORED => check_size(body.to_vec(), size),
        COMPRESSED => decode_body(body, size),
        value => Err(KompressionError::UnsupportedVariant { codec: NAME, value }),
    }
}

fn decode_body(body: &[u8], size: usize) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(body);
    let mut ring = Ring::new(RING_SIZE, RING_PRESET);
    let mut flags = FlagReader::lsb_byte();

    let mut out = output_buffer(size, body);
    while out.len() < size {
        if flags.next(&mut rdr)? {
            let byte = rdr.read_u8()?;
            ring.push(&mut out, byte);
        } else {
            let b0 = rdr.read_u8()? as usize;
            let b1 = rdr.read_u8()? as usize;
            ring.copy(&mut out, (b1 >> 6) << 8 | b0, (b1 & 0x3F) + 3);
        }
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::Match;
    use crate::parser::LzParser;

    #[test]
    fn matches_address_ring_slots() -> Result<()> {
        let input = b"abababababababab";
        let parser = crate::matching::FixedMatches(vec![Match::new(2, 2, 14)]);
        let packed = compress(input, &parser)?;

        assert_eq!(&packed[..4], b"ECD\x01");
        assert_eq!(&packed[4..12], &[0, 0, 0, 5, 0, 0, 0, 16]);
        // slot 0x3BE: low byte 0xBE, high bits 3
        assert_eq!(&packed[12..], &[0b011, b'a', b'b', 0xBE, 0xC0 | 11]);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn incompressible_input_is_stored() -> Result<()> {
        let input = b"abcdefgh";
        let packed = compress(input, &LzParser::default())?;
        assert_eq!(&packed[..12], b"ECD\x00\x00\x00\x00\x08\x00\x00\x00\x08");
        assert_eq!(&packed[12..], input);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn zero_history_is_matched() -> Result<()> {
        let input = [0u8; 40];
        let packed = compress(&input, &LzParser::default())?;
        assert_eq!(packed[3], COMPRESSED);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn bad_modes_and_short_bodies() {
        assert!(matches!(
            decompress(b"ECD\x02\x00\x00\x00\x00\x00\x00\x00\x00"),
            Err(KompressionError::UnsupportedVariant { value: 2, .. })
        ));
        assert!(matches!(
            decompress(b"ECD\x01\x00\x00\x00\x04\x00\x00\x00\x08ab"),
            Err(KompressionError::SizeMismatch { expected: 4, found: 2 })
        ));
    }
}
