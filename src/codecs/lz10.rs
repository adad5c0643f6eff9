//! GBA/DS BIOS `LZ77UnComp` data, compression type `0x10`.
//!
//! After the [Nintendo header](crate::format::NintendoHeader), each flag byte
//! describes the next eight tokens from its most significant bit down. A set
//! bit is a literal byte, a clear bit is a big endian `u16` match:
//!
//! ```text
//! LLLL dddd dddd dddd    length - 3, displacement - 1
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::Cursor;

use super::{check_size, limit_index, output_buffer, parse};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::NintendoHeader;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x10;
const NAME: &str = "LZ10";

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x12, 1, 0x1000)])
}

/// Flag bit plus the literal, or flag bit plus the two byte match
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

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let header = NintendoHeader::new(KIND, input.len(), NAME)?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 8);
    header.write(&mut out)?;

    let mut flags = FlagWriter::msb_byte();
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.push(&mut out, true);
                    out.push(byte);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.push(&mut out, false);
                let encoded = ((m.length - 3) << 12 | (m.displacement - 1)) as u16;
                out.write_u16::<BigEndian>(encoded)?;
            }
        }
    }

    debug!(
        "LZ10: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let size = NintendoHeader::read(&mut rdr, KIND, NAME)?.size as usize;

    let mut out = output_buffer(size, input);
    let mut flags = FlagReader::msb_byte();
    while out.len() < size {
        if flags.next(&mut rdr)? {
            out.push(rdr.read_u8()?);
        } else {
            let encoded = rdr.read_u16::<BigEndian>()? as usize;
            copy_match(&mut out, (encoded & 0xFFF) + 1, (encoded >> 12) + 3)?;
        }
    }

    check_size(out, size)
}
