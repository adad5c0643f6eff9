//! 3DS `LZ60` data, compression type `0x60`.
//!
//! Flag bytes as in LZ10. A match stores the displacement (not biased) across
//! two bytes, with the low nibble of the first byte selecting the length:
//!
//! ```text
//! dddd iiii  dddddddd  [extra]
//! ```
//!
//! An indicator of 2..=15 is the length itself, `0` adds a byte holding the
//! length - 0x10, and `1` adds a little endian `u16` holding the length - 0x110.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::Cursor;

use super::{check_size, limit_index, output_buffer, parse};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::NintendoHeader;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x60;
const NAME: &str = "LZ60";

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x1010F, 1, 0xFFF)])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, _: usize, length: usize) -> u32 {
        match length {
            0..=0xF => 17,
            0x10..=0x10F => 25,
            _ => 33,
        }
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

                let disp = m.displacement;
                let indicator = match m.length {
                    0..=0xF => m.length,
                    0x10..=0x10F => 0,
                    _ => 1,
                };
                out.push(((disp & 0xF) << 4 | indicator) as u8);
                out.push((disp >> 4) as u8);
                match indicator {
                    0 => out.push((m.length - 0x10) as u8),
                    1 => out.write_u16::<LittleEndian>((m.length - 0x110) as u16)?,
                    _ => {}
                }
            }
        }
    }

    debug!(
        "LZ60: {} bytes into {} with {} matches",
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
            continue;
        }

        let b0 = rdr.read_u8()? as usize;
        let b1 = rdr.read_u8()? as usize;
        let displacement = b1 << 4 | b0 >> 4;
        let length = match b0 & 0xF {
            0 => rdr.read_u8()? as usize + 0x10,
            1 => rdr.read_u16::<LittleEndian>()? as usize + 0x110,
            indicator => indicator,
        };
        copy_match(&mut out, displacement, length)?;
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};

    #[test]
    fn indicator_selects_length_width() -> Result<()> {
        let input = vec![7u8; 0x200];
        let parser = FixedMatches(vec![
            Match::new(1, 1, 0xF),
            Match::new(0x10, 0x10, 0x10),
            Match::new(0x20, 0x20, 0x1E0),
        ]);
        let packed = compress(&input, &parser)?;

        // flags, literal, then the three matches
        assert_eq!(
            &packed[4..],
            &[0x80, 0x07, 0x1F, 0x00, 0x00, 0x01, 0x00, 0x01, 0x02, 0xD0, 0x00][..]
        );
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }
}
