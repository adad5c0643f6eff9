//! DS `LZ11` data, compression type `0x11`.
//!
//! Same flag bytes as LZ10 (set bit = literal), but matches come in three
//! sizes, chosen by the top nibble of their first byte:
//!
//! | Top nibble | Bytes | Length          |
//! | :--------: | :---: | --------------- |
//! | 2..=15     | 2     | nibble + 1      |
//! | 0          | 3     | 8 bits + 0x11   |
//! | 1          | 4     | 16 bits + 0x111 |
//!
//! The last 12 bits of every match are the displacement - 1.

use byteorder::ReadBytesExt;
use log::debug;
use std::io::Cursor;

use super::{check_size, limit_index, output_buffer, parse};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::NintendoHeader;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x11;
const NAME: &str = "LZ11";

pub const MAX_LENGTH: usize = 0x10110;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, MAX_LENGTH, 1, 0x1000)])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, _: usize, length: usize) -> u32 {
        match length {
            0..=0x10 => 17,
            0x11..=0x110 => 25,
            _ => 33,
        }
    }
}

fn write_match(out: &mut Vec<u8>, length: usize, displacement: usize) {
    let disp = displacement - 1;
    match length {
        0..=0x10 => {
            out.push(((length - 1) << 4 | disp >> 8) as u8);
        }
        0x11..=0x110 => {
            let len = length - 0x11;
            out.push((len >> 4) as u8);
            out.push(((len & 0xF) << 4 | disp >> 8) as u8);
        }
        _ => {
            let len = length - 0x111;
            out.push((0x10 | len >> 12) as u8);
            out.push((len >> 4) as u8);
            out.push(((len & 0xF) << 4 | disp >> 8) as u8);
        }
    }
    out.push(disp as u8);
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
                write_match(&mut out, m.length, m.displacement);
            }
        }
    }

    debug!(
        "LZ11: {} bytes into {} with {} matches",
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
        let (length, high) = match b0 >> 4 {
            0 => {
                let b1 = rdr.read_u8()? as usize;
                (((b0 & 0xF) << 4 | b1 >> 4) + 0x11, b1 & 0xF)
            }
            1 => {
                let b1 = rdr.read_u8()? as usize;
                let b2 = rdr.read_u8()? as usize;
                (((b0 & 0xF) << 12 | b1 << 4 | b2 >> 4) + 0x111, b2 & 0xF)
            }
            nibble => (nibble + 1, b0 & 0xF),
        };
        let displacement = (high << 8 | rdr.read_u8()? as usize) + 1;
        copy_match(&mut out, displacement, length)?;
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};

    #[test]
    fn match_sizes_switch_at_boundaries() {
        let mut out = Vec::new();
        write_match(&mut out, 0x10, 1);
        assert_eq!(out, vec![0xF0, 0x00]);

        out.clear();
        write_match(&mut out, 0x11, 0x1000);
        assert_eq!(out, vec![0x00, 0x0F, 0xFF]);

        out.clear();
        write_match(&mut out, 0x110, 2);
        assert_eq!(out, vec![0x0F, 0xF0, 0x01]);

        out.clear();
        write_match(&mut out, 0x111, 2);
        assert_eq!(out, vec![0x10, 0x00, 0x00, 0x01]);

        out.clear();
        write_match(&mut out, MAX_LENGTH, 2);
        assert_eq!(out, vec![0x1F, 0xFF, 0xF0, 0x01]);
    }

    #[test]
    fn boundary_lengths_round_trip() -> Result<()> {
        for &length in &[0x10, 0x11, 0x110, 0x111, MAX_LENGTH] {
            let input = vec![0x5A; length + 1];
            let parser = FixedMatches(vec![Match::new(1, 1, length)]);
            let packed = compress(&input, &parser)?;
            assert_eq!(decompress(&packed)?, input, "length {:#x}", length);
        }
        Ok(())
    }
}
