//! Nintendo `Yaz0` data.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic `Yaz0` |
//! | 4..8     | size of the decompressed data |
//! | 8..16    | zero |
//!
//! The size uses the byte order the data was written with: big endian on the
//! GameCube and Wii, little endian on the Switch.
//!
//! ## Body
//! Flag bytes, most significant bit first, interleaved with their tokens. A set
//! bit is a literal. A match is `Lddd dddd dddd`, displacement - 1 in 12 bits,
//! with `L` holding length - 2; if `L` is zero a third byte holds length - 0x12.

use byteorder::ReadBytesExt;
use log::debug;
use std::io::{Cursor, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::{expect_magic, ByteOrder};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 4] = b"Yaz0";
const NAME: &str = "Yaz0";
const HEADER_SIZE: usize = 16;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x111, 1, 0x1000)])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, _: usize, length: usize) -> u32 {
        if length < 0x12 {
            17
        } else {
            25
        }
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser, order: ByteOrder) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + input.len() / 2);
    out.write_all(MAGIC)?;
    order.write_u32(&mut out, size)?;
    out.write_all(&[0; 8])?;

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

                let disp = m.displacement - 1;
                if m.length < 0x12 {
                    out.push(((m.length - 2) << 4 | disp >> 8) as u8);
                    out.push(disp as u8);
                } else {
                    out.push((disp >> 8) as u8);
                    out.push(disp as u8);
                    out.push((m.length - 0x12) as u8);
                }
            }
        }
    }

    debug!(
        "Yaz0 ({}): {} bytes into {} with {} matches",
        order,
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = order.read_u32(&mut rdr)? as usize;
    rdr.set_position(HEADER_SIZE as u64);

    let mut out = output_buffer(size, input);
    let mut flags = FlagReader::msb_byte();
    while out.len() < size {
        if flags.next(&mut rdr)? {
            out.push(rdr.read_u8()?);
            continue;
        }

        let b0 = rdr.read_u8()? as usize;
        let b1 = rdr.read_u8()? as usize;
        let displacement = ((b0 & 0xF) << 8 | b1) + 1;
        let length = match b0 >> 4 {
            0 => rdr.read_u8()? as usize + 0x12,
            n => n + 2,
        };
        copy_match(&mut out, displacement, length)?;
    }

    check_size(out, size)
}
