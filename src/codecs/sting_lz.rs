//! Sting `LZ77` data.
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic `LZ77` |
//! | 4..8     | `u32` LE decompressed size |
//! | 8..12    | `u32` LE token count |
//! | 12..16   | `u32` LE offset of the token data |
//!
//! A bitmap with one flag per token, most significant bit first and padded to
//! a multiple of four bytes, sits between the header and the token data. A set
//! flag is a match, `dddddddd DDDDLLLL`: the low byte of the displacement,
//! then its high nibble above length - 3.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{BitReader, BitWriter};
use crate::errors::{KompressionError, Result};
use crate::format::expect_magic;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 4] = b"LZ77";
const NAME: &str = "StingLZ";
const HEADER_SIZE: usize = 16;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x12, 1, 0xFFF)])
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

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut bitmap = BitWriter::msb_bytes();
    let mut data = Vec::with_capacity(input.len() / 2);
    let mut count = 0usize;
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    bitmap.write_bit(false);
                    data.push(byte);
                }
                count += run.len();
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                bitmap.write_bit(true);
                data.push(m.displacement as u8);
                data.push(((m.displacement >> 8) << 4 | (m.length - 3)) as u8);
                count += 1;
            }
        }
    }

    let mut bitmap = bitmap.finish();
    bitmap.resize((bitmap.len() + 3) & !3, 0);
    let data_offset = HEADER_SIZE + bitmap.len();

    let mut out = Vec::with_capacity(data_offset + data.len());
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(size)?;
    out.write_u32::<LittleEndian>(u32_size(NAME, count)?)?;
    out.write_u32::<LittleEndian>(u32_size(NAME, data_offset)?)?;
    out.extend_from_slice(&bitmap);
    out.extend_from_slice(&data);

    debug!(
        "StingLZ: {} bytes into {} as {} tokens",
        input.len(),
        out.len(),
        count
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = rdr.read_u32::<LittleEndian>()? as usize;
    let count = rdr.read_u32::<LittleEndian>()? as usize;
    let data_offset = rdr.read_u32::<LittleEndian>()? as usize;

    if data_offset < HEADER_SIZE || data_offset > input.len() {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let mut bitmap = BitReader::msb_bytes(&input[HEADER_SIZE..data_offset]);
    let mut data = Cursor::new(&input[data_offset..]);
    let mut out = output_buffer(size, input);
    for _ in 0..count {
        if bitmap.read_bit()? {
            let b0 = data.read_u8()? as usize;
            let b1 = data.read_u8()? as usize;
            copy_match(&mut out, (b1 >> 4) << 8 | b0, (b1 & 0xF) + 3)?;
        } else {
            out.push(data.read_u8()?);
        }
    }

    check_size(out, size)
}
