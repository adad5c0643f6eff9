//! Spike Chunsoft archive compression.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic `FC AA 55 A7` |
//! | 4..8     | `u32` LE decompressed size |
//! | 8..12    | `u32` LE length of the whole file |
//!
//! ## Opcodes
//! | Bits                         | Meaning |
//! | ---------------------------- | ------- |
//! | `000nnnnn`                   | `n + 1` literals follow |
//! | `001nnnnn nnnnnnnn`          | `n + 1` literals follow |
//! | `010nnnnn vvvvvvvv`          | `n + 4` copies of `v` |
//! | `011nnnnn nnnnnnnn vvvvvvvv` | `n + 4` copies of `v` |
//! | `10LLdddd dddddddd`          | match of `L + 3`, displacement - 1 |
//! | `11LLLLLL dddddddd dddddddd` | match of `L + 3`, displacement - 1 as `u16` LE |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read, Write};

use super::{check_size, limit_index, output_buffer, parse, run_opening_price, u32_size};
use crate::errors::{KompressionError, Result};
use crate::format::expect_magic;
use crate::matching::{
    copy_match, fill_run, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens,
};

pub const MAGIC: &[u8; 4] = &[0xFC, 0xAA, 0x55, 0xA7];
const NAME: &str = "SpikeChunsoft";
const SHORT_LITERALS: usize = 0x20;
const MAX_LITERALS: usize = 0x2000;
const SHORT_RUN: usize = 0x23;

const NEAR: usize = 0;
const FAR: usize = 1;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(3, 6, 1, 0x1000),
        FindLimits::history(3, 0x42, 1, 0x10000),
        FindLimits::run(4, 0x2003),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, literal_run: usize) -> u32 {
        run_opening_price(literal_run % SHORT_LITERALS, 8)
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        match displacement {
            0 if length <= SHORT_RUN => 16,
            0 => 24,
            d if d <= 0x1000 && length <= 6 => 16,
            _ => 24,
        }
    }
}

fn write_literals(out: &mut Vec<u8>, run: &[u8]) {
    for chunk in run.chunks(MAX_LITERALS) {
        let n = chunk.len() - 1;
        if chunk.len() <= SHORT_LITERALS {
            out.push(n as u8);
        } else {
            out.push(0x20 | (n >> 8) as u8);
            out.push(n as u8);
        }
        out.extend_from_slice(chunk);
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 12);
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(size)?;
    out.write_u32::<LittleEndian>(0)?;

    for token in Tokens::new(input, &matches) {
        let m = match token {
            Token::Literals(run) => {
                write_literals(&mut out, run);
                continue;
            }
            Token::Match(m) => m,
        };

        let length = m.length - 3;
        let disp = m.displacement.wrapping_sub(1);
        match limit_index(NAME, &options, &m)? {
            NEAR => {
                out.push((0x80 | length << 4 | disp >> 8) as u8);
                out.push(disp as u8);
            }
            FAR => {
                out.push((0xC0 | length) as u8);
                out.write_u16::<LittleEndian>(disp as u16)?;
            }
            _ => {
                let n = m.length - 4;
                if m.length <= SHORT_RUN {
                    out.push((0x40 | n) as u8);
                } else {
                    out.push((0x60 | n >> 8) as u8);
                    out.push(n as u8);
                }
                out.push(input[m.position]);
            }
        }
    }

    let file_len = u32_size(NAME, out.len())?;
    (&mut out[8..12]).write_u32::<LittleEndian>(file_len)?;

    debug!(
        "SpikeChunsoft: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = rdr.read_u32::<LittleEndian>()? as usize;
    let file_len = rdr.read_u32::<LittleEndian>()? as usize;
    if file_len != input.len() {
        return Err(KompressionError::SizeMismatch {
            expected: file_len,
            found: input.len(),
        });
    }

    let mut out = output_buffer(size, input);
    while out.len() < size {
        let op = rdr.read_u8()? as usize;
        match op >> 5 {
            0b000 | 0b001 => {
                let count = if op & 0x20 == 0 {
                    op + 1
                } else {
                    ((op & 0x1F) << 8 | rdr.read_u8()? as usize) + 1
                };
                let start = out.len();
                out.resize(start + count, 0);
                rdr.read_exact(&mut out[start..])?;
            }
            0b010 => {
                let value = rdr.read_u8()?;
                fill_run(&mut out, value, (op & 0x1F) + 4);
            }
            0b011 => {
                let count = ((op & 0x1F) << 8 | rdr.read_u8()? as usize) + 4;
                let value = rdr.read_u8()?;
                fill_run(&mut out, value, count);
            }
            0b100 | 0b101 => {
                let disp = (op & 0xF) << 8 | rdr.read_u8()? as usize;
                copy_match(&mut out, disp + 1, ((op >> 4) & 3) + 3)?;
            }
            _ => {
                let disp = rdr.read_u16::<LittleEndian>()? as usize;
                copy_match(&mut out, disp + 1, (op & 0x3F) + 3)?;
            }
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
    fn every_opcode() -> Result<()> {
        let mut input = b"abcd".to_vec();
        input.extend_from_slice(b"abcd");
        input.extend_from_slice(&[5; 10]);
        input.extend_from_slice(&[6; 0x30]);
        input.extend_from_slice(&(0..0x28).collect::<Vec<u8>>());
        let tail_start = input.len();
        input.extend_from_slice(&(0..0x28).collect::<Vec<u8>>());

        let parser = crate::matching::FixedMatches(vec![
            Match::new(4, 4, 4),
            Match::new(8, 0, 10),
            Match::new(18, 0, 0x30),
            Match::new(tail_start, 0x28, 0x28),
        ]);
        let packed = compress(&input, &parser)?;
        assert_eq!(&packed[8..12], &(packed.len() as u32).to_le_bytes());

        let body = &packed[12..];
        assert_eq!(&body[..5], &[0x03, b'a', b'b', b'c', b'd']);
        assert_eq!(&body[5..7], &[0x90, 0x03]);
        assert_eq!(&body[7..9], &[0x46, 5]);
        assert_eq!(&body[9..12], &[0x60, 0x2C, 6]);
        // 0x28 literals need the long form
        assert_eq!(&body[12..14], &[0x20, 0x27]);
        assert_eq!(&body[54..], &[0xC0 | 0x25, 0x27, 0x00]);

        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn file_length_is_checked() -> Result<()> {
        let mut packed = compress(b"spike spike spike", &LzParser::default())?;
        assert_eq!(decompress(&packed)?, b"spike spike spike");

        packed.push(0);
        assert!(matches!(
            decompress(&packed),
            Err(KompressionError::SizeMismatch { .. })
        ));
        Ok(())
    }
}
