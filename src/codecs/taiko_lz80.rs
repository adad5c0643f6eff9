//! Taiko no Tatsujin `0x80` style LZ.
//!
//! A single `0x01` type byte, then opcodes until the end marker `00 00`. The
//! decompressed size is not stored.
//!
//! | Opcode                                 | Meaning |
//! | -------------------------------------- | ------- |
//! | `00nnnnnn`                             | `n` literals; `n = 0` reads a count byte `b`, `0x3F + b` literals, or the end if `b` is zero |
//! | `01LLdddd`                             | match of `L + 2`, displacement - 1 |
//! | `10LLLLdd dddddddd`                    | match of `L + 3`, displacement - 1 |
//! | `11LLLLLL [ext] dddddddd dddddddd`     | match of `L + 4`; `L = 0x3F` reads `ext`, length `0x43 + ext`; displacement - 1 as `u16` LE |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read};

use super::{limit_index, parse, run_opening_price};
use crate::errors::{KompressionError, Result};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x01;
const NAME: &str = "TaikoLZ80";
const SHORT_LITERALS: usize = 0x3F;
const MAX_LITERALS: usize = 0x3F + 0xFF;
const SHORT_FAR: usize = 0x42;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(2, 5, 1, 0x10),
        FindLimits::history(3, 0x12, 1, 0x400),
        FindLimits::history(4, 0x142, 1, 0x10000),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, literal_run: usize) -> u32 {
        run_opening_price(literal_run % SHORT_LITERALS, 8)
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        if length <= 5 && displacement <= 0x10 {
            8
        } else if length <= 0x12 && displacement <= 0x400 {
            16
        } else if length <= SHORT_FAR {
            24
        } else {
            32
        }
    }
}

fn write_literals(out: &mut Vec<u8>, run: &[u8]) {
    for chunk in run.chunks(MAX_LITERALS) {
        if chunk.len() <= SHORT_LITERALS {
            out.push(chunk.len() as u8);
        } else {
            out.push(0);
            out.push((chunk.len() - SHORT_LITERALS) as u8);
        }
        out.extend_from_slice(chunk);
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 3);
    out.push(KIND);

    for token in Tokens::new(input, &matches) {
        let m = match token {
            Token::Literals(run) => {
                write_literals(&mut out, run);
                continue;
            }
            Token::Match(m) => m,
        };

        let disp = m.displacement - 1;
        match limit_index(NAME, &options, &m)? {
            0 => out.push((0x40 | (m.length - 2) << 4 | disp) as u8),
            1 => {
                out.push((0x80 | (m.length - 3) << 2 | disp >> 8) as u8);
                out.push(disp as u8);
            }
            _ => {
                if m.length <= SHORT_FAR {
                    out.push((0xC0 | (m.length - 4)) as u8);
                } else {
                    out.push(0xFF);
                    out.push((m.length - 0x43) as u8);
                }
                out.write_u16::<LittleEndian>(disp as u16)?;
            }
        }
    }
    out.extend_from_slice(&[0, 0]);

    debug!(
        "TaikoLZ80: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    if rdr.read_u8()? != KIND {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let mut out = Vec::new();
    loop {
        let op = rdr.read_u8()? as usize;
        match op >> 6 {
            0 => {
                let count = match op {
                    0 => match rdr.read_u8()? {
                        0 => break,
                        b => SHORT_LITERALS + b as usize,
                    },
                    n => n,
                };
                let start = out.len();
                out.resize(start + count, 0);
                rdr.read_exact(&mut out[start..])?;
            }
            1 => copy_match(&mut out, (op & 0xF) + 1, ((op >> 4) & 3) + 2)?,
            2 => {
                let disp = (op & 3) << 8 | rdr.read_u8()? as usize;
                copy_match(&mut out, disp + 1, ((op >> 2) & 0xF) + 3)?;
            }
            _ => {
                let length = match op & 0x3F {
                    0x3F => rdr.read_u8()? as usize + 0x43,
                    n => n + 4,
                };
                let disp = rdr.read_u16::<LittleEndian>()? as usize;
                copy_match(&mut out, disp + 1, length)?;
            }
        }
    }

    Ok(out)
}
