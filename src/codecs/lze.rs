//! `LZE` data, `Le` magic and a `u32` LE decompressed size.
//!
//! Flag bytes hold four two bit modes each, the first in the low bits, and
//! precede the tokens they describe:
//!
//! | Mode | Token |
//! | :--: | ----- |
//! | 0    | `u16` LE, length - 3 in the top nibble, displacement - 5 below |
//! | 1    | `u8`, length - 2 in the top six bits, displacement - 1 below |
//! | 2    | one literal |
//! | 3    | three literals |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::expect_magic;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 2] = b"Le";
const NAME: &str = "LZE";

const FAR_MATCH: u8 = 0;
const NEAR_MATCH: u8 = 1;
const ONE_LITERAL: u8 = 2;
const THREE_LITERALS: u8 = 3;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(2, 0x41, 1, 4),
        FindLimits::history(3, 0x12, 5, 0x1004),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, displacement: usize, _: usize) -> u32 {
        if displacement <= 4 {
            10
        } else {
            18
        }
    }
}

fn push_mode(flags: &mut FlagWriter, out: &mut Vec<u8>, mode: u8) {
    flags.push(out, mode & 1 != 0);
    flags.push(out, mode & 2 != 0);
}

fn next_mode<R: Read>(flags: &mut FlagReader, rdr: &mut R) -> Result<u8> {
    let low = flags.next(rdr)? as u8;
    let high = flags.next(rdr)? as u8;
    Ok(high << 1 | low)
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 6);
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(size)?;

    let mut flags = FlagWriter::lsb_byte();
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                let mut triples = run.chunks_exact(3);
                for triple in &mut triples {
                    push_mode(&mut flags, &mut out, THREE_LITERALS);
                    out.extend_from_slice(triple);
                }
                for &byte in triples.remainder() {
                    push_mode(&mut flags, &mut out, ONE_LITERAL);
                    out.push(byte);
                }
            }
            Token::Match(m) => {
                if limit_index(NAME, &options, &m)? == 0 {
                    push_mode(&mut flags, &mut out, NEAR_MATCH);
                    out.push(((m.length - 2) << 2 | (m.displacement - 1)) as u8);
                } else {
                    push_mode(&mut flags, &mut out, FAR_MATCH);
                    let encoded = ((m.length - 3) << 12 | (m.displacement - 5)) as u16;
                    out.write_u16::<LittleEndian>(encoded)?;
                }
            }
        }
    }

    debug!(
        "LZE: {} bytes into {} with {} matches",
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

    let mut out = output_buffer(size, input);
    let mut flags = FlagReader::lsb_byte();
    while out.len() < size {
        match next_mode(&mut flags, &mut rdr)? {
            FAR_MATCH => {
                let encoded = rdr.read_u16::<LittleEndian>()? as usize;
                copy_match(&mut out, (encoded & 0xFFF) + 5, (encoded >> 12) + 3)?;
            }
            NEAR_MATCH => {
                let encoded = rdr.read_u8()? as usize;
                copy_match(&mut out, (encoded & 3) + 1, (encoded >> 2) + 2)?;
            }
            ONE_LITERAL => out.push(rdr.read_u8()?),
            _ => {
                let mut triple = [0u8; 3];
                rdr.read_exact(&mut triple)?;
                out.extend_from_slice(&triple);
            }
        }
    }

    check_size(out, size)
}
