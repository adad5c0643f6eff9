//! PlayStation `PsLz` data.
//!
//! A `u32` LE decompressed size, then tokens opened by a control byte
//! `MMnnnnnn`. A count `n` of zero is replaced by a `u16` LE directly after the
//! control byte, plus 0x40.
//!
//! | `MM` | Token |
//! | :--: | ----- |
//! | `00` | `n` literals |
//! | `01` | `n` copies of the following byte |
//! | `10` | `n` bytes from a `u8` displacement - 1 |
//! | `11` | `n` bytes from a `u16` LE displacement - 1 |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read};

use super::{check_size, limit_index, output_buffer, parse, run_opening_price, u32_size};
use crate::errors::Result;
use crate::matching::{
    copy_match, fill_run, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens,
};

const NAME: &str = "PsLZ";
const SHORT_COUNT: usize = 0x3F;
const LONG_BASE: usize = 0x40;
const MAX_COUNT: usize = 0xFFFF + LONG_BASE;

const LITERALS: u8 = 0b00;
const RUN: u8 = 0b01;
const NEAR: u8 = 0b10;
const FAR: u8 = 0b11;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(3, MAX_COUNT, 1, 0x100),
        FindLimits::history(3, MAX_COUNT, 1, 0x10000),
        FindLimits::run(3, MAX_COUNT),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, literal_run: usize) -> u32 {
        run_opening_price(literal_run, 8)
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        let count = if length > SHORT_COUNT { 24 } else { 8 };
        match displacement {
            0..=0x100 => count + 8,
            _ => count + 16,
        }
    }
}

fn write_control(out: &mut Vec<u8>, mode: u8, count: usize) -> Result<()> {
    if count <= SHORT_COUNT {
        out.push(mode << 6 | count as u8);
    } else {
        out.push(mode << 6);
        out.write_u16::<LittleEndian>((count - LONG_BASE) as u16)?;
    }
    Ok(())
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 4);
    out.write_u32::<LittleEndian>(size)?;

    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for chunk in run.chunks(MAX_COUNT) {
                    write_control(&mut out, LITERALS, chunk.len())?;
                    out.extend_from_slice(chunk);
                }
            }
            Token::Match(m) => match limit_index(NAME, &options, &m)? {
                0 => {
                    write_control(&mut out, NEAR, m.length)?;
                    out.push((m.displacement - 1) as u8);
                }
                1 => {
                    write_control(&mut out, FAR, m.length)?;
                    out.write_u16::<LittleEndian>((m.displacement - 1) as u16)?;
                }
                _ => {
                    write_control(&mut out, RUN, m.length)?;
                    out.push(input[m.position]);
                }
            },
        }
    }

    debug!(
        "PsLZ: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let size = rdr.read_u32::<LittleEndian>()? as usize;

    let mut out = output_buffer(size, input);
    while out.len() < size {
        let control = rdr.read_u8()?;
        let count = match (control & 0x3F) as usize {
            0 => rdr.read_u16::<LittleEndian>()? as usize + LONG_BASE,
            n => n,
        };

        match control >> 6 {
            LITERALS => {
                let start = out.len();
                out.resize(start + count, 0);
                rdr.read_exact(&mut out[start..])?;
            }
            RUN => {
                let value = rdr.read_u8()?;
                fill_run(&mut out, value, count);
            }
            NEAR => {
                let displacement = rdr.read_u8()? as usize + 1;
                copy_match(&mut out, displacement, count)?;
            }
            _ => {
                let displacement = rdr.read_u16::<LittleEndian>()? as usize + 1;
                copy_match(&mut out, displacement, count)?;
            }
        }
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};
    use crate::parser::LzParser;

    #[test]
    fn control_bytes() -> Result<()> {
        let mut input = b"ab".to_vec();
        input.extend_from_slice(&[b'z'; 0x50]);
        input.extend_from_slice(b"abab");
        let parser = FixedMatches(vec![Match::new(2, 0, 0x50), Match::new(0x52, 0x52, 4)]);
        let packed = compress(&input, &parser)?;

        assert_eq!(
            &packed[4..],
            &[0x02, b'a', b'b', 0x40, 0x10, 0x00, b'z', 0x84, 0x51]
        );
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn far_matches_use_a_u16() -> Result<()> {
        let mut input: Vec<u8> = (0..=255).collect();
        input.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        input.extend(0..=255u8);
        let packed = compress(&input, &LzParser::default())?;
        assert_eq!(decompress(&packed)?, input);

        let parser = FixedMatches(vec![Match::new(264, 264, 256)]);
        let packed = compress(&input, &parser)?;
        assert_eq!(&packed[packed.len() - 5..], &[0xC0, 0xC0, 0x00, 0x07, 0x01]);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }
}
