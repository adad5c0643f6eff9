//! `LzEnc`, an LZO flavoured format.
//!
//! A `u32` LE decompressed size, then opcodes:
//!
//! | Opcode                          | Meaning |
//! | ------------------------------- | ------- |
//! | `00LLLLLL`                      | `L` literals follow; `L = 0` reads an extension, count = 63 + ext |
//! | `01LLLLLL [ext] dddddddd ddddddss` | match of `L + 3`; `L = 63` reads an extension, length = 65 + ext; the `u16` LE holds displacement - 1 above `ss` |
//! | `1LLLdddd ddddddss`             | match of `L + 3` with a 10 bit displacement - 1 |
//!
//! An extension is a run of zero bytes, each worth 255, closed by a non-zero
//! byte holding the remainder. `ss` counts the literals (at most 3) stored
//! directly after a match without an opcode of their own.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read};

use super::{check_size, limit_index, output_buffer, parse, run_opening_price, u32_size};
use crate::errors::Result;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

const NAME: &str = "LzEnc";
const SHORT_RUN: usize = 63;
const LONG_MATCH: usize = 65;
const MAX_TRAILING: usize = 3;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(3, 10, 1, 0x400),
        FindLimits::history(3, 0x1000, 1, 0x4000),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, literal_run: usize) -> u32 {
        run_opening_price(literal_run, 8)
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        if length <= 10 && displacement <= 0x400 {
            16
        } else if length <= LONG_MATCH {
            24
        } else {
            24 + 8 * ((length - LONG_MATCH - 1) / 0xFF + 1) as u32
        }
    }
}

fn write_extension(out: &mut Vec<u8>, mut value: usize) {
    while value > 0xFF {
        out.push(0);
        value -= 0xFF;
    }
    out.push(value as u8);
}

fn read_extension<R: Read>(rdr: &mut R) -> Result<usize> {
    let mut value = 0;
    loop {
        match rdr.read_u8()? {
            0 => value += 0xFF,
            n => return Ok(value + n as usize),
        }
    }
}

fn write_literals(out: &mut Vec<u8>, run: &[u8]) {
    if run.len() <= SHORT_RUN {
        out.push(run.len() as u8);
    } else {
        out.push(0);
        write_extension(out, run.len() - SHORT_RUN);
    }
    out.extend_from_slice(run);
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 4);
    out.write_u32::<LittleEndian>(size)?;

    let mut tokens = Tokens::new(input, &matches).peekable();
    while let Some(token) = tokens.next() {
        let m = match token {
            Token::Literals(run) => {
                write_literals(&mut out, run);
                continue;
            }
            Token::Match(m) => m,
        };

        let trailing: &[u8] = match tokens.peek() {
            Some(Token::Literals(run)) if run.len() <= MAX_TRAILING => *run,
            _ => &[],
        };
        let state = trailing.len();
        let disp = m.displacement - 1;

        if limit_index(NAME, &options, &m)? == 0 {
            out.push((0x80 | (m.length - 3) << 4 | disp >> 6) as u8);
            out.push(((disp & 0x3F) << 2 | state) as u8);
        } else {
            if m.length <= LONG_MATCH {
                out.push((0x40 | (m.length - 3)) as u8);
            } else {
                out.push(0x7F);
                write_extension(&mut out, m.length - LONG_MATCH);
            }
            out.write_u16::<LittleEndian>((disp << 2 | state) as u16)?;
        }

        if state > 0 {
            out.extend_from_slice(trailing);
            tokens.next();
        }
    }

    debug!(
        "LzEnc: {} bytes into {} with {} matches",
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
        let op = rdr.read_u8()? as usize;
        let (displacement, length, state) = match op >> 6 {
            0 => {
                let count = match op {
                    0 => SHORT_RUN + read_extension(&mut rdr)?,
                    n => n,
                };
                let start = out.len();
                out.resize(start + count, 0);
                rdr.read_exact(&mut out[start..])?;
                continue;
            }
            1 => {
                let length = match op & 0x3F {
                    0x3F => LONG_MATCH + read_extension(&mut rdr)?,
                    n => n + 3,
                };
                let word = rdr.read_u16::<LittleEndian>()? as usize;
                ((word >> 2) + 1, length, word & 3)
            }
            _ => {
                let low = rdr.read_u8()? as usize;
                let displacement = ((op & 0xF) << 6 | low >> 2) + 1;
                (displacement, ((op >> 4) & 7) + 3, low & 3)
            }
        };

        copy_match(&mut out, displacement, length)?;
        for _ in 0..state {
            out.push(rdr.read_u8()?);
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
    fn trailing_literals_ride_on_the_match() -> Result<()> {
        let input = b"abcabcXY";
        let packed = compress(input, &FixedMatches(vec![Match::new(3, 3, 3)]))?;

        assert_eq!(
            packed,
            vec![8, 0, 0, 0, 0x03, b'a', b'b', b'c', 0x80, 0x0A, b'X', b'Y']
        );
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn long_forms_use_extensions() -> Result<()> {
        let mut input: Vec<u8> = (0..100u8).collect();
        input.extend_from_slice(&[0x55; 400]);
        input.extend_from_slice(&[1, 2, 3, 4]);
        // a 399 byte match needs a long opcode and its four literals an opcode
        let parser = FixedMatches(vec![Match::new(101, 1, 399)]);
        let packed = compress(&input, &parser)?;

        // 101 literals: 63 + 38
        assert_eq!(&packed[4..6], &[0x00, 38]);
        assert_eq!(&packed[107..112], &[0x7F, 0x00, 79, 0x00, 0x00]);
        assert_eq!(&packed[112..], &[0x04, 1, 2, 3, 4]);
        assert_eq!(decompress(&packed)?, input);

        let optimal = compress(&input, &LzParser::default())?;
        assert_eq!(decompress(&optimal)?, input);
        Ok(())
    }

    #[test]
    fn extensions_carry_multiples_of_255() -> Result<()> {
        let mut out = Vec::new();
        write_extension(&mut out, 255);
        write_extension(&mut out, 256);
        assert_eq!(out, vec![0xFF, 0x00, 0x01]);

        let mut rdr = Cursor::new(&out[..]);
        assert_eq!(read_extension(&mut rdr)?, 255);
        assert_eq!(read_extension(&mut rdr)?, 256);
        Ok(())
    }
}
