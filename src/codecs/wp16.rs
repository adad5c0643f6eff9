//! `Wp16` data, an LZ over 16 bit units.
//!
//! `Wp16` magic, a `u32` LE decompressed size, then 32 bit LE flag words
//! (least significant bit first, set bit = literal) interleaved with their
//! tokens. A literal is one two byte unit, a match a `u16` LE holding the
//! displacement in units above length in units - 2:
//!
//! ```text
//! dddddddd dddLLLLL
//! ```
//!
//! An odd sized input is padded with a zero byte, which decoding drops again.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Read, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{BitOrder, FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::{expect_magic, ByteOrder};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 4] = b"Wp16";
const NAME: &str = "Wp16";
const UNIT: usize = 2;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(4, 0x42, 2, 0xFFE)]).with_unit_size(UNIT)
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

fn flag_writer() -> FlagWriter {
    FlagWriter::new(BitOrder::LsbFirst, 4, ByteOrder::LittleEndian)
}

fn flag_reader() -> FlagReader {
    FlagReader::new(BitOrder::LsbFirst, 4, ByteOrder::LittleEndian)
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let mut padded = input.to_vec();
    if padded.len() % UNIT != 0 {
        padded.push(0);
    }

    let options = parse_options();
    let matches = parse(&padded, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(padded.len() / 2 + 8);
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(size)?;

    let mut flags = flag_writer();
    for token in Tokens::new(&padded, &matches) {
        match token {
            Token::Literals(run) => {
                for unit in run.chunks(UNIT) {
                    flags.push(&mut out, true);
                    out.extend_from_slice(unit);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.push(&mut out, false);
                let encoded = (m.displacement / UNIT) << 5 | (m.length / UNIT - 2);
                out.write_u16::<LittleEndian>(encoded as u16)?;
            }
        }
    }

    debug!(
        "Wp16: {} bytes into {} with {} matches",
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
    let padded = size + size % UNIT;

    let mut out = output_buffer(padded, input);
    let mut flags = flag_reader();
    while out.len() < padded {
        if flags.next(&mut rdr)? {
            let mut unit = [0u8; UNIT];
            rdr.read_exact(&mut unit)?;
            out.extend_from_slice(&unit);
        } else {
            let encoded = rdr.read_u16::<LittleEndian>()? as usize;
            let displacement = (encoded >> 5) * UNIT;
            let length = ((encoded & 0x1F) + 2) * UNIT;
            copy_match(&mut out, displacement, length)?;
        }
    }

    let mut out = check_size(out, padded)?;
    out.truncate(size);
    Ok(out)
}
