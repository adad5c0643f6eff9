//! Headerless LZ77 with trailing literals.
//!
//! Flag bytes are read from the least significant bit up; a set bit is a
//! match. Every match is three bytes: displacement, length, and the literal
//! byte that follows the copied data. The stream has no header, so decoding
//! runs until the input is exhausted.

use byteorder::ReadBytesExt;
use log::debug;
use std::io::Cursor;

use super::{limit_index, parse};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::Result;
use crate::format::remaining;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator};

const NAME: &str = "LZ77";

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(1, 0xFF, 1, 0xFF)]).with_skip_after_match(1)
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    // the trailing literal is priced on its own
    fn match_price(&self, _: usize, _: usize) -> u32 {
        17
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() + input.len() / 8 + 1);
    let mut flags = FlagWriter::lsb_byte();
    let mut cursor = 0;

    for m in &matches {
        for &byte in &input[cursor..m.position] {
            flags.push(&mut out, false);
            out.push(byte);
        }

        limit_index(NAME, &options, m)?;
        flags.push(&mut out, true);
        out.push(m.displacement as u8);
        out.push(m.length as u8);
        out.push(input[m.end()]);
        cursor = m.end() + 1;
    }
    for &byte in &input[cursor..] {
        flags.push(&mut out, false);
        out.push(byte);
    }

    debug!(
        "LZ77: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut flags = FlagReader::lsb_byte();

    loop {
        if flags.needs_word() && remaining(&rdr) == 0 {
            break;
        }
        let is_match = flags.next(&mut rdr)?;
        // unused flags of the last flag byte
        if remaining(&rdr) == 0 {
            break;
        }

        if is_match {
            let displacement = rdr.read_u8()? as usize;
            let length = rdr.read_u8()? as usize;
            copy_match(&mut out, displacement, length)?;
        }
        out.push(rdr.read_u8()?);
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};

    #[test]
    fn match_carries_next_literal() -> Result<()> {
        let input = b"abcabcX";
        let packed = compress(input, &FixedMatches(vec![Match::new(3, 3, 3)]))?;
        assert_eq!(packed, vec![0b0000_1000, b'a', b'b', b'c', 3, 3, b'X']);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn empty_stream_is_empty() -> Result<()> {
        assert!(compress(&[], &FixedMatches::default())?.is_empty());
        assert!(decompress(&[])?.is_empty());
        Ok(())
    }
}
