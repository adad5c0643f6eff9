//! Shade `LZ` data.
//!
//! A `u32` LE decompressed size and a `u32` LE length of the whole file, then
//! 16 bit LE flag words (least significant bit first, set bit = match)
//! interleaved with their tokens. Literals are single bytes; matches are:
//!
//! ```text
//! 0LLddddd                     length - 2, displacement - 1
//! 10LLLLLL dddddddd            length - 3, displacement - 1
//! 11LLLLLL dddddddd dddddddd   length - 3, displacement - 1 as u16 LE
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::Cursor;

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{BitOrder, FlagReader, FlagWriter};
use crate::errors::{KompressionError, Result};
use crate::format::ByteOrder;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

const NAME: &str = "ShadeLZ";

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![
        FindLimits::history(2, 5, 1, 0x20),
        FindLimits::history(3, 0x42, 1, 0x100),
        FindLimits::history(3, 0x42, 1, 0x10000),
    ])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        if length <= 5 && displacement <= 0x20 {
            9
        } else if displacement <= 0x100 {
            17
        } else {
            25
        }
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() / 2 + 8);
    out.write_u32::<LittleEndian>(size)?;
    out.write_u32::<LittleEndian>(0)?;

    let mut flags = FlagWriter::new(BitOrder::LsbFirst, 2, ByteOrder::LittleEndian);
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.push(&mut out, false);
                    out.push(byte);
                }
            }
            Token::Match(m) => {
                let index = limit_index(NAME, &options, &m)?;
                flags.push(&mut out, true);

                let disp = m.displacement - 1;
                match index {
                    0 => out.push(((m.length - 2) << 5 | disp) as u8),
                    1 => {
                        out.push((0x80 | (m.length - 3)) as u8);
                        out.push(disp as u8);
                    }
                    _ => {
                        out.push((0xC0 | (m.length - 3)) as u8);
                        out.write_u16::<LittleEndian>(disp as u16)?;
                    }
                }
            }
        }
    }

    let file_len = u32_size(NAME, out.len())?;
    (&mut out[4..8]).write_u32::<LittleEndian>(file_len)?;

    debug!(
        "ShadeLZ: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let size = rdr.read_u32::<LittleEndian>()? as usize;
    let file_len = rdr.read_u32::<LittleEndian>()? as usize;
    if file_len != input.len() {
        return Err(KompressionError::SizeMismatch {
            expected: file_len,
            found: input.len(),
        });
    }

    let mut out = output_buffer(size, input);
    let mut flags = FlagReader::new(BitOrder::LsbFirst, 2, ByteOrder::LittleEndian);
    while out.len() < size {
        if !flags.next(&mut rdr)? {
            out.push(rdr.read_u8()?);
            continue;
        }

        let op = rdr.read_u8()? as usize;
        let (displacement, length) = match op >> 6 {
            0 | 1 => ((op & 0x1F) + 1, (op >> 5) + 2),
            2 => (rdr.read_u8()? as usize + 1, (op & 0x3F) + 3),
            _ => (
                rdr.read_u16::<LittleEndian>()? as usize + 1,
                (op & 0x3F) + 3,
            ),
        };
        copy_match(&mut out, displacement, length)?;
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};
    use crate::parser::LzParser;

    #[test]
    fn three_match_sizes() -> Result<()> {
        let mut input = b"abcabc".to_vec();
        input.extend_from_slice(&[b'c'; 0x40]);
        let far_at = input.len();
        input.extend_from_slice(&[0x11; 0x100]);
        input.extend_from_slice(b"abcabc");

        let parser = FixedMatches(vec![
            Match::new(3, 3, 3),
            Match::new(6, 1, 0x40),
            Match::new(far_at + 0x100, far_at + 0x100, 6),
        ]);
        let packed = compress(&input, &parser)?;
        assert_eq!(&packed[4..8], &(packed.len() as u32).to_le_bytes());

        // three literals then two matches
        assert_eq!(&packed[8..10], &[0b0001_1000, 0]);
        assert_eq!(&packed[10..14], b"abc\x22");
        assert_eq!(&packed[14..16], &[0xBD, 0x00]);
        assert_eq!(&packed[packed.len() - 3..], &[0xC3, 0x45, 0x01]);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn round_trip_and_length_check() -> Result<()> {
        let input: Vec<u8> = (0..2000u32).map(|i| (i * i % 251) as u8).collect();
        let mut packed = compress(&input, &LzParser::default())?;
        assert_eq!(decompress(&packed)?, input);

        packed.truncate(packed.len() - 1);
        assert!(decompress(&packed).is_err());
        Ok(())
    }
}
