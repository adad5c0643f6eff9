//! Namco Tales series compression, types `0x01` and `0x03`.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0        | compression type |
//! | 1..5     | `u32` LE length of the body |
//! | 5..9     | `u32` LE decompressed size |
//!
//! ## Body
//! Flag bytes, least significant bit first, set bit = literal. Matches address
//! a 0x1000 byte ring:
//!
//! ```text
//! ssssssss SSSSLLLL    slot low byte, slot high nibble, length - 3
//! ```
//!
//! Type `0x03` reserves `LLLL = 0xF` for runs of a single byte:
//!
//! ```text
//! vvvvvvvv LLLL1111             LLLL != 0: length - 3 copies of v
//! nnnnnnnn 00001111 vvvvvvvv    n + 0x13 copies of v
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::fmt;
use std::io::Cursor;

use super::{check_size, limit_index, output_buffer, parse, u32_size, Ring};
use crate::bits::{FlagReader, FlagWriter};
use crate::errors::{KompressionError, Result};
use crate::format::remaining;
use crate::matching::{FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

const NAME: &str = "TalesOf";
const HEADER_SIZE: usize = 9;
const RING_SIZE: usize = 0x1000;
const SHORT_RUN: usize = 0x12;

/// The two LZSS flavours sharing the Tales header
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TalesOfVariant {
    /// Plain ring buffer LZSS
    Type01,
    /// LZSS plus run-length tokens
    Type03,
}

impl TalesOfVariant {
    pub fn kind(self) -> u8 {
        match self {
            Self::Type01 => 0x01,
            Self::Type03 => 0x03,
        }
    }

    pub fn from_kind(kind: u8) -> Result<Self> {
        match kind {
            0x01 => Ok(Self::Type01),
            0x03 => Ok(Self::Type03),
            value => Err(KompressionError::UnsupportedVariant { codec: NAME, value }),
        }
    }

    fn ring_preset(self) -> usize {
        match self {
            Self::Type01 => 0xFEE,
            Self::Type03 => 0xFEF,
        }
    }

    pub fn parse_options(self) -> ParseOptions {
        let limits = match self {
            Self::Type01 => vec![FindLimits::history(3, 0x12, 1, RING_SIZE)],
            Self::Type03 => vec![
                FindLimits::history(3, 0x11, 1, RING_SIZE),
                FindLimits::run(4, 0x112),
            ],
        };
        ParseOptions::new(limits).with_pre_buffer(self.ring_preset())
    }
}

impl fmt::Display for TalesOfVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.kind())
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        if displacement == 0 && length > SHORT_RUN {
            25
        } else {
            17
        }
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser, variant: TalesOfVariant) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = variant.parse_options();
    let matches = parse(input, parser, &options, &Prices)?;
    let preset = variant.ring_preset();

    let mut out = Vec::with_capacity(HEADER_SIZE + input.len() / 2);
    out.write_u8(variant.kind())?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(size)?;

    let mut flags = FlagWriter::lsb_byte();
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

                if m.is_run() {
                    let value = input[m.position];
                    if m.length <= SHORT_RUN {
                        out.push(value);
                        out.push(((m.length - 3) << 4 | 0xF) as u8);
                    } else {
                        out.push((m.length - 0x13) as u8);
                        out.push(0x0F);
                        out.push(value);
                    }
                } else {
                    let slot = Ring::slot(RING_SIZE, preset, m.position, m.displacement);
                    out.push(slot as u8);
                    out.push(((slot >> 8) << 4 | (m.length - 3)) as u8);
                }
            }
        }
    }

    let body_len = u32_size(NAME, out.len() - HEADER_SIZE)?;
    (&mut out[1..5]).write_u32::<LittleEndian>(body_len)?;

    debug!(
        "TalesOf {}: {} bytes into {} with {} matches",
        variant,
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let variant = TalesOfVariant::from_kind(rdr.read_u8()?)?;
    let body_len = rdr.read_u32::<LittleEndian>()? as usize;
    let size = rdr.read_u32::<LittleEndian>()? as usize;

    if remaining(&rdr) < body_len {
        return Err(KompressionError::SizeMismatch {
            expected: body_len,
            found: remaining(&rdr),
        });
    }
    let mut rdr = Cursor::new(&input[HEADER_SIZE..HEADER_SIZE + body_len]);
    let mut ring = Ring::new(RING_SIZE, variant.ring_preset());
    let mut flags = FlagReader::lsb_byte();

    let mut out = output_buffer(size, input);
    while out.len() < size {
        if flags.next(&mut rdr)? {
            let byte = rdr.read_u8()?;
            ring.push(&mut out, byte);
            continue;
        }

        let b0 = rdr.read_u8()? as usize;
        let b1 = rdr.read_u8()? as usize;
        if variant == TalesOfVariant::Type03 && b1 & 0xF == 0xF {
            let (value, length) = match b1 >> 4 {
                0 => (rdr.read_u8()?, b0 + 0x13),
                n => (b0 as u8, n + 3),
            };
            for _ in 0..length {
                ring.push(&mut out, value);
            }
        } else {
            ring.copy(&mut out, (b1 >> 4) << 8 | b0, (b1 & 0xF) + 3);
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
    fn type01_ring_matches() -> Result<()> {
        let input = b"xyzxyzxyz";
        let packed = compress(
            input,
            &FixedMatches(vec![Match::new(3, 3, 6)]),
            TalesOfVariant::Type01,
        )?;

        assert_eq!(&packed[..9], &[0x01, 6, 0, 0, 0, 9, 0, 0, 0]);
        // slot 0xFEE
        assert_eq!(&packed[9..], &[0b0111, b'x', b'y', b'z', 0xEE, 0xF3]);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn type03_runs() -> Result<()> {
        let mut input = b"q".to_vec();
        input.extend_from_slice(&[7; 10]);
        input.extend_from_slice(&[9; 0x100]);
        let parser = FixedMatches(vec![Match::new(1, 0, 10), Match::new(11, 0, 0x100)]);
        let packed = compress(&input, &parser, TalesOfVariant::Type03)?;

        assert_eq!(
            &packed[9..],
            &[0b001, b'q', 7, 0x7F, 0xED, 0x0F, 9]
        );
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn both_variants_round_trip() -> Result<()> {
        let input: Vec<u8> = (0..3000u32).map(|i| ((i / 7) % 13) as u8).collect();
        for variant in [TalesOfVariant::Type01, TalesOfVariant::Type03] {
            let packed = compress(&input, &LzParser::default(), variant)?;
            assert!(packed.len() < input.len());
            assert_eq!(decompress(&packed)?, input);
        }
        Ok(())
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            decompress(&[0x02, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(KompressionError::UnsupportedVariant { value: 2, .. })
        ));
    }
}
