//! CRI Middleware `CRILAYLA` data.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..8     | magic `CRILAYLA` |
//! | 8..12    | `u32` LE size of the compressed part once decompressed |
//! | 12..16   | `u32` LE length of the compressed body |
//!
//! The body follows, then the first 0x100 bytes of the input stored raw.
//!
//! ## Body
//! The body is a bitstream read from its last byte to its first, most
//! significant bit first, and decodes the input (past its first 0x100 bytes)
//! from the end backward. A `0` bit is followed by an 8 bit literal. A `1` bit
//! is a match: 13 bits of displacement - 3, then the length - 3 in tiers of 2,
//! 3, 5 and 8 bits, each tier read only if the previous one was all ones, and
//! then further 8 bit values for as long as they are `0xFF`.

use bitstream_io::{BigEndian, BitReader, BitWriter};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{Cursor, Write};

use super::{limit_index, output_buffer, parse, u32_size};
use crate::bits::to_physical;
use crate::errors::{KompressionError, Result};
use crate::format::expect_magic;
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 8] = b"CRILAYLA";
const NAME: &str = "CRILAYLA";
const HEADER_SIZE: usize = 0x10;
pub const RAW_SIZE: usize = 0x100;
const LENGTH_TIERS: [u32; 4] = [2, 3, 5, 8];

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0xFFFF, 3, 0x2002)])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, _: usize, length: usize) -> u32 {
        let mut rest = length - 3;
        let mut bits = 1 + 13;
        for &tier in &LENGTH_TIERS {
            bits += tier;
            let max = (1 << tier) - 1;
            if rest < max {
                return bits;
            }
            rest -= max;
        }
        bits + 8 * (rest / 0xFF + 1) as u32
    }
}

fn write_length<W: std::io::Write>(wtr: &mut BitWriter<W, BigEndian>, length: usize) -> Result<()> {
    let mut rest = (length - 3) as u32;
    for &tier in &LENGTH_TIERS {
        let max = (1 << tier) - 1;
        if rest < max {
            return wtr.write(tier, rest).map_err(Into::into);
        }
        wtr.write(tier, max)?;
        rest -= max;
    }
    loop {
        if rest < 0xFF {
            return wtr.write(8, rest).map_err(Into::into);
        }
        wtr.write(8, 0xFF_u32)?;
        rest -= 0xFF;
    }
}

fn read_length<R: std::io::Read>(rdr: &mut BitReader<R, BigEndian>) -> Result<usize> {
    let mut length = 3;
    for &tier in &LENGTH_TIERS {
        let value = rdr.read::<u32>(tier)? as usize;
        length += value;
        if value != (1 << tier) - 1 {
            return Ok(length);
        }
    }
    loop {
        let value = rdr.read::<u32>(8)? as usize;
        length += value;
        if value != 0xFF {
            return Ok(length);
        }
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    if input.len() < RAW_SIZE {
        return Err(KompressionError::InputTooSmall {
            codec: NAME,
            size: input.len(),
            min: RAW_SIZE,
        });
    }
    let size = u32_size(NAME, input.len() - RAW_SIZE)?;

    let reversed: Vec<u8> = input[RAW_SIZE..].iter().rev().copied().collect();
    let options = parse_options();
    let matches = parse(&reversed, parser, &options, &Prices)?;

    let mut logical = Vec::with_capacity(reversed.len());
    {
        let mut wtr = BitWriter::endian(&mut logical, BigEndian);
        for token in Tokens::new(&reversed, &matches) {
            match token {
                Token::Literals(run) => {
                    for &byte in run {
                        wtr.write_bit(false)?;
                        wtr.write(8, byte)?;
                    }
                }
                Token::Match(m) => {
                    limit_index(NAME, &options, &m)?;
                    wtr.write_bit(true)?;
                    wtr.write(13, (m.displacement - 3) as u32)?;
                    write_length(&mut wtr, m.length)?;
                }
            }
        }
        wtr.byte_align()?;
    }

    let body = to_physical(&logical);
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + RAW_SIZE);
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(size)?;
    out.write_u32::<LittleEndian>(u32_size(NAME, body.len())?)?;
    out.extend_from_slice(&body);
    out.extend_from_slice(&input[..RAW_SIZE]);

    debug!(
        "CRILAYLA: {} bytes into a {} byte body with {} matches",
        input.len(),
        body.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = rdr.read_u32::<LittleEndian>()? as usize;
    let body_len = rdr.read_u32::<LittleEndian>()? as usize;

    let raw_at = HEADER_SIZE + body_len;
    if input.len() < raw_at + RAW_SIZE {
        return Err(KompressionError::UnexpectedEof);
    }

    let logical = to_physical(&input[HEADER_SIZE..raw_at]);
    let mut bits = BitReader::endian(Cursor::new(&logical[..]), BigEndian);
    let mut tail = output_buffer(size, input);
    while tail.len() < size {
        if bits.read_bit()? {
            let displacement = bits.read::<u32>(13)? as usize + 3;
            let length = read_length(&mut bits)?;
            copy_match(&mut tail, displacement, length)?;
        } else {
            tail.push(bits.read::<u8>(8)?);
        }
    }

    if tail.len() != size {
        return Err(KompressionError::SizeMismatch {
            expected: size,
            found: tail.len(),
        });
    }

    let mut out = Vec::with_capacity(RAW_SIZE + size);
    out.extend_from_slice(&input[raw_at..raw_at + RAW_SIZE]);
    out.extend(tail.iter().rev());
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::FixedMatches;
    use crate::parser::LzParser;

    #[test]
    fn header_fields_describe_body() -> Result<()> {
        let input: Vec<u8> = (0..0x400u32).map(|i| (i % 37) as u8).collect();
        let packed = compress(&input, &LzParser::default())?;

        let mut rdr = Cursor::new(&packed[8..16]);
        assert_eq!(rdr.read_u32::<LittleEndian>()? as usize, input.len() - 0x100);
        assert_eq!(
            rdr.read_u32::<LittleEndian>()? as usize,
            packed.len() - 0x10 - 0x100
        );
        assert_eq!(&packed[packed.len() - 0x100..], &input[..0x100]);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn long_lengths_cross_every_tier() -> Result<()> {
        let mut out = Vec::new();
        {
            let mut wtr = BitWriter::endian(&mut out, BigEndian);
            for &length in &[3, 5, 6, 12, 40, 0x120, 0x2000] {
                write_length(&mut wtr, length)?;
            }
            wtr.byte_align()?;
        }

        let mut rdr = BitReader::endian(Cursor::new(&out[..]), BigEndian);
        for &length in &[3, 5, 6, 12, 40, 0x120, 0x2000] {
            assert_eq!(read_length(&mut rdr)?, length);
        }
        assert_eq!(Prices.match_price(3, 3), 16);
        assert_eq!(Prices.match_price(3, 5), 16);
        assert_eq!(Prices.match_price(3, 6), 19);
        Ok(())
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(matches!(
            compress(&[0; 0xFF], &FixedMatches::default()),
            Err(KompressionError::InputTooSmall { min: 0x100, .. })
        ));
    }
}
