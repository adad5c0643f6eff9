//! Nintendo 64 `MIO0` data.
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic `MIO0` |
//! | 4..8     | size of the decompressed data |
//! | 8..12    | offset of the compressed (match) table |
//! | 12..16   | offset of the uncompressed (literal) table |
//!
//! Flag words, 32 bits with the most significant bit first, follow the header;
//! a set bit is a literal. Matches are `u16`s with the length - 3 in the top
//! nibble and the displacement - 1 below it.

use log::debug;
use std::io::{Cursor, Read, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size};
use crate::bits::{BitOrder, BitReader, BitWriter};
use crate::errors::{KompressionError, Result};
use crate::format::{expect_magic, ByteOrder};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const MAGIC: &[u8; 4] = b"MIO0";
const NAME: &str = "MIO0";
const HEADER_SIZE: usize = 16;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x12, 1, 0x1000)])
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

pub fn compress(input: &[u8], parser: &dyn MatchParser, order: ByteOrder) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut flags = BitWriter::new(BitOrder::MsbFirst, 4, order);
    let mut compressed = Vec::with_capacity(matches.len() * 2);
    let mut uncompressed = Vec::new();

    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.write_bit(true);
                    uncompressed.push(byte);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.write_bit(false);
                let encoded = ((m.length - 3) << 12 | (m.displacement - 1)) as u16;
                order.write_u16(&mut compressed, encoded)?;
            }
        }
    }

    let flags = flags.finish();
    let comp_offset = HEADER_SIZE + flags.len();
    let uncomp_offset = comp_offset + compressed.len();

    let mut out = Vec::with_capacity(uncomp_offset + uncompressed.len());
    out.write_all(MAGIC)?;
    order.write_u32(&mut out, size)?;
    order.write_u32(&mut out, u32_size(NAME, comp_offset)?)?;
    order.write_u32(&mut out, u32_size(NAME, uncomp_offset)?)?;
    out.extend_from_slice(&flags);
    out.extend_from_slice(&compressed);
    out.extend_from_slice(&uncompressed);

    debug!(
        "MIO0 ({}): {} bytes into {} with {} matches",
        order,
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = order.read_u32(&mut rdr)? as usize;
    let comp_offset = order.read_u32(&mut rdr)? as usize;
    let uncomp_offset = order.read_u32(&mut rdr)? as usize;

    if comp_offset < HEADER_SIZE || uncomp_offset < comp_offset || uncomp_offset > input.len() {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let mut flags = BitReader::new(&input[HEADER_SIZE..comp_offset], BitOrder::MsbFirst, 4, order);
    let mut compressed = Cursor::new(&input[comp_offset..uncomp_offset]);
    let mut uncompressed = Cursor::new(&input[uncomp_offset..]);
    let mut byte = [0u8; 1];

    let mut out = output_buffer(size, input);
    while out.len() < size {
        if flags.read_bit()? {
            uncompressed.read_exact(&mut byte)?;
            out.push(byte[0]);
        } else {
            let encoded = order.read_u16(&mut compressed)? as usize;
            copy_match(&mut out, (encoded & 0xFFF) + 1, (encoded >> 12) + 3)?;
        }
    }

    check_size(out, size)
}
