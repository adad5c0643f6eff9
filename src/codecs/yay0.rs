//! Nintendo 64 `Yay0` data.
//!
//! `Yay0` stores the tokens of Yaz0 in three separate tables:
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic `Yay0` |
//! | 4..8     | size of the decompressed data |
//! | 8..12    | offset of the link table |
//! | 12..16   | offset of the chunk table |
//!
//! The flag words follow the header as 32 bit words, most significant bit
//! first, set bit = literal. The link table holds the `u16` of every match, and
//! the chunk table holds literal bytes plus the extra length byte of long
//! matches, in token order.

use log::debug;
use std::io::{Cursor, Read, Write};

use super::{check_size, limit_index, output_buffer, parse, u32_size, yaz0};
use crate::bits::{BitOrder, BitReader, BitWriter};
use crate::errors::{KompressionError, Result};
use crate::format::{expect_magic, ByteOrder};
use crate::matching::{copy_match, MatchParser, ParseOptions, Token, Tokens};

pub const MAGIC: &[u8; 4] = b"Yay0";
const NAME: &str = "Yay0";
const HEADER_SIZE: usize = 16;

/// Same limits as Yaz0
pub fn parse_options() -> ParseOptions {
    yaz0::parse_options()
}

pub use super::yaz0::Prices;

pub fn compress(input: &[u8], parser: &dyn MatchParser, order: ByteOrder) -> Result<Vec<u8>> {
    let size = u32_size(NAME, input.len())?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut flags = BitWriter::new(BitOrder::MsbFirst, 4, order);
    let mut links = Vec::new();
    let mut chunks = Vec::new();

    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.write_bit(true);
                    chunks.push(byte);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.write_bit(false);

                let disp = (m.displacement - 1) as u16;
                if m.length < 0x12 {
                    order.write_u16(&mut links, ((m.length - 2) as u16) << 12 | disp)?;
                } else {
                    order.write_u16(&mut links, disp)?;
                    chunks.push((m.length - 0x12) as u8);
                }
            }
        }
    }

    let flags = flags.finish();
    let link_offset = HEADER_SIZE + flags.len();
    let chunk_offset = link_offset + links.len();

    let mut out = Vec::with_capacity(chunk_offset + chunks.len());
    out.write_all(MAGIC)?;
    order.write_u32(&mut out, size)?;
    order.write_u32(&mut out, u32_size(NAME, link_offset)?)?;
    order.write_u32(&mut out, u32_size(NAME, chunk_offset)?)?;
    out.extend_from_slice(&flags);
    out.extend_from_slice(&links);
    out.extend_from_slice(&chunks);

    debug!(
        "Yay0 ({}): {} flag bytes, {} link bytes, {} chunk bytes",
        order,
        flags.len(),
        links.len(),
        chunks.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    expect_magic(&mut rdr, MAGIC, NAME)?;
    let size = order.read_u32(&mut rdr)? as usize;
    let link_offset = order.read_u32(&mut rdr)? as usize;
    let chunk_offset = order.read_u32(&mut rdr)? as usize;

    if link_offset < HEADER_SIZE || chunk_offset < link_offset || chunk_offset > input.len() {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let mut flags = BitReader::new(&input[HEADER_SIZE..link_offset], BitOrder::MsbFirst, 4, order);
    let mut links = Cursor::new(&input[link_offset..chunk_offset]);
    let mut chunks = Cursor::new(&input[chunk_offset..]);
    let mut byte = [0u8; 1];

    let mut out = output_buffer(size, input);
    while out.len() < size {
        if flags.read_bit()? {
            chunks.read_exact(&mut byte)?;
            out.push(byte[0]);
            continue;
        }

        let link = order.read_u16(&mut links)? as usize;
        let displacement = (link & 0xFFF) + 1;
        let length = match link >> 12 {
            0 => {
                chunks.read_exact(&mut byte)?;
                byte[0] as usize + 0x12
            }
            n => n + 2,
        };
        copy_match(&mut out, displacement, length)?;
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::{FixedMatches, Match};

    #[test]
    fn tables_are_split() -> Result<()> {
        let mut input = b"abcd".to_vec();
        input.extend_from_slice(&[b'd'; 0x20]);
        let parser = FixedMatches(vec![Match::new(4, 1, 0x20)]);

        let packed = compress(&input, &parser, ByteOrder::BigEndian)?;
        assert_eq!(&packed[..4], b"Yay0");
        assert_eq!(&packed[8..16], &[0, 0, 0, 0x14, 0, 0, 0, 0x16]);
        // four literals then a match
        assert_eq!(&packed[16..20], &[0xF0, 0, 0, 0]);
        assert_eq!(&packed[20..22], &[0x00, 0x00]);
        assert_eq!(&packed[22..], b"abcd\x0E");

        assert_eq!(decompress(&packed, ByteOrder::BigEndian)?, input);
        Ok(())
    }

    #[test]
    fn bad_offsets_are_rejected() {
        let data = b"Yay0\x00\x00\x00\x01\x00\x00\x00\x30\x00\x00\x00\x10";
        assert!(decompress(data, ByteOrder::BigEndian).is_err());
    }
}
