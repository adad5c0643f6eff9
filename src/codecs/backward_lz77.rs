//! 3DS "BLZ" backward LZ77, as used for code binaries decompressed in place.
//!
//! The file is read from its end. The last eight bytes are a footer:
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | -8..-5   | `u32` LE: footer length `<< 24` \| compressed region length |
//! | -4..-1   | `u32` LE: decompressed size - file size |
//!
//! The compressed region is the footer, any `0xFF` padding before it, and the
//! token stream. Everything in front of the region is stored raw. The token
//! stream is read backward from just before the padding, and writes the output
//! backward from its end: a flag byte (most significant bit first, set bit =
//! match) then eight tokens, where a match is a big endian `u16` with length - 3
//! in the top nibble and displacement - 3 below it.
//!
//! The encoder works on the reversed input, so a logical stream written
//! forward turns into the physical layout once reversed.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, trace};

use super::{limit_index, output_buffer, parse, u32_size};
use crate::bits::{to_physical, FlagReader, FlagWriter, ReverseReader};
use crate::errors::{KompressionError, Result};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

const NAME: &str = "BackwardLZ77";
const FOOTER_SIZE: usize = 8;
const MAX_REGION: usize = 0xFF_FFFF;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 0x12, 3, 0x1002)])
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

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    u32_size(NAME, input.len())?;
    let reversed: Vec<u8> = input.iter().rev().copied().collect();
    let options = parse_options();
    let matches = parse(&reversed, parser, &options, &Prices)?;

    let mut logical = Vec::with_capacity(input.len());
    let mut flags = FlagWriter::msb_byte();
    // (stream bytes, input bytes covered) after each token; the best cut keeps
    // the most bytes out of the stream
    let mut best = (0, 0);
    let mut covered = 0;

    for token in Tokens::new(&reversed, &matches) {
        match token {
            Token::Literals(run) => {
                for &byte in run {
                    flags.push(&mut logical, false);
                    logical.push(byte);
                    covered += 1;
                    best = better_cut(best, (logical.len(), covered));
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                flags.push(&mut logical, true);
                let encoded = ((m.length - 3) << 12 | (m.displacement - 3)) as u16;
                logical.write_u16::<BigEndian>(encoded)?;
                covered += m.length;
                best = better_cut(best, (logical.len(), covered));
            }
        }
    }

    let (stream_len, covered) = best;
    logical.truncate(stream_len);
    let raw_len = input.len() - covered;
    let padding = (4 - (raw_len + stream_len) % 4) % 4;
    let footer_len = FOOTER_SIZE + padding;
    let region = stream_len + footer_len;
    if region > MAX_REGION {
        return Err(KompressionError::InputTooLarge {
            codec: NAME,
            size: input.len(),
            max: MAX_REGION,
        });
    }

    let mut out = Vec::with_capacity(raw_len + region);
    out.extend_from_slice(&input[..raw_len]);
    out.extend_from_slice(&to_physical(&logical));
    out.resize(out.len() + padding, 0xFF);

    let file_len = out.len() + FOOTER_SIZE;
    out.write_u32::<LittleEndian>((footer_len << 24 | region) as u32)?;
    out.write_u32::<LittleEndian>((input.len() as u32).wrapping_sub(file_len as u32))?;

    debug!(
        "BackwardLZ77: {} raw bytes, {} byte stream covering {} bytes",
        raw_len, stream_len, covered
    );
    Ok(out)
}

fn better_cut(best: (usize, usize), candidate: (usize, usize)) -> (usize, usize) {
    let saved = |(stream, covered): (usize, usize)| covered as isize - stream as isize;
    if saved(candidate) > saved(best) {
        candidate
    } else {
        best
    }
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let footer_at = input
        .len()
        .checked_sub(FOOTER_SIZE)
        .ok_or(KompressionError::InvalidHeader(NAME))?;
    let mut footer = &input[footer_at..];
    let bounds = footer.read_u32::<LittleEndian>()? as usize;
    let extra = footer.read_u32::<LittleEndian>()?;

    let footer_len = bounds >> 24;
    let region = bounds & MAX_REGION;
    if footer_len < FOOTER_SIZE || region < footer_len || region > input.len() {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let size = (input.len() as u32).wrapping_add(extra) as usize;
    let raw_len = input.len() - region;
    let stream = &input[raw_len..input.len() - footer_len];
    trace!(
        "BackwardLZ77: {} raw bytes, {} byte stream, {} bytes out",
        raw_len,
        stream.len(),
        size
    );

    let mut rdr = ReverseReader::new(stream);
    let mut flags = FlagReader::msb_byte();
    let mut tail = output_buffer(size.saturating_sub(raw_len), input);
    while rdr.remaining() > 0 {
        let is_match = flags.next(&mut rdr)?;
        if rdr.remaining() == 0 {
            break;
        }

        if is_match {
            let encoded = rdr.read_u16::<BigEndian>()? as usize;
            copy_match(&mut tail, (encoded & 0xFFF) + 3, (encoded >> 12) + 3)?;
        } else {
            tail.push(rdr.read_u8()?);
        }
    }

    let found = raw_len + tail.len();
    if found != size {
        return Err(KompressionError::SizeMismatch {
            expected: size,
            found,
        });
    }

    let mut out = output_buffer(size, input);
    out.extend_from_slice(&input[..raw_len]);
    out.extend(tail.iter().rev());
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::FixedMatches;
    use crate::parser::LzParser;

    #[test]
    fn incompressible_input_is_stored_raw() -> Result<()> {
        let input = b"abcdefg";
        let packed = compress(input, &FixedMatches::default())?;

        // raw input, one padding byte, then the footer
        assert_eq!(&packed[..7], input);
        assert_eq!(packed[7], 0xFF);
        assert_eq!(&packed[8..12], &[0x09, 0x00, 0x00, 0x09]);
        assert_eq!(&packed[12..], &(7u32.wrapping_sub(16)).to_le_bytes());
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn repetitive_tail_is_compressed() -> Result<()> {
        let mut input = b"header!".to_vec();
        input.extend((0..200).map(|i| (i % 10) as u8));
        let packed = compress(&input, &LzParser::default())?;

        assert!(packed.len() < input.len());
        assert_eq!(packed.len() % 4, 0);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn footer_must_fit_the_file() {
        let data = [0u8, 0, 0, 0, 0x20, 0, 0, 0x08, 0, 0, 0, 0];
        assert!(matches!(
            decompress(&data),
            Err(KompressionError::InvalidHeader(_))
        ));
        assert!(decompress(&[1, 2, 3]).is_err());
    }
}
