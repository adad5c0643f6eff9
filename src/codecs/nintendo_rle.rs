//! GBA/DS BIOS `RLUnComp` data, compression type `0x30`.
//!
//! After the [Nintendo header](crate::format::NintendoHeader) every block
//! starts with a flag byte:
//!
//! ```text
//! 1nnnnnnn vvvvvvvv    n + 3 copies of v
//! 0nnnnnnn             n + 1 raw bytes follow
//! ```

use byteorder::ReadBytesExt;
use log::debug;
use std::io::{Cursor, Read};

use super::{check_size, limit_index, output_buffer, parse, run_opening_price};
use crate::errors::Result;
use crate::format::NintendoHeader;
use crate::matching::{fill_run, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x30;
const NAME: &str = "NintendoRLE";

const MAX_RAW: usize = 0x80;
const MIN_RUN: usize = 3;
const MAX_RUN: usize = 0x82;

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::run(MIN_RUN, MAX_RUN)])
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, literal_run: usize) -> u32 {
        run_opening_price(literal_run % MAX_RAW, 0)
    }

    fn match_price(&self, _: usize, _: usize) -> u32 {
        16
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser) -> Result<Vec<u8>> {
    let header = NintendoHeader::new(KIND, input.len(), NAME)?;
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut out = Vec::with_capacity(input.len() + input.len() / MAX_RAW + 5);
    header.write(&mut out)?;

    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => {
                for chunk in run.chunks(MAX_RAW) {
                    out.push((chunk.len() - 1) as u8);
                    out.extend_from_slice(chunk);
                }
            }
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                out.push(0x80 | (m.length - MIN_RUN) as u8);
                out.push(input[m.position]);
            }
        }
    }

    debug!(
        "NintendoRLE: {} bytes into {} with {} runs",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let size = NintendoHeader::read(&mut rdr, KIND, NAME)?.size as usize;

    let mut out = output_buffer(size, input);
    while out.len() < size {
        let flag = rdr.read_u8()? as usize;
        if flag & 0x80 != 0 {
            let value = rdr.read_u8()?;
            fill_run(&mut out, value, (flag & 0x7F) + MIN_RUN);
        } else {
            let start = out.len();
            out.resize(start + flag + 1, 0);
            rdr.read_exact(&mut out[start..])?;
        }
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::KompressionError;
    use crate::matching::{FixedMatches, Match};
    use crate::parser::LzParser;

    #[test]
    fn runs_and_raw_blocks() -> Result<()> {
        let mut input = b"xy".to_vec();
        input.extend_from_slice(&[5; 0x82]);
        input.push(b'z');
        let parser = FixedMatches(vec![Match::new(2, 0, 0x82)]);
        let packed = compress(&input, &parser)?;

        assert_eq!(&packed[..4], &[0x30, 0x85, 0x00, 0x00]);
        assert_eq!(&packed[4..], &[0x01, b'x', b'y', 0xFF, 5, 0x00, b'z']);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn long_raw_runs_split_at_0x80() -> Result<()> {
        let input: Vec<u8> = (0..0x90u8).collect();
        let packed = compress(&input, &LzParser::default())?;
        assert_eq!(packed[4], 0x7F);
        assert_eq!(packed[4 + 1 + 0x80], 0x0F);
        assert_eq!(packed.len(), 4 + 2 + 0x90);
        assert_eq!(decompress(&packed)?, input);
        Ok(())
    }

    #[test]
    fn rejects_short_runs_and_history_matches() {
        let input = [1u8; 8];
        assert!(matches!(
            compress(&input, &FixedMatches(vec![Match::new(1, 1, 4)])),
            Err(KompressionError::UnencodableMatch { .. }) | Err(KompressionError::InvalidMatches(_))
        ));
        assert!(decompress(&[0x30, 4, 0, 0, 0x81]).is_err());
    }
}
