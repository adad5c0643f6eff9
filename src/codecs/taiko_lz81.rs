//! Taiko no Tatsujin `0x81` style LZ with Huffman coded tokens.
//!
//! A single `0x02` type byte, then one big endian bitstream holding three
//! [linear Huffman trees](crate::format#linear-huffman-trees): literals with 8
//! bit leaves, then length symbols and displacement symbols with 5 bit leaves.
//! Tokens follow:
//!
//! * `0`, a literal code
//! * `1`, a length code, its extra bits, a displacement code, its extra bits
//!
//! Length and displacement symbols use the deflate bases. Length symbol `0`
//! ends the stream.

use bitstream_io::{BigEndian, BitReader, BitWriter};
use log::{debug, trace};
use std::io::{Cursor, Read, Write};

use super::{limit_index, parse};
use crate::errors::{KompressionError, Result};
use crate::format::LinearTree;
use crate::huffman::{HuffCode, HuffmanTreeBuilder};
use crate::matching::{copy_match, FindLimits, MatchParser, ParseOptions, PriceCalculator, Token, Tokens};

pub const KIND: u8 = 0x02;
const NAME: &str = "TaikoLZ81";

const LITERAL_BITS: u32 = 8;
const SYMBOL_BITS: u32 = 5;
const END_OF_STREAM: u16 = 0;

/// (base length, extra bits) by length symbol; symbol 0 ends the stream
const LENGTH_TABLE: [(u16, u8); 30] = [
    (0, 0),
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 1),
    (13, 1),
    (15, 1),
    (17, 1),
    (19, 2),
    (23, 2),
    (27, 2),
    (31, 2),
    (35, 3),
    (43, 3),
    (51, 3),
    (59, 3),
    (67, 4),
    (83, 4),
    (99, 4),
    (115, 4),
    (131, 5),
    (163, 5),
    (195, 5),
    (227, 5),
    (258, 0),
];

/// (base displacement, extra bits) by displacement symbol
const DISTANCE_TABLE: [(u16, u8); 30] = [
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 0),
    (5, 1),
    (7, 1),
    (9, 2),
    (13, 2),
    (17, 3),
    (25, 3),
    (33, 4),
    (49, 4),
    (65, 5),
    (97, 5),
    (129, 6),
    (193, 6),
    (257, 7),
    (385, 7),
    (513, 8),
    (769, 8),
    (1025, 9),
    (1537, 9),
    (2049, 10),
    (3073, 10),
    (4097, 11),
    (6145, 11),
    (8193, 12),
    (12289, 12),
    (16385, 13),
    (24577, 13),
];

pub fn parse_options() -> ParseOptions {
    ParseOptions::new(vec![FindLimits::history(3, 258, 1, 32768)])
}

/// Symbol whose base is the largest one not above `value`
fn symbol_for(table: &[(u16, u8)], first: usize, value: usize) -> usize {
    (first..table.len())
        .rev()
        .find(|&s| (table[s].0 as usize) <= value)
        .unwrap_or(first)
}

/// Rough code lengths, before the trees are known
#[derive(Debug, Copy, Clone, Default)]
pub struct Prices;

impl PriceCalculator for Prices {
    fn literal_price(&self, _: u8, _: usize) -> u32 {
        9
    }

    fn match_price(&self, displacement: usize, length: usize) -> u32 {
        let len_extra = LENGTH_TABLE[symbol_for(&LENGTH_TABLE, 1, length)].1 as u32;
        let disp_extra = DISTANCE_TABLE[symbol_for(&DISTANCE_TABLE, 0, displacement)].1 as u32;
        1 + 5 + len_extra + 5 + disp_extra
    }
}

fn write_code<W: Write>(
    wtr: &mut BitWriter<W, BigEndian>,
    codes: &[Option<HuffCode>],
    symbol: usize,
) -> Result<()> {
    let code = codes[symbol].ok_or(KompressionError::MissingCode(symbol as u16))?;
    if !code.is_empty() {
        wtr.write(code.bitlen(), code.code)?;
    }
    Ok(())
}

fn write_extra<W: Write>(wtr: &mut BitWriter<W, BigEndian>, bits: u8, value: usize) -> Result<()> {
    if bits > 0 {
        wtr.write(bits as u32, value as u32)?;
    }
    Ok(())
}

fn read_extra<R: Read>(rdr: &mut BitReader<R, BigEndian>, bits: u8) -> Result<usize> {
    if bits == 0 {
        return Ok(0);
    }
    Ok(rdr.read::<u32>(bits as u32)? as usize)
}

struct Alphabet {
    tree: LinearTree,
    codes: Vec<Option<HuffCode>>,
}

impl Alphabet {
    fn new(builder: &dyn HuffmanTreeBuilder, frequencies: &[u64]) -> Result<Self> {
        let alphabet = frequencies.len();
        match builder.build(frequencies) {
            Some(root) => Ok(Self {
                tree: LinearTree::from(&root),
                codes: root.code_table(alphabet)?,
            }),
            None => Ok(Self {
                tree: LinearTree::empty(),
                codes: vec![None; alphabet],
            }),
        }
    }
}

pub fn compress(input: &[u8], parser: &dyn MatchParser, builder: &dyn HuffmanTreeBuilder) -> Result<Vec<u8>> {
    let options = parse_options();
    let matches = parse(input, parser, &options, &Prices)?;

    let mut literal_freq = [0u64; 256];
    let mut length_freq = [0u64; LENGTH_TABLE.len()];
    let mut disp_freq = [0u64; DISTANCE_TABLE.len()];
    length_freq[END_OF_STREAM as usize] = 1;
    for token in Tokens::new(input, &matches) {
        match token {
            Token::Literals(run) => run.iter().for_each(|&b| literal_freq[b as usize] += 1),
            Token::Match(m) => {
                limit_index(NAME, &options, &m)?;
                length_freq[symbol_for(&LENGTH_TABLE, 1, m.length)] += 1;
                disp_freq[symbol_for(&DISTANCE_TABLE, 0, m.displacement)] += 1;
            }
        }
    }

    let literals = Alphabet::new(builder, &literal_freq)?;
    let lengths = Alphabet::new(builder, &length_freq)?;
    let displacements = Alphabet::new(builder, &disp_freq)?;
    trace!(
        "TaikoLZ81 trees: literals {}, lengths {}, displacements {}",
        literals.tree,
        lengths.tree,
        displacements.tree
    );

    let mut out = vec![KIND];
    {
        let mut wtr = BitWriter::endian(&mut out, BigEndian);
        literals.tree.write(&mut wtr, LITERAL_BITS)?;
        lengths.tree.write(&mut wtr, SYMBOL_BITS)?;
        displacements.tree.write(&mut wtr, SYMBOL_BITS)?;

        for token in Tokens::new(input, &matches) {
            match token {
                Token::Literals(run) => {
                    for &byte in run {
                        wtr.write_bit(false)?;
                        write_code(&mut wtr, &literals.codes, byte as usize)?;
                    }
                }
                Token::Match(m) => {
                    wtr.write_bit(true)?;
                    let ls = symbol_for(&LENGTH_TABLE, 1, m.length);
                    write_code(&mut wtr, &lengths.codes, ls)?;
                    let (base, bits) = LENGTH_TABLE[ls];
                    write_extra(&mut wtr, bits, m.length - base as usize)?;

                    let ds = symbol_for(&DISTANCE_TABLE, 0, m.displacement);
                    write_code(&mut wtr, &displacements.codes, ds)?;
                    let (base, bits) = DISTANCE_TABLE[ds];
                    write_extra(&mut wtr, bits, m.displacement - base as usize)?;
                }
            }
        }

        wtr.write_bit(true)?;
        write_code(&mut wtr, &lengths.codes, END_OF_STREAM as usize)?;
        wtr.byte_align()?;
    }

    debug!(
        "TaikoLZ81: {} bytes into {} with {} matches",
        input.len(),
        out.len(),
        matches.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let mut kind = [0u8; 1];
    rdr.read_exact(&mut kind)?;
    if kind[0] != KIND {
        return Err(KompressionError::InvalidHeader(NAME));
    }

    let mut bits = BitReader::endian(rdr, BigEndian);
    let literals = LinearTree::from_bitreader(&mut bits, LITERAL_BITS)?;
    let lengths = LinearTree::from_bitreader(&mut bits, SYMBOL_BITS)?;
    let displacements = LinearTree::from_bitreader(&mut bits, SYMBOL_BITS)?;

    let mut out = Vec::new();
    loop {
        if !bits.read_bit()? {
            out.push(literals.read_symbol(&mut bits)? as u8);
            continue;
        }

        let ls = lengths.read_symbol(&mut bits)?;
        if ls == END_OF_STREAM {
            break;
        }
        let &(base, extra) = LENGTH_TABLE
            .get(ls as usize)
            .ok_or(KompressionError::BadTreeEncoding)?;
        let length = base as usize + read_extra(&mut bits, extra)?;

        let ds = displacements.read_symbol(&mut bits)?;
        let &(base, extra) = DISTANCE_TABLE
            .get(ds as usize)
            .ok_or(KompressionError::BadTreeEncoding)?;
        let displacement = base as usize + read_extra(&mut bits, extra)?;

        copy_match(&mut out, displacement, length)?;
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::huffman::{FixedTree, FrequencyTreeBuilder};
    use crate::matching::{FixedMatches, Match};
    use crate::parser::LzParser;

    #[test]
    fn symbols_follow_deflate_bases() {
        assert_eq!(symbol_for(&LENGTH_TABLE, 1, 3), 1);
        assert_eq!(symbol_for(&LENGTH_TABLE, 1, 12), 9);
        assert_eq!(symbol_for(&LENGTH_TABLE, 1, 257), 28);
        assert_eq!(symbol_for(&LENGTH_TABLE, 1, 258), 29);
        assert_eq!(symbol_for(&DISTANCE_TABLE, 0, 1), 0);
        assert_eq!(symbol_for(&DISTANCE_TABLE, 0, 6), 4);
        assert_eq!(symbol_for(&DISTANCE_TABLE, 0, 32768), 29);
    }

    #[test]
    fn single_literal_and_no_matches() -> Result<()> {
        let packed = compress(b"zzz", &FixedMatches::default(), &FrequencyTreeBuilder)?;

        // trees: leaf 'z', leaf 0, empty; then three zero length literals and the end
        assert_eq!(packed, vec![0x02, 0x3D, 0x40, 0xC4]);
        assert_eq!(decompress(&packed)?, b"zzz");
        Ok(())
    }

    #[test]
    fn round_trips_with_matches() -> Result<()> {
        let mut input = b"Don! Katsu! Don don katsu! ".repeat(20);
        input.extend((0..=255u8).rev());
        input.extend(vec![7u8; 300]);

        let packed = compress(&input, &LzParser::default(), &FrequencyTreeBuilder)?;
        assert!(packed.len() < input.len());
        assert_eq!(decompress(&packed)?, input);

        let parser = FixedMatches(vec![Match::new(1, 1, 258)]);
        let packed = compress(&[1; 259], &parser, &FrequencyTreeBuilder)?;
        assert_eq!(decompress(&packed)?, vec![1; 259]);
        Ok(())
    }

    #[test]
    fn fixed_trees_must_cover_used_symbols() -> Result<()> {
        let tree: FixedTree = "(97, 98)".parse()?;
        assert!(matches!(
            compress(b"abc", &FixedMatches::default(), &tree),
            Err(KompressionError::MissingCode(_))
        ));
        Ok(())
    }
}
