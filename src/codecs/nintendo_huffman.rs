//! GBA/DS BIOS `HuffUnComp` data, compression types `0x24` and `0x28`.
//!
//! After the [Nintendo header](crate::format::NintendoHeader) comes the tree
//! table. Its first byte is the table size in halfwords, minus one; the root
//! node follows. A node byte is
//!
//! ```text
//! ABoooooo
//! ```
//!
//! where the pair of children of the node at table index `a` sits at
//! `(a & !1) + 2 * o + 2`, child 0 first. `A` is set if child 0 is a leaf and
//! `B` if child 1 is; a leaf byte is just its symbol. The table is padded to a
//! multiple of four bytes.
//!
//! The codes follow as 32 bit words, most significant bit first. Four bit data
//! codes two nibbles per byte.

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};
use smallvec::SmallVec;
use std::fmt;
use std::io::{Cursor, Read};

use super::{check_size, output_buffer};
use crate::bits::{BitOrder, BitReader, BitWriter};
use crate::errors::{KompressionError, Result};
use crate::format::{ByteOrder, NintendoHeader};
use crate::huffman::{HuffmanNode, HuffmanTreeBuilder};

const NAME: &str = "NintendoHuffman";
const HEADER_SIZE: usize = 4;
const MAX_OFFSET: usize = 0x3F;

/// Bits per coded symbol
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Four,
    Eight,
}

impl BitDepth {
    pub fn bits(self) -> u8 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub fn kind(self) -> u8 {
        0x20 | self.bits()
    }

    fn alphabet(self) -> usize {
        1 << self.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// The symbols of `input` in coding order
fn symbols(input: &[u8], depth: BitDepth, order: ByteOrder) -> Vec<u8> {
    match depth {
        BitDepth::Eight => input.to_vec(),
        BitDepth::Four => input
            .iter()
            .flat_map(|&b| match order {
                ByteOrder::LittleEndian => [b & 0xF, b >> 4],
                ByteOrder::BigEndian => [b >> 4, b & 0xF],
            })
            .collect(),
    }
}

/// A root that is a node, as the table format has no way to store a lone leaf
fn padded_root(root: Option<HuffmanNode>) -> HuffmanNode {
    match root {
        Some(HuffmanNode::Leaf(symbol)) => {
            HuffmanNode::node(HuffmanNode::Leaf(symbol), HuffmanNode::Leaf(symbol))
        }
        Some(node) => node,
        None => HuffmanNode::node(HuffmanNode::Leaf(0), HuffmanNode::Leaf(0)),
    }
}

fn count_nodes(node: &HuffmanNode) -> usize {
    match node {
        HuffmanNode::Leaf(..) => 0,
        HuffmanNode::Node(zero, one) => 1 + count_nodes(zero) + count_nodes(one),
    }
}

/// Lay the tree out so that every child pair is within reach of its parent.
///
/// Nodes get their child pairs in breadth first order, picking the waiting
/// node with the lowest score `code - i`, where `code` is the pair that holds
/// the node and `i` its place in the queue. Ties go to the oldest node. The
/// inner children of a placed node queue up child 1 first.
fn layout_table(root: &HuffmanNode) -> Result<Vec<u8>> {
    let mut table = vec![0u8, 0u8];
    // (table index, node)
    let mut queue = vec![(1usize, root)];
    while !queue.is_empty() {
        let pair = table.len() / 2;
        let pick = queue
            .iter()
            .enumerate()
            .min_by_key(|&(i, &(address, _))| (address / 2) as isize - i as isize)
            .map_or(0, |(i, _)| i);

        let (address, node) = queue.remove(pick);
        let (zero, one) = match node {
            HuffmanNode::Node(zero, one) => (zero.as_ref(), one.as_ref()),
            HuffmanNode::Leaf(..) => return Err(KompressionError::BadTreeEncoding),
        };
        let offset = pair - address / 2 - 1;
        if offset > MAX_OFFSET {
            return Err(KompressionError::TreeLayout(count_nodes(root)));
        }

        let mut byte = offset as u8;
        let mut inner = SmallVec::<[(usize, &HuffmanNode); 2]>::new();
        for (i, child) in [zero, one].into_iter().enumerate() {
            match child {
                HuffmanNode::Leaf(symbol) => {
                    byte |= 0x80 >> i;
                    table.push(*symbol as u8);
                }
                HuffmanNode::Node(..) => {
                    inner.push((2 * pair + i, child));
                    table.push(0);
                }
            }
        }
        table[address] = byte;
        queue.extend(inner.into_iter().rev());
    }

    table.resize((table.len() + 3) & !3, 0);
    table[0] = (table.len() / 2 - 1) as u8;
    Ok(table)
}

pub fn compress(
    input: &[u8],
    depth: BitDepth,
    order: ByteOrder,
    builder: &dyn HuffmanTreeBuilder,
) -> Result<Vec<u8>> {
    let header = NintendoHeader::new(depth.kind(), input.len(), NAME)?;
    let symbols = symbols(input, depth, order);

    let mut frequencies = vec![0u64; depth.alphabet()];
    for &s in &symbols {
        frequencies[s as usize] += 1;
    }

    let root = padded_root(builder.build(&frequencies));
    let codes = root.code_table(depth.alphabet())?;
    let table = layout_table(&root)?;
    trace!("{} bit Huffman tree: {}", depth, root);

    let mut bits = BitWriter::new(BitOrder::MsbFirst, 4, order);
    for &s in &symbols {
        let code = codes[s as usize].ok_or(KompressionError::MissingCode(s as u16))?;
        bits.write_bits(code.code, code.bitlen());
    }
    let bits = bits.finish();

    let mut out = Vec::with_capacity(HEADER_SIZE + table.len() + bits.len());
    header.write(&mut out)?;
    out.extend_from_slice(&table);
    out.extend_from_slice(&bits);

    debug!(
        "NintendoHuffman ({} bit, {}): {} bytes into {}, {} byte tree",
        depth,
        order,
        input.len(),
        out.len(),
        table.len()
    );
    Ok(out)
}

pub fn decompress(input: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut rdr = Cursor::new(input);
    let kind = rdr.read_u8()?;
    let depth = match kind {
        0x24 => BitDepth::Four,
        0x28 => BitDepth::Eight,
        value if value & 0xF0 == 0x20 => {
            return Err(KompressionError::UnsupportedVariant { codec: NAME, value })
        }
        _ => return Err(KompressionError::InvalidHeader(NAME)),
    };
    let size = rdr.read_u24::<LittleEndian>()? as usize;

    let mut table_size = [0u8; 1];
    rdr.read_exact(&mut table_size)?;
    let table_len = (table_size[0] as usize + 1) * 2;
    let table = input
        .get(HEADER_SIZE..HEADER_SIZE + table_len)
        .ok_or(KompressionError::UnexpectedEof)?;

    let mut bits = BitReader::new(&input[HEADER_SIZE + table_len..], BitOrder::MsbFirst, 4, order);
    let mut next_symbol = || -> Result<u8> {
        let mut address = 1;
        loop {
            let node = table[address] as usize;
            let bit = bits.read_bit()? as usize;
            let child = (address & !1) + 2 * (node & MAX_OFFSET) + 2 + bit;
            if child >= table.len() {
                return Err(KompressionError::BadTreeEncoding);
            }
            if node & (0x80 >> bit) != 0 {
                return Ok(table[child]);
            }
            address = child;
        }
    };

    let mut out = output_buffer(size, input);
    while out.len() < size {
        match depth {
            BitDepth::Eight => out.push(next_symbol()?),
            BitDepth::Four => {
                let first = next_symbol()?;
                let second = next_symbol()?;
                if (first | second) > 0xF {
                    return Err(KompressionError::BadTreeEncoding);
                }
                out.push(match order {
                    ByteOrder::LittleEndian => second << 4 | first,
                    ByteOrder::BigEndian => first << 4 | second,
                });
            }
        }
    }

    check_size(out, size)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::huffman::{FixedTree, FrequencyTreeBuilder};

    #[test]
    fn eight_bit_table_and_codes() -> Result<()> {
        let input = b"aaaaabbcd";
        let be = compress(input, BitDepth::Eight, ByteOrder::BigEndian, &FrequencyTreeBuilder)?;

        assert_eq!(&be[..4], &[0x28, 9, 0, 0]);
        assert_eq!(&be[4..12], &[3, 0x40, 0x80, b'a', b'b', 0xC0, b'c', b'd']);
        // 1 1 1 1 1 00 00 010 011
        assert_eq!(&be[12..], &[0xF8, 0x13, 0x00, 0x00]);
        assert_eq!(decompress(&be, ByteOrder::BigEndian)?, input);

        let le = compress(input, BitDepth::Eight, ByteOrder::LittleEndian, &FrequencyTreeBuilder)?;
        assert_eq!(&le[12..], &[0x00, 0x00, 0x13, 0xF8]);
        assert_eq!(decompress(&le, ByteOrder::LittleEndian)?, input);
        Ok(())
    }

    #[test]
    fn nodes_are_laid_out_by_score() -> Result<()> {
        let tree: FixedTree = "(((1, 2), (3, 4)), (5, 6))".parse()?;
        let input = [1, 2, 3, 4, 5, 6];
        let packed = compress(&input, BitDepth::Eight, ByteOrder::LittleEndian, &tree)?;

        assert_eq!(
            &packed[4..16],
            &[0x05, 0x00, 0x00, 0xC2, 0xC0, 0xC2, 1, 2, 5, 6, 3, 4]
        );
        assert_eq!(decompress(&packed, ByteOrder::LittleEndian)?, input);
        Ok(())
    }

    #[test]
    fn nibble_order_follows_byte_order() -> Result<()> {
        let input = [0x21, 0x21];
        let le = compress(&input, BitDepth::Four, ByteOrder::LittleEndian, &FrequencyTreeBuilder)?;
        let be = compress(&input, BitDepth::Four, ByteOrder::BigEndian, &FrequencyTreeBuilder)?;

        assert_eq!(le[0], 0x24);
        // symbol 1 codes as 0 and symbol 2 as 1
        assert_eq!(&le[8..], &[0x00, 0x00, 0x00, 0b0101_0000]);
        assert_eq!(&be[8..], &[0b1010_0000, 0x00, 0x00, 0x00]);
        assert_eq!(decompress(&le, ByteOrder::LittleEndian)?, input);
        assert_eq!(decompress(&be, ByteOrder::BigEndian)?, input);
        Ok(())
    }

    #[test]
    fn single_symbols_get_a_padded_root() -> Result<()> {
        let input = [0x77; 5];
        let packed = compress(&input, BitDepth::Eight, ByteOrder::LittleEndian, &FrequencyTreeBuilder)?;
        assert_eq!(&packed[4..8], &[1, 0xC0, 0x77, 0x77]);
        assert_eq!(decompress(&packed, ByteOrder::LittleEndian)?, input);

        let empty = compress(&[], BitDepth::Four, ByteOrder::LittleEndian, &FrequencyTreeBuilder)?;
        assert_eq!(empty, vec![0x24, 0, 0, 0, 1, 0xC0, 0, 0]);
        assert_eq!(decompress(&empty, ByteOrder::LittleEndian)?, Vec::<u8>::new());
        Ok(())
    }

    #[test]
    fn every_byte_value() -> Result<()> {
        let input: Vec<u8> = (0..=255).chain((0..=255).rev()).collect();
        let packed = compress(&input, BitDepth::Eight, ByteOrder::BigEndian, &FrequencyTreeBuilder)?;
        assert_eq!(packed[4], 0xFF);
        assert_eq!(decompress(&packed, ByteOrder::BigEndian)?, input);
        Ok(())
    }

    #[test]
    fn fixed_trees_and_bad_kinds() -> Result<()> {
        let tree: FixedTree = "(1, (2, 3))".parse()?;
        assert!(matches!(
            compress(&[1, 4], BitDepth::Eight, ByteOrder::BigEndian, &tree),
            Err(KompressionError::MissingCode(4))
        ));
        let packed = compress(&[1, 3, 2], BitDepth::Eight, ByteOrder::BigEndian, &tree)?;
        assert_eq!(decompress(&packed, ByteOrder::BigEndian)?, vec![1, 3, 2]);

        assert!(matches!(
            decompress(&[0x22, 0, 0, 0], ByteOrder::BigEndian),
            Err(KompressionError::UnsupportedVariant { value: 0x22, .. })
        ));
        assert!(matches!(
            decompress(&[0x30, 0, 0, 0], ByteOrder::BigEndian),
            Err(KompressionError::InvalidHeader(_))
        ));
        Ok(())
    }
}
