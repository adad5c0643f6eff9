//! Shared pieces of the container formats.
//!
//! ## Nintendo header
//! The GBA/DS BIOS formats (LZ10, LZ11, LZ60, RLE and Huffman) all start with
//! the same four byte header:
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0        | compression type (`0x10`, `0x11`, `0x24`, `0x30`, ...) |
//! | 1..4     | size of the decompressed data, 24 bit little endian |
//!
//! ## Linear Huffman trees
//! Formats that ship their Huffman trees inline in an MSB-first bitstream use
//! a post-order encoding. Tree leafs are encoded as a `0` followed by a fixed
//! width leaf value. Tree nodes are encoded by a `1`, and combine the most
//! recent two nodes/leaves. A `1` read while fewer than two entries are
//! outstanding ends the tree.
//!
//! For example, the simple tree `(1, (4, 7))` with eight bit leaves would be
//! encoded in binary as:
//! ```text
//! 0 00000001 0 00000100 0 00000111 1 1 1
//! ```
//! and it would give the following Huffman codes:
//!
//! | Symbol | Code |
//! | ------ | ---- |
//! |    1   |  0   |
//! |    4   |  10  |
//! |    7   |  11  |
//!
//! Single leaf trees are valid, and the leaf has a "zero length" code. An
//! empty tree is a single `1`.

use crate::errors::{KompressionError, Result};
use bitstream_io::{BitReader, BitWriter, BE};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Cursor, Read, Write};

/// Byte order of multi-byte header fields and flag words.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn read_u16<R: Read>(self, rdr: &mut R) -> io::Result<u16> {
        match self {
            Self::LittleEndian => rdr.read_u16::<LittleEndian>(),
            Self::BigEndian => rdr.read_u16::<BigEndian>(),
        }
    }

    pub fn read_u32<R: Read>(self, rdr: &mut R) -> io::Result<u32> {
        match self {
            Self::LittleEndian => rdr.read_u32::<LittleEndian>(),
            Self::BigEndian => rdr.read_u32::<BigEndian>(),
        }
    }

    pub fn write_u16<W: Write>(self, wtr: &mut W, value: u16) -> io::Result<()> {
        match self {
            Self::LittleEndian => wtr.write_u16::<LittleEndian>(value),
            Self::BigEndian => wtr.write_u16::<BigEndian>(value),
        }
    }

    pub fn write_u32<W: Write>(self, wtr: &mut W, value: u32) -> io::Result<()> {
        match self {
            Self::LittleEndian => wtr.write_u32::<LittleEndian>(value),
            Self::BigEndian => wtr.write_u32::<BigEndian>(value),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LittleEndian => write!(f, "le"),
            Self::BigEndian => write!(f, "be"),
        }
    }
}

/// The information stored at the start of a Nintendo BIOS compressed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NintendoHeader {
    pub kind: u8,
    /// size of decompressed data
    pub size: u32,
}

impl NintendoHeader {
    pub const MAX_SIZE: usize = 0xFF_FFFF;

    /// Header for `size` bytes of `codec` data, rejecting sizes that do not
    /// fit in 24 bits.
    pub(crate) fn new(kind: u8, size: usize, codec: &'static str) -> Result<Self> {
        if size > Self::MAX_SIZE {
            return Err(KompressionError::InputTooLarge {
                codec,
                size,
                max: Self::MAX_SIZE,
            });
        }

        Ok(Self {
            kind,
            size: size as u32,
        })
    }

    /// Read a header, checking that it is of compression type `kind`
    pub(crate) fn read<R: Read>(rdr: &mut R, kind: u8, codec: &'static str) -> Result<Self> {
        let found = rdr.read_u8()?;
        if found != kind {
            return Err(KompressionError::InvalidHeader(codec));
        }
        let size = rdr.read_u24::<LittleEndian>()?;

        Ok(Self { kind, size })
    }

    pub(crate) fn write<W: Write>(&self, wtr: &mut W) -> Result<()> {
        wtr.write_u8(self.kind)?;
        wtr.write_u24::<LittleEndian>(self.size)?;
        Ok(())
    }
}

/// Bytes left to read in `rdr`
#[inline]
pub(crate) fn remaining(rdr: &Cursor<&[u8]>) -> usize {
    rdr.get_ref().len().saturating_sub(rdr.position() as usize)
}

/// Check a four byte magic at the start of `rdr`
pub(crate) fn expect_magic<R: Read>(rdr: &mut R, magic: &[u8], codec: &'static str) -> Result<()> {
    let mut found = [0u8; 8];
    let found = &mut found[..magic.len()];
    rdr.read_exact(found)?;
    if found != magic {
        return Err(KompressionError::InvalidHeader(codec));
    }
    Ok(())
}

/// A Huffman tree node or leaf designed to be stored in an array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntry {
    // left and right are indices into the `LinearTree` array
    Node { left: usize, right: usize },
    Leaf(u16),
}

/// An array based Huffman tree in post-order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearTree {
    entries: Vec<TreeEntry>,
}

impl LinearTree {
    /// Create an empty tree.
    /// This will be written to the output buffer as a single true bit (1)
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn from_bitreader<R: Read>(
        bits: &mut BitReader<R, BE>,
        leaf_bits: u32,
    ) -> Result<Self> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut buf: Vec<usize> = Vec::new();

        loop {
            let new_entry_idx = entries.len();
            // create a Node (1) or Leaf (0)
            if bits.read_bit()? {
                // if there are less than 2 "outstanding" entries, the tree is done
                let (right, left) = match (buf.pop(), buf.pop()) {
                    (Some(right), Some(left)) => (right, left),
                    _ => break,
                };

                entries.push(TreeEntry::Node { left, right });
            } else {
                entries.push(TreeEntry::Leaf(bits.read(leaf_bits)?));
            }
            // store a reference to new leaf or node in the buf for later combination
            buf.push(new_entry_idx);
        }

        Ok(Self { entries })
    }

    /// Use `bits` to read one symbol out from this tree
    pub(crate) fn read_symbol<R: Read>(&self, bits: &mut BitReader<R, BE>) -> Result<u16> {
        let tbl = &self.entries;
        // tree starts from end
        let mut idx = tbl
            .len()
            .checked_sub(1)
            .ok_or(KompressionError::BadTreeEncoding)?;

        loop {
            match tbl[idx] {
                TreeEntry::Node { left, right } => {
                    idx = if bits.read_bit()? { right } else { left };
                }
                TreeEntry::Leaf(symbol) => return Ok(symbol),
            }
        }
    }

    /// Write `self` to the big endian `BitWriter`
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BE>, leaf_bits: u32) -> Result<()> {
        for entry in &self.entries {
            match entry {
                TreeEntry::Leaf(val) => {
                    wtr.write_bit(false)?;
                    wtr.write(leaf_bits, *val)?;
                }
                TreeEntry::Node { .. } => {
                    wtr.write_bit(true)?;
                }
            }
        }
        // end tree
        wtr.write_bit(true).map_err(Into::into)
    }

    fn format_entry(&self, entry: usize, f: &mut fmt::Formatter) -> fmt::Result {
        match self.entries[entry] {
            TreeEntry::Leaf(val) => write!(f, "{}", val),
            TreeEntry::Node { left, right } => {
                write!(f, "(")?;
                self.format_entry(left, f)?;
                write!(f, ", ")?;
                self.format_entry(right, f)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for LinearTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.entries.is_empty() {
            write!(f, "()")
        } else {
            self.format_entry(self.entries.len() - 1, f)
        }
    }
}

impl From<Vec<TreeEntry>> for LinearTree {
    fn from(entries: Vec<TreeEntry>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bitstream_io::BigEndian as BitBigEndian;

    fn sample_tree() -> LinearTree {
        vec![
            TreeEntry::Leaf(1),
            TreeEntry::Leaf(4),
            TreeEntry::Leaf(7),
            TreeEntry::Node { left: 1, right: 2 },
            TreeEntry::Node { left: 0, right: 3 },
        ]
        .into()
    }

    #[test]
    fn nintendo_header_round_trip() -> Result<()> {
        let mut out = Vec::new();
        NintendoHeader::new(0x10, 0x123456, "LZ10")?.write(&mut out)?;
        assert_eq!(out, vec![0x10, 0x56, 0x34, 0x12]);

        let hdr = NintendoHeader::read(&mut Cursor::new(&out[..]), 0x10, "LZ10")?;
        assert_eq!(hdr.size, 0x123456);
        assert!(NintendoHeader::read(&mut Cursor::new(&out[..]), 0x11, "LZ11").is_err());
        Ok(())
    }

    #[test]
    fn nintendo_header_rejects_large_sizes() {
        assert!(matches!(
            NintendoHeader::new(0x10, 0x100_0000, "LZ10"),
            Err(KompressionError::InputTooLarge { max: 0xFF_FFFF, .. })
        ));
    }

    #[test]
    fn linear_tree_matches_documented_bits() -> Result<()> {
        let tree = sample_tree();
        assert_eq!(tree.to_string(), "(1, (4, 7))");

        let mut out = Vec::new();
        {
            let mut wtr = BitWriter::endian(&mut out, BitBigEndian);
            tree.write(&mut wtr, 8)?;
            wtr.byte_align()?;
        }
        // 0 00000001 0 00000100 0 00000111 1 1 1
        assert_eq!(out, vec![0x00, 0x81, 0x00, 0xFC]);

        let mut rdr = BitReader::endian(Cursor::new(&out[..]), BitBigEndian);
        let parsed = LinearTree::from_bitreader(&mut rdr, 8)?;
        assert_eq!(parsed, tree);
        Ok(())
    }

    #[test]
    fn single_leaf_has_zero_length_code() -> Result<()> {
        let tree: LinearTree = vec![TreeEntry::Leaf(9)].into();
        let data = [0u8];
        let mut rdr = BitReader::endian(Cursor::new(&data[..]), BitBigEndian);
        assert_eq!(tree.read_symbol(&mut rdr)?, 9);
        assert!(LinearTree::empty().read_symbol(&mut rdr).is_err());
        Ok(())
    }
}
