//! Bit and byte stream primitives.
//!
//! Legacy formats disagree on almost every detail of how flags are packed:
//! whether the first bit lands in the most or least significant position,
//! whether bits are gathered into bytes, halfwords or words, and in which byte
//! order those words are stored. [`BitWriter`] and [`BitReader`] handle pure
//! bitstreams; [`FlagWriter`] and [`FlagReader`] handle flag words interleaved
//! with token bytes, where the flag word has to be reserved before its tokens
//! are written and filled in afterwards.

use crate::errors::{KompressionError, Result};
use crate::format::ByteOrder;
use std::io::{self, Read};

/// Position of the first bit within an accumulated word.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct WordLayout {
    bit_order: BitOrder,
    word_bytes: usize,
    byte_order: ByteOrder,
}

impl WordLayout {
    fn new(bit_order: BitOrder, word_bytes: usize, byte_order: ByteOrder) -> Self {
        assert!(
            matches!(word_bytes, 1 | 2 | 4),
            "unsupported word size {}",
            word_bytes
        );
        Self {
            bit_order,
            word_bytes,
            byte_order,
        }
    }

    #[inline]
    fn width(&self) -> u32 {
        self.word_bytes as u32 * 8
    }

    /// Mask of bit number `index` (0 = first bit stored) within a word
    #[inline]
    fn mask(&self, index: u32) -> u32 {
        match self.bit_order {
            BitOrder::MsbFirst => 1 << (self.width() - 1 - index),
            BitOrder::LsbFirst => 1 << index,
        }
    }

    fn store(&self, word: u32, dst: &mut [u8]) {
        for (i, byte) in dst.iter_mut().enumerate().take(self.word_bytes) {
            let shift = match self.byte_order {
                ByteOrder::LittleEndian => i * 8,
                ByteOrder::BigEndian => (self.word_bytes - 1 - i) * 8,
            };
            *byte = (word >> shift) as u8;
        }
    }

    fn load(&self, src: &[u8]) -> u32 {
        src.iter()
            .take(self.word_bytes)
            .enumerate()
            .fold(0, |word, (i, &byte)| {
                let shift = match self.byte_order {
                    ByteOrder::LittleEndian => i * 8,
                    ByteOrder::BigEndian => (self.word_bytes - 1 - i) * 8,
                };
                word | (byte as u32) << shift
            })
    }
}

/// Writes a pure bitstream into a growable buffer.
#[derive(Debug, Clone)]
pub struct BitWriter {
    out: Vec<u8>,
    layout: WordLayout,
    word: u32,
    filled: u32,
}

impl BitWriter {
    pub fn new(bit_order: BitOrder, word_bytes: usize, byte_order: ByteOrder) -> Self {
        Self {
            out: Vec::new(),
            layout: WordLayout::new(bit_order, word_bytes, byte_order),
            word: 0,
            filled: 0,
        }
    }

    /// Byte-wide, most significant bit first.
    pub fn msb_bytes() -> Self {
        Self::new(BitOrder::MsbFirst, 1, ByteOrder::BigEndian)
    }

    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.word |= self.layout.mask(self.filled);
        }
        self.filled += 1;

        if self.filled == self.layout.width() {
            self.emit();
        }
    }

    /// Write the low `count` bits of `value`. MSB-first streams take the
    /// value's high bit first, LSB-first streams its low bit first.
    pub fn write_bits(&mut self, value: u64, count: u32) {
        debug_assert!(count <= 64);
        match self.layout.bit_order {
            BitOrder::MsbFirst => {
                for i in (0..count).rev() {
                    self.write_bit((value >> i) & 1 == 1);
                }
            }
            BitOrder::LsbFirst => {
                for i in 0..count {
                    self.write_bit((value >> i) & 1 == 1);
                }
            }
        }
    }

    #[inline]
    pub fn write_byte(&mut self, value: u8) {
        self.write_bits(value as u64, 8);
    }

    /// Bytes emitted so far, counting a partially filled word as whole.
    pub fn len(&self) -> usize {
        self.out.len() + if self.filled > 0 { self.layout.word_bytes } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-pad any partial word and return the written bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.emit();
        }
        self.out
    }

    fn emit(&mut self) {
        let start = self.out.len();
        self.out.resize(start + self.layout.word_bytes, 0);
        self.layout.store(self.word, &mut self.out[start..]);
        self.word = 0;
        self.filled = 0;
    }
}

/// Reads a bitstream written by a [`BitWriter`] with the same layout.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    layout: WordLayout,
    word: u32,
    consumed: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], bit_order: BitOrder, word_bytes: usize, byte_order: ByteOrder) -> Self {
        let layout = WordLayout::new(bit_order, word_bytes, byte_order);
        Self {
            data,
            pos: 0,
            word: 0,
            consumed: layout.width(),
            layout,
        }
    }

    pub fn msb_bytes(data: &'a [u8]) -> Self {
        Self::new(data, BitOrder::MsbFirst, 1, ByteOrder::BigEndian)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.consumed == self.layout.width() {
            let end = self.pos + self.layout.word_bytes;
            let src = self
                .data
                .get(self.pos..end)
                .ok_or(KompressionError::UnexpectedEof)?;
            self.word = self.layout.load(src);
            self.pos = end;
            self.consumed = 0;
        }

        let bit = self.word & self.layout.mask(self.consumed) != 0;
        self.consumed += 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        let mut value = 0;
        match self.layout.bit_order {
            BitOrder::MsbFirst => {
                for _ in 0..count {
                    value = value << 1 | self.read_bit()? as u64;
                }
            }
            BitOrder::LsbFirst => {
                for i in 0..count {
                    value |= (self.read_bit()? as u64) << i;
                }
            }
        }
        Ok(value)
    }
}

/// Writes flag words interleaved with token bytes.
///
/// The word is reserved in `out` when the first flag of a group is pushed, so
/// it precedes the tokens it describes, and is rewritten in place on every
/// push. A partially used word needs no flushing: unused flags stay zero.
#[derive(Debug, Clone)]
pub struct FlagWriter {
    layout: WordLayout,
    position: usize,
    word: u32,
    count: u32,
}

impl FlagWriter {
    pub fn new(bit_order: BitOrder, word_bytes: usize, byte_order: ByteOrder) -> Self {
        let layout = WordLayout::new(bit_order, word_bytes, byte_order);
        Self {
            position: 0,
            word: 0,
            count: layout.width(),
            layout,
        }
    }

    /// One flag byte, first flag in bit 7.
    pub fn msb_byte() -> Self {
        Self::new(BitOrder::MsbFirst, 1, ByteOrder::BigEndian)
    }

    /// One flag byte, first flag in bit 0.
    pub fn lsb_byte() -> Self {
        Self::new(BitOrder::LsbFirst, 1, ByteOrder::LittleEndian)
    }

    pub fn push(&mut self, out: &mut Vec<u8>, flag: bool) {
        if self.count == self.layout.width() {
            self.position = out.len();
            out.resize(self.position + self.layout.word_bytes, 0);
            self.word = 0;
            self.count = 0;
        }

        if flag {
            self.word |= self.layout.mask(self.count);
        }
        self.count += 1;

        self.layout.store(self.word, &mut out[self.position..]);
    }
}

/// Reads flag words interleaved with token bytes.
#[derive(Debug, Clone)]
pub struct FlagReader {
    layout: WordLayout,
    word: u32,
    consumed: u32,
}

impl FlagReader {
    pub fn new(bit_order: BitOrder, word_bytes: usize, byte_order: ByteOrder) -> Self {
        let layout = WordLayout::new(bit_order, word_bytes, byte_order);
        Self {
            word: 0,
            consumed: layout.width(),
            layout,
        }
    }

    pub fn msb_byte() -> Self {
        Self::new(BitOrder::MsbFirst, 1, ByteOrder::BigEndian)
    }

    pub fn lsb_byte() -> Self {
        Self::new(BitOrder::LsbFirst, 1, ByteOrder::LittleEndian)
    }

    /// Does the next flag require reading a new word?
    pub fn needs_word(&self) -> bool {
        self.consumed == self.layout.width()
    }

    pub fn next<R: Read>(&mut self, rdr: &mut R) -> Result<bool> {
        if self.needs_word() {
            let mut buf = [0u8; 4];
            rdr.read_exact(&mut buf[..self.layout.word_bytes])?;
            self.word = self.layout.load(&buf);
            self.consumed = 0;
        }

        let flag = self.word & self.layout.mask(self.consumed) != 0;
        self.consumed += 1;
        Ok(flag)
    }
}

/// Map a logical index of a reverse stream onto its physical position.
///
/// Panics if `index` is outside a stream of `len` bytes; a reverse stream is
/// always sized before it is addressed, so this is a logic error.
#[inline]
pub fn reverse_index(len: usize, index: usize) -> usize {
    assert!(
        index < len,
        "reverse stream index {} out of bounds for length {}",
        index,
        len
    );
    len - 1 - index
}

/// Lay out a logically written reverse stream in physical order.
pub fn to_physical(logical: &[u8]) -> Vec<u8> {
    let len = logical.len();
    let mut physical = vec![0; len];
    for (i, &byte) in logical.iter().enumerate() {
        physical[reverse_index(len, i)] = byte;
    }
    physical
}

/// Reads a buffer from its last byte to its first.
#[derive(Debug, Clone)]
pub struct ReverseReader<'a> {
    data: &'a [u8],
    read: usize,
}

impl<'a> ReverseReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, read: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.read
    }
}

impl Read for ReverseReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        for slot in buf.iter_mut().take(n) {
            *slot = self.data[reverse_index(self.data.len(), self.read)];
            self.read += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn msb_bytes_pad_the_last_byte() {
        let mut wtr = BitWriter::msb_bytes();
        wtr.write_bits(0b101, 3);
        wtr.write_byte(0xFF);
        assert_eq!(wtr.len(), 2);
        assert_eq!(wtr.finish(), vec![0b1011_1111, 0b1110_0000]);
    }

    #[test]
    fn words_follow_byte_order() {
        let mut le = BitWriter::new(BitOrder::MsbFirst, 4, ByteOrder::LittleEndian);
        let mut be = BitWriter::new(BitOrder::MsbFirst, 4, ByteOrder::BigEndian);
        for wtr in [&mut le, &mut be] {
            wtr.write_bit(true);
            wtr.write_bits(0, 30);
            wtr.write_bit(true);
        }
        assert_eq!(le.finish(), vec![0x01, 0x00, 0x00, 0x80]);
        assert_eq!(be.finish(), vec![0x80, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn lsb_words_round_trip() -> Result<()> {
        let mut wtr = BitWriter::new(BitOrder::LsbFirst, 2, ByteOrder::LittleEndian);
        wtr.write_bits(0x2A5, 10);
        wtr.write_bits(0x3, 2);
        let bytes = wtr.finish();
        assert_eq!(bytes.len(), 2);

        let mut rdr = BitReader::new(&bytes, BitOrder::LsbFirst, 2, ByteOrder::LittleEndian);
        assert_eq!(rdr.read_bits(10)?, 0x2A5);
        assert_eq!(rdr.read_bits(2)?, 0x3);
        assert_eq!(rdr.read_bits(4)?, 0);
        assert!(matches!(rdr.read_bit(), Err(KompressionError::UnexpectedEof)));
        Ok(())
    }

    #[test]
    fn flag_word_precedes_its_tokens() {
        let mut out = Vec::new();
        let mut flags = FlagWriter::msb_byte();
        for i in 0..9u8 {
            flags.push(&mut out, i % 2 == 0);
            out.push(i);
        }
        assert_eq!(
            out,
            vec![0b1010_1010, 0, 1, 2, 3, 4, 5, 6, 7, 0b1000_0000, 8]
        );
    }

    #[test]
    fn flag_reader_mirrors_writer() -> Result<()> {
        let mut out = Vec::new();
        let mut flags = FlagWriter::new(BitOrder::LsbFirst, 4, ByteOrder::LittleEndian);
        let pattern: Vec<bool> = (0..40).map(|i| i % 3 == 0).collect();
        for &flag in &pattern {
            flags.push(&mut out, flag);
        }
        assert_eq!(out.len(), 8);

        let mut rdr = Cursor::new(&out[..]);
        let mut reader = FlagReader::new(BitOrder::LsbFirst, 4, ByteOrder::LittleEndian);
        for &flag in &pattern {
            assert_eq!(reader.next(&mut rdr)?, flag);
        }
        Ok(())
    }

    #[test]
    fn reverse_stream_remaps_indices() {
        assert_eq!(reverse_index(4, 0), 3);
        assert_eq!(reverse_index(4, 3), 0);
        assert_eq!(to_physical(&[1, 2, 3]), vec![3, 2, 1]);

        let mut rdr = ReverseReader::new(&[1, 2, 3]);
        let mut buf = [0u8; 2];
        assert_eq!(rdr.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 2]);
        assert_eq!(rdr.remaining(), 1);
    }

    #[test]
    #[should_panic]
    fn reverse_index_past_end_panics() {
        reverse_index(4, 4);
    }
}
