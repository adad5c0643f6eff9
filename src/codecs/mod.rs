//! One module per container format.
//!
//! Every module exposes `compress` and `decompress`. LZ and RLE encoders take
//! the [`MatchParser`] that chooses their matches, and describe what they can
//! store through a module level `parse_options()` and `Prices` calculator.

use crate::errors::{KompressionError, Result};
use crate::matching::{check_matches, Match, MatchParser, ParseOptions, PriceCalculator};

pub mod backward_lz77;
pub mod crilayla;
pub mod deflate;
pub mod lz10;
pub mod lz11;
pub mod lz60;
pub mod lz77;
pub mod lz_ecd;
pub mod lz_enc;
pub mod lze;
pub mod mio0;
pub mod nintendo_huffman;
pub mod nintendo_rle;
pub mod ps_lz;
pub mod shade_lz;
pub mod spike_chunsoft;
pub mod sting_lz;
pub mod taiko_lz80;
pub mod taiko_lz81;
pub mod tales_of;
pub mod wp16;
pub mod yay0;
pub mod yaz0;

const MAX_RESERVE_RATIO: usize = 16;

/// Ask `parser` for the matches of `input`, and check they can be walked
pub(crate) fn parse(
    input: &[u8],
    parser: &dyn MatchParser,
    options: &ParseOptions,
    prices: &dyn PriceCalculator,
) -> Result<Vec<Match>> {
    let matches = parser.parse_matches(input, options, prices);
    check_matches(&matches, input.len(), options)?;
    Ok(matches)
}

/// Index of the first limits in `options` that hold `m`
pub(crate) fn limit_index(codec: &'static str, options: &ParseOptions, m: &Match) -> Result<usize> {
    options
        .limits
        .iter()
        .position(|l| l.allows(m))
        .ok_or(KompressionError::UnencodableMatch { codec, found: *m })
}

/// A size that has to fit a 32 bit header field
pub(crate) fn u32_size(codec: &'static str, size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| KompressionError::InputTooLarge {
        codec,
        size,
        max: u32::MAX as usize,
    })
}

/// Output buffer for a decoder, reserving no more than the input could expand
/// to at a plausible ratio, since `size` comes from an unchecked header
pub(crate) fn output_buffer(size: usize, input: &[u8]) -> Vec<u8> {
    Vec::with_capacity(size.min(input.len().saturating_mul(MAX_RESERVE_RATIO)))
}

/// Check the decoded length against the length a header declared
pub(crate) fn check_size(out: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if out.len() != expected {
        return Err(KompressionError::SizeMismatch {
            expected,
            found: out.len(),
        });
    }
    Ok(out)
}

/// The ring buffer history of the Okumura style LZSS formats.
///
/// Matches name an absolute slot of the ring rather than a distance. The ring
/// starts zero filled with its write head at `preset`, so slots before the
/// head act as zeroed history.
pub(crate) struct Ring {
    buf: Vec<u8>,
    head: usize,
}

impl Ring {
    pub(crate) fn new(size: usize, preset: usize) -> Self {
        Self {
            buf: vec![0; size],
            head: preset,
        }
    }

    /// Slot holding the byte `displacement` bytes behind input `position`
    pub(crate) fn slot(size: usize, preset: usize, position: usize, displacement: usize) -> usize {
        (preset + position + size - displacement % size) % size
    }

    pub(crate) fn push(&mut self, out: &mut Vec<u8>, byte: u8) {
        out.push(byte);
        self.buf[self.head] = byte;
        self.head = (self.head + 1) % self.buf.len();
    }

    pub(crate) fn copy(&mut self, out: &mut Vec<u8>, slot: usize, length: usize) {
        let size = self.buf.len();
        for i in 0..length {
            let byte = self.buf[(slot + i) % size];
            self.push(out, byte);
        }
    }
}

/// Price of a literal that needs an opcode when it opens a run
#[inline]
pub(crate) fn run_opening_price(literal_run: usize, opcode_bits: u32) -> u32 {
    if literal_run == 0 {
        8 + opcode_bits
    } else {
        8
    }
}
