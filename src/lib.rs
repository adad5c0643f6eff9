//! Encoders and decoders for the LZ, RLE and Huffman containers of legacy
//! game consoles and middleware.
//!
//! Every format lives in its own module under [`codecs`], with a plain
//! `compress`/`decompress` pair. [`Codec`] selects a format at runtime:
//!
//! ```
//! use kompression::{Codec, ByteOrder};
//!
//! let input = b"Mario Mario Mario Luigi Luigi";
//! let codec = Codec::Yaz0(ByteOrder::BigEndian);
//! let packed = codec.compress(input).unwrap();
//! assert_eq!(&packed[..4], b"Yaz0");
//! assert_eq!(codec.decompress(&packed).unwrap(), input);
//! ```
//!
//! Encoders never search for matches themselves. They hand a description of
//! what their format can store to a [`MatchParser`]; [`LzParser`] is the
//! default, and [`FixedMatches`] replays a given match list. Huffman formats
//! likewise ask a [`HuffmanTreeBuilder`] for their trees.

pub mod bits;
pub mod codec;
pub mod codecs;
mod errors;
pub mod format;
pub mod huffman;
pub mod matching;
pub mod parser;

pub use codec::{Codec, Compressor};
pub use codecs::{deflate::Framing, nintendo_huffman::BitDepth, tales_of::TalesOfVariant};
pub use errors::{KompressionError, Result, TreeParseError};
pub use format::ByteOrder;
pub use huffman::{FixedTree, FrequencyTreeBuilder, HuffmanNode, HuffmanTreeBuilder};
pub use matching::{FindLimits, FixedMatches, Match, MatchParser, ParseOptions, PriceCalculator};
pub use parser::{LzParser, ParseStrategy, ParserSettings};

/// Compress `input` as `codec` with the default parser and tree builder
pub fn compress(input: &[u8], codec: Codec) -> Result<Vec<u8>> {
    codec.compress(input)
}

/// Decompress `input`, which has to be `codec` data
pub fn decompress(input: &[u8], codec: Codec) -> Result<Vec<u8>> {
    codec.decompress(input)
}
