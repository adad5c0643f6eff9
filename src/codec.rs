//! One entry point over every container format.
//!
//! [`Codec`] names a format together with the settings that change its layout
//! (byte order, bit depth, variant). Compressing through a `Codec` uses the
//! default [`LzParser`] and [`FrequencyTreeBuilder`]; a [`Compressor`] swaps
//! either one out.

use log::debug;
use std::{fmt, str::FromStr};

use crate::codecs::{
    backward_lz77, crilayla, deflate, deflate::Framing, lz10, lz11, lz60, lz77, lz_ecd, lz_enc, lze, mio0,
    nintendo_huffman, nintendo_huffman::BitDepth, nintendo_rle, ps_lz, shade_lz, spike_chunsoft, sting_lz,
    taiko_lz80, taiko_lz81, tales_of, tales_of::TalesOfVariant, wp16, yay0, yaz0,
};
use crate::errors::{KompressionError, Result};
use crate::format::ByteOrder;
use crate::huffman::{FrequencyTreeBuilder, HuffmanTreeBuilder};
use crate::matching::MatchParser;
use crate::parser::LzParser;

/// A container format and the settings that shape its layout
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    Lz10,
    Lz11,
    Lz60,
    Lz77,
    BackwardLz77,
    Crilayla,
    Yaz0(ByteOrder),
    Yay0(ByteOrder),
    Mio0(ByteOrder),
    LzEnc,
    Lze,
    LzEcd,
    TalesOf(TalesOfVariant),
    SpikeChunsoft,
    StingLz,
    Wp16,
    PsLz,
    ShadeLz,
    TaikoLz80,
    TaikoLz81,
    NintendoHuffman(BitDepth, ByteOrder),
    NintendoRle,
    Deflate,
    Zlib,
}

impl Codec {
    /// Every codec, with each of its layouts
    pub const ALL: [Codec; 31] = [
        Codec::Lz10,
        Codec::Lz11,
        Codec::Lz60,
        Codec::Lz77,
        Codec::BackwardLz77,
        Codec::Crilayla,
        Codec::Yaz0(ByteOrder::BigEndian),
        Codec::Yaz0(ByteOrder::LittleEndian),
        Codec::Yay0(ByteOrder::BigEndian),
        Codec::Yay0(ByteOrder::LittleEndian),
        Codec::Mio0(ByteOrder::BigEndian),
        Codec::Mio0(ByteOrder::LittleEndian),
        Codec::LzEnc,
        Codec::Lze,
        Codec::LzEcd,
        Codec::TalesOf(TalesOfVariant::Type01),
        Codec::TalesOf(TalesOfVariant::Type03),
        Codec::SpikeChunsoft,
        Codec::StingLz,
        Codec::Wp16,
        Codec::PsLz,
        Codec::ShadeLz,
        Codec::TaikoLz80,
        Codec::TaikoLz81,
        Codec::NintendoHuffman(BitDepth::Four, ByteOrder::LittleEndian),
        Codec::NintendoHuffman(BitDepth::Four, ByteOrder::BigEndian),
        Codec::NintendoHuffman(BitDepth::Eight, ByteOrder::LittleEndian),
        Codec::NintendoHuffman(BitDepth::Eight, ByteOrder::BigEndian),
        Codec::NintendoRle,
        Codec::Deflate,
        Codec::Zlib,
    ];

    /// The format's name, without its settings
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lz10 => "lz10",
            Self::Lz11 => "lz11",
            Self::Lz60 => "lz60",
            Self::Lz77 => "lz77",
            Self::BackwardLz77 => "blz",
            Self::Crilayla => "crilayla",
            Self::Yaz0(..) => "yaz0",
            Self::Yay0(..) => "yay0",
            Self::Mio0(..) => "mio0",
            Self::LzEnc => "lzenc",
            Self::Lze => "lze",
            Self::LzEcd => "lzecd",
            Self::TalesOf(..) => "talesof",
            Self::SpikeChunsoft => "spikechunsoft",
            Self::StingLz => "stinglz",
            Self::Wp16 => "wp16",
            Self::PsLz => "pslz",
            Self::ShadeLz => "shadelz",
            Self::TaikoLz80 => "taikolz80",
            Self::TaikoLz81 => "taikolz81",
            Self::NintendoHuffman(..) => "huffman",
            Self::NintendoRle => "rle",
            Self::Deflate => "deflate",
            Self::Zlib => "zlib",
        }
    }

    /// Compress with the default parser and tree builder
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.compress_with(input, &LzParser::default(), &FrequencyTreeBuilder)
    }

    /// Compress with a caller chosen parser and tree builder. Formats without
    /// matches ignore `parser`; formats without Huffman trees ignore `builder`.
    pub fn compress_with(
        &self,
        input: &[u8],
        parser: &dyn MatchParser,
        builder: &dyn HuffmanTreeBuilder,
    ) -> Result<Vec<u8>> {
        debug!("Compressing {} bytes as {}", input.len(), self);
        match *self {
            Self::Lz10 => lz10::compress(input, parser),
            Self::Lz11 => lz11::compress(input, parser),
            Self::Lz60 => lz60::compress(input, parser),
            Self::Lz77 => lz77::compress(input, parser),
            Self::BackwardLz77 => backward_lz77::compress(input, parser),
            Self::Crilayla => crilayla::compress(input, parser),
            Self::Yaz0(order) => yaz0::compress(input, parser, order),
            Self::Yay0(order) => yay0::compress(input, parser, order),
            Self::Mio0(order) => mio0::compress(input, parser, order),
            Self::LzEnc => lz_enc::compress(input, parser),
            Self::Lze => lze::compress(input, parser),
            Self::LzEcd => lz_ecd::compress(input, parser),
            Self::TalesOf(variant) => tales_of::compress(input, parser, variant),
            Self::SpikeChunsoft => spike_chunsoft::compress(input, parser),
            Self::StingLz => sting_lz::compress(input, parser),
            Self::Wp16 => wp16::compress(input, parser),
            Self::PsLz => ps_lz::compress(input, parser),
            Self::ShadeLz => shade_lz::compress(input, parser),
            Self::TaikoLz80 => taiko_lz80::compress(input, parser),
            Self::TaikoLz81 => taiko_lz81::compress(input, parser, builder),
            Self::NintendoHuffman(depth, order) => nintendo_huffman::compress(input, depth, order, builder),
            Self::NintendoRle => nintendo_rle::compress(input, parser),
            Self::Deflate => deflate::compress(input, Framing::Raw),
            Self::Zlib => deflate::compress(input, Framing::Zlib),
        }
    }

    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        debug!("Decompressing {} bytes as {}", input.len(), self);
        match *self {
            Self::Lz10 => lz10::decompress(input),
            Self::Lz11 => lz11::decompress(input),
            Self::Lz60 => lz60::decompress(input),
            Self::Lz77 => lz77::decompress(input),
            Self::BackwardLz77 => backward_lz77::decompress(input),
            Self::Crilayla => crilayla::decompress(input),
            Self::Yaz0(order) => yaz0::decompress(input, order),
            Self::Yay0(order) => yay0::decompress(input, order),
            Self::Mio0(order) => mio0::decompress(input, order),
            Self::LzEnc => lz_enc::decompress(input),
            Self::Lze => lze::decompress(input),
            Self::LzEcd => lz_ecd::decompress(input),
            // the variant is read from the header
            Self::TalesOf(..) => tales_of::decompress(input),
            Self::SpikeChunsoft => spike_chunsoft::decompress(input),
            Self::StingLz => sting_lz::decompress(input),
            Self::Wp16 => wp16::decompress(input),
            Self::PsLz => ps_lz::decompress(input),
            Self::ShadeLz => shade_lz::decompress(input),
            Self::TaikoLz80 => taiko_lz80::decompress(input),
            Self::TaikoLz81 => taiko_lz81::decompress(input),
            Self::NintendoHuffman(_, order) => nintendo_huffman::decompress(input, order),
            Self::NintendoRle => nintendo_rle::decompress(input),
            Self::Deflate => deflate::decompress(input, Framing::Raw),
            Self::Zlib => deflate::decompress(input, Framing::Zlib),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Yaz0(order) | Self::Yay0(order) | Self::Mio0(order) => {
                write!(f, "{}-{}", self.name(), order)
            }
            Self::TalesOf(variant) => write!(f, "{}-{}", self.name(), variant),
            Self::NintendoHuffman(depth, order) => write!(f, "{}{}-{}", self.name(), depth, order),
            _ => f.write_str(self.name()),
        }
    }
}

fn parse_order(s: &str) -> Option<ByteOrder> {
    match s {
        "le" => Some(ByteOrder::LittleEndian),
        "be" => Some(ByteOrder::BigEndian),
        _ => None,
    }
}

/// Parses the names [`Display`](fmt::Display) produces, ignoring case. The
/// settings suffix may be left off: N64 formats default to big endian, Tales
/// to type 01, and Huffman to 8 bit little endian.
impl FromStr for Codec {
    type Err = KompressionError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, settings) = match lower.split_once('-') {
            Some((name, settings)) => (name, Some(settings)),
            None => (lower.as_str(), None),
        };
        let unknown = || KompressionError::UnknownCodec(s.to_string());

        let order = |default| match settings {
            None => Some(default),
            Some(settings) => parse_order(settings),
        };

        let codec = match name {
            "lz10" => Self::Lz10,
            "lz11" => Self::Lz11,
            "lz60" => Self::Lz60,
            "lz77" => Self::Lz77,
            "blz" => Self::BackwardLz77,
            "crilayla" => Self::Crilayla,
            "yaz0" => Self::Yaz0(order(ByteOrder::BigEndian).ok_or_else(unknown)?),
            "yay0" => Self::Yay0(order(ByteOrder::BigEndian).ok_or_else(unknown)?),
            "mio0" => Self::Mio0(order(ByteOrder::BigEndian).ok_or_else(unknown)?),
            "lzenc" => Self::LzEnc,
            "lze" => Self::Lze,
            "lzecd" => Self::LzEcd,
            "talesof" => Self::TalesOf(match settings {
                None | Some("01") => TalesOfVariant::Type01,
                Some("03") => TalesOfVariant::Type03,
                _ => return Err(unknown()),
            }),
            "spikechunsoft" => Self::SpikeChunsoft,
            "stinglz" => Self::StingLz,
            "wp16" => Self::Wp16,
            "pslz" => Self::PsLz,
            "shadelz" => Self::ShadeLz,
            "taikolz80" => Self::TaikoLz80,
            "taikolz81" => Self::TaikoLz81,
            "huffman" | "huffman4" | "huffman8" => {
                let depth = match name {
                    "huffman4" => BitDepth::Four,
                    _ => BitDepth::Eight,
                };
                Self::NintendoHuffman(depth, order(ByteOrder::LittleEndian).ok_or_else(unknown)?)
            }
            "rle" => Self::NintendoRle,
            "deflate" => Self::Deflate,
            "zlib" => Self::Zlib,
            _ => return Err(unknown()),
        };

        // settings on a codec that takes none
        if settings.is_some() && codec.to_string() == codec.name() {
            return Err(unknown());
        }
        Ok(codec)
    }
}

/// Compress data with a chosen [`Codec`], parser, and tree builder.
///
/// ```
/// # use kompression::{Codec, Compressor, LzParser};
/// let parser = LzParser::greedy();
/// let packed = Compressor::new(Codec::Lz10)
///     .with_parser(&parser)
///     .compress(b"ABBACABBCADFEGABA")
///     .unwrap();
/// assert_eq!(Codec::Lz10.decompress(&packed).unwrap(), b"ABBACABBCADFEGABA");
/// ```
///
/// Without a parser or tree builder, the defaults [`LzParser::default()`] and
/// [`FrequencyTreeBuilder`] are used.
pub struct Compressor<'a> {
    codec: Codec,
    parser: Option<&'a dyn MatchParser>,
    tree_builder: Option<&'a dyn HuffmanTreeBuilder>,
}

impl<'a> Compressor<'a> {
    #[inline]
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            parser: None,
            tree_builder: None,
        }
    }

    #[inline]
    pub fn codec(&mut self, codec: Codec) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Choose the matches with `parser` instead of the default [`LzParser`]
    #[inline]
    pub fn with_parser(&mut self, parser: &'a dyn MatchParser) -> &mut Self {
        self.parser = Some(parser);
        self
    }

    /// Build Huffman trees with `builder`, for example a [`FixedTree`](crate::FixedTree)
    #[inline]
    pub fn with_tree_builder(&mut self, builder: &'a dyn HuffmanTreeBuilder) -> &mut Self {
        self.tree_builder = Some(builder);
        self
    }

    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let default_parser = LzParser::default();
        let parser: &dyn MatchParser = match self.parser {
            Some(parser) => parser,
            None => &default_parser,
        };
        let builder: &dyn HuffmanTreeBuilder = match self.tree_builder {
            Some(builder) => builder,
            None => &FrequencyTreeBuilder,
        };
        self.codec.compress_with(input, parser, builder)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::huffman::FixedTree;
    use crate::matching::{FixedMatches, Match};

    #[test]
    fn names_round_trip() -> Result<()> {
        for codec in Codec::ALL.iter() {
            let name = codec.to_string();
            assert_eq!(name.parse::<Codec>()?, *codec, "{}", name);
        }
        Ok(())
    }

    #[test]
    fn short_and_odd_names() -> Result<()> {
        assert_eq!("YAZ0".parse::<Codec>()?, Codec::Yaz0(ByteOrder::BigEndian));
        assert_eq!("mio0-le".parse::<Codec>()?, Codec::Mio0(ByteOrder::LittleEndian));
        assert_eq!(
            "huffman4-be".parse::<Codec>()?,
            Codec::NintendoHuffman(BitDepth::Four, ByteOrder::BigEndian)
        );
        assert_eq!("talesof-03".parse::<Codec>()?, Codec::TalesOf(TalesOfVariant::Type03));
        assert_eq!(Codec::TalesOf(TalesOfVariant::Type03).to_string(), "talesof-03");

        for bad in ["lz12", "lz10-le", "yaz0-xx", "talesof-02", ""] {
            assert!(
                matches!(bad.parse::<Codec>(), Err(KompressionError::UnknownCodec(_))),
                "{}",
                bad
            );
        }
        Ok(())
    }

    #[test]
    fn compressor_uses_the_given_parser_and_tree() -> Result<()> {
        let input = b"AAAAAAAAAA";
        let parser = FixedMatches(vec![Match::new(1, 1, 9)]);
        let packed = Compressor::new(Codec::Lz10).with_parser(&parser).compress(input)?;
        assert_eq!(packed, vec![0x10, 0x0A, 0x00, 0x00, 0x80, 0x41, 0x60, 0x00]);

        let tree: FixedTree = "(65, 66)".parse()?;
        let huffman = Codec::NintendoHuffman(BitDepth::Eight, ByteOrder::BigEndian);
        let packed = Compressor::new(huffman).with_tree_builder(&tree).compress(b"ABBA")?;
        assert_eq!(&packed[4..8], &[1, 0xC0, b'A', b'B']);
        assert_eq!(&packed[8..], &[0b0110_0000, 0, 0, 0]);
        assert_eq!(huffman.decompress(&packed)?, b"ABBA");
        Ok(())
    }
}
