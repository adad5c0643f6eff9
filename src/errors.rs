use crate::matching::Match;
use std::{io, num::ParseIntError};
use thiserror::Error;

/// Possible errors that arise from compressing data into one of the supported
/// containers, or from decompressing a container back into its original bytes.
#[derive(Error, Debug)]
pub enum KompressionError {
    #[error("{codec} can store at most {max} bytes, but the input is {size} bytes")]
    InputTooLarge {
        codec: &'static str,
        size: usize,
        max: usize,
    },

    #[error("{codec} needs at least {min} bytes of input, but the input is {size} bytes")]
    InputTooSmall {
        codec: &'static str,
        size: usize,
        min: usize,
    },

    #[error("Invalid header for {0} data")]
    InvalidHeader(&'static str),

    #[error("{codec} variant 0x{value:02x} is invalid and not supported")]
    UnsupportedVariant { codec: &'static str, value: u8 },

    #[error("Bad lookback: moved back {0} with only {1} bytes decoded")]
    BadLookBack(usize, usize),

    #[error("Decoded {found} bytes, but the header declares {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Compressed data ended unexpectedly")]
    UnexpectedEof,

    #[error("Bad encoding of a Huffman tree")]
    BadTreeEncoding,

    #[error("Huffman tree has no code for symbol {0}")]
    MissingCode(u16),

    #[error("Huffman tree is deeper than {0} levels")]
    TreeTooDeep(usize),

    #[error("Huffman tree with {0} internal nodes cannot be laid out with 6-bit child offsets")]
    TreeLayout(usize),

    #[error("{codec} cannot encode {found:?}")]
    UnencodableMatch { codec: &'static str, found: Match },

    #[error("Match list is invalid for this input: {0}")]
    InvalidMatches(String),

    #[error(transparent)]
    TreeString(#[from] TreeParseError),

    #[error("Unknown codec \"{0}\"")]
    UnknownCodec(String),

    #[error("{0}")]
    Io(io::Error),
}

/// Errors from parsing a user provided Huffman tree string, like `(1, (4, 7))`
#[derive(Error, Debug)]
pub enum TreeParseError {
    #[error("Couldn't parse number at position {1}")]
    LexNum(#[source] ParseIntError, usize),

    #[error("Unexpected character '{0}' at position {1}")]
    LexUnexp(char, usize),

    #[error("Unexpected {0} at position {1}")]
    ParseUnexp(&'static str, usize),

    #[error("Tree string ended early")]
    ParseUnexpEnd,
}

impl From<io::Error> for KompressionError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => KompressionError::UnexpectedEof,
            _ => KompressionError::Io(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, KompressionError>;
