//! Raw deflate and zlib streams, handed straight to `flate2`.

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;
use std::io::{Read, Write};

use crate::errors::Result;

/// Which framing wraps the deflate stream
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Framing {
    Raw,
    Zlib,
}

pub fn compress(input: &[u8], framing: Framing) -> Result<Vec<u8>> {
    let out = match framing {
        Framing::Raw => {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(input)?;
            enc.finish()?
        }
        Framing::Zlib => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(input)?;
            enc.finish()?
        }
    };

    debug!("{:?} deflate: {} bytes into {}", framing, input.len(), out.len());
    Ok(out)
}

pub fn decompress(input: &[u8], framing: Framing) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match framing {
        Framing::Raw => DeflateDecoder::new(input).read_to_end(&mut out)?,
        Framing::Zlib => ZlibDecoder::new(input).read_to_end(&mut out)?,
    };
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn both_framings_round_trip() -> Result<()> {
        let input = b"deflate deflate deflate deflate".repeat(10);
        for framing in [Framing::Raw, Framing::Zlib] {
            let packed = compress(&input, framing)?;
            assert!(packed.len() < input.len());
            assert_eq!(decompress(&packed, framing)?, input);
        }
        Ok(())
    }

    #[test]
    fn zlib_has_a_header() -> Result<()> {
        let packed = compress(b"", Framing::Zlib)?;
        assert_eq!(packed[0], 0x78);
        assert!(decompress(&[0x12, 0x34], Framing::Zlib).is_err());
        Ok(())
    }
}
