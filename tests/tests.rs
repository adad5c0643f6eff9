use kompression::{
    ByteOrder, Codec, Compressor, FixedMatches, FrequencyTreeBuilder, HuffmanTreeBuilder, KompressionError, LzParser,
    Match,
};

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Lorem ipsum dolor sit amet.";

fn pseudo_random(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

fn samples() -> Vec<(&'static str, Vec<u8>)> {
    let mut mixed = LOREM.as_bytes().repeat(3);
    mixed.extend(vec![0u8; 300]);
    mixed.extend(pseudo_random(500, 7));
    mixed.extend(LOREM.as_bytes());

    vec![
        ("empty", Vec::new()),
        ("one byte", vec![0x5A]),
        ("zeros", vec![0; 1000]),
        ("all bytes", (0..=255).collect()),
        ("lorem", LOREM.as_bytes().repeat(8)),
        ("random", pseudo_random(3000, 1)),
        ("mixed", mixed),
    ]
}

#[test]
fn every_codec_round_trips() {
    for codec in Codec::ALL.iter() {
        for (name, input) in samples() {
            if *codec == Codec::Crilayla && input.len() < 0x100 {
                continue;
            }

            let packed = codec
                .compress(&input)
                .unwrap_or_else(|e| panic!("{} failed to compress {}: {}", codec, name, e));
            let unpacked = codec
                .decompress(&packed)
                .unwrap_or_else(|e| panic!("{} failed to decompress {}: {}", codec, name, e));
            assert_eq!(unpacked, input, "{} round trip of {}", codec, name);
        }
    }
}

#[test]
fn greedy_parsing_round_trips() -> Result<(), KompressionError> {
    let parser = LzParser::greedy();
    let input = LOREM.as_bytes().repeat(4);
    for codec in Codec::ALL.iter() {
        let packed = Compressor::new(*codec).with_parser(&parser).compress(&input)?;
        assert_eq!(codec.decompress(&packed)?, input, "{}", codec);
    }
    Ok(())
}

#[test]
fn repetitive_data_shrinks() -> Result<(), KompressionError> {
    let input = LOREM.as_bytes().repeat(8);
    // text has no byte runs for RLE to use
    for codec in Codec::ALL.iter().filter(|&&c| c != Codec::NintendoRle) {
        let packed = codec.compress(&input)?;
        assert!(packed.len() < input.len(), "{} did not shrink", codec);
    }
    Ok(())
}

#[test]
fn compression_and_decompression_are_deterministic() -> Result<(), KompressionError> {
    let input = pseudo_random(2000, 99);
    for codec in Codec::ALL.iter() {
        let first = codec.compress(&input)?;
        assert_eq!(first, codec.compress(&input)?, "{}", codec);
        assert_eq!(codec.decompress(&first)?, codec.decompress(&first)?, "{}", codec);
    }
    Ok(())
}

#[test]
fn lz10_run_of_ten() -> Result<(), KompressionError> {
    let packed = kompression::compress(b"AAAAAAAAAA", Codec::Lz10)?;
    assert_eq!(packed, vec![0x10, 0x0A, 0x00, 0x00, 0x80, 0x41, 0x60, 0x00]);
    assert_eq!(kompression::decompress(&packed, Codec::Lz10)?, b"AAAAAAAAAA");
    Ok(())
}

#[test]
fn lz10_flag_bytes_fill_at_eight_tokens() -> Result<(), KompressionError> {
    let literals_only = FixedMatches::default();
    let input: Vec<u8> = (1..=16).collect();
    let packed_with = |len: usize| {
        Compressor::new(Codec::Lz10)
            .with_parser(&literals_only)
            .compress(&input[..len])
    };

    let eight = packed_with(8)?;
    assert_eq!(eight.len(), 4 + 1 + 8);
    assert_eq!(eight[4], 0xFF);

    let nine = packed_with(9)?;
    assert_eq!(nine.len(), 4 + 1 + 8 + 1 + 1);
    assert_eq!((nine[4], nine[13], nine[14]), (0xFF, 0x80, 9));

    let sixteen = packed_with(16)?;
    assert_eq!(sixteen.len(), 4 + 2 * 9);
    assert_eq!((sixteen[4], sixteen[13]), (0xFF, 0xFF));

    for packed in [eight, nine, sixteen] {
        let size = packed[1] as usize;
        assert_eq!(Codec::Lz10.decompress(&packed)?, &input[..size]);
    }
    Ok(())
}

#[test]
fn lz11_length_boundaries() -> Result<(), KompressionError> {
    let cases: [(usize, &[u8]); 5] = [
        (0x10, &[0xF0, 0x00]),
        (0x11, &[0x00, 0x00, 0x00]),
        (0x110, &[0x0F, 0xF0, 0x00]),
        (0x111, &[0x10, 0x00, 0x00, 0x00]),
        (0x10110, &[0x1F, 0xFF, 0xF0, 0x00]),
    ];

    for (length, encoded) in cases.iter() {
        let input = vec![0x33; 1 + length];
        let parser = FixedMatches(vec![Match::new(1, 1, *length)]);
        let packed = Compressor::new(Codec::Lz11).with_parser(&parser).compress(&input)?;

        assert_eq!(&packed[4..6], &[0x80, 0x33]);
        assert_eq!(&packed[6..], *encoded, "length {:#x}", length);
        assert_eq!(Codec::Lz11.decompress(&packed)?, input);
    }
    Ok(())
}

#[test]
fn crilayla_header_fields() -> Result<(), KompressionError> {
    let input = LOREM.as_bytes().repeat(6);
    let packed = Codec::Crilayla.compress(&input)?;

    assert_eq!(&packed[..8], b"CRILAYLA");
    let field = |at: usize| u32::from_le_bytes([packed[at], packed[at + 1], packed[at + 2], packed[at + 3]]);
    assert_eq!(field(8) as usize, input.len() - 0x100);
    assert_eq!(field(12) as usize, packed.len() - 0x10 - 0x100);
    assert_eq!(&packed[packed.len() - 0x100..], &input[..0x100]);

    assert!(matches!(
        Codec::Crilayla.compress(&input[..0xFF]),
        Err(KompressionError::InputTooSmall { .. })
    ));
    Ok(())
}

/// Every leaf of a serialized Huffman table with its code, in table order
fn table_leaves(table: &[u8]) -> Vec<(u8, u64, u32)> {
    fn walk(table: &[u8], address: usize, code: u64, len: u32, leaves: &mut Vec<(u8, u64, u32)>) {
        let node = table[address] as usize;
        for bit in 0..2 {
            let child = (address & !1) + 2 * (node & 0x3F) + 2 + bit;
            let child_code = code << 1 | bit as u64;
            if node & (0x80 >> bit) != 0 {
                leaves.push((table[child], child_code, len + 1));
            } else {
                walk(table, child, child_code, len + 1, leaves);
            }
        }
    }

    let mut leaves = Vec::new();
    walk(table, 1, 0, 0, &mut leaves);
    leaves
}

#[test]
fn huffman_tables_are_stable_and_complete() -> Result<(), KompressionError> {
    let input = LOREM.as_bytes().repeat(2);
    let codec: Codec = "huffman8-le".parse()?;
    let packed = Compressor::new(codec)
        .with_tree_builder(&FrequencyTreeBuilder)
        .compress(&input)?;
    assert_eq!(packed, codec.compress(&input)?);

    let mut frequencies = vec![0u64; 256];
    for &b in &input {
        frequencies[b as usize] += 1;
    }
    let tree = FrequencyTreeBuilder.build(&frequencies).unwrap();
    let codes = tree.code_table(256)?;

    let mut distinct: Vec<u8> = input.clone();
    distinct.sort_unstable();
    distinct.dedup();

    // every leaf in the table is a symbol of the input, reached by its code
    let table_len = (packed[4] as usize + 1) * 2;
    assert_eq!(table_len, (2 * distinct.len() + 3) & !3);
    let leaves = table_leaves(&packed[4..4 + table_len]);
    assert_eq!(leaves.len(), distinct.len());
    for (symbol, code, len) in leaves {
        let expected = codes[symbol as usize].unwrap_or_else(|| panic!("{} is not in the tree", symbol));
        assert_eq!((code, len), (expected.code, expected.bitlen()), "symbol {}", symbol);
    }

    let mut symbols: Vec<u8> = table_leaves(&packed[4..4 + table_len]).iter().map(|l| l.0).collect();
    symbols.sort_unstable();
    assert_eq!(symbols, distinct);
    assert_eq!(codec.decompress(&packed)?, input);
    Ok(())
}

#[test]
fn oversized_nintendo_inputs_are_rejected() {
    let input = vec![0u8; 0x100_0000];
    for codec in [Codec::Lz10, Codec::NintendoRle] {
        assert!(matches!(
            codec.compress(&input),
            Err(KompressionError::InputTooLarge { max: 0xFF_FFFF, .. })
        ));
    }
}

#[test]
fn huge_declared_sizes_fail_cleanly() {
    let mut yaz0 = b"Yaz0\xFF\xFF\xFF\xF0".to_vec();
    yaz0.extend_from_slice(&[0; 8]);
    yaz0.push(0xFF);
    assert!(Codec::Yaz0(ByteOrder::BigEndian).decompress(&yaz0).is_err());

    let lz10 = [0x10, 0xFF, 0xFF, 0xFF, 0x00];
    assert!(Codec::Lz10.decompress(&lz10).is_err());
}

#[test]
fn wrong_magic_is_an_invalid_header() {
    let packed = Codec::Yaz0(ByteOrder::BigEndian).compress(LOREM.as_bytes()).unwrap();
    for codec in [Codec::Yay0(ByteOrder::BigEndian), Codec::Mio0(ByteOrder::BigEndian), Codec::Lze] {
        assert!(
            matches!(codec.decompress(&packed), Err(KompressionError::InvalidHeader(_))),
            "{}",
            codec
        );
    }
}

#[test]
fn truncated_data_is_an_error() -> Result<(), KompressionError> {
    let input = LOREM.as_bytes().repeat(2);
    // these read to the end of whatever they are given
    let unsized_streams = [Codec::Lz77, Codec::BackwardLz77, Codec::Deflate, Codec::Zlib];
    for codec in Codec::ALL.iter().filter(|&&c| !unsized_streams.contains(&c)) {
        let packed = codec.compress(&input)?;
        let cut = &packed[..packed.len() / 2];
        assert!(codec.decompress(cut).is_err(), "{}", codec);
    }
    Ok(())
}
