//! The match model shared by every LZ codec.
//!
//! An encoder never searches for matches itself. It describes what its format
//! can store with [`ParseOptions`], scores literals and matches with its own
//! [`PriceCalculator`], and hands both to a [`MatchParser`]. The resulting list
//! of [`Match`]es is then walked once, alongside the input, as a sequence of
//! [`Token`]s.

use crate::errors::{KompressionError, Result};

/// A back-reference into already decoded data.
///
/// `displacement` is the distance from `position` back to the first copied
/// byte. A displacement of `0` marks a run: `length` copies of the byte at
/// `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    pub position: usize,
    pub displacement: usize,
    pub length: usize,
}

impl Match {
    pub const fn new(position: usize, displacement: usize, length: usize) -> Self {
        Self {
            position,
            displacement,
            length,
        }
    }

    #[inline]
    pub const fn is_run(&self) -> bool {
        self.displacement == 0
    }

    #[inline]
    pub const fn end(&self) -> usize {
        self.position + self.length
    }
}

/// The lengths and displacements one encoding class of a format can hold.
///
/// A format with several match encodings (short and long displacements, or a
/// run-length form next to a copy form) lists one `FindLimits` per encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindLimits {
    pub min_length: usize,
    pub max_length: usize,
    pub min_displacement: usize,
    pub max_displacement: usize,
}

impl FindLimits {
    /// Limits for back-references into the history.
    pub const fn history(
        min_length: usize,
        max_length: usize,
        min_displacement: usize,
        max_displacement: usize,
    ) -> Self {
        Self {
            min_length,
            max_length,
            min_displacement,
            max_displacement,
        }
    }

    /// Limits for runs of a single repeated byte.
    pub const fn run(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
            min_displacement: 0,
            max_displacement: 0,
        }
    }

    #[inline]
    pub const fn is_run(&self) -> bool {
        self.max_displacement == 0
    }

    /// Does `m` fit these limits?
    pub fn allows(&self, m: &Match) -> bool {
        let length_ok = (self.min_length..=self.max_length).contains(&m.length);
        if self.is_run() {
            length_ok && m.is_run()
        } else {
            length_ok && (self.min_displacement..=self.max_displacement).contains(&m.displacement)
        }
    }
}

/// Everything a [`MatchParser`] needs to know about a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub limits: Vec<FindLimits>,
    /// Bytes of zero-filled history available before position 0.
    pub pre_buffer_size: usize,
    /// Positions, lengths and displacements are multiples of this.
    pub unit_size: usize,
    /// Literal units the format always stores directly after a match.
    pub skip_after_match: usize,
}

impl ParseOptions {
    pub fn new(limits: Vec<FindLimits>) -> Self {
        Self {
            limits,
            pre_buffer_size: 0,
            unit_size: 1,
            skip_after_match: 0,
        }
    }

    pub fn with_pre_buffer(mut self, size: usize) -> Self {
        self.pre_buffer_size = size;
        self
    }

    pub fn with_unit_size(mut self, size: usize) -> Self {
        self.unit_size = size;
        self
    }

    pub fn with_skip_after_match(mut self, units: usize) -> Self {
        self.skip_after_match = units;
        self
    }

    /// The first set of limits that can hold `m`, if any.
    pub fn limits_for(&self, m: &Match) -> Option<&FindLimits> {
        self.limits.iter().find(|l| l.allows(m))
    }
}

/// Cost model used to choose between a literal and a competing match.
///
/// Prices are in bits. `literal_run` is the number of literals directly before
/// the one being priced, which lets formats that open literal runs with an
/// opcode charge for it once.
pub trait PriceCalculator {
    fn literal_price(&self, value: u8, literal_run: usize) -> u32;
    fn match_price(&self, displacement: usize, length: usize) -> u32;
}

/// Produces the ordered list of matches an encoder will store.
pub trait MatchParser {
    fn parse_matches(
        &self,
        input: &[u8],
        options: &ParseOptions,
        prices: &dyn PriceCalculator,
    ) -> Vec<Match>;
}

/// A [`MatchParser`] that replays a fixed list of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedMatches(pub Vec<Match>);

impl MatchParser for FixedMatches {
    fn parse_matches(&self, _: &[u8], _: &ParseOptions, _: &dyn PriceCalculator) -> Vec<Match> {
        self.0.clone()
    }
}

/// Check that `matches` can be walked over an input of `len` bytes.
///
/// This does not check that the referenced bytes are equal; it guards the
/// structural invariants an encoder relies on while writing.
pub fn check_matches(matches: &[Match], len: usize, options: &ParseOptions) -> Result<()> {
    let mut cursor = 0;
    let skip = options.skip_after_match * options.unit_size;

    for m in matches {
        let err = |why: &str| -> Result<()> {
            Err(KompressionError::InvalidMatches(format!("{:?} {}", m, why)))
        };

        if m.length == 0 {
            return err("is empty");
        }
        if m.position < cursor {
            return err("overlaps the previous match");
        }
        if m.end() + skip > len {
            return err("runs past the end of the input");
        }
        if m.displacement > m.position + options.pre_buffer_size {
            return err("reaches before the start of the history");
        }
        let unit = options.unit_size.max(1);
        if m.position % unit != 0 || m.length % unit != 0 || m.displacement % unit != 0 {
            return err("is not aligned to the unit size");
        }
        cursor = m.end() + skip;
    }

    Ok(())
}

/// One step of the walk over an input and its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A maximal run of bytes between matches.
    Literals(&'a [u8]),
    Match(Match),
}

/// Iterator over the [`Token`]s of `input` given a checked, ordered match list.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    input: &'a [u8],
    matches: &'a [Match],
    cursor: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(input: &'a [u8], matches: &'a [Match]) -> Self {
        Self {
            input,
            matches,
            cursor: 0,
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let next_match = self.matches.first().copied();
        let literal_end = next_match.map_or(self.input.len(), |m| m.position);

        if self.cursor < literal_end {
            let run = &self.input[self.cursor..literal_end];
            self.cursor = literal_end;
            return Some(Token::Literals(run));
        }

        let m = next_match?;
        self.matches = &self.matches[1..];
        self.cursor = m.end();
        Some(Token::Match(m))
    }
}

/// Copy `length` bytes from `displacement` bytes back in `out`, one byte at a
/// time so that overlapping copies repeat the pattern.
pub(crate) fn copy_match(out: &mut Vec<u8>, displacement: usize, length: usize) -> Result<()> {
    if displacement == 0 || displacement > out.len() {
        return Err(KompressionError::BadLookBack(displacement, out.len()));
    }

    let start = out.len() - displacement;
    out.reserve(length);
    for i in start..start + length {
        let byte = out[i];
        out.push(byte);
    }

    Ok(())
}

/// Append `length` copies of `value`.
pub(crate) fn fill_run(out: &mut Vec<u8>, value: u8, length: usize) {
    out.resize(out.len() + length, value);
}
