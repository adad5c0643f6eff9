use log::{debug, trace};
use smallvec::{smallvec, SmallVec};

use crate::matching::{Match, MatchParser, ParseOptions, PriceCalculator};

const NIL: usize = usize::MAX;
const HASH_SIZE: usize = 1 << 16;
/// Match lengths past `min_length + LENGTH_SPREAD` are only priced at their maximum
const LENGTH_SPREAD: usize = 32;

/// How `LzParser` chooses between the matches it finds
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParseStrategy {
    /// Cheapest total price over the whole input, as scored by the codec
    Optimal,
    /// Longest match at each position, if it is cheaper than the literals it covers
    Greedy,
}

/// Configure the match search of [`LzParser`]
///
/// By [`default`](ParserSettings::default):
///
/// | Parameter   | Field       | Value   |
/// | ----------- | ----------- | :-----: |
/// | Strategy    | strategy    | Optimal |
/// | Chain Depth | chain_depth | 256     |
/// | Nice Match  | nice_length | 0x80    |
///
/// `chain_depth` bounds how many earlier occurrences of a two byte prefix are
/// compared at each position. A match of at least `nice_length` bytes is taken
/// as soon as it is found, and no matches are searched inside it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ParserSettings {
    pub strategy: ParseStrategy,
    pub chain_depth: usize,
    pub nice_length: usize,
}

impl ParserSettings {
    pub const fn new(strategy: ParseStrategy, chain_depth: usize, nice_length: usize) -> Self {
        Self {
            strategy,
            chain_depth,
            nice_length,
        }
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            strategy: ParseStrategy::Optimal,
            chain_depth: 256,
            nice_length: 0x80,
        }
    }
}

/// The default [`MatchParser`]: hash chain history search, run detection, and
/// an optimal or greedy choice between them.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LzParser {
    settings: ParserSettings,
}

impl LzParser {
    pub const fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    pub fn greedy() -> Self {
        Self::new(ParserSettings {
            strategy: ParseStrategy::Greedy,
            ..ParserSettings::default()
        })
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }
}

impl MatchParser for LzParser {
    fn parse_matches(
        &self,
        input: &[u8],
        options: &ParseOptions,
        prices: &dyn PriceCalculator,
    ) -> Vec<Match> {
        if input.is_empty() || options.limits.is_empty() {
            return Vec::new();
        }

        let finder = Finder::new(input, options, self.settings.chain_depth);
        let matches = match self.settings.strategy {
            ParseStrategy::Optimal => optimal_parse(&finder, self.settings.nice_length, prices),
            ParseStrategy::Greedy => greedy_parse(&finder, prices),
        };

        debug!(
            "{:?} parse: {} matches over {} bytes",
            self.settings.strategy,
            matches.len(),
            input.len()
        );
        matches
    }
}

/// A match found at one position, with the minimum length of the limits it was found for
#[derive(Debug, Clone, Copy)]
struct Candidate {
    found: Match,
    min_length: usize,
}

impl Candidate {
    /// Lengths worth pricing: every length near the minimum, then the longest
    fn lengths(&self, unit: usize) -> impl Iterator<Item = usize> {
        let longest = self.found.length;
        let spread_end = longest.min(self.min_length + LENGTH_SPREAD);
        (self.min_length..=spread_end)
            .step_by(unit)
            .chain(std::iter::once(longest).filter(move |&l| l > spread_end))
    }
}

type Candidates = SmallVec<[Candidate; 8]>;

/// Chains of earlier positions sharing the same two byte prefix
struct HashChains<'a> {
    data: &'a [u8],
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> HashChains<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; data.len()],
        }
    }

    fn key(&self, at: usize) -> Option<usize> {
        let pair = self.data.get(at..at + 2)?;
        Some((pair[0] as usize) << 8 | pair[1] as usize)
    }

    fn insert(&mut self, at: usize) {
        if let Some(key) = self.key(at) {
            self.prev[at] = self.head[key];
            self.head[key] = at;
        }
    }

    /// Earlier positions with the same prefix as `at`, nearest first
    fn candidates(&self, at: usize, depth: usize) -> impl Iterator<Item = usize> + '_ {
        let first = self.key(at).map_or(NIL, |key| self.head[key]);
        std::iter::successors(Some(first), move |&c| self.prev.get(c).copied())
            .take_while(|&c| c != NIL)
            .take(depth)
    }
}

struct Finder<'a> {
    input: &'a [u8],
    /// zero filled pre-buffer followed by `input`
    data: Vec<u8>,
    options: &'a ParseOptions,
    chain_depth: usize,
    max_displacement: usize,
    max_length: usize,
    has_runs: bool,
}

impl<'a> Finder<'a> {
    fn new(input: &'a [u8], options: &'a ParseOptions, chain_depth: usize) -> Self {
        let mut data = vec![0; options.pre_buffer_size];
        data.extend_from_slice(input);

        let history = options.limits.iter().filter(|l| !l.is_run());
        let max_displacement = history.clone().map(|l| l.max_displacement).max().unwrap_or(0);
        let max_length = history.map(|l| l.max_length).max().unwrap_or(0);
        let has_runs = options.limits.iter().any(|l| l.is_run());

        Self {
            input,
            data,
            options,
            chain_depth,
            max_displacement,
            max_length,
            has_runs,
        }
    }

    #[inline]
    fn unit(&self) -> usize {
        self.options.unit_size.max(1)
    }

    /// Bytes a match starting at input position `pos` may cover
    fn available(&self, pos: usize) -> usize {
        let skip = self.options.skip_after_match * self.unit();
        (self.input.len() - pos).saturating_sub(skip)
    }

    /// The longest match for every limit at input position `pos`
    fn find(&self, chains: &HashChains, pos: usize, found: &mut Candidates) {
        found.clear();
        let unit = self.unit();
        let avail = self.available(pos);
        if avail == 0 {
            return;
        }

        let at = self.options.pre_buffer_size + pos;
        let limits = &self.options.limits;
        let mut best: SmallVec<[Option<(usize, usize)>; 4]> = smallvec![None; limits.len()];

        if self.max_displacement > 0 {
            let longest = self.max_length.min(avail);
            for c in chains.candidates(at, self.chain_depth) {
                let displacement = at - c;
                if displacement > self.max_displacement {
                    break;
                }
                if displacement % unit != 0 {
                    continue;
                }

                let length = common_prefix(&self.data, c, at, longest);
                for (slot, limit) in best.iter_mut().zip(limits.iter()) {
                    if limit.is_run()
                        || !(limit.min_displacement..=limit.max_displacement).contains(&displacement)
                    {
                        continue;
                    }
                    let length = length.min(limit.max_length);
                    let length = length - length % unit;
                    if length >= limit.min_length && slot.map_or(true, |(_, l)| length > l) {
                        *slot = Some((displacement, length));
                    }
                }
            }
        }

        if self.has_runs {
            let value = self.input[pos];
            let run = self.input[pos..pos + avail]
                .iter()
                .take_while(|&&b| b == value)
                .count();
            for (slot, limit) in best.iter_mut().zip(limits.iter()) {
                if !limit.is_run() {
                    continue;
                }
                let length = run.min(limit.max_length);
                let length = length - length % unit;
                if length >= limit.min_length {
                    *slot = Some((0, length));
                }
            }
        }

        for (slot, limit) in best.iter().zip(limits.iter()) {
            if let Some((displacement, length)) = *slot {
                found.push(Candidate {
                    found: Match::new(pos, displacement, length),
                    min_length: limit.min_length,
                });
            }
        }
    }
}

/// Length of the common run of `data[from..]` and `data[at..]`, up to `max`
#[inline]
fn common_prefix(data: &[u8], from: usize, at: usize, max: usize) -> usize {
    data[at..]
        .iter()
        .take(max)
        .enumerate()
        .take_while(|&(k, &b)| data[from + k] == b)
        .count()
}

fn literal_cost(input: &[u8], start: usize, count: usize, run: usize, prices: &dyn PriceCalculator) -> u64 {
    input[start..start + count]
        .iter()
        .enumerate()
        .map(|(k, &b)| prices.literal_price(b, run + k) as u64)
        .sum()
}

#[derive(Debug, Clone, Copy)]
struct Step {
    cost: u64,
    /// literals since the last match
    run: usize,
    from: usize,
    via: Option<Match>,
}

impl Step {
    const UNREACHED: Self = Self {
        cost: u64::MAX,
        run: 0,
        from: 0,
        via: None,
    };
}

fn relax(steps: &mut [Step], to: usize, candidate: Step) {
    if candidate.cost < steps[to].cost {
        steps[to] = candidate;
    }
}

fn optimal_parse(finder: &Finder, nice_length: usize, prices: &dyn PriceCalculator) -> Vec<Match> {
    let input = finder.input;
    let n = input.len();
    let unit = finder.unit();
    let skip = finder.options.skip_after_match * unit;

    let mut chains = HashChains::new(&finder.data);
    for at in 0..finder.options.pre_buffer_size {
        chains.insert(at);
    }

    let mut steps = vec![Step::UNREACHED; n + 1];
    steps[0].cost = 0;
    let mut found = Candidates::new();
    let mut skip_until = 0;

    let mut pos = 0;
    while pos < n {
        let here = steps[pos];
        let step = unit.min(n - pos);

        let cost = here.cost + literal_cost(input, pos, step, here.run, prices);
        relax(
            &mut steps,
            pos + step,
            Step {
                cost,
                run: here.run + step,
                from: pos,
                via: None,
            },
        );

        if pos >= skip_until {
            finder.find(&chains, pos, &mut found);

            let nice = found
                .iter()
                .filter(|c| c.found.length >= nice_length)
                .max_by_key(|c| c.found.length)
                .copied();
            if let Some(c) = nice {
                found.clear();
                found.push(Candidate {
                    min_length: c.found.length,
                    ..c
                });
                skip_until = c.found.end();
            }

            for c in &found {
                for length in c.lengths(unit) {
                    let end = pos + length;
                    let cost = here.cost
                        + prices.match_price(c.found.displacement, length) as u64
                        + literal_cost(input, end, skip, 0, prices);
                    relax(
                        &mut steps,
                        end + skip,
                        Step {
                            cost,
                            run: 0,
                            from: pos,
                            via: Some(Match::new(pos, c.found.displacement, length)),
                        },
                    );
                }
            }
        }

        let base = finder.options.pre_buffer_size + pos;
        for at in base..base + step {
            chains.insert(at);
        }
        pos += step;
    }

    let mut matches = Vec::new();
    let mut at = n;
    while at > 0 {
        let step = steps[at];
        if let Some(m) = step.via {
            matches.push(m);
        }
        at = step.from;
    }
    matches.reverse();

    trace!("optimal parse cost: {} bits", steps[n].cost);
    matches
}

fn greedy_parse(finder: &Finder, prices: &dyn PriceCalculator) -> Vec<Match> {
    let input = finder.input;
    let n = input.len();
    let unit = finder.unit();
    let skip = finder.options.skip_after_match * unit;

    let mut chains = HashChains::new(&finder.data);
    for at in 0..finder.options.pre_buffer_size {
        chains.insert(at);
    }

    let mut matches = Vec::new();
    let mut found = Candidates::new();
    let mut run = 0;
    let mut pos = 0;
    while pos < n {
        finder.find(&chains, pos, &mut found);

        let best = found
            .iter()
            .map(|c| c.found)
            .max_by(|a, b| {
                a.length.cmp(&b.length).then_with(|| {
                    prices
                        .match_price(b.displacement, b.length)
                        .cmp(&prices.match_price(a.displacement, a.length))
                })
            })
            .filter(|m| {
                (prices.match_price(m.displacement, m.length) as u64)
                    < literal_cost(input, pos, m.length, run, prices)
            });

        let advance = match best {
            Some(m) => {
                matches.push(m);
                run = 0;
                m.length + skip
            }
            None => {
                let step = unit.min(n - pos);
                run += step;
                step
            }
        };

        let base = finder.options.pre_buffer_size + pos;
        for at in base..base + advance {
            chains.insert(at);
        }
        pos += advance;
    }

    matches
}
