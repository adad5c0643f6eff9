//! Huffman trees shared by the entropy coded formats.
//!
//! Encoders count symbol frequencies and ask a [`HuffmanTreeBuilder`] for a
//! tree. The default [`FrequencyTreeBuilder`] is deterministic: nodes are
//! merged lowest `(frequency, creation order)` first, and the first node popped
//! becomes child 0. A [`FixedTree`] replays a tree given as a string such as
//! `((7, ((4, 1), 5)), ((10, 6), 9))`.

use crate::errors::{KompressionError, Result, TreeParseError};
use crate::format::{LinearTree, TreeEntry};
use std::{cmp::Ordering, collections::BinaryHeap, fmt, mem::size_of, str::FromStr};

/// A leaf holding a symbol, or a node whose first child is reached by a `0` bit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HuffmanNode {
    Leaf(u16),
    Node(Box<HuffmanNode>, Box<HuffmanNode>),
}

impl HuffmanNode {
    pub fn node(zero: HuffmanNode, one: HuffmanNode) -> Self {
        Self::Node(Box::new(zero), Box::new(one))
    }

    /// Code for every symbol below `alphabet`; symbols missing from the tree get `None`.
    /// A tree of a single leaf gives that leaf a zero length code.
    pub fn code_table(&self, alphabet: usize) -> Result<Vec<Option<HuffCode>>> {
        let mut table = vec![None; alphabet];
        self.generate_code(HuffCode::new(), &mut table)?;
        Ok(table)
    }

    fn generate_code(&self, prefix: HuffCode, table: &mut [Option<HuffCode>]) -> Result<()> {
        match self {
            Self::Leaf(symbol) => {
                let slot = table
                    .get_mut(*symbol as usize)
                    .ok_or(KompressionError::MissingCode(*symbol))?;
                *slot = Some(prefix);
                Ok(())
            }
            Self::Node(zero, one) => {
                zero.generate_code(prefix.extend(false)?, table)?;
                one.generate_code(prefix.extend(true)?, table)
            }
        }
    }

    fn flatten(&self, arr: &mut Vec<TreeEntry>) -> usize {
        match self {
            Self::Leaf(symbol) => {
                arr.push(TreeEntry::Leaf(*symbol));
                arr.len() - 1
            }
            Self::Node(zero, one) => {
                let left = zero.flatten(arr);
                let right = one.flatten(arr);
                arr.push(TreeEntry::Node { left, right });
                arr.len() - 1
            }
        }
    }
}

impl From<&HuffmanNode> for LinearTree {
    fn from(root: &HuffmanNode) -> Self {
        let mut flat = Vec::new();
        root.flatten(&mut flat);
        flat.into()
    }
}

impl fmt::Display for HuffmanNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Leaf(symbol) => write!(f, "{}", symbol),
            Self::Node(zero, one) => write!(f, "({}, {})", zero, one),
        }
    }
}

impl FromStr for HuffmanNode {
    type Err = TreeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lexed = lex_treestr(s)?;
        let mut lex_iter = lexed.iter().copied();
        let root = parse_node(&mut lex_iter)?;

        match lex_iter.next() {
            Some(LexToken(pos, token)) => Err(TreeParseError::ParseUnexp(token.as_str(), pos)),
            None => Ok(root),
        }
    }
}

/// Builds the tree an encoder uses from the frequency of each symbol
pub trait HuffmanTreeBuilder {
    /// `frequencies` is indexed by symbol. Returns `None` if every frequency is zero.
    fn build(&self, frequencies: &[u64]) -> Option<HuffmanNode>;
}

/// Classic two-lowest merge, with ties broken by creation order
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTreeBuilder;

impl HuffmanTreeBuilder for FrequencyTreeBuilder {
    fn build(&self, frequencies: &[u64]) -> Option<HuffmanNode> {
        let mut heap: BinaryHeap<Weighted> = frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &freq)| freq > 0)
            .enumerate()
            .map(|(order, (symbol, &freq))| Weighted {
                freq,
                order,
                node: HuffmanNode::Leaf(symbol as u16),
            })
            .collect();

        let mut order = heap.len();
        loop {
            let zero = heap.pop()?;
            let one = match heap.pop() {
                Some(one) => one,
                None => return Some(zero.node),
            };

            heap.push(Weighted {
                freq: zero.freq + one.freq,
                order,
                node: HuffmanNode::node(zero.node, one.node),
            });
            order += 1;
        }
    }
}

/// A preset tree, ignoring the frequencies of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedTree(pub HuffmanNode);

impl HuffmanTreeBuilder for FixedTree {
    fn build(&self, _: &[u64]) -> Option<HuffmanNode> {
        Some(self.0.clone())
    }
}

impl FromStr for FixedTree {
    type Err = TreeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Heap entry; the `BinaryHeap` pops the lowest `(freq, order)` first
struct Weighted {
    freq: u64,
    order: usize,
    node: HuffmanNode,
}

impl Ord for Weighted {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.freq, self.order).cmp(&(other.freq, other.order)).reverse()
    }
}

impl PartialOrd for Weighted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Weighted {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weighted {}

type BitCodeBacking = u64;

/// A prefix code, stored right aligned, first bit most significant
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HuffCode {
    pub code: BitCodeBacking,
    size: u8,
}

impl HuffCode {
    const MAX_SIZE: usize = size_of::<BitCodeBacking>() * 8;

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.size as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline(always)]
    pub fn bitlen(&self) -> u32 {
        self.size as u32
    }

    fn push(&mut self, bit: bool) -> Result<()> {
        if self.len() >= Self::MAX_SIZE {
            return Err(KompressionError::TreeTooDeep(Self::MAX_SIZE));
        }
        self.size += 1;
        self.code <<= 1;
        self.code |= bit as BitCodeBacking;
        Ok(())
    }

    fn extend(mut self, bit: bool) -> Result<Self> {
        self.push(bit)?;
        Ok(self)
    }

    fn new() -> Self {
        Self { code: 0, size: 0 }
    }
}

impl fmt::Display for HuffCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0width$b}", self.code, width = self.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LexToken(usize, Token);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    OpenParen,
    CloseParen,
    Comma,
    Whitespace,
    Number(u16),
}

impl Token {
    fn as_str(&self) -> &'static str {
        match self {
            Self::OpenParen => "(",
            Self::CloseParen => ")",
            Self::Comma => ",",
            Self::Whitespace => "whitespace",
            Self::Number(..) => "number",
        }
    }
}

type LexIter<'a> = dyn Iterator<Item = LexToken> + 'a;

fn lex_treestr(s: &str) -> std::result::Result<Vec<LexToken>, TreeParseError> {
    use Token::*;
    use TreeParseError as E;

    let get_pos = |csr: &str| s.len() - csr.len();
    let count_ws = |s: &str| s.chars().take_while(|c| c.is_whitespace()).count();
    let parse_num = |s: &str| {
        let n = s.chars().take_while(|c| c.is_ascii_digit()).count();
        s[..n].parse().map(Number).map(|t| (n, t))
    };

    let mut csr = s;
    let mut output = Vec::with_capacity(s.len());
    while let Some(c) = csr.chars().next() {
        let (offset, token) = match c {
            '(' => Ok((1, OpenParen)),
            ')' => Ok((1, CloseParen)),
            ',' => Ok((1, Comma)),
            _ if c.is_whitespace() => Ok((count_ws(csr), Whitespace)),
            _ if c.is_ascii_digit() => parse_num(csr).map_err(|e| E::LexNum(e, get_pos(csr))),
            _ => Err(E::LexUnexp(c, get_pos(csr))),
        }?;

        if token != Whitespace {
            output.push(LexToken(get_pos(csr), token));
        }
        csr = &csr[offset..];
    }

    Ok(output)
}

// node -> (node, node) | leaf
// leaf -> NUMBER
fn parse_node(iter: &mut LexIter) -> std::result::Result<HuffmanNode, TreeParseError> {
    use Token::*;
    use TreeParseError as E;

    match iter.next() {
        Some(LexToken(_, Number(symbol))) => Ok(HuffmanNode::Leaf(symbol)),
        Some(LexToken(_, OpenParen)) => {
            let zero = parse_node(iter)?;
            expect(iter, Comma)?;
            let one = parse_node(iter)?;
            expect(iter, CloseParen)?;

            Ok(HuffmanNode::node(zero, one))
        }
        Some(LexToken(pos, t)) => Err(E::ParseUnexp(t.as_str(), pos)),
        None => Err(E::ParseUnexpEnd),
    }
}

fn expect(iter: &mut LexIter, want: Token) -> std::result::Result<(), TreeParseError> {
    match iter.next() {
        Some(LexToken(_, t)) if t == want => Ok(()),
        Some(LexToken(pos, t)) => Err(TreeParseError::ParseUnexp(t.as_str(), pos)),
        None => Err(TreeParseError::ParseUnexpEnd),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn check_codes(s: &str, expected: &[(u16, u64)]) {
        let tree: HuffmanNode = s.parse().unwrap();
        let table = tree.code_table(32).unwrap();
        for &(symbol, code) in expected {
            let found = table[symbol as usize]
                .unwrap_or_else(|| panic!("no code for {} in '{}'", symbol, s));
            assert_eq!(
                found.code, code,
                "incorrect huffcode for {}: got {} expected {:0b}\n{}",
                symbol, found, code, s
            );
        }
    }

    #[test]
    fn parse_tree_strings() {
        check_codes("(1, (4, (6, (3, 7))))", &[(1, 0b0), (4, 0b10), (6, 0b110), (3, 0b1110), (7, 0b1111)]);
        check_codes(
            "((7, ((4, 1), 5)), ((10, 6), 9))",
            &[(7, 0b00), (4, 0b0100), (1, 0b0101), (5, 0b011), (10, 0b100), (6, 0b101), (9, 0b11)],
        );
        assert_eq!(
            "((9, 11), (13, (14, 16)))".parse::<HuffmanNode>().unwrap().to_string(),
            "((9, 11), (13, (14, 16)))"
        );
    }

    #[test]
    fn bad_tree_strings() {
        assert!(matches!(
            "(1, 2".parse::<HuffmanNode>(),
            Err(TreeParseError::ParseUnexpEnd)
        ));
        assert!(matches!(
            "(1; 2)".parse::<HuffmanNode>(),
            Err(TreeParseError::LexUnexp(';', 2))
        ));
        assert!(matches!(
            "(1, 2) 3".parse::<HuffmanNode>(),
            Err(TreeParseError::ParseUnexp("number", 7))
        ));
    }

    #[test]
    fn single_leaf_code_is_empty() {
        let table = HuffmanNode::Leaf(5).code_table(8).unwrap();
        assert!(table[5].unwrap().is_empty());
        assert!(table[4].is_none());
    }

    #[test]
    fn frequency_builder_is_deterministic() {
        let mut freqs = [0u64; 256];
        freqs[b'a' as usize] = 5;
        freqs[b'b' as usize] = 2;
        freqs[b'c' as usize] = 1;
        freqs[b'd' as usize] = 1;

        let tree = FrequencyTreeBuilder.build(&freqs).unwrap();
        // c and d merge first, then b takes the older slot beside them
        assert_eq!(tree.to_string(), "((98, (99, 100)), 97)");
        assert_eq!(FrequencyTreeBuilder.build(&freqs), Some(tree));
        assert_eq!(FrequencyTreeBuilder.build(&[0; 4]), None);
    }

    #[test]
    fn flattened_tree_is_post_order() {
        let tree: HuffmanNode = "(1, (4, 7))".parse().unwrap();
        let linear = LinearTree::from(&tree);
        assert_eq!(linear.to_string(), "(1, (4, 7))");
    }
}
