//! A hand-written matcher for the restricted regex subset allowed by
//! `read_file`'s `searchPattern`:
//!
//! `. [abc] [a-z] ^ $ * + ? {n,m} | \t`
//!
//! Backslash shorthands (`\d`, `\w`, ...) and look-arounds are
//! explicitly unsupported. A general-purpose `regex` crate would accept
//! syntax well beyond this subset; compiling the subset by hand is what
//! lets us *reject* anything outside it instead of silently widening the
//! match language.

use crate::errors::IndexError;

#[derive(Debug, Clone)]
enum Node {
    Any,
    Char(char),
    Class { negated: bool, ranges: Vec<(char, char)> },
    Start,
    End,
}

#[derive(Debug, Clone)]
enum Quantifier {
    One,
    Star,
    Plus,
    Optional,
    Range(u32, Option<u32>),
}

#[derive(Debug, Clone)]
struct Atom {
    node: Node,
    quant: Quantifier,
}

/// A compiled pattern: an alternation of sequences of quantified atoms.
#[derive(Debug, Clone)]
pub struct Pattern {
    alternatives: Vec<Vec<Atom>>,
}

impl Pattern {
    pub fn compile(src: &str) -> Result<Self, IndexError> {
        let alternatives = src
            .split('|')
            .map(parse_sequence)
            .collect::<Result<Vec<_>, IndexError>>()?;
        Ok(Pattern { alternatives })
    }

    /// Returns true if the pattern matches anywhere in `line`.
    pub fn is_match(&self, line: &str) -> bool {
        let chars: Vec<char> = line.chars().collect();
        self.alternatives.iter().any(|seq| (0..=chars.len()).any(|start| match_here(seq, &chars, start).is_some()))
    }
}

fn parse_sequence(src: &str) -> Result<Vec<Atom>, IndexError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut atoms = Vec::new();

    while i < chars.len() {
        let (node, next) = parse_node(&chars, i)?;
        i = next;
        let (quant, next) = parse_quantifier(&chars, i)?;
        i = next;
        atoms.push(Atom { node, quant });
    }

    Ok(atoms)
}

fn parse_node(chars: &[char], i: usize) -> Result<(Node, usize), IndexError> {
    match chars[i] {
        '.' => Ok((Node::Any, i + 1)),
        '^' => Ok((Node::Start, i + 1)),
        '$' => Ok((Node::End, i + 1)),
        '\\' => {
            if i + 1 >= chars.len() {
                return Err(IndexError::config("dangling backslash in pattern"));
            }
            match chars[i + 1] {
                't' => Ok((Node::Char('\t'), i + 2)),
                other => Err(IndexError::config(format!(
                    "unsupported backslash escape '\\{other}'; only \\t is supported"
                ))),
            }
        }
        '[' => parse_class(chars, i),
        c => Ok((Node::Char(c), i + 1)),
    }
}

fn parse_class(chars: &[char], i: usize) -> Result<(Node, usize), IndexError> {
    let mut j = i + 1;
    let negated = chars.get(j) == Some(&'^');
    if negated {
        j += 1;
    }

    let mut ranges = Vec::new();
    let start = j;
    while j < chars.len() && chars[j] != ']' {
        let lo = chars[j];
        if j + 2 < chars.len() && chars[j + 1] == '-' && chars[j + 2] != ']' {
            ranges.push((lo, chars[j + 2]));
            j += 3;
        } else {
            ranges.push((lo, lo));
            j += 1;
        }
    }
    if j >= chars.len() {
        return Err(IndexError::config("unterminated character class"));
    }
    if j == start {
        return Err(IndexError::config("empty character class"));
    }

    Ok((Node::Class { negated, ranges }, j + 1))
}

fn parse_quantifier(chars: &[char], i: usize) -> Result<(Quantifier, usize), IndexError> {
    if i >= chars.len() {
        return Ok((Quantifier::One, i));
    }
    match chars[i] {
        '*' => Ok((Quantifier::Star, i + 1)),
        '+' => Ok((Quantifier::Plus, i + 1)),
        '?' => Ok((Quantifier::Optional, i + 1)),
        '{' => parse_range_quantifier(chars, i),
        _ => Ok((Quantifier::One, i)),
    }
}

fn parse_range_quantifier(chars: &[char], i: usize) -> Result<(Quantifier, usize), IndexError> {
    let close = chars[i..].iter().position(|&c| c == '}').map(|p| i + p);
    let Some(close) = close else {
        return Err(IndexError::config("unterminated {n,m} quantifier"));
    };
    let body: String = chars[i + 1..close].iter().collect();
    let (min_s, max_s) = match body.split_once(',') {
        Some((a, b)) => (a, Some(b)),
        None => (body.as_str(), None),
    };
    let min: u32 = min_s
        .parse()
        .map_err(|_| IndexError::config(format!("invalid quantifier lower bound: {min_s}")))?;
    let max = match max_s {
        None => Some(min),
        Some("") => None,
        Some(s) => Some(s.parse().map_err(|_| IndexError::config(format!("invalid quantifier upper bound: {s}")))?),
    };
    Ok((Quantifier::Range(min, max), close + 1))
}

fn node_matches(node: &Node, c: Option<char>, at_start: bool, at_end: bool) -> bool {
    match node {
        Node::Any => c.is_some(),
        Node::Char(expected) => c == Some(*expected),
        Node::Class { negated, ranges } => match c {
            None => false,
            Some(c) => {
                let in_class = ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi);
                in_class != *negated
            }
        },
        Node::Start => at_start,
        Node::End => at_end,
    }
}

/// Backtracking matcher over a sequence of quantified atoms, anchored to
/// try a match starting at `chars[start]`. Returns the end index on
/// success. The pattern subset is small and line-bounded, so naive
/// backtracking is sufficient and keeps the implementation legible.
fn match_here(seq: &[Atom], chars: &[char], start: usize) -> Option<usize> {
    fn go(seq: &[Atom], idx: usize, chars: &[char], pos: usize) -> Option<usize> {
        if idx == seq.len() {
            return Some(pos);
        }
        let atom = &seq[idx];
        let at_start = pos == 0;
        let at_end = pos == chars.len();

        match atom.node {
            Node::Start | Node::End => {
                if node_matches(&atom.node, None, at_start, at_end) {
                    go(seq, idx + 1, chars, pos)
                } else {
                    None
                }
            }
            _ => match &atom.quant {
                Quantifier::One => {
                    if pos < chars.len() && node_matches(&atom.node, Some(chars[pos]), at_start, at_end) {
                        go(seq, idx + 1, chars, pos + 1)
                    } else {
                        None
                    }
                }
                Quantifier::Optional => {
                    if pos < chars.len() && node_matches(&atom.node, Some(chars[pos]), at_start, at_end) {
                        if let Some(end) = go(seq, idx + 1, chars, pos + 1) {
                            return Some(end);
                        }
                    }
                    go(seq, idx + 1, chars, pos)
                }
                Quantifier::Star => match_greedy(seq, idx, chars, pos, 0, None),
                Quantifier::Plus => match_greedy(seq, idx, chars, pos, 1, None),
                Quantifier::Range(min, max) => match_greedy(seq, idx, chars, pos, *min, *max),
            },
        }
    }

    fn match_greedy(seq: &[Atom], idx: usize, chars: &[char], pos: usize, min: u32, max: Option<u32>) -> Option<usize> {
        let atom = &seq[idx];
        let mut count = 0u32;
        let mut positions = vec![pos];
        let mut cur = pos;
        while max.map(|m| count < m).unwrap_or(true) {
            let at_start = cur == 0;
            let at_end = cur == chars.len();
            if cur < chars.len() && node_matches(&atom.node, Some(chars[cur]), at_start, at_end) {
                cur += 1;
                count += 1;
                positions.push(cur);
            } else {
                break;
            }
        }
        while (positions.len() as u32) > min || positions.len() == 1 {
            let p = *positions.last().unwrap();
            if (positions.len() as u32 - 1) >= min {
                if let Some(end) = go(seq, idx + 1, chars, p) {
                    return Some(end);
                }
            }
            if positions.len() == 1 {
                break;
            }
            positions.pop();
        }
        None
    }

    go(seq, 0, chars, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_dot() {
        let p = Pattern::compile("a.c").unwrap();
        assert!(p.is_match("xabcx"));
        assert!(!p.is_match("ac"));
    }

    #[test]
    fn char_class_and_range() {
        let p = Pattern::compile("[a-c]x").unwrap();
        assert!(p.is_match("bx"));
        assert!(!p.is_match("dx"));
    }

    #[test]
    fn anchors() {
        let p = Pattern::compile("^foo$").unwrap();
        assert!(p.is_match("foo"));
        assert!(!p.is_match("foobar"));
    }

    #[test]
    fn quantifiers() {
        let p = Pattern::compile("ab*c").unwrap();
        assert!(p.is_match("ac"));
        assert!(p.is_match("abbbc"));
        let p2 = Pattern::compile("a{2,3}").unwrap();
        assert!(p2.is_match("aa"));
        assert!(!p2.is_match("a"));
    }

    #[test]
    fn alternation() {
        let p = Pattern::compile("cat|dog").unwrap();
        assert!(p.is_match("my dog"));
        assert!(!p.is_match("my bird"));
    }

    #[test]
    fn backslash_shorthand_rejected() {
        assert!(Pattern::compile(r"\d+").is_err());
    }
}
