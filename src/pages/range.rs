//! Page range parser
//!
//! Grammar (whitespace around tokens is ignored):
//!
//! ```text
//! spec  := "all" | token ("," token)*
//! token := n | n "-" n        (n is a positive integer, start <= end)
//! ```
//!
//! Numbers are 1-based, as typed by the caller. Token order is preserved
//! because reordering operations use it as the new page order.

use std::fmt;
use std::str::FromStr;

use super::PageError;

/// Keyword selecting every page of a document
pub const ALL_KEYWORD: &str = "all";

/// One comma-separated element of a range specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    /// A single 1-based page number
    Single(usize),
    /// An inclusive 1-based span; `start <= end` always holds
    Range(usize, usize),
}

impl RangeToken {
    /// First page number covered by this token
    pub fn start(&self) -> usize {
        match *self {
            RangeToken::Single(n) => n,
            RangeToken::Range(start, _) => start,
        }
    }

    /// Last page number covered by this token
    pub fn end(&self) -> usize {
        match *self {
            RangeToken::Single(n) => n,
            RangeToken::Range(_, end) => end,
        }
    }

    /// Whether the 1-based page number falls inside this token
    pub fn contains(&self, page: usize) -> bool {
        self.start() <= page && page <= self.end()
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeToken::Single(n) => write!(f, "{}", n),
            RangeToken::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

/// Parsed, order-preserving page range specification
///
/// Not yet validated against any document: page numbers beyond the end of
/// a document are only discovered during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// Every page, in document order
    All,
    /// Explicit tokens in caller order
    Pages(Vec<RangeToken>),
}

impl RangeSpec {
    /// Parse a range specification
    pub fn parse(spec: &str) -> Result<Self, PageError> {
        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case(ALL_KEYWORD) {
            return Ok(RangeSpec::All);
        }
        if trimmed.is_empty() {
            return Err(PageError::MalformedRange(spec.to_string()));
        }

        trimmed
            .split(',')
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()
            .map(RangeSpec::Pages)
    }

    /// Parse an optional field where blank text means "nothing"
    pub fn parse_optional(spec: &str) -> Result<Option<Self>, PageError> {
        if spec.trim().is_empty() {
            Ok(None)
        } else {
            Self::parse(spec).map(Some)
        }
    }

    /// Whether the 1-based page number is named by this spec
    pub fn contains(&self, page: usize) -> bool {
        match self {
            RangeSpec::All => true,
            RangeSpec::Pages(tokens) => tokens.iter().any(|t| t.contains(page)),
        }
    }
}

impl FromStr for RangeSpec {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpec::All => f.write_str(ALL_KEYWORD),
            RangeSpec::Pages(tokens) => {
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", token)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_token(raw: &str) -> Result<RangeToken, PageError> {
    let token = raw.trim();
    let malformed = || PageError::MalformedRange(token.to_string());

    match token.split_once('-') {
        Some((start, end)) => {
            let start = parse_page_number(start).ok_or_else(malformed)?;
            let end = parse_page_number(end).ok_or_else(malformed)?;
            if start > end {
                return Err(malformed());
            }
            Ok(RangeToken::Range(start, end))
        }
        None => parse_page_number(token)
            .map(RangeToken::Single)
            .ok_or_else(malformed),
    }
}

/// Positive decimal integer; signs and empty text are rejected
fn parse_page_number(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<usize>().ok().filter(|n| *n > 0)
}
