//! Tokenizers that attach payloads to the tokens they produce.
//!
//! The scoring side never cares which producer wrote a payload, only about
//! its byte layout. Producers are therefore a plain tagged enum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::payload::LineBitmap;

/// A token together with the payload bytes to index with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedToken {
    pub text: String,
    pub payload: Vec<u8>,
}

impl ProducedToken {
    /// Create a new token.
    pub fn new<S: Into<String>>(text: S, payload: Vec<u8>) -> Self {
        ProducedToken {
            text: text.into(),
            payload,
        }
    }
}

/// Payload-producing tokenizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadProducer {
    /// Whitespace separated `term|hexbytes` pairs; the hex digits are the
    /// payload. Words without a payload are dropped.
    HexPayload,

    /// Source-code tokenizer. Identifier runs and runs of one repeated symbol
    /// (`==`, `**`) become tokens; each distinct token is emitted once with the
    /// serialized bitmap of the lines it occurs on.
    CodeLines {
        #[serde(default = "default_min_token_len")]
        min_token_len: usize,
        #[serde(default = "default_max_token_len")]
        max_token_len: usize,
    },
}

fn default_min_token_len() -> usize {
    2
}

fn default_max_token_len() -> usize {
    64
}

impl PayloadProducer {
    /// Code tokenizer with the default token length bounds.
    pub fn code_lines() -> Self {
        PayloadProducer::CodeLines {
            min_token_len: default_min_token_len(),
            max_token_len: default_max_token_len(),
        }
    }

    /// Get the name of this producer.
    pub fn name(&self) -> &'static str {
        match self {
            PayloadProducer::HexPayload => "hex_payload",
            PayloadProducer::CodeLines { .. } => "code_lines",
        }
    }

    /// Tokenize text into tokens with payloads.
    pub fn produce(&self, text: &str) -> Result<Vec<ProducedToken>> {
        match self {
            PayloadProducer::HexPayload => produce_hex(text),
            PayloadProducer::CodeLines {
                min_token_len,
                max_token_len,
            } => produce_code_lines(text, *min_token_len, *max_token_len),
        }
    }
}

fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(PilumError::payload(format!(
            "character <{}> out of hex range",
            c as char
        ))),
    }
}

fn produce_hex(text: &str) -> Result<Vec<ProducedToken>> {
    let mut tokens = Vec::new();
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let Some((term, hex)) = word.split_once('|') else {
            continue;
        };
        if term.is_empty() || hex.len() < 2 {
            continue;
        }
        // an odd trailing nibble is dropped
        let payload = hex
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| Ok(hex_value(pair[0])? << 4 | hex_value(pair[1])?))
            .collect::<Result<Vec<u8>>>()?;
        tokens.push(ProducedToken::new(term, payload));
    }
    Ok(tokens)
}

struct LineCollector {
    min_len: usize,
    max_len: usize,
    token: String,
    lines: BTreeMap<String, LineBitmap>,
}

impl LineCollector {
    fn flush(&mut self, line: u32) {
        let len = self.token.len();
        if len >= self.min_len && len < self.max_len {
            self.lines
                .entry(self.token.clone())
                .or_default()
                .insert(line);
        }
        self.token.clear();
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_indexed_symbol(c: char) -> bool {
    matches!(c, '!'..='/' | ':'..='@')
}

fn produce_code_lines(text: &str, min_len: usize, max_len: usize) -> Result<Vec<ProducedToken>> {
    let mut collector = LineCollector {
        min_len,
        max_len,
        token: String::new(),
        lines: BTreeMap::new(),
    };
    let mut line: u32 = 0;
    let mut prev_symbol: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            collector.flush(line);
            line += 1;
            prev_symbol = None;
            continue;
        }

        if prev_symbol.is_some_and(|p| p != c) {
            collector.flush(line);
            prev_symbol = None;
        }

        if is_word_char(c) {
            collector.token.push(c);
        } else if is_indexed_symbol(c) {
            if prev_symbol.is_none() {
                collector.flush(line);
            }
            collector.token.push(c);
            prev_symbol = Some(c);
        } else {
            collector.flush(line);
            prev_symbol = None;
        }
    }
    collector.flush(line);

    collector
        .lines
        .into_iter()
        .map(|(text, lines)| Ok(ProducedToken::new(text, lines.to_bytes()?)))
        .collect()
}
