//! Output repair parser for quality-check responses
//!
//! The QC service is a text generator asked to answer with a JSON object
//! containing `accuracy_score`, `hallucination_score` and `reasoning`. What
//! actually comes back ranges from clean JSON to fenced blocks, Python-style
//! dict literals with single quotes and trailing commas, or prose. This module
//! turns any of those into a well-formed [`QcResult`] and never fails.
//!
//! ```text
//! raw text
//!    │  strip ```json / ``` fences, trim
//!    │  cut first '{' .. last '}'
//!    ▼
//! ┌──────────────────────┐  object? ──▶ done
//! │ 1. StrictJson        │
//! ├──────────────────────┤
//! │ 2. LiteralMapping    │  'single' quotes, True/False/None, trailing commas
//! ├──────────────────────┤
//! │ 3. TrailingCommaJson │  drop ",}" / ",]" then strict JSON again
//! └──────────────────────┘
//!    │ nothing produced an object
//!    ▼
//! default {accuracy: 1, hallucination: 1, "JSON Parsing Failed"}
//! ```
//!
//! Whatever the source, scores are normalized (clamped to `[1, 10]`,
//! hallucination forced to 10 once accuracy reaches 9) and `is_pass` is
//! recomputed from the pass threshold. A generator-supplied `is_pass` is
//! ignored.

use crate::error::{Result, WorkflowError};
use crate::state::QcResult;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Reasoning reported when nothing could be parsed
pub const PARSE_FAILURE_REASONING: &str = "JSON Parsing Failed";

/// Reasoning used when the object carries none
pub const MISSING_REASONING: &str = "No reasoning provided";

const MIN_SCORE: i64 = 1;
const MAX_SCORE: i64 = 10;

/// Deepest nesting the literal parser follows, matching `serde_json`'s limit
const MAX_NESTING: usize = 128;

/// One way of decoding the candidate text into an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    /// `serde_json` as is
    StrictJson,
    /// Python-style literal mapping
    LiteralMapping,
    /// Strict JSON after removing trailing commas
    TrailingCommaJson,
}

impl RepairStrategy {
    /// Strategies in the order they are tried
    pub const CHAIN: [RepairStrategy; 3] = [
        RepairStrategy::StrictJson,
        RepairStrategy::LiteralMapping,
        RepairStrategy::TrailingCommaJson,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RepairStrategy::StrictJson => "strict_json",
            RepairStrategy::LiteralMapping => "literal_mapping",
            RepairStrategy::TrailingCommaJson => "trailing_comma_json",
        }
    }

    /// Decode `candidate`; succeeds only when the result is an object
    pub fn attempt(self, candidate: &str) -> Option<Map<String, Value>> {
        let value = match self {
            RepairStrategy::StrictJson => serde_json::from_str(candidate).ok(),
            RepairStrategy::LiteralMapping => LiteralParser::parse(candidate),
            RepairStrategy::TrailingCommaJson => {
                let re = trailing_comma_re()?;
                let cleaned = re.replace_all(candidate, "$1");
                serde_json::from_str(&cleaned).ok()
            }
        };

        match value {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// An object recovered from generator output
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub fields: Map<String, Value>,
    pub strategy: RepairStrategy,
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```json\s*").ok()).as_ref()
}

fn trailing_comma_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([\]}])").ok()).as_ref()
}

/// Remove code fences and surrounding whitespace
pub fn strip_fences(raw: &str) -> String {
    let without_lang = match fence_re() {
        Some(re) => re.replace_all(raw, "").into_owned(),
        None => raw.to_string(),
    };
    without_lang.replace("```", "").trim().to_string()
}

/// Substring from the first `{` to the last `}`, or the whole text
pub fn extract_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Run the repair chain over raw generator text
///
/// Fails with [`WorkflowError::ParseRecoveryExhausted`] when no strategy yields
/// an object.
pub fn recover_object(raw: &str) -> Result<RepairOutcome> {
    let cleaned = strip_fences(raw);
    let candidate = extract_object(&cleaned);

    for strategy in RepairStrategy::CHAIN {
        if let Some(fields) = strategy.attempt(candidate) {
            return Ok(RepairOutcome { fields, strategy });
        }
    }

    Err(WorkflowError::ParseRecoveryExhausted {
        preview: raw.chars().take(80).collect(),
    })
}

/// Parse QC output into a normalized result; never fails
pub fn parse_qc_output(raw: &str, pass_threshold: u8) -> QcResult {
    match recover_object(raw) {
        Ok(outcome) => {
            if outcome.strategy != RepairStrategy::StrictJson {
                debug!(strategy = outcome.strategy.name(), "Recovered QC object from malformed output");
            }
            from_fields(&outcome.fields, pass_threshold)
        }
        Err(e) => {
            warn!(error = %e, "QC output unparseable, using default scores");
            parse_failure(pass_threshold)
        }
    }
}

/// Default result when nothing could be parsed
pub fn parse_failure(pass_threshold: u8) -> QcResult {
    normalize(MIN_SCORE, MIN_SCORE, PARSE_FAILURE_REASONING.to_string(), pass_threshold)
}

fn from_fields(fields: &Map<String, Value>, pass_threshold: u8) -> QcResult {
    let accuracy = score(fields.get("accuracy_score"));
    let hallucination = score(fields.get("hallucination_score"));
    let reasoning = match fields.get("reasoning") {
        None | Some(Value::Null) => MISSING_REASONING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    normalize(accuracy, hallucination, reasoning, pass_threshold)
}

/// Integers, truncated floats and numeric strings; anything else is 1
fn score(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => number_to_score(n),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(MIN_SCORE)
        }
        _ => MIN_SCORE,
    }
}

fn number_to_score(n: &Number) -> i64 {
    if let Some(i) = n.as_i64() {
        i
    } else if n.as_u64().is_some() {
        MAX_SCORE
    } else {
        n.as_f64().map(|f| f.trunc() as i64).unwrap_or(MIN_SCORE)
    }
}

/// Clamp scores, apply the high-accuracy override and derive `is_pass`
///
/// ```rust
/// use verba_core::repair::normalize;
///
/// let qc = normalize(9, 2, "fine".into(), 8);
/// assert_eq!((qc.accuracy_score(), qc.hallucination_score(), qc.is_pass()), (9, 10, true));
/// ```
pub fn normalize(accuracy: i64, hallucination: i64, reasoning: String, pass_threshold: u8) -> QcResult {
    let accuracy = accuracy.clamp(MIN_SCORE, MAX_SCORE) as u8;
    let mut hallucination = hallucination.clamp(MIN_SCORE, MAX_SCORE) as u8;

    if accuracy >= 9 {
        hallucination = 10;
    }

    QcResult::from_normalized(
        accuracy,
        hallucination,
        reasoning,
        is_pass(accuracy, hallucination, pass_threshold),
    )
}

/// Both scores reach the threshold
pub fn is_pass(accuracy: u8, hallucination: u8, pass_threshold: u8) -> bool {
    accuracy >= pass_threshold && hallucination >= pass_threshold
}

/// Recursive-descent parser for Python-style literals
///
/// Accepts dicts, lists, tuples (as arrays), single- or double-quoted strings,
/// integers, floats, `True`/`False`/`None` (and their JSON spellings) and
/// trailing commas. Input nested deeper than [`MAX_NESTING`] is rejected.
struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LiteralParser {
    fn parse(input: &str) -> Option<Value> {
        let mut parser = Self {
            chars: input.chars().collect(),
            pos: 0,
            depth: 0,
        };
        let value = parser.value()?;
        parser.skip_ws();
        (parser.pos == parser.chars.len()).then_some(value)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_ws();
        (self.bump()? == expected).then_some(())
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.nested(Self::mapping),
            '[' => self.nested(|p| p.sequence('[', ']')),
            '(' => self.nested(|p| p.sequence('(', ')')),
            '\'' | '"' => self.string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() => self.keyword(),
            _ => None,
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Option<Value>) -> Option<Value> {
        if self.depth == MAX_NESTING {
            return None;
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn mapping(&mut self) -> Option<Value> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_ws();
            if self.peek()? == '}' {
                self.pos += 1;
                return Some(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                '}' => return Some(Value::Object(map)),
                _ => return None,
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Option<Value> {
        self.expect(open)?;
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            if self.peek()? == close {
                self.pos += 1;
                return Some(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                c if c == close => return Some(Value::Array(items)),
                _ => return None,
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();

        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    '\n' => {}
                    'x' => out.push(self.hex_escape(2)?),
                    'u' => out.push(self.hex_escape(4)?),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                c => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Option<char> {
        let end = self.pos.checked_add(digits)?;
        let hex: String = self.chars.get(self.pos..end)?.iter().collect();
        self.pos = end;
        char::from_u32(u32::from_str_radix(&hex, 16).ok()?)
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | '_'))
        {
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Number(i.into()));
        }
        let f = text.parse::<f64>().ok()?;
        Number::from_f64(f).map(Value::Number)
    }

    fn keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }

        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            "None" | "null" => Some(Value::Null),
            _ => None,
        }
    }
}
