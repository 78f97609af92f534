//! Log sanitization for clinical values and secrets.
//!
//! The formatted log output is filtered before it reaches the sink:
//! - Clinical feature assignments (`ABI=0.8`, `TcPO2: 40`, `eGFR = 60.0`)
//! - Contextual secrets (`seed=...`, `private_key: ...`)
//! - Raw hex key material and PEM private key blocks
//!
//! # Important: prefer not logging values at all
//!
//! Sanitizing strings is a fallback. Pipeline code logs labels and
//! probabilities at `info`; feature values appear only in `debug` output and
//! are redacted here.
//!
//! # Performance
//!
//! `sanitize()` caps its input at `MAX_SANITIZE_BYTES` and marks the cut with
//! `[TRUNCATED]`.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::FEATURE_NAMES;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

/// Maximum number of bytes to sanitize per call.
const MAX_SANITIZE_BYTES: usize = 16 * 1024;

struct Pattern {
    regex: Regex,
    replacement: String,
}

struct Patterns {
    fast_set: RegexSet,
    fast_patterns: Vec<Pattern>,
    pem: Option<Regex>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Alternation of the model column names, longest first.
fn clinical_names() -> String {
    let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}

fn get_patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let rules: Vec<(String, String)> = vec![
            // name=value, name: value, name = value
            (
                format!(r"(?i)\b({})(\s*[:=]\s*)-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?", clinical_names()),
                "${1}${2}[REDACTED]".into(),
            ),
            (
                r"(?i)\b(seed|private[_-]?key|secret|signing[_-]?key|token)(\s*[:=]\s*)[A-Za-z0-9+/]{16,}={0,2}"
                    .into(),
                "${1}${2}[REDACTED-SECRET]".into(),
            ),
            (r"\b[0-9a-fA-F]{64,}\b".into(), "[REDACTED-KEY]".into()),
        ];

        // Invalid rules are dropped rather than aborting logging setup.
        let compiled: Vec<Pattern> = rules
            .into_iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(&pattern)
                    .ok()
                    .map(|regex| Pattern { regex, replacement })
            })
            .collect();
        let fast_set = RegexSet::new(compiled.iter().map(|p| p.regex.as_str()))
            .unwrap_or_else(|_| RegexSet::empty());

        let pem = Regex::new(
            r"(?s)-----BEGIN [A-Z0-9 ]{0,40}PRIVATE KEY-----.{0,8192}?-----END [A-Z0-9 ]{0,40}PRIVATE KEY-----",
        )
        .ok();

        Patterns {
            fast_set,
            fast_patterns: compiled,
            pem,
        }
    })
}

/// Sanitize a string by redacting clinical values and secrets.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, MAX_SANITIZE_BYTES)
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.fast_set.matches(prefix).into_iter() {
        let pattern = &patterns.fast_patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement.as_str())
            .into_owned();
    }

    if result.contains("-----BEGIN ") {
        if let Some(pem) = &patterns.pem {
            result = pem
                .replace_all(&result, "[REDACTED-PEM-PRIVATE-KEY]")
                .into_owned();
        }
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains anything `sanitize` would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let patterns = get_patterns();
    let (prefix, _) = truncate_to_char_boundary(input, MAX_SANITIZE_BYTES);
    patterns.fast_set.is_match(prefix)
        || (prefix.contains("-----BEGIN ")
            && patterns.pem.as_ref().is_some_and(|p| p.is_match(prefix)))
}

/// A `tracing_subscriber` writer wrapper that sanitizes formatted log output
/// before it is written to the underlying sink.
///
/// The fmt layer asks for one writer per event, so output is buffered until
/// the writer is flushed or dropped and sanitized as a whole event. Patterns
/// spanning lines (PEM blocks) are therefore caught.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn write_buffered(&mut self) -> std::io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
        self.buffer.clear();
        self.inner.write_all(sanitized.as_bytes())?;
        if !sanitized.ends_with('\n') {
            self.inner.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // An oversized event is written in one capped piece.
        if self.buffer.len() > MAX_SANITIZE_BYTES {
            self.write_buffered()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.write_buffered()?;
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}
