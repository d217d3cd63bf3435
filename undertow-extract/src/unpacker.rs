//! Recovery of media URLs from packed player scripts.
//!
//! Embed pages hide the stream URL inside an
//! `eval(function(p,a,c,k,e,d){..}('payload',radix,count,'w0|w1|..'.split('|'),..))`
//! blob. Instead of running the blob, the packer's arguments are parsed and
//! the substitution it would perform is applied directly: every word token of
//! the payload is a number in the packer's base-62 alphabet indexing the
//! keyword list. The first `https...m3u8` substring of the result is the URL.
//!
//! Nothing from the page is ever executed, and every step is linear in the
//! size of the block.

use regex::{Captures, Regex};
use undertow_core::LookupError;
use undertow_core::config::ExtractionConfig;

/// Digit alphabet of the packer's encoder, in value order.
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Arguments of one packer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArgs {
    pub payload: String,
    pub radix: u32,
    pub count: usize,
    pub keywords: Vec<String>,
}

/// Native decoder for packed player scripts.
#[derive(Debug, Clone)]
pub struct ScriptUnpacker {
    script_pattern: Regex,
    args_pattern: Regex,
    word_pattern: Regex,
    source_pattern: Regex,
    max_packed_bytes: usize,
}

impl ScriptUnpacker {
    /// Creates an unpacker with the size limit from `config`.
    ///
    /// # Errors
    ///
    /// - `LookupError::Internal` - A built-in pattern failed to compile
    pub fn new(config: &ExtractionConfig) -> Result<Self, LookupError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| LookupError::internal(format!("invalid pattern {pattern}: {e}")))
        };

        Ok(Self {
            script_pattern: compile(r"(?s)eval(\(f.*?)</script>")?,
            args_pattern: compile(
                r#"(?s)\}\s*\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'((?:[^'\\]|\\.)*)'\s*\.split\(\s*'\|'\s*\)"#,
            )?,
            word_pattern: compile(r"(?-u:\b\w+\b)")?,
            source_pattern: compile(r"https.*?m3u8")?,
            max_packed_bytes: config.max_packed_bytes,
        })
    }

    /// Locates the packed expression in `page`, without its `eval` prefix.
    ///
    /// # Errors
    ///
    /// - `LookupError::Extraction` - No `eval(f...</script>` block is present
    pub fn packed_expression<'a>(&self, page: &'a str) -> Result<&'a str, LookupError> {
        self.script_pattern
            .captures(page)
            .and_then(|captures| captures.get(1))
            .map(|expression| expression.as_str())
            .ok_or_else(|| LookupError::extraction("no packed script found in page"))
    }

    /// Parses the packer's call arguments out of `expression`.
    ///
    /// # Errors
    ///
    /// - `LookupError::Extraction` - The expression is not a packer call or
    ///   its radix is outside 2..=62
    pub fn packed_args(&self, expression: &str) -> Result<PackedArgs, LookupError> {
        let captures = self
            .args_pattern
            .captures(expression)
            .ok_or_else(|| LookupError::extraction("packed script arguments not recognised"))?;
        let group = |index: usize| captures.get(index).map_or("", |m| m.as_str());

        let radix = group(2)
            .parse::<u32>()
            .ok()
            .filter(|radix| (2..=62).contains(radix))
            .ok_or_else(|| LookupError::extraction(format!("unsupported radix {}", group(2))))?;
        let count = group(3)
            .parse::<usize>()
            .map_err(|_| LookupError::extraction(format!("invalid word count {}", group(3))))?;

        Ok(PackedArgs {
            payload: unescape(group(1)),
            radix,
            count,
            keywords: unescape(group(4)).split('|').map(str::to_string).collect(),
        })
    }

    /// Applies the packer's keyword substitution to the payload.
    pub fn decode(&self, args: &PackedArgs) -> String {
        self.word_pattern
            .replace_all(&args.payload, |captures: &Captures<'_>| {
                let token = &captures[0];
                decode_index(token, args.radix)
                    .filter(|index| *index < args.count)
                    .and_then(|index| args.keywords.get(index))
                    .filter(|keyword| !keyword.is_empty())
                    .map_or_else(|| token.to_string(), Clone::clone)
            })
            .into_owned()
    }

    /// Finds the media URL in already unpacked script text.
    pub fn find_source<'a>(&self, unpacked: &'a str) -> Option<&'a str> {
        self.source_pattern.find(unpacked).map(|m| m.as_str())
    }

    /// Recovers the media URL from an embed page.
    ///
    /// # Errors
    ///
    /// - `LookupError::Extraction` - No packed script, a block over the size
    ///   limit, a block not in packer format, or output without a media URL
    pub fn unpack(&self, page: &str) -> Result<String, LookupError> {
        let expression = self.packed_expression(page)?;
        if expression.len() > self.max_packed_bytes {
            return Err(LookupError::extraction(format!(
                "packed script of {} bytes exceeds limit of {}",
                expression.len(),
                self.max_packed_bytes
            )));
        }

        let args = self.packed_args(expression)?;
        let unpacked = self.decode(&args);

        self.find_source(&unpacked)
            .map(str::to_string)
            .ok_or_else(|| LookupError::extraction("unpacked script contains no media URL"))
    }
}

/// Reads `token` as a number in the packer alphabet, or `None` if it is not one.
fn decode_index(token: &str, radix: u32) -> Option<usize> {
    token.bytes().try_fold(0usize, |value, byte| {
        let digit = ALPHABET.iter().position(|c| *c == byte)?;
        if digit >= radix as usize {
            return None;
        }
        value.checked_mul(radix as usize)?.checked_add(digit)
    })
}

/// Resolves backslash escapes of a single-quoted script string literal.
fn unescape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
