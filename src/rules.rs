//! Normalization ruleset: a sequential list of regex rewrites.
//!
//! Rules come from a CSV file, one `pattern,replacement` per line. Each rule
//! is applied over the whole text before the next rule runs, so later rules
//! see the output of earlier ones. Replacements may reference capture groups
//! with `\0`…`\9`; nothing else of the POSIX replacement syntax is
//! supported.
//!
//! The ruleset is an owned value held by the engine, so concurrent engines
//! never share rule state.

use std::path::Path;

use regex::Regex;

struct Rule {
    pattern: Regex,
    replacement: String,
}

impl Rule {
    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let Some(caps) = self.pattern.captures(rest) else {
                out.push_str(rest);
                break;
            };
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&rest[..whole.start()]);
            expand_replacement(&mut out, &self.replacement, &caps);

            if whole.end() > whole.start() {
                pos += whole.end();
            } else {
                // Zero-length match: emit the next character and move past it
                // so the scan always makes progress.
                match rest[whole.end()..].chars().next() {
                    Some(c) => {
                        out.push(c);
                        pos += whole.end() + c.len_utf8();
                    }
                    None => break,
                }
            }
        }
        out
    }
}

/// Substitute `\0`…`\9` in `replacement` with the matched groups; unmatched
/// groups expand to nothing, and any other escape is copied literally.
fn expand_replacement(out: &mut String, replacement: &str, caps: &regex::Captures) {
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(d @ '0'..='9') => {
                    let group = *d as usize - '0' as usize;
                    if let Some(m) = caps.get(group) {
                        out.push_str(m.as_str());
                    }
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
}

/// Rewrite the portable `\b` word-boundary token into the engine's regex
/// syntax. `\b` followed by an alphanumeric, `[`, or `(` marks a word start;
/// anything else marks a word end.
fn convert_word_boundaries(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(r"\b") {
            let next = after.bytes().next();
            let word_start = matches!(
                next,
                Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9') | Some(b'[') | Some(b'(')
            );
            out.push_str(if word_start { r"\b{start}" } else { r"\b{end}" });
            rest = after;
        } else {
            let c = rest.chars().next().expect("non-empty");
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// An ordered list of compiled normalization rules.
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    /// A ruleset with no rules; `apply` is the identity.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Load rules from a CSV file. A missing file yields an empty ruleset;
    /// a rule whose pattern does not compile is logged and dropped.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                log::debug!("no normalization rules at {}", path.display());
                return Self::empty();
            }
        };
        let ruleset = Self::parse(&content);
        if !ruleset.rules.is_empty() {
            log::info!("loaded {} normalization rules", ruleset.rules.len());
        }
        ruleset
    }

    /// Parse rules from CSV text: `pattern,replacement` per line, `#` starts
    /// a comment, blank lines and lines without a comma are skipped.
    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((pattern, replacement)) = line.split_once(',') else {
                continue;
            };
            let converted = convert_word_boundaries(pattern);
            match Regex::new(&converted) {
                Ok(regex) => rules.push(Rule {
                    pattern: regex,
                    replacement: replacement.to_string(),
                }),
                Err(err) => {
                    log::warn!("invalid rule pattern '{}': {}", pattern, err);
                }
            }
        }
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order; the output of rule *i* is the input of
    /// rule *i + 1*.
    pub fn apply(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            current = rule.apply(&current);
        }
        current
    }
}
