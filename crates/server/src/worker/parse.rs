// crates/server/src/worker/parse.rs
//! Credential line parsing.
//!
//! Dump lines arrive in a handful of well-known shapes:
//! `url<sep>username<sep>password` (separator `:`, `;`, `|` or tab,
//! URL may carry a port) and bare `email<sep>password`. Anything else
//! is counted as unparsed — malformed lines are statistics, never
//! failures.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

/// One parsed credential observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Origin URL; empty for bare `email:password` lines.
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Parse result for one batch of raw lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    pub records: Vec<CredentialRecord>,
    pub parsed: u64,
    pub unparsed: u64,
}

// Lazy url segment so `https://host:8080/x:user:pass` backtracks the
// port/path into the url group instead of the username.
fn url_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<url>[A-Za-z][A-Za-z0-9+.-]*://[^\s;|]+?)[:;|\t](?P<user>[^\s:;|]+)[:;|\t](?P<pass>[^\s:;|]+)$",
        )
        .expect("url credential pattern compiles")
    })
}

fn email_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<user>[^\s:;|@]+@[^\s:;|]+)[:;|\t](?P<pass>[^\s:;|]+)$")
            .expect("email credential pattern compiles")
    })
}

/// Parse a single raw line, if it matches a known credential shape.
pub fn parse_line(line: &str) -> Option<CredentialRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = url_line().captures(line) {
        return Some(CredentialRecord {
            url: caps["url"].to_string(),
            username: caps["user"].to_string(),
            password: caps["pass"].to_string(),
        });
    }
    if let Some(caps) = email_line().captures(line) {
        return Some(CredentialRecord {
            url: String::new(),
            username: caps["user"].to_string(),
            password: caps["pass"].to_string(),
        });
    }
    None
}

/// Parse a batch, tracking parsed/unparsed counts.
pub fn parse_lines(lines: &[String]) -> ParseOutput {
    let mut output = ParseOutput::default();
    for line in lines {
        match parse_line(line) {
            Some(record) => {
                output.parsed += 1;
                output.records.push(record);
            }
            None => output.unparsed += 1,
        }
    }
    output
}
