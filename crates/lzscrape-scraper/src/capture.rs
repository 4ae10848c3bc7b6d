//! Turns a browser's "Copy as cURL" output into a replayable request.
//!
//! Handles the quoting styles browsers emit: POSIX single/double quotes,
//! bash ANSI-C `$'...'` strings, backslash-newline continuations, and the
//! Windows `cmd` flavour that escapes with `^`. Parsing is pure; nothing here
//! talks to the network.

use std::fmt;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use lzscrape_core::CaptureRequirements;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ScraperError;

/// Headers never replayed from a capture. The client manages transport
/// details itself, and cookies are re-emitted from [`CapturedRequest::cookies`].
const NON_REPLAYED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "accept-encoding",
    "connection",
    "cookie",
];

/// curl options that take a value we do not use.
const IGNORED_VALUE_FLAGS: &[&str] = &[
    "-o",
    "--output",
    "-m",
    "--max-time",
    "--connect-timeout",
    "-x",
    "--proxy",
    "-u",
    "--user",
    "-w",
    "--write-out",
    "--retry",
];

/// Short flags whose value may be glued on, as in `-XPOST`.
const SHORT_VALUE_FLAGS: &[char] = &['X', 'H', 'b', 'A', 'e', 'd'];

#[derive(Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    /// Header name/value pairs in capture order, original spelling kept.
    pub headers: Vec<(String, String)>,
    /// Cookie name/value pairs in capture order.
    pub cookies: Vec<(String, String)>,
    pub body: Option<String>,
}

impl fmt::Debug for CapturedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cookie_names: Vec<&str> = self.cookies.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("CapturedRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .field("cookies", &cookie_names)
            .field("body", &self.body.as_ref().map(String::len))
            .finish()
    }
}

impl CapturedRequest {
    /// Parses raw curl text.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidCapture`] when the text is not a curl
    /// command, has unbalanced quotes, lacks a URL, or carries a header that
    /// is not valid HTTP.
    pub fn parse(text: &str) -> Result<Self, ScraperError> {
        let tokens = tokenize(text)?;
        parse_tokens(tokens)
    }

    /// Parses raw curl text and checks it against `requirements`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::parse`] and [`Self::validate`].
    pub fn parse_validated(
        text: &str,
        requirements: &CaptureRequirements,
    ) -> Result<Self, ScraperError> {
        let request = Self::parse(text)?;
        request.validate(requirements)?;
        Ok(request)
    }

    /// Reads and validates the capture file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidCapture`] if the file is missing,
    /// unreadable, empty, or fails [`Self::parse_validated`].
    pub fn from_file(path: &Path, requirements: &CaptureRequirements) -> Result<Self, ScraperError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScraperError::invalid_capture(format!(
                "cannot read capture file {}: {e}",
                path.display()
            ))
        })?;
        if text.trim().is_empty() {
            return Err(ScraperError::invalid_capture(format!(
                "capture file {} is empty",
                path.display()
            )));
        }
        Self::parse_validated(&text, requirements)
    }

    /// Checks presence of the required headers and at least one session cookie.
    /// Cookie values are not checked against the live site.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidCapture`] naming what is missing.
    pub fn validate(&self, requirements: &CaptureRequirements) -> Result<(), ScraperError> {
        let missing: Vec<&str> = requirements
            .required_headers
            .iter()
            .filter(|name| self.header(name).is_none_or(|v| v.trim().is_empty()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ScraperError::invalid_capture(format!(
                "missing required header(s): {}",
                missing.join(", ")
            )));
        }

        let has_session = requirements
            .session_cookies
            .iter()
            .any(|name| self.cookie(name).is_some_and(|v| !v.is_empty()));
        if !has_session {
            return Err(ScraperError::invalid_capture(format!(
                "no session cookie present (expected one of: {})",
                requirements.session_cookies.join(", ")
            )));
        }

        Ok(())
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All cookies joined into one `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Headers to send when replaying the capture, including the `Cookie`
    /// header rebuilt from [`Self::cookies`].
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidCapture`] if a header cannot be encoded.
    pub fn replay_headers(&self) -> Result<HeaderMap, ScraperError> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            if NON_REPLAYED_HEADERS
                .iter()
                .any(|skip| name.eq_ignore_ascii_case(skip))
            {
                continue;
            }
            let (name, value) = encode_header(name, value)?;
            map.insert(name, value);
        }
        if let Some(cookie) = self.cookie_header() {
            let (name, value) = encode_header("cookie", &cookie)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

fn encode_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ScraperError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ScraperError::invalid_capture(format!("bad header name '{name}': {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| ScraperError::invalid_capture(format!("bad value for header '{name}': {e}")))?;
    Ok((header_name, header_value))
}

// ---------------------------------------------------------------------------
// Flag parsing
// ---------------------------------------------------------------------------

fn parse_tokens(tokens: Vec<String>) -> Result<CapturedRequest, ScraperError> {
    let mut iter = tokens.into_iter();

    let program = iter
        .next()
        .ok_or_else(|| ScraperError::invalid_capture("capture is empty"))?;
    if !is_curl_program(&program) {
        return Err(ScraperError::invalid_capture(format!(
            "expected a curl command, found '{program}'"
        )));
    }

    let mut method: Option<String> = None;
    let mut force_get = false;
    let mut url: Option<String> = None;
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut cookies: Vec<(String, String)> = Vec::new();
    let mut data: Vec<String> = Vec::new();

    while let Some(token) = iter.next() {
        let (flag, inline) = split_flag(token);
        match flag.as_str() {
            "-X" | "--request" => {
                method = Some(take_value(&flag, inline, &mut iter)?.to_ascii_uppercase());
            }
            "-H" | "--header" => {
                let raw = take_value(&flag, inline, &mut iter)?;
                push_header(&raw, &mut headers, &mut cookies)?;
            }
            "-b" | "--cookie" => {
                let raw = take_value(&flag, inline, &mut iter)?;
                // Without '=' the value names a cookie jar file.
                if raw.contains('=') {
                    parse_cookie_pairs(&raw, &mut cookies);
                }
            }
            "-A" | "--user-agent" => {
                let value = take_value(&flag, inline, &mut iter)?;
                set_pair(&mut headers, "User-Agent", value, true);
            }
            "-e" | "--referer" => {
                let value = take_value(&flag, inline, &mut iter)?;
                set_pair(&mut headers, "Referer", value, true);
            }
            "--url" => url = Some(take_value(&flag, inline, &mut iter)?),
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii"
            | "--data-urlencode" => data.push(take_value(&flag, inline, &mut iter)?),
            "-G" | "--get" => force_get = true,
            f if IGNORED_VALUE_FLAGS.contains(&f) => {
                take_value(&flag, inline, &mut iter)?;
            }
            f if f.len() > 1 && f.starts_with('-') => {
                tracing::trace!(flag = f, "ignoring curl flag");
            }
            _ => {
                if url.is_some() {
                    return Err(ScraperError::invalid_capture(format!(
                        "unexpected extra argument '{flag}'"
                    )));
                }
                url = Some(flag);
            }
        }
    }

    let mut url = url.ok_or_else(|| ScraperError::invalid_capture("no URL found in capture"))?;

    let method = match method {
        Some(m) => m,
        None if !data.is_empty() && !force_get => "POST".to_string(),
        None => "GET".to_string(),
    };

    let mut body = None;
    if !data.is_empty() {
        let joined = data.join("&");
        if force_get {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&joined);
        } else {
            body = Some(joined);
        }
    }

    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| ScraperError::invalid_capture(format!("URL '{url}' is not valid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScraperError::invalid_capture(format!(
            "URL '{url}' is not http(s)"
        )));
    }

    Ok(CapturedRequest {
        method,
        url,
        headers,
        cookies,
        body,
    })
}

fn is_curl_program(token: &str) -> bool {
    let base = token.rsplit(['/', '\\']).next().unwrap_or(token);
    base.eq_ignore_ascii_case("curl") || base.eq_ignore_ascii_case("curl.exe")
}

/// Splits `--flag=value` and glued short flags (`-XPOST`) into flag and value.
fn split_flag(token: String) -> (String, Option<String>) {
    if token.starts_with("--") {
        if let Some((name, value)) = token.split_once('=') {
            return (name.to_string(), Some(value.to_string()));
        }
        return (token, None);
    }
    let mut chars = token.chars();
    if chars.next() == Some('-') {
        if let Some(short) = chars.next() {
            let rest = chars.as_str();
            if !rest.is_empty() && SHORT_VALUE_FLAGS.contains(&short) {
                return (format!("-{short}"), Some(rest.to_string()));
            }
        }
    }
    (token, None)
}

fn take_value(
    flag: &str,
    inline: Option<String>,
    iter: &mut impl Iterator<Item = String>,
) -> Result<String, ScraperError> {
    inline
        .or_else(|| iter.next())
        .ok_or_else(|| ScraperError::invalid_capture(format!("flag {flag} is missing its value")))
}

fn push_header(
    raw: &str,
    headers: &mut Vec<(String, String)>,
    cookies: &mut Vec<(String, String)>,
) -> Result<(), ScraperError> {
    let (name, value) = match raw.split_once(':') {
        Some((n, v)) => (n.trim(), v.trim()),
        // curl's `-H 'X-Empty;'` sends the header with no value.
        None => match raw.trim().strip_suffix(';') {
            Some(n) => (n.trim(), ""),
            None => {
                return Err(ScraperError::invalid_capture(format!(
                    "header '{raw}' has no ':' separator"
                )))
            }
        },
    };

    // `:authority` style pseudo headers split on their leading colon.
    if name.is_empty() {
        return Ok(());
    }

    if name.eq_ignore_ascii_case("cookie") {
        parse_cookie_pairs(value, cookies);
        return Ok(());
    }

    encode_header(name, value)?;
    set_pair(headers, name, value.to_string(), true);
    Ok(())
}

fn parse_cookie_pairs(raw: &str, cookies: &mut Vec<(String, String)>) {
    for pair in raw.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        set_pair(cookies, name, value.trim().to_string(), false);
    }
}

/// Replaces an existing entry in place (keeping its position) or appends.
fn set_pair(pairs: &mut Vec<(String, String)>, name: &str, value: String, ignore_case: bool) {
    let existing = pairs.iter_mut().find(|(n, _)| {
        if ignore_case {
            n.eq_ignore_ascii_case(name)
        } else {
            n == name
        }
    });
    match existing {
        Some((_, v)) => *v = value,
        None => pairs.push((name.to_string(), value)),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize(text: &str) -> Result<Vec<String>, ScraperError> {
    let normalized;
    let text = if is_cmd_style(text) {
        normalized = strip_cmd_escapes(text);
        normalized.as_str()
    } else {
        text
    };

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                read_single_quoted(&mut chars, &mut current)?;
            }
            '"' => {
                in_word = true;
                read_double_quoted(&mut chars, &mut current)?;
            }
            '$' if chars.peek() == Some(&'\'') => {
                chars.next();
                in_word = true;
                read_ansi_c_quoted(&mut chars, &mut current)?;
            }
            '\\' => match chars.next() {
                Some('\n') | None => {}
                Some('\r') => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                Some(escaped) => {
                    in_word = true;
                    current.push(escaped);
                }
            },
            c if c.is_whitespace() => {
                if in_word {
                    tokens.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        tokens.push(current);
    }

    Ok(tokens)
}

fn unterminated(kind: &str) -> ScraperError {
    ScraperError::invalid_capture(format!("unterminated {kind} quote"))
}

fn read_single_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), ScraperError> {
    loop {
        match chars.next() {
            None => return Err(unterminated("single")),
            Some('\'') => return Ok(()),
            Some(c) => out.push(c),
        }
    }
}

fn read_double_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), ScraperError> {
    loop {
        match chars.next() {
            None => return Err(unterminated("double")),
            Some('"') => return Ok(()),
            Some('\\') => match chars.next() {
                None => return Err(unterminated("double")),
                Some('\n') => {}
                Some(c @ ('"' | '\\' | '$' | '`')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
            },
            Some(c) => out.push(c),
        }
    }
}

fn read_ansi_c_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), ScraperError> {
    loop {
        match chars.next() {
            None => return Err(unterminated("$'")),
            Some('\'') => return Ok(()),
            Some('\\') => {
                let Some(escape) = chars.next() else {
                    return Err(unterminated("$'"));
                };
                match escape {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'a' => out.push('\u{07}'),
                    'b' => out.push('\u{08}'),
                    'f' => out.push('\u{0c}'),
                    'v' => out.push('\u{0b}'),
                    'e' | 'E' => out.push('\u{1b}'),
                    '\\' | '\'' | '"' | '?' => out.push(escape),
                    'x' => push_hex_escape(chars, out, 2, 'x'),
                    'u' => push_hex_escape(chars, out, 4, 'u'),
                    'U' => push_hex_escape(chars, out, 8, 'U'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            Some(c) => out.push(c),
        }
    }
}

fn push_hex_escape(chars: &mut Peekable<Chars<'_>>, out: &mut String, max_digits: usize, marker: char) {
    let mut digits = String::new();
    while digits.len() < max_digits {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    let decoded = u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(char::from_u32);
    match decoded {
        Some(c) if !digits.is_empty() => out.push(c),
        _ => {
            out.push('\\');
            out.push(marker);
            out.push_str(&digits);
        }
    }
}

/// Chrome's "Copy as cURL (cmd)" output: `curl ^"https://...^" ^` lines.
fn is_cmd_style(text: &str) -> bool {
    text.contains("^\"") || text.lines().any(|line| line.trim_end().ends_with(" ^"))
}

/// Removes `cmd` escapes: `^` + newline continues the line, `^x` means `x`.
fn strip_cmd_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '^' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | None => {}
            Some(escaped) => out.push(escaped),
        }
    }
    out
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod tests;
