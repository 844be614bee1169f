//! Slug normalization.
//!
//! Turns a free-text display name or a pasted social profile URL into a
//! canonical username candidate: lowercase ASCII drawn from `[a-z0-9._-]`,
//! with no doubled separators and no separator at either end.
//!
//! The steps run in a fixed order and several of them depend on that order:
//! the minimum-length filler is decided on the length before
//! transliteration, and separators are collapsed more than once because
//! earlier replacements can make new neighbours.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::translit::transliterate;

/// Social platforms whose profile URLs carry the handle in the first path
/// segment.
pub const KNOWN_PROFILE_DOMAINS: [&str; 4] =
    ["facebook.com", "instagram.com", "fb.me", "eventbrite.com"];

/// Appended once when the input is shorter than the minimum length.
pub const FILLER: char = 'x';

/// Shortest profile path segment taken as a handle without the fallback.
const MIN_PATH_HANDLE: usize = 3;

/// Length bounds applied while normalizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlugOptions {
    pub min_length: usize,
    pub max_length: usize,
}

impl SlugOptions {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }
}

impl Default for SlugOptions {
    fn default() -> Self {
        Self::new(2, 30)
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("failed to compile slug regex"))
}

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[^a-z0-9._\-]")
}

fn period_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\.{2,}")
}

fn dash_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"-{2,}")
}

fn period_dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\.-")
}

fn dash_period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"-\.")
}

fn trailing_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[.\-]$")
}

fn leading_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[.\-]")
}

// Combining Diacritical Marks block only.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Compatibility-compose `s` and drop any combining marks that did not fold
/// into a precomposed character.
pub fn normalize_unicode(s: &str) -> String {
    s.nfkc().filter(|c| !is_combining_mark(*c)).collect()
}

/// Compatibility-decompose `s` and drop the combining marks, leaving base
/// letters ("é" becomes "e", "й" becomes "и").
pub fn strip_diacritics(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn is_url_like(s: &str) -> bool {
    s.starts_with("http") || s.starts_with("www")
}

/// True when `domain` contains any of [`KNOWN_PROFILE_DOMAINS`].
pub fn is_known_profile_domain(domain: &str) -> bool {
    KNOWN_PROFILE_DOMAINS
        .iter()
        .any(|known| domain.contains(known))
}

/// Reduce a URL to the part worth keeping as a handle.
///
/// Known profile domains yield the first path segment. A segment shorter
/// than three characters falls back to the whole domain and path with every
/// known domain name cut out. Unknown domains yield the bare domain.
fn handle_from_url(url: &str) -> String {
    let mut rest = url;
    for prefix in ["https://", "http://", "www."] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }
    // Mobile host prefix, but not when "m" is the whole first label ("m.me").
    if let Some(stripped) = rest.strip_prefix("m.") {
        let host = stripped.split(['/', '?', '#']).next().unwrap_or_default();
        if host.contains('.') {
            rest = stripped;
        }
    }
    let rest = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let (domain, path) = rest.split_once('/').unwrap_or((rest, ""));
    if !is_known_profile_domain(domain) {
        return domain.to_string();
    }

    let segment = path.split('/').next().unwrap_or_default();
    if segment.chars().count() >= MIN_PATH_HANDLE {
        return segment.to_string();
    }

    KNOWN_PROFILE_DOMAINS
        .iter()
        .fold(rest.to_string(), |acc, known| acc.replace(known, ""))
}

/// Normalize `name` with the default 2..=30 length bounds.
pub fn get_slug(name: &str) -> String {
    get_slug_with(name, SlugOptions::default())
}

/// Normalize `name` into a canonical username candidate.
///
/// Never fails. The result may be empty when nothing usable survives, for
/// example a bare profile-domain URL.
pub fn get_slug_with(name: &str, opts: SlugOptions) -> String {
    let lowered = name.to_lowercase();

    // URLs are cut after the handle is extracted so the handle survives.
    let truncated = if is_url_like(&lowered) {
        lowered
    } else {
        truncate_chars(&lowered, opts.max_length)
    };

    let mut result = strip_diacritics(&normalize_unicode(&truncated));

    if result.chars().count() < opts.min_length {
        result.push(FILLER);
    }

    result = transliterate(&result);

    if is_url_like(&result) {
        result = handle_from_url(&result);
    }

    result = result.trim().replace(' ', "-");
    result = strip_diacritics(&result);

    result = disallowed_re().replace_all(&result, "").into_owned();
    result = period_run_re().replace_all(&result, ".").into_owned();
    result = dash_run_re().replace_all(&result, "-").into_owned();
    result = period_dash_re().replace_all(&result, "-").into_owned();
    result = dash_period_re().replace_all(&result, "-").into_owned();
    result = trailing_separator_re().replace(&result, "").into_owned();
    result = leading_separator_re().replace(&result, "").into_owned();
    result = dash_run_re().replace_all(&result, "-").into_owned();

    bound(result, opts.max_length)
}

// Transliteration can lengthen the text and a single strip pass can leave a
// separator behind, so the canonical shape is enforced once more here.
fn bound(result: String, max_length: usize) -> String {
    let cut = if result.chars().count() > max_length {
        truncate_chars(&result, max_length)
    } else {
        result
    };
    cut.trim_matches(|c: char| c == '.' || c == '-').to_string()
}
