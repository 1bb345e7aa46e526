//! Pattern matching for extracting verification artifacts from message text.
//!
//! This module provides the [`Matcher`] trait and the building blocks the
//! [`CodeExtractor`](crate::CodeExtractor) is made of: plain regex layers, the ordered
//! [`CodeMatcher`] and the keyword-driven [`LinkMatcher`].
//!
//! # Example
//!
//! ```
//! use tempmail_sync::matcher::{CodeMatcher, LinkMatcher, Matcher, RegexMatcher};
//!
//! let code = CodeMatcher::layered();
//! assert_eq!(
//!     code.find_match("Your verification code: 482913. Thanks.").as_deref(),
//!     Some("482913")
//! );
//!
//! let link = LinkMatcher::new();
//! assert_eq!(
//!     link.find_match("Open https://x.io/verify/abc to continue").as_deref(),
//!     Some("https://x.io/verify/abc")
//! );
//!
//! let custom = RegexMatcher::new(r"token=([a-f0-9]+)").unwrap();
//! assert_eq!(custom.find_match("?token=abc123").as_deref(), Some("abc123"));
//! ```

use regex::Regex;
use std::borrow::Cow;

/// Trait for matching and extracting content from message text.
///
/// Implement this trait to plug custom layers into a [`CodeMatcher`] or a
/// [`CodeExtractor`](crate::CodeExtractor).
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    /// Uses `Cow<str>` to avoid allocations when the match can be borrowed
    /// directly from the input text.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns every match in document order.
    ///
    /// The default implementation yields at most the result of
    /// [`find_match`](Self::find_match).
    fn find_all<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        self.find_match(text).into_iter().collect()
    }

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group that took part in
/// the match, or the whole match when none did.
///
/// # Example
///
/// ```
/// use tempmail_sync::matcher::{RegexMatcher, Matcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
///
/// let words = RegexMatcher::new(r"\b\w{5}\b").unwrap();
/// assert_eq!(words.find_all("hello brave new world").len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
    keep: Option<fn(&str) -> bool>,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_description(pattern, format!("regex pattern: {pattern}"))
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            regex,
            description: description.into(),
            keep: None,
        })
    }

    /// Discards matches rejected by `keep`.
    #[must_use]
    pub fn keep(mut self, keep: fn(&str) -> bool) -> Self {
        self.keep = Some(keep);
        self
    }

    fn captured<'a>(&self, caps: &regex::Captures<'a>) -> Option<&'a str> {
        let m = caps
            .iter()
            .skip(1)
            .flatten()
            .next()
            .or_else(|| caps.get(0))?;
        let value = m.as_str();
        match self.keep {
            Some(keep) if !keep(value) => None,
            _ => Some(value),
        }
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures_iter(text)
            .find_map(|caps| self.captured(&caps))
            .map(Cow::Borrowed)
    }

    fn find_all<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| self.captured(&caps))
            .map(Cow::Borrowed)
            .collect()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Label-anchored code: "verification code: ABCD", "security code is AB12CD".
///
/// After an explicit separator (`:`, `#`, `-` or "is") any token counts. After
/// bare whitespace the token must carry a digit, so "code below" is prose.
const LABELED_CODE: &str = concat!(
    r"(?i)\b(?:verification|confirmation|security|one-time)\s+code\b",
    r"(?:\s*[:#\-]\s*(?:is\s+)?|\s+is\s+)([A-Z0-9]{4,8})\b",
    r"|\b(?:verification|confirmation|security|one-time)\s+code\s+([A-Z0-9]*[0-9][A-Z0-9]*)\b",
);

/// Bare alphanumeric code of 6-8 characters.
const ALPHANUMERIC_CODE: &str = r"(?i)\b[A-Z0-9]{6,8}\b";

/// Bare numeric code of 4-8 digits.
const NUMERIC_CODE: &str = r"\b[0-9]{4,8}\b";

fn is_code_length(token: &str) -> bool {
    (4..=8).contains(&token.len())
}

fn is_six_digits(token: &str) -> bool {
    token.len() == 6 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Ordered, layered search for verification codes.
///
/// Layers are tried in order and the first layer with any match wins. Among that
/// layer's matches an exactly-6-digit token is preferred; otherwise the first
/// match in document order is returned.
///
/// # Example
///
/// ```
/// use tempmail_sync::matcher::{CodeMatcher, Matcher};
///
/// let matcher = CodeMatcher::layered();
/// // Both tokens match the alphanumeric layer; the 6-digit one is preferred.
/// assert_eq!(matcher.find_match("Use ABCDEFG or 123456").as_deref(), Some("123456"));
/// assert_eq!(matcher.find_match("No code in here"), None);
/// ```
pub struct CodeMatcher {
    layers: Vec<Box<dyn Matcher>>,
    description: String,
}

impl CodeMatcher {
    /// Creates a matcher from custom layers, tried in the given order.
    #[must_use]
    pub fn new(layers: Vec<Box<dyn Matcher>>) -> Self {
        let description = layers
            .iter()
            .map(|layer| layer.description())
            .collect::<Vec<_>>()
            .join(" > ");
        Self {
            layers,
            description,
        }
    }

    /// The built-in layers: label-anchored, then bare alphanumeric, then bare numeric.
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile (should not happen).
    #[must_use]
    pub fn layered() -> Self {
        let labeled = RegexMatcher::with_description(LABELED_CODE, "labeled code")
            .expect("valid regex")
            .keep(is_code_length);
        let alphanumeric = RegexMatcher::with_description(ALPHANUMERIC_CODE, "alphanumeric code")
            .expect("valid regex");
        let numeric =
            RegexMatcher::with_description(NUMERIC_CODE, "numeric code").expect("valid regex");

        Self::new(vec![
            Box::new(labeled),
            Box::new(alphanumeric),
            Box::new(numeric),
        ])
    }
}

impl Default for CodeMatcher {
    fn default() -> Self {
        Self::layered()
    }
}

impl Matcher for CodeMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.layers.iter().find_map(|layer| {
            let mut matches = layer.find_all(text);
            if matches.is_empty() {
                return None;
            }
            let preferred = matches
                .iter()
                .position(|m| is_six_digits(m))
                .unwrap_or(0);
            Some(matches.swap_remove(preferred))
        })
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for CodeMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Path keywords that mark a verification link.
pub const LINK_KEYWORDS: [&str; 4] = ["verify", "confirm", "activate", "validation"];

/// Returns `true` if the href mentions one of [`LINK_KEYWORDS`] (case-insensitive).
#[must_use]
pub fn is_verification_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    LINK_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Matcher for absolute URLs whose path contains `/verify`, `/confirm`,
/// `/activate` or `/validation`.
///
/// Trailing sentence punctuation is not part of the returned URL.
///
/// # Example
///
/// ```
/// use tempmail_sync::matcher::{LinkMatcher, Matcher};
///
/// let matcher = LinkMatcher::for_domain("example.com");
/// let text = "Go to https://other.com/verify/1 or https://example.com/activate?t=abc.";
/// assert_eq!(matcher.find_match(text), Some("https://example.com/activate?t=abc".into()));
/// ```
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    inner: RegexMatcher,
}

impl LinkMatcher {
    /// Creates a matcher for verification URLs on any host.
    ///
    /// # Panics
    ///
    /// Panics if the built-in pattern fails to compile (should not happen).
    #[must_use]
    pub fn new() -> Self {
        let pattern =
            r#"(?i)https?://[^\s<>"']+?/(?:verify|confirm|activate|validation)[^\s<>"']*"#;
        Self {
            inner: RegexMatcher::with_description(pattern, "verification link")
                .expect("valid regex"),
        }
    }

    /// Creates a matcher for verification URLs on the given host.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern cannot be compiled (should not happen with a valid domain).
    #[must_use]
    pub fn for_domain(domain: &str) -> Self {
        let escaped_domain = regex::escape(domain);
        let pattern = format!(
            r#"(?i)https?://{escaped_domain}(?:/[^\s<>"']*?)?/(?:verify|confirm|activate|validation)[^\s<>"']*"#
        );
        Self {
            inner: RegexMatcher::with_description(&pattern, format!("verification link from {domain}"))
                .expect("valid regex"),
        }
    }

    /// Creates a matcher with a custom URL regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn custom(pattern: &str, description: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            inner: RegexMatcher::with_description(pattern, description)?,
        })
    }
}

impl Default for LinkMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_url(url: Cow<'_, str>) -> Cow<'_, str> {
    match url {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])),
        Cow::Owned(s) => Cow::Owned(
            s.trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
                .to_string(),
        ),
    }
}

impl Matcher for LinkMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text).map(trim_url)
    }

    fn find_all<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        self.inner.find_all(text).into_iter().map(trim_url).collect()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

/// Matcher using a closure for custom matching logic.
///
/// # Example
///
/// ```
/// use tempmail_sync::matcher::{ClosureMatcher, Matcher};
/// use std::borrow::Cow;
///
/// let matcher = ClosureMatcher::new(
///     |text| {
///         text.lines()
///             .find(|line| line.starts_with("PIN:"))
///             .map(|line| Cow::Owned(line.trim_start_matches("PIN:").trim().to_string()))
///     },
///     "PIN line extractor"
/// );
///
/// let text = "Hello\nPIN: 9F3K\nThanks";
/// assert_eq!(matcher.find_match(text).as_deref(), Some("9F3K"));
/// ```
pub struct ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    matcher_fn: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    /// Creates a new closure-based matcher.
    #[must_use]
    pub fn new(matcher_fn: F, description: impl Into<String>) -> Self {
        Self {
            matcher_fn,
            description: description.into(),
        }
    }
}

impl<F> Matcher for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        (self.matcher_fn)(text)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        assert_eq!(
            matcher.find_match("Your code: 12345").as_deref(),
            Some("12345")
        );
        assert_eq!(matcher.find_match("No code here"), None);
    }

    #[test]
    fn test_regex_matcher_returns_borrowed() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        let result = matcher.find_match("Your code: 12345");
        assert!(matches!(result, Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_regex_matcher_keep_filter() {
        let matcher = RegexMatcher::new(r"\b\w{4}\b")
            .unwrap()
            .keep(|token| token.bytes().any(|b| b.is_ascii_digit()));
        assert_eq!(matcher.find_match("code ab12 cd34").as_deref(), Some("ab12"));
        assert_eq!(matcher.find_all("code ab12 cd34").len(), 2);
    }

    #[test]
    fn test_labeled_code_wins() {
        let matcher = CodeMatcher::layered();
        assert_eq!(
            matcher
                .find_match("Order 123456. Your security code is 7731.")
                .as_deref(),
            Some("7731")
        );
        assert_eq!(
            matcher.find_match("One-Time Code - AB12CD").as_deref(),
            Some("AB12CD")
        );
    }

    #[test]
    fn test_labeled_letters_only_code() {
        let matcher = CodeMatcher::layered();
        assert_eq!(
            matcher
                .find_match("Hello, welcome! Your confirmation code is WXYZAB")
                .as_deref(),
            Some("WXYZAB")
        );
        assert_eq!(
            matcher.find_match("Your verification code: ABCD").as_deref(),
            Some("ABCD")
        );
    }

    #[test]
    fn test_labeled_code_after_whitespace_needs_digit() {
        let matcher = CodeMatcher::layered();
        assert_eq!(
            matcher.find_match("Security code 48A1Z").as_deref(),
            Some("48A1Z")
        );
        assert_eq!(
            matcher.find_match("Enter the verification code below"),
            None
        );
    }

    #[test]
    fn test_regex_matcher_uses_participating_group() {
        let matcher = RegexMatcher::new(r"a=(\d+)|b=(\d+)").unwrap();
        assert_eq!(matcher.find_match("b=7").as_deref(), Some("7"));
        assert_eq!(matcher.find_match("a=3").as_deref(), Some("3"));
    }

    #[test]
    fn test_alphanumeric_layer_prefers_six_digits() {
        let matcher = CodeMatcher::layered();
        assert_eq!(
            matcher.find_match("Hello friend, use 123456").as_deref(),
            Some("123456")
        );
        assert_eq!(
            matcher.find_match("Token XK9PL2Q issued").as_deref(),
            Some("XK9PL2Q")
        );
    }

    #[test]
    fn test_numeric_layer() {
        let matcher = CodeMatcher::layered();
        assert_eq!(matcher.find_match("PIN 4821 ok").as_deref(), Some("4821"));
        assert_eq!(matcher.find_match("Code: 123"), None);
    }

    #[test]
    fn test_custom_layers() {
        let matcher = CodeMatcher::new(vec![Box::new(
            RegexMatcher::with_description(r"PIN-(\d{3})", "pin").unwrap(),
        )]);
        assert_eq!(matcher.find_match("PIN-042").as_deref(), Some("042"));
        assert_eq!(matcher.description(), "pin");
    }

    #[test]
    fn test_link_matcher() {
        let matcher = LinkMatcher::new();
        assert_eq!(
            matcher
                .find_match("Click https://x.io/account/confirm?token=1, then relax.")
                .as_deref(),
            Some("https://x.io/account/confirm?token=1")
        );
        assert_eq!(matcher.find_match("Visit https://x.io/about"), None);
    }

    #[test]
    fn test_link_matcher_for_domain() {
        let matcher = LinkMatcher::for_domain("example.com");
        assert_eq!(matcher.find_match("https://other.com/verify/1"), None);
        assert_eq!(
            matcher.find_match("https://example.com/validation/7").as_deref(),
            Some("https://example.com/validation/7")
        );
    }

    #[test]
    fn test_is_verification_href() {
        assert!(is_verification_href("https://x.io/ACTIVATE/1"));
        assert!(!is_verification_href("https://x.io/unsubscribe"));
    }

    #[test]
    fn test_closure_matcher() {
        let matcher = ClosureMatcher::new(
            |text| {
                text.lines()
                    .find(|line| line.contains("SECRET"))
                    .map(|line| Cow::Owned(line.replace("SECRET:", "").trim().to_string()))
            },
            "secret extractor",
        );

        let text = "Header\nSECRET: my-value\nFooter";
        assert_eq!(matcher.find_match(text).as_deref(), Some("my-value"));
        assert_eq!(matcher.find_all(text).len(), 1);
    }
}
