//! Verification code and link extraction from message bodies.
//!
//! [`CodeExtractor`] is stateless and never fails: an unusable body simply yields
//! no match. Bodies are first projected onto their visible text when they contain
//! markup, so codes split across tags or hidden behind entities are still found.
//!
//! # Example
//!
//! ```
//! use tempmail_sync::CodeExtractor;
//!
//! let extractor = CodeExtractor::new();
//! assert_eq!(
//!     extractor.extract_code("Your verification code: 482913. Thanks.").as_deref(),
//!     Some("482913")
//! );
//! assert_eq!(
//!     extractor.extract_link(r#"<a href="https://x.io/confirm/abc">Confirm</a>"#).as_deref(),
//!     Some("https://x.io/confirm/abc")
//! );
//! ```

use crate::html;
use crate::matcher::{is_verification_href, CodeMatcher, LinkMatcher, Matcher};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Code and link found in one body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Best-guess verification code.
    pub code: Option<String>,
    /// Best-guess verification link.
    pub link: Option<String>,
}

impl ExtractionResult {
    /// Returns `true` if neither a code nor a link was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.link.is_none()
    }
}

/// Heuristic extractor for verification codes and links.
pub struct CodeExtractor {
    code: Box<dyn Matcher>,
    link: Box<dyn Matcher>,
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeExtractor {
    /// Creates an extractor with the built-in layered code search and
    /// keyword link search.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code: Box::new(CodeMatcher::layered()),
            link: Box::new(LinkMatcher::new()),
        }
    }

    /// Creates an extractor with custom matchers.
    ///
    /// `link` is used for the text scan that runs when no anchor qualifies.
    #[must_use]
    pub fn with_matchers(code: Box<dyn Matcher>, link: Box<dyn Matcher>) -> Self {
        Self { code, link }
    }

    /// Returns the best-guess verification code in `body`.
    #[must_use]
    pub fn extract_code(&self, body: &str) -> Option<String> {
        guarded("extract_code", || {
            let text = normalize(body);
            let code = self.code.find_match(&text).map(Cow::into_owned);
            debug!(
                matcher = %self.code.description(),
                found = code.is_some(),
                "Searched body for verification code"
            );
            code
        })
    }

    /// Returns the best-guess verification link in `body`.
    ///
    /// Anchors whose target mentions a verification keyword win over URLs found
    /// in the text.
    #[must_use]
    pub fn extract_link(&self, body: &str) -> Option<String> {
        guarded("extract_link", || {
            if let Some(href) = html::anchor_hrefs(body)
                .into_iter()
                .find(|href| is_verification_href(href))
            {
                debug!("Found verification link in anchor");
                return Some(href);
            }

            let text = normalize(body);
            let link = self
                .link
                .find_match(&text)
                .or_else(|| self.link.find_match(body))
                .map(Cow::into_owned);
            debug!(
                matcher = %self.link.description(),
                found = link.is_some(),
                "Searched body text for verification link"
            );
            link
        })
    }

    /// Extracts both code and link from `body`.
    #[must_use]
    pub fn extract(&self, body: &str) -> ExtractionResult {
        ExtractionResult {
            code: self.extract_code(body),
            link: self.extract_link(body),
        }
    }

    /// Extracts from a message: the code from its text body (falling back to
    /// the HTML body), the link from its HTML body (falling back to the text).
    #[must_use]
    pub fn extract_from_message(&self, message: &Message) -> ExtractionResult {
        let html = message.html_body.as_deref();

        let code = self
            .extract_code(&message.text_body)
            .or_else(|| html.and_then(|h| self.extract_code(h)));
        let link = html
            .and_then(|h| self.extract_link(h))
            .or_else(|| self.extract_link(&message.text_body));

        ExtractionResult { code, link }
    }
}

impl std::fmt::Debug for CodeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeExtractor")
            .field("code", &self.code.description())
            .field("link", &self.link.description())
            .finish()
    }
}

/// Visible text of `body`, or `body` itself when it has no usable markup.
fn normalize(body: &str) -> Cow<'_, str> {
    match html::visible_text(body) {
        Some(text) => Cow::Owned(text),
        None => Cow::Borrowed(body),
    }
}

/// Runs an extraction step, turning a panic inside a matcher into "no match".
fn guarded<F>(operation: &'static str, step: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(found) => found,
        Err(_) => {
            warn!(operation, "Extraction failed, treating body as having no match");
            None
        }
    }
}
