//! Example: Extract verification codes and links from message bodies.
//!
//! Runs the built-in extractor over a few typical bodies, then plugs in a custom
//! matcher. No network access needed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example extract_code
//! # Or pass your own body
//! cargo run --example extract_code -- "Your security code is 7F3K9Q"
//! ```

use std::borrow::Cow;
use std::env;
use tempmail_sync::matcher::{ClosureMatcher, LinkMatcher, Matcher, RegexMatcher};
use tempmail_sync::CodeExtractor;

const SAMPLES: &[&str] = &[
    "Your verification code: 482913. Thanks.",
    r#"<html><body><p>Hi!</p><p>Use <strong>A1B2C3</strong> to sign in.</p></body></html>"#,
    r#"<a href="https://x.io/home">Home</a> <a href="https://x.io/confirm/abc">Confirm</a>"#,
    "Click https://accounts.example.com/activate/42?t=ab to finish signing up.",
    "No code in here",
];

/// Picks the value after "Ticket:" on its own line.
fn ticket_matcher() -> impl Matcher {
    ClosureMatcher::new(
        |text| {
            text.lines()
                .find_map(|line| line.trim().strip_prefix("Ticket:"))
                .map(|rest| Cow::Owned(rest.trim().to_string()))
        },
        "ticket line",
    )
}

fn main() {
    let extractor = CodeExtractor::new();

    let custom: Vec<String> = env::args().skip(1).collect();
    let bodies: Vec<&str> = if custom.is_empty() {
        SAMPLES.to_vec()
    } else {
        custom.iter().map(String::as_str).collect()
    };

    for body in bodies {
        let result = extractor.extract(body);
        println!("{body}\n  code: {:?}\n  link: {:?}\n", result.code, result.link);
    }

    let pin = RegexMatcher::with_description(r"PIN[:\s]+(\d{4})", "4-digit PIN")
        .expect("valid regex");
    let custom = CodeExtractor::with_matchers(
        Box::new(pin),
        Box::new(LinkMatcher::for_domain("example.com")),
    );
    println!(
        "custom PIN: {:?}",
        custom.extract_code("Your PIN: 0420 (expires soon)")
    );

    let ticket = ticket_matcher();
    println!(
        "{}: {:?}",
        ticket.description(),
        ticket.find_match("Hello\nTicket: SUP-1182\nBye")
    );
}
