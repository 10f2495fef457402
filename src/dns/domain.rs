//! Domain text normalisation.
//!
//! Every component compares domains as plain strings, so they all have to
//! agree on one spelling: lowercase, without the trailing root dot.

use hickory_proto::rr::Name;

/// Normalise a domain typed or received as text.
///
/// Returns `None` for the root and for names that are empty once trimmed.
#[must_use]
pub fn normalize(domain: &str) -> Option<String> {
    let trimmed = domain.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// Normalise the name carried by a DNS question.
///
/// Internationalised labels stay in their punycode form, which is how they
/// are stored.
#[must_use]
pub fn from_name(name: &Name) -> Option<String> {
    normalize(&name.to_ascii())
}

/// Strict parent suffixes of `domain`, most specific first, stopping at the
/// last two labels.
///
/// `a.b.c.com` yields `b.c.com` then `c.com`; a single-label name yields
/// nothing.
pub fn parent_suffixes(domain: &str) -> impl Iterator<Item = &str> {
    domain
        .match_indices('.')
        .map(move |(idx, _)| &domain[idx + 1..])
        .filter(|suffix| suffix.contains('.'))
}

/// Whether `domain` is `parent` or one of its subdomains.
#[must_use]
pub fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
    domain
        .strip_suffix(parent)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
}
