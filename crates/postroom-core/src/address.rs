//! Address list parsing and syntactic validation.
//!
//! The grammar is the practical RFC 5322 subset most providers accept:
//! dot-separated atoms for the local part, dot-separated alphanumeric
//! labels (internal hyphens allowed) for the domain, at least two
//! labels. The match is anchored at both ends of the trimmed input.

use crate::error::{Error, Result};

/// Parses a comma-separated address list.
///
/// Entries are trimmed; empty entries are dropped. Order and duplicates
/// are preserved. An empty or all-whitespace input yields an empty list.
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Checks a single address against the grammar.
#[must_use]
pub fn is_valid(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => is_valid_local(local) && is_valid_domain(domain),
        None => false,
    }
}

/// Validates every address, failing fast on the first invalid one.
///
/// An empty slice succeeds trivially; "at least one recipient" is a
/// business rule enforced by the caller, not here.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] naming the first offending address
/// in input order.
pub fn validate_all(addresses: &[String]) -> Result<()> {
    for address in addresses {
        if !is_valid(address) {
            return Err(Error::InvalidAddress {
                address: address.clone(),
            });
        }
    }
    Ok(())
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~-".contains(c)
}

/// One or more atoms separated by single dots; no leading, trailing or
/// consecutive dots.
fn is_valid_local(local: &str) -> bool {
    !local.is_empty()
        && local
            .split('.')
            .all(|atom| !atom.is_empty() && atom.chars().all(is_atom_char))
}

/// Two or more dot-separated labels.
fn is_valid_domain(domain: &str) -> bool {
    let mut labels = 0;
    for label in domain.split('.') {
        if !is_valid_label(label) {
            return false;
        }
        labels += 1;
    }
    labels >= 2
}

/// Alphanumeric with optional internal hyphens; never starts or ends
/// with a hyphen.
fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}
