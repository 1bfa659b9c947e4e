//! XML name validation and utilities
//!
//! Names supplied from outside a schema document (the configured root element,
//! extra namespace prefixes) are checked here before they reach the engine.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// Simplified NCName production: letters, underscore, then name characters
static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}_\-\.\u{B7}]*$").expect("NCName pattern is valid")
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    NCNAME.is_match(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Validate an NCName such as a namespace prefix
pub fn validate_ncname(name: &str) -> Result<()> {
    check(name, "NCName", is_valid_ncname(name))
}

/// Validate a `prefix:local` or `local` name
pub fn validate_qname(name: &str) -> Result<()> {
    check(name, "QName", is_valid_qname(name))
}

fn check(name: &str, production: &str, valid: bool) -> Result<()> {
    if valid {
        return Ok(());
    }
    Err(Error::Name(format!("Invalid {}: '{}'", production, name)))
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}
