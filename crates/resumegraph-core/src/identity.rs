//! Deterministic candidate identity keys.
//!
//! The key is a BLAKE3 hash of a tagged, normalized identity string:
//!
//! 1. email present in contact: `email:<email>`
//! 2. phone number present:     `name:<name>|phone:<digits>`
//! 3. other non-empty contact:  `name:<name>|contact:<contact>`
//! 4. no contact:               `name:<name>`
//!
//! Case 4 means two different people with the same name and no contact
//! details resolve to the same Candidate node.

use crate::types::{name_key, CandidateId};

/// Number of hex characters kept from the BLAKE3 digest.
const KEY_LEN: usize = 32;

/// Compute the identity key for a candidate.
pub fn candidate_identity(name: &str, contact: &str) -> CandidateId {
    let material = identity_material(name, contact);
    let digest = blake3::hash(material.as_bytes()).to_hex();
    CandidateId(digest.as_str()[..KEY_LEN].to_string())
}

/// The pre-hash identity string.
pub fn identity_material(name: &str, contact: &str) -> String {
    let name = name_key(name);
    let contact = collapse_whitespace(contact);

    if let Some(email) = find_email(&contact) {
        return format!("email:{}", email.to_lowercase());
    }
    if let Some(digits) = find_phone_digits(&contact) {
        return format!("name:{name}|phone:{digits}");
    }
    if !contact.is_empty() {
        return format!("name:{name}|contact:{}", contact.to_lowercase());
    }
    format!("name:{name}")
}

/// First token that looks like an email address.
pub fn find_email(text: &str) -> Option<&str> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '<' | '>' | '(' | ')'))
        .map(|token| token.trim_matches(|c: char| matches!(c, '.' | ':' | '"' | '\'')))
        .find(|token| {
            let Some((local, domain)) = token.split_once('@') else {
                return false;
            };
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
}

/// Digits of a phone number, if the text carries one (7 to 15 digits).
pub fn find_phone_digits(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if (7..=15).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_wins_over_name() {
        let a = candidate_identity("John Doe", "john@example.com");
        let b = candidate_identity("Johnny Doe", "JOHN@example.com ");
        assert_eq!(a, b);
        assert_eq!(
            identity_material("John Doe", "Mail: <john@example.com>"),
            "email:john@example.com"
        );
    }

    #[test]
    fn phone_combines_with_name() {
        assert_eq!(
            identity_material("Jane  Roe", "+1 (555) 010-2030"),
            "name:jane roe|phone:15550102030"
        );
        assert_ne!(
            candidate_identity("Jane Roe", "555-010-2030"),
            candidate_identity("Jane Ray", "555-010-2030")
        );
    }

    #[test]
    fn name_only_fallback_is_deterministic() {
        assert_eq!(identity_material(" Ada   Lovelace ", ""), "name:ada lovelace");
        assert_eq!(
            candidate_identity("Ada Lovelace", ""),
            candidate_identity("ada lovelace", "   ")
        );
    }

    #[test]
    fn opaque_contact_is_kept() {
        assert_eq!(
            identity_material("Ada Lovelace", "github.com/ada"),
            "name:ada lovelace|contact:github.com/ada"
        );
    }

    #[test]
    fn key_is_fixed_length_hex() {
        let id = candidate_identity("Ada Lovelace", "");
        assert_eq!(id.0.len(), KEY_LEN);
        assert!(id.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn email_detection() {
        assert_eq!(find_email("reach me at a.b@c.io."), Some("a.b@c.io"));
        assert_eq!(find_email("@handle"), None);
        assert_eq!(find_email("x@localhost"), None);
    }
}
