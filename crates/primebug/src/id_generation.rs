//! Hash-based identifiers for PrimeBug documents.
//!
//! Two kinds of identifiers are produced:
//!
//! - **Document ids** (`generate_id`): 16 base36 characters derived from a
//!   SHA256 hash of a namespace, a caller seed, the current time and a
//!   process-wide sequence number. Used for bugs, teams, activity entries,
//!   comments and notifications. Ids are reserved before a write and
//!   inserted with an "absent" precondition, so a collision surfaces as a
//!   write conflict rather than an overwrite.
//! - **Project slugs** (`project_slug`): a readable slug of the project
//!   name followed by a 4-character base36 suffix, e.g. `portal-web-k3x9`.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of generated document ids.
pub const DOCUMENT_ID_LENGTH: usize = 16;

/// Length of the uniqueness suffix on project slugs.
pub const SLUG_SUFFIX_LENGTH: usize = 4;

/// Maximum length of the readable part of a project slug.
pub const MAX_SLUG_BASE_LENGTH: usize = 40;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh document id.
///
/// `namespace` separates id spaces (e.g. `"bug"`), `seed` adds caller
/// entropy such as a title.
pub fn generate_id(namespace: &str, seed: &str) -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = hash(&format!("{namespace}|{seed}|{nanos}|{sequence}"));
    encode_base36(&digest, DOCUMENT_ID_LENGTH)
}

/// Build a project slug from its name.
///
/// `attempt` perturbs the suffix so a caller that hits an existing slug can
/// simply try again with the next attempt number.
pub fn project_slug(name: &str, attempt: u32) -> String {
    let base = slugify(name);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = hash(&format!("{name}|{attempt}|{nanos}"));
    format!("{base}-{}", encode_base36(&digest, SLUG_SUFFIX_LENGTH))
}

/// Reduce a display name to lowercase ASCII words joined by hyphens.
///
/// Common Latin accents are folded (`"Gestión Ágil"` → `"gestion-agil"`).
/// Returns `"project"` when nothing usable remains.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
        if slug.len() >= MAX_SLUG_BASE_LENGTH {
            break;
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug.to_string()
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

fn hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Encode the first 16 bytes of `bytes` as exactly `length` base36 digits.
///
/// `length` is capped at 24, the number of base36 digits a 128-bit value
/// always fills.
fn encode_base36(bytes: &[u8], length: usize) -> String {
    let mut num: u128 = 0;
    for &byte in bytes.iter().take(16) {
        num = (num << 8) | u128::from(byte);
    }

    let length = length.min(24);
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        out.push(BASE36_CHARS[(num % 36) as usize]);
        num /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case::simple("Portal Web", "portal-web")]
    #[case::accents("Gestión Ágil", "gestion-agil")]
    #[case::punctuation("  API -- v2!! ", "api-v2")]
    #[case::symbols_only("***", "project")]
    #[case::empty("", "project")]
    fn test_slugify(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[test]
    fn test_slugify_truncates_long_names() {
        let slug = slugify(&"word ".repeat(30));
        assert!(slug.len() <= MAX_SLUG_BASE_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_project_slug_has_suffix() {
        let slug = project_slug("Portal Web", 0);
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "portal-web");
        assert_eq!(suffix.len(), SLUG_SUFFIX_LENGTH);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_ids_are_unique_and_well_formed() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id("bug", "same seed")).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.len() == DOCUMENT_ID_LENGTH
            && id.bytes().all(|b| BASE36_CHARS.contains(&b))));
    }

    #[test]
    fn test_encode_base36_pads_to_length() {
        assert_eq!(encode_base36(&[0u8; 16], 6), "000000");
        assert_eq!(encode_base36(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 35], 2), "0z");
    }
}
