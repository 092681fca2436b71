//! Content-addressed closure names.
//!
//! `<prefix>_<hash>` where the hash is a fixed-width base-62 rendering of a
//! rolling XOR mix over the literal's source text and its offset from the
//! start of the program. Identical source at an identical position always
//! yields the same name across builds.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

pub const HASH_LEN: usize = 8;
pub const PREFIX_LEN: usize = 16;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SEED: u64 = 0xcbf2_9ce4_8422_2325;
const MIX: u64 = 0x9e37_79b9_7f4a_7c15;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref NON_IDENTIFIER_RE: Regex = Regex::new(r"[^A-Za-z0-9_$]").unwrap();
}

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

fn mix_byte(hash: u64, byte: u8) -> u64 {
    (hash.rotate_left(5) ^ u64::from(byte)).wrapping_mul(MIX)
}

/// Rolling hash of `text` at `offset`, salted for collision retries.
pub fn span_hash(text: &str, offset: u32, salt: u32) -> u64 {
    let mut hash = SEED;
    for byte in text.bytes() {
        hash = mix_byte(hash, byte);
    }
    for byte in offset.to_le_bytes().iter().chain(salt.to_le_bytes().iter()) {
        hash = mix_byte(hash, *byte);
    }
    // Final avalanche so spans differing in their last byte still diverge
    // across every output digit.
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash
}

fn encode(mut hash: u64) -> String {
    let mut out = String::with_capacity(HASH_LEN);
    for _ in 0..HASH_LEN {
        out.push(ALPHABET[(hash % 62) as usize] as char);
        hash /= 62;
    }
    out
}

/// Sanitized, truncated display prefix. Empty names map to `_`.
pub fn alias_prefix(name: Option<&str>) -> String {
    let cleaned = name
        .map(|n| NON_IDENTIFIER_RE.replace_all(n, "_").to_string())
        .unwrap_or_default();
    let truncated: String = cleaned.chars().take(PREFIX_LEN).collect();
    if truncated.is_empty() {
        "_".to_string()
    } else if truncated.as_bytes()[0].is_ascii_digit() {
        format!("_{}", truncated)
    } else {
        truncated
    }
}

pub fn content_alias(name: Option<&str>, text: &str, offset: u32) -> String {
    format!("{}_{}", alias_prefix(name), encode(span_hash(text, offset, 0)))
}

/// Hands out aliases for one compilation, re-salting on collision.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    used: HashSet<String>,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a name that must not be handed out as an alias.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn allocate(&mut self, name: Option<&str>, text: &str, offset: u32) -> String {
        let prefix = alias_prefix(name);
        let mut salt = 0;
        loop {
            let alias = format!("{}_{}", prefix, encode(span_hash(text, offset, salt)));
            if self.used.insert(alias.clone()) {
                return alias;
            }
            salt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_is_deterministic() {
        let a = content_alias(Some("Component"), "function Component() {}", 42);
        let b = content_alias(Some("Component"), "function Component() {}", 42);
        assert_eq!(a, b);
        assert!(a.starts_with("Component_"));
        assert_eq!(a.len(), "Component_".len() + HASH_LEN);
    }

    #[test]
    fn test_position_changes_alias() {
        let a = content_alias(None, "() => 1", 10);
        let b = content_alias(None, "() => 1", 11);
        assert_ne!(a, b);
    }

    #[test]
    fn test_near_identical_spans_diverge() {
        let a = content_alias(None, "() => a", 0);
        let b = content_alias(None, "() => b", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_prefix_is_sanitized_and_truncated() {
        assert_eq!(alias_prefix(None), "_");
        assert_eq!(alias_prefix(Some("my-handler")), "my_handler");
        assert_eq!(alias_prefix(Some("1st")), "_1st");
        assert_eq!(
            alias_prefix(Some("aVeryLongComponentNameIndeed")).len(),
            PREFIX_LEN
        );
        assert!(is_identifier(&content_alias(Some("@@x"), "x", 0)));
    }

    #[test]
    fn test_allocator_resalts_collisions() {
        let mut aliases = AliasAllocator::new();
        let first = aliases.allocate(Some("f"), "() => 1", 3);
        let second = aliases.allocate(Some("f"), "() => 1", 3);
        assert_eq!(first, content_alias(Some("f"), "() => 1", 3));
        assert_ne!(first, second);
    }
}
