//! Operation fingerprints.
//!
//! A fingerprint binds a previewed operation to the state it was computed
//! against. Parts are length-prefixed before hashing so that different
//! splits of the same bytes never collide.

/// Hash the given parts into a hex fingerprint.
#[must_use]
pub fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}

/// Digest of a target's current content, or a marker when it does not exist.
#[must_use]
pub fn content_digest(content: Option<&[u8]>) -> String {
    match content {
        Some(bytes) => blake3::hash(bytes).to_hex().to_string(),
        None => "absent".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_boundaries_matter() {
        assert_ne!(fingerprint(&[b"ab", b"c"]), fingerprint(&[b"a", b"bc"]));
        assert_eq!(fingerprint(&[b"ab", b"c"]), fingerprint(&[b"ab", b"c"]));
    }

    #[test]
    fn test_content_digest() {
        assert_eq!(content_digest(None), "absent");
        assert_eq!(content_digest(Some(b"x")).len(), 64);
        assert_ne!(content_digest(Some(b"x")), content_digest(Some(b"y")));
    }
}
