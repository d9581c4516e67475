/// Hex digits shown when a document is listed for a human.
pub const SHORT_LEN: usize = 6;

/// A stable document identifier derived from the normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    /// The numeric ID used as the key in the store and the corpus arena.
    pub numeric: u64,
    /// `numeric` as 16 zero-padded hex digits; the id exposed to callers.
    pub hex: String,
}

impl DocumentId {
    /// Generate a stable document ID from a normalized URL.
    ///
    /// The hash is blake3, so the id survives toolchain upgrades and can be
    /// persisted.
    pub fn from_url(normalized_url: &str) -> Self {
        let hash = blake3::hash(normalized_url.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        let numeric = u64::from_le_bytes(bytes);
        Self {
            numeric,
            hex: format!("{numeric:016x}"),
        }
    }
}

/// Abbreviate a hex id for display. Ids shorter than `SHORT_LEN` are
/// returned whole.
pub fn short_form(hex: &str) -> &str {
    hex.get(..SHORT_LEN).unwrap_or(hex)
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = DocumentId::from_url("https://example.com/a");
        let b = DocumentId::from_url("https://example.com/a");
        assert_eq!(a, b);
    }

    #[test]
    fn different_urls_differ() {
        let a = DocumentId::from_url("https://example.com/a");
        let b = DocumentId::from_url("https://example.com/b");
        assert_ne!(a.numeric, b.numeric);
        assert_ne!(a.hex, b.hex);
    }

    #[test]
    fn hex_carries_the_whole_numeric_id() {
        let id = DocumentId::from_url("https://example.com/a");
        assert_eq!(id.hex.len(), 16);
        assert_eq!(u64::from_str_radix(&id.hex, 16).unwrap(), id.numeric);
        assert_eq!(id.to_string(), format!("#{}", id.hex));
    }

    #[test]
    fn short_form_is_a_display_prefix() {
        let id = DocumentId::from_url("https://example.com/a");
        assert_eq!(short_form(&id.hex).len(), SHORT_LEN);
        assert!(id.hex.starts_with(short_form(&id.hex)));
        assert_eq!(short_form("abc"), "abc");
    }
}
