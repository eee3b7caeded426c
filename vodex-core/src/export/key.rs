use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::store::ObjectStore;

use super::ExportResult;

/// Reserved substring marking a content id as a known-invalid duplicate.
/// Such ids are never valid processing targets.
pub const DUPLICATE_MARKER: &str = "_DUP_";

/// Classification of one converted-store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKey {
    /// Current naming scheme: `<id>.<format>/<rest>`.
    Canonical { id: String, format: String },
    /// Deprecated naming scheme: `<id>/<rest>`.
    Legacy { id: String },
    Unrecognized,
}

fn canonical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\w-]+)\.([\w-]+)/").unwrap())
}

fn legacy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\w-]+)/").unwrap())
}

/// Classify an object key. Canonical takes priority over legacy.
pub fn parse_key(key: &str) -> ParsedKey {
    if let Some(captures) = canonical_re().captures(key) {
        return ParsedKey::Canonical {
            id: captures[1].to_string(),
            format: captures[2].to_string(),
        };
    }
    if let Some(captures) = legacy_re().captures(key) {
        return ParsedKey::Legacy {
            id: captures[1].to_string(),
        };
    }
    ParsedKey::Unrecognized
}

pub fn is_duplicate(content_id: &str) -> bool {
    content_id.contains(DUPLICATE_MARKER)
}

/// What one full scan of the converted store found: which formats each id
/// already has under canonical naming, and which ids still own legacy-shaped
/// objects. The two never mix — a legacy key contributes nothing to the
/// format map.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub formats: HashMap<String, BTreeSet<String>>,
    pub legacy: HashSet<String>,
}

impl Catalog {
    pub async fn scan(store: &dyn ObjectStore) -> ExportResult<Catalog> {
        let mut catalog = Catalog::default();
        let mut unrecognized = 0usize;
        for entry in store.list_dir().await? {
            match parse_key(&entry) {
                ParsedKey::Canonical { id, format } => {
                    catalog.formats.entry(id).or_default().insert(format);
                }
                ParsedKey::Legacy { id } => {
                    catalog.legacy.insert(id);
                }
                ParsedKey::Unrecognized => {
                    warn!(
                        key = %entry,
                        store = store.name(),
                        "key is not in <id>.<format>/ naming; skipping"
                    );
                    unrecognized += 1;
                }
            }
        }
        info!(
            store = store.name(),
            ids = catalog.formats.len(),
            legacy = catalog.legacy.len(),
            unrecognized,
            "converted store scan complete"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn canonical_keys_capture_id_and_format() {
        assert_eq!(
            parse_key("DK1lCc9b7bg.m3u8/index.m3u8"),
            ParsedKey::Canonical {
                id: "DK1lCc9b7bg".to_string(),
                format: "m3u8".to_string(),
            }
        );
        assert_eq!(
            parse_key("Dpo_-GrMpNE.mp4-low/"),
            ParsedKey::Canonical {
                id: "Dpo_-GrMpNE".to_string(),
                format: "mp4-low".to_string(),
            }
        );
    }

    #[test]
    fn legacy_keys_capture_id_only() {
        assert_eq!(
            parse_key("abc123/abc123.mp4"),
            ParsedKey::Legacy {
                id: "abc123".to_string()
            }
        );
        assert_eq!(
            parse_key("abc123/"),
            ParsedKey::Legacy {
                id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn canonical_wins_over_legacy() {
        // a canonical key also has a `<segment>/` shape; the dot decides
        assert_eq!(
            parse_key("abc.mp4/abc.mp4"),
            ParsedKey::Canonical {
                id: "abc".to_string(),
                format: "mp4".to_string(),
            }
        );
    }

    #[test]
    fn junk_keys_are_unrecognized() {
        assert_eq!(parse_key("stray.txt"), ParsedKey::Unrecognized);
        assert_eq!(parse_key(""), ParsedKey::Unrecognized);
        assert_eq!(parse_key(".hidden/x"), ParsedKey::Unrecognized);
    }

    #[test]
    fn duplicate_marker_is_detected() {
        assert!(is_duplicate("xyz_DUP_1"));
        assert!(!is_duplicate("xyz"));
    }

    #[tokio::test]
    async fn scan_splits_canonical_and_legacy() {
        let store = MemoryStore::new("converted");
        store.insert("abc.mp4/abc.mp4", b"video".to_vec());
        store.insert("abc.m3u8/index.m3u8", b"playlist".to_vec());
        store.insert("old1/old1.mp4", b"video".to_vec());
        store.insert("stray.txt", b"junk".to_vec());

        let catalog = Catalog::scan(&store).await.unwrap();
        assert_eq!(
            catalog.formats["abc"],
            BTreeSet::from(["mp4".to_string(), "m3u8".to_string()])
        );
        assert!(!catalog.formats.contains_key("old1"));
        assert!(catalog.legacy.contains("old1"));
        assert_eq!(catalog.legacy.len(), 1);
    }
}
