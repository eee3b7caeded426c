pub mod diff;
pub mod driver;
pub mod error;
pub mod key;
pub mod lock;
pub mod materialize;
pub mod migrate;

pub use diff::missing_formats;
pub use driver::{Exporter, RunReport};
pub use error::{ExportError, ExportResult};
pub use key::{is_duplicate, parse_key, Catalog, ParsedKey, DUPLICATE_MARKER};
pub use lock::RunLock;
pub use materialize::{get_or_create_source, PARTIAL_UPLOAD_SUFFIX};
pub use migrate::{migrate_legacy, LEGACY_TARGET_FORMAT};
