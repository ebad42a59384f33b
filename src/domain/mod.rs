pub mod archive;
pub mod entry;
pub mod enums;
pub mod error;
pub mod time;
pub mod views;

pub use archive::{EntryUpdate, TaskArchive, DEFAULT_NAME_PREFIX};
pub use entry::{apply_tag, Entry};
pub use enums::ChangeKind;
pub use error::ModelError;
pub use views::{compute_total, flatten_entries, status_badge, tree_connector};
