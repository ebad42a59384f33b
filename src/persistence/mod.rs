pub mod block;
pub mod files;
pub mod migration;
pub mod parser;
pub mod serializer;
pub mod settings;
pub mod store;
pub mod watcher;

pub use files::{
    archive_file_name, ensure_dir, get_stint_dir, init_local_stint, list_archive_files, read_file,
    settings_file,
};
pub use settings::{load_settings, save_settings, Settings};
pub use store::{load_archive, save_archive, LoadedArchive};
pub use watcher::ArchiveWatcher;
