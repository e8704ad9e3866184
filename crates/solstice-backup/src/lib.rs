//! Pre-repaint region snapshots: in-memory store, binary codec, background
//! disk writer, and bulk restore.
#![forbid(unsafe_code)]

pub mod codec;
mod disk;
mod error;
mod restore;
mod snapshot;
mod store;

pub use codec::{BackupFile, SnapshotFormatError};
pub use disk::{DiskBackupStore, DiskLookup, DiskStats, LoadedBackup, parse_region_path, region_file_name};
pub use error::BackupError;
pub use restore::{LogProgress, RestoreJob, RestoreProgress, RestoreReport, restore_file};
pub use snapshot::RegionSnapshot;
pub use store::{BackupStore, StoredBackup};
