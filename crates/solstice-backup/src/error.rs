use std::io;
use std::path::PathBuf;

use solstice_world::WorldId;

use crate::codec::SnapshotFormatError;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed backup {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: SnapshotFormatError,
    },
    #[error("backup already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("not a region backup path: {}", .0.display())]
    BadPath(PathBuf),
    #[error("world {0} is not loaded")]
    WorldNotLoaded(WorldId),
}

impl BackupError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, source: SnapshotFormatError) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }
}
