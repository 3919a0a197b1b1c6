//! Domain model (targets, artifacts, retention, job state, errors, events).

pub mod artifact;
pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod remote_path;
pub mod retention;
pub mod target;

pub use self::errors::{BackupError, ConfigError, ErrorKind, ProducerError, StoreError};
pub use self::events::BackupEvent;
pub use self::ids::{JobId, RunId};
pub use self::job::{JobResult, JobState};
pub use self::remote_path::RemotePath;
pub use self::retention::RetentionPolicy;
pub use self::target::{
    ArtifactSpec, DatabaseEngine, DatabaseSource, DatasetSource, RepoType, Source, SourceKind,
    Target, TargetName, DEFAULT_MAX_BACKUPS,
};
