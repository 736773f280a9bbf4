//! The engine facade: storage, directory, configuration and clock, plus the
//! snapshot discipline every write follows.
//!
//! Each state-changing operation begins one snapshot, runs its guards and
//! writes against it, and then either commits everything or aborts
//! everything. The workflow modules add their operations as further `impl`
//! blocks on [`Engine`].

use std::sync::Arc;

use officeflow_storage::WorkflowStorage;
use time::OffsetDateTime;
use tracing::warn;

use crate::clock::{rfc3339, Clock, SystemClock};
use crate::config::EngineConfig;
use crate::directory::Directory;
use crate::error::WorkflowError;

pub struct Engine<S, D> {
    pub(crate) storage: S,
    pub(crate) directory: D,
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    pub fn new(storage: S, directory: D, config: EngineConfig) -> Self {
        Self {
            storage,
            directory,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub(crate) fn timestamp(&self) -> String {
        rfc3339(self.now())
    }

    pub(crate) async fn begin(&self) -> Result<S::Snapshot, WorkflowError> {
        Ok(self.storage.begin_snapshot().await?)
    }

    /// Commit on success, abort on failure.
    ///
    /// A failed abort is logged and otherwise ignored: the snapshot was never
    /// published, and the caller needs the original error.
    pub(crate) async fn finish<T>(
        &self,
        snapshot: S::Snapshot,
        outcome: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match outcome {
            Ok(value) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = self.storage.abort_snapshot(snapshot).await {
                    warn!(error = %abort, "abort after failed operation also failed");
                }
                Err(e)
            }
        }
    }

    /// Whether `actor_id` supervises `employee_id` according to the directory.
    pub(crate) fn supervises(&self, actor_id: i64, employee_id: i64) -> bool {
        self.directory.supervisor_of(employee_id) == Some(actor_id)
    }
}
