//! api - collaborators that talk to the snapshot provider.
//!
//! Раскладка:
//! - mod.rs        - трейт SnapshotApi и общие типы
//! - digitalocean  - HTTP-клиент DigitalOcean v2 (blocking reqwest)
//! - dryrun        - обёртка: чтение пробрасывается, изменения только логируются
//! - memory        - in-memory реализация (тесты, демонстрации)
//!
//! Ядро (evaluator/due/simulate) про этот модуль ничего не знает: runner
//! получает данные через трейт и применяет решения обратно через него же.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snapshot::{Snapshot, Subject};

pub mod digitalocean;
pub mod dryrun;
pub mod memory;

pub use digitalocean::DigitalOcean;
pub use dryrun::DryRun;
pub use memory::MemoryApi;

/// An asynchronous provider action (snapshot, transfer) as acknowledged by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

impl Action {
    /// Placeholder returned when a mutating call was skipped (dry-run).
    pub fn skipped(kind: &str) -> Self {
        Self {
            id: 0,
            kind: kind.to_string(),
            status: "skipped".to_string(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == "skipped"
    }
}

/// Narrow interface the runner drives. All calls are synchronous.
pub trait SnapshotApi {
    /// Subjects (droplets) carrying `tag`.
    fn list_subjects(&self, tag: &str) -> Result<Vec<Subject>>;

    /// Completed snapshots of `subject`, any order.
    fn list_snapshots(&self, subject: &Subject) -> Result<Vec<Snapshot>>;

    fn create_snapshot(&self, subject: &Subject, name: &str) -> Result<Action>;

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    fn transfer_snapshot(&self, snapshot: &Snapshot, region: &str) -> Result<Action>;
}

impl<A: SnapshotApi + ?Sized> SnapshotApi for &A {
    fn list_subjects(&self, tag: &str) -> Result<Vec<Subject>> {
        (**self).list_subjects(tag)
    }

    fn list_snapshots(&self, subject: &Subject) -> Result<Vec<Snapshot>> {
        (**self).list_snapshots(subject)
    }

    fn create_snapshot(&self, subject: &Subject, name: &str) -> Result<Action> {
        (**self).create_snapshot(subject, name)
    }

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).delete_snapshot(snapshot)
    }

    fn transfer_snapshot(&self, snapshot: &Snapshot, region: &str) -> Result<Action> {
        (**self).transfer_snapshot(snapshot, region)
    }
}
