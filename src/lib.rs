// Ядро: чистые функции без I/O
pub mod interval;
pub mod snapshot;
pub mod inventory;
pub mod policy;
pub mod due;
pub mod evaluator;
pub mod clock;
pub mod simulate;

// Окружение: ошибки, конфигурация, токен, логирование
pub mod error;
pub mod config;
pub mod token;
pub mod logging;

// Внешний мир: API провайдера и применение решений
pub mod api;    // src/api/{mod,digitalocean,dryrun,memory}.rs
pub mod runner;
pub mod report;

pub mod cli;

// Удобные реэкспорты
pub use error::{Error, Result};
pub use interval::Interval;
pub use snapshot::{Snapshot, SnapshotId, Subject, SubjectId};
pub use inventory::Inventory;
pub use policy::{RetentionPolicy, Tier};
pub use due::is_snapshot_due;
pub use evaluator::{evaluate, Decision, Deletion};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use simulate::{SimulationReport, SimulationSpec, SimulationStep, Simulator};
pub use config::RunConfig;
pub use api::{Action, SnapshotApi};
pub use runner::{plan_subject, RunSummary, Runner, SubjectPlan};
