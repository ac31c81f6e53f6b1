//! In-memory SnapshotApi: a fake provider for tests and demos.
//!
//! Records every mutating call and can be told to fail listings for a subject,
//! which is how runner error paths are exercised without a network.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use crate::api::{Action, SnapshotApi};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SnapshotId, Subject, SubjectId};

/// A mutating call observed by the fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Create { subject: SubjectId, name: String },
    Delete { snapshot: SnapshotId },
    Transfer { snapshot: SnapshotId, region: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Auth,
    Api(u16),
}

impl Failure {
    fn to_error(self, what: &str) -> Error {
        match self {
            Failure::Transient => Error::TransientNetwork {
                message: format!("{}: connection reset", what),
                source: None,
            },
            Failure::Auth => Error::Auth(format!("{}: HTTP 401: unauthorized", what)),
            Failure::Api(status) => Error::Api {
                status,
                body: format!("{}: rejected", what),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryApi {
    subjects: RefCell<Vec<(Subject, Vec<String>)>>,
    snapshots: RefCell<BTreeMap<SubjectId, Vec<Snapshot>>>,
    calls: RefCell<Vec<Call>>,
    failures: RefCell<HashMap<SubjectId, Failure>>,
    next_action: Cell<u64>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subject(&self, subject: Subject, tags: &[&str]) {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        self.subjects.borrow_mut().push((subject, tags));
    }

    pub fn add_snapshot(&self, subject: SubjectId, snapshot: Snapshot) {
        self.snapshots
            .borrow_mut()
            .entry(subject)
            .or_default()
            .push(snapshot);
    }

    /// Make every call touching `subject` fail with `failure`.
    pub fn fail_subject(&self, subject: SubjectId, failure: Failure) {
        self.failures.borrow_mut().insert(subject, failure);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn snapshots_of(&self, subject: SubjectId) -> Vec<Snapshot> {
        self.snapshots
            .borrow()
            .get(&subject)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, subject: SubjectId, what: &str) -> Result<()> {
        match self.failures.borrow().get(&subject) {
            Some(f) => Err(f.to_error(what)),
            None => Ok(()),
        }
    }

    fn owner_of(&self, id: SnapshotId) -> Option<SubjectId> {
        self.snapshots
            .borrow()
            .iter()
            .find(|(_, list)| list.iter().any(|s| s.id == id))
            .map(|(subject, _)| *subject)
    }

    fn action(&self, kind: &str) -> Action {
        let id = self.next_action.get() + 1;
        self.next_action.set(id);
        Action {
            id,
            kind: kind.to_string(),
            status: "in-progress".to_string(),
        }
    }
}

impl SnapshotApi for MemoryApi {
    fn list_subjects(&self, tag: &str) -> Result<Vec<Subject>> {
        Ok(self
            .subjects
            .borrow()
            .iter()
            .filter(|(_, tags)| tags.iter().any(|t| t == tag))
            .map(|(s, _)| s.clone())
            .collect())
    }

    fn list_snapshots(&self, subject: &Subject) -> Result<Vec<Snapshot>> {
        self.check(subject.id, "list snapshots")?;
        Ok(self.snapshots_of(subject.id))
    }

    fn create_snapshot(&self, subject: &Subject, name: &str) -> Result<Action> {
        self.check(subject.id, "create snapshot")?;
        self.calls.borrow_mut().push(Call::Create {
            subject: subject.id,
            name: name.to_string(),
        });
        Ok(self.action("snapshot"))
    }

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let owner = self.owner_of(snapshot.id).ok_or_else(|| Error::Api {
            status: 404,
            body: format!("snapshot {} not found", snapshot.id),
        })?;
        self.check(owner, "delete snapshot")?;
        self.calls.borrow_mut().push(Call::Delete {
            snapshot: snapshot.id,
        });
        if let Some(list) = self.snapshots.borrow_mut().get_mut(&owner) {
            list.retain(|s| s.id != snapshot.id);
        }
        Ok(())
    }

    fn transfer_snapshot(&self, snapshot: &Snapshot, region: &str) -> Result<Action> {
        let owner = self.owner_of(snapshot.id).ok_or_else(|| Error::Api {
            status: 404,
            body: format!("image {} not found", snapshot.id),
        })?;
        self.check(owner, "transfer snapshot")?;
        self.calls.borrow_mut().push(Call::Transfer {
            snapshot: snapshot.id,
            region: region.to_string(),
        });
        if let Some(list) = self.snapshots.borrow_mut().get_mut(&owner) {
            for s in list.iter_mut().filter(|s| s.id == snapshot.id) {
                if !s.regions.iter().any(|r| r == region) {
                    s.regions.push(region.to_string());
                }
            }
        }
        Ok(self.action("transfer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn tag_filtering_and_failures() {
        let api = MemoryApi::new();
        api.add_subject(Subject::new(1, "a"), &["autosnapshot"]);
        api.add_subject(Subject::new(2, "b"), &["other"]);
        let found = api.list_subjects("autosnapshot").unwrap();
        assert_eq!(found, vec![Subject::new(1, "a")]);

        api.fail_subject(1, Failure::Transient);
        let err = api.list_snapshots(&Subject::new(1, "a")).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn delete_and_transfer_mutate_store() {
        let api = MemoryApi::new();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = Snapshot::new(5, "x", t).with_regions(["nyc3"]);
        api.add_snapshot(1, s.clone());

        let a = api.transfer_snapshot(&s, "ams3").unwrap();
        assert_eq!(a.kind, "transfer");
        assert_eq!(api.snapshots_of(1)[0].regions, vec!["nyc3", "ams3"]);

        api.delete_snapshot(&s).unwrap();
        assert!(api.snapshots_of(1).is_empty());
        assert!(matches!(
            api.delete_snapshot(&s),
            Err(Error::Api { status: 404, .. })
        ));
        assert_eq!(
            api.calls(),
            vec![
                Call::Transfer { snapshot: 5, region: "ams3".into() },
                Call::Delete { snapshot: 5 },
            ]
        );
    }
}
