//! Dry-run decorator: listings go to the wrapped API, mutations are logged and skipped.

use log::debug;

use crate::api::{Action, SnapshotApi};
use crate::error::Result;
use crate::snapshot::{Snapshot, Subject};

pub struct DryRun<A> {
    inner: A,
}

impl<A: SnapshotApi> DryRun<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

impl<A: SnapshotApi> SnapshotApi for DryRun<A> {
    fn list_subjects(&self, tag: &str) -> Result<Vec<Subject>> {
        self.inner.list_subjects(tag)
    }

    fn list_snapshots(&self, subject: &Subject) -> Result<Vec<Snapshot>> {
        self.inner.list_snapshots(subject)
    }

    fn create_snapshot(&self, subject: &Subject, name: &str) -> Result<Action> {
        debug!(
            "dryrun: skipping API call: snapshot droplet {} as {}",
            subject, name
        );
        Ok(Action::skipped("snapshot"))
    }

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        debug!(
            "dryrun: skipping API call: delete snapshot {} ({})",
            snapshot.name, snapshot.id
        );
        Ok(())
    }

    fn transfer_snapshot(&self, snapshot: &Snapshot, region: &str) -> Result<Action> {
        debug!(
            "dryrun: skipping API call: transfer snapshot {} to {}",
            snapshot.name, region
        );
        Ok(Action::skipped("transfer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryApi;
    use chrono::{TimeZone, Utc};

    #[test]
    fn mutations_never_reach_inner_api() {
        let mem = MemoryApi::new();
        let droplet = Subject::new(1, "web");
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        mem.add_subject(droplet.clone(), &["autosnapshot"]);
        mem.add_snapshot(1, Snapshot::new(10, "web-autosnapshot-x", t));

        let api = DryRun::new(&mem);
        assert_eq!(api.list_subjects("autosnapshot").unwrap().len(), 1);
        let snaps = api.list_snapshots(&droplet).unwrap();
        assert_eq!(snaps.len(), 1);

        assert!(api.create_snapshot(&droplet, "web-new").unwrap().is_skipped());
        api.delete_snapshot(&snaps[0]).unwrap();
        assert!(api.transfer_snapshot(&snaps[0], "ams3").unwrap().is_skipped());

        assert!(mem.calls().is_empty(), "dry-run leaked calls: {:?}", mem.calls());
        assert_eq!(mem.snapshots_of(1).len(), 1);
    }
}
