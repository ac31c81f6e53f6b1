// Рандомизированные проверки свойств ядра (детерминированный seed).

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use oorandom::Rand64;

use do_snapshot::{evaluate, is_snapshot_due, Interval, Inventory, RetentionPolicy, Snapshot, Tier};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn random_snapshots(rng: &mut Rand64, n: usize) -> Vec<Snapshot> {
    (0..n)
        .map(|i| {
            // до ~400 суток назад, шаг - минута
            let age_min = (rng.rand_u64() % (400 * 24 * 60)) as i64;
            Snapshot::new(i as u64, format!("snap-{i:04}"), now() - Duration::minutes(age_min))
        })
        .collect()
}

fn random_interval(rng: &mut Rand64, max_hours: u64) -> Interval {
    Interval::hours((rng.rand_u64() % (max_hours + 1)) as i64)
}

fn random_policy(rng: &mut Rand64) -> Result<RetentionPolicy> {
    let n = (rng.rand_u64() % 4) as usize;
    let mut tiers = Vec::with_capacity(n);
    for _ in 0..n {
        // иногда нулевой bucket (пол хранения)
        let bucket = if rng.rand_u64() % 5 == 0 {
            Interval::ZERO
        } else {
            random_interval(rng, 24 * 30)
        };
        tiers.push(Tier::new(bucket, random_interval(rng, 24 * 200))?);
    }
    Ok(RetentionPolicy::new(tiers))
}

#[test]
fn decision_is_a_partition_of_input() -> Result<()> {
    let mut rng = Rand64::new(0xC0FFEE_u128);
    for _ in 0..300 {
        let n = (rng.rand_u64() % 60) as usize;
        let snapshots = random_snapshots(&mut rng, n);
        let policy = random_policy(&mut rng)?;
        let d = evaluate(&snapshots, &policy, now())?;

        let kept: HashSet<&str> = d.keep.iter().map(|s| s.name.as_str()).collect();
        let deleted: HashSet<&str> = d.delete.iter().map(|x| x.snapshot.name.as_str()).collect();
        assert_eq!(kept.len() + deleted.len(), n, "policy {}", policy);
        assert!(kept.is_disjoint(&deleted));

        // keep - в хронологическом порядке
        for pair in d.keep.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }
    Ok(())
}

#[test]
fn evaluation_is_deterministic_and_order_independent() -> Result<()> {
    let mut rng = Rand64::new(0xDEADBEEF);
    for _ in 0..100 {
        let snapshots = random_snapshots(&mut rng, 40);
        let policy = random_policy(&mut rng)?;
        let a = evaluate(&snapshots, &policy, now())?;

        let mut reversed = snapshots.clone();
        reversed.reverse();
        let b = evaluate(&reversed, &policy, now())?;
        assert_eq!(a.keep, b.keep);
        assert_eq!(a.delete_ids(), b.delete_ids());
    }
    Ok(())
}

#[test]
fn snapshots_younger_than_every_tier_are_kept() -> Result<()> {
    let mut rng = Rand64::new(42);
    for _ in 0..200 {
        let snapshots = random_snapshots(&mut rng, 50);
        let policy = random_policy(&mut rng)?;
        let d = evaluate(&snapshots, &policy, now())?;
        let Some(youngest) = policy.youngest_age() else {
            assert!(d.delete.is_empty());
            continue;
        };
        for s in &snapshots {
            if s.age(now()) < youngest.as_duration() {
                assert!(d.is_kept(&s.name), "{} is younger than {}", s.name, youngest);
            }
        }
    }
    Ok(())
}

#[test]
fn zero_bucket_deletes_everything_at_or_past_age() -> Result<()> {
    let mut rng = Rand64::new(7);
    for _ in 0..100 {
        let snapshots = random_snapshots(&mut rng, 50);
        let floor = random_interval(&mut rng, 24 * 300);
        let mut tiers = vec![Tier::new(Interval::ZERO, floor)?];
        if rng.rand_u64() % 2 == 0 {
            tiers.push(Tier::new(Interval::days(7), Interval::days(30))?);
        }
        let policy = RetentionPolicy::new(tiers);
        let d = evaluate(&snapshots, &policy, now())?;
        for s in &snapshots {
            if s.age(now()) >= floor.as_duration() {
                assert!(d.is_deleted(&s.name));
            }
        }
    }
    Ok(())
}

#[test]
fn kept_snapshots_in_a_tier_are_bucket_apart() -> Result<()> {
    let mut rng = Rand64::new(0x5EED);
    for _ in 0..100 {
        let snapshots = random_snapshots(&mut rng, 80);
        let bucket = Interval::days(1 + (rng.rand_u64() % 14) as i64);
        let min_age = random_interval(&mut rng, 24 * 60);
        let policy = RetentionPolicy::new(vec![Tier::new(bucket, min_age)?]);
        let d = evaluate(&snapshots, &policy, now())?;
        let eligible: Vec<&Snapshot> = d
            .keep
            .iter()
            .filter(|s| s.age(now()) >= min_age.as_duration())
            .collect();
        for pair in eligible.windows(2) {
            assert!(pair[1].created_at - pair[0].created_at >= bucket.as_duration());
        }
    }
    Ok(())
}

#[test]
fn due_check_is_idempotent() {
    let mut rng = Rand64::new(99);
    for _ in 0..200 {
        let mut inv = Inventory::new();
        let n = (rng.rand_u64() % 5) as usize;
        inv.set(1, random_snapshots(&mut rng, n));
        let interval = Interval::hours(1 + (rng.rand_u64() % 72) as i64);
        let first = is_snapshot_due(&inv, 1, interval, now());
        assert_eq!(first, is_snapshot_due(&inv, 1, interval, now()));
        if n == 0 {
            assert!(first);
        }
    }
}
