//! Tiered retention classifier
//!
//! Decides which artifacts survive a prune. An artifact is kept if any of:
//!
//! - it is younger than the daily window,
//! - it is the latest artifact of its ISO week and younger than the
//!   weekly window,
//! - it is the latest artifact of its calendar month and younger than the
//!   monthly window.
//!
//! Windows are look-back durations: `keep_daily` days, `keep_weekly` × 7
//! days and `keep_monthly` × 30 days. The monthly window uses a fixed
//! 30-day month, so it drifts against calendar months by a day or two.
//!
//! Week and month representatives are chosen over the full input before
//! anything is removed, and the latest artifact of a bucket always stays
//! the latest of that bucket in the kept subset. Classifying an already
//! pruned set therefore keeps all of it.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::inventory::Artifact;
use super::naming::{month_key, week_key};
use crate::config::RetentionPolicy;

/// Which tier retained an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepReason {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for KeepReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// An artifact in the keep-set and the tier that kept it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptArtifact {
    pub artifact: Artifact,
    pub reason: KeepReason,
}

/// Result of classifying a set of artifacts
#[derive(Debug, Clone, Default)]
pub struct RetentionPlan {
    /// Keep-set, newest first
    pub keep: Vec<KeptArtifact>,
    /// Deletion candidates, newest first
    pub prune: Vec<Artifact>,
}

impl RetentionPlan {
    /// The keep-set without reasons
    pub fn kept(&self) -> Vec<Artifact> {
        self.keep.iter().map(|k| k.artifact.clone()).collect()
    }

    pub fn is_kept(&self, name: &str) -> bool {
        self.keep.iter().any(|k| k.artifact.name == name)
    }

    pub fn reason_for(&self, name: &str) -> Option<KeepReason> {
        self.keep
            .iter()
            .find(|k| k.artifact.name == name)
            .map(|k| k.reason)
    }
}

/// Cutoff instants for each tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoffs {
    pub daily: DateTime<Utc>,
    pub weekly: DateTime<Utc>,
    pub monthly: DateTime<Utc>,
}

impl Cutoffs {
    pub fn new(policy: &RetentionPolicy, now: DateTime<Utc>) -> Self {
        Self {
            daily: window_start(now, i64::from(policy.keep_daily)),
            weekly: window_start(now, i64::from(policy.keep_weekly) * 7),
            monthly: window_start(now, i64::from(policy.keep_monthly) * 30),
        }
    }
}

/// `now` minus `days`, clamped to the earliest representable instant
fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Classify artifacts into a keep-set and deletion candidates
pub fn classify(
    artifacts: &[Artifact],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionPlan {
    let cutoffs = Cutoffs::new(policy, now);
    let week_reps = representatives(artifacts, |a| week_key(a.created_at));
    let month_reps = representatives(artifacts, |a| month_key(a.created_at));

    let mut plan = RetentionPlan::default();

    for (index, artifact) in artifacts.iter().enumerate() {
        let reason = if artifact.created_at >= cutoffs.daily {
            Some(KeepReason::Daily)
        } else if is_representative(&week_reps, week_key(artifact.created_at), index)
            && artifact.created_at >= cutoffs.weekly
        {
            Some(KeepReason::Weekly)
        } else if is_representative(&month_reps, month_key(artifact.created_at), index)
            && artifact.created_at >= cutoffs.monthly
        {
            Some(KeepReason::Monthly)
        } else {
            None
        };

        match reason {
            Some(reason) => plan.keep.push(KeptArtifact {
                artifact: artifact.clone(),
                reason,
            }),
            None => plan.prune.push(artifact.clone()),
        }
    }

    plan.keep.sort_by(|a, b| newest_first(&a.artifact, &b.artifact));
    plan.prune.sort_by(newest_first);
    plan
}

fn newest_first(a: &Artifact, b: &Artifact) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.name.cmp(&a.name))
}

/// Index of the latest artifact in each bucket
///
/// Equal timestamps cannot come out of the naming scheme, but if they do
/// the lexicographically greatest name wins.
fn representatives<K, F>(artifacts: &[Artifact], key: F) -> HashMap<K, usize>
where
    K: Eq + Hash,
    F: Fn(&Artifact) -> K,
{
    let mut reps: HashMap<K, usize> = HashMap::new();

    for (index, artifact) in artifacts.iter().enumerate() {
        reps.entry(key(artifact))
            .and_modify(|current| {
                let best = &artifacts[*current];
                if (artifact.created_at, &artifact.name) > (best.created_at, &best.name) {
                    *current = index;
                }
            })
            .or_insert(index);
    }

    reps
}

fn is_representative<K: Eq + Hash>(reps: &HashMap<K, usize>, key: K, index: usize) -> bool {
    reps.get(&key) == Some(&index)
}
