use super::write_atomic;
use crate::codec::primitives::{get_i32, get_string, get_u32, put_string};
use crate::codec::CodecError;
use bytes::BufMut;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const MILESTONE_FILE_NAME: &str = "onboarding.counters";

/// Persistent occurrence counts for onboarding milestones.
///
/// The first report of a milestone keeps its name; later ones are labelled
/// `"name (#n)"` so repeated tutorial runs stay distinguishable.
#[derive(Debug)]
pub struct MilestoneCounter {
    path: PathBuf,
    counts: BTreeMap<String, u32>,
}

impl MilestoneCounter {
    /// Loads the counters; a missing or unreadable file starts empty.
    pub fn load(work_dir: &Path) -> Self {
        let path = work_dir.join(MILESTONE_FILE_NAME);
        let counts = match fs::read(&path) {
            Ok(data) => decode_counts(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt milestone counters");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read milestone counters");
                BTreeMap::new()
            }
        };
        Self { path, counts }
    }

    pub fn count(&self, milestone: &str) -> u32 {
        self.counts.get(milestone).copied().unwrap_or(0)
    }

    /// Bumps the counter, persists it, and returns the label to report.
    pub fn next_label(&mut self, milestone: &str) -> String {
        let occurrences = self.counts.entry(milestone.to_string()).or_insert(0);
        *occurrences = occurrences.saturating_add(1);
        let label = if *occurrences == 1 {
            milestone.to_string()
        } else {
            format!("{milestone} (#{occurrences})")
        };

        if let Err(e) = write_atomic(&self.path, &encode_counts(&self.counts)) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to save milestone counters");
        }
        label
    }
}

fn encode_counts(counts: &BTreeMap<String, u32>) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_i32_le(counts.len() as i32);
    for (key, value) in counts {
        put_string(&mut out, key);
        out.put_u32_le(*value);
    }
    out
}

fn decode_counts(mut data: &[u8]) -> Result<BTreeMap<String, u32>, CodecError> {
    let count = get_i32(&mut data)?;
    if count < 0 {
        return Err(CodecError::NegativeCount(count));
    }
    let mut counts = BTreeMap::new();
    for _ in 0..count {
        let key = get_string(&mut data)?;
        let value = get_u32(&mut data)?;
        counts.insert(key, value);
    }
    Ok(counts)
}
