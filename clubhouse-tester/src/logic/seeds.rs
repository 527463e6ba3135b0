use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub const DEFAULT_SEED: u64 = 1337;

/// Seed plus the phrase it was derived from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub phrase: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self { seed, phrase: None }
    }

    #[must_use]
    pub fn from_phrase(phrase: &str) -> Self {
        let normalized = phrase.trim().to_lowercase();
        Self {
            seed: phrase_seed(&normalized),
            phrase: Some(normalized),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match &self.phrase {
            Some(phrase) => format!("{phrase} ({})", self.seed),
            None => self.seed.to_string(),
        }
    }
}

/// First eight bytes of the SHA-256 of `phrase`, big-endian.
fn phrase_seed(phrase: &str) -> u64 {
    let digest = Sha256::digest(phrase.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn is_phrase(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
}

/// Resolve CLI seed tokens into unique seeds.
///
/// Accepts literal integers (negative values use their magnitude) and
/// single-word phrases such as `spring-cup`, which hash to a seed.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if is_phrase(token) {
            pending.push(SeedInfo::from_phrase(token));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut deduped: Vec<SeedInfo> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();
    for info in pending {
        if let Some(existing) = index.get(&info.seed).copied() {
            if deduped[existing].phrase.is_none() && info.phrase.is_some() {
                deduped[existing] = info;
            }
        } else {
            index.insert(info.seed, deduped.len());
            deduped.push(info);
        }
    }

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(deduped)
}
