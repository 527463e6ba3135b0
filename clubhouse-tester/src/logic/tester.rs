use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clubhouse_game::{BuiltinDataLoader, MemoryStorage, OwnerId, SeasonEngine};

use super::policy::PlayStrategy;
use super::seeds::SeedInfo;
use super::simulation::{CampaignDigest, RunOptions, run_campaign};
use crate::common::JsonDirStorage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
    pub campaigns: Vec<CampaignDigest>,
}

/// Where campaigns keep their saves.
#[derive(Debug, Clone)]
pub enum StoreChoice {
    Memory,
    JsonDir(PathBuf),
}

pub struct CampaignTester {
    verbose: bool,
    store: StoreChoice,
    options: RunOptions,
}

impl CampaignTester {
    pub const fn new(store: StoreChoice, options: RunOptions, verbose: bool) -> Self {
        Self {
            verbose,
            store,
            options,
        }
    }

    pub async fn run_strategy(
        &self,
        strategy: PlayStrategy,
        seeds: &[SeedInfo],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing strategy: {} (seed: {})",
                    strategy.label().bright_white(),
                    seed.label()
                );
            }
            results.push(self.run_single(strategy, seed, iterations).await);
        }

        results
    }

    async fn run_single(
        &self,
        strategy: PlayStrategy,
        seed: &SeedInfo,
        iterations: usize,
    ) -> ScenarioResult {
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut campaigns = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed
                .seed
                .wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let owner = OwnerId::new(format!(
                "{}-{iteration_seed}-{}",
                strategy.label().to_lowercase(),
                i + 1
            ));

            let outcome = match &self.store {
                StoreChoice::Memory => {
                    let engine = SeasonEngine::new(BuiltinDataLoader, MemoryStorage::new());
                    run_campaign(&engine, owner, iteration_seed, strategy, &self.options).await
                }
                StoreChoice::JsonDir(root) => {
                    let engine = SeasonEngine::new(BuiltinDataLoader, JsonDirStorage::new(root));
                    run_campaign(&engine, owner, iteration_seed, strategy, &self.options).await
                }
            };
            performance_data.push(start_time.elapsed());

            match outcome {
                Ok(digest) => {
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{}: {} turns, reputation {} | {}",
                            i + 1,
                            iterations,
                            digest.turns,
                            digest.final_reputation,
                            digest.headline
                        );
                    }
                    campaigns.push(digest);
                }
                Err(err) => {
                    let message = format!(
                        "Iteration {} (strategy {}, seed {}): {err:#}",
                        i + 1,
                        strategy.label(),
                        iteration_seed
                    );
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            format!("{err:#}").red()
                        );
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: format!("{} / seed {}", strategy.label(), seed.label()),
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: campaigns.len(),
            failures,
            average_duration,
            performance_data,
            campaigns,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
