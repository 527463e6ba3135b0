use anyhow::{Context, Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use clubhouse_game::{
    BuiltinDataLoader, CampaignSummary, GameProgress, MemberId, MemoryStorage, OwnerId,
    SeasonEngine, SeasonError, SeasonSession, SeasonStorage, TurnKind, TurnReport,
    YearTransition, persist_with_timeout,
};

use super::policy::{PlayStrategy, TurnAction};

/// Knobs for one automated campaign.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Limit for the year-end snapshot writes.
    pub save_timeout: Duration,
    /// Commit after this many turns.
    pub commit_every: u32,
    /// Bail out when a campaign runs this long.
    pub max_turns: u32,
    /// Replay each campaign in memory and compare the end state.
    pub verify_determinism: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            save_timeout: Duration::from_millis(2_000),
            commit_every: 25,
            max_turns: 5_000,
            verify_determinism: true,
        }
    }
}

/// What one finished campaign looked like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDigest {
    pub seed: u64,
    pub strategy: String,
    pub turns: u32,
    pub years_completed: u32,
    pub final_reputation: u32,
    pub scripted_events: u32,
    pub skipped_events: u32,
    pub forced_stops: u32,
    pub idle_turns: u32,
    pub rested_months: u32,
    pub save_timeouts: u32,
    pub commit_retries: u32,
    pub headline: String,
}

struct PlayedCampaign {
    digest: CampaignDigest,
    progress: GameProgress,
}

#[must_use]
pub fn practice_roster() -> Vec<MemberId> {
    ["aoi", "daiki", "hinata", "kaito", "mei", "sora"]
        .into_iter()
        .map(MemberId::new)
        .collect()
}

/// Play a whole campaign for `owner` through `engine`, checking the
/// season invariants after every turn, then reload it from storage.
///
/// # Errors
///
/// Returns an error describing the first broken invariant or failed
/// engine call.
pub async fn run_campaign<S>(
    engine: &SeasonEngine<BuiltinDataLoader, S>,
    owner: OwnerId,
    seed: u64,
    strategy: PlayStrategy,
    options: &RunOptions,
) -> Result<CampaignDigest>
where
    S: SeasonStorage + Clone + Send + 'static,
    S::Error: Into<anyhow::Error>,
{
    let played = play_campaign(engine, owner.clone(), seed, strategy, options).await?;

    let reloaded = engine.open(owner.clone(), seed.wrapping_add(1))?;
    ensure!(
        reloaded.progress() == &played.progress,
        "reloaded save for {owner} differs from the played campaign"
    );
    let published = engine.storage().load_map(&owner).map_err(Into::into)?;
    ensure!(
        published.as_ref() == reloaded.map(),
        "published board for {owner} differs from the saved one"
    );
    let history = engine.load_history(&owner).map_err(Into::into)?;
    ensure!(
        history.len() == usize::try_from(played.digest.turns).unwrap_or(usize::MAX),
        "history holds {} entries for {} turns",
        history.len(),
        played.digest.turns
    );
    ensure!(
        history.windows(2).all(|pair| pair[0].seq < pair[1].seq),
        "history sequence numbers are not increasing"
    );

    if options.verify_determinism {
        let replay_engine = SeasonEngine::new(BuiltinDataLoader, MemoryStorage::new());
        let replay_options = RunOptions {
            verify_determinism: false,
            ..options.clone()
        };
        let replay = play_campaign(
            &replay_engine,
            OwnerId::new("replay"),
            seed,
            strategy,
            &replay_options,
        )
        .await?;
        ensure!(
            replay.progress == played.progress,
            "replay of seed {seed} with {strategy} diverged"
        );
    }

    Ok(played.digest)
}

async fn play_campaign<S>(
    engine: &SeasonEngine<BuiltinDataLoader, S>,
    owner: OwnerId,
    seed: u64,
    strategy: PlayStrategy,
    options: &RunOptions,
) -> Result<PlayedCampaign>
where
    S: SeasonStorage + Clone + Send + 'static,
    S::Error: Into<anyhow::Error>,
{
    let roster = practice_roster();
    let mut session = engine.new_session(owner.clone(), seed)?;
    let mut policy = strategy.create_policy(seed);
    let mut digest = CampaignDigest {
        seed,
        strategy: strategy.label().to_string(),
        turns: 0,
        years_completed: 0,
        final_reputation: 0,
        scripted_events: 0,
        skipped_events: 0,
        forced_stops: 0,
        idle_turns: 0,
        rested_months: 0,
        save_timeouts: 0,
        commit_retries: 0,
        headline: String::new(),
    };
    let mut final_summary: Option<CampaignSummary> = None;

    while !session.progress().is_complete() {
        if digest.turns >= options.max_turns {
            bail!(
                "campaign stalled after {} turns in year {}",
                digest.turns,
                session.progress().current_year
            );
        }
        let before = (
            session.progress().current_year,
            session.progress().current_position,
        );
        let view = session.view();
        let action = policy.pick_action(&view);
        let report = match action {
            TurnAction::Play(index) => session.select_card(index, &roster),
            TurnAction::Pass => session.pass_turn(&roster),
            TurnAction::RestMonth => session.advance_month(&roster),
        }
        .with_context(|| format!("turn {} ({action:?}) failed", digest.turns + 1))?;
        check_turn(&session, &report, before)?;
        match &report.kind {
            TurnKind::Moved {
                forced_stop: true, ..
            } => digest.forced_stops += 1,
            TurnKind::Idle => digest.idle_turns += 1,
            TurnKind::RestedMonth => digest.rested_months += 1,
            TurnKind::Moved { .. } => {}
        }

        let choice = policy.pick_choice(&report.pending.outcome);
        let resolution = session
            .execute_event(choice)
            .with_context(|| format!("event on turn {} failed", digest.turns + 1))?;
        digest.turns += 1;
        if resolution.outcome.script_id.is_some() {
            digest.scripted_events += 1;
        }
        if resolution.outcome.skipped {
            digest.skipped_events += 1;
        }
        log::trace!(
            "{} turn {} | {} -> {}",
            policy.name(),
            digest.turns,
            report.kind,
            resolution.entry.title
        );

        match resolution.transition {
            Some(YearTransition::NextYear { summary }) => {
                log::debug!(
                    "Year {} closed after {} turns at panel {}/{}",
                    summary.year,
                    summary.turns,
                    summary.final_position,
                    summary.total_days
                );
                let snapshot = session.snapshot();
                match persist_with_timeout(
                    engine.storage().clone(),
                    owner.clone(),
                    snapshot.clone(),
                    options.save_timeout,
                )
                .await
                {
                    Ok(()) => {
                        let reopened = engine.open(owner.clone(), seed)?;
                        ensure!(
                            reopened.snapshot() == snapshot,
                            "year-end save for {owner} does not reload as written"
                        );
                    }
                    Err(err) => {
                        log::warn!("Year-end snapshot for {owner} not saved: {err}");
                        digest.save_timeouts += 1;
                    }
                }
            }
            Some(YearTransition::GameEnd { summary }) => final_summary = Some(summary),
            None => {}
        }

        if digest.turns % options.commit_every.max(1) == 0 && engine.commit(&mut session).is_err() {
            digest.commit_retries += 1;
        }
    }

    engine
        .commit(&mut session)
        .with_context(|| format!("final commit for {owner} failed"))?;
    ensure!(
        matches!(
            session.select_card(0, &roster),
            Err(SeasonError::GameCompleted)
        ),
        "finished campaign still accepted a card"
    );

    let summary = final_summary
        .ok_or_else(|| anyhow!("campaign completed without a game-end transition"))?;
    ensure!(
        summary.years_completed == session.progress().total_years,
        "campaign ended after {} of {} years",
        summary.years_completed,
        session.progress().total_years
    );
    digest.years_completed = summary.years_completed;
    digest.final_reputation = summary.final_reputation;
    digest.headline = summary.headline;

    Ok(PlayedCampaign {
        digest,
        progress: session.progress().clone(),
    })
}

/// Invariants that must hold after the movement half of any turn.
fn check_turn(session: &SeasonSession, report: &TurnReport, before: (u32, u32)) -> Result<()> {
    let progress = session.progress();
    let map = session
        .map()
        .ok_or_else(|| anyhow!("season has no board after a turn"))?;

    ensure!(report.days_passed > 0, "turn passed no days");
    ensure!(
        progress.hand.len() <= progress.hand.max_cards,
        "hand holds {} cards over a capacity of {}",
        progress.hand.len(),
        progress.hand.max_cards
    );
    if progress.current_year == before.0 {
        ensure!(
            progress.current_position >= before.1,
            "token moved backwards from {} to {}",
            before.1,
            progress.current_position
        );
    }
    if let TurnKind::Moved { from, .. } = &report.kind
        && let Some(stop) = map.next_mandatory_stop_after(*from)
    {
        ensure!(
            report.position <= stop,
            "move from {from} to {} skipped mandatory panel {stop}",
            report.position
        );
    }
    progress
        .validate_against(map)
        .map_err(|reason| anyhow!("inconsistent progress: {reason}"))
}
