use std::fmt;

use clap::ValueEnum;
use clubhouse_game::{Card, CardTag, EventChoice, EventOutcome, SeasonView};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// What a policy wants to do on a CardSelection turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAction {
    Play(usize),
    Pass,
    RestMonth,
}

/// Policy interface for automated play.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Choose the action for the current CardSelection phase.
    fn pick_action(&mut self, view: &SeasonView) -> TurnAction;

    /// Pick an option for an interactive event; `None` when there is none.
    fn pick_choice(&mut self, outcome: &EventOutcome) -> Option<usize>;
}

/// Built-in strategies for automated campaigns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum PlayStrategy {
    /// Always play the biggest card
    Highest,
    /// Always play the smallest card
    Lowest,
    /// Uniform random cards and options, with the odd rest day
    Random,
    /// Keeps moves near the middle and banks draw-extra cards
    Steady,
}

impl PlayStrategy {
    pub const ALL: [Self; 4] = [Self::Highest, Self::Lowest, Self::Random, Self::Steady];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PlayStrategy::Highest => "Highest",
            PlayStrategy::Lowest => "Lowest",
            PlayStrategy::Random => "Random",
            PlayStrategy::Steady => "Steady",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            PlayStrategy::Highest => Box::new(HighestPolicy),
            PlayStrategy::Lowest => Box::new(LowestPolicy),
            PlayStrategy::Random => Box::new(RandomPolicy::new(seed)),
            PlayStrategy::Steady => Box::new(SteadyPolicy),
        }
    }

    /// Parse a comma-separated list; `all` expands to every strategy.
    pub fn parse_list(tokens: &[String]) -> Result<Vec<Self>, String> {
        let mut strategies = Vec::new();
        for token in tokens {
            if token.eq_ignore_ascii_case("all") {
                strategies.extend(Self::ALL);
                continue;
            }
            strategies.push(Self::from_str(token, true)?);
        }
        if strategies.is_empty() {
            strategies.extend(Self::ALL);
        }
        let mut unique = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            if !unique.contains(&strategy) {
                unique.push(strategy);
            }
        }
        Ok(unique)
    }
}

impl fmt::Display for PlayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn index_by<K: Ord>(cards: &[Card], key: impl Fn(&Card) -> K) -> usize {
    cards
        .iter()
        .enumerate()
        .min_by_key(|(_, card)| key(card))
        .map_or(0, |(index, _)| index)
}

fn choice_score(choice: &EventChoice) -> i32 {
    choice.stats.total() + choice.motivation - choice.fatigue
}

fn best_choice(choices: &[EventChoice]) -> Option<usize> {
    choices
        .iter()
        .enumerate()
        .max_by_key(|(index, choice)| (choice_score(choice), std::cmp::Reverse(*index)))
        .map(|(index, _)| index)
}

struct HighestPolicy;
struct LowestPolicy;
struct SteadyPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for HighestPolicy {
    fn name(&self) -> &'static str {
        "highest"
    }

    fn pick_action(&mut self, view: &SeasonView) -> TurnAction {
        TurnAction::Play(index_by(&view.hand, |card| std::cmp::Reverse(card.value)))
    }

    fn pick_choice(&mut self, outcome: &EventOutcome) -> Option<usize> {
        best_choice(&outcome.choices)
    }
}

impl PlayerPolicy for LowestPolicy {
    fn name(&self) -> &'static str {
        "lowest"
    }

    fn pick_action(&mut self, view: &SeasonView) -> TurnAction {
        TurnAction::Play(index_by(&view.hand, |card| card.value))
    }

    fn pick_choice(&mut self, outcome: &EventOutcome) -> Option<usize> {
        outcome.choices.len().checked_sub(1)
    }
}

impl PlayerPolicy for SteadyPolicy {
    fn name(&self) -> &'static str {
        "steady"
    }

    fn pick_action(&mut self, view: &SeasonView) -> TurnAction {
        if let Some(index) = view
            .hand
            .iter()
            .position(|card| card.has_tag(CardTag::DrawExtra))
        {
            return TurnAction::Play(index);
        }
        TurnAction::Play(index_by(&view.hand, |card| card.value.abs_diff(3)))
    }

    fn pick_choice(&mut self, outcome: &EventOutcome) -> Option<usize> {
        outcome
            .choices
            .iter()
            .enumerate()
            .min_by_key(|(_, choice)| choice.fatigue)
            .map(|(index, _)| index)
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn pick_action(&mut self, view: &SeasonView) -> TurnAction {
        let roll = self.rng.gen_range(0..100_u32);
        if roll < 2 {
            return TurnAction::RestMonth;
        }
        if roll < 7 {
            return TurnAction::Pass;
        }
        if view.hand.is_empty() {
            return TurnAction::Play(0);
        }
        TurnAction::Play(self.rng.gen_range(0..view.hand.len()))
    }

    fn pick_choice(&mut self, outcome: &EventOutcome) -> Option<usize> {
        if outcome.choices.is_empty() {
            None
        } else {
            Some(self.rng.gen_range(0..outcome.choices.len()))
        }
    }
}
