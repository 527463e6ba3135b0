//! End-of-campaign summary.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::map::PanelCategory;
use crate::progress::{GameProgress, YearSummary};

/// Aggregate of every finished school year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub seed: u64,
    pub years_completed: u32,
    pub total_turns: u32,
    pub total_cards_used: u32,
    pub final_reputation: u32,
    pub bonus_slots: u32,
    pub events_by_category: BTreeMap<PanelCategory, u32>,
    pub scripted_events: u32,
    pub skipped_events: u32,
    pub years: Vec<YearSummary>,
    pub headline: String,
}

impl CampaignSummary {
    /// Fold the per-year summaries recorded in `progress`.
    #[must_use]
    pub fn from_progress(progress: &GameProgress) -> Self {
        let years = progress.year_summaries.clone();
        let mut events_by_category = BTreeMap::new();
        for year in &years {
            for (category, count) in &year.events_by_category {
                *events_by_category.entry(*category).or_insert(0) += count;
            }
        }
        let finales = years.iter().filter(|year| year.reached_finale).count();
        Self {
            seed: progress.seed,
            years_completed: u32::try_from(years.len()).unwrap_or(u32::MAX),
            total_turns: progress.total_turns,
            total_cards_used: years.iter().map(|year| year.cards_used).sum(),
            final_reputation: progress.reputation,
            bonus_slots: progress.bonus_slots,
            events_by_category,
            scripted_events: years
                .iter()
                .map(|year| u32::try_from(year.scripted_events.len()).unwrap_or(u32::MAX))
                .sum(),
            skipped_events: years.iter().map(|year| year.skipped_events).sum(),
            headline: headline(finales, years.len(), progress.reputation),
            years,
        }
    }
}

fn headline(finales: usize, years: usize, reputation: u32) -> String {
    if years > 0 && finales == years {
        format!("Every season run to the final whistle. Reputation {reputation}.")
    } else {
        format!("{finales} of {years} seasons reached the finale. Reputation {reputation}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year(number: u32, finale: bool) -> YearSummary {
        YearSummary {
            year: number,
            total_days: 300,
            map_fingerprint: 0,
            turns: 80,
            cards_used: 75,
            final_position: 299,
            elapsed_days: 299,
            reputation: 10 * number,
            events_by_category: BTreeMap::from([(PanelCategory::Match, 4), (PanelCategory::Rest, 2)]),
            scripted_events: vec![String::from("spring_tournament")],
            skipped_events: 1,
            reached_finale: finale,
        }
    }

    #[test]
    fn folds_year_totals() {
        let mut progress = GameProgress::unstarted(42, 2);
        progress.year_summaries = vec![year(1, true), year(2, false)];
        progress.total_turns = 160;
        progress.reputation = 20;
        let summary = CampaignSummary::from_progress(&progress);
        assert_eq!(summary.years_completed, 2);
        assert_eq!(summary.total_cards_used, 150);
        assert_eq!(summary.events_by_category[&PanelCategory::Match], 8);
        assert_eq!(summary.scripted_events, 2);
        assert_eq!(summary.skipped_events, 2);
        assert!(summary.headline.starts_with("1 of 2"));
    }
}
