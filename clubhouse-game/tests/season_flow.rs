use clubhouse_game::{
    BuiltinDataLoader, CalendarDate, Card, DataLoader, EventCatalog, GameProgress, MemberId,
    PhaseLabel, SEASON_CONFIG_NAME, SeasonConfig, SeasonError, SeasonMachine, TurnKind,
    YearTransition,
};

fn builtin() -> (SeasonConfig, EventCatalog) {
    let loader = BuiltinDataLoader;
    (
        loader.load_config(SEASON_CONFIG_NAME).unwrap(),
        loader.load_event_catalog().unwrap(),
    )
}

fn new_machine(seed: u64) -> SeasonMachine {
    let (config, catalog) = builtin();
    SeasonMachine::new_campaign(seed, config, catalog).unwrap()
}

fn roster() -> Vec<MemberId> {
    ["aki", "daichi", "emi", "goro", "haru"]
        .into_iter()
        .map(MemberId::new)
        .collect()
}

/// Play one full turn with the first card, taking the first option when one
/// is offered.
fn play_turn(machine: &mut SeasonMachine, roster: &[MemberId]) -> Option<YearTransition> {
    let report = machine.select_card(0, roster).unwrap();
    let choice = (!report.pending.outcome.choices.is_empty()).then_some(0);
    machine.execute_event(choice).unwrap().transition
}

#[test]
fn new_save_playing_a_five_moves_five_panels_and_five_days() {
    let mut machine = new_machine(2024);
    let opening = machine.progress();
    assert_eq!(machine.phase(), PhaseLabel::CardSelection);
    assert_eq!(opening.hand.len(), 4);
    assert_eq!(opening.hand.max_cards, 4);
    assert_eq!(opening.current_position, 0);
    assert_eq!(opening.elapsed_days, 0);
    assert_eq!(opening.date(), CalendarDate::new(1, 4, 1));
    assert!(opening.season_history.is_empty());

    machine.with_progress_mut(|progress| {
        progress.hand.cards[0] = Card::plain(900, 5);
    });
    let report = machine.select_card(0, &roster()).unwrap();

    assert_eq!(report.position, 5);
    assert_eq!(report.days_passed, 5);
    assert_eq!(report.date, CalendarDate::new(1, 4, 6));
    let progress = machine.progress();
    assert_eq!(progress.current_position, 5);
    assert_eq!(progress.elapsed_days, 5);
    assert_eq!((progress.current_month, progress.current_day), (4, 6));
    assert_eq!(machine.phase(), PhaseLabel::Event);
    assert_eq!(progress.used_cards.last().map(|card| card.value), Some(5));
    assert_eq!(progress.season_history.len(), 1);
    assert_eq!(progress.season_history[0].chosen_option, None);
    assert!(progress.hand.len() <= progress.hand.max_cards);
}

#[test]
fn empty_hand_and_pile_pass_an_idle_day_without_moving() {
    let mut machine = new_machine(99);
    machine.with_progress_mut(|progress| {
        progress.hand.cards.clear();
        progress.hand.draw_pile_size = 0;
    });
    let report = machine.select_card(0, &roster()).unwrap();

    assert_eq!(report.kind, TurnKind::Idle);
    assert_eq!(report.position, 0);
    assert_eq!(report.days_passed, 1);
    assert_eq!(report.date, CalendarDate::new(1, 4, 2));
    assert_eq!(report.pending.outcome.category.as_str(), "rest");
    assert_eq!(machine.phase(), PhaseLabel::Event);

    machine.execute_event(None).unwrap();
    assert_eq!(machine.phase(), PhaseLabel::CardSelection);
    assert_eq!(machine.progress().elapsed_days, 1);
}

#[test]
fn empty_hand_with_cards_left_refills_before_playing() {
    let mut machine = new_machine(5);
    machine.with_progress_mut(|progress| progress.hand.cards.clear());
    let pile = machine.progress().hand.draw_pile_size;
    let report = machine.select_card(0, &roster()).unwrap();
    assert!(matches!(report.kind, TurnKind::Moved { .. }));
    let hand = &machine.progress().hand;
    assert_eq!(hand.len(), hand.max_cards);
    assert_eq!(pile - hand.draw_pile_size, u32::try_from(hand.max_cards).unwrap() + 1);
}

#[test]
fn campaign_runs_three_years_and_then_rejects_everything() {
    let mut machine = new_machine(0xC1AB);
    let members = roster();
    let mut year_ends = Vec::new();
    let mut last_position = 0;
    let mut last_year = 1;

    for _ in 0..5_000 {
        if machine.phase() == PhaseLabel::GameEnd {
            break;
        }
        let transition = play_turn(&mut machine, &members);
        let progress = machine.progress();
        assert!(progress.hand.len() <= progress.hand.max_cards);
        if progress.current_year == last_year {
            assert!(progress.current_position >= last_position, "token moved backwards");
        }
        last_year = progress.current_year;
        last_position = progress.current_position;
        if let Some(transition) = transition {
            year_ends.push(transition);
        }
    }

    assert_eq!(machine.phase(), PhaseLabel::GameEnd);
    assert_eq!(year_ends.len(), 3, "exactly one year-end per school year");
    assert!(matches!(year_ends[0], YearTransition::NextYear { ref summary } if summary.year == 1));
    assert!(matches!(year_ends[1], YearTransition::NextYear { ref summary } if summary.year == 2));
    let YearTransition::GameEnd { summary } = &year_ends[2] else {
        panic!("third year-end must end the game");
    };
    assert_eq!(summary.years_completed, 3);
    assert_eq!(summary.years.iter().map(|year| year.total_days).collect::<Vec<_>>(), vec![300, 330, 360]);
    assert!(summary.years.iter().all(|year| {
        year.scripted_events.iter().any(|id| id == "spring_tournament")
    }));

    let progress = machine.progress().clone();
    assert_eq!(progress.current_year, 4);
    assert_eq!(machine.select_card(0, &members).unwrap_err(), SeasonError::GameCompleted);
    assert_eq!(machine.pass_turn(&members).unwrap_err(), SeasonError::GameCompleted);
    assert_eq!(machine.advance_month(&members).unwrap_err(), SeasonError::GameCompleted);
    assert_eq!(machine.execute_event(None).unwrap_err(), SeasonError::GameCompleted);
    assert_eq!(machine.progress(), &progress);
}

#[test]
fn mandatory_stops_are_never_skipped() {
    let mut machine = new_machine(31);
    let members = roster();
    let mut visited = Vec::new();
    while machine.progress().current_year == 1 {
        let report = machine.select_card(0, &members).unwrap();
        if let Some(script) = report.pending.outcome.script_id.clone() {
            visited.push(script);
        }
        let choice = (!report.pending.outcome.choices.is_empty()).then_some(0);
        machine.execute_event(choice).unwrap();
    }
    for id in ["spring_tournament", "summer_training_camp", "autumn_tournament"] {
        assert!(visited.iter().any(|seen| seen == id), "{id} was skipped");
    }
}

#[test]
fn same_seed_same_choices_same_campaign() {
    let members = roster();
    let mut first = new_machine(777);
    let mut second = new_machine(777);
    for _ in 0..60 {
        play_turn(&mut first, &members);
        play_turn(&mut second, &members);
    }
    assert_eq!(first.progress(), second.progress());
    assert_eq!(
        first.map().map(|map| map.fingerprint()),
        second.map().map(|map| map.fingerprint())
    );
}

#[test]
fn reloaded_save_continues_like_an_uninterrupted_one() {
    let members = roster();
    let mut uninterrupted = new_machine(4242);
    for _ in 0..25 {
        play_turn(&mut uninterrupted, &members);
    }

    let (progress, map) = uninterrupted.clone().into_parts();
    let json = serde_json::to_string(&progress).unwrap();
    let restored: GameProgress = serde_json::from_str(&json).unwrap();
    let (config, catalog) = builtin();
    let mut reloaded = SeasonMachine::resume(restored, map, config, catalog).unwrap();

    for _ in 0..25 {
        play_turn(&mut uninterrupted, &members);
        play_turn(&mut reloaded, &members);
    }
    assert_eq!(uninterrupted.progress(), reloaded.progress());
}
