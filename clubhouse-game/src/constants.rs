//! Centralized calendar and tuning constants for the season engine.
//!
//! Values that shape the deterministic math of a season live here so that
//! balance changes go through code review rather than drifting inside the
//! modules that consume them. Data-driven knobs (card weights, board layout)
//! live in [`crate::config::SeasonConfig`] instead.

// Calendar -----------------------------------------------------------------
/// Month the school year (and every season board) starts in.
pub const SEASON_START_MONTH: u8 = 4;
/// Day of month the season starts on.
pub const SEASON_START_DAY: u8 = 1;
/// Non-leap, calendar-accurate month lengths indexed by `month - 1`.
pub const DAYS_PER_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
/// Length of one school year on the fixed calendar.
pub const DAYS_PER_SCHOOL_YEAR: u32 = 365;
/// Days that pass on a turn resolved through the zero-move policy.
pub const IDLE_DAY_ADVANCE: u32 = 1;

// Campaign -----------------------------------------------------------------
pub const DEFAULT_TOTAL_YEARS: u32 = 3;
pub const MAX_TOTAL_YEARS: u32 = 6;

// Cards --------------------------------------------------------------------
pub const DEFAULT_START_HAND: usize = 4;
pub const DEFAULT_MAX_HAND: usize = 8;
pub const DEFAULT_HAND_GROWTH_PER_YEAR: usize = 1;
pub const DEFAULT_DECK_SIZE: u32 = 120;
pub const DEFAULT_MIN_CARD_VALUE: u8 = 1;
pub const DEFAULT_MAX_CARD_VALUE: u8 = 6;
pub const DEFAULT_DRAW_EXTRA_CHANCE: f32 = 0.05;
pub const DEFAULT_SKIP_EVENT_CHANCE: f32 = 0.05;
/// Hard ceiling on card values any configuration may request.
pub const CARD_VALUE_CEILING: u8 = 12;

// Board --------------------------------------------------------------------
pub const DEFAULT_BASE_DAYS: i32 = 300;
pub const DEFAULT_DAYS_GROWTH_PER_YEAR: i32 = 30;
/// Reputation needed to shift one distribution point from rest to match.
pub const REPUTATION_PER_MATCH_POINT: u32 = 20;
pub const DEFAULT_REPUTATION_MATCH_CAP: u32 = 10;
pub const DISTRIBUTION_TOTAL: u32 = 100;

// Events -------------------------------------------------------------------
pub const DEFAULT_MIN_PARTICIPANTS: usize = 1;
pub const DEFAULT_MAX_PARTICIPANTS: usize = 3;
pub(crate) const QUIET_DAY_TEMPLATE_ID: &str = "quiet_day";
pub(crate) const QUIET_DAY_TITLE: &str = "A quiet day";
pub(crate) const QUIET_DAY_DESC: &str = "The club skipped today's activity and nothing happened.";

// RNG domains --------------------------------------------------------------
pub(crate) const RNG_DOMAIN_CARDS: &[u8] = b"cards";
pub(crate) const RNG_DOMAIN_BOARD: &[u8] = b"board";
pub(crate) const RNG_DOMAIN_EVENTS: &[u8] = b"events";
