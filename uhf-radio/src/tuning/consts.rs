//! Shared constants for the tuning search algorithms.

// ============================================================
// False-positive detection / TX backoff
// ============================================================

/// Objective below this is suspicious: the level detector may be saturated
/// rather than the antenna matched.
pub const SUSPICIOUS_OBJECTIVE: u16 = 20;

/// Counter-probe objective deltas below this count as "detector stuck".
pub const MIN_OBJECTIVE_DIFF: u16 = 10;

/// A backoff reading above the original objective by more than this margin
/// confirms the original reading as a measurement artifact.
pub const BACKOFF_MARGIN: u16 = 10;

/// PA output steps removed per backoff escalation level.
pub const BACKOFF_DECREMENTS_PER_LEVEL: u8 = 3;

/// Maximum backoff escalation levels.
pub const BACKOFF_MAX_LEVELS: u8 = 5;

// ============================================================
// Hill climb / coordinate descent
// ============================================================

/// Climb lookahead: non-improving steps tolerated before the walk stops.
pub const CLIMB_PATIENCE: u8 = 3;

/// Measurement budget of a single `Slow` coordinate descent.
pub const SLOW_STEP_BUDGET: u16 = 100;

// ============================================================
// Multi-start searches
// ============================================================

/// Per-start measurement budget used by both multi-start variants.
pub const MULTI_START_STEP_BUDGET: u16 = 30;

/// Starting points per axis, exhaustive multi-start (27 starts total).
pub const MULTI_START_POINTS: usize = 3;

/// Sample grid points per axis, sample-then-refine variant (64 probes).
pub const ENHANCED_GRID_POINTS: usize = 4;

/// Summits kept for refinement by the sample-then-refine variant.
pub const ENHANCED_SUMMITS: usize = 3;
