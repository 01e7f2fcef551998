// Library root: scoring, aggregation, summaries and lineup enumeration for
// esports fantasy tournaments. No I/O happens in this crate; loaders and
// report writers live in fragcap-app.

pub mod aggregate;
pub mod error;
pub mod lineup;
pub mod overall;
pub mod points;
pub mod role;
pub mod roster;
pub mod stats;
pub mod summary;

pub use aggregate::{
    aggregate, Aggregation, Aggregator, Diagnostics, MultiplierPolicy, PlayerSeries, RoleBuckets,
    SkippedUnit, UnitEntry, Window,
};
pub use error::CoreError;
pub use lineup::{
    budget_distribution, count_lineups, generate_lineups, BudgetDistribution, LineupCandidate,
    LineupMember, LineupOptions, LineupTemplate, RankingStrategy, Rankings, SlotSpec,
};
pub use overall::{merge_all, merge_overalls};
pub use points::{compute_points, round3, Category, PointBreakdown, ScoringRules};
pub use role::{Game, Role};
pub use roster::{Player, Roster};
pub use stats::{Cs2Stats, Dota2Stats, MatchRecord, PlayerLine, StatRecord};
pub use summary::{summarize, summarize_buckets, CaptainRating, Leaderboards, SortField, SummaryMetrics};
