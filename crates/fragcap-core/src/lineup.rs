// Lineup enumeration and ranking.
//
// A lineup template lists (role, arity) slots. Every role-valid player set is
// enumerated in a fixed order (slots nested in template order, first slot
// outermost; inside a slot, index combinations i < j < ...), and each set
// yields one candidate per captain choice. Candidates are ranked twice: the
// dream ranking ignores cost, the budget ranking keeps sets whose total cost
// fits the budget.
//
// Ranking order is (points desc, discovery sequence asc). The discovery
// sequence is (first-slot combination, index within it), which is the same
// whether the scan runs on one thread or is split across rayon workers.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::ops::ControlFlow;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::role::{Game, Role};
use crate::summary::{Leaderboards, SortField};

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub role: Role,
    pub arity: usize,
}

impl SlotSpec {
    pub fn new(role: Role, arity: usize) -> Self {
        SlotSpec { role, arity }
    }
}

/// Ordered role slots that make up one lineup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineupTemplate {
    slots: Vec<SlotSpec>,
}

impl LineupTemplate {
    /// Validate and build a template: at least one slot, no zero arity, no
    /// role listed twice, all roles from one game.
    pub fn new(slots: Vec<SlotSpec>) -> Result<Self, CoreError> {
        let Some(first) = slots.first() else {
            return Err(CoreError::InvalidTemplate("template has no slots".into()));
        };
        let game = first.role.game();
        for (i, slot) in slots.iter().enumerate() {
            if slot.arity == 0 {
                return Err(CoreError::InvalidTemplate(format!(
                    "slot `{}` has zero arity",
                    slot.role
                )));
            }
            if slots[..i].iter().any(|s| s.role == slot.role) {
                return Err(CoreError::InvalidTemplate(format!(
                    "role `{}` listed more than once",
                    slot.role
                )));
            }
            if slot.role.game() != game {
                return Err(CoreError::InvalidTemplate(format!(
                    "role `{}` is not a {} role",
                    slot.role, game
                )));
            }
        }
        Ok(LineupTemplate { slots })
    }

    /// Default lineup shape for a game. The rifler quartet is the outer loop
    /// for CS2, so the sniper varies fastest.
    pub fn for_game(game: Game) -> Self {
        let slots = match game {
            Game::Cs2 => vec![SlotSpec::new(Role::Rifler, 4), SlotSpec::new(Role::Sniper, 1)],
            Game::Dota2 => vec![
                SlotSpec::new(Role::Carry, 1),
                SlotSpec::new(Role::Mid, 1),
                SlotSpec::new(Role::Offlane, 1),
                SlotSpec::new(Role::Support, 2),
            ],
        };
        LineupTemplate { slots }
    }

    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Players per lineup.
    pub fn size(&self) -> usize {
        self.slots.iter().map(|s| s.arity).sum()
    }

    pub fn game(&self) -> Game {
        self.slots
            .first()
            .map(|s| s.role.game())
            .unwrap_or(Game::Cs2)
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineupMember {
    pub player: String,
    pub team: String,
    pub role: Role,
    pub cost: u32,
    /// The member's sort-field value.
    pub points: f64,
}

/// One role-filled lineup with a captain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineupCandidate {
    /// Members in template slot order.
    pub members: Vec<LineupMember>,
    pub captain: String,
    pub total_cost: u32,
    /// Member points summed with the captain counted twice.
    pub total_points: f64,
}

impl LineupCandidate {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.player.as_str())
    }

    pub fn captain_member(&self) -> Option<&LineupMember> {
        self.members.iter().find(|m| m.player == self.captain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rankings {
    pub dream: Vec<LineupCandidate>,
    pub budget: Vec<LineupCandidate>,
}

/// How the candidate space is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    /// Full enumeration with bounded top-K selection. Exact.
    Exhaustive { parallel: bool },
    /// Stop as soon as `top_k` budget candidates were found in scan order,
    /// then sort what was collected. The result depends on scan order and is
    /// not the true top-K by points.
    FirstFound,
}

impl Default for RankingStrategy {
    fn default() -> Self {
        RankingStrategy::Exhaustive { parallel: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineupOptions {
    pub budget: u32,
    pub top_k: usize,
    pub sort_field: SortField,
    pub strategy: RankingStrategy,
}

// ---------------------------------------------------------------------------
// Candidate pool
// ---------------------------------------------------------------------------

struct Entry {
    name: String,
    team: String,
    role: Role,
    cost: u32,
    points: f64,
}

struct Combo {
    picks: Vec<usize>,
    cost: u64,
    points: f64,
}

struct SlotPool {
    entries: Vec<Entry>,
    combos: Vec<Combo>,
}

/// Index combinations of size `k` from `0..n`, lexicographic.
pub(crate) fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let Some(i) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            return out;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

fn build_pool(
    summaries: &Leaderboards,
    costs: &BTreeMap<String, u32>,
    template: &LineupTemplate,
    sort_field: SortField,
) -> Result<Vec<SlotPool>, CoreError> {
    let mut pool = Vec::with_capacity(template.slots().len());

    for slot in template.slots() {
        let rows = summaries.sorted(slot.role, sort_field);
        if rows.len() < slot.arity {
            return Err(CoreError::InsufficientRoster {
                role: slot.role,
                required: slot.arity,
                available: rows.len(),
            });
        }

        let entries = rows
            .into_iter()
            .map(|m| {
                let cost = costs
                    .get(&m.player)
                    .copied()
                    .ok_or_else(|| CoreError::MissingCost {
                        player: m.player.clone(),
                    })?;
                Ok(Entry {
                    name: m.player.clone(),
                    team: m.team.clone(),
                    role: slot.role,
                    cost,
                    points: sort_field.value(m),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let combos = combinations(entries.len(), slot.arity)
            .into_iter()
            .map(|picks| Combo {
                cost: picks.iter().map(|&i| entries[i].cost as u64).sum(),
                points: picks.iter().map(|&i| entries[i].points).sum(),
                picks,
            })
            .collect();

        debug!("slot {} x{}: {} player(s)", slot.role, slot.arity, entries.len());
        pool.push(SlotPool { entries, combos });
    }

    Ok(pool)
}

fn partitions(pool: &[SlotPool]) -> usize {
    pool.first().map_or(0, |s| s.combos.len())
}

/// Visit every player set whose first slot uses combination `first`. The
/// last slot varies fastest.
fn for_each_set<F>(pool: &[SlotPool], first: usize, mut visit: F) -> ControlFlow<()>
where
    F: FnMut(&[&Combo]) -> ControlFlow<()>,
{
    let Some((head, rest)) = pool.split_first() else {
        return ControlFlow::Continue(());
    };
    let Some(head_combo) = head.combos.get(first) else {
        return ControlFlow::Continue(());
    };
    if rest.iter().any(|s| s.combos.is_empty()) {
        return ControlFlow::Continue(());
    }

    let mut odometer = vec![0usize; rest.len()];
    let mut set: Vec<&Combo> = Vec::with_capacity(pool.len());
    loop {
        set.clear();
        set.push(head_combo);
        for (slot, &i) in rest.iter().zip(&odometer) {
            set.push(&slot.combos[i]);
        }
        if visit(&set).is_break() {
            return ControlFlow::Break(());
        }

        let mut pos = odometer.len();
        loop {
            if pos == 0 {
                return ControlFlow::Continue(());
            }
            pos -= 1;
            odometer[pos] += 1;
            if odometer[pos] < rest[pos].combos.len() {
                break;
            }
            odometer[pos] = 0;
        }
    }
}

fn to_millis(points: f64) -> i64 {
    (points * 1000.0).round() as i64
}

/// A candidate as seen during the scan, before it is materialized.
struct CandidateRef<'a> {
    millis: i64,
    seq: (usize, u64),
    cost: u64,
    members: &'a [(usize, usize)],
    captain: usize,
}

/// Emit every candidate of one partition in discovery order. Returns the
/// number of candidates emitted.
fn scan_partition<F>(pool: &[SlotPool], partition: usize, mut sink: F) -> u64
where
    F: FnMut(&CandidateRef<'_>) -> ControlFlow<()>,
{
    let mut local = 0u64;
    let mut members: Vec<(usize, usize)> = Vec::new();
    let mut member_points: Vec<f64> = Vec::new();

    let _ = for_each_set(pool, partition, |set| {
        members.clear();
        member_points.clear();
        let mut cost = 0u64;
        let mut points = 0.0;
        for (slot, combo) in set.iter().enumerate() {
            cost += combo.cost;
            points += combo.points;
            for &i in &combo.picks {
                members.push((slot, i));
                member_points.push(pool[slot].entries[i].points);
            }
        }

        for (captain, captain_points) in member_points.iter().enumerate() {
            let candidate = CandidateRef {
                millis: to_millis(points + captain_points),
                seq: (partition, local),
                cost,
                members: &members,
                captain,
            };
            local += 1;
            if sink(&candidate).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    });

    local
}

// ---------------------------------------------------------------------------
// Bounded top-K
// ---------------------------------------------------------------------------

struct Ranked {
    millis: i64,
    seq: (usize, u64),
    members: Vec<(usize, usize)>,
    captain: usize,
}

impl Ranked {
    fn from_ref(c: &CandidateRef<'_>) -> Self {
        Ranked {
            millis: c.millis,
            seq: c.seq,
            members: c.members.to_vec(),
            captain: c.captain,
        }
    }

    fn beats(&self, other: &Ranked) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis && self.seq == other.seq
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Better candidates compare as smaller, so the max-heap top is the worst
/// kept candidate and `into_sorted_vec` lists best first.
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .millis
            .cmp(&self.millis)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct TopK {
    k: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    fn new(k: usize) -> Self {
        TopK {
            k,
            heap: BinaryHeap::with_capacity(k.min(4096) + 1),
        }
    }

    fn offer(&mut self, c: &CandidateRef<'_>) {
        if self.heap.len() < self.k {
            self.heap.push(Ranked::from_ref(c));
            return;
        }
        let better = self.heap.peek().is_some_and(|worst| {
            c.millis > worst.millis || (c.millis == worst.millis && c.seq < worst.seq)
        });
        if better {
            self.heap.pop();
            self.heap.push(Ranked::from_ref(c));
        }
    }

    fn offer_ranked(&mut self, r: Ranked) {
        if self.heap.len() < self.k {
            self.heap.push(r);
        } else if self.heap.peek().is_some_and(|worst| r.beats(worst)) {
            self.heap.pop();
            self.heap.push(r);
        }
    }

    fn absorb(&mut self, other: TopK) {
        for r in other.heap {
            self.offer_ranked(r);
        }
    }

    fn into_ranked(self) -> Vec<Ranked> {
        self.heap.into_sorted_vec()
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

struct Scanned {
    dream: Vec<Ranked>,
    budget: Vec<Ranked>,
    candidates: u64,
}

fn exhaustive_sequential(pool: &[SlotPool], k: usize, budget: u64) -> Scanned {
    let mut dream = TopK::new(k);
    let mut within = TopK::new(k);
    let mut candidates = 0;
    for p in 0..partitions(pool) {
        candidates += scan_partition(pool, p, |c: &CandidateRef<'_>| {
            dream.offer(c);
            if c.cost <= budget {
                within.offer(c);
            }
            ControlFlow::Continue(())
        });
    }
    Scanned {
        dream: dream.into_ranked(),
        budget: within.into_ranked(),
        candidates,
    }
}

fn exhaustive_parallel(pool: &[SlotPool], k: usize, budget: u64) -> Scanned {
    let (dream, within, candidates) = (0..partitions(pool))
        .into_par_iter()
        .map(|p| {
            let mut dream = TopK::new(k);
            let mut within = TopK::new(k);
            let n = scan_partition(pool, p, |c: &CandidateRef<'_>| {
                dream.offer(c);
                if c.cost <= budget {
                    within.offer(c);
                }
                ControlFlow::Continue(())
            });
            (dream, within, n)
        })
        .reduce(
            || (TopK::new(k), TopK::new(k), 0),
            |(mut dream, mut within, n), (d, w, m)| {
                dream.absorb(d);
                within.absorb(w);
                (dream, within, n + m)
            },
        );
    Scanned {
        dream: dream.into_ranked(),
        budget: within.into_ranked(),
        candidates,
    }
}

fn first_found(pool: &[SlotPool], k: usize, budget: u64) -> Scanned {
    let mut dream: Vec<Ranked> = Vec::new();
    let mut within: Vec<Ranked> = Vec::new();
    let mut candidates = 0;

    for p in 0..partitions(pool) {
        candidates += scan_partition(pool, p, |c: &CandidateRef<'_>| {
            if dream.len() < k {
                dream.push(Ranked::from_ref(c));
            }
            if c.cost <= budget {
                within.push(Ranked::from_ref(c));
                if within.len() >= k {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });
        if within.len() >= k {
            break;
        }
    }

    // Stable: equal points keep discovery order.
    dream.sort_by(|a, b| b.millis.cmp(&a.millis));
    within.sort_by(|a, b| b.millis.cmp(&a.millis));
    Scanned {
        dream,
        budget: within,
        candidates,
    }
}

fn materialize(pool: &[SlotPool], ranked: Vec<Ranked>) -> Vec<LineupCandidate> {
    ranked
        .into_iter()
        .map(|r| {
            let members: Vec<LineupMember> = r
                .members
                .iter()
                .map(|&(slot, i)| {
                    let e = &pool[slot].entries[i];
                    LineupMember {
                        player: e.name.clone(),
                        team: e.team.clone(),
                        role: e.role,
                        cost: e.cost,
                        points: e.points,
                    }
                })
                .collect();
            let captain = members
                .get(r.captain)
                .map(|m| m.player.clone())
                .unwrap_or_default();
            LineupCandidate {
                total_cost: members.iter().map(|m| m.cost).sum(),
                total_points: r.millis as f64 / 1000.0,
                captain,
                members,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Enumerate lineups for `template` and return the dream and budget
/// rankings, each at most `top_k` long.
pub fn generate_lineups(
    summaries: &Leaderboards,
    costs: &BTreeMap<String, u32>,
    template: &LineupTemplate,
    options: &LineupOptions,
) -> Result<Rankings, CoreError> {
    if options.top_k == 0 {
        return Err(CoreError::invalid("top_k", "must be at least 1"));
    }
    let pool = build_pool(summaries, costs, template, options.sort_field)?;
    let budget = options.budget as u64;

    let scanned = match options.strategy {
        RankingStrategy::Exhaustive { parallel: false } => {
            exhaustive_sequential(&pool, options.top_k, budget)
        }
        RankingStrategy::Exhaustive { parallel: true } => {
            exhaustive_parallel(&pool, options.top_k, budget)
        }
        RankingStrategy::FirstFound => first_found(&pool, options.top_k, budget),
    };

    info!(
        "scanned {} lineup candidate(s) by {}: {} dream, {} within budget {}",
        scanned.candidates,
        options.sort_field,
        scanned.dream.len(),
        scanned.budget.len(),
        options.budget
    );

    Ok(Rankings {
        dream: materialize(&pool, scanned.dream),
        budget: materialize(&pool, scanned.budget),
    })
}

/// Player-set counts (captain choice ignored) per budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetDistribution {
    pub total: u64,
    /// (budget, sets with total cost ≤ budget), in the order requested.
    pub within: Vec<(u32, u64)>,
}

pub fn budget_distribution(
    summaries: &Leaderboards,
    costs: &BTreeMap<String, u32>,
    template: &LineupTemplate,
    budgets: &[u32],
) -> Result<BudgetDistribution, CoreError> {
    let pool = build_pool(summaries, costs, template, SortField::TotalPoints)?;

    // Cost histogram: distinct set costs are few next to the sets themselves.
    let mut by_cost: BTreeMap<u64, u64> = BTreeMap::new();
    let mut total = 0u64;
    for p in 0..partitions(&pool) {
        let _ = for_each_set(&pool, p, |set| {
            *by_cost.entry(set.iter().map(|c| c.cost).sum()).or_insert(0) += 1;
            total += 1;
            ControlFlow::Continue(())
        });
    }
    debug!("{} player set(s) over {} distinct cost(s)", total, by_cost.len());

    let within = budgets
        .iter()
        .map(|&b| (b, by_cost.range(..=u64::from(b)).map(|(_, n)| n).sum::<u64>()))
        .collect();
    Ok(BudgetDistribution { total, within })
}

/// `(all sets, sets within budget)`.
pub fn count_lineups(
    summaries: &Leaderboards,
    costs: &BTreeMap<String, u32>,
    template: &LineupTemplate,
    budget: u32,
) -> Result<(u64, u64), CoreError> {
    let dist = budget_distribution(summaries, costs, template, &[budget])?;
    let within = dist.within.first().map_or(0, |(_, n)| *n);
    Ok((dist.total, within))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
