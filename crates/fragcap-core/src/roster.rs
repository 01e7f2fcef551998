// Tournament roster: who plays which role, for which team, at what cost.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::CoreError;
use crate::role::Role;
use crate::stats::PlayerLine;

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub team: String,
    pub role: Role,
    /// Salary-cap units. Always at least 1.
    pub cost: u32,
    /// Stats for this entry are filed under another name (a player listed
    /// under two nicknames across data sources).
    #[serde(default)]
    pub save_as: Option<String>,
    /// Numeric account id, used when a data source omits the display name.
    #[serde(default)]
    pub account_id: Option<u64>,
}

impl Player {
    /// The name this player's stats are aggregated under.
    pub fn canonical_name(&self) -> &str {
        self.save_as.as_deref().unwrap_or(&self.name)
    }
}

/// All players of a computation run, keyed by display name.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: BTreeMap<String, Player>,
    by_account: HashMap<u64, String>,
}

impl Roster {
    /// Build a roster, checking costs and alias consistency.
    ///
    /// An alias must point at an entry with the same role (or at a name that
    /// is not itself on the roster), otherwise the aliased stats would land in
    /// two role buckets.
    pub fn new(players: impl IntoIterator<Item = Player>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        let mut by_account = HashMap::new();

        for player in players {
            if player.cost == 0 {
                return Err(CoreError::invalid(
                    format!("roster entry `{}`", player.name),
                    "cost must be at least 1",
                ));
            }
            if let Some(id) = player.account_id.filter(|id| *id != 0) {
                by_account.insert(id, player.name.clone());
            }
            if map.insert(player.name.clone(), player.clone()).is_some() {
                return Err(CoreError::invalid(
                    format!("roster entry `{}`", player.name),
                    "duplicate player name",
                ));
            }
        }

        for player in map.values() {
            let Some(alias) = &player.save_as else {
                continue;
            };
            if let Some(target) = map.get(alias) {
                if target.role != player.role {
                    return Err(CoreError::invalid(
                        format!("roster entry `{}`", player.name),
                        format!(
                            "saved as `{alias}` whose role is {} (entry role is {})",
                            target.role, player.role
                        ),
                    ));
                }
            }
        }

        Ok(Roster {
            players: map,
            by_account,
        })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    /// Iterate entries in name order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Find the roster entry for a match line: display name first, then
    /// account id.
    pub fn resolve(&self, line: &PlayerLine) -> Option<&Player> {
        if let Some(player) = line.name.as_deref().and_then(|n| self.players.get(n.trim())) {
            return Some(player);
        }
        line.account_id
            .and_then(|id| self.by_account.get(&id))
            .and_then(|name| self.players.get(name))
    }

    /// The entry that owns a canonical (aggregation) name. Prefers an entry
    /// with that exact display name, then the first entry aliased to it.
    pub fn canonical_player(&self, canonical: &str) -> Option<&Player> {
        self.players.get(canonical).or_else(|| {
            self.players
                .values()
                .find(|p| p.save_as.as_deref() == Some(canonical))
        })
    }

    /// Cost table keyed by canonical name.
    pub fn costs(&self) -> BTreeMap<String, u32> {
        let mut costs = BTreeMap::new();
        for player in self.players.values() {
            let canonical = player.canonical_name();
            if let Some(owner) = self.canonical_player(canonical) {
                costs.insert(canonical.to_string(), owner.cost);
            }
        }
        costs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Cs2Stats, StatRecord};

    fn player(name: &str, role: Role, cost: u32) -> Player {
        Player {
            name: name.into(),
            team: "Team".into(),
            role,
            cost,
            save_as: None,
            account_id: None,
        }
    }

    fn line(name: Option<&str>, account_id: Option<u64>) -> PlayerLine {
        PlayerLine {
            name: name.map(String::from),
            account_id,
            side: None,
            stats: StatRecord::Cs2(Cs2Stats::default()),
        }
    }

    #[test]
    fn resolves_by_name_then_account() {
        let mut yatoro = player("Yatoro", Role::Carry, 20);
        yatoro.account_id = Some(321580662);
        let roster = Roster::new([yatoro, player("Collapse", Role::Offlane, 18)]).unwrap();

        assert_eq!(roster.resolve(&line(Some("Collapse"), None)).unwrap().name, "Collapse");
        assert_eq!(
            roster.resolve(&line(None, Some(321580662))).unwrap().name,
            "Yatoro"
        );
        assert!(roster.resolve(&line(Some("Miposhka"), Some(1))).is_none());
    }

    #[test]
    fn rejects_zero_cost() {
        let err = Roster::new([player("ZywOo", Role::Sniper, 0)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn alias_with_different_role_is_rejected() {
        let mut alias = player("Raddan", Role::Carry, 15);
        alias.save_as = Some("Raddan_".into());
        let target = player("Raddan_", Role::Support, 15);
        assert!(Roster::new([alias, target]).is_err());
    }

    #[test]
    fn costs_are_keyed_by_canonical_name() {
        let mut alias = player("Ame.", Role::Carry, 30);
        alias.save_as = Some("Ame".into());
        let roster = Roster::new([alias, player("Ame", Role::Carry, 22)]).unwrap();
        let costs = roster.costs();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs["Ame"], 22);
    }

    #[test]
    fn alias_without_target_owns_its_canonical_name() {
        let mut alias = player("9Class", Role::Mid, 12);
        alias.save_as = Some("9class".into());
        let roster = Roster::new([alias]).unwrap();
        assert_eq!(roster.canonical_player("9class").unwrap().name, "9Class");
        assert_eq!(roster.costs()["9class"], 12);
    }
}
