// Player roles and the games they belong to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Fantasy roles across both supported games.
///
/// A player holds exactly one role per computation run. Roles are supplied by
/// the roster, never inferred from stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sniper,
    Rifler,
    Carry,
    Mid,
    Offlane,
    Support,
}

impl Role {
    /// Parse a role string as it appears in roster files.
    ///
    /// Accepts a few common aliases ("awp" for sniper, "pos1".."pos5" for the
    /// Dota2 positions, "hard support"/"soft support" for support).
    pub fn from_str_role(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sniper" | "awp" | "awper" => Some(Role::Sniper),
            "rifler" | "rifle" => Some(Role::Rifler),
            "carry" | "pos1" => Some(Role::Carry),
            "mid" | "pos2" => Some(Role::Mid),
            "offlane" | "offlaner" | "pos3" => Some(Role::Offlane),
            "support" | "pos4" | "pos5" | "soft support" | "hard support" => Some(Role::Support),
            _ => None,
        }
    }

    /// Return the display string for this role.
    pub fn display_str(&self) -> &'static str {
        match self {
            Role::Sniper => "sniper",
            Role::Rifler => "rifler",
            Role::Carry => "carry",
            Role::Mid => "mid",
            Role::Offlane => "offlane",
            Role::Support => "support",
        }
    }

    /// The game this role belongs to.
    pub fn game(&self) -> Game {
        match self {
            Role::Sniper | Role::Rifler => Game::Cs2,
            Role::Carry | Role::Mid | Role::Offlane | Role::Support => Game::Dota2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_str_role(s).ok_or_else(|| CoreError::UnknownRole(s.to_string()))
    }
}

/// Supported esports titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Cs2,
    Dota2,
}

impl Game {
    /// Roles in report order.
    pub fn roles(&self) -> &'static [Role] {
        match self {
            Game::Cs2 => &[Role::Rifler, Role::Sniper],
            Game::Dota2 => &[Role::Carry, Role::Mid, Role::Offlane, Role::Support],
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Game::Cs2 => "cs2",
            Game::Dota2 => "dota2",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl FromStr for Game {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cs2" | "cs" | "csgo" => Ok(Game::Cs2),
            "dota2" | "dota" => Ok(Game::Dota2),
            other => Err(CoreError::invalid("game", format!("unknown game `{other}`"))),
        }
    }
}
