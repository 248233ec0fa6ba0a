use crate::config::DrawConfig;
use crate::entrants::Entrant;
use chrono::{DateTime, Utc};
use raffle_history::{RoleId, UserId, WinLog};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a raffle type, expected one of: normal, anyone, new")]
pub struct UnknownRaffleType(pub String);

/// Who is allowed to win, based on past wins.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RaffleType {
    /// The most recent winners sit out
    #[default]
    Normal,
    /// No restrictions, the win is still recorded
    Anyone,
    /// Only people who have never won
    New,
}

impl FromStr for RaffleType {
    type Err = UnknownRaffleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "normal" => Ok(RaffleType::Normal),
            "anyone" => Ok(RaffleType::Anyone),
            "new" => Ok(RaffleType::New),
            _ => Err(UnknownRaffleType(s.to_string())),
        }
    }
}

impl fmt::Display for RaffleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RaffleType::Normal => "normal",
            RaffleType::Anyone => "anyone",
            RaffleType::New => "new",
        })
    }
}

/// Winners excluded from a draw of the given type.
///
/// For [`RaffleType::Normal`] this is the union of the latest
/// `recent_winner_limit` distinct winners and, when a window is configured,
/// everyone who won at or after `now - window`.
pub fn ineligible_ids(
    log: &WinLog,
    raffle_type: RaffleType,
    config: &DrawConfig,
    now: DateTime<Utc>,
) -> HashSet<UserId> {
    match raffle_type {
        RaffleType::Anyone => HashSet::new(),
        RaffleType::New => log.all_time_winner_ids(),
        RaffleType::Normal => {
            let mut ineligible = log
                .recent_winner_ids(config.recent_winner_limit)
                .into_iter()
                .collect::<HashSet<_>>();
            if let Some(window) = config.recent_window() {
                ineligible.extend(log.winner_ids_since(now - window));
            }
            ineligible
        }
    }
}

/// Holding any one of the configured roles is enough; no configured roles
/// means everyone qualifies.
pub fn has_eligible_role(entrant: &Entrant, eligible_roles: &HashSet<RoleId>) -> bool {
    eligible_roles.is_empty() || entrant.roles.iter().any(|role| eligible_roles.contains(role))
}

pub fn eligible_entrants(
    entrants: Vec<Entrant>,
    ineligible: &HashSet<UserId>,
    eligible_roles: &HashSet<RoleId>,
) -> Vec<Entrant> {
    entrants
        .into_iter()
        .filter(|entrant| !ineligible.contains(&entrant.id))
        .filter(|entrant| has_eligible_role(entrant, eligible_roles))
        .collect()
}
