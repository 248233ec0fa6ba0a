use crate::{Error, GuildId, RaffleId, RoleId, UserId, WinLog, WinRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
struct GuildState {
    #[serde(default)]
    ongoing: Option<RaffleId>,
    #[serde(default)]
    wins: Vec<WinRecord>,
    #[serde(default)]
    eligible_roles: BTreeSet<RoleId>,
}

/// Plain, serializable contents of a history store.
///
/// Stores wrap this behind a lock; every operation here assumes exclusive access.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryState {
    #[serde(default)]
    guilds: BTreeMap<GuildId, GuildState>,
    #[serde(default)]
    next_seq: u64,
}

impl HistoryState {
    pub fn ongoing_raffle_id(&self, guild: GuildId) -> Option<RaffleId> {
        self.guilds.get(&guild).and_then(|state| state.ongoing)
    }

    pub fn create(&mut self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        let state = self.guilds.entry(guild).or_default();
        if state.ongoing.is_some() {
            return Err(Error::RaffleAlreadyOngoing);
        }
        state.ongoing = Some(raffle);
        Ok(())
    }

    pub fn close(&mut self, guild: GuildId) -> Result<(), Error> {
        self.guilds
            .get_mut(&guild)
            .and_then(|state| state.ongoing.take())
            .map(|_| ())
            .ok_or(Error::NoOngoingRaffle)
    }

    pub fn record_win(
        &mut self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) {
        let first_seq = self.next_seq;
        self.next_seq += winners.len() as u64;
        let state = self.guilds.entry(guild).or_default();
        state
            .wins
            .extend(winners.iter().zip(first_seq..).map(|(&winner, seq)| WinRecord {
                guild,
                raffle,
                winner,
                won_at,
                seq,
            }));
    }

    pub fn clear_wins(&mut self, guild: GuildId, raffle: RaffleId) {
        if let Some(state) = self.guilds.get_mut(&guild) {
            state.wins.retain(|record| record.raffle != raffle);
        }
    }

    /// Records the final winners of the ongoing `raffle` and closes it in one go.
    /// Any wins already recorded for `raffle` are replaced.
    pub fn close_with_wins(
        &mut self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        if self.ongoing_raffle_id(guild) != Some(raffle) {
            return Err(Error::NoOngoingRaffle);
        }
        self.close(guild)?;
        self.clear_wins(guild, raffle);
        self.record_win(guild, raffle, winners, won_at);
        Ok(())
    }

    pub fn win_log(&self, guild: GuildId) -> WinLog {
        WinLog::new(
            self.guilds
                .get(&guild)
                .map(|state| state.wins.clone())
                .unwrap_or_default(),
        )
    }

    pub fn eligible_role_ids(&self, guild: GuildId) -> HashSet<RoleId> {
        self.guilds
            .get(&guild)
            .map(|state| state.eligible_roles.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_eligible_role_ids(&mut self, guild: GuildId, roles: HashSet<RoleId>) {
        self.guilds.entry(guild).or_default().eligible_roles = roles.into_iter().collect();
    }
}
