use crate::{Error, GuildId, HistoryState, HistoryStore, RaffleId, RoleId, UserId, WinLog};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// History kept in process memory only, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    state: Mutex<HistoryState>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: HistoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryState>, Error> {
        self.state.lock().map_err(|_| Error::Poisoned)
    }
}

impl HistoryStore for MemoryHistory {
    fn has_ongoing(&self, guild: GuildId) -> Result<bool, Error> {
        Ok(self.lock()?.ongoing_raffle_id(guild).is_some())
    }

    fn create(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        self.lock()?.create(guild, raffle)
    }

    fn close(&self, guild: GuildId) -> Result<(), Error> {
        self.lock()?.close(guild)
    }

    fn ongoing_raffle_id(&self, guild: GuildId) -> Result<Option<RaffleId>, Error> {
        Ok(self.lock()?.ongoing_raffle_id(guild))
    }

    fn record_win(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.lock()?.record_win(guild, raffle, winners, won_at);
        Ok(())
    }

    fn clear_wins(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        self.lock()?.clear_wins(guild, raffle);
        Ok(())
    }

    fn replace_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut state = self.lock()?;
        state.clear_wins(guild, raffle);
        state.record_win(guild, raffle, winners, won_at);
        Ok(())
    }

    fn close_with_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.lock()?.close_with_wins(guild, raffle, winners, won_at)
    }

    fn win_log(&self, guild: GuildId) -> Result<WinLog, Error> {
        Ok(self.lock()?.win_log(guild))
    }

    fn eligible_role_ids(&self, guild: GuildId) -> Result<HashSet<RoleId>, Error> {
        Ok(self.lock()?.eligible_role_ids(guild))
    }

    fn set_eligible_role_ids(&self, guild: GuildId, roles: HashSet<RoleId>) -> Result<(), Error> {
        self.lock()?.set_eligible_role_ids(guild, roles);
        Ok(())
    }
}
