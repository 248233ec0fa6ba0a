mod file;
mod memory;
mod state;
mod wins;

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub use file::JsonFileHistory;
pub use wins::{WinLog, WinRecord};
pub use memory::MemoryHistory;
pub use state::HistoryState;

pub type GuildId = u64;
pub type RaffleId = u64;
pub type UserId = u64;
pub type RoleId = u64;

/// All-time number of wins per winner, scoped to a single guild.
pub type WinCounts = HashMap<UserId, u64>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("There is already an ongoing raffle!")]
    RaffleAlreadyOngoing,
    #[error("There is no ongoing raffle! You need to start a new one.")]
    NoOngoingRaffle,
    #[error("raffle history lock was poisoned")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Durable raffle state for every guild: at most one ongoing raffle marker per
/// guild, the append-only win log and the guild's eligible role configuration.
///
/// Implementations must serialize mutations so that `create` and `close` keep
/// the "at most one ongoing raffle per guild" invariant, and `replace_wins`
/// must be observed as a single step.
pub trait HistoryStore {
    fn has_ongoing(&self, guild: GuildId) -> Result<bool, Error>;

    /// Marks `raffle` as the ongoing raffle of `guild`.
    /// Fails with [`Error::RaffleAlreadyOngoing`] if one is already open.
    fn create(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error>;

    /// Clears the ongoing raffle marker of `guild`.
    /// Fails with [`Error::NoOngoingRaffle`] if there is none.
    fn close(&self, guild: GuildId) -> Result<(), Error>;

    fn ongoing_raffle_id(&self, guild: GuildId) -> Result<Option<RaffleId>, Error>;

    fn record_win(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    fn clear_wins(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error>;

    /// Clears every win of `raffle` and records `winners` in its place, atomically.
    fn replace_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Replaces the wins of the ongoing `raffle` with `winners` and closes it,
    /// atomically. Fails with [`Error::NoOngoingRaffle`], recording nothing,
    /// unless `raffle` is the ongoing raffle of `guild`.
    fn close_with_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Snapshot of every win recorded in `guild`.
    fn win_log(&self, guild: GuildId) -> Result<WinLog, Error>;

    fn eligible_role_ids(&self, guild: GuildId) -> Result<HashSet<RoleId>, Error>;

    fn set_eligible_role_ids(&self, guild: GuildId, roles: HashSet<RoleId>) -> Result<(), Error>;

    fn win_counts(&self, guild: GuildId) -> Result<WinCounts, Error> {
        Ok(self.win_log(guild)?.win_counts())
    }

    fn all_time_winner_ids(&self, guild: GuildId) -> Result<HashSet<UserId>, Error> {
        Ok(self.win_log(guild)?.all_time_winner_ids())
    }

    fn recent_winner_ids(&self, guild: GuildId, limit: usize) -> Result<Vec<UserId>, Error> {
        Ok(self.win_log(guild)?.recent_winner_ids(limit))
    }

    fn winner_ids_since(
        &self,
        guild: GuildId,
        since: DateTime<Utc>,
    ) -> Result<HashSet<UserId>, Error> {
        Ok(self.win_log(guild)?.winner_ids_since(since))
    }
}

impl<T: HistoryStore + ?Sized> HistoryStore for &T {
    fn has_ongoing(&self, guild: GuildId) -> Result<bool, Error> {
        (**self).has_ongoing(guild)
    }

    fn create(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        (**self).create(guild, raffle)
    }

    fn close(&self, guild: GuildId) -> Result<(), Error> {
        (**self).close(guild)
    }

    fn ongoing_raffle_id(&self, guild: GuildId) -> Result<Option<RaffleId>, Error> {
        (**self).ongoing_raffle_id(guild)
    }

    fn record_win(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        (**self).record_win(guild, raffle, winners, won_at)
    }

    fn clear_wins(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        (**self).clear_wins(guild, raffle)
    }

    fn replace_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        (**self).replace_wins(guild, raffle, winners, won_at)
    }

    fn close_with_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        (**self).close_with_wins(guild, raffle, winners, won_at)
    }

    fn win_log(&self, guild: GuildId) -> Result<WinLog, Error> {
        (**self).win_log(guild)
    }

    fn eligible_role_ids(&self, guild: GuildId) -> Result<HashSet<RoleId>, Error> {
        (**self).eligible_role_ids(guild)
    }

    fn set_eligible_role_ids(&self, guild: GuildId, roles: HashSet<RoleId>) -> Result<(), Error> {
        (**self).set_eligible_role_ids(guild, roles)
    }
}
