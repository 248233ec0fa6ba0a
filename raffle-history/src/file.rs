use crate::{Error, GuildId, HistoryState, HistoryStore, RaffleId, RoleId, UserId, WinLog};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// History persisted as a single JSON document, rewritten after every mutation.
///
/// A mutation is applied to a copy of the state and only becomes visible once
/// the file has been written, so a failed write leaves both the file and the
/// in-memory state untouched.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    state: Mutex<HistoryState>,
}

impl JsonFileHistory {
    /// Opens the history at `path`, starting empty if the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            serde_json::from_reader(BufReader::new(File::open(&path)?))?
        } else {
            HistoryState::default()
        };
        tracing::debug!(path = %path.display(), "opened raffle history");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryState>, Error> {
        self.state.lock().map_err(|_| Error::Poisoned)
    }

    fn persist(&self, state: &HistoryState) -> Result<(), Error> {
        let tmp = self.path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, state)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        std::fs::rename(&tmp, &self.path)?;
        tracing::trace!(path = %self.path.display(), "raffle history written");
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut HistoryState) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let res = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(res)
    }
}

impl HistoryStore for JsonFileHistory {
    fn has_ongoing(&self, guild: GuildId) -> Result<bool, Error> {
        Ok(self.lock()?.ongoing_raffle_id(guild).is_some())
    }

    fn create(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        self.mutate(|state| state.create(guild, raffle))
    }

    fn close(&self, guild: GuildId) -> Result<(), Error> {
        self.mutate(|state| state.close(guild))
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
        self.mutate(|state| {
            state.record_win(guild, raffle, winners, won_at);
            Ok(())
        })
    }

    fn clear_wins(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        self.mutate(|state| {
            state.clear_wins(guild, raffle);
            Ok(())
        })
    }

    fn replace_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.mutate(|state| {
            state.clear_wins(guild, raffle);
            state.record_win(guild, raffle, winners, won_at);
            Ok(())
        })
    }

    fn close_with_wins(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        winners: &[UserId],
        won_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.mutate(|state| state.close_with_wins(guild, raffle, winners, won_at))
    }

    fn win_log(&self, guild: GuildId) -> Result<WinLog, Error> {
        Ok(self.lock()?.win_log(guild))
    }

    fn eligible_role_ids(&self, guild: GuildId) -> Result<HashSet<RoleId>, Error> {
        Ok(self.lock()?.eligible_role_ids(guild))
    }

    fn set_eligible_role_ids(&self, guild: GuildId, roles: HashSet<RoleId>) -> Result<(), Error> {
        self.mutate(|state| {
            state.set_eligible_role_ids(guild, roles);
            Ok(())
        })
    }
}
