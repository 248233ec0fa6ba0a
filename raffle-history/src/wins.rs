use crate::{GuildId, RaffleId, UserId, WinCounts};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WinRecord {
    pub guild: GuildId,
    pub raffle: RaffleId,
    pub winner: UserId,
    pub won_at: DateTime<Utc>,
    /// Insertion order across the whole store, breaks ties between records
    /// sharing the same timestamp.
    pub seq: u64,
}

/// Read-only view over the wins of a single guild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WinLog {
    records: Vec<WinRecord>,
}

impl WinLog {
    pub fn new(records: Vec<WinRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[WinRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The same log as if every win of `raffle` had never been recorded.
    pub fn excluding_raffle(mut self, raffle: RaffleId) -> Self {
        self.records.retain(|record| record.raffle != raffle);
        self
    }

    pub fn win_counts(&self) -> WinCounts {
        self.records
            .iter()
            .counts_by(|record| record.winner)
            .into_iter()
            .map(|(winner, count)| (winner, count as u64))
            .collect()
    }

    pub fn all_time_winner_ids(&self) -> HashSet<UserId> {
        self.records.iter().map(|record| record.winner).collect()
    }

    /// The `limit` most recent distinct winners, most recent first.
    pub fn recent_winner_ids(&self, limit: usize) -> Vec<UserId> {
        self.records
            .iter()
            .sorted_by_key(|record| Reverse((record.won_at, record.seq)))
            .map(|record| record.winner)
            .unique()
            .take(limit)
            .collect()
    }

    /// Every winner with a win recorded at or after `since`.
    pub fn winner_ids_since(&self, since: DateTime<Utc>) -> HashSet<UserId> {
        self.records
            .iter()
            .filter(|record| record.won_at >= since)
            .map(|record| record.winner)
            .collect()
    }
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    impl Arbitrary for WinLog {
        type Parameters = ();
        type Strategy = BoxedStrategy<WinLog>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            // small id spaces so that winners and raffles repeat
            proptest::collection::vec((0..20u64, 0..8u64, 0..1_000_000i64), 0..64)
                .prop_map(|wins| {
                    let epoch = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
                    let records = wins
                        .into_iter()
                        .enumerate()
                        .map(|(seq, (winner, raffle, offset))| WinRecord {
                            guild: 0,
                            raffle,
                            winner,
                            won_at: epoch + Duration::seconds(offset),
                            seq: seq as u64,
                        })
                        .collect();
                    WinLog::new(records)
                })
                .boxed()
        }
    }
}
