use crate::selection::Seed;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_RECENT_WINNER_LIMIT: usize = 6;
pub const DEFAULT_RECENT_WINDOW_DAYS: u32 = 7;
/// Each extra past win multiplies a participant's tickets by this ratio.
pub const DEFAULT_TICKET_RATIO: f64 = 0.75;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("ticket ratio must be in (0, 1], got {0}")]
    InvalidTicketRatio(f64),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DrawConfig {
    /// How many of the latest distinct winners sit out a normal raffle
    pub recent_winner_limit: usize,
    /// Winners of the trailing window also sit out a normal raffle, `None` disables it
    pub recent_window_days: Option<u32>,
    pub ticket_ratio: f64,
    /// Fixed seed for reproducible draws, fresh entropy is used otherwise
    pub seed: Option<Seed>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            recent_winner_limit: DEFAULT_RECENT_WINNER_LIMIT,
            recent_window_days: Some(DEFAULT_RECENT_WINDOW_DAYS),
            ticket_ratio: DEFAULT_TICKET_RATIO,
            seed: None,
        }
    }
}

impl DrawConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ticket_ratio > 0.0 && self.ticket_ratio <= 1.0 {
            Ok(())
        } else {
            Err(Error::InvalidTicketRatio(self.ticket_ratio))
        }
    }

    pub fn recent_window(&self) -> Option<Duration> {
        self.recent_window_days
            .map(|days| Duration::days(i64::from(days)))
    }
}
