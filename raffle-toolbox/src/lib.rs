pub mod config;
pub mod eligibility;
pub mod entrants;
pub mod raffle;
pub mod selection;
pub mod utils;

pub use raffle::{DrawOutcome, DrawParams, Error, Raffler};
