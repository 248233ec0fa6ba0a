mod tickets;

use crate::entrants::Entrant;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::{ChaCha8Rng, ChaChaRng};
use raffle_history::WinCounts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use tickets::{tickets_per_bucket, win_probabilities, WinBucket};

pub type Seed = <ChaChaRng as SeedableRng>::Seed;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The number of winners must be at least 1.")]
    InvalidWinnerCount,
    #[error("There are not enough entrants for that many winners ({requested} requested, {available} eligible).")]
    InsufficientEntrants { requested: usize, available: usize },
    #[error("the weighted ticket pool is empty")]
    DegenerateTicketPool,
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a selection type, expected one of: weighted, unweighted")]
pub struct UnknownSelectionType(pub String);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    /// Lower odds of winning the more times you've won before
    #[default]
    Weighted,
    /// Every entrant has the same odds regardless of past wins
    Unweighted,
}

impl FromStr for SelectionType {
    type Err = UnknownSelectionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "weighted" => Ok(SelectionType::Weighted),
            "unweighted" => Ok(SelectionType::Unweighted),
            _ => Err(UnknownSelectionType(s.to_string())),
        }
    }
}

impl fmt::Display for SelectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionType::Weighted => "weighted",
            SelectionType::Unweighted => "unweighted",
        })
    }
}

/// Rng for a single draw, reproducible when a seed is given.
pub fn draw_rng(seed: Option<Seed>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::from_seed(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Draws `num_winners` distinct entrants.
///
/// `win_counts` is only looked at for [`SelectionType::Weighted`], where each
/// pick is made with the probabilities of [`win_probabilities`] over the
/// entrants still in the pool: the winner is removed and the rest renormalized
/// before the next pick.
pub fn select<R: Rng + ?Sized>(
    entrants: &[Entrant],
    num_winners: usize,
    selection_type: SelectionType,
    win_counts: &WinCounts,
    ticket_ratio: f64,
    rng: &mut R,
) -> Result<Vec<Entrant>, Error> {
    if num_winners == 0 {
        return Err(Error::InvalidWinnerCount);
    }
    if entrants.len() < num_winners {
        return Err(Error::InsufficientEntrants {
            requested: num_winners,
            available: entrants.len(),
        });
    }

    match selection_type {
        SelectionType::Unweighted => Ok(select_unweighted(entrants, num_winners, rng)),
        SelectionType::Weighted => {
            select_weighted(entrants, num_winners, win_counts, ticket_ratio, rng)
        }
    }
}

fn select_unweighted<R: Rng + ?Sized>(
    entrants: &[Entrant],
    num_winners: usize,
    rng: &mut R,
) -> Vec<Entrant> {
    rand::seq::index::sample(rng, entrants.len(), num_winners)
        .into_iter()
        .map(|index| entrants[index].clone())
        .collect()
}

fn select_weighted<R: Rng + ?Sized>(
    entrants: &[Entrant],
    num_winners: usize,
    win_counts: &WinCounts,
    ticket_ratio: f64,
    rng: &mut R,
) -> Result<Vec<Entrant>, Error> {
    // order does not change the odds, shuffling just keeps any bias of the
    // sampler from lining up with the order entrants were collected in
    let mut pool = entrants.to_vec();
    pool.shuffle(rng);

    let mut winners = Vec::with_capacity(num_winners);
    for _ in 0..num_winners {
        // over the remaining pool, whose fewest wins always hold a full ticket
        let weights = win_probabilities(&pool, win_counts, ticket_ratio)?;
        let index = WeightedIndex::new(&weights)
            .map_err(|_| Error::DegenerateTicketPool)?
            .sample(rng);
        winners.push(pool.swap_remove(index));
    }
    Ok(winners)
}
