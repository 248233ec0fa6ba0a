use super::Error;
use crate::entrants::Entrant;
use itertools::Itertools;
use raffle_history::WinCounts;
use std::collections::BTreeMap;

pub type WinBucket = u64;

/// Relative tickets handed to each present win bucket.
///
/// The bucket with the fewest wins gets exactly one ticket and every extra win
/// multiplies that by `ticket_ratio`, so with the default ratio of 0.75 someone
/// with one more win holds 0.75x the tickets, 0.5625x with two more, and so on.
/// With a ratio in (0, 1] no bucket ever holds more than one ticket.
pub fn tickets_per_bucket(
    buckets: impl IntoIterator<Item = WinBucket>,
    ticket_ratio: f64,
) -> Result<BTreeMap<WinBucket, f64>, Error> {
    let buckets = buckets.into_iter().collect::<Vec<_>>();
    let lowest = buckets
        .iter()
        .copied()
        .min()
        .ok_or(Error::DegenerateTicketPool)?;
    Ok(buckets
        .into_iter()
        .unique()
        .map(|bucket| {
            // past i32::MAX the ticket is long gone to zero anyway
            let exponent = i32::try_from(bucket - lowest).unwrap_or(i32::MAX);
            (bucket, ticket_ratio.powi(exponent))
        })
        .collect())
}

/// Probability for each entrant to be drawn first, in the same order as `entrants`.
///
/// Entrants with the same number of past wins share the same probability and
/// the probabilities add up to one, up to [`crate::utils::PROBABILITY_EPSILON`].
/// `ticket_ratio` is expected in (0, 1], as checked by
/// [`crate::config::DrawConfig::validate`].
pub fn win_probabilities(
    entrants: &[Entrant],
    win_counts: &WinCounts,
    ticket_ratio: f64,
) -> Result<Vec<f64>, Error> {
    let entrant_buckets = entrants
        .iter()
        .map(|entrant| win_counts.get(&entrant.id).copied().unwrap_or(0))
        .collect::<Vec<WinBucket>>();
    let entrants_per_bucket = entrant_buckets.iter().copied().counts();
    let tickets = tickets_per_bucket(entrants_per_bucket.keys().copied().sorted(), ticket_ratio)?;

    let total_tickets = tickets
        .iter()
        .map(|(bucket, tickets)| entrants_per_bucket[bucket] as f64 * tickets)
        .sum::<f64>();
    if !(total_tickets.is_finite() && total_tickets > 0.0) {
        return Err(Error::DegenerateTicketPool);
    }
    tracing::debug!(
        buckets = tickets.len(),
        total_tickets,
        "computed weighted ticket pool"
    );

    // the value of a single ticket once the whole pool adds up to one
    let value_of_one_ticket = total_tickets.recip();
    Ok(entrant_buckets
        .iter()
        .map(|bucket| tickets[bucket] * value_of_one_ticket)
        .collect())
}
