use crate::config::{self, DrawConfig};
use crate::eligibility::{eligible_entrants, ineligible_ids, RaffleType, UnknownRaffleType};
use crate::entrants::{collect_entrants, Entrant, EntrantSource};
use crate::selection::{self, draw_rng, select, SelectionType, UnknownSelectionType};
use chrono::{DateTime, Utc};
use raffle_history::{GuildId, HistoryStore, RaffleId, UserId, WinLog};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Everything that can stop a raffle command. The messages are meant to be
/// shown to whoever issued the command as they are.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    History(#[from] raffle_history::Error),
    #[error(transparent)]
    Selection(#[from] selection::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    UnknownRaffleType(#[from] UnknownRaffleType),
    #[error(transparent)]
    UnknownSelectionType(#[from] UnknownSelectionType),
    #[error("Oops! That raffle does not exist anymore.")]
    RaffleNotFound(RaffleId),
    #[error("You must invoke this by replying to the original raffle message.")]
    MissingRaffleReference,
    #[error("That raffle is still ongoing! Close it before redoing it.")]
    RaffleStillOngoing(RaffleId),
    #[error("Could not fetch the raffle entrants.")]
    EntrantSource(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawParams {
    pub raffle_type: RaffleType,
    pub num_winners: usize,
    pub selection_type: SelectionType,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            raffle_type: RaffleType::default(),
            num_winners: 1,
            selection_type: SelectionType::default(),
        }
    }
}

impl DrawParams {
    /// Builds the parameters of a close or redo command from raw user input,
    /// falling back to a normal, weighted, single winner draw.
    pub fn parse(
        raffle_type: Option<&str>,
        num_winners: Option<i64>,
        selection_type: Option<&str>,
    ) -> Result<Self, Error> {
        let num_winners = match num_winners {
            Some(n) => usize::try_from(n).map_err(|_| selection::Error::InvalidWinnerCount)?,
            None => 1,
        };
        let params = Self {
            raffle_type: raffle_type
                .map(str::parse::<RaffleType>)
                .transpose()?
                .unwrap_or_default(),
            num_winners,
            selection_type: selection_type
                .map(str::parse::<SelectionType>)
                .transpose()?
                .unwrap_or_default(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_winners < 1 {
            return Err(selection::Error::InvalidWinnerCount.into());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Nobody eligible entered, nothing was recorded
    NoWinner,
    Winners(Vec<Entrant>),
}

impl DrawOutcome {
    pub fn winner_ids(&self) -> Vec<UserId> {
        match self {
            DrawOutcome::NoWinner => Vec::new(),
            DrawOutcome::Winners(winners) => winners.iter().map(|winner| winner.id).collect(),
        }
    }
}

/// Runs raffles for any number of guilds on top of a history store and a
/// source of entrants.
pub struct Raffler<S, E> {
    history: S,
    entrants: E,
    config: DrawConfig,
}

impl<S: HistoryStore, E: EntrantSource> Raffler<S, E> {
    pub fn new(history: S, entrants: E, config: DrawConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            history,
            entrants,
            config,
        })
    }

    pub fn history(&self) -> &S {
        &self.history
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    /// Opens `raffle` as the ongoing raffle of `guild`.
    pub fn start(&self, guild: GuildId, raffle: RaffleId) -> Result<(), Error> {
        self.history.create(guild, raffle)?;
        info!(guild, raffle, "raffle opened");
        Ok(())
    }

    /// Draws the winners of the ongoing raffle, records them and closes the raffle.
    ///
    /// If the draw fails the raffle stays open so that it can be closed again
    /// with different parameters.
    pub fn end(&self, guild: GuildId, params: DrawParams) -> Result<DrawOutcome, Error> {
        params.validate()?;
        let raffle = self
            .history
            .ongoing_raffle_id(guild)?
            .ok_or(raffle_history::Error::NoOngoingRaffle)?;

        let now = Utc::now();
        let outcome = self.draw(guild, raffle, self.history.win_log(guild)?, params, now)?;
        self.history
            .close_with_wins(guild, raffle, &outcome.winner_ids(), now)?;
        info!(guild, raffle, winners = ?outcome.winner_ids(), "raffle closed");
        Ok(outcome)
    }

    /// Draws new winners for a past raffle, replacing the ones recorded before.
    ///
    /// The previous winners of `reference` are not held against anyone in the
    /// new draw. A redo without winners still clears the previous ones. The
    /// ongoing raffle can only be closed, not redone.
    pub fn redo(
        &self,
        guild: GuildId,
        reference: Option<RaffleId>,
        params: DrawParams,
    ) -> Result<DrawOutcome, Error> {
        let raffle = reference.ok_or(Error::MissingRaffleReference)?;
        params.validate()?;
        if self.history.ongoing_raffle_id(guild)? == Some(raffle) {
            return Err(Error::RaffleStillOngoing(raffle));
        }

        let now = Utc::now();
        let log = self.history.win_log(guild)?.excluding_raffle(raffle);
        let outcome = self.draw(guild, raffle, log, params, now)?;
        self.history
            .replace_wins(guild, raffle, &outcome.winner_ids(), now)?;
        info!(guild, raffle, winners = ?outcome.winner_ids(), "raffle redone");
        Ok(outcome)
    }

    /// Entrants of `raffle` allowed to win a draw of type `raffle_type`.
    pub fn eligible_entrants(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        log: &WinLog,
        raffle_type: RaffleType,
        now: DateTime<Utc>,
    ) -> Result<Vec<Entrant>, Error> {
        let reactions = self
            .entrants
            .reactions_on(guild, raffle)
            .map_err(|e| Error::EntrantSource(Box::new(e)))?
            .ok_or(Error::RaffleNotFound(raffle))?;
        let entrants = collect_entrants(reactions);

        let ineligible = ineligible_ids(log, raffle_type, &self.config, now);
        let eligible_roles = self.history.eligible_role_ids(guild)?;
        let eligible = eligible_entrants(entrants, &ineligible, &eligible_roles);
        debug!(
            guild,
            raffle,
            %raffle_type,
            ineligible = ineligible.len(),
            eligible = eligible.len(),
            "filtered raffle entrants"
        );
        Ok(eligible)
    }

    fn draw(
        &self,
        guild: GuildId,
        raffle: RaffleId,
        log: WinLog,
        params: DrawParams,
        now: DateTime<Utc>,
    ) -> Result<DrawOutcome, Error> {
        let eligible = self.eligible_entrants(guild, raffle, &log, params.raffle_type, now)?;
        if eligible.is_empty() {
            warn!(guild, raffle, "no eligible entrants, there is no winner");
            return Ok(DrawOutcome::NoWinner);
        }

        let winners = select(
            &eligible,
            params.num_winners,
            params.selection_type,
            &log.win_counts(),
            self.config.ticket_ratio,
            &mut draw_rng(self.config.seed),
        )?;
        Ok(DrawOutcome::Winners(winners))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entrants::{Reaction, StaticEntrants};
    use raffle_history::MemoryHistory;
    use std::collections::HashSet;

    const GUILD: GuildId = 1;

    fn reaction(users: impl IntoIterator<Item = Entrant>) -> Reaction {
        Reaction {
            users: users.into_iter().collect(),
        }
    }

    fn entrants_of(raffles: &[(RaffleId, Vec<Reaction>)]) -> StaticEntrants {
        let mut source = StaticEntrants::new();
        for (raffle, reactions) in raffles {
            source.insert(GUILD, *raffle, reactions.clone());
        }
        source
    }

    fn raffler(source: StaticEntrants) -> Raffler<MemoryHistory, StaticEntrants> {
        Raffler::new(MemoryHistory::new(), source, DrawConfig::default()).unwrap()
    }

    fn anyone(num_winners: usize) -> DrawParams {
        DrawParams {
            raffle_type: RaffleType::Anyone,
            num_winners,
            selection_type: SelectionType::Weighted,
        }
    }

    fn wins_of(raffler: &Raffler<MemoryHistory, StaticEntrants>, raffle: RaffleId) -> Vec<UserId> {
        raffler
            .history()
            .win_log(GUILD)
            .unwrap()
            .records()
            .iter()
            .filter(|record| record.raffle == raffle)
            .map(|record| record.winner)
            .collect()
    }

    #[test]
    fn no_reactions_means_no_winner() {
        let raffler = raffler(entrants_of(&[(100, vec![])]));
        raffler.start(GUILD, 100).unwrap();
        let outcome = raffler.end(GUILD, DrawParams::default()).unwrap();
        assert_eq!(outcome, DrawOutcome::NoWinner);
        assert!(raffler.history().win_log(GUILD).unwrap().is_empty());
        assert!(!raffler.history().has_ongoing(GUILD).unwrap());
    }

    #[test]
    fn only_one_raffle_at_a_time() {
        let raffler = raffler(StaticEntrants::new());
        raffler.start(GUILD, 100).unwrap();
        assert!(matches!(
            raffler.start(GUILD, 101),
            Err(Error::History(raffle_history::Error::RaffleAlreadyOngoing))
        ));
        raffler.start(GUILD + 1, 101).unwrap();
    }

    #[test]
    fn closing_without_a_raffle_fails() {
        let raffler = raffler(StaticEntrants::new());
        assert!(matches!(
            raffler.end(GUILD, DrawParams::default()),
            Err(Error::History(raffle_history::Error::NoOngoingRaffle))
        ));
    }

    #[test]
    fn winners_are_recorded_and_raffle_closed() {
        let raffler = raffler(entrants_of(&[(
            100,
            vec![
                reaction([Entrant::new(10), Entrant::new(11)]),
                reaction([Entrant::new(11), Entrant::new(12)]),
            ],
        )]));
        raffler.start(GUILD, 100).unwrap();
        let outcome = raffler.end(GUILD, anyone(2)).unwrap();
        let winners = outcome.winner_ids();
        assert_eq!(winners.len(), 2);
        assert!(winners.iter().all(|id| [10, 11, 12].contains(id)));
        assert_eq!(wins_of(&raffler, 100), winners);
        assert!(!raffler.history().has_ongoing(GUILD).unwrap());
    }

    #[test]
    fn failed_draw_keeps_the_raffle_open() {
        let raffler = raffler(entrants_of(&[(100, vec![reaction([Entrant::new(10)])])]));
        raffler.start(GUILD, 100).unwrap();
        assert!(matches!(
            raffler.end(GUILD, anyone(2)),
            Err(Error::Selection(selection::Error::InsufficientEntrants {
                requested: 2,
                available: 1
            }))
        ));
        assert_eq!(raffler.history().ongoing_raffle_id(GUILD).unwrap(), Some(100));
        assert_eq!(raffler.end(GUILD, anyone(1)).unwrap().winner_ids(), vec![10]);
    }

    #[test]
    fn recent_winners_sit_out_normal_raffles() {
        let raffler = raffler(entrants_of(&[
            (100, vec![reaction([Entrant::new(10)])]),
            (101, vec![reaction([Entrant::new(10), Entrant::new(11)])]),
        ]));
        raffler.start(GUILD, 100).unwrap();
        raffler.end(GUILD, DrawParams::default()).unwrap();
        raffler.start(GUILD, 101).unwrap();
        let outcome = raffler.end(GUILD, DrawParams::default()).unwrap();
        assert_eq!(outcome.winner_ids(), vec![11]);
    }

    #[test]
    fn new_raffles_exclude_every_past_winner() {
        let raffler = raffler(entrants_of(&[
            (100, vec![reaction([Entrant::new(10)])]),
            (101, vec![reaction([Entrant::new(10)])]),
        ]));
        raffler.start(GUILD, 100).unwrap();
        raffler.end(GUILD, anyone(1)).unwrap();
        raffler.start(GUILD, 101).unwrap();
        let params = DrawParams {
            raffle_type: RaffleType::New,
            ..Default::default()
        };
        assert_eq!(raffler.end(GUILD, params).unwrap(), DrawOutcome::NoWinner);
        assert_eq!(wins_of(&raffler, 101), Vec::<UserId>::new());
    }

    #[test]
    fn role_restriction_comes_from_the_guild() {
        let raffler = raffler(entrants_of(&[(
            100,
            vec![reaction([
                Entrant::new(10),
                Entrant::with_roles(11, [1]),
                Entrant::with_roles(12, [3]),
            ])],
        )]));
        raffler
            .history()
            .set_eligible_role_ids(GUILD, HashSet::from([1, 2]))
            .unwrap();
        raffler.start(GUILD, 100).unwrap();
        assert_eq!(raffler.end(GUILD, anyone(1)).unwrap().winner_ids(), vec![11]);
    }

    #[test]
    fn redo_replaces_previous_winners() {
        let raffler = raffler(entrants_of(&[(
            100,
            vec![reaction((10..20).map(Entrant::new))],
        )]));
        raffler.start(GUILD, 100).unwrap();
        let first = raffler.end(GUILD, anyone(3)).unwrap().winner_ids();
        let second = raffler.redo(GUILD, Some(100), anyone(3)).unwrap().winner_ids();
        assert_eq!(wins_of(&raffler, 100), second);
        assert_eq!(
            raffler.history().win_log(GUILD).unwrap().records().len(),
            3,
            "first draw {:?} must be gone",
            first
        );
    }

    #[test]
    fn redo_does_not_hold_the_previous_draw_against_its_winners() {
        let raffler = raffler(entrants_of(&[(100, vec![reaction([Entrant::new(10)])])]));
        raffler.start(GUILD, 100).unwrap();
        raffler.end(GUILD, DrawParams::default()).unwrap();
        let outcome = raffler.redo(GUILD, Some(100), DrawParams::default()).unwrap();
        assert_eq!(outcome.winner_ids(), vec![10]);
        assert_eq!(wins_of(&raffler, 100), vec![10]);
    }

    #[test]
    fn redo_needs_a_reference_to_an_existing_raffle() {
        let raffler = raffler(StaticEntrants::new());
        assert!(matches!(
            raffler.redo(GUILD, None, DrawParams::default()),
            Err(Error::MissingRaffleReference)
        ));
        assert!(matches!(
            raffler.redo(GUILD, Some(100), DrawParams::default()),
            Err(Error::RaffleNotFound(100))
        ));
    }

    #[test]
    fn ongoing_raffle_cannot_be_redone() {
        let raffler = raffler(entrants_of(&[(
            100,
            vec![reaction((10..20).map(Entrant::new))],
        )]));
        raffler.start(GUILD, 100).unwrap();
        assert!(matches!(
            raffler.redo(GUILD, Some(100), anyone(1)),
            Err(Error::RaffleStillOngoing(100))
        ));
        assert!(wins_of(&raffler, 100).is_empty());
        let winners = raffler.end(GUILD, anyone(1)).unwrap().winner_ids();
        assert_eq!(wins_of(&raffler, 100), winners);
        raffler.redo(GUILD, Some(100), anyone(1)).unwrap();
        assert_eq!(wins_of(&raffler, 100).len(), 1);
    }

    #[test]
    fn redo_without_eligible_entrants_clears_the_raffle() {
        let history = MemoryHistory::new();
        history.record_win(GUILD, 100, &[10], Utc::now()).unwrap();
        let raffler = Raffler::new(
            history,
            entrants_of(&[(100, vec![])]),
            DrawConfig::default(),
        )
        .unwrap();
        assert_eq!(
            raffler.redo(GUILD, Some(100), DrawParams::default()).unwrap(),
            DrawOutcome::NoWinner
        );
        assert!(raffler.history().win_log(GUILD).unwrap().is_empty());
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let source = entrants_of(&[(100, vec![reaction((10..40).map(Entrant::new))])]);
        let config = DrawConfig {
            seed: Some([3; 32]),
            ..Default::default()
        };
        let outcomes = (0..2)
            .map(|_| {
                let raffler = Raffler::new(MemoryHistory::new(), &source, config.clone()).unwrap();
                raffler.start(GUILD, 100).unwrap();
                raffler.end(GUILD, anyone(4)).unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[test]
    fn params_from_user_input() {
        assert_eq!(DrawParams::parse(None, None, None).unwrap(), DrawParams::default());
        assert_eq!(
            DrawParams::parse(Some("new"), Some(3), Some("unweighted")).unwrap(),
            DrawParams {
                raffle_type: RaffleType::New,
                num_winners: 3,
                selection_type: SelectionType::Unweighted,
            }
        );
        assert!(matches!(
            DrawParams::parse(Some("everyone"), None, None),
            Err(Error::UnknownRaffleType(_))
        ));
        assert!(matches!(
            DrawParams::parse(None, None, Some("fair")),
            Err(Error::UnknownSelectionType(_))
        ));
        for n in [0, -1] {
            assert!(matches!(
                DrawParams::parse(None, Some(n), None),
                Err(Error::Selection(selection::Error::InvalidWinnerCount))
            ));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DrawConfig {
            ticket_ratio: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            Raffler::new(MemoryHistory::new(), StaticEntrants::new(), config),
            Err(Error::Config(config::Error::InvalidTicketRatio(_)))
        ));
    }
}
