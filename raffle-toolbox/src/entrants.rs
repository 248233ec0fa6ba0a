use itertools::Itertools;
use raffle_history::{GuildId, RaffleId, RoleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

/// A participant of a single draw, with the roles they held when entrants were collected.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entrant {
    pub id: UserId,
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
}

impl Entrant {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles<I: IntoIterator<Item = RoleId>>(id: UserId, roles: I) -> Self {
        Self {
            id,
            roles: roles.into_iter().collect(),
        }
    }
}

/// Users who reacted to a raffle message with the same emoji. Any emoji
/// counts as an entry, so only the users are kept.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    pub users: Vec<Entrant>,
}

/// Where raffle entries come from, usually the reactions on the raffle message.
pub trait EntrantSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reactions currently on the message of `raffle`, or `None` if the
    /// message can no longer be resolved.
    fn reactions_on(
        &self,
        guild: GuildId,
        raffle: RaffleId,
    ) -> Result<Option<Vec<Reaction>>, Self::Error>;
}

impl<T: EntrantSource + ?Sized> EntrantSource for &T {
    type Error = T::Error;

    fn reactions_on(
        &self,
        guild: GuildId,
        raffle: RaffleId,
    ) -> Result<Option<Vec<Reaction>>, Self::Error> {
        (**self).reactions_on(guild, raffle)
    }
}

/// Everyone who reacted at least once, each user listed once no matter how
/// many reactions they left.
pub fn collect_entrants(reactions: Vec<Reaction>) -> Vec<Entrant> {
    reactions
        .into_iter()
        .flat_map(|reaction| reaction.users)
        .unique_by(|entrant| entrant.id)
        .collect()
}

/// Fixed reactions keyed by raffle message, handy when entries were exported
/// from the chat platform beforehand.
#[derive(Clone, Debug, Default)]
pub struct StaticEntrants {
    reactions: HashMap<(GuildId, RaffleId), Vec<Reaction>>,
}

impl StaticEntrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, guild: GuildId, raffle: RaffleId, reactions: Vec<Reaction>) {
        self.reactions.insert((guild, raffle), reactions);
    }
}

impl EntrantSource for StaticEntrants {
    type Error = Infallible;

    fn reactions_on(
        &self,
        guild: GuildId,
        raffle: RaffleId,
    ) -> Result<Option<Vec<Reaction>>, Self::Error> {
        Ok(self.reactions.get(&(guild, raffle)).cloned())
    }
}
