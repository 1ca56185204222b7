use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::mnk_game::prelude::*;

/// Monotonic per-entity version tag for optimistic concurrency.
pub type Version = u64;

struct Row<T> {
    value: T,
    version: Version,
}

/// The storage collaborator: durable entities behind per-entity optimistic
/// concurrency. Every command runs read → validate → write; a write
/// against a stale version fails with `ConcurrentUpdate` and the whole
/// command is safe to retry.
///
/// This realisation is in-memory; the facade only ever touches it through
/// working copies, so a durable backend can be swapped in behind the same
/// surface.
pub struct Store {
    games: Mutex<HashMap<GameId, Row<Game>>>,
    players: Mutex<HashMap<PlayerId, Row<Player>>>,
    rule_sets: Mutex<HashMap<RuleSetId, Row<RuleSet>>>,
    next_id: AtomicU64,
}

fn fetch<T: Clone>(map: &Mutex<HashMap<u64, Row<T>>>, id: u64, what: &str) -> Result<(T, Version)> {
    let guard = map.lock().unwrap();
    let row = guard
        .get(&id)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown {what} id {id}")))?;
    Ok((row.value.clone(), row.version))
}

fn stash<T>(
    map: &Mutex<HashMap<u64, Row<T>>>, id: u64, value: T, expect: Version, what: &str,
) -> Result<Version> {
    let mut guard = map.lock().unwrap();
    let row = guard
        .get_mut(&id)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown {what} id {id}")))?;
    if row.version != expect {
        return Err(Error::ConcurrentUpdate);
    }
    row.value = value;
    row.version += 1;
    Ok(row.version)
}

impl Store {
    /// Builds an empty store with the canonical rule sets installed.
    pub fn new() -> Store {
        let store = Store {
            games: Mutex::new(HashMap::new()),
            players: Mutex::new(HashMap::new()),
            rule_sets: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        };
        for rules in RuleSet::defaults() {
            store.insert_rule_set(rules);
        }
        store
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // games

    pub fn insert_game(&self, mut game: Game) -> (GameId, Version) {
        game.flush();
        let id = self.allocate_id();
        self.games.lock().unwrap().insert(id, Row { value: game, version: 1 });
        (id, 1)
    }

    pub fn game(&self, id: GameId) -> Result<(Game, Version)> {
        fetch(&self.games, id, "game")
    }

    /// Writes a game back. The unpacked board cache is dropped here; only
    /// the packed form persists.
    pub fn put_game(&self, id: GameId, mut game: Game, expect: Version) -> Result<Version> {
        game.flush();
        stash(&self.games, id, game, expect, "game")
    }

    pub fn delete_game(&self, id: GameId) {
        self.games.lock().unwrap().remove(&id);
    }

    /// Clones out every game for listing, sweeping and propagation.
    pub fn games_snapshot(&self) -> Vec<(GameId, Game, Version)> {
        self.games
            .lock()
            .unwrap()
            .iter()
            .map(|(&id, row)| (id, row.value.clone(), row.version))
            .collect()
    }

    // players

    pub fn insert_player(&self, player: Player) -> (PlayerId, Version) {
        let id = self.allocate_id();
        self.players.lock().unwrap().insert(id, Row { value: player, version: 1 });
        (id, 1)
    }

    pub fn player(&self, id: PlayerId) -> Result<(Player, Version)> {
        fetch(&self.players, id, "player")
    }

    pub fn put_player(&self, id: PlayerId, player: Player, expect: Version) -> Result<Version> {
        stash(&self.players, id, player, expect, "player")
    }

    /// The first player matching the predicate, if any.
    pub fn find_player(
        &self, pred: impl Fn(PlayerId, &Player) -> bool,
    ) -> Option<(PlayerId, Player, Version)> {
        let guard = self.players.lock().unwrap();
        for (&id, row) in guard.iter() {
            if pred(id, &row.value) {
                return Some((id, row.value.clone(), row.version));
            }
        }
        None
    }

    // rule sets

    pub fn insert_rule_set(&self, rules: RuleSet) -> (RuleSetId, Version) {
        let id = self.allocate_id();
        self.rule_sets.lock().unwrap().insert(id, Row { value: rules, version: 1 });
        (id, 1)
    }

    pub fn rule_set(&self, id: RuleSetId) -> Result<(RuleSet, Version)> {
        fetch(&self.rule_sets, id, "rule set")
    }

    pub fn put_rule_set(&self, id: RuleSetId, rules: RuleSet, expect: Version) -> Result<Version> {
        stash(&self.rule_sets, id, rules, expect, "rule set")
    }

    /// Every rule set, ordered by name for listings.
    pub fn rule_sets_snapshot(&self) -> Vec<(RuleSetId, RuleSet)> {
        let mut sets: Vec<(RuleSetId, RuleSet)> = self
            .rule_sets
            .lock()
            .unwrap()
            .iter()
            .map(|(&id, row)| (id, row.value.clone()))
            .collect();
        sets.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_the_canonical_rule_sets() {
        let store = Store::new();
        let names: Vec<String> =
            store.rule_sets_snapshot().into_iter().map(|(_, r)| r.name).collect();
        assert_eq!(
            names,
            vec!["Connect6", "Four player gomoku", "Free-style gomoku", "Tic-tac-toe"]
        );
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let store = Store::new();
        assert!(matches!(store.game(999), Err(Error::InvalidArgument(_))));
        assert!(matches!(store.player(999), Err(Error::InvalidArgument(_))));
        assert!(matches!(store.rule_set(999), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn stale_writes_conflict() {
        let store = Store::new();
        let (id, _) = store.insert_player(Player::new(Identity::anonymous(), "Anonymous"));

        let (mut first, version) = store.player(id).unwrap();
        let (mut second, stale) = store.player(id).unwrap();
        assert_eq!(version, stale);

        first.wins += 1;
        let bumped = store.put_player(id, first, version).unwrap();
        assert_eq!(bumped, version + 1);

        second.losses += 1;
        assert!(matches!(
            store.put_player(id, second, stale),
            Err(Error::ConcurrentUpdate)
        ));

        // A re-read sees the surviving write and can retry cleanly.
        let (current, version) = store.player(id).unwrap();
        assert_eq!(current.wins, 1);
        assert_eq!(current.losses, 0);
        assert_eq!(version, bumped);
    }

    #[test]
    fn find_player_matches_on_identity() {
        let store = Store::new();
        store.insert_player(Player::new(Identity::cpu(), "CPU"));
        let (id, _) = store.insert_player(Player::new(Identity::new("alice@example.com"), "alice"));

        let (found, player, _) =
            store.find_player(|_, p| p.user == Identity::new("alice@example.com")).unwrap();
        assert_eq!(found, id);
        assert_eq!(player.nickname, "alice");
        assert!(store.find_player(|_, p| p.nickname == "nobody").is_none());
    }
}
