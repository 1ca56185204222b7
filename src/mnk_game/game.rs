use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::mnk_game::prelude::*;

pub type GameId = u64;

/// Lifecycle state of a game. A game leaves `Playing` exactly once, into
/// one of the three terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Playing,
    Aborted,
    Draw,
    Win,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::Aborted | GameState::Draw | GameState::Win)
    }
}

/// What a committed move did to the game. The facade applies the rating
/// and `num_games` effects for the terminal outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Placed,
    Won,
    Drawn,
}

/// What removing a player did to the game. `Deleted` asks the storage
/// layer to drop the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    Deleted,
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortOutcome {
    Deleted,
    Aborted,
}

/// The central entity: an m,n,k,p,q-game moving through its lifecycle.
///
/// `players` holds storage keys in seat order (1-based seats) with
/// `player_names` as a parallel nickname cache. `data` is the packed
/// board and the storage source of truth; the unpacked board is cached
/// here for the life of a command and re-packed on every commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub state: GameState,
    pub players: Vec<PlayerId>,
    pub player_names: Vec<String>,
    pub current_player: u8,
    pub turn: i32,
    pub data: Vec<String>,
    pub rule_set: RuleSetId,
    pub added: DateTime<Utc>,
    pub last_update: DateTime<Utc>,

    #[serde(skip)]
    board: Option<Board>,
}

impl Game {
    /// Returns a new game waiting for players, with an all-empty board of
    /// the rule set's dimensions.
    pub fn new(rule_set: RuleSetId, rules: &RuleSet, now: DateTime<Utc>) -> Game {
        Game {
            state: GameState::Waiting,
            players: vec![],
            player_names: vec![],
            current_player: 0,
            turn: -1,
            data: Board::new(rules.m, rules.n).pack(),
            rule_set,
            added: now,
            last_update: now,
            board: None,
        }
    }

    /// The 1-based seat of a player, if seated.
    pub fn seat_of(&self, player: PlayerId) -> Option<u8> {
        self.players.iter().position(|&p| p == player).map(|i| (i + 1) as u8)
    }

    /// Adds a player to the game, and starts the game once it has enough
    /// players. Seat order is randomly permuted on the full-seating
    /// transition, so join order carries no advantage.
    pub fn add_player(
        &mut self, id: PlayerId, nickname: &str, rules: &RuleSet, rng: &mut impl Rng,
    ) -> Result<()> {
        if self.players.contains(&id) {
            return Err(JoinError::AlreadySeated.into());
        }
        if self.players.len() >= rules.num_players as usize {
            return Err(JoinError::GameFull.into());
        }
        if self.state != GameState::Waiting {
            return Err(JoinError::NotAccepting.into());
        }

        self.players.push(id);
        self.player_names.push(nickname.to_owned());

        if self.players.len() == rules.num_players as usize {
            let mut order: Vec<usize> = (0..self.players.len()).collect();
            order.shuffle(rng);
            let players = std::mem::take(&mut self.players);
            let names = std::mem::take(&mut self.player_names);
            self.players = order.iter().map(|&i| players[i]).collect();
            self.player_names = order.iter().map(|&i| names[i].clone()).collect();

            self.state = GameState::Playing;
            self.turn = 0;
            self.current_player = 1;
        }
        Ok(())
    }

    /// Removes a player. While waiting this shrinks the roster, deleting
    /// the game once no human players remain; while playing it aborts the
    /// game instead, since a started game cannot lose a seat.
    pub fn remove_player(
        &mut self, leaver: PlayerId, is_cpu: impl Fn(PlayerId) -> bool,
    ) -> Result<LeaveOutcome> {
        let seat = self.seat_of(leaver).ok_or(LeaveError::NotSeated)?;
        match self.state {
            | GameState::Waiting => {
                self.players.remove(seat as usize - 1);
                self.player_names.remove(seat as usize - 1);

                let humans = self.players.iter().filter(|&&p| !is_cpu(p)).count();
                if humans > 0 {
                    Ok(LeaveOutcome::Left)
                } else {
                    Ok(LeaveOutcome::Deleted)
                }
            }
            | GameState::Playing => {
                self.abort()?;
                Ok(LeaveOutcome::Aborted)
            }
            | _ => Err(LeaveError::Completed.into()),
        }
    }

    /// Aborts a game in play, or requests deletion of one still waiting.
    pub fn abort(&mut self) -> Result<AbortOutcome> {
        match self.state {
            | GameState::Waiting => Ok(AbortOutcome::Deleted),
            | GameState::Playing => {
                self.state = GameState::Aborted;
                self.turn = -1;
                Ok(AbortOutcome::Aborted)
            }
            | _ => Err(AbortError::Completed.into()),
        }
    }

    /// Places a stone at `at` for `player`, enforcing the whole move
    /// protocol: seating, lifecycle, turn order and position validity.
    /// The packed form is refreshed before returning, so the entity is
    /// always fit to persist.
    pub fn play(&mut self, player: PlayerId, at: Coord, rules: &RuleSet) -> Result<MoveOutcome> {
        let seat = self.seat_of(player).ok_or(MoveError::NotInGame)?;
        if self.state != GameState::Playing {
            return Err(MoveError::NotPlaying.into());
        }
        if seat != self.current_player {
            return Err(MoveError::NotYourTurn.into());
        }

        self.ensure_board(rules)?;
        {
            let board = self.board.as_mut().unwrap();
            if !board.in_bounds(at) || board.stone(at) != 0 {
                return Err(MoveError::InvalidPosition.into());
            }
            board.set(at, seat);
        }
        self.turn += 1;

        let won = rules.is_win(self.board.as_ref().unwrap(), seat, at)?;
        let outcome = if won {
            self.state = GameState::Win;
            MoveOutcome::Won
        } else if self.board.as_ref().unwrap().is_full() {
            self.state = GameState::Draw;
            MoveOutcome::Drawn
        } else {
            self.current_player = rules.whose_turn(self.turn);
            MoveOutcome::Placed
        };

        self.pack_board();
        Ok(outcome)
    }

    /// Retrieves the unpacked board, filling the per-command cache from
    /// the packed form if needed.
    pub fn board(&mut self, rules: &RuleSet) -> Result<&Board> {
        self.ensure_board(rules)?;
        Ok(self.board.as_ref().unwrap())
    }

    /// Re-packs the cached board and drops the cache. The store calls this
    /// on every write; the packed form is the source of truth.
    pub fn flush(&mut self) {
        self.pack_board();
        self.board = None;
    }

    /// Rewrites the cached nickname for a seated player.
    pub fn update_player_name(&mut self, player: PlayerId, nickname: &str) {
        if let Some(seat) = self.seat_of(player) {
            self.player_names[seat as usize - 1] = nickname.to_owned();
        }
    }

    /// Stamps the entity as just modified.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
    }

    /// Determines whether the inactivity sweep should abort this game.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let age = now - self.last_update;
        match self.state {
            | GameState::Waiting => age > Duration::hours(WAITING_TIMEOUT_HOURS),
            | GameState::Playing => age > Duration::hours(PLAYING_TIMEOUT_HOURS),
            | _ => false,
        }
    }

    fn ensure_board(&mut self, rules: &RuleSet) -> Result<()> {
        if self.board.is_none() {
            self.board = Some(Board::unpack(&self.data, rules.m, rules.n)?);
        }
        Ok(())
    }

    fn pack_board(&mut self) {
        if let Some(board) = &self.board {
            self.data = board.pack();
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const ALICE: PlayerId = 11;
    const BOB: PlayerId = 22;

    fn tic_tac_toe() -> RuleSet {
        RuleSet::new("Tic-tac-toe", 3, 3, 3, 1, 1, 2).unwrap()
    }

    fn started_game(rules: &RuleSet) -> Game {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let mut game = Game::new(1, rules, now);
        game.add_player(ALICE, "Alice", rules, &mut rng).unwrap();
        game.add_player(BOB, "Bob", rules, &mut rng).unwrap();
        assert_eq!(game.state, GameState::Playing);
        game
    }

    /// The player seated at the given 1-based seat.
    fn holder(game: &Game, seat: u8) -> PlayerId {
        game.players[seat as usize - 1]
    }

    #[test]
    fn seating_starts_the_game() {
        let rules = tic_tac_toe();
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = Game::new(1, &rules, Utc::now());

        assert_eq!(game.state, GameState::Waiting);
        assert_eq!(game.turn, -1);

        game.add_player(ALICE, "Alice", &rules, &mut rng).unwrap();
        assert_eq!(game.state, GameState::Waiting);
        assert!(matches!(
            game.add_player(ALICE, "Alice", &rules, &mut rng),
            Err(Error::Join(JoinError::AlreadySeated))
        ));

        game.add_player(BOB, "Bob", &rules, &mut rng).unwrap();
        assert_eq!(game.state, GameState::Playing);
        assert_eq!(game.turn, 0);
        assert_eq!(game.current_player, 1);

        // Seat order and the nickname cache stay in lockstep through the
        // shuffle.
        for seat in 1..=2 {
            let expected = if holder(&game, seat) == ALICE { "Alice" } else { "Bob" };
            assert_eq!(game.player_names[seat as usize - 1], expected);
        }

        assert!(matches!(
            game.add_player(33, "Carol", &rules, &mut rng),
            Err(Error::Join(JoinError::GameFull))
        ));
    }

    #[test]
    fn tic_tac_toe_win() {
        let rules = tic_tac_toe();
        let mut game = started_game(&rules);
        let [first, second] = [holder(&game, 1), holder(&game, 2)];

        let script = [
            (1, 0, 0, MoveOutcome::Placed),
            (2, 1, 0, MoveOutcome::Placed),
            (1, 1, 1, MoveOutcome::Placed),
            (2, 2, 0, MoveOutcome::Placed),
            (1, 2, 2, MoveOutcome::Won),
        ];
        for (seat, x, y, expected) in script {
            let mover = if seat == 1 { first } else { second };
            let outcome = game.play(mover, Coord::new(x, y), &rules).unwrap();
            assert_eq!(outcome, expected);

            // Stone count always equals the turn counter.
            let stones = game.board(&rules).unwrap().stones();
            assert_eq!(stones as i32, game.turn);
        }

        assert_eq!(game.state, GameState::Win);
        assert_eq!(game.turn, 5);
        assert_eq!(game.data, vec!["100", "210", "201"]);

        // Terminal games accept no further mutation.
        assert!(matches!(
            game.play(second, Coord::new(0, 1), &rules),
            Err(Error::Move(MoveError::NotPlaying))
        ));
        assert!(matches!(game.abort(), Err(Error::Abort(AbortError::Completed))));
        assert!(matches!(
            game.remove_player(first, |_| false),
            Err(Error::Leave(LeaveError::Completed))
        ));
    }

    #[test]
    fn full_board_draws() {
        let rules = tic_tac_toe();
        let mut game = started_game(&rules);
        let [first, second] = [holder(&game, 1), holder(&game, 2)];

        let script = [
            (1, 0, 0), (2, 1, 0), (1, 1, 1), (2, 2, 1), (1, 2, 0),
            (2, 0, 2), (1, 0, 1), (2, 2, 2), (1, 1, 2),
        ];
        for (i, (seat, x, y)) in script.iter().enumerate() {
            let mover = if *seat == 1 { first } else { second };
            let outcome = game.play(mover, Coord::new(*x, *y), &rules).unwrap();
            let expected = if i == script.len() - 1 { MoveOutcome::Drawn } else { MoveOutcome::Placed };
            assert_eq!(outcome, expected, "unexpected outcome at move {i}");
        }

        assert_eq!(game.state, GameState::Draw);
        assert_eq!(game.turn, 9);
    }

    #[test]
    fn move_arbitration_guards() {
        let rules = tic_tac_toe();
        let mut game = started_game(&rules);
        let [first, second] = [holder(&game, 1), holder(&game, 2)];

        assert!(matches!(
            game.play(99, Coord::new(0, 0), &rules),
            Err(Error::Move(MoveError::NotInGame))
        ));
        assert!(matches!(
            game.play(second, Coord::new(0, 0), &rules),
            Err(Error::Move(MoveError::NotYourTurn))
        ));

        game.play(first, Coord::new(0, 0), &rules).unwrap();

        // The same player immediately moving again is out of turn.
        assert!(matches!(
            game.play(first, Coord::new(0, 1), &rules),
            Err(Error::Move(MoveError::NotYourTurn))
        ));

        // Out of range and occupied positions are both invalid.
        assert!(matches!(
            game.play(second, Coord::new(3, 0), &rules),
            Err(Error::Move(MoveError::InvalidPosition))
        ));
        assert!(matches!(
            game.play(second, Coord::new(0, 0), &rules),
            Err(Error::Move(MoveError::InvalidPosition))
        ));
    }

    #[test]
    fn leaving_a_waiting_game() {
        let rules = tic_tac_toe();
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = Game::new(1, &rules, Utc::now());

        const CPU: PlayerId = 77;
        game.add_player(ALICE, "Alice", &rules, &mut rng).unwrap();

        assert!(matches!(
            game.remove_player(BOB, |_| false),
            Err(Error::Leave(LeaveError::NotSeated))
        ));

        // A lone human leaving deletes the game outright.
        let mut alone = game.clone();
        assert_eq!(alone.remove_player(ALICE, |_| false).unwrap(), LeaveOutcome::Deleted);

        // With only a CPU left behind, the game is deleted too.
        let three = RuleSet::new("Trio", 3, 3, 3, 1, 1, 3).unwrap();
        let mut crowded = Game::new(2, &three, Utc::now());
        crowded.add_player(ALICE, "Alice", &three, &mut rng).unwrap();
        crowded.add_player(CPU, "CPU", &three, &mut rng).unwrap();
        assert_eq!(
            crowded.remove_player(ALICE, |id| id == CPU).unwrap(),
            LeaveOutcome::Deleted
        );
    }

    #[test]
    fn leaving_a_playing_game_aborts_it() {
        let rules = tic_tac_toe();
        let mut game = started_game(&rules);
        let first = holder(&game, 1);

        game.play(first, Coord::new(0, 0), &rules).unwrap();
        assert_eq!(game.remove_player(first, |_| false).unwrap(), LeaveOutcome::Aborted);
        assert_eq!(game.state, GameState::Aborted);
        assert_eq!(game.turn, -1);

        assert!(matches!(
            game.play(first, Coord::new(1, 1), &rules),
            Err(Error::Move(MoveError::NotPlaying))
        ));
    }

    #[test]
    fn staleness_windows() {
        let rules = tic_tac_toe();
        let now = Utc::now();
        let mut game = Game::new(1, &rules, now);

        assert!(!game.is_stale(now + Duration::hours(5)));
        assert!(game.is_stale(now + Duration::hours(7)));

        let mut playing = started_game(&rules);
        playing.touch(now);
        assert!(!playing.is_stale(now + Duration::hours(47)));
        assert!(playing.is_stale(now + Duration::hours(49)));

        // Terminal games are never swept.
        game.state = GameState::Aborted;
        assert!(!game.is_stale(now + Duration::hours(1000)));
    }
}
