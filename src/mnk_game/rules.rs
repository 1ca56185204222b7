use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mnk_game::prelude::*;

pub type RuleSetId = u64;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w[\w&'\- ]{0,28}[\w'!]$").unwrap());

/// The immutable parameters of an m,n,k,p,q-game, plus a counter of games
/// completed under them.
///
/// An m,n,k-game is an abstract board game in which players take turns
/// placing a stone of their colour on an m-by-n board, the winner being
/// the first to get k stones of their own colour in a row horizontally,
/// vertically, or diagonally. This engine also supports the
/// Connect(m,n,k,p,q) family, where q is the number of stones placed on
/// the very first turn and p the number placed on any subsequent turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub num_players: u8,
    pub num_games: u64,
    pub exact: bool,
    pub m: u32,
    pub n: u32,
    pub k: u32,
    pub p: u32,
    pub q: u32,
}

impl RuleSet {
    /// Builds and validates a rule set.
    pub fn new(
        name: &str, m: u32, n: u32, k: u32, p: u32, q: u32, num_players: u8,
    ) -> Result<RuleSet> {
        let rules = RuleSet {
            name: name.to_owned(),
            num_players,
            num_games: 0,
            exact: false,
            m,
            n,
            k,
            p,
            q,
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Checks every parameter constraint. Exact-k rule sets are rejected
    /// outright; the win detector has no support for them.
    pub fn validate(&self) -> Result<()> {
        if !NAME_PATTERN.is_match(&self.name) {
            return Err(Error::InvalidArgument(format!(
                "invalid rule set name {:?}",
                self.name
            )));
        }
        if self.num_players < 2 || self.num_players > MAX_PLAYERS {
            return Err(Error::InvalidArgument(format!(
                "number of players must be 2-{MAX_PLAYERS}, got {}",
                self.num_players
            )));
        }
        if self.m < 1 || self.n < 1 || self.k < 1 || self.p < 1 || self.q < 1 {
            return Err(Error::InvalidArgument(
                "m, n, k, p and q must all be at least 1".into(),
            ));
        }
        if self.exact {
            return Err(Error::NotSupported(
                "Support for the exact k requirement has not been implemented yet.".into(),
            ));
        }
        Ok(())
    }

    /// The canonical rule sets installed into an empty server.
    pub fn defaults() -> Vec<RuleSet> {
        vec![
            RuleSet::new("Tic-tac-toe", 3, 3, 3, 1, 1, 2).unwrap(),
            RuleSet::new("Free-style gomoku", 19, 19, 5, 1, 1, 2).unwrap(),
            RuleSet::new("Four player gomoku", 19, 19, 5, 1, 1, 4).unwrap(),
            RuleSet::new("Connect6", 19, 19, 6, 2, 1, 2).unwrap(),
        ]
    }

    /// Determines whose turn it is from the zero-based turn counter. Seat 1
    /// plays the first q turns; every later seat gets p consecutive turns,
    /// rotating through seats 2..N and back to 1.
    pub fn whose_turn(&self, turn: i32) -> u8 {
        let [p, q, players] = [self.p as i32, self.q as i32, self.num_players as i32];
        if turn < q {
            1
        } else {
            (((turn - q) / p + 1) % players + 1) as u8
        }
    }

    /// The number of stones left to place before it becomes another
    /// player's turn.
    pub fn turns_left(&self, turn: i32) -> u32 {
        let [p, q] = [self.p as i32, self.q as i32];
        if turn < q {
            (q - turn) as u32
        } else {
            (p - (turn - q) % p) as u32
        }
    }

    /// Tests whether a winning line for `seat` crosses `last` on the
    /// supplied board.
    ///
    /// One counter per axis walks the window of 2k-1 cells centred on the
    /// last stone; a matching cell increments the counter, anything else
    /// (including off-board) resets it. Any counter reaching k is a win.
    pub fn is_win(&self, board: &Board, seat: u8, last: Coord) -> Result<bool> {
        if self.exact {
            return Err(Error::NotSupported(
                "Support for the exact k requirement has not been implemented yet.".into(),
            ));
        }

        let k = self.k as i32;
        let mut counters = [0u32; 4];
        for i in (1 - k)..k {
            for (counter, axis) in counters.iter_mut().zip(Axis::all()) {
                let at = last.step(axis, i);
                *counter = if board.stone(at) == seat { *counter + 1 } else { 0 };
                if *counter >= self.k {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
