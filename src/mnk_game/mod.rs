/*
 *  The core of a server for generalized m,n,k,p,q board games.
 */

pub mod board;
pub mod consts;
pub mod coords;
pub mod errors;
pub mod game;
pub mod player;
pub mod rules;

pub mod prelude {
    pub use super::{
        board::Board,
        consts::*,
        coords::{Axis, Coord},
        errors::*,
        game::{AbortOutcome, Game, GameId, GameState, LeaveOutcome, MoveOutcome},
        player::{Identity, Player, PlayerId},
        rules::{RuleSet, RuleSetId},
    };
}
