mod scan;

use itertools::Itertools;
use rand::Rng;

use crate::mnk_game::prelude::*;
use scan::Scan;

/// The heuristic computer opponent: a stateless one-ply threat analyser.
///
/// How the CPU player thinks (first possibility wins):
/// 1. If it can complete a winning run this turn, it does.
/// 2. If an opponent has a run that could win within their next turn, it
///    blocks the highest-valued such point.
/// 3. Otherwise it plays the highest-valued expand point on the board.
/// 4. Failing everything, it plays the free cell nearest the centre.
pub struct Strategist {
    cleverness: f64,
}

impl Strategist {
    /// Produces a strategist. `cleverness` controls how coarsely scores
    /// are bucketed before the random tie-break; higher is stricter.
    pub fn new(cleverness: f64) -> Strategist {
        Strategist { cleverness }
    }

    /// Chooses exactly one legal move for `seat` on the given board. The
    /// caller submits it through the ordinary move arbitration path.
    pub fn choose(
        &self, board: &Board, seat: u8, rules: &RuleSet, turn: i32, rng: &mut impl Rng,
    ) -> Result<Coord> {
        if seat == 0 || seat > rules.num_players {
            return Err(CpuError::NoSeat.into());
        }

        let mut scan = Scan::new(board, seat, rules, turn);
        scan.run();

        if let Some(at) = scan.forced {
            return Ok(at);
        }

        // Merge candidates found at the same coordinate on different axes;
        // an intersection of threats is worth more than either threat alone.
        let mut merged: Vec<(f64, Coord)> = vec![];
        for (score, at) in scan.moves {
            match merged.iter_mut().find(|(_, c)| *c == at) {
                Some(entry) => {
                    let (lo, hi) =
                        if entry.0 < score { (entry.0, score) } else { (score, entry.0) };
                    entry.0 = hi + lo / 2.0;
                }
                None => merged.push((score, at)),
            }
        }

        let ordered: Vec<Coord> = merged
            .into_iter()
            .map(|(score, at)| ((score * self.cleverness) as i64, rng.r#gen::<u32>(), at))
            .sorted_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
            .map(|(_, _, at)| at)
            .collect();

        // Blocks are resolved only now, against the merged ordering, so the
        // best block wins and a winning own move was never passed over.
        if !scan.force.is_empty() {
            if let Some(&at) = ordered.iter().find(|at| scan.force.contains(*at)) {
                return Ok(at);
            }
        }

        if let Some(&at) = ordered.first() {
            return Ok(at);
        }

        // Nothing threatens anything yet: take the centremost free cell.
        let center = board.center();
        board
            .empty_cells()
            .min_by_key(|at| at.squared_distance(&center))
            .ok_or(Error::Cpu(CpuError::NoMove))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn rules_5x5_k4() -> RuleSet {
        RuleSet::new("Mini gomoku", 5, 5, 4, 1, 1, 2).unwrap()
    }

    fn board_with(stones: &[(i32, i32, u8)]) -> Board {
        let mut board = Board::new(5, 5);
        for &(x, y, seat) in stones {
            board.set(Coord::new(x, y), seat);
        }
        board
    }

    fn choose(board: &Board, seat: u8, rules: &RuleSet, turn: i32) -> Coord {
        let strategist = Strategist::new(DEFAULT_CLEVERNESS);
        let mut rng = StdRng::seed_from_u64(42);
        strategist.choose(board, seat, rules, turn, &mut rng).unwrap()
    }

    #[test]
    fn takes_the_winning_extension() {
        let rules = rules_5x5_k4();
        let board = board_with(&[(0, 0, 1), (1, 0, 1), (2, 0, 1)]);
        assert_eq!(choose(&board, 1, &rules, 6), Coord::new(3, 0));
    }

    #[test]
    fn completes_a_gapped_run() {
        let rules = rules_5x5_k4();
        let board = board_with(&[(0, 0, 1), (1, 0, 1), (3, 0, 1)]);
        assert_eq!(choose(&board, 1, &rules, 6), Coord::new(2, 0));
    }

    #[test]
    fn blocks_an_imminent_loss() {
        let rules = rules_5x5_k4();
        let board = board_with(&[(1, 1, 2), (2, 1, 2), (3, 1, 2)]);
        let at = choose(&board, 1, &rules, 6);
        assert!(
            at == Coord::new(0, 1) || at == Coord::new(4, 1),
            "expected a block, got ({}, {})",
            at.x,
            at.y
        );
    }

    #[test]
    fn never_lets_a_blockable_win_stand() {
        let rules = rules_5x5_k4();

        // A spread of positions with exactly one open three each; the CPU
        // has stones of its own to be tempted by.
        let threats: [(&[(i32, i32, u8)], [Coord; 2]); 3] = [
            (
                &[(1, 2, 2), (2, 2, 2), (3, 2, 2), (0, 0, 1), (4, 4, 1)],
                [Coord::new(0, 2), Coord::new(4, 2)],
            ),
            (
                &[(2, 1, 2), (2, 2, 2), (2, 3, 2), (0, 1, 1), (1, 0, 1)],
                [Coord::new(2, 0), Coord::new(2, 4)],
            ),
            (
                &[(1, 1, 2), (2, 2, 2), (3, 3, 2), (4, 0, 1), (0, 4, 1)],
                [Coord::new(0, 0), Coord::new(4, 4)],
            ),
        ];
        for (seed, (stones, blocks)) in threats.into_iter().enumerate() {
            let board = board_with(stones);
            let strategist = Strategist::new(DEFAULT_CLEVERNESS);
            let mut rng = StdRng::seed_from_u64(seed as u64);
            let at = strategist.choose(&board, 1, &rules, 10, &mut rng).unwrap();
            assert!(blocks.contains(&at), "expected a block, got ({}, {})", at.x, at.y);
        }
    }

    #[test]
    fn prefers_its_own_win_over_a_block() {
        let rules = rules_5x5_k4();

        // CPU row above, opponent row below; either scan order must end in
        // the CPU completing its own run.
        let board = board_with(&[
            (0, 0, 2), (1, 0, 2), (2, 0, 2),
            (0, 2, 1), (1, 2, 1), (2, 2, 1),
        ]);
        assert_eq!(choose(&board, 1, &rules, 6), Coord::new(3, 2));

        let flipped = board_with(&[
            (0, 0, 1), (1, 0, 1), (2, 0, 1),
            (0, 2, 2), (1, 2, 2), (2, 2, 2),
        ]);
        assert_eq!(choose(&flipped, 1, &rules, 6), Coord::new(3, 0));
    }

    #[test]
    fn multi_stone_turns_extend_the_forced_window() {
        // Connect-style rules: two stones per turn let the CPU treat a
        // two-gap run as already winnable.
        let rules = RuleSet::new("Mini connect", 5, 5, 4, 2, 1, 2).unwrap();
        let board = board_with(&[(1, 1, 1), (2, 1, 1)]);

        // Turn 1 leaves the CPU a full two-stone budget.
        assert_eq!(rules.turns_left(1), 2);
        let at = choose(&board, 1, &rules, 1);
        assert!(
            at == Coord::new(3, 1) || at == Coord::new(0, 1),
            "expected a forced extension, got ({}, {})",
            at.x,
            at.y
        );
    }

    #[test]
    fn falls_back_to_the_centre() {
        let rules = rules_5x5_k4();
        let board = Board::new(5, 5);
        assert_eq!(choose(&board, 1, &rules, 0), Coord::new(2, 2));
    }

    #[test]
    fn rejects_a_seatless_invocation() {
        let rules = rules_5x5_k4();
        let board = Board::new(5, 5);
        let strategist = Strategist::new(DEFAULT_CLEVERNESS);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            strategist.choose(&board, 0, &rules, 0, &mut rng),
            Err(Error::Cpu(CpuError::NoSeat))
        ));
        assert!(matches!(
            strategist.choose(&board, 3, &rules, 0, &mut rng),
            Err(Error::Cpu(CpuError::NoSeat))
        ));
    }
}
