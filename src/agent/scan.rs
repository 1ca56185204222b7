use crate::mnk_game::prelude::*;

/// One direction's probe outward from the end of a run: how many free
/// cells before a blocker, how many further same-seat stones reachable
/// through them, and the immediately adjacent empty cell, if any.
#[derive(Clone, Copy, Debug)]
struct Probe {
    live: bool,
    free: i32,
    jumped: i32,
    candidate: Option<Coord>,
}

impl Probe {
    fn new() -> Probe {
        Probe { live: true, free: 0, jumped: 0, candidate: None }
    }
}

/// Scratch state for a single strategist invocation: the board under
/// analysis, whose stones count as "ours", and the collected candidates.
pub(super) struct Scan<'a> {
    board: &'a Board,
    seat: u8,
    win_length: i32,
    per_turn: i32,
    turns_left: i32,

    /// A move that completes a winning run for the CPU; ends the scan.
    pub forced: Option<Coord>,
    /// Moves that block an opponent win; resolved after the whole scan,
    /// so that a winning own move is never passed over for a block.
    pub force: Vec<Coord>,
    /// Scored expand points.
    pub moves: Vec<(f64, Coord)>,
}

impl<'a> Scan<'a> {
    pub fn new(board: &'a Board, seat: u8, rules: &RuleSet, turn: i32) -> Scan<'a> {
        Scan {
            board,
            seat,
            win_length: rules.k as i32,
            per_turn: rules.p as i32,
            turns_left: rules.turns_left(turn) as i32,
            forced: None,
            force: vec![],
            moves: vec![],
        }
    }

    /// Sweeps the four axes. Each sweep threads a (seat, run length) pair
    /// cell by cell one step past the board edge, so trailing runs are
    /// flushed. Diagonals are seeded from the left and right edges by the
    /// row sweep and from the top edge by the column sweep, visiting every
    /// diagonal exactly once.
    pub fn run(&mut self) {
        let [m, n] = [self.board.width(), self.board.height()];
        let ox = m - 1;

        for y in 0..n {
            let mut row = (0u8, 0i32);
            let mut diag = (0u8, 0i32);
            let mut anti = (0u8, 0i32);
            for x in 0..=m {
                row = self.check(row, Coord::new(x, y), Axis::Row);
                if self.forced.is_some() {
                    return;
                }

                // The top-row diagonals belong to the column sweep.
                if y == 0 {
                    continue;
                }
                diag = self.check(diag, Coord::new(x, y + x), Axis::Diagonal);
                anti = self.check(anti, Coord::new(ox - x, y + x), Axis::AntiDiagonal);
                if self.forced.is_some() {
                    return;
                }
            }
        }

        for x in 0..m {
            let mut col = (0u8, 0i32);
            let mut diag = (0u8, 0i32);
            let mut anti = (0u8, 0i32);
            for y in 0..=n {
                col = self.check(col, Coord::new(x, y), Axis::Column);
                diag = self.check(diag, Coord::new(x + y, y), Axis::Diagonal);
                anti = self.check(anti, Coord::new(x - y, y), Axis::AntiDiagonal);
                if self.forced.is_some() {
                    return;
                }
            }
        }
    }

    /// Advances one sweep thread a cell forward. When the cell ends a
    /// monochrome run, both of the run's expand points are evaluated.
    fn check(&mut self, thread: (u8, i32), at: Coord, axis: Axis) -> (u8, i32) {
        let (prev, run) = thread;
        let cur = self.board.stone(at);

        if cur > 0 && cur == prev {
            return (cur, run + 1);
        }

        if prev > 0 {
            let mut after = Probe::new();
            let mut before = Probe::new();

            for o in 0..(self.win_length - run) {
                if after.live {
                    let p = at.step(axis, o);
                    if self.board.in_bounds(p) {
                        match self.board.stone(p) {
                            | 0 => {
                                if o == 0 {
                                    after.candidate = Some(p);
                                }
                                after.free += 1;
                            }
                            | s if s == prev => after.jumped += 1,
                            | _ => after.live = false,
                        }
                    } else {
                        after.live = false;
                    }
                }

                if before.live {
                    let p = at.step(axis, -(1 + run + o));
                    if self.board.in_bounds(p) {
                        match self.board.stone(p) {
                            | 0 => {
                                if o == 0 {
                                    before.candidate = Some(p);
                                }
                                before.free += 1;
                            }
                            | s if s == prev => before.jumped += 1,
                            | _ => before.live = false,
                        }
                    } else {
                        before.live = false;
                    }
                }
            }

            if let Some(c) = after.candidate {
                self.consider(c, prev, run + after.jumped, after.free, before.free);
            }
            if let Some(c) = before.candidate {
                self.consider(c, prev, run + before.jumped, before.free, after.free);
            }
        }

        (cur, 1)
    }

    /// Decides what an expand point is worth. A run the CPU can complete
    /// within its remaining stones this turn is a forced win; a run the
    /// opponent could complete within their next turn must be blocked;
    /// anything that can still grow to the win length gets scored.
    fn consider(&mut self, candidate: Coord, owner: u8, length: i32, avail: i32, other: i32) {
        let cpu = owner == self.seat;

        let budget = if cpu { self.turns_left } else { self.per_turn };
        if length + budget.min(avail) >= self.win_length {
            if cpu {
                if self.forced.is_none() {
                    self.forced = Some(candidate);
                }
                return;
            }
            self.force.push(candidate);
        }

        if length + avail + other >= self.win_length {
            let mut score = length as f64 * 6.0 + avail as f64;
            if cpu {
                score += self.win_length as f64 * 2.0;
            }
            self.moves.push((score, candidate));
        }
    }
}
