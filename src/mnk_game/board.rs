use crate::mnk_game::prelude::*;

/// An m-by-n grid of stones, stored as a flat byte buffer indexed
/// `y * m + x`. A cell holds 0 when empty, or the 1-based seat index of
/// the player occupying it.
///
/// The packed wire form is a sequence of `m` strings of length `n`: string
/// `x`, character `y` is the decimal digit for the cell at `(x, y)`. The
/// packed form is the storage source of truth; this unpacked form is a
/// per-command cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<u8>,
}

impl Board {
    /// Returns a new, empty board of the given dimensions.
    pub fn new(width: u32, height: u32) -> Board {
        Board {
            width: width as i32,
            height: height as i32,
            cells: vec![0; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Determines whether or not the coord is on the board.
    pub fn in_bounds(&self, at: Coord) -> bool {
        at.x >= 0 && at.x < self.width && at.y >= 0 && at.y < self.height
    }

    /// The seat occupying `at`, or 0 for an empty cell. Off-board coords
    /// read as empty, which lets scans walk past the edge without a
    /// separate bounds check.
    pub fn stone(&self, at: Coord) -> u8 {
        if self.in_bounds(at) {
            self.cells[(at.y * self.width + at.x) as usize]
        } else {
            0
        }
    }

    /// Places a stone for `seat` at `at`. The caller has already validated
    /// bounds and emptiness through the move protocol.
    pub fn set(&mut self, at: Coord, seat: u8) {
        let index = (at.y * self.width + at.x) as usize;
        self.cells[index] = seat;
    }

    /// Counts the stones on the board.
    pub fn stones(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// Determines whether every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != 0)
    }

    /// Iterates the empty cells in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len())
            .filter(|&i| self.cells[i] == 0)
            .map(|i| Coord::new(i as i32 % self.width, i as i32 / self.width))
    }

    /// The centre cell, rounded down on even dimensions.
    pub fn center(&self) -> Coord {
        Coord::new(self.width / 2, self.height / 2)
    }

    /// Packs the board into its wire form: one digit string per column.
    pub fn pack(&self) -> Vec<String> {
        (0..self.width)
            .map(|x| {
                (0..self.height)
                    .map(|y| char::from_digit(self.stone(Coord::new(x, y)) as u32, 10).unwrap())
                    .collect()
            })
            .collect()
    }

    /// Unpacks the wire form into a board, validating shape and contents.
    pub fn unpack(data: &[String], width: u32, height: u32) -> Result<Board> {
        if data.len() != width as usize {
            return Err(Error::InvalidArgument(format!(
                "packed board has {} columns, expected {width}",
                data.len()
            )));
        }

        let mut board = Board::new(width, height);
        for (x, column) in data.iter().enumerate() {
            if column.chars().count() != height as usize {
                return Err(Error::InvalidArgument(format!(
                    "packed column {x} has length {}, expected {height}",
                    column.chars().count()
                )));
            }
            for (y, ch) in column.chars().enumerate() {
                let seat = ch.to_digit(10).ok_or_else(|| {
                    Error::InvalidArgument(format!("packed cell ({x},{y}) is not a digit"))
                })?;
                board.set(Coord::new(x as i32, y as i32), seat as u8);
            }
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_board_is_empty() {
        let board = Board::new(3, 4);
        assert_eq!(board.stones(), 0);
        assert!(!board.is_full());
        assert_eq!(board.pack(), vec!["0000", "0000", "0000"]);
    }

    #[test]
    fn pack_unpack_round_trip() {
        let mut board = Board::new(3, 3);
        board.set(Coord::new(0, 0), 1);
        board.set(Coord::new(1, 0), 2);
        board.set(Coord::new(1, 1), 1);
        board.set(Coord::new(2, 2), 1);
        board.set(Coord::new(2, 0), 2);

        let packed = board.pack();
        assert_eq!(packed, vec!["100", "210", "201"]);

        let recovered = Board::unpack(&packed, 3, 3).unwrap();
        assert_eq!(recovered, board);
        assert_eq!(recovered.pack(), packed);
    }

    #[test]
    fn unpack_rejects_bad_shapes() {
        let short = vec!["000".to_owned()];
        assert!(Board::unpack(&short, 3, 3).is_err());

        let ragged = vec!["000".to_owned(), "00".to_owned(), "000".to_owned()];
        assert!(Board::unpack(&ragged, 3, 3).is_err());

        let junk = vec!["000".to_owned(), "0x0".to_owned(), "000".to_owned()];
        assert!(Board::unpack(&junk, 3, 3).is_err());
    }

    #[test]
    fn off_board_reads_empty() {
        let mut board = Board::new(2, 2);
        board.set(Coord::new(0, 0), 1);
        assert_eq!(board.stone(Coord::new(-1, 0)), 0);
        assert_eq!(board.stone(Coord::new(0, 2)), 0);
        assert_eq!(board.stone(Coord::new(0, 0)), 1);
    }

    #[test]
    fn centre_of_odd_and_even_boards() {
        assert_eq!(Board::new(5, 5).center(), Coord::new(2, 2));
        assert_eq!(Board::new(4, 6).center(), Coord::new(2, 3));
    }
}
