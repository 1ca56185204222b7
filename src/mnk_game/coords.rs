use serde::{Deserialize, Serialize};

/// A board position. Signed so that scans can walk off the edge of the
/// board and treat everything out there as empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    /// Constructs a new coord.
    pub fn new(x: i32, y: i32) -> Coord {
        Coord { x, y }
    }

    /// The coord `steps` cells along `axis` from this one. Negative steps
    /// walk the axis backwards.
    pub fn step(&self, axis: Axis, steps: i32) -> Coord {
        let (dx, dy) = axis.delta();
        Coord { x: self.x + dx * steps, y: self.y + dy * steps }
    }

    /// Gets the squared distance between the two coords.
    pub fn squared_distance(&self, other: &Coord) -> i64 {
        let [dx, dy] = [(self.x - other.x) as i64, (self.y - other.y) as i64];
        dx * dx + dy * dy
    }
}

/// The four alignment axes of an m,n,k-game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
    Diagonal,
    AntiDiagonal,
}

impl Axis {
    /// Gets the axes in scan order.
    pub fn all() -> [Axis; 4] {
        [Axis::Row, Axis::Column, Axis::Diagonal, Axis::AntiDiagonal]
    }

    /// The unit offset that walks the axis forwards.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            | Axis::Row => (1, 0),
            | Axis::Column => (0, 1),
            | Axis::Diagonal => (1, 1),
            | Axis::AntiDiagonal => (-1, 1),
        }
    }
}
