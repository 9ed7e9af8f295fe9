/// Positions and directions shared by the player and ghosts.
/// Coordinates are signed so out-of-bounds neighbours can be queried
/// without bounds branches (the grid answers `Wall` for them).

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Position { x: self.x + dx, y: self.y + dy }
    }
}

/// Horizontal facing of the player sprite.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// A single directional input.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
}

impl MoveDir {
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDir::Left => (-1, 0),
            MoveDir::Right => (1, 0),
            MoveDir::Up => (0, -1),
            MoveDir::Down => (0, 1),
        }
    }
}

/// Ghost facing. Discriminants are the 2-bit value stored in the flag grid;
/// incrementing rotates clockwise (screen y grows downward).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GhostDir {
    Right = 0,
    Down = 1,
    Left = 2,
    Up = 3,
}

impl GhostDir {
    pub const ALL: [GhostDir; 4] = [GhostDir::Right, GhostDir::Down, GhostDir::Left, GhostDir::Up];

    pub fn from_index(i: u8) -> GhostDir {
        GhostDir::ALL[(i & 3) as usize]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Rotate clockwise by `steps` quarter turns.
    pub fn rotate(self, steps: u8) -> GhostDir {
        GhostDir::from_index(self.index().wrapping_add(steps))
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            GhostDir::Right => (1, 0),
            GhostDir::Down => (0, 1),
            GhostDir::Left => (-1, 0),
            GhostDir::Up => (0, -1),
        }
    }
}
