/// Field kinds and the level-text symbol table.
/// Field semantics are queried via methods so the steppers never
/// match on raw symbols.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
#[repr(u8)]
pub enum Field {
    #[default]
    Empty = 0,
    Wall = 1,
    Sand = 2,
    Stone = 3,
    Gem = 4,
    Exit = 5,
    Ghost = 6,
    /// Only ever written transiently by the gravity sweep.
    Player = 7,
    /// Presentation-only variant for a left-facing player sprite.
    PlayerLeft = 8,
}

impl Field {
    /// Parse a level-text symbol. `P` maps to `Player` here; the level
    /// parser consumes it before it reaches the grid.
    pub fn from_symbol(ch: char) -> Option<Field> {
        match ch {
            ' ' => Some(Field::Empty),
            '#' => Some(Field::Wall),
            '.' => Some(Field::Sand),
            'o' => Some(Field::Stone),
            '$' => Some(Field::Gem),
            'X' => Some(Field::Exit),
            'G' => Some(Field::Ghost),
            'P' => Some(Field::Player),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Field::Empty => ' ',
            Field::Wall => '#',
            Field::Sand => '.',
            Field::Stone => 'o',
            Field::Gem => '$',
            Field::Exit => 'X',
            Field::Ghost => 'G',
            Field::Player | Field::PlayerLeft => 'P',
        }
    }

    /// Objects subject to gravity.
    pub fn is_heavy(self) -> bool {
        matches!(self, Field::Stone | Field::Gem)
    }

    /// Objects a heavy object rolls off instead of resting on.
    pub fn is_rounded(self) -> bool {
        matches!(self, Field::Stone | Field::Gem)
    }

    /// Can the player walk into this cell (possibly collecting it)?
    pub fn is_walkable(self) -> bool {
        matches!(self, Field::Empty | Field::Sand | Field::Gem)
    }
}
