/// Per-cell transient bitstate, stored beside the field grid.
///
/// Bits are independent: `set` ORs, `remove` AND-NOTs. Two bits jointly
/// encode a ghost's facing (see `GhostDir`).

use std::ops::{BitOr, BitOrAssign};

use super::entity::GhostDir;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub struct Flag(u8);

impl Flag {
    pub const NONE: Flag = Flag(0);
    pub const FALLING: Flag = Flag(1);
    pub const EXIT: Flag = Flag(2);
    pub const SKIP: Flag = Flag(4);
    pub const GHOST_DIR1: Flag = Flag(8);
    pub const GHOST_DIR2: Flag = Flag(16);
    pub const GHOST_DIR_MASK: Flag = Flag(8 | 16);

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Flag) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flag) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flag) {
        self.0 &= !other.0;
    }

    /// Ghost facing stored in the two direction bits.
    pub fn ghost_dir(self) -> GhostDir {
        let mut v = 0;
        if self.contains(Flag::GHOST_DIR1) { v |= 1; }
        if self.contains(Flag::GHOST_DIR2) { v |= 2; }
        GhostDir::from_index(v)
    }

    /// Direction bits for `dir`, suitable for `Level::set_flag`.
    pub fn for_ghost_dir(dir: GhostDir) -> Flag {
        let v = dir.index();
        let mut f = Flag::NONE;
        if v & 1 != 0 { f.insert(Flag::GHOST_DIR1); }
        if v & 2 != 0 { f.insert(Flag::GHOST_DIR2); }
        f
    }
}

impl BitOr for Flag {
    type Output = Flag;
    fn bitor(self, rhs: Flag) -> Flag {
        Flag(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flag {
    fn bitor_assign(&mut self, rhs: Flag) {
        self.0 |= rhs.0;
    }
}
