/// The three steppers that advance a `Level`.
///
///   1. `move_player`: one directional input (walk / push / collect / exit)
///   2. `stone_fall`: one gravity sweep over the whole grid
///   3. `move_ghosts`: one wall-following step for every ghost
///
/// Each call is atomic with respect to the grid and emits its events
/// synchronously before returning. The caller serializes calls; `&mut`
/// makes overlapping sweeps impossible.
///
/// Sweeps use `Flag::SKIP` to keep an object that already moved from
/// moving again in the same sweep, and always clear it before returning.

use crate::domain::entity::{Facing, Position};
use crate::domain::field::Field;
use crate::domain::flag::Flag;
use super::error::MoveError;
use super::event::GameEvent;
use super::level::Level;

impl Level {
    // ══════════════════════════════════════════════════════════════
    // Player movement
    // ══════════════════════════════════════════════════════════════

    /// Apply one orthogonal step of at most one cell.
    pub fn move_player(&mut self, dx: i32, dy: i32) -> Result<(), MoveError> {
        if dx.abs() > 1 || dy.abs() > 1 || dx.abs() + dy.abs() > 1 {
            return Err(MoveError::InvalidMove { dx, dy });
        }
        let pos = match self.player_position {
            Some(p) if self.player_alive => p,
            _ => return Err(MoveError::GameOver),
        };

        if dx == 1 { self.player_direction = Facing::Right; }
        if dx == -1 { self.player_direction = Facing::Left; }

        let target = pos.offset(dx, dy);
        let field = self.get_field(target.x, target.y);

        if field == Field::Stone {
            // Only horizontal pushes, and only into empty space.
            let beyond = target.offset(dx, 0);
            if dy == 0 && self.get_field(beyond.x, beyond.y) == Field::Empty {
                // A pushed stone starts at rest.
                self.remove_flag(beyond.x, beyond.y, Flag::FALLING);
                self.set_field(beyond.x, beyond.y, Field::Stone);
                self.set_field(target.x, target.y, Field::Empty);
                self.remove_flag(target.x, target.y, Flag::FALLING);
                self.player_position = Some(target);
                self.notify(GameEvent::Push);
            }
            return Ok(());
        }

        if field == Field::Exit && self.can_exit() {
            log::info!("exit reached with {} gems", self.collected_gems());
            self.notify(GameEvent::Won);
        }

        if field == Field::Gem {
            self.collect_gem();
            self.notify(GameEvent::Gem);
        }

        if field.is_walkable() {
            self.set_field(target.x, target.y, Field::Empty);
            self.remove_flag(target.x, target.y, Flag::FALLING);
            self.player_position = Some(target);
        }

        Ok(())
    }

    // ══════════════════════════════════════════════════════════════
    // Gravity
    // ══════════════════════════════════════════════════════════════

    /// One gravity sweep: bottom row first, left to right.
    ///
    /// Visiting lower rows first means an object that drops into the row
    /// below has already had that row processed, so it moves at most once.
    /// Sideways rolls land in cells not yet visited and are marked `SKIP`.
    pub fn stone_fall(&mut self) {
        let dims = self.dimensions();
        let (w, h) = (dims.width as i32, dims.height as i32);

        // Stamp the player so a falling object can see it.
        let stamp = match self.player_position {
            Some(p) if self.player_alive && self.get_field(p.x, p.y) == Field::Empty => {
                self.set_field(p.x, p.y, Field::Player);
                Some(p)
            }
            _ => None,
        };

        for y in (0..h).rev() {
            for x in 0..w {
                if self.get_flags(x, y).contains(Flag::SKIP) {
                    self.remove_flag(x, y, Flag::SKIP);
                    continue;
                }
                let obj = self.get_field(x, y);
                if !obj.is_heavy() {
                    continue;
                }
                self.fall_step(x, y, obj);
            }
        }

        self.clear_skip_flags();

        if let Some(p) = stamp {
            if self.player_alive && self.get_field(p.x, p.y) == Field::Player {
                self.set_field(p.x, p.y, Field::Empty);
            }
        }
    }

    /// Advance the heavy object `obj` at (x, y) by one step.
    fn fall_step(&mut self, x: i32, y: i32, obj: Field) {
        let falling = self.get_flags(x, y).contains(Flag::FALLING);
        let below = self.get_field(x, y + 1);

        match below {
            Field::Empty => {
                self.relocate(x, y, x, y + 1, obj);
            }
            Field::Player if falling => {
                self.relocate(x, y, x, y + 1, obj);
                self.explode(Position::new(x, y + 1));
            }
            b if b.is_rounded() => {
                if !self.try_roll(x, y, 1, obj) && !self.try_roll(x, y, -1, obj) {
                    self.land(x, y, falling);
                }
            }
            _ => self.land(x, y, falling),
        }
    }

    /// Roll sideways off a rounded object if both the side cell and the
    /// cell below it are empty.
    fn try_roll(&mut self, x: i32, y: i32, side: i32, obj: Field) -> bool {
        let nx = x + side;
        if self.get_field(nx, y) != Field::Empty || self.get_field(nx, y + 1) != Field::Empty {
            return false;
        }
        self.relocate(x, y, nx, y, obj);
        self.set_flag(nx, y, Flag::SKIP);
        true
    }

    /// Move a heavy object, carrying its falling state to the new cell.
    fn relocate(&mut self, x: i32, y: i32, nx: i32, ny: i32, obj: Field) {
        self.set_field(x, y, Field::Empty);
        self.remove_flag(x, y, Flag::FALLING);
        self.set_field(nx, ny, obj);
        self.set_flag(nx, ny, Flag::FALLING);
    }

    /// Nothing left to do for this object; report a landing once.
    fn land(&mut self, x: i32, y: i32, falling: bool) {
        if falling {
            self.remove_flag(x, y, Flag::FALLING);
            self.notify(GameEvent::Ground(Position::new(x, y)));
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Ghosts
    // ══════════════════════════════════════════════════════════════

    /// Move every ghost one cell, row-major. A ghost keeps going the way
    /// it faces and turns clockwise until it finds an empty cell.
    pub fn move_ghosts(&mut self) {
        let dims = self.dimensions();
        let (w, h) = (dims.width as i32, dims.height as i32);

        for y in 0..h {
            for x in 0..w {
                if self.get_flags(x, y).contains(Flag::SKIP) {
                    self.remove_flag(x, y, Flag::SKIP);
                    continue;
                }
                if self.get_field(x, y) != Field::Ghost {
                    continue;
                }
                self.ghost_step(x, y);
            }
        }

        self.clear_skip_flags();
    }

    fn ghost_step(&mut self, x: i32, y: i32) {
        let facing = self.get_flags(x, y).ghost_dir();

        for turn in 0..4 {
            let dir = facing.rotate(turn);
            let (dx, dy) = dir.delta();
            let (nx, ny) = (x + dx, y + dy);
            if self.get_field(nx, ny) != Field::Empty {
                continue;
            }

            self.set_field(x, y, Field::Empty);
            self.remove_flag(x, y, Flag::GHOST_DIR_MASK);
            self.set_field(nx, ny, Field::Ghost);
            self.remove_flag(nx, ny, Flag::GHOST_DIR_MASK);
            self.set_flag(nx, ny, Flag::for_ghost_dir(dir) | Flag::SKIP);

            if self.is_live_player_at(nx, ny) {
                self.explode(Position::new(nx, ny));
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::domain::entity::GhostDir;

    /// Parse a level and attach a recorder for its events.
    fn level_with_spy(text: &str) -> (Level, Rc<RefCell<Vec<GameEvent>>>) {
        let mut level = Level::parse(text).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        level.subscribe(move |e| sink.borrow_mut().push(*e));
        (level, events)
    }

    fn count(events: &Rc<RefCell<Vec<GameEvent>>>, name: &str) -> usize {
        events.borrow().iter().filter(|e| e.name() == name).count()
    }

    // ── Movement ──

    #[test]
    fn move_into_empty() {
        let (mut level, _) = level_with_spy("#####\n#P .#\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(2, 1)));
    }

    #[test]
    fn move_onto_sand_digs_it() {
        let (mut level, _) = level_with_spy("#####\n# P.#\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(3, 1)));
        assert_eq!(level.get_field(3, 1), Field::Empty);
    }

    #[test]
    fn move_into_wall_stays() {
        let (mut level, events) = level_with_spy("#####\n#  P#\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(3, 1)));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn diagonal_move_is_rejected() {
        let (mut level, _) = level_with_spy("#####\n# P #\n#   #\n#####");
        assert_eq!(level.move_player(1, 1), Err(MoveError::InvalidMove { dx: 1, dy: 1 }));
        assert_eq!(level.move_player(2, 0), Err(MoveError::InvalidMove { dx: 2, dy: 0 }));
        assert_eq!(level.player_position, Some(Position::new(2, 1)));
        assert_eq!(level.player_direction, Facing::Right);
    }

    #[test]
    fn facing_follows_horizontal_moves() {
        let (mut level, _) = level_with_spy("#####\n#  P#\n#   #\n#####");
        level.move_player(-1, 0).unwrap();
        assert_eq!(level.player_direction, Facing::Left);
        level.move_player(0, 1).unwrap();
        assert_eq!(level.player_direction, Facing::Left);
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_direction, Facing::Right);
    }

    #[test]
    fn push_stone_into_space() {
        let (mut level, events) = level_with_spy("#####\n#Po #\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(2, 1)));
        assert_eq!(level.get_field(3, 1), Field::Stone);
        assert_eq!(level.get_field(2, 1), Field::Empty);
        assert_eq!(count(&events, "push"), 1);
    }

    #[test]
    fn blocked_push_changes_nothing() {
        let (mut level, events) = level_with_spy("#####\n#Po$#\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(1, 1)));
        assert_eq!(level.get_field(2, 1), Field::Stone);
        assert_eq!(level.get_field(3, 1), Field::Gem);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn stones_cannot_be_pushed_vertically() {
        let (mut level, events) = level_with_spy("###\n#P#\n#o#\n# #\n###");
        level.move_player(0, 1).unwrap();
        assert_eq!(level.player_position, Some(Position::new(1, 1)));
        assert_eq!(level.get_field(1, 2), Field::Stone);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn collecting_a_gem() {
        let (mut level, events) = level_with_spy("####\n#P$#\n####");
        level.move_player(1, 0).unwrap();
        assert_eq!(level.collected_gems(), 1);
        assert_eq!(level.player_position, Some(Position::new(2, 1)));
        assert_eq!(level.get_field(2, 1), Field::Empty);
        assert_eq!(*events.borrow(), vec![GameEvent::Gem]);
    }

    #[test]
    fn exit_without_gems_left_wins() {
        let (mut level, events) = level_with_spy("#####\n#PX #\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(*events.borrow(), vec![GameEvent::Won]);
        assert_eq!(level.player_position, Some(Position::new(1, 1)));
    }

    #[test]
    fn exit_with_gems_left_does_not_win() {
        let (mut level, events) = level_with_spy("#####\n#PX$#\n#####");
        level.move_player(1, 0).unwrap();
        assert_eq!(count(&events, "won"), 0);
    }

    #[test]
    fn collect_then_exit() {
        let (mut level, events) = level_with_spy("#####\n#X$P#\n#####");
        level.move_player(-1, 0).unwrap();
        level.move_player(-1, 0).unwrap();
        assert_eq!(*events.borrow(), vec![GameEvent::Gem, GameEvent::Won]);
    }

    #[test]
    fn collecting_a_falling_gem_clears_its_velocity() {
        let (mut level, _) = level_with_spy("#####\n# $ #\n# P #\n#####");
        level.set_flag(2, 1, Flag::FALLING);
        level.move_player(0, -1).unwrap();
        assert_eq!(level.get_flags(2, 1), Flag::NONE);
    }

    #[test]
    fn stone_pushed_onto_stale_velocity_does_not_kill() {
        let (mut level, events) = level_with_spy("#  $o #\n#  P..#");
        level.set_flag(3, 0, Flag::FALLING);
        // Collect the gem, loop round, push the stone into its cell.
        for (dx, dy) in [(0, -1), (0, 1), (1, 0), (1, 0), (0, -1), (-1, 0)] {
            level.move_player(dx, dy).unwrap();
        }
        assert_eq!(level.get_field(3, 0), Field::Stone);
        assert!(!level.get_flags(3, 0).contains(Flag::FALLING));
        // Walk underneath it.
        level.move_player(0, 1).unwrap();
        level.move_player(-1, 0).unwrap();
        assert_eq!(level.player_position, Some(Position::new(3, 1)));

        level.stone_fall();
        assert!(level.player_alive);
        assert_eq!(level.get_field(3, 0), Field::Stone);
        assert_eq!(count(&events, "gameover"), 0);
        assert_eq!(count(&events, "ground"), 0);
    }

    #[test]
    fn dead_player_cannot_move() {
        let (mut level, _) = level_with_spy("####\n#P #\n####");
        level.player_alive = false;
        assert_eq!(level.move_player(1, 0), Err(MoveError::GameOver));
        assert_eq!(level.player_position, Some(Position::new(1, 1)));
    }

    #[test]
    fn missing_player_cannot_move() {
        let (mut level, _) = level_with_spy("####\n#  #\n####");
        assert_eq!(level.move_player(1, 0), Err(MoveError::GameOver));
    }

    // ── Gravity ──

    #[test]
    fn stone_falls_one_row() {
        let (mut level, _) = level_with_spy("####\n#Po#\n#. #\n####");
        level.stone_fall();
        assert_eq!(level.get_field(2, 1), Field::Empty);
        assert_eq!(level.get_field(2, 2), Field::Stone);
        assert_eq!(level.get_flags(2, 2), Flag::FALLING);
        assert_eq!(level.get_flags(2, 1), Flag::NONE);
    }

    #[test]
    fn falling_stone_lands_once() {
        let (mut level, events) = level_with_spy("####\n#Po#\n#. #\n#. #\n####");
        level.stone_fall();
        level.stone_fall();
        assert_eq!(level.get_field(2, 3), Field::Stone);
        assert_eq!(count(&events, "ground"), 0);
        level.stone_fall();
        assert_eq!(*events.borrow(), vec![GameEvent::Ground(Position::new(2, 3))]);
        assert_eq!(level.get_flags(2, 3), Flag::NONE);
        level.stone_fall();
        level.stone_fall();
        assert_eq!(count(&events, "ground"), 1);
    }

    #[test]
    fn ground_clears_falling_flag() {
        let (mut level, events) = level_with_spy("####\n#P #\n#.o#\n####");
        level.set_flag(2, 2, Flag::FALLING);
        level.stone_fall();
        assert_eq!(level.get_flags(2, 2), Flag::NONE);
        assert_eq!(*events.borrow(), vec![GameEvent::Ground(Position::new(2, 2))]);
    }

    #[test]
    fn resting_stone_emits_nothing() {
        let (mut level, events) = level_with_spy("####\n#Po#\n#..#\n####");
        level.stone_fall();
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn falling_stone_kills_player() {
        let (mut level, events) = level_with_spy("###\n#o#\n# #\n#P#\n###");
        level.stone_fall();
        assert!(level.player_alive);
        level.stone_fall();
        assert!(!level.player_alive);
        assert_eq!(count(&events, "gameover"), 1);
        for y in 2..=4 {
            for x in 0..=2 {
                assert_eq!(level.get_field(x, y), Field::Gem);
            }
        }
        for y in 0..5 {
            for x in 0..3 {
                assert!(!level.get_flags(x, y).contains(Flag::SKIP));
            }
        }
    }

    #[test]
    fn resting_stone_does_not_kill() {
        let (mut level, events) = level_with_spy("####\n# o#\n#P.#\n####");
        level.move_player(1, 0).unwrap();
        level.stone_fall();
        assert!(level.player_alive);
        assert_eq!(level.get_field(2, 1), Field::Stone);
        assert_eq!(level.get_field(2, 2), Field::Empty);
        assert_eq!(count(&events, "gameover"), 0);
    }

    #[test]
    fn player_stamp_is_removed_after_sweep() {
        let (mut level, _) = level_with_spy("####\n#P #\n####");
        level.stone_fall();
        assert_eq!(level.get_field(1, 1), Field::Empty);
    }

    #[test]
    fn stone_rolls_right_off_stone() {
        let (mut level, _) = level_with_spy("######\n#P o #\n#  o #\n######");
        level.stone_fall();
        assert_eq!(level.get_field(3, 1), Field::Empty);
        assert_eq!(level.get_field(4, 1), Field::Stone);
        assert_eq!(level.get_flags(3, 1), Flag::NONE);
        assert_eq!(level.get_flags(4, 1), Flag::FALLING);
    }

    #[test]
    fn stone_rolls_left_when_right_blocked() {
        let (mut level, _) = level_with_spy("######\n#P o #\n#  oo#\n######");
        level.stone_fall();
        assert_eq!(level.get_field(3, 1), Field::Empty);
        assert_eq!(level.get_field(2, 1), Field::Stone);
        assert_eq!(level.get_flags(3, 1), Flag::NONE);
        assert_eq!(level.get_flags(2, 1), Flag::FALLING);
    }

    #[test]
    fn rolled_stone_then_falls() {
        let (mut level, _) = level_with_spy("######\n#P o #\n#  o #\n#  ..#\n######");
        level.stone_fall();
        assert_eq!(level.get_field(4, 1), Field::Stone);
        level.stone_fall();
        assert_eq!(level.get_field(4, 2), Field::Stone);
        assert_eq!(level.get_field(4, 1), Field::Empty);
    }

    #[test]
    fn gem_on_stone_rolls_too() {
        let (mut level, _) = level_with_spy("#####\n#P$ #\n# o #\n#####");
        level.stone_fall();
        assert_eq!(level.get_field(3, 1), Field::Gem);
    }

    #[test]
    fn wedged_stone_rests() {
        let (mut level, events) = level_with_spy("#####\n#PoX#\n#.o.#\n#####");
        level.set_flag(2, 1, Flag::FALLING);
        level.stone_fall();
        assert_eq!(level.get_field(2, 1), Field::Stone);
        assert_eq!(*events.borrow(), vec![GameEvent::Ground(Position::new(2, 1))]);
    }

    #[test]
    fn column_of_stones_falls_together() {
        let (mut level, _) = level_with_spy("###\n#o#\n#o#\n# #\n# #\n###");
        level.stone_fall();
        assert_eq!(level.get_field(1, 1), Field::Empty);
        assert_eq!(level.get_field(1, 2), Field::Stone);
        assert_eq!(level.get_field(1, 3), Field::Stone);
    }

    #[test]
    fn skip_never_survives_a_sweep() {
        let (mut level, _) = level_with_spy("######\n#P o #\n#  o #\n######");
        level.set_flag(1, 2, Flag::SKIP);
        level.stone_fall();
        for y in 0..4 {
            for x in 0..6 {
                assert!(!level.get_flags(x, y).contains(Flag::SKIP));
            }
        }
    }

    // ── Ghosts ──

    #[test]
    fn ghost_moves_the_way_it_faces() {
        let (mut level, _) = level_with_spy("####\n#P #\n# G#\n####");
        level.set_flag(2, 2, Flag::for_ghost_dir(GhostDir::Left));
        level.move_ghosts();
        assert_eq!(level.get_field(1, 2), Field::Ghost);
        assert_eq!(level.get_field(2, 2), Field::Empty);
        assert_eq!(level.get_flags(1, 2).ghost_dir(), GhostDir::Left);
        assert_eq!(level.get_flags(2, 2), Flag::NONE);
    }

    #[test]
    fn ghost_turns_clockwise_when_blocked() {
        // Facing right into a wall; down is free.
        let (mut level, _) = level_with_spy("####\n#G##\n# ##\n####");
        level.move_ghosts();
        assert_eq!(level.get_field(1, 2), Field::Ghost);
        assert_eq!(level.get_flags(1, 2).ghost_dir(), GhostDir::Down);
    }

    #[test]
    fn walled_in_ghost_stays() {
        let (mut level, _) = level_with_spy("###\n#G#\n###");
        level.set_flag(1, 1, Flag::for_ghost_dir(GhostDir::Up));
        level.move_ghosts();
        assert_eq!(level.get_field(1, 1), Field::Ghost);
        assert_eq!(level.get_flags(1, 1), Flag::for_ghost_dir(GhostDir::Up));
    }

    #[test]
    fn ghost_moves_once_per_sweep() {
        let (mut level, _) = level_with_spy("######\n#G   #\n######");
        level.move_ghosts();
        assert_eq!(level.get_field(2, 1), Field::Ghost);
        assert_eq!(level.get_field(3, 1), Field::Empty);
    }

    #[test]
    fn ghost_moving_down_is_not_reprocessed() {
        let (mut level, _) = level_with_spy("###\n#G#\n# #\n# #\n###");
        level.set_flag(1, 1, Flag::for_ghost_dir(GhostDir::Down));
        level.move_ghosts();
        assert_eq!(level.get_field(1, 2), Field::Ghost);
        assert_eq!(level.get_field(1, 3), Field::Empty);
    }

    #[test]
    fn ghost_catches_player() {
        let (mut level, events) = level_with_spy("#####\n#   #\n#GP #\n#   #\n#####");
        level.move_ghosts();
        assert!(!level.player_alive);
        assert_eq!(count(&events, "gameover"), 1);
        assert_eq!(level.get_field(2, 2), Field::Gem);
        assert_eq!(level.get_field(1, 1), Field::Gem);
        assert_eq!(level.get_field(3, 3), Field::Gem);
        assert_eq!(level.move_player(1, 0), Err(MoveError::GameOver));
    }
}
