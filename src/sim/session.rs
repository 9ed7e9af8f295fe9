/// Session: one playthrough of a level list.
///
/// Owns the running `Level` plus everything around it that is not part of
/// the engine itself: which level is loaded, the phase the game is in,
/// buffered movement input and the status line.
///
/// ## Event flow
///
/// On every load the session subscribes a collector closure to the new
/// level. After each tick the collected events are drained, folded into
/// the phase (`Won` / `GameOver`) and handed back to the caller for sound.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::domain::entity::MoveDir;
use super::error::{MoveError, ParseError};
use super::event::GameEvent;
use super::level::Level;
use super::pack::LevelDef;
use super::schedule::TickKind;

/// Buffered directional inputs. Older inputs are dropped first.
pub const INPUT_QUEUE_CAP: usize = 4;

/// Status-line lifetime, in frames.
const MESSAGE_FRAMES: u32 = 400;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Paused,
    /// Level finished, waiting for confirm.
    Won,
    /// Player died, waiting for restart.
    Dead,
    /// No levels left.
    Complete,
}

pub struct Session {
    level: Level,
    levels: Vec<LevelDef>,
    current_level: usize,
    pub phase: Phase,
    queue: VecDeque<MoveDir>,
    events: Rc<RefCell<Vec<GameEvent>>>,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

impl Session {
    /// Start at the first level. An empty list goes straight to `Complete`.
    pub fn new(levels: Vec<LevelDef>) -> Result<Self, ParseError> {
        let mut session = Session {
            level: Level::new(vec![]),
            levels,
            current_level: 0,
            phase: Phase::Complete,
            queue: VecDeque::with_capacity(INPUT_QUEUE_CAP),
            events: Rc::new(RefCell::new(Vec::new())),
            message: String::new(),
            message_timer: 0,
        };
        session.load_level(0)?;
        Ok(session)
    }

    // ══════════════════════════════════════════════════════════════
    // Level lifecycle
    // ══════════════════════════════════════════════════════════════

    /// Parse and start level `idx`. On a parse error the current level
    /// stays loaded and the error is returned.
    pub fn load_level(&mut self, idx: usize) -> Result<(), ParseError> {
        let Some(def) = self.levels.get(idx) else {
            log::info!("all {} levels complete", self.levels.len());
            self.current_level = self.levels.len();
            self.set_phase(Phase::Complete);
            self.set_message("All levels complete!");
            return Ok(());
        };

        let mut level = match Level::parse(&def.text) {
            Ok(level) => level,
            Err(e) => {
                log::error!("level {} ({}) failed to parse: {e}", idx + 1, def.name);
                return Err(e);
            }
        };

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        level.subscribe(move |e| sink.borrow_mut().push(*e));

        let dims = level.dimensions();
        log::info!(
            "loaded level {} \"{}\" ({}x{}, {} gems)",
            idx + 1, def.name, dims.width, dims.height, level.num_gems()
        );

        let name = def.name.clone();
        self.level = level;
        self.events = events;
        self.current_level = idx;
        self.queue.clear();
        self.set_phase(Phase::Playing);
        self.set_message(&format!("Level {}: {}", idx + 1, name));
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), ParseError> {
        self.load_level(self.current_level)
    }

    pub fn next_level(&mut self) -> Result<(), ParseError> {
        self.load_level(self.current_level + 1)
    }

    pub fn toggle_pause(&mut self) {
        match self.phase {
            Phase::Playing => self.set_phase(Phase::Paused),
            Phase::Paused => self.set_phase(Phase::Playing),
            _ => {}
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Input & ticks
    // ══════════════════════════════════════════════════════════════

    pub fn queue_move(&mut self, dir: MoveDir) {
        if self.queue.len() >= INPUT_QUEUE_CAP {
            self.queue.pop_front();
        }
        self.queue.push_back(dir);
    }

    /// Run one scheduled step. `held` is the direction currently held
    /// down, used when no discrete input is queued. Returns the events
    /// the step produced.
    pub fn tick(&mut self, kind: TickKind, held: Option<MoveDir>) -> Vec<GameEvent> {
        if self.phase != Phase::Playing {
            return vec![];
        }

        match kind {
            TickKind::Input => {
                if let Some(dir) = self.queue.pop_front().or(held) {
                    let (dx, dy) = dir.delta();
                    match self.level.move_player(dx, dy) {
                        Ok(()) => {}
                        Err(MoveError::GameOver) => self.set_phase(Phase::Dead),
                        Err(e) => log::warn!("{e}"),
                    }
                }
            }
            TickKind::Gravity => self.level.stone_fall(),
            TickKind::Ghosts => self.level.move_ghosts(),
        }

        let drained: Vec<GameEvent> = self.events.borrow_mut().drain(..).collect();
        for event in &drained {
            match event {
                GameEvent::Won => {
                    self.set_phase(Phase::Won);
                    self.set_message("Level complete! Press Enter");
                }
                GameEvent::GameOver => {
                    self.set_phase(Phase::Dead);
                    self.set_message("Game over! Press R to restart");
                }
                _ => {}
            }
        }
        drained
    }

    /// Count down the status line. Call once per frame.
    pub fn update_message(&mut self) {
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 {
                self.message.clear();
            }
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Queries
    // ══════════════════════════════════════════════════════════════

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn total_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_name(&self) -> &str {
        self.levels
            .get(self.current_level)
            .map_or("", |def| def.name.as_str())
    }

    pub fn gems_remaining(&self) -> u32 {
        self.level.num_gems().saturating_sub(self.level.collected_gems())
    }

    #[allow(dead_code)]
    pub fn queued_moves(&self) -> usize {
        self.queue.len()
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn set_message(&mut self, msg: &str) {
        self.message = msg.to_string();
        self.message_timer = MESSAGE_FRAMES;
    }
}
