/// Keyboard input tracker.
///
/// Turns crossterm key events into game `Action`s:
///   - Fresh presses become one-shot actions (queued moves, pause, restart)
///   - The most recently pressed direction that is still held becomes the
///     held direction, used for continuous movement
///
/// Held movement needs Release events, so it is only reported when the
/// terminal supports keyboard enhancement. Elsewhere the terminal's own
/// auto-repeat arrives as fresh presses. A key that goes quiet for a short
/// period is considered released in case a Release event is lost.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEventKind, KeyModifiers};

use crate::domain::entity::MoveDir;

/// After this duration without a Press/Repeat event, consider the key released.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// A game-level command, from either keyboard or gamepad.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    Move(MoveDir),
    Pause,
    Restart,
    Confirm,
    Quit,
}

/// Fixed key bindings.
pub fn action_for_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Left | KeyCode::Char('a' | 'A') => Action::Move(MoveDir::Left),
        KeyCode::Right | KeyCode::Char('d' | 'D') => Action::Move(MoveDir::Right),
        KeyCode::Up | KeyCode::Char('w' | 'W') => Action::Move(MoveDir::Up),
        KeyCode::Down | KeyCode::Char('s' | 'S') => Action::Move(MoveDir::Down),
        KeyCode::Char('p' | 'P') | KeyCode::F(1) => Action::Pause,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Confirm,
        KeyCode::Esc | KeyCode::Char('q' | 'Q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

pub struct InputState {
    /// Timestamp of the last Press/Repeat event for each held direction.
    last_active: HashMap<MoveDir, Instant>,

    /// One-shot actions from presses seen in the latest drain.
    pressed: Vec<Action>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(4),
            pressed: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events.
    /// Call this once per frame, before the scheduler runs.
    pub fn drain_events(&mut self) {
        self.pressed.clear();

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("terminal read failed: {e}");
                    break;
                }
            };

            if key.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(key.code, KeyCode::Char('c' | 'C'))
            {
                self.pressed.push(Action::Quit);
                continue;
            }

            let now = Instant::now();
            match key.kind {
                KeyEventKind::Release => {
                    if self.honor_release {
                        if let Some(Action::Move(dir)) = action_for_key(key.code) {
                            self.last_active.remove(&dir);
                        }
                    }
                }
                KeyEventKind::Repeat => {
                    if let Some(Action::Move(dir)) = action_for_key(key.code) {
                        self.last_active.insert(dir, now);
                    }
                }
                _ => self.press(key.code, now),
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn press(&mut self, code: KeyCode, now: Instant) {
        let Some(action) = action_for_key(code) else { return };
        if let Action::Move(dir) = action {
            self.last_active.insert(dir, now);
        }
        self.pressed.push(action);
    }

    /// Actions from fresh presses this frame, in arrival order.
    pub fn pressed(&self) -> &[Action] {
        &self.pressed
    }

    /// The most recently refreshed direction that is still held.
    pub fn held_direction(&self) -> Option<MoveDir> {
        if !self.honor_release {
            return None;
        }
        self.last_active
            .iter()
            .filter(|(_, t)| t.elapsed() < HOLD_TIMEOUT)
            .max_by_key(|(_, t)| **t)
            .map(|(dir, _)| *dir)
    }
}
