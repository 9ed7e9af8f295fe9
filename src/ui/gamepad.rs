/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Movement
///   A                     →  Confirm (next level)
///   Select                →  Quit
///   Y                     →  Restart
///   Start                 →  Pause

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::entity::MoveDir;
use super::input::Action;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    Start,
    Select,
}

const BTN_COUNT: usize = 8;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Action-to-button mapping (loaded from config).
#[derive(Clone, Debug, PartialEq, Eq)]
struct ActionMap {
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
    restart: Vec<Btn>,
    pause: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            confirm: vec![Btn::A],
            cancel: vec![Btn::Select],
            restart: vec![Btn::Y],
            pause: vec![Btn::Start],
        }
    }
}

impl ActionMap {
    /// Unknown names are skipped; an action left with no valid button
    /// keeps its default.
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse_list(names: &[String], fallback: Vec<Btn>) -> Vec<Btn> {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if parsed.is_empty() { fallback } else { parsed }
        }
        let d = ActionMap::default();
        ActionMap {
            confirm: parse_list(&cfg.confirm, d.confirm),
            cancel: parse_list(&cfg.cancel, d.cancel),
            restart: parse_list(&cfg.restart, d.restart),
            pause: parse_list(&cfg.pause, d.pause),
        }
    }

    /// Actions bound to `btn`, in a fixed order.
    fn actions_for(&self, btn: Btn) -> impl Iterator<Item = Action> + '_ {
        [
            (&self.pause, Action::Pause),
            (&self.restart, Action::Restart),
            (&self.confirm, Action::Confirm),
            (&self.cancel, Action::Quit),
        ]
        .into_iter()
        .filter(move |(btns, _)| btns.contains(&btn))
        .map(|(_, action)| action)
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    /// Held state for D-pad directions, indexed by `dir_index`.
    dpad: [bool; 4],
    stick_x: f32,
    stick_y: f32,
    /// Buttons that went down since the last `update`.
    just_pressed: [bool; BTN_COUNT],
    /// Directions that went down since the last `update`.
    fresh_dirs: Vec<MoveDir>,

    action_map: ActionMap,

    pub connected: bool,
}

fn dir_index(dir: MoveDir) -> usize {
    match dir {
        MoveDir::Left => 0,
        MoveDir::Right => 1,
        MoveDir::Up => 2,
        MoveDir::Down => 3,
    }
}

const DIRS: [MoveDir; 4] = [MoveDir::Left, MoveDir::Right, MoveDir::Up, MoveDir::Down];

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                log::warn!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            dpad: [false; 4],
            stick_x: 0.0,
            stick_y: 0.0,
            just_pressed: [false; BTN_COUNT],
            fresh_dirs: Vec::with_capacity(4),
            action_map: ActionMap::default(),
            connected,
        }
    }

    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.action_map = ActionMap::from_config(cfg);
    }

    /// Poll pending gamepad events. Call once per frame.
    pub fn update(&mut self) {
        self.just_pressed = [false; BTN_COUNT];
        self.fresh_dirs.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();
        let held_before: Vec<MoveDir> = DIRS.into_iter().filter(|d| self.dir_held(*d)).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    match axis {
                        Axis::LeftStickX => self.stick_x = value,
                        Axis::LeftStickY => self.stick_y = value,
                        _ => {}
                    }
                }
                EventType::Connected => {
                    log::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    log::info!("gamepad disconnected");
                    self.connected = false;
                    self.dpad = [false; 4];
                    self.stick_x = 0.0;
                    self.stick_y = 0.0;
                }
                _ => {}
            }
        }

        // Stick edges count as fresh presses, like the D-pad.
        for dir in DIRS {
            if self.dir_held(dir) && !held_before.contains(&dir) && !self.fresh_dirs.contains(&dir) {
                self.fresh_dirs.push(dir);
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, down: bool) {
        let dir = match gilrs_btn {
            Button::DPadUp => Some(MoveDir::Up),
            Button::DPadDown => Some(MoveDir::Down),
            Button::DPadLeft => Some(MoveDir::Left),
            Button::DPadRight => Some(MoveDir::Right),
            _ => None,
        };
        if let Some(dir) = dir {
            self.dpad[dir_index(dir)] = down;
            if down && !self.fresh_dirs.contains(&dir) {
                self.fresh_dirs.push(dir);
            }
            return;
        }

        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            if down {
                self.just_pressed[btn as usize] = true;
            }
        }
    }

    fn dir_held(&self, dir: MoveDir) -> bool {
        let stick = match dir {
            MoveDir::Left => self.stick_x < -STICK_DEADZONE,
            MoveDir::Right => self.stick_x > STICK_DEADZONE,
            MoveDir::Up => self.stick_y > STICK_DEADZONE,
            MoveDir::Down => self.stick_y < -STICK_DEADZONE,
        };
        self.dpad[dir_index(dir)] || stick
    }

    // ── Action queries ──

    /// One-shot actions from this frame: fresh directions first, then
    /// mapped buttons.
    pub fn pressed(&self) -> Vec<Action> {
        let mut out: Vec<Action> = self.fresh_dirs.iter().map(|d| Action::Move(*d)).collect();
        for (i, &down) in self.just_pressed.iter().enumerate() {
            if !down {
                continue;
            }
            if let Some(btn) = btn_from_index(i) {
                out.extend(self.action_map.actions_for(btn));
            }
        }
        out
    }

    /// Any direction currently held (D-pad or stick).
    pub fn held_direction(&self) -> Option<MoveDir> {
        DIRS.into_iter().find(|d| self.dir_held(*d))
    }
}

fn btn_from_index(i: usize) -> Option<Btn> {
    [Btn::A, Btn::B, Btn::X, Btn::Y, Btn::L1, Btn::R1, Btn::Start, Btn::Select]
        .get(i)
        .copied()
}
