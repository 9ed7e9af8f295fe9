/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The camera keeps the player in the middle of the viewport; maps
/// smaller than the viewport are centred instead.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{Facing, Position};
use crate::domain::field::Field;
use crate::sim::level::{Dimensions, Level};
use crate::sim::session::{Phase, Session};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// gaps between rows match the cells on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 16, b: 14 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Camera ──

/// A viewport into the level. `(x, y)` is the level coordinate of the
/// top-left visible cell and may be negative when the map is centred.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    /// Size the viewport. Both axes get an odd cell count so there is a
    /// true middle cell for the player.
    pub fn resize(&mut self, cells_w: usize, cells_h: usize) {
        self.view_w = odd_floor(cells_w);
        self.view_h = odd_floor(cells_h);
    }

    pub fn center_on(&mut self, target: Position, dims: Dimensions) {
        self.x = center_axis(target.x, dims.width, self.view_w);
        self.y = center_axis(target.y, dims.height, self.view_h);
    }
}

fn odd_floor(n: usize) -> usize {
    if n > 0 && n % 2 == 0 { n - 1 } else { n }
}

fn center_axis(target: i32, world: usize, view: usize) -> i32 {
    if world <= view {
        -((view as i32 - world as i32) / 2)
    } else {
        (target - view as i32 / 2).clamp(0, world as i32 - view as i32)
    }
}

// ── Renderer ──

/// Each level cell is two terminal columns wide.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 60, g: 40, b: 20 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    camera: Camera,
    anim_tick: u32,
    enhanced_keys: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            camera: Camera::default(),
            anim_tick: 0,
            enhanced_keys: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        // Release events make held-key movement exact where supported.
        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced_keys = true;
        }
        log::debug!("keyboard enhancement: {}", self.enhanced_keys);

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    /// Whether the terminal reports key Release events.
    pub fn keyboard_enhanced(&self) -> bool {
        self.enhanced_keys
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back != front for every cell.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, session: &Session) -> io::Result<()> {
        self.anim_tick = self.anim_tick.wrapping_add(1);

        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Detect phase change, clear for clean transition
        if self.last_phase != Some(session.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(session.phase);
        }

        let level = session.level();
        let dims = level.dimensions();
        let reserved_rows = MAP_ROW + 4; // HUD + gap + msg + help
        self.camera.resize(self.term_w / CELL_W, self.term_h.saturating_sub(reserved_rows).max(1));
        // Cap to level dimensions so we don't waste space on void
        self.camera.view_w = self.camera.view_w.min(dims.width);
        self.camera.view_h = self.camera.view_h.min(dims.height);
        if let Some(p) = level.player_position {
            self.camera.center_on(p, dims);
        }

        self.front.clear();

        match session.phase {
            Phase::Complete => self.compose_complete(session),
            Phase::Playing => self.compose_game(session),
            Phase::Paused => {
                self.compose_game(session);
                self.compose_overlay("PAUSED", &["P / F1  Resume", "R       Restart", "Q       Quit"]);
            }
            Phase::Won => {
                self.compose_game(session);
                self.compose_overlay("LEVEL COMPLETE", &["Enter   Next level", "R       Play again"]);
            }
            Phase::Dead => {
                self.compose_game(session);
                self.compose_overlay("GAME OVER", &["R       Restart", "Q       Quit"]);
            }
        }

        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, s: &Session) {
        let level = s.level();

        // ── HUD row ──
        let exit_status = match s.gems_remaining() {
            0 => "EXIT OPEN".to_string(),
            n => format!("{n} to go"),
        };
        let hud = format!(
            " Level {}/{}  {:<20}  Gems {}/{}  {} ",
            s.current_level() + 1, s.total_levels(), s.level_name(),
            level.collected_gems(), level.num_gems(), exit_status,
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Map (camera viewport) ──
        let cam = self.camera.clone();
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                if col + 1 >= self.front.width { break; }
                self.compose_cell(level, cam.x + vx as i32, cam.y + vy as i32, col, row);
            }
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + cam.view_h + 1;
        if msg_row < self.front.height && !s.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(1, msg_row, &s.message, Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " Arrows/WASD:Move  P:Pause  R:Restart  Q:Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    /// Write the visual for level cell (x, y) into the front buffer at (col, row).
    /// Cells outside the level are drawn as background.
    fn compose_cell(&mut self, level: &Level, x: i32, y: i32, col: usize, row: usize) {
        let dims = level.dimensions();
        let inside = x >= 0 && y >= 0 && (x as usize) < dims.width && (y as usize) < dims.height;
        let field = if !inside {
            Field::Empty
        } else if level.is_live_player_at(x, y) {
            match level.player_direction {
                Facing::Right => Field::Player,
                Facing::Left => Field::PlayerLeft,
            }
        } else {
            level.get_field(x, y)
        };

        let (glyph, fg, bg) = self.glyph(field, level.can_exit());
        let mut chars = glyph.chars();
        let c0 = chars.next().unwrap_or(' ');
        let c1 = chars.next().unwrap_or(' ');
        self.front.set(col, row, Cell::new(c0, fg, bg));
        self.front.set(col + 1, row, Cell::new(c1, fg, bg));
    }

    fn glyph(&self, field: Field, exit_open: bool) -> (&'static str, Color, Color) {
        let blink = (self.anim_tick / 40) % 2 == 0;
        match field {
            Field::Empty => ("  ", Color::Reset, Color::Reset),
            Field::Wall => ("██", Color::Rgb { r: 110, g: 110, b: 120 }, Color::Rgb { r: 70, g: 70, b: 80 }),
            Field::Sand => ("░░", Color::Rgb { r: 190, g: 140, b: 80 }, Color::Rgb { r: 110, g: 75, b: 35 }),
            Field::Stone => ("()", Color::Rgb { r: 200, g: 200, b: 200 }, Color::Reset),
            Field::Gem => ("<>", Color::Rgb { r: 80, g: 230, b: 255 }, Color::Reset),
            Field::Exit if exit_open && blink => ("[]", Color::Black, Color::Rgb { r: 80, g: 255, b: 80 }),
            Field::Exit => ("[]", Color::Rgb { r: 60, g: 140, b: 60 }, Color::Reset),
            Field::Ghost => ("{}", Color::Rgb { r: 230, g: 90, b: 230 }, Color::Reset),
            Field::Player => ("@>", Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset),
            Field::PlayerLeft => ("<@", Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset),
        }
    }

    // ── Overlays & static screens ──

    fn compose_overlay(&mut self, title: &str, lines: &[&str]) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };

        let view_cols = (self.camera.view_w * CELL_W).max(30);
        let box_w = 30_usize.min(view_cols);
        let box_h = lines.len() + 4;
        let box_x = view_cols.saturating_sub(box_w) / 2;
        let box_y = MAP_ROW + self.camera.view_h.saturating_sub(box_h) / 2;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::new(' ', Color::Reset, dim));
            }
        }

        let title_x = box_x + box_w.saturating_sub(title.chars().count()) / 2;
        self.front.put_str(title_x, box_y + 1, title, hdr, dim);
        for (i, line) in lines.iter().enumerate() {
            self.front.put_str(box_x + 3, box_y + 3 + i, line, key_c, dim);
        }
    }

    fn compose_complete(&mut self, s: &Session) {
        let gold = Color::Rgb { r: 255, g: 220, b: 50 };
        let box_art = [
            "╔════════════════════════════════╗",
            "║     ALL  LEVELS  COMPLETE!     ║",
            "╚════════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, 4 + i, l, gold, Color::Reset);
        }
        let levels = format!("{} levels cleared", s.total_levels());
        self.front.put_str(6, 9, &levels, Color::White, Color::Reset);
        self.front.put_str(6, 11, "Q / Esc: Quit", Color::DarkGrey, Color::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: usize, height: usize) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn viewport_is_odd() {
        let mut cam = Camera::default();
        cam.resize(40, 20);
        assert_eq!((cam.view_w, cam.view_h), (39, 19));
        cam.resize(9, 1);
        assert_eq!((cam.view_w, cam.view_h), (9, 1));
        cam.resize(0, 0);
        assert_eq!((cam.view_w, cam.view_h), (0, 0));
    }

    #[test]
    fn small_map_is_centred() {
        let mut cam = Camera::default();
        cam.resize(11, 9);
        cam.center_on(Position::new(0, 0), dims(5, 5));
        assert_eq!((cam.x, cam.y), (-3, -2));
    }

    #[test]
    fn player_in_the_middle() {
        let mut cam = Camera::default();
        cam.resize(9, 5);
        cam.center_on(Position::new(20, 10), dims(40, 20));
        assert_eq!((cam.x, cam.y), (16, 8));
    }

    #[test]
    fn camera_clamps_at_edges() {
        let mut cam = Camera::default();
        cam.resize(9, 5);
        cam.center_on(Position::new(1, 1), dims(40, 20));
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.center_on(Position::new(39, 19), dims(40, 20));
        assert_eq!((cam.x, cam.y), (31, 15));
    }

    #[test]
    fn every_field_has_a_two_column_glyph() {
        let r = Renderer::new();
        for f in [
            Field::Empty, Field::Wall, Field::Sand, Field::Stone, Field::Gem,
            Field::Exit, Field::Ghost, Field::Player, Field::PlayerLeft,
        ] {
            assert_eq!(r.glyph(f, true).0.chars().count(), 2);
            assert_eq!(r.glyph(f, false).0.chars().count(), 2);
        }
    }

    #[test]
    fn put_str_clips_at_edge() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.put_str(2, 0, "abcd", Color::White, Color::Reset);
        assert_eq!(fb.get(2, 0).ch, 'a');
        assert_eq!(fb.get(3, 0).ch, 'b');
        assert_eq!(fb.get(5, 0), Cell::BLANK);
    }
}
