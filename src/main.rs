/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::error::Error;
use std::fs::File;
use std::time::{Duration, Instant};

use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use config::{GameConfig, LogConfig};
use sim::event::GameEvent;
use sim::pack;
use sim::schedule::TickSchedule;
use sim::session::{Phase, Session};
use ui::gamepad::GamepadState;
use ui::input::{Action, InputState};
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

fn main() -> Result<(), Box<dyn Error>> {
    let config = GameConfig::load();
    let debug_flag = std::env::args().skip(1).any(|arg| arg == "--debug");
    setup_logging(&config.log, debug_flag);
    for warning in &config.warnings {
        log::warn!("{warning}");
    }

    let levels = pack::load_levels(&config.levels_dir);
    let mut session = Session::new(levels)?;

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        let _ = renderer.cleanup();
        return Err(format!("terminal init failed: {e}").into());
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut session, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    result?;

    println!();
    println!("Thanks for playing Boulders!");
    println!(
        "Reached level {} of {}",
        (session.current_level() + 1).min(session.total_levels()),
        session.total_levels()
    );
    Ok(())
}

/// File logger, since the terminal belongs to the renderer.
/// On with `--debug` or `[log] enabled = true`.
fn setup_logging(cfg: &LogConfig, debug_flag: bool) {
    if !(cfg.enabled || debug_flag) {
        return;
    }
    let level = if debug_flag { LevelFilter::Debug } else { cfg.level };
    let file = match File::create(&cfg.file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("could not create log file {}: {e}", cfg.file.display());
            return;
        }
    };
    let logger_config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .build();
    if let Err(e) = WriteLogger::init(level, logger_config, file) {
        eprintln!("logger init failed: {e}");
    }
}

fn game_loop(
    session: &mut Session,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn Error>> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.keyboard_enhanced();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        log::info!("gamepad detected");
    }

    let frame = Duration::from_millis(config.speed.frame_ms);
    let mut schedule = TickSchedule::from_speed(&config.speed);
    schedule.prime();
    let mut last_frame = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        let actions: Vec<Action> = kb.pressed().iter().copied().chain(gp.pressed()).collect();
        for action in actions {
            if handle_action(session, &mut schedule, action) {
                return Ok(());
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_frame);
        last_frame = now;

        let held = kb.held_direction().or(gp.held_direction());
        for kind in schedule.advance(dt) {
            let events = session.tick(kind, held);
            process_sound_events(sound, &events);
        }

        session.update_message();
        renderer.render(session)?;
        std::thread::sleep(frame);
    }
}

/// Apply one input action. Returns true when the player quits.
fn handle_action(session: &mut Session, schedule: &mut TickSchedule, action: Action) -> bool {
    let result = match (action, session.phase) {
        (Action::Quit, _) => return true,
        (Action::Pause, _) => {
            session.toggle_pause();
            Ok(())
        }
        (Action::Move(dir), Phase::Playing) => {
            session.queue_move(dir);
            Ok(())
        }
        (Action::Restart, Phase::Playing | Phase::Paused | Phase::Dead | Phase::Won)
        | (Action::Confirm, Phase::Dead) => {
            schedule.reset();
            session.restart()
        }
        (Action::Confirm, Phase::Won) => {
            schedule.reset();
            session.next_level()
        }
        _ => Ok(()),
    };

    if let Err(e) = result {
        session.set_message(&format!("Level is broken: {e}"));
    }
    false
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    // Several stones can land in one sweep; one thud is enough.
    let mut grounded = false;
    for event in events {
        match event {
            GameEvent::Gem => sfx.play_gem(),
            GameEvent::Push => sfx.play_push(),
            GameEvent::Ground(_) if !grounded => {
                grounded = true;
                sfx.play_ground();
            }
            GameEvent::Ground(_) => {}
            GameEvent::Won => sfx.play_won(),
            GameEvent::GameOver => sfx.play_gameover(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{MoveDir, Position};
    use crate::sim::pack::LevelDef;
    use crate::sim::schedule::TickKind;
    use test_log::test;

    fn session(texts: &[&str]) -> Session {
        let levels = texts
            .iter()
            .map(|t| LevelDef { name: "t".into(), text: t.to_string() })
            .collect();
        Session::new(levels).unwrap()
    }

    fn schedule() -> TickSchedule {
        TickSchedule::from_speed(&GameConfig::default().speed)
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut s = session(&["####\n#P #\n####"]);
        assert!(handle_action(&mut s, &mut schedule(), Action::Quit));
        assert!(!handle_action(&mut s, &mut schedule(), Action::Pause));
        assert_eq!(s.phase, Phase::Paused);
    }

    #[test]
    fn moves_only_queue_while_playing() {
        let mut s = session(&["####\n#P #\n####"]);
        let mut sch = schedule();
        handle_action(&mut s, &mut sch, Action::Move(MoveDir::Right));
        assert_eq!(s.queued_moves(), 1);
        handle_action(&mut s, &mut sch, Action::Pause);
        handle_action(&mut s, &mut sch, Action::Move(MoveDir::Right));
        assert_eq!(s.queued_moves(), 1);
    }

    #[test]
    fn confirm_after_win_loads_next_level() {
        let mut s = session(&["#####\n#PX #\n#####", "#####\n# P #\n#####"]);
        let mut sch = schedule();
        s.queue_move(MoveDir::Right);
        s.tick(TickKind::Input, None);
        assert_eq!(s.phase, Phase::Won);
        handle_action(&mut s, &mut sch, Action::Confirm);
        assert_eq!(s.current_level(), 1);
        assert_eq!(s.level().player_position, Some(Position::new(2, 1)));
    }

    #[test]
    fn broken_next_level_shows_message() {
        let mut s = session(&["#####\n#PX #\n#####", "#?#"]);
        let mut sch = schedule();
        s.queue_move(MoveDir::Right);
        s.tick(TickKind::Input, None);
        handle_action(&mut s, &mut sch, Action::Confirm);
        assert_eq!(s.phase, Phase::Won);
        assert!(s.message.starts_with("Level is broken"));
    }
}
