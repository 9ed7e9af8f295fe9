/// Level sources.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by file name)
///   2. Built-in embedded levels
///
/// ## Level file format (`.txt`):
///   Optional line 1: `# Level Name`
///   Remaining lines: map rows (see `Level::parse` for the legend)
///
/// A directory that yields no usable level falls back to the embedded set,
/// so the game always has something to play.

use std::path::Path;

/// Runtime level data (owned strings, loaded from file or embedded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelDef {
    pub name: String,
    pub text: String,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// All playable levels: the directory's, or the built-in set.
pub fn load_levels(levels_dir: &Path) -> Vec<LevelDef> {
    let from_dir = load_from_directory(levels_dir);
    if !from_dir.is_empty() {
        log::info!("loaded {} levels from {}", from_dir.len(), levels_dir.display());
        return from_dir;
    }
    log::info!("no levels in {}, using built-in levels", levels_dir.display());
    embedded_levels()
}

/// Parse a level file. The name line is optional; `fallback_name` is
/// used when it is missing. Returns `None` when no map rows remain.
pub fn parse_level_file(content: &str, fallback_name: &str) -> Option<LevelDef> {
    let mut lines = content.lines().peekable();
    let mut name = String::new();

    if let Some(first) = lines.peek() {
        if is_name_line(first) {
            name = first.trim()[1..].trim().to_string();
            lines.next();
        }
    }

    let mut rows: Vec<&str> = lines.collect();
    while rows.last().map_or(false, |r| r.trim().is_empty()) {
        rows.pop();
    }
    while rows.first().map_or(false, |r| r.trim().is_empty()) {
        rows.remove(0);
    }
    if rows.is_empty() {
        return None;
    }

    if name.is_empty() {
        name = fallback_name.to_string();
    }

    Some(LevelDef { name, text: rows.join("\n") })
}

/// Distinguish `# Level Name` from `##########` (a wall row).
/// A name line starts with `#` and contains at least one letter.
fn is_name_line(line: &str) -> bool {
    match line.trim().strip_prefix('#') {
        Some(rest) => rest.chars().any(|c| c.is_alphabetic()),
        None => false,
    }
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::debug!("levels dir {} not readable: {e}", dir.display());
            return vec![];
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort();

    let mut results = vec![];
    for path in paths {
        let stem = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        match std::fs::read_to_string(&path) {
            Ok(content) => match parse_level_file(&content, &stem) {
                Some(def) => results.push(def),
                None => log::warn!("{} has no map rows, skipped", path.display()),
            },
            Err(e) => log::warn!("could not read {}: {e}", path.display()),
        }
    }
    results
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

pub fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded("First Dig", &[
            "####################",
            "#P....o...$.....o..#",
            "#.....o...$.....o..#",
            "#..$.......ooo.....#",
            "#.....###.....$....#",
            "#..o..#$#..o.......#",
            "#.....#.#.....G    #",
            "#..$.........o....X#",
            "####################",
        ]),
        make_embedded("Rockslide", &[
            "##########################",
            "#P.....oooooooooo.......$#",
            "#......$$$$$$$$$$........#",
            "#........................#",
            "#####.###########.########",
            "#.........o..o.....o.....#",
            "#..$.o.....$..$.....o..$.#",
            "#....................... #",
            "#.o...#####..G  ######...#",
            "#.$...#   #.....#   #..X.#",
            "##########################",
        ]),
        make_embedded("Haunted Vault", &[
            "######################",
            "#P.........#.......o.#",
            "#.o.o.o.o..#..$.$..o.#",
            "#..........#.........#",
            "#.######...#...####..#",
            "#.#G   #.......#$ #..#",
            "#.#    #...o...#  #..#",
            "#.######.......####..#",
            "#..$......o.o......$X#",
            "######################",
        ]),
    ]
}

fn make_embedded(name: &str, map: &[&str]) -> LevelDef {
    LevelDef {
        name: name.to_string(),
        text: map.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::Field;
    use crate::sim::level::Level;
    use std::path::PathBuf;
    use test_log::test;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("boulders-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn embedded_levels_are_playable() {
        for def in embedded_levels() {
            let level = Level::parse(&def.text).unwrap();
            let dims = level.dimensions();
            assert!(level.player_position.is_some(), "{} has no player", def.name);
            assert!(level.num_gems() > 0, "{} has no gems", def.name);
            let exits = (0..dims.height as i32)
                .flat_map(|y| (0..dims.width as i32).map(move |x| (x, y)))
                .filter(|&(x, y)| level.get_field(x, y) == Field::Exit)
                .count();
            assert_eq!(exits, 1, "{}", def.name);
            for line in def.text.lines() {
                assert_eq!(line.len(), dims.width, "{} is ragged", def.name);
            }
        }
    }

    #[test]
    fn name_line_is_optional() {
        let named = parse_level_file("# Cave In\n###\n#P#\n###\n", "file").unwrap();
        assert_eq!(named.name, "Cave In");
        assert_eq!(named.text, "###\n#P#\n###");

        let unnamed = parse_level_file("###\n#P#\n###", "file").unwrap();
        assert_eq!(unnamed.name, "file");
        assert_eq!(unnamed.text, "###\n#P#\n###");
    }

    #[test]
    fn wall_row_is_not_a_name() {
        assert!(!is_name_line("#######"));
        assert!(!is_name_line("#..o.$#"));
        assert!(is_name_line("# Level 3"));
        assert!(is_name_line("  #Rockslide"));
    }

    #[test]
    fn name_only_file_is_rejected() {
        assert_eq!(parse_level_file("# Nothing here\n\n\n", "x"), None);
        assert_eq!(parse_level_file("", "x"), None);
    }

    #[test]
    fn directory_levels_sorted_by_file_name() {
        let dir = scratch_dir("sorted");
        std::fs::write(dir.join("02-b.txt"), "# Second\n###\n#P#\n###").unwrap();
        std::fs::write(dir.join("01-a.txt"), "###\n#P#\n###").unwrap();
        std::fs::write(dir.join("notes.md"), "# Not a level\n###").unwrap();
        std::fs::write(dir.join("03-empty.txt"), "# Empty\n").unwrap();

        let levels = load_levels(&dir);
        let names: Vec<_> = levels.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["01-a", "Second"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_falls_back_to_embedded() {
        let dir = std::env::temp_dir().join("boulders-does-not-exist-7f3a");
        assert_eq!(load_levels(&dir), embedded_levels());
    }
}
