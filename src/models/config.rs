use crate::models::app_state::Direction;
use crate::models::{Connectivity, Position};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems found by [`MazeConfig::validate`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{section} grid must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid {
        section: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("{name} {position} is outside the {rows}x{cols} race grid")]
    StartOutOfBounds {
        name: &'static str,
        position: Position,
        rows: usize,
        cols: usize,
    },

    #[error("Player and AI cannot start on the same cell {0}")]
    SharedStart(Position),

    #[error("{field} ({value}) exceeds the {capacity} blocks the race grid can hold")]
    TooManyBlocks {
        field: &'static str,
        value: usize,
        capacity: usize,
    },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Key binding '{0}' must be a single character")]
    InvalidKey(String),

    #[error("Key '{0}' is read as a number and cannot be bound")]
    NumericKey(String),

    #[error("Key '{0}' is bound more than once")]
    DuplicateKey(String),
}

/// Action bound to a race key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Up,
    Down,
    Left,
    Right,
    Quit,
}

impl KeyAction {
    pub fn direction(self) -> Option<Direction> {
        match self {
            KeyAction::Up => Some(Direction::Up),
            KeyAction::Down => Some(Direction::Down),
            KeyAction::Left => Some(Direction::Left),
            KeyAction::Right => Some(Direction::Right),
            KeyAction::Quit => None,
        }
    }
}

/// Configuration loaded from `mazerace.yaml`
///
/// Every section and field is optional in the file; missing values fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MazeConfig {
    #[serde(default)]
    pub solver: SolverSettings,

    #[serde(default)]
    pub race: RaceSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub rows: usize,
    pub cols: usize,
    pub connectivity: Connectivity,
    /// Pause between visualized search steps
    pub step_delay_ms: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 5,
            connectivity: Connectivity::Eight,
            step_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSettings {
    #[serde(default = "default_race_rows")]
    pub rows: usize,

    #[serde(default = "default_race_cols")]
    pub cols: usize,

    #[serde(default = "default_player_start")]
    pub player_start: Position,

    #[serde(default = "default_ai_start")]
    pub ai_start: Position,

    #[serde(default = "default_initial_blocks")]
    pub initial_blocks: usize,

    #[serde(default = "default_max_blocks")]
    pub max_blocks: usize,

    /// Time between AI moves
    #[serde(default = "default_ai_interval_ms")]
    pub ai_interval_ms: u64,

    /// Resolution of the event-loop timer
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Layouts tried per block count before the generator reduces it
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    #[serde(default = "default_race_connectivity")]
    pub connectivity: Connectivity,

    /// Single-character key bindings, in display order
    #[serde(default = "default_keys")]
    pub keys: IndexMap<String, KeyAction>,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            rows: default_race_rows(),
            cols: default_race_cols(),
            player_start: default_player_start(),
            ai_start: default_ai_start(),
            initial_blocks: default_initial_blocks(),
            max_blocks: default_max_blocks(),
            ai_interval_ms: default_ai_interval_ms(),
            tick_ms: default_tick_ms(),
            generation_attempts: default_generation_attempts(),
            connectivity: default_race_connectivity(),
            keys: default_keys(),
        }
    }
}

impl RaceSettings {
    /// Most blocks that still leave room for both starts and a goal
    pub fn block_capacity(&self) -> usize {
        (self.rows * self.cols).saturating_sub(3)
    }

    /// First key bound to `action`, for help text
    pub fn key_for(&self, action: KeyAction) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, a)| **a == action)
            .map(|(k, _)| k.as_str())
    }
}

fn default_race_rows() -> usize {
    10
}

fn default_race_cols() -> usize {
    15
}

fn default_player_start() -> Position {
    Position::new(0, 0)
}

fn default_ai_start() -> Position {
    Position::new(default_race_rows() - 1, 0)
}

fn default_initial_blocks() -> usize {
    10
}

fn default_max_blocks() -> usize {
    default_race_rows() * default_race_cols() / 2
}

fn default_ai_interval_ms() -> u64 {
    500
}

fn default_tick_ms() -> u64 {
    100
}

fn default_generation_attempts() -> u32 {
    crate::services::DEFAULT_ATTEMPTS_PER_COUNT
}

fn default_race_connectivity() -> Connectivity {
    Connectivity::Four
}

fn default_keys() -> IndexMap<String, KeyAction> {
    IndexMap::from([
        ("w".to_string(), KeyAction::Up),
        ("a".to_string(), KeyAction::Left),
        ("s".to_string(), KeyAction::Down),
        ("d".to_string(), KeyAction::Right),
        ("q".to_string(), KeyAction::Quit),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Relative paths resolve against the config directory
    pub log_dir: String,
    pub debug_mode: bool,
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            debug_mode: false,
            console: true,
        }
    }
}

impl MazeConfig {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let solver = &self.solver;
        if solver.rows == 0 || solver.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                section: "solver",
                rows: solver.rows,
                cols: solver.cols,
            });
        }

        let race = &self.race;
        if race.rows == 0 || race.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                section: "race",
                rows: race.rows,
                cols: race.cols,
            });
        }

        for (name, position) in [("player_start", race.player_start), ("ai_start", race.ai_start)] {
            if position.row >= race.rows || position.col >= race.cols {
                return Err(ConfigError::StartOutOfBounds {
                    name,
                    position,
                    rows: race.rows,
                    cols: race.cols,
                });
            }
        }
        if race.player_start == race.ai_start {
            return Err(ConfigError::SharedStart(race.player_start));
        }

        let capacity = race.block_capacity();
        for (field, value) in [
            ("max_blocks", race.max_blocks),
            ("initial_blocks", race.initial_blocks),
        ] {
            if value > capacity {
                return Err(ConfigError::TooManyBlocks {
                    field,
                    value,
                    capacity,
                });
            }
        }

        if race.ai_interval_ms == 0 {
            return Err(ConfigError::ZeroValue("race.ai_interval_ms"));
        }
        if race.tick_ms == 0 {
            return Err(ConfigError::ZeroValue("race.tick_ms"));
        }
        if race.generation_attempts == 0 {
            return Err(ConfigError::ZeroValue("race.generation_attempts"));
        }

        let mut seen = IndexMap::new();
        for (key, action) in &race.keys {
            let mut chars = key.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(ConfigError::InvalidKey(key.clone()));
            };
            if c.is_ascii_digit() {
                return Err(ConfigError::NumericKey(key.clone()));
            }
            if seen.insert(key.to_lowercase(), *action).is_some() {
                return Err(ConfigError::DuplicateKey(key.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MazeConfig::default();
        assert_eq!(config.race.max_blocks, 75);
        assert_eq!(config.race.ai_start, Position::new(9, 0));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "race:\n  initial_blocks: 20\n  keys:\n    i: up\n    k: down\n";
        let config: MazeConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.race.initial_blocks, 20);
        assert_eq!(config.race.rows, 10);
        assert_eq!(config.solver, SolverSettings::default());
        assert_eq!(config.race.keys.get("i"), Some(&KeyAction::Up));
        assert_eq!(config.race.key_for(KeyAction::Down), Some("k"));
        assert!(!config.race.keys.contains_key("w"));
    }

    #[test]
    fn test_key_order_preserved() {
        let config = MazeConfig::default();
        let keys: Vec<&str> = config.race.keys.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["w", "a", "s", "d", "q"]);
    }

    #[test]
    fn test_key_for_action() {
        let race = RaceSettings::default();
        assert_eq!(race.key_for(KeyAction::Quit), Some("q"));
        assert_eq!(KeyAction::Quit.direction(), None);
        assert_eq!(KeyAction::Left.direction(), Some(Direction::Left));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MazeConfig::default();
        config.race.ai_start = config.race.player_start;
        assert!(matches!(config.validate(), Err(ConfigError::SharedStart(_))));

        let mut config = MazeConfig::default();
        config.race.max_blocks = 148;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyBlocks { capacity: 147, .. })
        ));

        let mut config = MazeConfig::default();
        config.race.ai_start = Position::new(10, 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StartOutOfBounds { .. })
        ));

        let mut config = MazeConfig::default();
        config.solver.rows = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyGrid { .. })));

        let mut config = MazeConfig::default();
        config.race.tick_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroValue("race.tick_ms"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        let mut config = MazeConfig::default();
        config.race.keys.insert("up".to_string(), KeyAction::Up);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidKey("up".to_string()))
        );

        let mut config = MazeConfig::default();
        config.race.keys.insert("5".to_string(), KeyAction::Right);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NumericKey("5".to_string()))
        );

        let mut config = MazeConfig::default();
        config.race.keys.insert("W".to_string(), KeyAction::Down);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateKey("W".to_string()))
        );
    }
}
