// Terminal input parsing
//
// One line of input becomes zero or more AppMessages. Parsing depends on the
// running demo: the race maps single-character keys through the configured
// bindings, the solver understands cell coordinates.

use crate::models::{Direction, KeyAction, Position};
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

/// Messages handled by [`GameController`](crate::ui::controller::GameController)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppMessage {
    /// Solver: start configuring a new maze
    BeginSetup,
    /// Solver: click on a cell
    SelectCell(Position),
    /// Answer to the open count dialog; `None` means cancelled
    DialogAnswer(Option<i64>),
    /// Solver: run the visualized search
    Solve,
    /// Solver: wipe the board
    Clear,
    /// Race: the Return key
    Return,
    /// Race: a movement key
    Move(Direction),
    /// Race: open the block-count dialog
    OpenConfiguration,
    /// Race: open the dialog and answer it in one go
    ConfigureBlocks(i64),
    /// Timer tick from the event loop
    Tick,
    Help,
    Quit,
    /// A line that could not be parsed
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Unrecognized command: '{0}'")]
    Unrecognized(String),

    #[error("Number out of range: '{0}'")]
    NumberOutOfRange(String),
}

/// Which command set the parser accepts
#[derive(Clone, Debug)]
enum Mode {
    Solver,
    Race { keys: IndexMap<char, KeyAction> },
}

/// Line parser for the terminal front end
#[derive(Clone, Debug)]
pub struct InputParser {
    mode: Mode,
    cell_re: Regex,
    number_re: Regex,
    blocks_re: Regex,
}

impl InputParser {
    fn with_mode(mode: Mode) -> Result<Self, regex::Error> {
        Ok(Self {
            mode,
            cell_re: Regex::new(r"^(?:click\s+)?(\d+)\s*[,\s]\s*(\d+)$")?,
            number_re: Regex::new(r"^(-?\d+)$")?,
            blocks_re: Regex::new(r"^blocks?(?:\s+(-?\d+))?$")?,
        })
    }

    /// Parser for the solver demo
    pub fn solver() -> Result<Self, regex::Error> {
        Self::with_mode(Mode::Solver)
    }

    /// Parser for the race demo with the given key bindings.
    ///
    /// Keys are matched case-insensitively; bindings longer than one
    /// character are skipped.
    pub fn race(keys: &IndexMap<String, KeyAction>) -> Result<Self, regex::Error> {
        let keys = keys
            .iter()
            .filter_map(|(key, action)| {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some((c.to_ascii_lowercase(), *action)),
                    _ => {
                        tracing::warn!("Ignoring key binding '{}': not a single character", key);
                        None
                    }
                }
            })
            .collect();
        Self::with_mode(Mode::Race { keys })
    }

    /// Parse one line of input.
    ///
    /// Empty lines are Return in the race and nothing in the solver. A race
    /// line made only of bound keys yields one message per key, so `ddd`
    /// moves three times.
    pub fn parse(&self, line: &str) -> Result<Vec<AppMessage>, InputError> {
        let line = line.trim().to_lowercase();

        match line.as_str() {
            "quit" | "exit" => return Ok(vec![AppMessage::Quit]),
            "help" | "?" => return Ok(vec![AppMessage::Help]),
            "cancel" => return Ok(vec![AppMessage::DialogAnswer(None)]),
            _ => {}
        }

        if let Some(caps) = self.number_re.captures(&line) {
            let value = Self::parse_number(&caps[1])?;
            return Ok(vec![AppMessage::DialogAnswer(Some(value))]);
        }

        match &self.mode {
            Mode::Solver => self.parse_solver(&line),
            Mode::Race { keys } => self.parse_race(&line, keys),
        }
    }

    fn parse_solver(&self, line: &str) -> Result<Vec<AppMessage>, InputError> {
        let message = match line {
            "" => return Ok(Vec::new()),
            "setup" | "configure" => AppMessage::BeginSetup,
            "solve" => AppMessage::Solve,
            "clear" => AppMessage::Clear,
            _ => {
                let caps = self
                    .cell_re
                    .captures(line)
                    .ok_or_else(|| InputError::Unrecognized(line.to_string()))?;
                let row = caps[1]
                    .parse()
                    .map_err(|_| InputError::NumberOutOfRange(caps[1].to_string()))?;
                let col = caps[2]
                    .parse()
                    .map_err(|_| InputError::NumberOutOfRange(caps[2].to_string()))?;
                AppMessage::SelectCell(Position::new(row, col))
            }
        };
        Ok(vec![message])
    }

    fn parse_race(
        &self,
        line: &str,
        keys: &IndexMap<char, KeyAction>,
    ) -> Result<Vec<AppMessage>, InputError> {
        if line.is_empty() {
            return Ok(vec![AppMessage::Return]);
        }

        if let Some(caps) = self.blocks_re.captures(line) {
            return Ok(vec![match caps.get(1) {
                Some(value) => AppMessage::ConfigureBlocks(Self::parse_number(value.as_str())?),
                None => AppMessage::OpenConfiguration,
            }]);
        }

        line.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match keys.get(&c) {
                Some(KeyAction::Quit) => Ok(AppMessage::Quit),
                Some(action) => action
                    .direction()
                    .map(AppMessage::Move)
                    .ok_or_else(|| InputError::Unrecognized(line.to_string())),
                None => Err(InputError::Unrecognized(line.to_string())),
            })
            .collect()
    }

    fn parse_number(text: &str) -> Result<i64, InputError> {
        text.parse()
            .map_err(|_| InputError::NumberOutOfRange(text.to_string()))
    }

    /// Parse a line, turning errors into [`AppMessage::Invalid`]
    pub fn parse_or_invalid(&self, line: &str) -> Vec<AppMessage> {
        self.parse(line).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            vec![AppMessage::Invalid(e.to_string())]
        })
    }
}
