//! Keyboard commands for the stage.
//!
//! # Responsibility
//! - Name every stage command and parse key chords such as `Ctrl+S`.
//! - Map chords to commands and route commands to the controller.
//!
//! # Invariants
//! - Dispatch is synchronous.
//! - A command whose precondition fails (no story loaded, page at a
//!   boundary, rejected insert, unsaved outgoing page) is `Ignored` and
//!   leaves state unchanged.

use crate::repo::story_repo::StoryStore;
use crate::stage::clock::Clock;
use crate::stage::controller::{
    InsertOutcome, PageSwitch, StageController, StageError, StageResult,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static CHORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)((?:(?:ctrl|control|alt|option|shift|meta|cmd|super)\s*\+\s*)*)([a-z0-9]+)$")
        .expect("valid chord regex")
});
static MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ctrl|control|alt|option|shift|meta|cmd|super").expect("valid modifier regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    SaveNow,
    TurnNext,
    TurnPrev,
    InsertAfter,
    InsertBefore,
    FocusEditor,
    ToggleAlignment,
    ToggleDetailPanel,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::SaveNow,
        Command::TurnNext,
        Command::TurnPrev,
        Command::InsertAfter,
        Command::InsertBefore,
        Command::FocusEditor,
        Command::ToggleAlignment,
        Command::ToggleDetailPanel,
    ];

    /// Stable logical name used in bindings and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            Self::SaveNow => "save",
            Self::TurnNext => "next-page",
            Self::TurnPrev => "prev-page",
            Self::InsertAfter => "insert-after",
            Self::InsertBefore => "insert-before",
            Self::FocusEditor => "focus",
            Self::ToggleAlignment => "toggle-align",
            Self::ToggleDetailPanel => "toggle-detail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key plus modifiers. The key is stored normalized: single characters
/// uppercase, named keys in their canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordParseError {
    Empty,
    Malformed(String),
    UnknownKey(String),
}

impl Display for ChordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "key chord must not be empty"),
            Self::Malformed(value) => write!(f, "malformed key chord `{value}`"),
            Self::UnknownKey(key) => write!(f, "unknown key `{key}`"),
        }
    }
}

impl Error for ChordParseError {}

const NAMED_KEYS: [&str; 12] = [
    "Enter", "Tab", "Escape", "Space", "Backspace", "Delete", "PageUp", "PageDown", "Home", "End",
    "Up", "Down",
];

impl KeyChord {
    pub fn new(key: &str) -> Result<Self, ChordParseError> {
        Ok(Self {
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
            key: normalize_key(key)?,
        })
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Parses `Ctrl+Shift+Enter`-style text. Modifier names are case
    /// insensitive; `Control`, `Option`, `Cmd` and `Super` are aliases.
    pub fn parse(value: &str) -> Result<Self, ChordParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ChordParseError::Empty);
        }
        let captures = CHORD_RE
            .captures(trimmed)
            .ok_or_else(|| ChordParseError::Malformed(trimmed.to_string()))?;
        let modifiers = captures.get(1).map_or("", |m| m.as_str());
        let key = captures.get(2).map_or("", |m| m.as_str());

        let mut chord = Self::new(key)?;
        for modifier in MODIFIER_RE.find_iter(modifiers) {
            match modifier.as_str().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                _ => chord.meta = true,
            }
        }
        Ok(chord)
    }
}

impl Display for KeyChord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.meta {
            f.write_str("Meta+")?;
        }
        f.write_str(&self.key)
    }
}

fn normalize_key(key: &str) -> Result<String, ChordParseError> {
    let key = key.trim();
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Err(ChordParseError::Empty),
        (Some(c), None) if c.is_ascii_alphanumeric() => Ok(c.to_ascii_uppercase().to_string()),
        _ => NAMED_KEYS
            .iter()
            .find(|named| named.eq_ignore_ascii_case(key))
            .map(|named| (*named).to_string())
            .or_else(|| function_key(key))
            .ok_or_else(|| ChordParseError::UnknownKey(key.to_string())),
    }
}

fn function_key(key: &str) -> Option<String> {
    let digits = key.strip_prefix('F').or_else(|| key.strip_prefix('f'))?;
    let number: u8 = digits.parse().ok()?;
    (1..=12).contains(&number).then(|| format!("F{number}"))
}

/// Chord to command bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    bindings: BTreeMap<KeyChord, Command>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let defaults = [
            ("Ctrl+S", Command::SaveNow),
            ("Alt+PageDown", Command::TurnNext),
            ("Alt+PageUp", Command::TurnPrev),
            ("Ctrl+Enter", Command::InsertAfter),
            ("Ctrl+Shift+Enter", Command::InsertBefore),
            ("Ctrl+E", Command::FocusEditor),
            ("Ctrl+L", Command::ToggleAlignment),
            ("Ctrl+D", Command::ToggleDetailPanel),
        ];
        let mut table = Self::empty();
        for (chord, command) in defaults {
            if let Ok(chord) = KeyChord::parse(chord) {
                table.bind(chord, command);
            }
        }
        table
    }
}

impl CommandTable {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Binds `chord`, returning the command it replaced.
    pub fn bind(&mut self, chord: KeyChord, command: Command) -> Option<Command> {
        self.bindings.insert(chord, command)
    }

    pub fn unbind(&mut self, chord: &KeyChord) -> Option<Command> {
        self.bindings.remove(chord)
    }

    pub fn lookup(&self, chord: &KeyChord) -> Option<Command> {
        self.bindings.get(chord).copied()
    }

    /// Resolves a logical command name such as `next-page`.
    pub fn lookup_name(&self, name: &str) -> Option<Command> {
        Command::from_name(name)
    }

    /// Chords bound to `command`, in chord order.
    pub fn chords_for(&self, command: Command) -> Vec<&KeyChord> {
        self.bindings
            .iter()
            .filter(|(_, bound)| **bound == command)
            .map(|(chord, _)| chord)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Ignored,
}

/// Routes commands and key chords to a stage controller.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    table: CommandTable,
}

impl CommandDispatcher {
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut CommandTable {
        &mut self.table
    }

    /// Runs `command` against `controller`.
    ///
    /// # Errors
    /// Store, codec and navigation failures from the controller. Missing
    /// preconditions are reported as `Ignored`, not as errors.
    pub fn dispatch<S: StoryStore, C: Clock>(
        &self,
        command: Command,
        controller: &mut StageController<S, C>,
    ) -> StageResult<DispatchOutcome> {
        let result = match command {
            Command::SaveNow => controller.save_now().map(|_| DispatchOutcome::Handled),
            Command::TurnNext => controller.turn_next().map(page_switch),
            Command::TurnPrev => controller.turn_prev().map(page_switch),
            Command::InsertAfter => controller.insert_after().map(insert_outcome),
            Command::InsertBefore => controller.insert_before().map(insert_outcome),
            Command::FocusEditor => controller.focus_editor().map(|()| DispatchOutcome::Handled),
            Command::ToggleAlignment => controller
                .toggle_alignment()
                .map(|_| DispatchOutcome::Handled),
            Command::ToggleDetailPanel => controller
                .toggle_detail_panel()
                .map(|_| DispatchOutcome::Handled),
        };

        match result {
            Err(StageError::NoStoryLoaded | StageError::TornDown) => {
                debug!("event=command_dispatch module=commands status=ignored command={command} reason=no_story");
                Ok(DispatchOutcome::Ignored)
            }
            Ok(outcome) => {
                debug!("event=command_dispatch module=commands status={outcome:?} command={command}");
                Ok(outcome)
            }
            Err(err) => Err(err),
        }
    }

    /// Looks up `chord` and dispatches its command; unbound chords are
    /// `Ignored`.
    pub fn dispatch_key<S: StoryStore, C: Clock>(
        &self,
        chord: &KeyChord,
        controller: &mut StageController<S, C>,
    ) -> StageResult<DispatchOutcome> {
        match self.table.lookup(chord) {
            Some(command) => self.dispatch(command, controller),
            None => Ok(DispatchOutcome::Ignored),
        }
    }

    pub fn dispatch_name<S: StoryStore, C: Clock>(
        &self,
        name: &str,
        controller: &mut StageController<S, C>,
    ) -> StageResult<DispatchOutcome> {
        match self.table.lookup_name(name) {
            Some(command) => self.dispatch(command, controller),
            None => Ok(DispatchOutcome::Ignored),
        }
    }
}

fn page_switch(switch: PageSwitch) -> DispatchOutcome {
    match switch {
        PageSwitch::Switched(_) | PageSwitch::Unchanged(_) => DispatchOutcome::Handled,
        PageSwitch::Rejected | PageSwitch::Held { .. } => DispatchOutcome::Ignored,
    }
}

fn insert_outcome(outcome: InsertOutcome) -> DispatchOutcome {
    match outcome {
        InsertOutcome::Created { .. } => DispatchOutcome::Handled,
        InsertOutcome::Rejected => DispatchOutcome::Ignored,
    }
}
