//! Migration definition

use std::fmt;

/// Which half of a migration pair a script is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptDirection {
    /// Forward script (`<id>.up.sql`)
    Up,
    /// Backward script (`<id>.down.sql`)
    Down,
}

impl ScriptDirection {
    /// File name suffix for this direction
    pub fn suffix(self) -> &'static str {
        match self {
            ScriptDirection::Up => ".up.sql",
            ScriptDirection::Down => ".down.sql",
        }
    }
}

impl fmt::Display for ScriptDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptDirection::Up => f.write_str("up"),
            ScriptDirection::Down => f.write_str("down"),
        }
    }
}

/// A complete migration: both scripts for one id
///
/// `id` defines the total order of migrations. By convention it starts with a
/// millisecond timestamp followed by a label, e.g. `1700000000000_create_users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDefinition {
    pub id: String,
    pub up_script: String,
    pub down_script: String,
}

impl MigrationDefinition {
    pub fn new(
        id: impl Into<String>,
        up_script: impl Into<String>,
        down_script: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            up_script: up_script.into(),
            down_script: down_script.into(),
        }
    }

    /// Script for `direction`
    pub fn script(&self, direction: ScriptDirection) -> &str {
        match direction {
            ScriptDirection::Up => &self.up_script,
            ScriptDirection::Down => &self.down_script,
        }
    }
}
