//! Console icons shared by the commands.

use console::{style, StyledObject};

/// Green check mark.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Cyan arrow for progress lines.
pub fn info() -> StyledObject<&'static str> {
    style("→").cyan()
}

/// Yellow exclamation mark.
pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

/// Red cross.
pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

/// Dim arrow for secondary detail lines.
pub fn dim_arrow() -> StyledObject<&'static str> {
    style("→").dim()
}
