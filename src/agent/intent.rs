//! Slash-command intent parsing
//!
//! Input starting with `/` names a flow explicitly; everything else is chat.

use crate::{Error, Result};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Ordinary conversation turn
    Chat(String),
    /// Search-grounded answer
    Search(String),
    /// Image generation
    Imagine(String),
    /// Capture a camera frame and ask about it
    Look(String),
}

impl Intent {
    /// Parse raw user input
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an unrecognised `/command`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Self::Chat(input.to_string()));
        };

        let (command, argument) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(c, a)| (c, a.trim()));
        let argument = argument.to_string();

        match command.to_ascii_lowercase().as_str() {
            "imagine" => Ok(Self::Imagine(argument)),
            "search" => Ok(Self::Search(argument)),
            "look" | "vision" => Ok(Self::Look(argument)),
            other => Err(Error::InvalidInput(format!(
                "unknown command /{other}; try /imagine, /search or /look"
            ))),
        }
    }
}
