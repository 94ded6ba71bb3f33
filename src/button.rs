//! Button tokens
//!
//! Every inline button carries a short token that the router decodes back
//! into a [`ButtonToken`]. Grammar:
//!
//! ```text
//! token   := fixed | <prefix><action>_<argument>
//! prefix  := "bp" | "ex"
//! action  := "page" | "item"
//! fixed   := "choose_exercise" | "create_exercise" | "back" | "stop"
//!          | "confirm_yes" | "confirm_no"
//! ```
//!
//! Page arguments are zero-based page indexes, item arguments are entity ids,
//! both in plain decimal with no sign or leading zeros (`-` allowed for ids).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which catalog a paged menu lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    BodyPart,
    Exercise,
}

impl Domain {
    fn prefix(self) -> &'static str {
        match self {
            Domain::BodyPart => "bp",
            Domain::Exercise => "ex",
        }
    }
}

/// Decoded button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonToken {
    /// Navigate to a page of a catalog menu
    Page { domain: Domain, page: usize },
    /// Select a catalog entry by id
    Item { domain: Domain, id: i64 },
    ChooseExercise,
    CreateExercise,
    Back,
    Stop,
    ConfirmYes,
    ConfirmNo,
}

const CHOOSE_EXERCISE: &str = "choose_exercise";
const CREATE_EXERCISE: &str = "create_exercise";
const BACK: &str = "back";
const STOP: &str = "stop";
const CONFIRM_YES: &str = "confirm_yes";
const CONFIRM_NO: &str = "confirm_no";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("unknown button token: {0}")]
    Unknown(String),
    #[error("button token {0} has no argument")]
    MissingArgument(String),
    #[error("button token {token} has invalid argument {argument:?}")]
    BadArgument { token: String, argument: String },
}

impl ButtonToken {
    pub fn encode(&self) -> String {
        match self {
            ButtonToken::Page { domain, page } => format!("{}page_{page}", domain.prefix()),
            ButtonToken::Item { domain, id } => format!("{}item_{id}", domain.prefix()),
            ButtonToken::ChooseExercise => CHOOSE_EXERCISE.to_string(),
            ButtonToken::CreateExercise => CREATE_EXERCISE.to_string(),
            ButtonToken::Back => BACK.to_string(),
            ButtonToken::Stop => STOP.to_string(),
            ButtonToken::ConfirmYes => CONFIRM_YES.to_string(),
            ButtonToken::ConfirmNo => CONFIRM_NO.to_string(),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        match raw {
            CHOOSE_EXERCISE => return Ok(ButtonToken::ChooseExercise),
            CREATE_EXERCISE => return Ok(ButtonToken::CreateExercise),
            BACK => return Ok(ButtonToken::Back),
            STOP => return Ok(ButtonToken::Stop),
            CONFIRM_YES => return Ok(ButtonToken::ConfirmYes),
            CONFIRM_NO => return Ok(ButtonToken::ConfirmNo),
            _ => {}
        }

        let (domain, rest) = if let Some(rest) = raw.strip_prefix("bp") {
            (Domain::BodyPart, rest)
        } else if let Some(rest) = raw.strip_prefix("ex") {
            (Domain::Exercise, rest)
        } else {
            return Err(TokenError::Unknown(raw.to_string()));
        };

        let (action, argument) = rest
            .split_once('_')
            .ok_or_else(|| match rest {
                "page" | "item" => TokenError::MissingArgument(raw.to_string()),
                _ => TokenError::Unknown(raw.to_string()),
            })?;

        let bad_argument = || TokenError::BadArgument {
            token: raw.to_string(),
            argument: argument.to_string(),
        };

        match action {
            "page" => {
                let page = canonical::<usize>(argument).ok_or_else(bad_argument)?;
                Ok(ButtonToken::Page { domain, page })
            }
            "item" => {
                let id = canonical::<i64>(argument).ok_or_else(bad_argument)?;
                Ok(ButtonToken::Item { domain, id })
            }
            _ => Err(TokenError::Unknown(raw.to_string())),
        }
    }
}

/// Parse a number only in the exact form `encode` writes it
fn canonical<T: FromStr + ToString>(argument: &str) -> Option<T> {
    argument
        .parse::<T>()
        .ok()
        .filter(|value| value.to_string() == argument)
}

impl fmt::Display for ButtonToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A rendered inline button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, token: ButtonToken) -> Self {
        Self {
            text: text.into(),
            data: token.encode(),
        }
    }

    /// Decode the token carried by this button
    #[allow(dead_code)] // Used by transport adapters and tests
    pub fn token(&self) -> Result<ButtonToken, TokenError> {
        ButtonToken::decode(&self.data)
    }
}

/// Rows of buttons
pub type Keyboard = Vec<Vec<Button>>;
