//! Worker configuration built from environment variables

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

const SRC_HOST: &str = "SRC_HOST";
const SRC_USER: &str = "SRC_USER";
const SRC_PASSWORD: &str = "SRC_PASSWORD";
const DEST_HOST: &str = "DEST_HOST";
const DEST_USER: &str = "DEST_USER";
const DEST_PASSWORD: &str = "DEST_PASSWORD";

/// Variables that must be set and non-empty, in the order they are checked.
const REQUIRED: [&str; 6] = [
    SRC_HOST,
    SRC_USER,
    SRC_PASSWORD,
    DEST_HOST,
    DEST_USER,
    DEST_PASSWORD,
];

const DEFAULT_SLEEP_SECONDS: u64 = 300;
const DEFAULT_SLEEP_VAR_PCT: u8 = 50;
const DEFAULT_MAILBOX: &str = "INBOX";

/// Complete configuration handed to the mail-sync worker.
///
/// Field names and nesting are the worker's file format; see
/// [`crate::persist`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub common: Common,
    pub src_imap: SourceMailbox,
    pub dest_imap: DestMailbox,
}

/// Settings shared by both sides of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Common {
    pub debug: bool,
    /// Seconds between synchronization cycles.
    pub sleep: u64,
    /// Jitter applied to `sleep`, in percent.
    pub sleep_var_pct: u8,
}

/// Mailbox messages are copied from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMailbox {
    pub host: String,
    pub ssl: bool,
    pub user: String,
    pub password: String,
    pub mailbox: String,
    pub on_success: OnSuccess,
}

/// What the worker does with a source message once it has been copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnSuccess {
    pub delete_msg: bool,
    /// `None` leaves the message where it is.
    pub move_to_mailbox: Option<String>,
    pub mark_as_seen: bool,
}

/// Mailbox messages are copied into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestMailbox {
    pub host: String,
    pub ssl: bool,
    pub user: String,
    pub password: String,
    pub mailbox: String,
}

impl SyncConfig {
    /// Build the configuration from the process environment
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `SRC_HOST`, `SRC_USER`, `SRC_PASSWORD`
    /// - `DEST_HOST`, `DEST_USER`, `DEST_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `DEBUG` (default: `false`)
    /// - `SLEEP_SECONDS` (default: `300`)
    /// - `SLEEP_VAR_PCT` (default: `50`)
    /// - `SRC_SSL`, `DEST_SSL` (default: `true`)
    /// - `SRC_MAILBOX`, `DEST_MAILBOX` (default: `INBOX`; an empty value is kept)
    /// - `ON_SUCCESS_DELETE` (default: `false`)
    /// - `ON_SUCCESS_MOVE_TO` (default: unset)
    /// - `ON_SUCCESS_MARK_SEEN` (default: `true`)
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// `lookup` returns the raw value of a variable, or `None` if it is
    /// not set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRequiredInput`] naming the first required
    /// variable that is unset or empty, and [`Error::MalformedInput`]
    /// when `SLEEP_SECONDS` or `SLEEP_VAR_PCT` is not a valid number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        for key in REQUIRED {
            vars.required(key)?;
        }

        Ok(Self {
            common: Common {
                debug: vars.flag("DEBUG", false),
                sleep: vars.sleep()?,
                sleep_var_pct: vars.sleep_var_pct()?,
            },
            src_imap: SourceMailbox {
                host: vars.required(SRC_HOST)?,
                ssl: vars.flag("SRC_SSL", true),
                user: vars.required(SRC_USER)?,
                password: vars.required(SRC_PASSWORD)?,
                mailbox: vars.mailbox("SRC_MAILBOX"),
                on_success: OnSuccess {
                    delete_msg: vars.flag("ON_SUCCESS_DELETE", false),
                    move_to_mailbox: vars.non_empty("ON_SUCCESS_MOVE_TO"),
                    mark_as_seen: vars.flag("ON_SUCCESS_MARK_SEEN", true),
                },
            },
            dest_imap: DestMailbox {
                host: vars.required(DEST_HOST)?,
                ssl: vars.flag("DEST_SSL", true),
                user: vars.required(DEST_USER)?,
                password: vars.required(DEST_PASSWORD)?,
                mailbox: vars.mailbox("DEST_MAILBOX"),
            },
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String> {
        self.non_empty(key).ok_or(Error::MissingRequiredInput(key))
    }

    /// Only a case-insensitive `"true"` counts as true; anything else
    /// that is set, including an empty string, is false.
    fn flag(&self, key: &str, default: bool) -> bool {
        (self.0)(key).map_or(default, |value| value.eq_ignore_ascii_case("true"))
    }

    fn mailbox(&self, key: &str) -> String {
        (self.0)(key).unwrap_or_else(|| DEFAULT_MAILBOX.to_string())
    }

    fn sleep(&self) -> Result<u64> {
        const KEY: &str = "SLEEP_SECONDS";
        let Some(raw) = (self.0)(KEY) else {
            return Ok(DEFAULT_SLEEP_SECONDS);
        };
        match raw.trim().parse::<u64>() {
            Ok(0) => Err(malformed(KEY, raw, "must be greater than zero")),
            Ok(seconds) => Ok(seconds),
            Err(e) => Err(malformed(KEY, raw, e)),
        }
    }

    fn sleep_var_pct(&self) -> Result<u8> {
        const KEY: &str = "SLEEP_VAR_PCT";
        let Some(raw) = (self.0)(KEY) else {
            return Ok(DEFAULT_SLEEP_VAR_PCT);
        };
        match raw.trim().parse::<u8>() {
            Ok(pct) if pct <= 100 => Ok(pct),
            Ok(_) => Err(malformed(KEY, raw, "must be between 0 and 100")),
            Err(e) => Err(malformed(KEY, raw, e)),
        }
    }
}

fn malformed(key: &'static str, value: String, reason: impl ToString) -> Error {
    Error::MalformedInput {
        key,
        value,
        reason: reason.to_string(),
    }
}
