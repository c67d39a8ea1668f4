//! Writer configuration.
//!
//! Options live in [`WriterOptions`], a plain struct with typed fields.
//! They can also be set by name through [`WriterOptions::set`], which
//! type-checks a JSON value, or read from `HALITE_*` environment variables
//! through [`WriterOptions::from_env`].
//!
//! | Option | Variable | Default |
//! |--------|----------|---------|
//! | `write_nulls` | `HALITE_WRITE_NULLS` | `false` |
//! | `close_on_finish` | `HALITE_CLOSE_ON_FINISH` | `true` for an owned sink, `false` for a borrowed generator |
//! | `write_empty_embedded` | `HALITE_WRITE_EMPTY_EMBEDDED` | `false` |
//! | `write_empty_links` | `HALITE_WRITE_EMPTY_LINKS` | `true` |
//! | `escape_non_ascii` | `HALITE_ESCAPE_NON_ASCII` | `false` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned when configuring a writer by option name.
#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    #[error("value {value} is incompatible with the option {option}")]
    IncompatibleOption { option: HalOption, value: Value },

    #[error(
        "unknown writer option {0:?}; expected one of: write_nulls, close_on_finish, \
         write_empty_embedded, write_empty_links, escape_non_ascii"
    )]
    UnknownOption(String),
}

/// Names of the writer options. Every option is a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalOption {
    /// Write absent values as `null` instead of omitting them.
    WriteNulls,
    /// Close the sink after each top-level write instead of only flushing it.
    CloseOnFinish,
    /// Write `"_embedded": {}` for resources without embedded resources.
    WriteEmptyEmbedded,
    /// Write `"_links": {}` for resources without links.
    WriteEmptyLinks,
    /// Escape every non-ASCII character as `\uXXXX`.
    EscapeNonAscii,
}

impl HalOption {
    pub const ALL: [HalOption; 5] = [
        HalOption::WriteNulls,
        HalOption::CloseOnFinish,
        HalOption::WriteEmptyEmbedded,
        HalOption::WriteEmptyLinks,
        HalOption::EscapeNonAscii,
    ];

    /// The snake_case name of the option (e.g. `"write_nulls"`).
    pub fn name(self) -> &'static str {
        match self {
            HalOption::WriteNulls => "write_nulls",
            HalOption::CloseOnFinish => "close_on_finish",
            HalOption::WriteEmptyEmbedded => "write_empty_embedded",
            HalOption::WriteEmptyLinks => "write_empty_links",
            HalOption::EscapeNonAscii => "escape_non_ascii",
        }
    }

    /// The environment variable read by [`WriterOptions::from_env`].
    pub fn env_var(self) -> String {
        format!("HALITE_{}", self.name().to_ascii_uppercase())
    }
}

impl fmt::Display for HalOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HalOption {
    type Err = OptionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HalOption::ALL
            .into_iter()
            .find(|option| option.name() == s)
            .ok_or_else(|| OptionError::UnknownOption(s.to_string()))
    }
}

/// Rendering options of a [`HalWriter`](crate::HalWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub write_nulls: bool,
    pub close_on_finish: bool,
    pub write_empty_embedded: bool,
    /// Emits an empty `_links` object by default. One of the two historical
    /// writers omitted it; this default follows the later one.
    pub write_empty_links: bool,
    pub escape_non_ascii: bool,
}

impl Default for WriterOptions {
    /// Defaults for a writer that owns its sink.
    fn default() -> Self {
        Self {
            write_nulls: false,
            close_on_finish: true,
            write_empty_embedded: false,
            write_empty_links: true,
            escape_non_ascii: false,
        }
    }
}

impl WriterOptions {
    /// Read the option value.
    pub fn get(&self, option: HalOption) -> bool {
        match option {
            HalOption::WriteNulls => self.write_nulls,
            HalOption::CloseOnFinish => self.close_on_finish,
            HalOption::WriteEmptyEmbedded => self.write_empty_embedded,
            HalOption::WriteEmptyLinks => self.write_empty_links,
            HalOption::EscapeNonAscii => self.escape_non_ascii,
        }
    }

    /// Set an option from a JSON value.
    ///
    /// # Errors
    ///
    /// [`OptionError::IncompatibleOption`] if `value` is not a JSON boolean.
    /// The options are left unchanged in that case.
    pub fn set(&mut self, option: HalOption, value: &Value) -> Result<(), OptionError> {
        let flag = value.as_bool().ok_or_else(|| OptionError::IncompatibleOption {
            option,
            value: value.clone(),
        })?;
        let slot = match option {
            HalOption::WriteNulls => &mut self.write_nulls,
            HalOption::CloseOnFinish => &mut self.close_on_finish,
            HalOption::WriteEmptyEmbedded => &mut self.write_empty_embedded,
            HalOption::WriteEmptyLinks => &mut self.write_empty_links,
            HalOption::EscapeNonAscii => &mut self.escape_non_ascii,
        };
        *slot = flag;
        Ok(())
    }

    /// Set an option by its snake_case name.
    pub fn set_named(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        self.set(name.parse()?, value)
    }

    /// Defaults overridden by the `HALITE_*` environment variables.
    ///
    /// A variable must hold JSON `true` or `false`; any other value is an
    /// [`OptionError::IncompatibleOption`].
    pub fn from_env() -> Result<Self, OptionError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OptionError> {
        let mut options = Self::default();
        for option in HalOption::ALL {
            let Some(raw) = lookup(&option.env_var()) else {
                continue;
            };
            let value = serde_json::from_str::<Value>(raw.trim())
                .unwrap_or_else(|_| Value::String(raw.clone()));
            options.set(option, &value)?;
        }
        Ok(options)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let options = WriterOptions::default();
        assert!(!options.get(HalOption::WriteNulls));
        assert!(options.get(HalOption::CloseOnFinish));
        assert!(!options.get(HalOption::WriteEmptyEmbedded));
        assert!(options.get(HalOption::WriteEmptyLinks));
        assert!(!options.get(HalOption::EscapeNonAscii));
    }

    #[test]
    fn set_accepts_booleans() {
        let mut options = WriterOptions::default();
        options.set(HalOption::WriteNulls, &json!(true)).unwrap();
        assert!(options.write_nulls);
        options.set(HalOption::WriteNulls, &json!(false)).unwrap();
        assert!(!options.write_nulls);
    }

    #[test]
    fn set_rejects_other_types() {
        let mut options = WriterOptions::default();
        let err = options
            .set(HalOption::WriteEmptyLinks, &json!("yes"))
            .unwrap_err();
        assert_eq!(
            err,
            OptionError::IncompatibleOption {
                option: HalOption::WriteEmptyLinks,
                value: json!("yes"),
            }
        );
        assert!(options.write_empty_links);
        assert_eq!(
            err.to_string(),
            "value \"yes\" is incompatible with the option write_empty_links"
        );
    }

    #[test]
    fn set_named() {
        let mut options = WriterOptions::default();
        options.set_named("write_empty_embedded", &json!(true)).unwrap();
        assert!(options.write_empty_embedded);
        assert_eq!(
            options.set_named("pretty", &json!(true)).unwrap_err(),
            OptionError::UnknownOption("pretty".into())
        );
    }

    #[test]
    fn option_names_round_trip() {
        for option in HalOption::ALL {
            assert_eq!(option.to_string().parse::<HalOption>().unwrap(), option);
        }
        assert_eq!(HalOption::WriteNulls.env_var(), "HALITE_WRITE_NULLS");
    }

    #[test]
    fn from_lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("HALITE_WRITE_NULLS", "true"),
            ("HALITE_WRITE_EMPTY_LINKS", " false "),
        ]
        .into_iter()
        .collect();
        let options =
            WriterOptions::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        assert!(options.write_nulls);
        assert!(!options.write_empty_links);
        assert!(options.close_on_finish);
    }

    #[test]
    fn from_lookup_rejects_non_boolean() {
        let err = WriterOptions::from_lookup(|name| {
            (name == "HALITE_CLOSE_ON_FINISH").then(|| "1".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            OptionError::IncompatibleOption {
                option: HalOption::CloseOnFinish,
                value: json!(1),
            }
        );
    }

    #[test]
    fn options_deserialise_with_defaults() {
        let options: WriterOptions = serde_json::from_str(r#"{"write_nulls": true}"#).unwrap();
        assert!(options.write_nulls);
        assert!(options.write_empty_links);
    }
}
