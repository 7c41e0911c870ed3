// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Log severities and the atomic threshold cell shared by the backend and verbosity attributes.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::ErrorKind;

/// The severity of a log record.
///
/// Severities are totally ordered: `Debug < Info < Warn < Error`. There is no fatal severity.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Level {
    /// Designates lower priority information.
    Debug = 1,
    /// Designates useful information.
    Info = 2,
    /// Designates hazardous situations.
    Warn = 3,
    /// Designates very serious errors.
    Error = 4,
}

impl Level {
    /// All severities, least severe first.
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation, and is the severity
    /// component used in log file and symlink names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Return the single letter glog uses to prefix a log line.
    pub fn letter(&self) -> char {
        match self {
            Level::Debug => 'D',
            Level::Info => 'I',
            Level::Warn => 'W',
            Level::Error => 'E',
        }
    }

    fn from_u8(v: u8) -> Level {
        match v {
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(Error::new(ErrorKind::Unexpected, "unknown log level").with_context("level", s)),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => log::Level::Error,
            Level::Warn => log::Level::Warn,
            Level::Info => log::Level::Info,
            Level::Debug => log::Level::Debug,
        }
    }
}

/// A severity threshold that can be read and changed concurrently.
#[derive(Debug)]
pub struct LevelVar(AtomicU8);

impl LevelVar {
    /// Create a new cell holding `level`.
    pub fn new(level: Level) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    /// Return the current level.
    pub fn get(&self) -> Level {
        Level::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Set a new level, returning the previous one.
    pub fn set(&self, level: Level) -> Level {
        Level::from_u8(self.0.swap(level as u8, Ordering::AcqRel))
    }
}

impl Default for LevelVar {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        let mut levels = vec![Level::Error, Level::Debug, Level::Warn, Level::Info];
        levels.sort();
        assert_eq!(levels, Level::ALL);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("trace".parse::<Level>().unwrap(), Level::Debug);
        assert!("fatal".parse::<Level>().is_err());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(log::Level::Trace), Level::Debug);
        assert_eq!(Level::from(log::Level::Error), Level::Error);
        assert_eq!(log::Level::from(Level::Warn), log::Level::Warn);
    }

    #[test]
    fn test_level_var_swaps() {
        let var = LevelVar::default();
        assert_eq!(var.get(), Level::Info);
        assert_eq!(var.set(Level::Debug), Level::Info);
        assert_eq!(var.get(), Level::Debug);
    }
}
