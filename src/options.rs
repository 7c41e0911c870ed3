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

//! Configuration of a [`Backend`](crate::Backend).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::Level;
use crate::file::Clock;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1800;
const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_REUSE_DURATION: Duration = Duration::from_secs(16 * 60 * 60);
pub(crate) const DEFAULT_MAX_MESSAGE_LEN: usize = 15000;
const DEFAULT_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

/// How a level file decides whether an existing log file can be reopened instead of creating a
/// new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReuseStrategy {
    /// Reopen the newest log file of the level if its embedded timestamp is within the reuse
    /// duration and it is below the maximum size. New files are named after the current second
    /// and the process id.
    #[default]
    Latest,
    /// Probe file names truncated to 1s, 2s, 4s, ... up to the reuse duration. File names carry
    /// a zero in place of the process id so that restarts land on the same names.
    Bucketed,
}

/// Options for a [`Backend`](crate::Backend).
///
/// Every option has a default, so `Options::default()` is a working configuration that writes
/// to the system temporary directory.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use logforth_glog::Level;
/// use logforth_glog::Options;
///
/// let options = Options::default()
///     .program("server")
///     .log_dir("/var/log/server")
///     .max_size(64 * 1024 * 1024)
///     .levels([Level::Debug, Level::Info, Level::Warn, Level::Error])
///     .reuse_duration(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    pub(crate) program: Option<String>,
    pub(crate) log_dirs: Vec<PathBuf>,
    pub(crate) log_link: Option<PathBuf>,
    pub(crate) max_size: u64,
    pub(crate) buffer_size: usize,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "human_duration::deserialize"))]
    pub(crate) flush_interval: Duration,
    pub(crate) buffer_level: Level,
    pub(crate) levels: Vec<Level>,
    pub(crate) file_mode: u32,
    pub(crate) file_header: bool,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "human_duration::deserialize"))]
    pub(crate) reuse_duration: Duration,
    pub(crate) reuse_strategy: ReuseStrategy,
    pub(crate) max_message_len: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) trap: Option<Arc<dyn Trap>>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) clock: Clock,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            program: None,
            log_dirs: vec![],
            log_link: None,
            max_size: DEFAULT_MAX_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            buffer_level: Level::Info,
            levels: DEFAULT_LEVELS.to_vec(),
            file_mode: DEFAULT_FILE_MODE,
            file_header: false,
            reuse_duration: DEFAULT_REUSE_DURATION,
            reuse_strategy: ReuseStrategy::default(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            trap: None,
            clock: Clock::default(),
        }
    }
}

impl Options {
    /// Set the program name used in file names. Default to the base name of the executable.
    #[must_use]
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Add a candidate log directory.
    ///
    /// Directories are tried in the order they were added. The system temporary directory is
    /// always tried last.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dirs.push(dir.into());
        self
    }

    /// Replace the candidate log directories.
    #[must_use]
    pub fn log_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.log_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Set a directory in which additional `{program}.{LEVEL}` symlinks are maintained.
    #[must_use]
    pub fn log_link(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_link = Some(dir.into());
        self
    }

    /// Set the maximum size of a log file in bytes.
    ///
    /// Header bytes count towards the size. The record that reaches the limit is still written
    /// to the current file; the following one goes to a new file.
    #[must_use]
    pub fn max_size(mut self, n: u64) -> Self {
        self.max_size = n;
        self
    }

    /// Set the size of the write buffer of each log file.
    #[must_use]
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    /// Set the interval of the periodic background flush.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the highest level that is only buffered. Records above it trigger an immediate
    /// background flush.
    #[must_use]
    pub fn buffer_level(mut self, level: Level) -> Self {
        self.buffer_level = level;
        self
    }

    /// Set the levels that get a log file of their own.
    #[must_use]
    pub fn levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Set the permission bits of newly created log files.
    #[must_use]
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Write a header block every time a log file is opened.
    #[must_use]
    pub fn file_header(mut self, enabled: bool) -> Self {
        self.file_header = enabled;
        self
    }

    /// Set the maximum age of a log file that may still be reopened.
    #[must_use]
    pub fn reuse_duration(mut self, duration: Duration) -> Self {
        self.reuse_duration = duration;
        self
    }

    /// Set how existing log files are selected for reuse.
    #[must_use]
    pub fn reuse_strategy(mut self, strategy: ReuseStrategy) -> Self {
        self.reuse_strategy = strategy;
        self
    }

    /// Set the limit on the length of a formatted log line, including the trailing newline.
    #[must_use]
    pub fn max_message_len(mut self, n: usize) -> Self {
        self.max_message_len = n;
        self
    }

    /// Set the trap receiving errors that are reported but not returned.
    ///
    /// Default to [`DefaultTrap`].
    #[must_use]
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Some(Arc::new(trap));
        self
    }

    #[cfg(test)]
    pub(crate) fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Return the maximum formatted line length.
    pub fn message_len_limit(&self) -> usize {
        self.max_message_len
    }

    /// Fill in defaults for zero values, append the temporary directory and order the levels.
    pub(crate) fn normalize(mut self) -> Self {
        let temp_dir = std::env::temp_dir();
        if !self.log_dirs.contains(&temp_dir) {
            self.log_dirs.push(temp_dir);
        }
        if self.max_size == 0 {
            self.max_size = DEFAULT_MAX_SIZE;
        }
        if self.buffer_size == 0 {
            self.buffer_size = DEFAULT_BUFFER_SIZE;
        }
        if self.flush_interval.is_zero() {
            self.flush_interval = DEFAULT_FLUSH_INTERVAL;
        }
        if self.levels.is_empty() {
            self.levels = DEFAULT_LEVELS.to_vec();
        }
        self.levels.sort();
        self.levels.dedup();
        if self.file_mode == 0 {
            self.file_mode = DEFAULT_FILE_MODE;
        }
        if self.reuse_duration.is_zero() {
            self.reuse_duration = DEFAULT_REUSE_DURATION;
        }
        if self.max_message_len == 0 {
            self.max_message_len = DEFAULT_MAX_MESSAGE_LEN;
        }
        if self.trap.is_none() {
            self.trap = Some(Arc::new(DefaultTrap::default()));
        }
        self
    }
}

#[cfg(feature = "serde")]
mod human_duration {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;

    /// Accept `"30s"`, `"16h"` or ISO 8601 durations such as `"PT16H"`.
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        let duration: jiff::SignedDuration = s.parse().map_err(serde::de::Error::custom)?;
        Duration::try_from(duration).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default().normalize();
        assert_eq!(options.max_size, 1024 * 1024 * 1800);
        assert_eq!(options.levels, vec![Level::Info, Level::Warn, Level::Error]);
        assert_eq!(options.file_mode, 0o644);
        assert_eq!(options.reuse_duration, Duration::from_secs(16 * 3600));
        assert_eq!(options.message_len_limit(), 15000);
        assert_eq!(options.log_dirs, vec![std::env::temp_dir()]);
        assert!(options.trap.is_some());
    }

    #[test]
    fn test_normalize_orders_levels_and_keeps_dirs_first() {
        let options = Options::default()
            .log_dir("/first")
            .log_dir("/second")
            .levels([Level::Error, Level::Debug, Level::Error, Level::Info])
            .max_size(0)
            .normalize();

        assert_eq!(options.levels, vec![Level::Debug, Level::Info, Level::Error]);
        assert_eq!(
            options.log_dirs,
            vec![
                PathBuf::from("/first"),
                PathBuf::from("/second"),
                std::env::temp_dir()
            ]
        );
        assert_eq!(options.max_size, 1024 * 1024 * 1800);
    }
}
