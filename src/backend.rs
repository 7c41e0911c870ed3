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

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Error;
use crate::ErrorKind;
use crate::Identity;
use crate::Level;
use crate::LevelVar;
use crate::Options;
use crate::VModule;
use crate::file::LevelFile;
use crate::flush::FlushDaemon;
use crate::flush::FlushFn;
use crate::trap::Trap;

/// A glog-style backend writing one log file per severity level.
///
/// A record of severity `S` is written to the file of every enabled level that is not above `S`,
/// so the `INFO` file holds every record, and the `ERROR` file only errors. Records below the
/// global threshold, or below the threshold of the verbosity attribute they carry, are dropped.
///
/// # Examples
///
/// ```no_run
/// use logforth_glog::Backend;
/// use logforth_glog::Level;
/// use logforth_glog::Options;
///
/// let backend = Backend::new(Options::default().program("server").log_dir("/var/log/server"));
/// backend.emit(Level::Warn, b"W0810 07:05:09.000000    42 main.rs:1] disk almost full\n").unwrap();
/// backend.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Backend {
    shared: Arc<Shared>,
    flusher: FlushDaemon,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    threshold: LevelVar,
    options: Arc<Options>,
    identity: Arc<Identity>,
    trap: Arc<dyn Trap>,
}

#[derive(Debug)]
struct State {
    // ordered from the least severe level
    files: Vec<LevelFile>,
    closed: bool,
}

impl Backend {
    /// Create a backend for the current process.
    ///
    /// No file is opened until the first record of a level is written.
    pub fn new(options: Options) -> Backend {
        let identity = Identity::current(options.program.as_deref());
        Backend::with_identity(options, identity)
    }

    /// Create a backend that names its files after the given identity.
    pub fn with_identity(options: Options, identity: Identity) -> Backend {
        let options = Arc::new(options.normalize());
        let identity = Arc::new(identity);
        let trap = options
            .trap
            .clone()
            .unwrap_or_else(|| Arc::new(crate::DefaultTrap::default()));

        let files = options
            .levels
            .iter()
            .map(|level| LevelFile::new(*level, identity.clone(), options.clone()))
            .collect();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                files,
                closed: false,
            }),
            threshold: LevelVar::default(),
            options: options.clone(),
            identity,
            trap: trap.clone(),
        });

        let flush: Arc<FlushFn> = {
            let shared = shared.clone();
            Arc::new(move |from: Option<Level>| shared.flush(from))
        };
        let flusher = FlushDaemon::start(options.flush_interval, trap, flush);

        Backend { shared, flusher }
    }

    /// The identity the log files are named after.
    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    /// The options in effect, with defaults filled in.
    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    /// Set the global minimum severity and return the previous one.
    pub fn set_level(&self, level: Level) -> Level {
        self.shared.threshold.set(level)
    }

    /// The global minimum severity.
    pub fn level(&self) -> Level {
        self.shared.threshold.get()
    }

    /// Whether a record of `level`, optionally carrying a verbosity attribute, would be written.
    pub fn enabled(&self, level: Level, vmodule: Option<&VModule>) -> bool {
        let min = match vmodule {
            Some(vmodule) => vmodule.level(),
            None => self.shared.threshold.get(),
        };
        level >= min && self.shared.options.levels.iter().any(|l| *l <= level)
    }

    /// Write a formatted record to the files of `level` and every enabled level below it.
    pub fn emit(&self, level: Level, record: &[u8]) -> Result<(), Error> {
        self.emit_with(level, None, record)
    }

    /// Like [`Backend::emit`], but gated by the verbosity attribute when one is given.
    ///
    /// Every target file is attempted. The first failure is returned and also sent to the
    /// trap.
    pub fn emit_with(
        &self,
        level: Level,
        vmodule: Option<&VModule>,
        record: &[u8],
    ) -> Result<(), Error> {
        if !self.enabled(level, vmodule) {
            return Ok(());
        }

        let result = self.shared.write(level, record);
        match &result {
            Err(err) if err.kind() == ErrorKind::Closed => return result,
            Err(err) => self.shared.trap.trap(err),
            Ok(()) => {}
        }

        if level > self.shared.options.buffer_level {
            self.flusher.notify(level);
        }
        result
    }

    /// Flush and sync every level file, most severe first.
    pub fn flush(&self) -> Result<(), Error> {
        self.shared.flush(None)
    }

    /// Every path the file of `level` has been written to, oldest first.
    ///
    /// Empty if the level is not enabled or has not been written yet.
    pub fn file_names(&self, level: Level) -> Vec<PathBuf> {
        let state = self.shared.lock();
        state
            .files
            .iter()
            .find(|f| f.level() == level)
            .map(|f| f.names().to_vec())
            .unwrap_or_default()
    }

    /// Stop the flush thread, then flush, sync and close every file.
    ///
    /// Records emitted afterwards fail with [`ErrorKind::Closed`]. Calling `close` again does
    /// nothing.
    pub fn close(&self) -> Result<(), Error> {
        self.flusher.stop();
        self.shared.close()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            self.shared.trap.trap(&err);
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, level: Level, record: &[u8]) -> Result<(), Error> {
        let mut first_err = None;
        let mut side_errors = vec![];
        {
            let mut state = self.lock();
            if state.closed {
                return Err(Error::new(ErrorKind::Closed, "log backend is closed"));
            }

            for file in state.files.iter_mut().filter(|f| f.level() <= level) {
                if let Err(err) = file.write(record)
                    && first_err.is_none()
                {
                    first_err = Some(err);
                }
                side_errors.extend(file.take_side_errors());
            }
        }

        // a trap may log through this backend again
        for err in &side_errors {
            self.trap.trap(err);
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Flush the files of level `from` and above, or all files, then sync them.
    fn flush(&self, from: Option<Level>) -> Result<(), Error> {
        let mut first_err = None;
        let mut handles: Vec<File> = vec![];
        {
            let mut state = self.lock();
            if state.closed {
                return Ok(());
            }
            for file in state.files.iter_mut().rev() {
                if from.is_some_and(|from| file.level() < from) {
                    continue;
                }
                match file.flush() {
                    Ok(()) => {}
                    Err(err) => {
                        first_err.get_or_insert(err);
                        continue;
                    }
                }
                match file.sync_handle() {
                    None => {}
                    Some(Ok(handle)) => handles.push(handle),
                    Some(Err(err)) => {
                        first_err.get_or_insert(err);
                    }
                }
            }
        }

        for handle in handles {
            if let Err(err) = handle.sync_all() {
                first_err.get_or_insert(
                    Error::new(ErrorKind::Flush, "failed to sync log file").with_source(err),
                );
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let mut first_err = None;
        for file in state.files.iter_mut().rev() {
            if let Err(err) = file.close() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
