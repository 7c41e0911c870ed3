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

use std::fmt;

use crate::Backend;
use crate::Error;
use crate::Level;
use crate::VModule;

/// A sink that accepts formatted records by severity.
///
/// This is all the formatting layer needs from a backend; [`Handler`](crate::Handler) depends on
/// it instead of on [`Backend`].
pub trait Emit: fmt::Debug + Send + Sync + 'static {
    /// Whether a record of `level`, optionally gated by `vmodule`, would be written.
    fn enabled(&self, level: Level, vmodule: Option<&VModule>) -> bool;

    /// Write a fully formatted, newline-terminated record.
    fn emit(&self, level: Level, vmodule: Option<&VModule>, record: &[u8]) -> Result<(), Error>;

    /// Flush buffered records.
    fn flush(&self) -> Result<(), Error>;
}

impl Emit for Backend {
    fn enabled(&self, level: Level, vmodule: Option<&VModule>) -> bool {
        Backend::enabled(self, level, vmodule)
    }

    fn emit(&self, level: Level, vmodule: Option<&VModule>, record: &[u8]) -> Result<(), Error> {
        self.emit_with(level, vmodule, record)
    }

    fn flush(&self) -> Result<(), Error> {
        Backend::flush(self).inspect_err(|err| {
            if let Some(trap) = &self.options().trap {
                trap.trap(err);
            }
        })
    }
}
