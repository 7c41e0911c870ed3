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

use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use jiff::Zoned;

use crate::Error;
use crate::ErrorKind;
use crate::Identity;
use crate::Level;
use crate::Options;
use crate::file::name;
use crate::file::planner::Planner;
use crate::file::planner::RotationDecision;

/// The log file of one level.
///
/// The backing file is opened lazily by the first write and replaced whenever the number of
/// bytes written through it reaches the maximum size.
#[derive(Debug)]
pub(crate) struct LevelFile {
    level: Level,
    identity: Arc<Identity>,
    options: Arc<Options>,
    prefix: String,
    link: String,

    writer: Option<BufWriter<File>>,
    current: Option<PathBuf>,
    nbytes: u64,
    names: Vec<PathBuf>,
    // reported errors that did not fail the write; drained by the caller after unlocking
    side_errors: Vec<Error>,
}

impl LevelFile {
    pub(crate) fn new(level: Level, identity: Arc<Identity>, options: Arc<Options>) -> Self {
        let prefix = name::file_prefix(&identity, level);
        let link = name::link_name(&identity, level);
        Self {
            level,
            identity,
            options,
            prefix,
            link,
            writer: None,
            current: None,
            nbytes: 0,
            names: vec![],
            side_errors: vec![],
        }
    }

    pub(crate) fn level(&self) -> Level {
        self.level
    }

    /// Every path this level has written to, oldest first.
    pub(crate) fn names(&self) -> &[PathBuf] {
        &self.names
    }

    /// Take the errors that were reported but did not fail an operation.
    pub(crate) fn take_side_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.side_errors)
    }

    /// Write one record. The whole record goes to a single file.
    pub(crate) fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if self.writer.is_none() || self.nbytes >= self.options.max_size {
            self.rotate(self.options.clock.now())?;
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::new(ErrorKind::Write, "log file is not open"));
        };
        writer.write_all(buf).map_err(|err| {
            Error::new(ErrorKind::Write, "failed to write log file")
                .with_context("level", self.level)
                .with_source(err)
        })?;
        self.nbytes += buf.len() as u64;
        Ok(buf.len())
    }

    /// Drain the write buffer into the file.
    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        match self.writer.as_mut() {
            None => Ok(()),
            Some(writer) => writer.flush().map_err(|err| {
                Error::new(ErrorKind::Flush, "failed to flush log file")
                    .with_context("level", self.level)
                    .with_source(err)
            }),
        }
    }

    /// Return a second handle to the backing file, so it can be synced without exclusive
    /// access to this level file.
    pub(crate) fn sync_handle(&self) -> Option<Result<File, Error>> {
        let writer = self.writer.as_ref()?;
        Some(writer.get_ref().try_clone().map_err(|err| {
            Error::new(ErrorKind::Flush, "failed to clone log file handle")
                .with_context("level", self.level)
                .with_source(err)
        }))
    }

    /// Flush the write buffer and commit the file to disk.
    pub(crate) fn sync(&mut self) -> Result<(), Error> {
        self.flush()?;
        let Some(writer) = self.writer.as_ref() else {
            return Ok(());
        };
        writer.get_ref().sync_all().map_err(|err| {
            Error::new(ErrorKind::Flush, "failed to sync log file")
                .with_context("level", self.level)
                .with_source(err)
        })
    }

    /// Sync and release the backing file. A later write opens a file again.
    pub(crate) fn close(&mut self) -> Result<(), Error> {
        let result = self.sync();
        self.writer = None;
        result
    }

    fn rotate(&mut self, now: Zoned) -> Result<(), Error> {
        if let Err(err) = self.flush() {
            self.side_errors.push(err);
        }

        let (file, path, offset) = self.create_file(&now)?;

        let previous = self.current.take();
        self.writer = Some(BufWriter::with_capacity(self.options.buffer_size, file));
        self.nbytes = offset;
        self.names.push(path.clone());
        self.current = Some(path);

        if self.options.file_header {
            self.write_header(&now, offset > 0, previous.as_deref())?;
        }
        Ok(())
    }

    /// Open a log file in the first directory that yields one.
    fn create_file(&mut self, now: &Zoned) -> Result<(File, PathBuf, u64), Error> {
        let planner = Planner {
            prefix: &self.prefix,
            pid: self.identity.pid(),
            max_size: self.options.max_size,
            reuse_duration: self.options.reuse_duration,
            strategy: self.options.reuse_strategy,
        };

        let options = self.options.clone();
        let mut last_err = None;
        for dir in &options.log_dirs {
            match self.open_in(dir, &planner, now) {
                Ok((file, path, offset)) => {
                    let link_errors = self.update_links(dir, &path);
                    self.side_errors.extend(link_errors);
                    return Ok((file, path, offset));
                }
                Err(err) => last_err = Some(err),
            }
        }

        let mut err = Error::new(ErrorKind::NoLogDirectory, "cannot create log file")
            .with_context("level", self.level);
        if let Some(last_err) = last_err {
            err = err.with_source(last_err);
        }
        Err(err)
    }

    fn open_in(
        &self,
        dir: &Path,
        planner: &Planner,
        now: &Zoned,
    ) -> Result<(File, PathBuf, u64), Error> {
        let rotation_error = |message: &'static str, err: io::Error| {
            Error::new(ErrorKind::Rotation, message)
                .with_context("dir", dir.display())
                .with_source(err)
        };

        fs::create_dir_all(dir)
            .map_err(|err| rotation_error("failed to create log directory", err))?;
        let RotationDecision { path, start_offset } = planner
            .plan(dir, now)
            .map_err(|err| rotation_error("failed to choose log file", err))?;

        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.options.file_mode);
        }
        let file = options
            .open(&path)
            .map_err(|err| rotation_error("failed to open log file", err))?;

        // the file may have grown since it was planned
        let offset = file.metadata().map_or(start_offset, |m| m.len());
        Ok((file, path, offset))
    }

    fn update_links(&self, dir: &Path, path: &Path) -> Vec<Error> {
        let mut errors = vec![];
        let Some(filename) = path.file_name() else {
            return errors;
        };
        update_link(&dir.join(&self.link), filename, &mut errors);
        if let Some(link_dir) = &self.options.log_link {
            update_link(&link_dir.join(&self.link), path.as_os_str(), &mut errors);
        }
        errors
    }

    fn write_header(
        &mut self,
        now: &Zoned,
        reopened: bool,
        previous: Option<&Path>,
    ) -> Result<(), Error> {
        let mut header = String::new();
        let verb = if reopened { "reopened" } else { "created" };
        header.push_str(&format!(
            "Log file {verb} at: {}\n",
            now.strftime("%Y/%m/%d %H:%M:%S")
        ));
        header.push_str(&format!("Running on machine: {}\n", self.identity.host()));
        header.push_str(&format!(
            "Binary: Built with {} {} for {}/{}\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        if !reopened {
            let previous = previous
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".to_string());
            header.push_str(&format!("Previous log: {previous}\n"));
        }
        header.push_str("Log line format: [DIWE]mmdd hh:mm:ss.uuuuuu threadid file:line] msg\n");

        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::new(ErrorKind::Write, "log file is not open"));
        };
        writer.write_all(header.as_bytes()).map_err(|err| {
            Error::new(ErrorKind::Write, "failed to write log file header")
                .with_context("level", self.level)
                .with_source(err)
        })?;
        self.nbytes += header.len() as u64;
        Ok(())
    }

}

fn update_link(link: &Path, target: &OsStr, errors: &mut Vec<Error>) {
    if let Err(err) = fs::remove_file(link)
        && err.kind() != io::ErrorKind::NotFound
    {
        errors.push(
            Error::new(ErrorKind::Rotation, "failed to remove log symlink")
                .with_context("link", link.display())
                .with_source(err),
        );
    }

    #[cfg(unix)]
    if let Err(err) = std::os::unix::fs::symlink(target, link) {
        errors.push(
            Error::new(ErrorKind::Rotation, "failed to create log symlink")
                .with_context("link", link.display())
                .with_source(err),
        );
    }
    #[cfg(not(unix))]
    let _ = target;
}
