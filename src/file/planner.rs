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

//! Decide which physical file a level writes to after a rotation.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use jiff::Zoned;

use crate::ReuseStrategy;
use crate::file::name;

// Bounds the search for a free name when rotating many times within one second.
const MAX_NAME_PROBES: i64 = 3600;

/// Where the next writes of a level go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RotationDecision {
    pub(crate) path: PathBuf,
    /// Size of the file before the first write; zero for a new file.
    pub(crate) start_offset: u64,
}

impl RotationDecision {
    fn create(path: PathBuf) -> Self {
        Self {
            path,
            start_offset: 0,
        }
    }

    fn reuse(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            start_offset: size,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Planner<'a> {
    pub(crate) prefix: &'a str,
    pub(crate) pid: u32,
    pub(crate) max_size: u64,
    pub(crate) reuse_duration: Duration,
    pub(crate) strategy: ReuseStrategy,
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    time: Zoned,
    modified: Option<SystemTime>,
    size: u64,
}

impl Planner<'_> {
    pub(crate) fn plan(&self, dir: &Path, now: &Zoned) -> io::Result<RotationDecision> {
        match self.strategy {
            ReuseStrategy::Latest => self.plan_latest(dir, now),
            ReuseStrategy::Bucketed => self.plan_bucketed(dir, now),
        }
    }

    fn reuse_secs(&self) -> i64 {
        i64::try_from(self.reuse_duration.as_secs())
            .unwrap_or(i64::MAX)
            .max(1)
    }

    fn plan_latest(&self, dir: &Path, now: &Zoned) -> io::Result<RotationDecision> {
        let Some(latest) = self.latest_file(dir, now)? else {
            return self.first_fit(dir, now, self.pid);
        };

        let age = now.timestamp().as_second() - latest.time.timestamp().as_second();
        if age < self.reuse_secs() && latest.size < self.max_size {
            return Ok(RotationDecision::reuse(latest.path, latest.size));
        }

        // never name a new file before the latest one
        let start = if latest.time.timestamp() > now.timestamp() {
            &latest.time
        } else {
            now
        };
        self.first_fit(dir, start, self.pid)
    }

    fn plan_bucketed(&self, dir: &Path, now: &Zoned) -> io::Result<RotationDecision> {
        let reuse = self.reuse_secs();

        let mut spans = vec![];
        let mut span = 1;
        while span < reuse {
            spans.push(span);
            span = span.saturating_mul(2);
        }
        spans.push(reuse);

        let mut times = spans
            .into_iter()
            .map(|span| name::truncate(now, span))
            .collect::<io::Result<Vec<_>>>()?;
        times.sort_by_key(|t| t.timestamp());
        times.dedup_by_key(|t| t.timestamp());

        let latest = self.latest_file(dir, now)?;
        if let Some(latest) = &latest
            && latest.size < self.max_size
            && times.iter().any(|t| t.timestamp() == latest.time.timestamp())
            && latest.path == dir.join(name::file_name(self.prefix, &latest.time, 0))
        {
            return Ok(RotationDecision::reuse(latest.path.clone(), latest.size));
        }

        // the first bucket after the newest file keeps names sorted by creation time
        let next = times.iter().find(|t| {
            latest
                .as_ref()
                .is_none_or(|latest| t.timestamp() > latest.time.timestamp())
        });
        match (next, latest) {
            (Some(time), _) => Ok(RotationDecision::create(
                dir.join(name::file_name(self.prefix, time, 0)),
            )),
            (None, Some(latest)) => {
                let secs = latest.time.timestamp().as_second() + 1;
                let start = name::at_second(secs, now.time_zone())?;
                self.first_fit(dir, &start, 0)
            }
            // unreachable: without any file every bucket qualifies
            (None, None) => self.first_fit(dir, now, 0),
        }
    }

    /// Starting at `start`, return the first per-second name that is missing or below the
    /// maximum size.
    fn first_fit(&self, dir: &Path, start: &Zoned, pid: u32) -> io::Result<RotationDecision> {
        let tz = start.time_zone();
        let first = start.timestamp().as_second();
        for secs in first..first.saturating_add(MAX_NAME_PROBES) {
            let time = name::at_second(secs, tz)?;
            let path = dir.join(name::file_name(self.prefix, &time, pid));
            match file_size(&path)? {
                None => return Ok(RotationDecision::create(path)),
                Some(size) if size < self.max_size => {
                    return Ok(RotationDecision::reuse(path, size));
                }
                Some(_) => {}
            }
        }
        Err(io::Error::other(format!(
            "no usable log file name in {} after {MAX_NAME_PROBES} probes",
            dir.display()
        )))
    }

    /// Return the newest regular file of this level in `dir`.
    ///
    /// Files are ordered by the time embedded in their names, then by modification time.
    fn latest_file(&self, dir: &Path, now: &Zoned) -> io::Result<Option<Candidate>> {
        let tz = now.time_zone();
        let candidates = fs::read_dir(dir)?.filter_map(|entry| {
            let entry = entry.ok()?;
            // symlinks point at files we already see; never follow them
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            let filename = entry.file_name();
            let time = name::parse_file_name(self.prefix, filename.to_str()?, tz)?;
            let metadata = entry.metadata().ok()?;
            Some(Candidate {
                path: entry.path(),
                time,
                modified: metadata.modified().ok(),
                size: metadata.len(),
            })
        });

        Ok(candidates.max_by(|a, b| {
            a.time
                .timestamp()
                .cmp(&b.time.timestamp())
                .then_with(|| a.modified.cmp(&b.modified))
        }))
    }
}

fn file_size(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.len())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tempfile::TempDir;

    use super::*;

    const PREFIX: &str = "test.host.user.log.INFO.";

    fn planner(strategy: ReuseStrategy) -> Planner<'static> {
        Planner {
            prefix: PREFIX,
            pid: 77,
            max_size: 100,
            reuse_duration: Duration::from_secs(3600),
            strategy,
        }
    }

    fn touch(dir: &Path, time: &str, pid: u32, size: usize) -> PathBuf {
        let time = Zoned::from_str(time).unwrap();
        let path = dir.join(name::file_name(PREFIX, &time, pid));
        fs::write(&path, vec![b'x'; size]).unwrap();
        path
    }

    #[test]
    fn test_latest_creates_new_file_in_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:00:00[UTC]").unwrap();

        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(
            decision,
            RotationDecision::create(temp_dir.path().join(format!("{PREFIX}20240810-120000.77")))
        );
    }

    #[test]
    fn test_latest_reuses_recent_file_below_limit() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "2024-08-10T11:00:00[UTC]", 1, 10);
        let recent = touch(temp_dir.path(), "2024-08-10T11:30:00[UTC]", 2, 40);
        let now = Zoned::from_str("2024-08-10T12:00:00[UTC]").unwrap();

        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(decision, RotationDecision::reuse(recent, 40));
    }

    #[test]
    fn test_latest_skips_full_or_stale_files() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:00:00[UTC]").unwrap();
        let expected = temp_dir.path().join(format!("{PREFIX}20240810-120000.77"));

        touch(temp_dir.path(), "2024-08-10T10:59:59[UTC]", 2, 40);
        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(decision, RotationDecision::create(expected.clone()));

        touch(temp_dir.path(), "2024-08-10T11:59:00[UTC]", 2, 100);
        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(decision, RotationDecision::create(expected));
    }

    #[test]
    fn test_latest_skips_taken_names_within_one_second() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "2024-08-10T12:00:00[UTC]", 77, 100);
        touch(temp_dir.path(), "2024-08-10T12:00:01[UTC]", 77, 100);
        let now = Zoned::from_str("2024-08-10T12:00:00.500[UTC]").unwrap();

        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(
            decision,
            RotationDecision::create(temp_dir.path().join(format!("{PREFIX}20240810-120002.77")))
        );
    }

    #[test]
    fn test_latest_ignores_symlinks_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.INFO"), b"x").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            temp_dir.path().join("test.INFO"),
            temp_dir.path().join(format!("{PREFIX}20240810-115959.9")),
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("test.host.user.log.ERROR.20240810-115900.1"),
            b"x",
        )
        .unwrap();
        let now = Zoned::from_str("2024-08-10T12:00:00[UTC]").unwrap();

        let decision = planner(ReuseStrategy::Latest)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(decision.start_offset, 0);
        assert!(decision.path.ends_with(format!("{PREFIX}20240810-120000.77")));
    }

    #[test]
    fn test_bucketed_starts_at_coarsest_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:34:56[UTC]").unwrap();

        let decision = planner(ReuseStrategy::Bucketed)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(
            decision,
            RotationDecision::create(temp_dir.path().join(format!("{PREFIX}20240810-120000.0")))
        );
    }

    #[test]
    fn test_bucketed_reuses_then_moves_to_finer_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:34:56[UTC]").unwrap();
        let planner = planner(ReuseStrategy::Bucketed);

        let hour = touch(temp_dir.path(), "2024-08-10T12:00:00[UTC]", 0, 30);
        let decision = planner.plan(temp_dir.path(), &now).unwrap();
        assert_eq!(decision, RotationDecision::reuse(hour.clone(), 30));

        fs::write(&hour, vec![b'x'; 100]).unwrap();
        let decision = planner.plan(temp_dir.path(), &now).unwrap();
        assert_eq!(decision.start_offset, 0);
        let next = decision.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(next > hour.file_name().unwrap().to_str().unwrap().to_string());
        assert!(!decision.path.exists());
    }

    #[test]
    fn test_bucketed_moves_past_full_finest_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:34:56[UTC]").unwrap();
        touch(temp_dir.path(), "2024-08-10T12:34:56[UTC]", 0, 100);

        let decision = planner(ReuseStrategy::Bucketed)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(
            decision,
            RotationDecision::create(temp_dir.path().join(format!("{PREFIX}20240810-123457.0")))
        );
    }

    #[test]
    fn test_bucketed_never_names_before_newest_file() {
        let temp_dir = TempDir::new().unwrap();
        let now = Zoned::from_str("2024-08-10T12:34:56[UTC]").unwrap();
        touch(temp_dir.path(), "2024-08-10T12:00:00[UTC]", 0, 100);
        // written by the previous second's finest bucket
        touch(temp_dir.path(), "2024-08-10T12:34:55[UTC]", 0, 100);

        let decision = planner(ReuseStrategy::Bucketed)
            .plan(temp_dir.path(), &now)
            .unwrap();
        assert_eq!(
            decision,
            RotationDecision::create(temp_dir.path().join(format!("{PREFIX}20240810-123456.0")))
        );
    }
}
