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

//! Glog-style file naming.
//!
//! Log files are named `{program}.{host}.{user}.log.{LEVEL}.{YYYYMMDD-HHMMSS}.{pid}` and sort
//! lexicographically by the time embedded in their name.

use std::io;

use jiff::Timestamp;
use jiff::Zoned;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;

use crate::Identity;
use crate::Level;

const TIME_FORMAT: &str = "%Y%m%d-%H%M%S";
const TIME_LEN: usize = "YYYYMMDD-HHMMSS".len();

/// The part of a log file name that is the same for every file of `level`, including the
/// trailing period.
pub(crate) fn file_prefix(identity: &Identity, level: Level) -> String {
    format!(
        "{}.{}.{}.log.{}.",
        identity.program(),
        identity.host(),
        identity.user(),
        level.as_str()
    )
}

pub(crate) fn file_name(prefix: &str, time: &Zoned, pid: u32) -> String {
    format!("{prefix}{}.{pid}", time.strftime(TIME_FORMAT))
}

/// The name of the symlink pointing at the latest file of `level`.
pub(crate) fn link_name(identity: &Identity, level: Level) -> String {
    format!("{}.{}", identity.program(), level.as_str())
}

/// Parse the time embedded in a file name produced by [`file_name`] with the same prefix.
pub(crate) fn parse_file_name(prefix: &str, name: &str, tz: &TimeZone) -> Option<Zoned> {
    let rest = name.strip_prefix(prefix)?;
    let (time, pid) = rest.split_once('.')?;
    if time.len() != TIME_LEN || pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let datetime = DateTime::strptime(TIME_FORMAT, time).ok()?;
    datetime.to_zoned(tz.clone()).ok()
}

/// Return the instant `secs` seconds after the Unix epoch in `tz`.
pub(crate) fn at_second(secs: i64, tz: &TimeZone) -> io::Result<Zoned> {
    let timestamp = Timestamp::from_second(secs).map_err(io::Error::other)?;
    Ok(timestamp.to_zoned(tz.clone()))
}

/// Truncate `time` down to a multiple of `span` seconds since the Unix epoch.
pub(crate) fn truncate(time: &Zoned, span: i64) -> io::Result<Zoned> {
    let secs = time.timestamp().as_second();
    at_second(secs - secs.rem_euclid(span.max(1)), time.time_zone())
}
