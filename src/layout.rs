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
use std::fmt::Write;
use std::path::Path;

use jiff::Zoned;
use jiff::tz::TimeZone;

use crate::Attr;
use crate::Level;
use crate::options::DEFAULT_MAX_MESSAGE_LEN;

/// A layout that formats log records the way glog does.
///
/// Output format:
///
/// ```text
/// I0811 22:44:57.172105   18342 rolling.rs:53] Hello info! user=alice
/// W0811 22:44:57.172219   18342 rolling.rs:52] Hello warn!
/// E0811 22:44:57.172276   18342 rolling.rs:51] Hello error!
/// ```
///
/// Lines longer than `max_len` bytes are cut, keeping the trailing newline.
///
/// You can customize the timezone of the timestamp by setting the `tz` field with a [`TimeZone`]
/// instance. Otherwise, the system timezone is used.
#[derive(Debug, Clone)]
pub struct GlogLayout {
    pub tz: Option<TimeZone>,
    pub max_len: usize,
}

impl Default for GlogLayout {
    fn default() -> Self {
        Self {
            tz: None,
            max_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl GlogLayout {
    /// Set the maximum line length in bytes, including the trailing newline.
    #[must_use]
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Format a record together with the attributes of the handler emitting it.
    pub fn format(&self, record: &log::Record, attrs: &[Attr]) -> Vec<u8> {
        let now = match self.tz.clone() {
            Some(tz) => Zoned::now().with_time_zone(tz),
            None => Zoned::now(),
        };
        self.format_at(&now, std::process::id(), record, attrs)
    }

    pub(crate) fn format_at(
        &self,
        now: &Zoned,
        pid: u32,
        record: &log::Record,
        attrs: &[Attr],
    ) -> Vec<u8> {
        let level = Level::from(record.level()).letter();
        let time = now.strftime("%m%d %H:%M:%S");
        let micros = now.subsec_nanosecond() / 1000;
        let file = record
            .file()
            .and_then(|file| Path::new(file).file_name())
            .and_then(|file| file.to_str())
            .unwrap_or("???");
        let line = record.line().unwrap_or_default();

        let mut text = String::new();
        // writing to a string never fails
        let _ = write!(
            text,
            "{level}{time}.{micros:06} {pid:>7} {file}:{line}] {}{}",
            record.args(),
            KvDisplay::new(record.key_values()),
        );
        for attr in attrs {
            let _ = write!(text, " {attr}");
        }

        let max_len = self.max_len.max(1);
        if text.len() >= max_len {
            let mut end = max_len - 1;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text.push('\n');
        text.into_bytes()
    }
}

struct KvDisplay<'kvs> {
    kv: &'kvs dyn log::kv::Source,
}

impl<'kvs> KvDisplay<'kvs> {
    fn new(kv: &'kvs dyn log::kv::Source) -> Self {
        Self { kv }
    }
}

impl fmt::Display for KvDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut visitor = KvWriter { writer: f };
        self.kv.visit(&mut visitor).ok();
        Ok(())
    }
}

struct KvWriter<'a, 'kvs> {
    writer: &'kvs mut fmt::Formatter<'a>,
}

impl<'kvs> log::kv::VisitSource<'kvs> for KvWriter<'_, 'kvs> {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        write!(self.writer, " {key}={value}")?;
        Ok(())
    }
}
