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

use std::fs;
use std::sync::Arc;

use logforth_glog::Backend;
use logforth_glog::Handler;
use logforth_glog::Identity;
use logforth_glog::Level;
use logforth_glog::Options;
use logforth_glog::vmodule;
use tempfile::TempDir;

struct Thing<'a>(&'a str);

impl std::fmt::Display for Thing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        log::info!("formatting wrapping ({})", self.0);
        f.write_str(self.0)
    }
}

// only one test installs the global logger
#[test]
fn test_log_crate_bridge() {
    let temp_dir = TempDir::new().expect("failed to create a temporary directory");
    let backend = Arc::new(Backend::with_identity(
        Options::default()
            .log_dir(temp_dir.path())
            .levels([Level::Debug, Level::Info, Level::Warn, Level::Error])
            .max_message_len(120),
        Identity::new("bridge", "host", "user", 99),
    ));
    let handler = Handler::from_backend(backend.clone());
    let network = vmodule::vmodule("network", Level::Warn);
    let network_handler = handler.with([network.clone()]);
    logforth_glog::setup_log_crate(handler).unwrap();

    log::trace!("hidden trace");
    log::info!(user = "alice"; "hello {}", "world");
    log::warn!("{}", "y".repeat(500));

    // logging while a record is being formatted must not deadlock
    log::error!("outer {}", Thing("inner"));

    log::Log::log(
        &network_handler,
        &log::Record::builder()
            .args(format_args!("network debug hidden"))
            .level(log::Level::Debug)
            .build(),
    );
    vmodule::set_vmodule_level(&network, Level::Debug);
    log::Log::log(
        &network_handler,
        &log::Record::builder()
            .args(format_args!("network debug shown"))
            .level(log::Level::Debug)
            .build(),
    );

    log::logger().flush();
    backend.close().unwrap();

    let read = |level| {
        let names = backend.file_names(level);
        assert_eq!(names.len(), 1, "{level}: {names:?}");
        fs::read_to_string(&names[0]).unwrap()
    };

    let info = read(Level::Info);
    let lines = info.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4, "{info}");
    assert!(lines[0].starts_with('I'));
    assert!(lines[0].ends_with("log_bridge.rs:52] hello world user=alice"), "{info}");
    assert!(lines[1].starts_with('W'));
    assert_eq!(lines[1].len(), 119);
    assert!(lines[2].ends_with("] formatting wrapping (inner)"), "{info}");
    assert!(lines[3].starts_with('E'));
    assert!(lines[3].ends_with("] outer inner"), "{info}");

    let debug = read(Level::Debug);
    assert!(!debug.contains("hidden"));
    assert!(debug.lines().last().unwrap().ends_with("] network debug shown vmodule=network"));

    let error = read(Level::Error);
    assert_eq!(error.lines().count(), 1);
    assert!(error.ends_with("] outer inner\n"));
}
