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

use std::sync::Arc;

use logforth_glog::Backend;
use logforth_glog::Handler;
use logforth_glog::Level;
use logforth_glog::Options;
use logforth_glog::vmodule;

fn main() {
    std::fs::create_dir_all("logs/latest").unwrap();

    let backend = Arc::new(Backend::new(
        Options::default()
            .program("leveled_files")
            .log_dir("logs")
            .log_link("logs/latest")
            .levels([Level::Debug, Level::Info, Level::Warn, Level::Error])
            .max_size(1024 * 1024)
            .file_header(true),
    ));
    let handler = Handler::from_backend(backend.clone());

    let network = vmodule::vmodule("network", Level::Warn);
    let network_logger = handler.with([network.clone()]);
    logforth_glog::setup_log_crate(handler).unwrap();

    let repeat = 1;

    for i in 0..repeat {
        log::error!("Hello error!");
        log::warn!("Hello warn!");
        log::info!("Hello info!");
        log::debug!("Hello debug!");

        vmodule::set_vmodule_level(&network, Level::Debug);
        log::debug!(logger: network_logger, "Hello network debug!");

        if i + 1 < repeat {
            std::thread::sleep(std::time::Duration::from_secs(10));
        }
    }

    backend.close().unwrap();
}
