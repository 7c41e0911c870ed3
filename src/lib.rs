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

//! Severity-leveled, glog-style log files for Rust applications.
//!
//! # Overview
//!
//! A [`Backend`] keeps one log file per enabled severity. A record is written to the file of its
//! own severity and of every enabled severity below it, so the `INFO` file is the complete log
//! while the `ERROR` file only holds errors. Files are named the way glog names them:
//!
//! ```text
//! {program}.{host}.{user}.log.{SEVERITY}.{YYYYMMDD-HHMMSS}.{pid}
//! ```
//!
//! and a `{program}.{SEVERITY}` symlink points at the latest file of each severity. Files rotate
//! once they reach the maximum size, and a restarted process reopens a recent, non-full file
//! instead of creating a new one.
//!
//! Verbosity attributes ([`vmodule`]) override the global threshold for the records that carry
//! them, so one module can be switched to debug logging at runtime.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use logforth_glog::Backend;
//! use logforth_glog::Handler;
//! use logforth_glog::Options;
//!
//! let backend = Arc::new(Backend::new(Options::default().log_dir("logs")));
//! logforth_glog::setup_log_crate(Handler::from_backend(backend.clone())).unwrap();
//!
//! log::info!("This is an info message.");
//! log::error!("This error lands in the INFO, WARN and ERROR files.");
//!
//! backend.close().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod vmodule;

mod attr;
mod backend;
mod bridge;
mod emit;
mod error;
mod file;
mod flush;
mod identity;
mod layout;
mod level;
mod options;
mod trap;

pub use self::attr::Attr;
pub use self::attr::Value;
pub use self::backend::Backend;
pub use self::bridge::Handler;
pub use self::bridge::setup_log_crate;
pub use self::emit::Emit;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::identity::Identity;
pub use self::layout::GlogLayout;
pub use self::level::Level;
pub use self::level::LevelVar;
pub use self::options::Options;
pub use self::options::ReuseStrategy;
pub use self::trap::DefaultTrap;
pub use self::trap::Trap;
pub use self::vmodule::VModule;
