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

//! Per-module verbosity attributes.
//!
//! A verbosity attribute carries a private severity threshold. Log calls that carry the
//! attribute are gated by that threshold instead of the backend's global one, so debug logging
//! can be turned on for one module at runtime without affecting any other module.
//!
//! # Examples
//!
//! ```
//! use logforth_glog::Level;
//! use logforth_glog::vmodule;
//!
//! let network = vmodule::vmodule("network", Level::Info);
//! assert_eq!(vmodule::vmodule_level(&network), Some(Level::Info));
//!
//! assert!(vmodule::set_vmodule_level(&network, Level::Debug));
//! assert_eq!(vmodule::vmodule_level(&network), Some(Level::Debug));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::Level;
use crate::LevelVar;
use crate::attr::Attr;
use crate::attr::Value;

/// The attribute key verbosity attributes are stored under.
pub const VMODULE_KEY: &str = "vmodule";

/// A named, independently mutable severity threshold.
///
/// Clones share the same threshold: a change made through one clone is observed by every other.
#[derive(Clone)]
pub struct VModule(Arc<VModuleInner>);

struct VModuleInner {
    name: String,
    level: LevelVar,
}

impl VModule {
    /// Create a new verbosity attribute value.
    pub fn new(name: impl Into<String>, level: Level) -> Self {
        Self(Arc::new(VModuleInner {
            name: name.into(),
            level: LevelVar::new(level),
        }))
    }

    /// Return the display name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Return the current threshold.
    pub fn level(&self) -> Level {
        self.0.level.get()
    }

    /// Change the threshold, returning the previous one.
    pub fn set_level(&self, level: Level) -> Level {
        self.0.level.set(level)
    }
}

impl fmt::Debug for VModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VModule")
            .field("name", &self.0.name)
            .field("level", &self.level())
            .finish()
    }
}

/// Create a module verbosity control attribute.
pub fn vmodule(name: impl Into<String>, level: Level) -> Attr {
    Attr::new(VMODULE_KEY, VModule::new(name, level))
}

/// Return the verbosity attribute carried by `attr`, if it is one.
pub fn as_vmodule(attr: &Attr) -> Option<&VModule> {
    if attr.key() != VMODULE_KEY {
        return None;
    }
    match attr.value() {
        Value::VModule(v) => Some(v),
        _ => None,
    }
}

/// Change a verbosity attribute's level. Returns false if `attr` is not a verbosity attribute.
pub fn set_vmodule_level(attr: &Attr, level: Level) -> bool {
    match as_vmodule(attr) {
        Some(v) => {
            v.set_level(level);
            true
        }
        None => false,
    }
}

/// Retrieve a verbosity attribute's level. Returns `None` if `attr` is not a verbosity attribute.
pub fn vmodule_level(attr: &Attr) -> Option<Level> {
    as_vmodule(attr).map(VModule::level)
}
