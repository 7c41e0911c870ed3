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

//! Bridge from the `log` crate to a backend.

use std::sync::Arc;

use crate::Attr;
use crate::Backend;
use crate::Emit;
use crate::GlogLayout;
use crate::Level;
use crate::VModule;
use crate::vmodule::as_vmodule;

/// A `log::Log` implementation that formats records with a [`GlogLayout`] and hands them to an
/// [`Emit`] sink.
///
/// A handler may carry attributes that are appended to every record it formats. If one of them
/// is a verbosity attribute, its threshold gates the records of this handler instead of the
/// backend's global threshold.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use logforth_glog::Backend;
/// use logforth_glog::Handler;
/// use logforth_glog::Level;
/// use logforth_glog::Options;
/// use logforth_glog::vmodule;
///
/// let backend = Arc::new(Backend::new(Options::default().log_dir("logs")));
/// let handler = Handler::from_backend(backend);
///
/// let network = vmodule::vmodule("network", Level::Warn);
/// let network_handler = handler.with([network.clone()]);
///
/// // turn on debug logging of the network module only
/// vmodule::set_vmodule_level(&network, Level::Debug);
/// ```
#[derive(Debug, Clone)]
pub struct Handler {
    emitter: Arc<dyn Emit>,
    layout: GlogLayout,
    attrs: Vec<Attr>,
    vmodule: Option<VModule>,
}

impl Handler {
    /// Create a handler emitting to the given sink with the default layout.
    pub fn new<E: Emit>(emitter: Arc<E>) -> Handler {
        Handler {
            emitter,
            layout: GlogLayout::default(),
            attrs: vec![],
            vmodule: None,
        }
    }

    /// Create a handler whose layout truncates lines at the backend's message length limit.
    pub fn from_backend(backend: Arc<Backend>) -> Handler {
        let max_len = backend.options().message_len_limit();
        Handler::new(backend).with_layout(GlogLayout::default().max_len(max_len))
    }

    /// Replace the layout.
    #[must_use]
    pub fn with_layout(mut self, layout: GlogLayout) -> Handler {
        self.layout = layout;
        self
    }

    /// Return a handler carrying the given attributes in addition to the current ones.
    ///
    /// The last verbosity attribute given wins.
    pub fn with(&self, attrs: impl IntoIterator<Item = Attr>) -> Handler {
        let mut handler = self.clone();
        for attr in attrs {
            if let Some(vmodule) = as_vmodule(&attr) {
                handler.vmodule = Some(vmodule.clone());
            }
            handler.attrs.push(attr);
        }
        handler
    }

    /// The verbosity attribute gating this handler, if any.
    pub fn vmodule(&self) -> Option<&VModule> {
        self.vmodule.as_ref()
    }
}

impl log::Log for Handler {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.emitter
            .enabled(Level::from(metadata.level()), self.vmodule.as_ref())
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from(record.level());
        if !self.emitter.enabled(level, self.vmodule.as_ref()) {
            return;
        }

        let buf = self.layout.format(record, &self.attrs);
        // failures have been sent to the backend's trap
        let _ = self.emitter.emit(level, self.vmodule.as_ref(), &buf);
    }

    fn flush(&self) {
        let _ = self.emitter.flush();
    }
}

/// Set up the log crate global logger.
///
/// This function calls [`log::set_boxed_logger`] with the given handler and sets the global
/// maximum log level to `Trace`, so every record reaches the handler's own gating.
///
/// # Errors
///
/// Return an error if the log crate global logger has already been set.
pub fn setup_log_crate(handler: Handler) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(handler))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::Log;
    use log::Record;

    use super::*;
    use crate::Error;
    use crate::vmodule::set_vmodule_level;
    use crate::vmodule::vmodule;

    #[derive(Debug, Default)]
    struct Recorder {
        records: Mutex<Vec<(Level, Option<String>, String)>>,
    }

    impl Emit for Recorder {
        fn enabled(&self, level: Level, vmodule: Option<&VModule>) -> bool {
            level >= vmodule.map_or(Level::Info, |v| v.level())
        }

        fn emit(
            &self,
            level: Level,
            vmodule: Option<&VModule>,
            record: &[u8],
        ) -> Result<(), Error> {
            self.records.lock().unwrap().push((
                level,
                vmodule.map(|v| v.name().to_string()),
                String::from_utf8_lossy(record).into_owned(),
            ));
            Ok(())
        }

        fn flush(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn log(handler: &Handler, level: log::Level, msg: &str) {
        handler.log(
            &Record::builder()
                .args(format_args!("{msg}"))
                .level(level)
                .file(Some("lib.rs"))
                .line(Some(1))
                .build(),
        );
    }

    #[test]
    fn test_vmodule_gates_derived_handler() {
        let recorder = Arc::new(Recorder::default());
        let handler = Handler::new(recorder.clone());
        let net = vmodule("net", Level::Warn);
        let net_handler = handler.with([net.clone(), Attr::new("conn", 1)]);
        assert!(handler.vmodule().is_none());
        assert_eq!(net_handler.vmodule().map(|v| v.name()), Some("net"));

        log(&handler, log::Level::Info, "plain info");
        log(&net_handler, log::Level::Info, "net info");
        log(&net_handler, log::Level::Warn, "net warn");

        assert!(set_vmodule_level(&net, Level::Debug));
        log(&net_handler, log::Level::Debug, "net debug");
        log(&handler, log::Level::Debug, "plain debug");

        let records = recorder.records.lock().unwrap();
        let messages: Vec<_> = records
            .iter()
            .map(|(level, vmodule, line)| (*level, vmodule.clone(), line.clone()))
            .collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].0, Level::Info);
        assert_eq!(messages[0].1, None);
        assert!(messages[0].2.ends_with("lib.rs:1] plain info\n"));
        assert_eq!(messages[1].0, Level::Warn);
        assert_eq!(messages[1].1.as_deref(), Some("net"));
        assert!(messages[1].2.ends_with("lib.rs:1] net warn vmodule=net conn=1\n"));
        assert_eq!(messages[2].0, Level::Debug);
        assert!(messages[2].2.starts_with('D'));
    }

    #[test]
    fn test_last_vmodule_wins() {
        let recorder = Arc::new(Recorder::default());
        let handler = Handler::new(recorder)
            .with([vmodule("a", Level::Error)])
            .with([vmodule("b", Level::Debug)]);
        assert_eq!(handler.vmodule().map(|v| v.name()), Some("b"));
    }
}
