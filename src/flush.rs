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
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;

use crate::Error;
use crate::Level;
use crate::trap::Trap;

/// Flush the files of every level (`None`) or of the given level and above.
pub(crate) type FlushFn = dyn Fn(Option<Level>) -> Result<(), Error> + Send + Sync + 'static;

/// The background thread that periodically flushes the level files.
///
/// It can also be notified to flush immediately. Notifications never block: while a
/// notification is pending, further ones are dropped.
#[derive(Debug)]
pub(crate) struct FlushDaemon {
    notifier: Sender<Level>,
    state: Mutex<Option<State>>,
}

#[derive(Debug)]
struct State {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushDaemon {
    pub(crate) fn start(interval: Duration, trap: Arc<dyn Trap>, flush: Arc<FlushFn>) -> Self {
        let (notifier, notified) = crossbeam_channel::bounded(1);
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(0);

        let worker = Worker {
            interval,
            trap,
            flush,
            notified,
            shutdown: shutdown_rx,
        };
        let handle = std::thread::Builder::new()
            .name("logforth-glog-flush".to_string())
            .spawn(move || worker.run())
            .expect("failed to spawn the log flush thread");

        Self {
            notifier,
            state: Mutex::new(Some(State { shutdown, handle })),
        }
    }

    /// Ask the daemon to flush the files of `level` and above as soon as possible.
    pub(crate) fn notify(&self, level: Level) {
        match self.notifier.try_send(level) {
            Ok(()) => {}
            // a flush is already pending
            Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Stop the daemon and wait for its final flush. Return `false` if it was already stopped.
    pub(crate) fn stop(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(State { shutdown, handle }) = state.take() else {
            return false;
        };

        // the worker breaks its loop once the shutdown channel disconnects
        drop(shutdown);
        if handle.join().is_err() {
            eprintln!("log flush thread panicked");
        }
        true
    }
}

impl Drop for FlushDaemon {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    interval: Duration,
    trap: Arc<dyn Trap>,
    flush: Arc<FlushFn>,
    notified: Receiver<Level>,
    shutdown: Receiver<()>,
}

impl Worker {
    fn run(self) {
        let ticker = crossbeam_channel::tick(self.interval);
        loop {
            crossbeam_channel::select! {
                recv(ticker) -> _ => self.flush(None),
                recv(self.notified) -> msg => match msg {
                    Ok(level) => self.flush(Some(level)),
                    Err(_) => break,
                },
                recv(self.shutdown) -> _ => break,
            }
        }
        self.flush(None);
    }

    fn flush(&self, level: Option<Level>) {
        if let Err(err) = (self.flush)(level) {
            self.trap.trap(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    use super::*;
    use crate::ErrorKind;
    use crate::trap::DefaultTrap;

    #[derive(Debug, Default)]
    struct CountingTrap(AtomicUsize);

    impl Trap for Arc<CountingTrap> {
        fn trap(&self, _: &Error) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_notified_flush_runs_before_tick() {
        let seen = Arc::new(Mutex::new(vec![]));
        let flush: Arc<FlushFn> = {
            let seen = seen.clone();
            Arc::new(move |level: Option<Level>| -> Result<(), Error> {
                seen.lock().unwrap().push(level);
                Ok(())
            })
        };
        let daemon = FlushDaemon::start(
            Duration::from_secs(3600),
            Arc::new(DefaultTrap::default()),
            flush,
        );

        daemon.notify(Level::Error);
        assert!(wait_until(|| !seen.lock().unwrap().is_empty()));
        assert_eq!(seen.lock().unwrap()[0], Some(Level::Error));

        assert!(daemon.stop());
        assert_eq!(seen.lock().unwrap().last(), Some(&None));
        assert!(!daemon.stop());
    }

    #[test]
    fn test_periodic_flush() {
        let count = Arc::new(AtomicUsize::new(0));
        let flush: Arc<FlushFn> = {
            let count = count.clone();
            Arc::new(move |_: Option<Level>| -> Result<(), Error> {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let daemon = FlushDaemon::start(
            Duration::from_millis(10),
            Arc::new(DefaultTrap::default()),
            flush,
        );
        assert!(wait_until(|| count.load(Ordering::SeqCst) >= 3));
        drop(daemon);
    }

    #[test]
    fn test_flush_errors_are_trapped() {
        let trap = Arc::new(CountingTrap::default());
        let flush: Arc<FlushFn> = Arc::new(|_: Option<Level>| -> Result<(), Error> {
            Err(Error::new(ErrorKind::Flush, "failed to flush"))
        });
        let daemon = FlushDaemon::start(Duration::from_secs(3600), Arc::new(trap.clone()), flush);

        assert!(daemon.stop());
        assert_eq!(trap.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_never_blocks() {
        let flush: Arc<FlushFn> = Arc::new(|_: Option<Level>| -> Result<(), Error> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        });
        let daemon = FlushDaemon::start(
            Duration::from_secs(3600),
            Arc::new(DefaultTrap::default()),
            flush,
        );

        let start = Instant::now();
        for _ in 0..1000 {
            daemon.notify(Level::Warn);
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        daemon.stop();
        daemon.notify(Level::Error);
    }
}
