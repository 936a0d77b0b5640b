//! Background driver for hash sweeps.
//!
//! One loop per scheduler: an early first sweep shortly after start, then a
//! sweep every interval. Manual triggers wake the loop for an extra sweep.
//! Sweeps never overlap because the loop runs them inline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::HashError;
use crate::hashing::worker::HashWorker;

/// Requests an extra sweep from a running [`HashScheduler`].
#[derive(Clone)]
pub struct SweepTrigger {
    tx: broadcast::Sender<()>,
    in_flight: Arc<AtomicBool>,
}

impl SweepTrigger {
    /// Asks for a sweep. Returns `false` if one is already running, in which
    /// case the request is dropped.
    pub fn trigger(&self) -> bool {
        if self.in_flight.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(()).is_ok()
    }

    pub fn is_sweeping(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Periodic hash sweep scheduler.
pub struct HashScheduler {
    worker: Arc<HashWorker>,
    initial_delay: Duration,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    started: AtomicBool,
    wake_tx: broadcast::Sender<()>,
}

impl HashScheduler {
    /// Creates a scheduler using the worker's configured timings.
    pub fn new(worker: HashWorker) -> Self {
        let initial_delay = worker.config().initial_delay();
        let interval = worker.config().interval();
        Self::with_timing(worker, initial_delay, interval)
    }

    pub fn with_timing(worker: HashWorker, initial_delay: Duration, interval: Duration) -> Self {
        let (wake_tx, _) = broadcast::channel(16);
        Self {
            worker: Arc::new(worker),
            initial_delay,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            wake_tx,
        }
    }

    pub fn trigger_handle(&self) -> SweepTrigger {
        SweepTrigger {
            tx: self.wake_tx.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Starts the sweep loop on its own thread.
    ///
    /// Join the returned handle after [`stop`](Self::stop) to wait for the
    /// in-flight sweep.
    pub fn start(&self) -> Result<JoinHandle<()>, HashError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HashError::TaskFailed(
                "hash scheduler already started".to_string(),
            ));
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HashError::TaskFailed(format!("failed to build runtime: {}", e)))?;

        let worker = Arc::clone(&self.worker);
        let shutdown = Arc::clone(&self.shutdown);
        let in_flight = Arc::clone(&self.in_flight);
        let mut wake_rx = self.wake_tx.subscribe();
        let initial_delay = self.initial_delay;
        let interval = self.interval;

        std::thread::Builder::new()
            .name("hash-scheduler".to_string())
            .spawn(move || {
                rt.block_on(async move {
                    // First fire early; a trigger or stop cuts the wait short.
                    tokio::select! {
                        _ = tokio::time::sleep(initial_delay) => {},
                        _ = wake_rx.recv() => {},
                    }

                    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        in_flight.store(true, Ordering::Release);
                        match worker.sweep(&shutdown).await {
                            Ok(stats) if stats.hashed > 0 => {
                                log::info!("Hash sweep hashed {} entries", stats.hashed)
                            }
                            Ok(_) => {}
                            Err(e) => log::error!("Hash sweep failed: {}", e),
                        }
                        drain(&mut wake_rx);
                        in_flight.store(false, Ordering::Release);

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = ticker.tick() => {},
                            msg = wake_rx.recv() => match msg {
                                Ok(()) | Err(RecvError::Lagged(_)) => {
                                    if !shutdown.load(Ordering::Acquire) {
                                        log::info!("Manual hash sweep triggered");
                                    }
                                }
                                Err(RecvError::Closed) => break,
                            },
                        }
                    }

                    log::info!("Hash scheduler stopped");
                });
            })
            .map_err(|e| HashError::TaskFailed(format!("failed to spawn scheduler: {}", e)))
    }

    /// Signals the loop to stop. A running sweep finishes its current entry.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.wake_tx.send(());
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Drops triggers that arrived while a sweep was running.
fn drain(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashingConfig;
    use crate::db::{entry_repo, Database};
    use crate::model::{Entry, GameFormat};
    use tempfile::TempDir;

    fn worker_with_file(dir: &TempDir) -> (HashWorker, Database, String) {
        let db = Database::open_in_memory().unwrap();
        let path = dir.path().join("a.nsp");
        std::fs::write(&path, b"hello world").unwrap();
        let entry = Entry::new_file("a", path.to_str().unwrap(), GameFormat::Nsp, 11, "admin");
        entry_repo::insert(&db, &entry).unwrap();

        let config = HashingConfig {
            entry_delay_ms: 0,
            ..HashingConfig::default()
        };
        (HashWorker::new(db.clone(), config), db, entry.id)
    }

    fn wait_until_hashed(db: &Database, id: &str) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while std::time::Instant::now() < deadline {
            let entry = entry_repo::find_by_id(db, id).unwrap().unwrap();
            if entry.digest.is_hashed() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_scheduler_shutdown() {
        let dir = TempDir::new().unwrap();
        let (worker, _db, _id) = worker_with_file(&dir);
        let scheduler = HashScheduler::with_timing(
            worker,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        let handle = scheduler.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        handle.join().expect("scheduler thread panicked");
        assert!(scheduler.is_stopping());
    }

    #[test]
    fn test_initial_sweep_fires_early() {
        let dir = TempDir::new().unwrap();
        let (worker, db, id) = worker_with_file(&dir);
        let scheduler = HashScheduler::with_timing(
            worker,
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );

        let handle = scheduler.start().unwrap();
        assert!(wait_until_hashed(&db, &id));
        scheduler.stop();
        handle.join().expect("scheduler thread panicked");
    }

    #[test]
    fn test_manual_trigger_runs_sweep() {
        let dir = TempDir::new().unwrap();
        let (worker, db, id) = worker_with_file(&dir);
        let scheduler = HashScheduler::with_timing(
            worker,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );
        let trigger = scheduler.trigger_handle();

        let handle = scheduler.start().unwrap();
        assert!(trigger.trigger());
        assert!(wait_until_hashed(&db, &id));

        scheduler.stop();
        handle.join().expect("scheduler thread panicked");
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (worker, _db, _id) = worker_with_file(&dir);
        let scheduler = HashScheduler::with_timing(
            worker,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        let handle = scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        scheduler.stop();
        handle.join().expect("scheduler thread panicked");
    }
}
