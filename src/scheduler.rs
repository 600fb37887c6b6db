use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Ran,
    Busy,
    Unhealthy,
}

pub struct Scheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

const POLL_STEP: Duration = Duration::from_millis(250);

impl Scheduler {
    pub fn start<F>(interval: Duration, job: F) -> Self
    where
        F: Fn() -> JobOutcome + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        info!(interval_secs = interval.as_secs(), "starting scheduler");

        let handle = thread::spawn(move || {
            let mut next_run = Instant::now();
            while !stop_flag.load(Ordering::SeqCst) {
                if Instant::now() >= next_run {
                    match job() {
                        JobOutcome::Ran => {}
                        JobOutcome::Busy => {
                            info!("scheduler tick skipped, fetch already running");
                        }
                        JobOutcome::Unhealthy => {
                            warn!("raw landing store unhealthy, disabling scheduler");
                            stop_flag.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                    next_run = Instant::now() + interval;
                }
                thread::sleep(POLL_STEP);
            }
        });

        Self {
            stop,
            handle: Some(handle),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
        info!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}
