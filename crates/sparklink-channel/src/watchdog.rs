//! Background timeout primitives.
//!
//! [`Alarm`] fires a callback once if nobody stops or feeds it before the
//! deadline. [`PeriodicTrigger`] fires a callback every period until stopped.
//! Each runs on its own named thread. Firing and stopping are decided under
//! one lock, so a stop racing with expiry either prevents the callback or
//! reports that it was too late, never both. Callbacks run without the lock
//! held, and dropping either primitive stops and joins its thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Armed,
    Fired,
    Stopped,
}

struct AlarmState {
    phase: Phase,
    timeout: Duration,
    deadline: Instant,
}

struct AlarmShared {
    state: Mutex<AlarmState>,
    wake: Condvar,
}

/// One-shot timeout.
pub struct Alarm {
    shared: Arc<AlarmShared>,
    handle: Option<JoinHandle<()>>,
}

impl Alarm {
    /// Arm a new alarm that calls `on_expiry` once after `timeout`.
    pub fn arm<F>(timeout: Duration, on_expiry: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(AlarmShared {
            state: Mutex::new(AlarmState {
                phase: Phase::Armed,
                timeout,
                deadline: Instant::now() + timeout,
            }),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("sparklink-alarm".into())
            .spawn(move || {
                if wait_for_expiry(&worker) {
                    debug!(timeout = ?timeout, "alarm fired");
                    on_expiry();
                }
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Push the deadline one full timeout into the future.
    ///
    /// Returns false if the alarm already fired or was stopped.
    pub fn reset(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Armed {
            return false;
        }
        state.deadline = Instant::now() + state.timeout;
        true
    }

    /// Cancel the alarm. Returns true if this call prevented the firing.
    ///
    /// Calling it again, or after the alarm fired, returns false.
    pub fn stop_alarm(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Armed {
            return false;
        }
        state.phase = Phase::Stopped;
        self.shared.wake.notify_all();
        true
    }

    pub fn has_fired(&self) -> bool {
        self.shared.state.lock().phase == Phase::Fired
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().phase == Phase::Armed
    }
}

/// Block until the deadline passes (true) or the alarm is stopped (false).
fn wait_for_expiry(shared: &AlarmShared) -> bool {
    let mut state = shared.state.lock();
    loop {
        match state.phase {
            Phase::Stopped | Phase::Fired => return false,
            Phase::Armed if Instant::now() >= state.deadline => {
                state.phase = Phase::Fired;
                return true;
            }
            Phase::Armed => {
                let deadline = state.deadline;
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.stop_alarm();
        join_unless_current(self.handle.take());
    }
}

impl std::fmt::Debug for Alarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Alarm")
            .field("phase", &state.phase)
            .field("timeout", &state.timeout)
            .finish()
    }
}

struct TriggerShared {
    running: Mutex<bool>,
    wake: Condvar,
    fired: AtomicU64,
}

/// Repeating timer.
pub struct PeriodicTrigger {
    shared: Arc<TriggerShared>,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTrigger {
    /// Call `on_tick` every `period`, first one period from now.
    pub fn start<F>(period: Duration, mut on_tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(TriggerShared {
            running: Mutex::new(true),
            wake: Condvar::new(),
            fired: AtomicU64::new(0),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("sparklink-trigger".into())
            .spawn(move || {
                let mut next = Instant::now() + period;
                loop {
                    {
                        let mut running = worker.running.lock();
                        while *running && Instant::now() < next {
                            worker.wake.wait_until(&mut running, next);
                        }
                        if !*running {
                            break;
                        }
                    }

                    on_tick();
                    worker.fired.fetch_add(1, Ordering::Relaxed);

                    next += period;
                    let now = Instant::now();
                    if next < now {
                        // Callback overran; skip missed ticks instead of bursting.
                        next = now + period;
                    }
                }
                debug!("periodic trigger stopped");
            })?;

        Ok(Self {
            shared,
            period,
            handle: Some(handle),
        })
    }

    /// Stop firing. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        let was_running = {
            let mut running = self.shared.running.lock();
            std::mem::replace(&mut *running, false)
        };
        self.shared.wake.notify_all();
        join_unless_current(self.handle.take());
        was_running
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }

    /// Number of completed callbacks.
    pub fn fired(&self) -> u64 {
        self.shared.fired.load(Ordering::Relaxed)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTrigger")
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}

fn join_unless_current(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[test]
    fn alarm_fires_once() {
        let (count, observed) = counter();
        let alarm = Alarm::arm(Duration::from_millis(20), move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        assert!(alarm.has_fired());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert!(!alarm.stop_alarm());
        assert!(!alarm.reset());
    }

    #[test]
    fn stopped_alarm_never_fires() {
        let (count, observed) = counter();
        let alarm = Alarm::arm(Duration::from_millis(100), move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(alarm.stop_alarm());
        assert!(!alarm.stop_alarm());
        thread::sleep(Duration::from_millis(200));
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert!(!alarm.has_fired());
    }

    #[test]
    fn reset_postpones_expiry() {
        let (count, observed) = counter();
        let alarm = Alarm::arm(Duration::from_millis(150), move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for _ in 0..4 {
            thread::sleep(Duration::from_millis(50));
            assert!(alarm.reset());
        }
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert!(alarm.is_armed());

        thread::sleep(Duration::from_millis(400));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cancels_alarm() {
        let (count, observed) = counter();
        let alarm = Alarm::arm(Duration::from_millis(50), move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        drop(alarm);
        thread::sleep(Duration::from_millis(120));
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_stop_and_expiry_fire_at_most_once() {
        for _ in 0..50 {
            let (count, observed) = counter();
            let alarm = Alarm::arm(Duration::from_millis(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            thread::sleep(Duration::from_micros(900));
            let prevented = alarm.stop_alarm();
            drop(alarm);

            let fired = observed.load(Ordering::SeqCst);
            assert!(fired <= 1);
            assert_eq!(prevented, fired == 0);
        }
    }

    #[test]
    fn periodic_trigger_repeats_until_stopped() {
        let (count, observed) = counter();
        let mut trigger = PeriodicTrigger::start(Duration::from_millis(10), move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(120));
        assert!(trigger.stop());
        let after_stop = observed.load(Ordering::SeqCst);
        assert!(after_stop >= 3, "only {after_stop} ticks");
        assert_eq!(trigger.fired() as usize, after_stop);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(observed.load(Ordering::SeqCst), after_stop);
        assert!(!trigger.stop());
        assert!(!trigger.is_running());
    }
}
