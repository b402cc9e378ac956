//! A debounced one-shot timer driving the auto-flush policy.
//!
//! `set()` arms (or re-arms) a delay; `unset()` disarms it so no tick fires
//! for the current arming. At most one tick is ever pending per arming —
//! the sender task selects over `tick()` alongside its other signal
//! sources and drops a tick it can't act on immediately (a fresh arming
//! will produce another).

use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

enum Signal {
    Set,
    Unset,
}

/// Handle used by producers (request enqueue, flush enqueue) to arm/disarm
/// the timer.
#[derive(Clone)]
pub struct ThrottleTimer {
    control: mpsc::UnboundedSender<Signal>,
}

/// The consumer side; exactly one task should call `tick()`.
pub struct ThrottleTicks {
    ticks: Mutex<mpsc::UnboundedReceiver<()>>,
}

impl ThrottleTimer {
    pub fn new(delay: Duration) -> (ThrottleTimer, ThrottleTicks) {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Signal>();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            loop {
                // Wait for the first `Set` before arming anything.
                match control_rx.recv().await {
                    Some(Signal::Set) => {}
                    Some(Signal::Unset) => continue,
                    None => return,
                }
                loop {
                    tokio::select! {
                        sig = control_rx.recv() => {
                            match sig {
                                Some(Signal::Set) => continue, // restart the delay
                                Some(Signal::Unset) => break,  // disarm, wait for next Set
                                None => return,
                            }
                        }
                        _ = sleep(delay) => {
                            let _ = tick_tx.send(());
                            break;
                        }
                    }
                }
            }
        });

        (
            ThrottleTimer { control: control_tx },
            ThrottleTicks {
                ticks: Mutex::new(tick_rx),
            },
        )
    }

    pub fn set(&self) {
        let _ = self.control.send(Signal::Set);
    }

    pub fn unset(&self) {
        let _ = self.control.send(Signal::Unset);
    }
}

impl ThrottleTicks {
    /// Await the next tick. Cancel-safe: usable directly inside
    /// `tokio::select!`.
    pub async fn tick(&self) {
        let mut ticks = self.ticks.lock().await;
        ticks.recv().await;
    }
}
