use parking_lot::Mutex;
use tokio::sync::oneshot;

/// One-shot initialization latch.
///
/// `wait` resolves immediately once the gate is open; before that, each
/// waiter parks on a oneshot channel. `open` releases the parked waiters in
/// the order they subscribed and is a no-op on any later call.
pub struct InitGate {
    state: Mutex<GateState>,
}

struct GateState {
    open: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                open: false,
                waiters: Vec::new(),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Suspend until the gate opens. There is no timeout; a waiter is
    /// bounded only by the lifetime of the gate itself.
    pub async fn wait(&self) {
        let rx = {
            let mut state = self.state.lock();
            if state.open {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };
        // A dropped sender means the gate itself went away; treat as released.
        let _ = rx.await;
    }

    /// Open the gate, releasing all current waiters in subscription order.
    pub fn open(&self) {
        let waiters = {
            let mut state = self.state.lock();
            if state.open {
                return;
            }
            state.open = true;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}
