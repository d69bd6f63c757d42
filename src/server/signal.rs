use log::debug;
use std::sync::atomic::{AtomicU8, Ordering};

/// Listens for termination signals and stops the server.
///
/// The first signal stops accepting new requests and lets the running pulls finish,
/// the second one terminates right away.
pub struct SignalListener {
    signal_count: AtomicU8,
}

impl SignalListener {
    pub fn new() -> SignalListener {
        SignalListener {
            signal_count: AtomicU8::new(0),
        }
    }

    fn listen_inner<I, F>(&self, signals: I, stop: F)
    where
        I: IntoIterator<Item = i32>,
        F: Fn(),
    {
        use std::{process, thread::sleep, time::Duration};
        for signal in signals.into_iter() {
            let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
            if previous == 0 {
                debug!("Got signal {signal}, terminating after all pulls finished.");
                stop();
            } else {
                // Allow a little time for the clean shutdown to still happen.
                sleep(Duration::from_millis(100));
                debug!("Got signal {signal}, terminating right now.");
                process::exit(signal);
            }
        }
    }

    /// Block the thread and call `stop` on the first termination signal.
    #[cfg(unix)]
    pub fn listen<F: Fn()>(&self, stop: F) {
        use log::warn;
        use signal_hook::{
            consts::TERM_SIGNALS,
            iterator::{exfiltrator::SignalOnly, SignalsInfo},
        };
        let signals = SignalsInfo::<SignalOnly>::new(TERM_SIGNALS);
        if let Ok(mut signals) = signals {
            self.listen_inner(&mut signals, stop);
        } else {
            warn!("Failed setting up signal handler.");
        }
    }

    #[cfg(not(unix))]
    pub fn listen<F: Fn()>(&self, _stop: F) {
        debug!("Signal handlers are not supported on non-unix systems.");
    }
}

impl Default for SignalListener {
    fn default() -> Self {
        Self::new()
    }
}
