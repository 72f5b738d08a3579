use std::time::Duration;

use crossbeam::channel::Receiver;

use crate::channel::RecvTimeoutError;
use crate::metrics::{Counter, Gauge};

pub struct ChannelReceiver<T> {
    name: String,
    receiver: Receiver<T>,

    size: Gauge,
    drain_counter: Counter,
}

impl<T> ChannelReceiver<T> {
    pub fn new(name: &str, receiver: Receiver<T>, size: Gauge, drain_counter: Counter) -> Self {
        ChannelReceiver {
            name: name.to_string(),
            receiver,
            size,
            drain_counter,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Events sent but not received yet.
    pub fn size(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    fn on_success(&self) {
        self.size.fetch_sub(1);
        self.drain_counter.fetch_add(1);
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout).map(|event| {
            self.on_success();
            event
        })
    }
}
