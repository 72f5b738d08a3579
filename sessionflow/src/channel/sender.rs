use crossbeam::channel::Sender;

use crate::channel::SendError;
use crate::metrics::{Counter, Gauge};

pub struct ChannelSender<T> {
    name: String,
    sender: Sender<T>,

    size: Gauge,
    counter: Counter,
}

impl<T> ChannelSender<T> {
    pub fn new(name: &str, sender: Sender<T>, size: Gauge, counter: Counter) -> Self {
        ChannelSender {
            name: name.to_string(),
            sender,
            size,
            counter,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    fn on_success(&self) {
        self.size.fetch_add(1);
        self.counter.fetch_add(1);
    }

    /// Blocks while the channel is full. Fails once every receiver is gone.
    pub fn send(&self, event: T) -> Result<(), SendError<T>> {
        self.sender.send(event).map(|r| {
            self.on_success();
            r
        })
    }
}

impl<T> Clone for ChannelSender<T> {
    fn clone(&self) -> Self {
        ChannelSender {
            name: self.name.clone(),
            sender: self.sender.clone(),
            size: self.size.clone(),
            counter: self.counter.clone(),
        }
    }
}
