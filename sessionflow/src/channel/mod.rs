use crate::channel::receiver::ChannelReceiver;
use crate::channel::sender::ChannelSender;
use crate::metrics::{register_counter, register_gauge, Tag};

pub const CHANNEL_SIZE_PREFIX: &str = "Channel.Size.";
pub const CHANNEL_ACCEPTED_PREFIX: &str = "Channel.Accepted.";
pub const CHANNEL_DRAIN_PREFIX: &str = "Channel.Drain.";

pub type SendError<T> = crossbeam::channel::SendError<T>;
pub type RecvTimeoutError = crossbeam::channel::RecvTimeoutError;

pub mod receiver;
pub mod sender;

/// A bounded channel whose depth and traffic are exported as metrics under `name`.
///
/// Senders block while the channel is full, which is how a slow partition pushes back on the
/// source.
pub fn named_channel<T>(
    name: &str,
    tags: Vec<Tag>,
    cap: usize,
) -> (ChannelSender<T>, ChannelReceiver<T>) {
    debug!("Create channel named with {}, capacity: {}", name, cap);

    let (sender, receiver) = crossbeam::channel::bounded(cap);

    let size = register_gauge(CHANNEL_SIZE_PREFIX.to_owned() + name, tags.clone());
    let accepted_counter =
        register_counter(CHANNEL_ACCEPTED_PREFIX.to_owned() + name, tags.clone());
    let drain_counter = register_counter(CHANNEL_DRAIN_PREFIX.to_owned() + name, tags);

    (
        ChannelSender::new(name, sender, size.clone(), accepted_counter),
        ChannelReceiver::new(name, receiver, size, drain_counter),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::channel::{named_channel, RecvTimeoutError};
    use crate::metrics::Tag;
    use crate::utils::thread::spawn;

    #[test]
    pub fn named_channel_test() {
        let (sender, receiver) = named_channel("test", vec![Tag::new("partition", 0)], 2);

        let handle = spawn("channel-test", move || {
            for i in 0..100u64 {
                sender.send(i).unwrap();
            }
        })
        .unwrap();

        let mut sum = 0;
        loop {
            match receiver.recv_timeout(Duration::from_secs(5)) {
                Ok(n) => sum += n,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => panic!("sender stalled"),
            }
        }
        handle.join().unwrap();

        assert_eq!(sum, 4950);
        assert_eq!(receiver.size(), 0);
    }
}
