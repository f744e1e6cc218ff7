//! Producer/consumer channel with an explicit end-of-stream sentinel.
//!
//! Both pipeline stages (crawl → format, enumerate → merge) coordinate
//! through this queue. End-of-stream is an explicit marker sent by
//! [`QueueSender::finish`], not channel closure: a sender that drops
//! without finishing signals abortion, which the consumer must treat as
//! "no more input will ever arrive" rather than as a clean drain.

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

enum Msg<T> {
    Item(T),
    End,
}

/// Producing half of the queue.
pub struct QueueSender<T> {
    tx: SyncSender<Msg<T>>,
}

/// Consuming half of the queue.
pub struct QueueReceiver<T> {
    rx: Receiver<Msg<T>>,
}

/// One consumer-side receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    /// Next item in FIFO order.
    Item(T),
    /// The producer finished cleanly; this is always the last message.
    End,
    /// The producer went away without finishing. Partial work already
    /// flushed by the consumer is kept, buffered work is not.
    Aborted,
}

/// The consumer is gone; the producer must stop.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed;

impl std::fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("queue consumer is gone")
    }
}

impl std::error::Error for QueueClosed {}

/// Create a bounded FIFO queue with `capacity` in-flight items.
///
/// The bound supplies backpressure: a producer that outruns its consumer
/// blocks in [`QueueSender::push`] until the consumer catches up.
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = sync_channel(capacity);
    (QueueSender { tx }, QueueReceiver { rx })
}

impl<T> QueueSender<T> {
    /// Push one item, blocking while the queue is full.
    pub fn push(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(Msg::Item(item)).map_err(|_| QueueClosed)
    }

    /// Send the end-of-stream sentinel and consume the sender.
    pub fn finish(self) -> Result<(), QueueClosed> {
        self.tx.send(Msg::End).map_err(|_| QueueClosed)
    }
}

impl<T> QueueReceiver<T> {
    /// Receive the next message, blocking while the queue is empty.
    pub fn recv(&self) -> Recv<T> {
        match self.rx.recv() {
            Ok(Msg::Item(item)) => Recv::Item(item),
            Ok(Msg::End) => Recv::End,
            Err(_) => Recv::Aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_then_sentinel() {
        let (tx, rx) = bounded(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.push(3).unwrap();
        tx.finish().unwrap();

        assert_eq!(rx.recv(), Recv::Item(1));
        assert_eq!(rx.recv(), Recv::Item(2));
        assert_eq!(rx.recv(), Recv::Item(3));
        assert_eq!(rx.recv(), Recv::End);
    }

    #[test]
    fn dropped_sender_signals_abort() {
        let (tx, rx) = bounded::<u32>(4);
        tx.push(7).unwrap();
        drop(tx);

        assert_eq!(rx.recv(), Recv::Item(7));
        assert_eq!(rx.recv(), Recv::Aborted);
    }

    #[test]
    fn push_fails_when_consumer_gone() {
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert_eq!(tx.push(1), Err(QueueClosed));
    }

    #[test]
    fn finish_fails_when_consumer_gone() {
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert_eq!(tx.finish(), Err(QueueClosed));
    }

    #[test]
    fn cross_thread_order_preserved() {
        let (tx, rx) = bounded(2);
        let producer = std::thread::spawn(move || {
            for i in 0..100 {
                tx.push(i).unwrap();
            }
            tx.finish().unwrap();
        });

        let mut seen = Vec::new();
        loop {
            match rx.recv() {
                Recv::Item(i) => seen.push(i),
                Recv::End => break,
                Recv::Aborted => panic!("producer aborted"),
            }
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
