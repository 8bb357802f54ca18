use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::warn;

use crate::message::Message;

struct QueueInner {
    messages: VecDeque<Message>,
    amount: usize,
}

/// Thread-safe bounded FIFO of decoded messages with a running byte tally.
///
/// Pushing never blocks: a full queue drops the incoming message, since the
/// producer is a transport thread that must stay responsive. Each push wakes
/// one waiting consumer.
pub(crate) struct MessageQueue {
    limit: usize,
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl MessageQueue {
    pub(crate) fn new(limit: usize) -> Self {
        MessageQueue {
            limit,
            inner: Mutex::new(QueueInner {
                messages: VecDeque::new(),
                amount: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueues a message, returning the new queue depth, or `None` when
    /// the queue is full and the message was dropped.
    pub(crate) fn push(&self, message: Message) -> Option<usize> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        if inner.messages.len() >= self.limit {
            warn!("receive queue is full, dropping message");
            return None;
        }
        inner.amount += message.size();
        inner.messages.push_back(message);
        let len = inner.messages.len();
        drop(inner);
        self.available.notify_one();
        Some(len)
    }

    pub(crate) fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock().ok()?;
        let message = inner.messages.pop_front()?;
        inner.amount -= message.size();
        Some(message)
    }

    /// Blocking pop bounded by `timeout`.
    pub(crate) fn pop_wait(&self, timeout: Duration) -> Option<Message> {
        let mut inner = self.inner.lock().ok()?;
        while inner.messages.is_empty() {
            let (guard, result) = self.available.wait_timeout(inner, timeout).ok()?;
            inner = guard;
            if result.timed_out() && inner.messages.is_empty() {
                return None;
            }
        }
        let message = inner.messages.pop_front()?;
        inner.amount -= message.size();
        Some(message)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.messages.len()).unwrap_or(0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes currently buffered.
    pub(crate) fn amount(&self) -> usize {
        self.inner.lock().map(|inner| inner.amount).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_queue_push_pop_order() {
        let queue = MessageQueue::new(8);
        assert!(queue.is_empty());

        queue.push(Message::from("first"));
        queue.push(Message::from("second"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.amount(), 11);

        assert_eq!(queue.pop(), Some(Message::from("first")));
        assert_eq!(queue.pop(), Some(Message::from("second")));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.amount(), 0);
    }

    #[test]
    fn test_queue_drops_when_full() {
        let queue = MessageQueue::new(2);
        assert_eq!(queue.push(Message::from("a")), Some(1));
        assert_eq!(queue.push(Message::from("b")), Some(2));
        assert_eq!(queue.push(Message::from("c")), None);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.amount(), 2);
    }

    #[test]
    fn test_queue_push_wakes_waiter() {
        let queue = Arc::new(MessageQueue::new(8));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_wait(Duration::from_secs(5)))
        };

        queue.push(Message::from("wake"));
        assert_eq!(consumer.join().unwrap(), Some(Message::from("wake")));
    }

    #[test]
    fn test_queue_pop_wait_times_out() {
        let queue = MessageQueue::new(8);
        assert_eq!(queue.pop_wait(Duration::from_millis(10)), None);
    }
}
