//! The tail-mode reordering buffer.
//!
//! Tail mode buffers the whole bounded stream, keeps only the most recent N
//! messages, and emits them in chronological order once the stream ends. The
//! buffer is owned by the single pipeline drain loop, so it needs no locking.

use kaftail_broker::Message;

/// Bounded buffer of the most recent messages, newest first.
#[derive(Debug)]
pub struct TailBuffer {
    capacity: usize,
    /// Sorted by timestamp descending; ties break by partition then offset
    entries: Vec<Message>,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a message, evicting the oldest entry when over capacity.
    pub fn insert(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        let key = sort_key(&message);
        // Newest first: find the first entry older than this message
        let position = self
            .entries
            .partition_point(|existing| sort_key(existing) > key);
        self.entries.insert(position, message);
        self.entries.truncate(self.capacity);
    }

    /// Drain the buffer oldest-to-newest.
    pub fn into_chronological(mut self) -> Vec<Message> {
        self.entries.reverse();
        self.entries
    }
}

fn sort_key(message: &Message) -> (i64, i32, i64) {
    let millis = message.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0);
    (millis, message.partition, message.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn message(partition: i32, offset: i64, millis: i64) -> Message {
        Message {
            topic: "events".to_string(),
            partition,
            offset,
            key: None,
            value: Some(format!("m-{partition}-{offset}").into_bytes()),
            headers: Vec::new(),
            timestamp: DateTime::from_timestamp_millis(millis),
        }
    }

    #[test]
    fn keeps_only_the_newest_n() {
        let mut buffer = TailBuffer::new(3);
        for offset in 0..10 {
            buffer.insert(message(0, offset, 1_000 + offset));
        }
        let drained = buffer.into_chronological();
        let offsets: Vec<i64> = drained.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, [7, 8, 9]);
    }

    #[test]
    fn emits_in_chronological_order_across_partitions() {
        let mut buffer = TailBuffer::new(4);
        buffer.insert(message(1, 0, 400));
        buffer.insert(message(0, 0, 100));
        buffer.insert(message(0, 1, 300));
        buffer.insert(message(1, 1, 200));
        let drained = buffer.into_chronological();
        let millis: Vec<i64> = drained
            .iter()
            .map(|m| m.timestamp.unwrap().timestamp_millis())
            .collect();
        assert_eq!(millis, [100, 200, 300, 400]);
    }

    #[test]
    fn out_of_order_arrivals_still_evict_the_oldest() {
        let mut buffer = TailBuffer::new(2);
        buffer.insert(message(0, 2, 300));
        buffer.insert(message(0, 0, 100));
        buffer.insert(message(0, 1, 200));
        let drained = buffer.into_chronological();
        let millis: Vec<i64> = drained
            .iter()
            .map(|m| m.timestamp.unwrap().timestamp_millis())
            .collect();
        assert_eq!(millis, [200, 300]);
    }

    #[test]
    fn missing_timestamps_sort_oldest() {
        let mut buffer = TailBuffer::new(2);
        let mut untimed = message(0, 5, 0);
        untimed.timestamp = None;
        buffer.insert(message(0, 1, 100));
        buffer.insert(untimed);
        buffer.insert(message(0, 2, 200));
        let drained = buffer.into_chronological();
        assert_eq!(drained[0].offset, 1);
        assert_eq!(drained[1].offset, 2);
    }
}
