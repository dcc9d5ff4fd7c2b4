//! Bounded FIFO of encoded packets between the demux pump and decoders.
//!
//! The bound is soft: pushes beyond capacity are accepted, and the pump
//! observes [`is_above_capacity`](PacketQueue::is_above_capacity) to decide
//! when to suspend on its backpressure condition. One producer (the pump
//! worker) and one consumer (a decoder) may operate concurrently without
//! further locking.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

/// An encoded payload plus its originating container stream.
#[derive(Clone, Debug)]
pub struct Packet {
    pub data: Bytes,
    pub stream_index: usize,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>, stream_index: usize) -> Self {
        Self {
            data: data.into(),
            stream_index,
        }
    }
}

/// Soft-bounded FIFO packet queue.
pub struct PacketQueue {
    packets: Mutex<VecDeque<Packet>>,
    capacity: usize,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a packet. Always accepts; overshoot is reported through
    /// [`is_above_capacity`](Self::is_above_capacity).
    pub fn push(&self, packet: Packet) {
        self.packets.lock().push_back(packet);
    }

    /// Removes and returns the oldest packet, if any.
    pub fn try_pop(&self) -> Option<Packet> {
        self.packets.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when the queue holds more packets than its soft capacity;
    /// the pump's cue to suspend.
    pub fn is_above_capacity(&self) -> bool {
        self.len() > self.capacity
    }
}
