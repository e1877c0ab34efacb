//! Transport abstraction: message buses, the protobuf encoding layer and a
//! bounded outbound queue.

mod encoding;
pub mod proto;

use core::fmt::Debug;
use std::collections::VecDeque;

pub use encoding::{decode_envelope, decode_frame, encode_frame, ProtoBufEncodingLayer};

use crate::{abiencode::types::Address, messages::ParticipantMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message of {0} bytes does not fit the u16 length prefix")]
    MessageTooLong(usize),
    #[error("frame announces {expected} bytes, {actual} available")]
    Truncated { expected: usize, actual: usize },
    #[error(transparent)]
    Encode(#[from] prost::EncodeError),
    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
    #[error(transparent)]
    Conversion(#[from] crate::messages::ConversionError),
    #[error("outbound queue is full ({0} messages)")]
    QueueFull(usize),
}

/// Byte-level transport, implemented by the application.
pub trait BytesBus: Debug {
    fn send_to_participant(&self, recipient: &Address, msg: &[u8]);
}

/// Message-level transport.
pub trait MessageBus: Debug {
    fn send_to_participant(&self, recipient: &Address, msg: ParticipantMessage);
}

/// What [OutboundQueue::push] does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Backpressure {
    /// Evict the oldest queued message to make room.
    DropOldest,
    /// Refuse the new message.
    Reject,
}

/// Bounded buffer between the protocol logic and the transport.
///
/// Losing a message is always safe: unsupported states can be discarded and
/// a stalled peer is handled through the adjudicator.
#[derive(Debug)]
pub struct OutboundQueue {
    queue: VecDeque<(Address, ParticipantMessage)>,
    capacity: usize,
    policy: Backpressure,
}

impl OutboundQueue {
    pub fn new(capacity: usize, policy: Backpressure) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Queue `msg`. Returns the evicted message under
    /// [Backpressure::DropOldest].
    pub fn push(
        &mut self,
        recipient: Address,
        msg: ParticipantMessage,
    ) -> Result<Option<(Address, ParticipantMessage)>, WireError> {
        if self.capacity == 0 {
            return Err(WireError::QueueFull(0));
        }
        let mut evicted = None;
        if self.queue.len() >= self.capacity {
            match self.policy {
                Backpressure::Reject => return Err(WireError::QueueFull(self.capacity)),
                Backpressure::DropOldest => {
                    evicted = self.queue.pop_front();
                    tracing::warn!(capacity = self.capacity, "outbound queue full, dropping oldest message");
                }
            }
        }
        self.queue.push_back((recipient, msg));
        Ok(evicted)
    }

    pub fn pop(&mut self) -> Option<(Address, ParticipantMessage)> {
        self.queue.pop_front()
    }

    /// Hand every queued message to `bus`, oldest first.
    pub fn flush<B: MessageBus + ?Sized>(&mut self, bus: &B) -> usize {
        let n = self.queue.len();
        for (recipient, msg) in self.queue.drain(..) {
            bus.send_to_participant(&recipient, msg);
        }
        n
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
