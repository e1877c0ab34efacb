use prost::{bytes::BufMut, Message};

use super::{proto, BytesBus, MessageBus, WireError};
use crate::{
    abiencode::types::Address,
    messages::{ConversionError, ParticipantMessage},
};

/// Encode `msg` with a big-endian u16 length prefix.
///
/// Not `encode_length_delimited`, which would write the length as a LEB128
/// varint.
pub fn encode_frame<T: Message>(msg: &T) -> Result<Vec<u8>, WireError> {
    let len = msg.encoded_len();
    if len > u16::MAX as usize {
        return Err(WireError::MessageTooLong(len));
    }

    let mut buf = Vec::with_capacity(2 + len);
    buf.put_slice(&(len as u16).to_be_bytes());
    msg.encode(&mut buf)?;
    Ok(buf)
}

/// Decode one frame written by [encode_frame]. Returns the message and the
/// number of bytes consumed.
pub fn decode_frame<T: Message + Default>(buf: &[u8]) -> Result<(T, usize), WireError> {
    if buf.len() < 2 {
        return Err(WireError::Truncated {
            expected: 2,
            actual: buf.len(),
        });
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let body = buf.get(2..2 + len).ok_or(WireError::Truncated {
        expected: len,
        actual: buf.len() - 2,
    })?;
    Ok((T::decode(body)?, 2 + len))
}

/// [MessageBus] writing protobuf [proto::Envelope]s to a [BytesBus].
#[derive(Debug)]
pub struct ProtoBufEncodingLayer<B: BytesBus> {
    pub bus: B,
    pub sender: Address,
}

impl<B: BytesBus> ProtoBufEncodingLayer<B> {
    pub fn new(bus: B, sender: Address) -> Self {
        Self { bus, sender }
    }

    pub fn encode(&self, recipient: &Address, msg: ParticipantMessage) -> Result<Vec<u8>, WireError> {
        let envelope = proto::Envelope {
            sender: self.sender.0.to_vec(),
            recipient: recipient.0.to_vec(),
            msg: Some(msg.into()),
        };
        encode_frame(&envelope)
    }

}

/// Decode a frame written by [ProtoBufEncodingLayer] into the sender and the
/// message.
pub fn decode_envelope(buf: &[u8]) -> Result<(Address, ParticipantMessage), WireError> {
    let (envelope, _) = decode_frame::<proto::Envelope>(buf)?;
    let sender = Address::try_from(envelope.sender.as_slice()).map_err(|_| {
        ConversionError::ByteLengthMismatch {
            field: "sender",
            expected: 20,
            actual: envelope.sender.len(),
        }
    })?;
    let msg = envelope
        .msg
        .ok_or(ConversionError::ExpectedSome("msg"))?
        .try_into()?;
    Ok((sender, msg))
}

impl<B: BytesBus> MessageBus for ProtoBufEncodingLayer<B> {
    fn send_to_participant(&self, recipient: &Address, msg: ParticipantMessage) {
        match self.encode(recipient, msg) {
            Ok(buf) => self.bus.send_to_participant(recipient, &buf),
            Err(e) => tracing::warn!(?recipient, error = %e, "dropping message that cannot be encoded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{test_utils::{setup, state}, SignedState},
        messages::{FundingStrategy, StrategyMessage},
        Hash,
    };
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct Wire(RefCell<Vec<(Address, Vec<u8>)>>);

    impl BytesBus for Wire {
        fn send_to_participant(&self, recipient: &Address, msg: &[u8]) {
            self.0.borrow_mut().push((*recipient, msg.to_vec()));
        }
    }

    #[test]
    fn length_prefix_is_big_endian_u16() {
        let msg = proto::StrategyAgreed {
            target_channel_id: vec![0xab; 32],
            strategy: proto::Strategy::Ledger as i32,
        };
        let buf = encode_frame(&msg).unwrap();
        // 2 bytes prefix, field 1 (tag + len + 32 bytes), field 2 (tag + value)
        assert_eq!(&buf[..2], &[0x00, 36]);
        assert_eq!(buf.len(), 2 + 36);

        let (decoded, used) = decode_frame::<proto::StrategyAgreed>(&buf).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let buf = encode_frame(&proto::StrategyAgreed {
            target_channel_id: vec![1; 32],
            strategy: 0,
        })
        .unwrap();
        assert!(matches!(
            decode_frame::<proto::StrategyAgreed>(&buf[..10]),
            Err(WireError::Truncated { .. })
        ));
        assert!(matches!(
            decode_frame::<proto::StrategyAgreed>(&buf[..1]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn envelope_round_trip_through_bytes_bus() {
        let (channel, signers) = setup(2, 0);
        let me = signers[0].address();
        let peer = signers[1].address();
        let layer = ProtoBufEncodingLayer::new(Wire::default(), me);

        let signed = SignedState::sign(state(&channel, 1), &signers[0]).unwrap();
        let states = ParticipantMessage::SignedStates(vec![signed]);
        let strategy = ParticipantMessage::Strategy(StrategyMessage::StrategyRejected {
            target_channel_id: Hash([2; 32]),
            strategy: FundingStrategy::Ledger,
        });
        layer.send_to_participant(&peer, states.clone());
        layer.send_to_participant(&peer, strategy.clone());

        let sent = layer.bus.0.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, peer);
        assert_eq!(
            decode_envelope(&sent[0].1).unwrap(),
            (me, states)
        );
        assert_eq!(
            decode_envelope(&sent[1].1).unwrap(),
            (me, strategy)
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let buf = [0x00, 0x03, 0xff, 0xff, 0xff];
        assert!(decode_envelope(&buf).is_err());
    }
}
