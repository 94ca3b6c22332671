//! Typed duplex request/grant/release transport (spec §3 Message Channel,
//! §6 wire payload, §9 "variant-typed messages").
//!
//! The wire-level shape in the original spec is three signed integers
//! (workerId, resourceId, quantity) with the sign of `quantity` tagging
//! request vs. release. This crate keeps that shape only where a worker
//! constructs a message; on the channel itself requests and releases are
//! a proper tagged enum, so the dispatcher never has to re-derive intent
//! from a sign bit.

use crate::process_table::WorkerId;

/// A message sent from a worker to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Request `quantity` units of `resource` (quantity > 0 on the wire).
    Request {
        worker_id: WorkerId,
        resource: usize,
        quantity: u32,
    },
    /// Release every unit held of `resource` (quantity < 0 on the wire;
    /// the magnitude carried there is ignored, per spec §4.F).
    Release {
        worker_id: WorkerId,
        resource: usize,
    },
}

impl Message {
    pub fn worker_id(&self) -> WorkerId {
        match *self {
            Message::Request { worker_id, .. } => worker_id,
            Message::Release { worker_id, .. } => worker_id,
        }
    }

    /// Build a message from the wire-level (workerId, resourceId,
    /// quantity) triple. `quantity == 0` is undefined per spec §4.F and
    /// is ignored (returns `None`).
    pub fn from_wire(worker_id: WorkerId, resource: usize, quantity: i64) -> Option<Message> {
        if quantity > 0 {
            Some(Message::Request {
                worker_id,
                resource,
                quantity: quantity as u32,
            })
        } else if quantity < 0 {
            Some(Message::Release {
                worker_id,
                resource,
            })
        } else {
            None
        }
    }
}

/// A reply from the coordinator to a single worker, addressed by worker
/// id (the Rust analogue of the source's `mtype == worker PID` idiom).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub resource: usize,
    pub quantity: u32,
}

/// The coordinator's view of the channel: one multi-producer queue for
/// incoming requests/releases, and one reply sender per live worker.
pub type RequestSender = crossbeam_channel::Sender<Message>;
pub type RequestReceiver = crossbeam_channel::Receiver<Message>;
pub type ReplySender = crossbeam_channel::Sender<Grant>;
pub type ReplyReceiver = crossbeam_channel::Receiver<Grant>;

pub fn request_channel() -> (RequestSender, RequestReceiver) {
    crossbeam_channel::unbounded()
}

pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_quantity_zero_is_ignored() {
        assert!(Message::from_wire(1, 0, 0).is_none());
    }

    #[test]
    fn wire_positive_quantity_is_a_request() {
        match Message::from_wire(1, 2, 3).unwrap() {
            Message::Request {
                worker_id,
                resource,
                quantity,
            } => {
                assert_eq!(worker_id, 1);
                assert_eq!(resource, 2);
                assert_eq!(quantity, 3);
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn wire_negative_quantity_is_a_release_regardless_of_magnitude() {
        match Message::from_wire(1, 2, -99).unwrap() {
            Message::Release { worker_id, resource } => {
                assert_eq!(worker_id, 1);
                assert_eq!(resource, 2);
            }
            _ => panic!("expected a release"),
        }
    }
}
