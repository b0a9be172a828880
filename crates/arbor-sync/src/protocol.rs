//! Binary framing of the realtime sync protocol.
//!
//! Frames use the y-protocols layout via `yrs::sync`, so standard Yjs
//! providers can talk to the gateway: a lib0 variable-length message type,
//! then for sync messages a sub-type and a length-prefixed payload. One
//! frame may carry several messages back to back.
//!
//! | type | sub-type | payload |
//! |------|----------|---------|
//! | 0 sync | 0 step 1 | encoded state vector |
//! | 0 sync | 1 step 2 | update with what the receiver lacks |
//! | 0 sync | 2 update | incremental update |
//! | 1 awareness | - | awareness update |
//! | 3 awareness query | - | none |
//!
//! Auth (type 2) and custom message types are not part of this protocol
//! and are rejected.

use crate::{SyncError, SyncResult};
use yrs::encoding::read::Cursor;
use yrs::sync::MessageReader;
use yrs::updates::decoder::DecoderV1;
use yrs::updates::encoder::Encode;

pub use yrs::sync::{AwarenessUpdate, Message, SyncMessage};

/// Decode every message packed into one frame
pub fn decode_frame(frame: &[u8]) -> SyncResult<Vec<Message>> {
    let mut decoder = DecoderV1::new(Cursor::new(frame));
    let mut messages = Vec::new();
    let mut consumed = 0;
    for message in MessageReader::new(&mut decoder) {
        let message = message.map_err(|e| SyncError::Protocol(format!("malformed frame: {e}")))?;
        match &message {
            Message::Auth(_) => {
                return Err(SyncError::Protocol("auth messages are not supported".into()))
            }
            Message::Custom(tag, _) => {
                return Err(SyncError::Protocol(format!("unknown message type {tag}")))
            }
            _ => {}
        }
        consumed += message.encode_v1().len();
        messages.push(message);
    }
    if messages.is_empty() {
        return Err(SyncError::Protocol("empty frame".into()));
    }
    // The reader stops quietly at a short read, so a truncated trailing
    // message shows up as unconsumed bytes.
    if consumed != frame.len() {
        return Err(SyncError::Protocol("truncated frame".into()));
    }
    Ok(messages)
}
