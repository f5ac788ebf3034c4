//! Wire frames posted by a worker program
//!
//! After startup every message a worker program sends is a two element JSON
//! array `[tag, payload]`. The tag tells a progress report from the return
//! value of the call.

use serde_json::Value;

/// Frame tags. The bootstrap template embeds these exact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Sent by `this.send(data)`, the call is still in flight
    Progress = 0,
    /// Sent with the return value, the call is finished
    Completion = 1,
}

impl FrameKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(FrameKind::Progress),
            1 => Some(FrameKind::Completion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Value,
}

impl Frame {
    pub fn progress(payload: Value) -> Self {
        Self {
            kind: FrameKind::Progress,
            payload,
        }
    }

    pub fn completion(payload: Value) -> Self {
        Self {
            kind: FrameKind::Completion,
            payload,
        }
    }

    /// Parse a message posted by the worker. The error describes what was wrong.
    pub fn decode(message: Value) -> Result<Self, String> {
        let Value::Array(mut items) = message else {
            return Err(format!("expected [tag, payload], got {}", message));
        };
        if items.len() != 2 {
            return Err(format!(
                "expected [tag, payload], got an array of {} items",
                items.len()
            ));
        }

        let payload = items.pop().unwrap_or_default();
        let tag = &items[0];
        let kind = tag
            .as_u64()
            .and_then(FrameKind::from_tag)
            .ok_or_else(|| format!("unknown frame tag {}", tag))?;

        Ok(Self { kind, payload })
    }

    pub fn encode(&self) -> Value {
        Value::Array(vec![Value::from(self.kind.tag()), self.payload.clone()])
    }
}
