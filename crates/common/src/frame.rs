//! The wire frame and its `reply` contract (see SPEC_FULL.md §4.1).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// A nested, free-form record. Both `data` and `meta` use this shape.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Command,
    Event,
    Message,
    Request,
    Response,
}

impl Kind {
    /// The kind a reply to a frame of this kind carries: commands reply with
    /// commands, requests yield responses. Everything else replies in kind.
    fn reply_kind(self) -> Kind {
        match self {
            Kind::Request => Kind::Response,
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// One self-describing application message.
///
/// `kind` and `name` are always non-empty for a successfully decoded frame;
/// `uuid` carries request/response correlation and is the only field
/// `reply()` inherits from its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: Kind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Record,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Record,
}

impl Frame {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            uuid: None,
            data: Record::new(),
            meta: Record::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_data(mut self, data: Record) -> Self {
        self.data = data;
        self
    }

    /// Derive a reply frame: same correlation uuid, the kind appropriate to
    /// a reply to `self.kind`, and fresh (empty) meta (meta is always
    /// filled in by whatever relays the frame, never inherited).
    pub fn reply(&self, name: impl Into<String>, data: Option<Record>) -> Frame {
        Frame {
            kind: self.kind.reply_kind(),
            name: name.into(),
            uuid: self.uuid,
            data: data.unwrap_or_default(),
            meta: Record::new(),
        }
    }

    /// Drop the correlation uuid. Used by the small-frames outbound filter
    /// mode.
    pub fn clear_correlation(&mut self) {
        self.uuid = None;
    }

    /// Drop all meta. Used by the small-frames outbound filter mode.
    pub fn clear_meta(&mut self) {
        self.meta.clear();
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(|e| FrameError::Malformed(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Frame, FrameError> {
        let frame: Frame =
            serde_json::from_str(raw).map_err(|e| FrameError::Malformed(e.to_string()))?;
        if frame.name.is_empty() {
            return Err(FrameError::Malformed("frame name is empty".into()));
        }
        Ok(frame)
    }
}
