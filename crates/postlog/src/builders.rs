//! Call builders for fluent API.

use crate::types::{convert, Endpoint, IdentifyPayload, Payload, Properties, TrackPayload};
use crate::Error;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ============================================
// IDENTIFY BUILDER
// ============================================

/// Builder for identify calls.
#[derive(Debug, Clone)]
pub struct IdentifyBuilder {
    user_id: String,
    project: String,
    properties: Properties,
}

impl IdentifyBuilder {
    pub(crate) fn new(user_id: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project: project.into(),
            properties: Properties::new(),
        }
    }

    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add every entry of a property map.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Validate properties and build the payload.
    pub(crate) fn build(self) -> Result<IdentifyPayload, Error> {
        Ok(IdentifyPayload {
            user_id: self.user_id,
            project: self.project,
            properties: convert(self.properties)?,
        })
    }
}

// ============================================
// TRACK BUILDER
// ============================================

/// Builder for track calls.
#[derive(Debug, Clone)]
pub struct TrackBuilder {
    name: String,
    channel: String,
    project: String,
    user_id: String,
    icon: String,
    description: String,
    tags: Properties,
    timestamp: Option<i64>,
}

impl TrackBuilder {
    pub(crate) fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        project: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            project: project.into(),
            user_id: user_id.into(),
            icon: String::new(),
            description: String::new(),
            tags: Properties::new(),
            timestamp: None,
        }
    }

    /// Set the icon, usually a single emoji.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add every entry of a tag map.
    pub fn tags(mut self, tags: Properties) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Set custom timestamp (milliseconds since epoch).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Fix the timestamp to now unless one was set explicitly.
    pub(crate) fn stamp(mut self) -> Self {
        self.timestamp.get_or_insert_with(now_ms);
        self
    }

    /// Validate tags and build the payload.
    pub(crate) fn build(self) -> Result<TrackPayload, Error> {
        Ok(TrackPayload {
            tags: convert(self.tags)?,
            timestamp: self.timestamp.unwrap_or_else(now_ms),
            name: self.name,
            channel: self.channel,
            project: self.project,
            user_id: self.user_id,
            icon: self.icon,
            description: self.description,
        })
    }
}

// ============================================
// CALL
// ============================================

/// A call waiting on the build queue.
#[derive(Debug)]
pub(crate) enum Call {
    Identify(IdentifyBuilder),
    Track(TrackBuilder),
}

impl Call {
    pub(crate) fn endpoint(&self) -> Endpoint {
        match self {
            Call::Identify(_) => Endpoint::Identify,
            Call::Track(_) => Endpoint::Track,
        }
    }

    /// Validate properties or tags and build the payload.
    pub(crate) fn build(self) -> Result<Payload, Error> {
        match self {
            Call::Identify(builder) => builder.build().map(Payload::Identify),
            Call::Track(builder) => builder.build().map(Payload::Track),
        }
    }
}
