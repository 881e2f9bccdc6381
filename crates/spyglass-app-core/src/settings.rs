// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted Spyglass settings (history bound, diagnostics, default breakpoint).

use serde::{Deserialize, Serialize};
use spyglass_core::{
    BreakHandler, Breakpoint, EventKind, EventKindSet, Match, SnapshotConfig, SnapshotHandle,
};

use crate::config::ConfigError;

/// Saved settings for an instrumented session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpyglassSettings {
    /// Values kept per producer and per subscription by a flush.
    pub kept_values: usize,
    /// Diagnostics retained by the engine.
    pub diagnostics_capacity: usize,
    /// Default breakpoint.
    pub breakpoint: BreakpointSettings,
}

impl Default for SpyglassSettings {
    fn default() -> Self {
        let engine = SnapshotConfig::default();
        Self {
            kept_values: engine.kept_values,
            diagnostics_capacity: engine.diagnostics_capacity,
            breakpoint: BreakpointSettings::default(),
        }
    }
}

/// Breakpoint armed at startup, selected by tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointSettings {
    /// Tag of the producer to break on; `None` disarms the breakpoint.
    pub tag: Option<String>,
    /// Events that trigger the breakpoint.
    pub events: Vec<EventKind>,
}

impl Default for BreakpointSettings {
    fn default() -> Self {
        Self {
            tag: None,
            events: EventKind::ALL.to_vec(),
        }
    }
}

impl SpyglassSettings {
    /// Rejects settings that cannot be applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.breakpoint.tag.as_deref() == Some("") {
            return Err(ConfigError::Invalid("breakpoint tag is empty".into()));
        }
        if self.breakpoint.tag.is_some() && self.breakpoint.events.is_empty() {
            return Err(ConfigError::Invalid(
                "breakpoint tag set but no events selected".into(),
            ));
        }
        Ok(())
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            kept_values: self.kept_values,
            diagnostics_capacity: self.diagnostics_capacity,
        }
    }

    /// Events selected for the default breakpoint.
    pub fn breakpoint_events(&self) -> EventKindSet {
        self.breakpoint.events.iter().copied().collect()
    }

    /// Builds the default breakpoint, or `None` when no tag is configured.
    pub fn breakpoint(
        &self,
        snapshots: Option<SnapshotHandle>,
        handler: impl BreakHandler + 'static,
    ) -> Option<Breakpoint> {
        let tag = self.breakpoint.tag.clone()?;
        Some(Breakpoint::new(
            Match::Tag(tag),
            self.breakpoint_events(),
            snapshots,
            handler,
        ))
    }
}
