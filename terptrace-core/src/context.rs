//! Event context model
//!
//! A [`Context`] describes the environment in which an event occurred: the
//! device fingerprint, the session group, and an open set of ambient
//! attributes (partner, location, app version, ...).
//!
//! Two contexts exist for every event: the ambient context owned by the
//! [`Pipeline`](crate::pipeline::Pipeline) for the lifetime of the process,
//! and a local context attached to the event at construction. At dispatch
//! time the local context is merged onto the ambient one field-by-field;
//! the ambient context is never mutated by the merge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Structured ambient/local metadata attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Device identity. Required and non-empty after merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Session/group identifier. Required and non-empty after merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Open set of ambient attributes (partner, location, app version, ...)
    #[serde(flatten)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device fingerprint
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the session/group identifier
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Add an ambient attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Merge a local context onto an ambient one.
    ///
    /// The merge is one-directional: local values override or add to ambient
    /// values field-by-field. Neither input is mutated.
    pub fn merged(ambient: &Context, local: &Context) -> Context {
        let mut out = ambient.clone();
        if local.fingerprint.is_some() {
            out.fingerprint = local.fingerprint.clone();
        }
        if local.group.is_some() {
            out.group = local.group.clone();
        }
        for (key, value) in &local.attrs {
            out.attrs.insert(key.clone(), value.clone());
        }
        out
    }

    /// Validate that required fields are present after merge.
    ///
    /// A merged context with a missing or empty fingerprint or group is a
    /// hard failure; the caller decides whether to drop the event or retry
    /// after fixing the context.
    pub fn validate(&self) -> Result<()> {
        if self.fingerprint.as_deref().map_or(true, str::is_empty) {
            return Err(Error::ContextValidation {
                field: "fingerprint",
            });
        }
        if self.group.as_deref().map_or(true, str::is_empty) {
            return Err(Error::ContextValidation { field: "group" });
        }
        Ok(())
    }
}
