// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record-side context bag, materialized into [`ContextData`] at send time.

use std::collections::BTreeMap;

use crate::model::{ContextData, UserData};

/// Tags, user identity and custom values attached to a transaction or
/// error. Mutable up to submission; serialized only for sampled
/// transactions and for errors.
#[derive(Debug, Default, Clone)]
pub struct Context {
    tags: BTreeMap<String, String>,
    user: Option<UserData>,
    custom: BTreeMap<String, serde_json::Value>,
}

impl Context {
    /// Set a tag, replacing any previous value for the same key.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Attach user identity.
    pub fn set_user(&mut self, user: UserData) {
        self.user = Some(user);
    }

    /// Attach an arbitrary custom value.
    pub fn set_custom(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.custom.insert(key.into(), value);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.user.is_none() && self.custom.is_empty()
    }

    /// Materialize into the serialized form; `None` when nothing was set.
    pub(crate) fn build(&self) -> Option<ContextData> {
        if self.is_empty() {
            return None;
        }
        Some(ContextData {
            tags: self.tags.clone(),
            user: self.user.clone(),
            custom: self.custom.clone(),
        })
    }

    pub(crate) fn reset(&mut self) {
        self.tags.clear();
        self.user = None;
        self.custom.clear();
    }
}
