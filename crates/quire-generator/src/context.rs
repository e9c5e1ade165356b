//! Render context assembly.
//!
//! A render context is a single mapping built from layers of increasing
//! precedence: global data, then front matter (layout before page), then
//! computed fields. Computed fields are applied last regardless of the order
//! they were added in, so front matter can never shadow them.

use quire_core::Metadata;
use serde_json::Value;

/// The data a template is rendered against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    data: Metadata,
}

impl RenderContext {
    /// Start building a context.
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Look up a top-level value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The merged mapping.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        &self.data
    }

    /// Clone the context into a JSON value for the template engine.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Consume the context into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

/// Builder for [`RenderContext`].
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    data: Metadata,
    computed: Metadata,
}

impl ContextBuilder {
    /// Merge a mapping over everything layered so far. Keys are replaced, not
    /// deep-merged.
    #[must_use]
    pub fn layer(mut self, values: &Metadata) -> Self {
        for (key, value) in values {
            self.data.insert(key.clone(), value.clone());
        }
        self
    }

    /// Set a computed field. Computed fields beat every layer.
    #[must_use]
    pub fn computed(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.computed.insert(key.into(), value.into());
        self
    }

    /// Set several computed fields at once.
    #[must_use]
    pub fn computed_all(mut self, values: Metadata) -> Self {
        self.computed.extend(values);
        self
    }

    /// Finish the context.
    #[must_use]
    pub fn build(self) -> RenderContext {
        let mut data = self.data;
        data.extend(self.computed);
        RenderContext { data }
    }
}
