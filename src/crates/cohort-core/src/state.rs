//! State schema and field reducers
//!
//! Run state is a JSON object. A [`StateSchema`] declares, in order, the fields
//! that object may contain and a [`Reducer`] per field deciding how an
//! incoming partial update combines with the value already there.
//!
//! # Absent values
//!
//! A field is *absent* from an update when the key is missing or carries JSON
//! `null`. Absent fields never change state: the schema skips them before any
//! reducer runs, and every built-in reducer also returns the current value
//! unchanged when handed `null`.
//!
//! # Built-in reducers
//!
//! | Reducer | Behavior | Typical fields |
//! |---------|----------|----------------|
//! | [`AppendReducer`] | Concatenate arrays, push scalars | `messages`, `team_members` |
//! | [`OverrideReducer`] | Replace when present | `next`, `instructions`, `reasoning` |
//! | [`TextAccumulateReducer`] | Join text with a line break | `current_data` |
//!
//! # Example
//!
//! ```rust
//! use cohort_core::state::{SchemaField, StateSchema};
//! use serde_json::json;
//!
//! let schema = StateSchema::new()
//!     .field(SchemaField::append("messages"))
//!     .field(SchemaField::overriding("next").with_default(json!("Search")))
//!     .field(SchemaField::accumulate("current_data"));
//!
//! let mut state = schema.initial_state(&json!({"messages": ["hi"]})).unwrap();
//! assert_eq!(state["next"], "Search");
//!
//! schema
//!     .apply(&mut state, &json!({"messages": ["there"], "current_data": "row 1"}))
//!     .unwrap();
//! schema
//!     .apply(&mut state, &json!({"current_data": "row 2", "next": null}))
//!     .unwrap();
//!
//! assert_eq!(state["messages"], json!(["hi", "there"]));
//! assert_eq!(state["current_data"], "row 1\nrow 2");
//! assert_eq!(state["next"], "Search");
//! ```
//!
//! Nested graphs declare their own schema; nothing is shared with the parent
//! unless an adapter copies it across.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or merging state
#[derive(Debug, Error)]
pub enum StateError {
    /// State or update is not a JSON object
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A reducer could not combine the two values
    #[error("Reducer '{reducer}' failed on field '{field}': {message}")]
    ReducerError {
        field: String,
        reducer: String,
        message: String,
    },

    /// The update names a field the schema does not declare
    #[error("Unknown field '{0}'")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Combines the current value of a field with an incoming one.
///
/// `Value::Null` stands for "absent" on either side. Implementations must be
/// pure and must accept every pair, returning an error only for values of a
/// type the reducer does not understand.
pub trait Reducer: Send + Sync {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String>;

    /// Stable name used in errors and logs
    fn name(&self) -> &str;
}

/// Concatenates an incoming sequence onto the existing one.
///
/// Arrays are extended in order; a scalar update is pushed as one element. An
/// absent current value behaves as the empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        let mut items = match current {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => return Err(format!("current value is not a list: {other}")),
        };
        match update {
            Value::Null => return Ok(current.clone()),
            Value::Array(incoming) => items.extend(incoming.iter().cloned()),
            single => items.push(single.clone()),
        }
        Ok(Value::Array(items))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Takes the incoming value when one is provided.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideReducer;

impl Reducer for OverrideReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        if update.is_null() {
            Ok(current.clone())
        } else {
            Ok(update.clone())
        }
    }

    fn name(&self) -> &str {
        "override"
    }
}

/// Appends incoming text to the existing text on a new line.
///
/// An empty incoming string counts as absent. When there is no existing text
/// the incoming text is taken as-is, without a leading line break.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAccumulateReducer;

impl Reducer for TextAccumulateReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        let incoming = match update {
            Value::Null => return Ok(current.clone()),
            Value::String(text) if text.is_empty() => return Ok(current.clone()),
            Value::String(text) => text.as_str(),
            other => return Err(format!("update is not text: {other}")),
        };
        match current {
            Value::Null => Ok(Value::String(incoming.to_string())),
            Value::String(existing) if existing.is_empty() => {
                Ok(Value::String(incoming.to_string()))
            }
            Value::String(existing) => Ok(Value::String(format!("{existing}\n{incoming}"))),
            other => Err(format!("current value is not text: {other}")),
        }
    }

    fn name(&self) -> &str {
        "text_accumulate"
    }
}

/// One declared field: name, reducer and optional default.
#[derive(Clone)]
pub struct SchemaField {
    name: String,
    reducer: Arc<dyn Reducer>,
    default: Option<Value>,
}

impl SchemaField {
    /// Declare a field with an explicit reducer and default
    pub fn define(
        name: impl Into<String>,
        reducer: impl Reducer + 'static,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            reducer: Arc::new(reducer),
            default,
        }
    }

    /// Append field, defaulting to the empty list
    pub fn append(name: impl Into<String>) -> Self {
        Self::define(name, AppendReducer, Some(Value::Array(Vec::new())))
    }

    /// Override-if-present field with no default
    pub fn overriding(name: impl Into<String>) -> Self {
        Self::define(name, OverrideReducer, None)
    }

    /// Textual-accumulate field with no default
    pub fn accumulate(name: impl Into<String>) -> Self {
        Self::define(name, TextAccumulateReducer, None)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reducer(&self) -> &dyn Reducer {
        self.reducer.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        self.reducer
            .reduce(current, update)
            .map_err(|message| StateError::ReducerError {
                field: self.name.clone(),
                reducer: self.reducer.name().to_string(),
                message,
            })
    }
}

impl fmt::Debug for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaField")
            .field("name", &self.name)
            .field("reducer", &self.reducer.name())
            .field("default", &self.default)
            .finish()
    }
}

/// Ordered set of fields making up a graph's run state.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: Vec<SchemaField>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add_field`](Self::add_field)
    pub fn field(mut self, field: SchemaField) -> Self {
        self.add_field(field);
        self
    }

    /// Add a field, replacing an earlier declaration of the same name in place
    pub fn add_field(&mut self, field: SchemaField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fresh run state: defaults first, then `input` merged through the reducers.
    pub fn initial_state(&self, input: &Value) -> Result<Value> {
        let mut state = Map::new();
        for field in &self.fields {
            if let Some(default) = &field.default {
                state.insert(field.name.clone(), default.clone());
            }
        }
        let mut state = Value::Object(state);
        self.apply(&mut state, input)?;
        Ok(state)
    }

    /// Merge `update` into a copy of `state` and return it.
    ///
    /// Either the whole update is applied or, on error, nothing is.
    pub fn merge(&self, state: &Value, update: &Value) -> Result<Value> {
        let current = state
            .as_object()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;
        let mut merged = current.clone();

        let update = match update {
            Value::Null => return Ok(Value::Object(merged)),
            Value::Object(update) => update,
            other => {
                return Err(StateError::InvalidState(format!(
                    "update must be an object, got {other}"
                )))
            }
        };

        for (key, incoming) in update {
            let field = self
                .get(key)
                .ok_or_else(|| StateError::UnknownField(key.clone()))?;
            if incoming.is_null() {
                continue;
            }
            let existing = merged.get(key).unwrap_or(&Value::Null);
            let reduced = field.reduce(existing, incoming)?;
            // A reducer that kept nothing leaves an unset field unset.
            if reduced.is_null() && !merged.contains_key(key) {
                continue;
            }
            merged.insert(key.clone(), reduced);
        }

        Ok(Value::Object(merged))
    }

    /// Apply `update` to `state`, leaving it untouched on error
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        *state = self.merge(state, update)?;
        Ok(())
    }
}
