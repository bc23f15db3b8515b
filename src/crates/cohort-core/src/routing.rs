//! Closed option sets for supervisor routing
//!
//! A supervisor may only hand control to one of its declared delegates or to
//! the terminal option [`FINISH`]. [`RouteOptions`] is that closed set. The
//! builder turns it into a conditional edge whose branch table covers every
//! option, so a misspelt delegate surfaces at `compile()` rather than mid-run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal routing option
pub const FINISH: &str = "FINISH";

/// A resolved routing choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Finish,
    Delegate(String),
}

impl Route {
    pub fn as_str(&self) -> &str {
        match self {
            Route::Finish => FINISH,
            Route::Delegate(name) => name,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Route::Finish)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The delegates a supervisor can choose from, plus [`FINISH`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOptions {
    delegates: Vec<String>,
}

impl RouteOptions {
    /// Duplicate delegate names are dropped, keeping the first occurrence.
    pub fn new<I, S>(delegates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for delegate in delegates {
            let delegate = delegate.into();
            if delegate != FINISH && !unique.contains(&delegate) {
                unique.push(delegate);
            }
        }
        Self { delegates: unique }
    }

    pub fn delegates(&self) -> &[String] {
        &self.delegates
    }

    /// First declared delegate, used when the oracle gives no usable answer
    pub fn first_delegate(&self) -> Option<&str> {
        self.delegates.first().map(String::as_str)
    }

    /// All option names, `FINISH` first
    pub fn names(&self) -> Vec<String> {
        std::iter::once(FINISH.to_string())
            .chain(self.delegates.iter().cloned())
            .collect()
    }

    /// Map an option name onto a [`Route`]; `None` for names outside the set
    pub fn parse(&self, name: &str) -> Option<Route> {
        let name = name.trim();
        if name == FINISH {
            Some(Route::Finish)
        } else if self.delegates.iter().any(|d| d == name) {
            Some(Route::Delegate(name.to_string()))
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parse(name).is_some()
    }
}
