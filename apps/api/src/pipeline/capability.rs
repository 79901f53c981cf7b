//! Capabilities — named tools a role may use during its turn.
//!
//! The core never interprets tool results. A capability is only a tool definition
//! attached to the model request for the roles that ask for it; whatever the tool
//! returns shows up in the role's output text.

use std::collections::HashMap;

use serde_json::{json, Value};

pub const WEB_SEARCH: &str = "web_search";

/// A bound tool capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub name: String,
    /// Provider tool definition, sent verbatim in the request `tools` array.
    pub tool: Value,
}

impl Capability {
    /// Server-side web search, capped at `max_uses` searches per turn.
    pub fn web_search(max_uses: u32) -> Self {
        Self {
            name: WEB_SEARCH.to_string(),
            tool: json!({
                "type": "web_search_20250305",
                "name": WEB_SEARCH,
                "max_uses": max_uses,
            }),
        }
    }
}

/// The capabilities bound for one deployment, looked up by name when the role
/// graph is built.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    bound: HashMap<String, Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.bound.insert(capability.name.clone(), capability);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.bound.get(name)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }
}
