//! Role graph — the evaluator roles of one pipeline and the handoffs allowed between them.
//!
//! The graph is described declaratively (`RoleGraphSpec`: role names plus successor
//! name lists) and resolved once into an immutable `RoleGraph`. Successor names are
//! turned into `RoleId`s at build time, so a graph that references an undefined role
//! never reaches a run. Cycles are legal; only the turn budget bounds them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::pipeline::capability::{Capability, CapabilitySet};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("role graph has no roles")]
    Empty,

    #[error("role name cannot be blank")]
    BlankName,

    #[error("role '{0}' is defined more than once")]
    DuplicateRole(String),

    #[error("role '{role}' hands off to undefined role '{successor}'")]
    UnknownSuccessor { role: String, successor: String },

    #[error("role '{role}' lists successor '{successor}' more than once")]
    DuplicateSuccessor { role: String, successor: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Declarative description
// ────────────────────────────────────────────────────────────────────────────

/// One role as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDecl {
    pub name: String,
    pub instructions: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub successors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleGraphSpec {
    pub roles: Vec<RoleDecl>,
}

impl RoleGraphSpec {
    pub fn role(
        mut self,
        name: &str,
        instructions: &str,
        capabilities: &[&str],
        successors: &[&str],
    ) -> Self {
        self.roles.push(RoleDecl {
            name: name.to_string(),
            instructions: instructions.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            successors: successors.iter().map(|s| s.to_string()).collect(),
        });
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolved graph
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId(usize);

/// A resolved, immutable role.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    name: String,
    instructions: String,
    capabilities: Vec<Capability>,
    successors: Vec<RoleId>,
}

impl RoleSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }
}

/// The static role graph shared by every run of a deployment.
#[derive(Debug, Clone)]
pub struct RoleGraph {
    roles: Vec<RoleSpec>,
    index: HashMap<String, RoleId>,
}

impl RoleGraph {
    /// Validates `spec` and resolves every successor name to a role id.
    ///
    /// Capabilities named by a role but not bound in `capabilities` are skipped.
    pub fn build(spec: RoleGraphSpec, capabilities: &CapabilitySet) -> Result<Self, GraphError> {
        if spec.roles.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index = HashMap::with_capacity(spec.roles.len());
        for (i, decl) in spec.roles.iter().enumerate() {
            if decl.name.trim().is_empty() {
                return Err(GraphError::BlankName);
            }
            if index.insert(decl.name.clone(), RoleId(i)).is_some() {
                return Err(GraphError::DuplicateRole(decl.name.clone()));
            }
        }

        let mut roles = Vec::with_capacity(spec.roles.len());
        for decl in spec.roles {
            let mut seen = HashSet::new();
            let mut successors = Vec::with_capacity(decl.successors.len());
            for successor in &decl.successors {
                let id = *index
                    .get(successor)
                    .ok_or_else(|| GraphError::UnknownSuccessor {
                        role: decl.name.clone(),
                        successor: successor.clone(),
                    })?;
                if !seen.insert(id) {
                    return Err(GraphError::DuplicateSuccessor {
                        role: decl.name.clone(),
                        successor: successor.clone(),
                    });
                }
                successors.push(id);
            }

            let bound = decl
                .capabilities
                .iter()
                .filter_map(|name| {
                    let cap = capabilities.get(name).cloned();
                    if cap.is_none() {
                        debug!("Capability '{name}' not bound; role '{}' runs without it", decl.name);
                    }
                    cap
                })
                .collect();

            roles.push(RoleSpec {
                name: decl.name,
                instructions: decl.instructions,
                capabilities: bound,
                successors,
            });
        }

        Ok(Self { roles, index })
    }

    pub fn get(&self, id: RoleId) -> &RoleSpec {
        &self.roles[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<RoleId> {
        self.index.get(name).copied()
    }

    pub fn role(&self, name: &str) -> Option<&RoleSpec> {
        self.lookup(name).map(|id| self.get(id))
    }

    /// Successor names of `id`, in declaration order.
    pub fn successor_names(&self, id: RoleId) -> Vec<&str> {
        self.get(id)
            .successors
            .iter()
            .map(|s| self.get(*s).name())
            .collect()
    }

    /// Resolves `target` against the successors of `from`.
    pub fn permitted_successor(&self, from: RoleId, target: &str) -> Option<RoleId> {
        self.get(from)
            .successors
            .iter()
            .copied()
            .find(|s| self.get(*s).name == target)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }
}
