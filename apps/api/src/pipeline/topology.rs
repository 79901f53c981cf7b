//! Built-in pipeline topologies.
//!
//! A topology fixes both the role graph and the output format the extractor expects,
//! so one deployment never has to guess the format from the text.

use std::fmt;
use std::str::FromStr;

use crate::extraction::ExtractionProfile;
use crate::pipeline::capability::WEB_SEARCH;
use crate::pipeline::prompts::{
    CULTURAL_FIT_AGENT, CULTURAL_FIT_INSTRUCTIONS, MAIN_AGENT, MAIN_CHAIN_INSTRUCTIONS,
    MAIN_HUB_INSTRUCTIONS, SKILL_FIT_AGENT, SKILL_FIT_INSTRUCTIONS, SUMMARY_AGENT,
    SUMMARY_INSTRUCTIONS,
};
use crate::pipeline::roles::RoleGraphSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Topology {
    /// Main → Skill → Cultural → Summary → Main; fixed-format summary labels.
    #[default]
    Chain,
    /// Main ⇄ Skill, Main ⇄ Cultural; free prose.
    Hub,
}

impl Topology {
    pub fn entry_role(&self) -> &'static str {
        MAIN_AGENT
    }

    pub fn graph_spec(&self) -> RoleGraphSpec {
        match self {
            Topology::Chain => RoleGraphSpec::default()
                .role(
                    MAIN_AGENT,
                    MAIN_CHAIN_INSTRUCTIONS,
                    &[WEB_SEARCH],
                    &[SKILL_FIT_AGENT],
                )
                .role(
                    SKILL_FIT_AGENT,
                    SKILL_FIT_INSTRUCTIONS,
                    &[WEB_SEARCH],
                    &[CULTURAL_FIT_AGENT],
                )
                .role(
                    CULTURAL_FIT_AGENT,
                    CULTURAL_FIT_INSTRUCTIONS,
                    &[WEB_SEARCH],
                    &[SUMMARY_AGENT],
                )
                .role(SUMMARY_AGENT, SUMMARY_INSTRUCTIONS, &[], &[MAIN_AGENT]),
            Topology::Hub => RoleGraphSpec::default()
                .role(
                    MAIN_AGENT,
                    MAIN_HUB_INSTRUCTIONS,
                    &[WEB_SEARCH],
                    &[SKILL_FIT_AGENT, CULTURAL_FIT_AGENT],
                )
                .role(
                    SKILL_FIT_AGENT,
                    SKILL_FIT_INSTRUCTIONS,
                    &[WEB_SEARCH],
                    &[MAIN_AGENT],
                )
                .role(
                    CULTURAL_FIT_AGENT,
                    CULTURAL_FIT_INSTRUCTIONS,
                    &[],
                    &[MAIN_AGENT],
                ),
        }
    }

    pub fn extraction_profile(&self) -> ExtractionProfile {
        match self {
            Topology::Chain => ExtractionProfile::summary_labels(),
            Topology::Hub => ExtractionProfile::prose(),
        }
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" => Ok(Topology::Chain),
            "hub" => Ok(Topology::Hub),
            other => Err(format!("unknown pipeline topology '{other}' (expected 'chain' or 'hub')")),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Chain => write!(f, "chain"),
            Topology::Hub => write!(f, "hub"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::{Capability, CapabilitySet};
    use crate::pipeline::roles::RoleGraph;

    #[test]
    fn test_topology_parses_case_insensitively() {
        assert_eq!("Chain".parse::<Topology>().unwrap(), Topology::Chain);
        assert_eq!(" hub ".parse::<Topology>().unwrap(), Topology::Hub);
        assert!("star".parse::<Topology>().is_err());
    }

    #[test]
    fn test_default_topology_is_chain() {
        assert_eq!(Topology::default(), Topology::Chain);
        assert_eq!(Topology::Chain.to_string(), "chain");
    }

    #[test]
    fn test_chain_graph_is_a_four_role_cycle() {
        let graph = RoleGraph::build(Topology::Chain.graph_spec(), &CapabilitySet::new()).unwrap();
        assert_eq!(graph.len(), 4);
        let summary = graph.lookup(SUMMARY_AGENT).unwrap();
        assert_eq!(graph.successor_names(summary), vec![MAIN_AGENT]);
        assert!(graph.role(SUMMARY_AGENT).unwrap().capabilities().is_empty());
    }

    #[test]
    fn test_hub_main_fans_out_to_both_evaluators() {
        let caps = CapabilitySet::new().with(Capability::web_search(3));
        let graph = RoleGraph::build(Topology::Hub.graph_spec(), &caps).unwrap();
        let main = graph.lookup(MAIN_AGENT).unwrap();
        assert_eq!(
            graph.successor_names(main),
            vec![SKILL_FIT_AGENT, CULTURAL_FIT_AGENT]
        );
        assert_eq!(graph.role(MAIN_AGENT).unwrap().capabilities().len(), 1);
        assert!(graph.role(CULTURAL_FIT_AGENT).unwrap().capabilities().is_empty());
    }

    #[test]
    fn test_entry_role_exists_in_every_topology() {
        for topology in [Topology::Chain, Topology::Hub] {
            let graph = RoleGraph::build(topology.graph_spec(), &CapabilitySet::new()).unwrap();
            assert!(graph.lookup(topology.entry_role()).is_some());
        }
    }
}
