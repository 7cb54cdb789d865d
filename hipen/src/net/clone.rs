use crate::error::Result;

use super::{Component, ExecutablePetriNet, IncludeHierarchy, PetriNet};

/// Structural deep-copy services for nets.
///
/// Cloning rebuilds every component through the validating add API, so the
/// result owns a fully independent component set whose arcs reference the
/// cloned endpoints, and compares structurally equal to its source.
pub struct ClonePetriNet;

impl ClonePetriNet {
    pub fn clone_net(net: &PetriNet) -> PetriNet {
        let mut cloned = PetriNet::new();
        if let Some(name) = net.name() {
            cloned.set_name(name);
        }
        let mut components: Vec<Component> = Vec::new();
        components.extend(sorted(net.tokens().values().cloned().map(Component::Token)));
        components.extend(net.annotations().iter().cloned().map(Component::Annotation));
        components
            .extend(sorted(net.rate_parameters().values().cloned().map(Component::RateParameter)));
        components.extend(sorted(net.places().values().cloned().map(Component::Place)));
        components.extend(sorted(net.transitions().values().cloned().map(Component::Transition)));
        components.extend(sorted(net.arcs().values().cloned().map(Component::Arc)));
        for component in components {
            cloned.add(component).unwrap();
            // Note: if this unwrap panics, we have a logic error here somewhere
        }
        cloned
    }

    /// Rebuild an executable net from its owning hierarchy, replacing the
    /// previous contents wholesale.
    pub fn refresh_from_include_hierarchy(
        executable: &mut ExecutablePetriNet,
        root: &IncludeHierarchy,
    ) -> Result<()> {
        executable.refresh_from_hierarchy(root)
    }
}

fn sorted(components: impl Iterator<Item = Component>) -> Vec<Component> {
    let mut batch: Vec<Component> = components.collect();
    batch.sort_by(|a, b| a.id().cmp(&b.id()));
    batch
}
