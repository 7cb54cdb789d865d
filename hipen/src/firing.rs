//! Enabling and firing semantics over an executable net.
//!
//! Which of several simultaneously enabled transitions fires next is a
//! stepping policy and stays with the caller; this module only answers
//! whether one transition may fire and what marking a firing produces.

use tracing::trace;

use crate::error::{PetriError, Result};
use crate::net::{Arc, ArcKind, ExecutablePetriNet, Transition};
use crate::state::State;

impl ExecutablePetriNet {
    /// True iff every inbound arc of the transition can fire and firing
    /// would not push any bounded target place over its capacity.
    ///
    /// A failing weight evaluation is a configuration error and
    /// propagates; it is never reported as "not enabled".
    pub fn is_enabled(&self, transition_id: &str, state: &State) -> Result<bool> {
        if self.transition(transition_id).is_none() {
            return Err(PetriError::NotFound(transition_id.into()));
        }
        for arc in self.inbound_arcs(transition_id) {
            if !self.can_fire(arc, state)? {
                return Ok(false);
            }
        }
        for arc in self.outbound_arcs(transition_id) {
            let place = self.place(arc.target()).ok_or_else(|| {
                let arc_id = arc.id();
                PetriError::InconsistentState(format!(
                    "Arc '{arc_id}' targets a place missing from the net."
                ))
            })?;
            if let Some(capacity) = place.capacity() {
                let current: u64 = self.state_tokens(arc.target(), state)?.values().sum();
                let added = self.weight_total(arc, state)?;
                if current + added > capacity {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Whether a single inbound arc lets its transition fire under the
    /// given state.
    pub fn can_fire(&self, arc: &Arc, state: &State) -> Result<bool> {
        match arc.kind() {
            ArcKind::InboundInhibitor => {
                // inhibitor arcs enable only on a completely empty place,
                // whatever their weights say
                let counts = self.state_tokens(arc.source(), state)?;
                Ok(counts.values().all(|&count| count == 0))
            }
            ArcKind::InboundNormal => {
                let counts = self.state_tokens(arc.source(), state)?;
                for (token_id, expression) in arc.weights() {
                    let weight = self.evaluate_expression(expression, state)?;
                    let count = counts.get(token_id).copied().unwrap_or(0);
                    // an empty source place never satisfies a normal arc,
                    // even when the evaluated weight is <= 0
                    if (count as f64) < weight || count == 0 {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ArcKind::Outbound => Ok(true),
        }
    }

    /// Fire a transition, producing the successor state.
    ///
    /// Every weight is evaluated against the unmodified pre-fire snapshot,
    /// so no arc observes another arc's partial update; the input state is
    /// never touched. Weights are truncated to whole tokens.
    pub fn fire(&self, transition_id: &str, state: &State) -> Result<State> {
        if self.transition(transition_id).is_none() {
            return Err(PetriError::NotFound(transition_id.into()));
        }
        let mut next = state.clone();
        for arc in self.inbound_arcs(transition_id) {
            if arc.kind() == ArcKind::InboundInhibitor {
                continue;
            }
            for (token_id, expression) in arc.weights() {
                let weight = self.evaluate_expression(expression, state)? as i64;
                let count = state.count(arc.source(), token_id) as i64 - weight;
                if count < 0 {
                    let arc_id = arc.id();
                    return Err(PetriError::InconsistentState(format!(
                        "Firing '{transition_id}' would make the count of '{token_id}' at \
                         '{arc_id}' negative."
                    )));
                }
                next.set_count(arc.source(), token_id, count as u64);
            }
        }
        for arc in self.outbound_arcs(transition_id) {
            for (token_id, expression) in arc.weights() {
                let weight = self.evaluate_expression(expression, state)? as i64;
                let count = state.count(arc.target(), token_id) as i64 + weight;
                if count < 0 {
                    let arc_id = arc.id();
                    return Err(PetriError::InconsistentState(format!(
                        "Firing '{transition_id}' would make the count of '{token_id}' at \
                         '{arc_id}' negative."
                    )));
                }
                next.set_count(arc.target(), token_id, count as u64);
            }
        }
        trace!(transition_id, "Fired transition.");
        Ok(next)
    }

    /// All transitions enabled under the given state, sorted by id.
    /// Picking one of them is the caller's stepping policy.
    pub fn enabled_transitions(&self, state: &State) -> Result<Vec<&Transition>> {
        let mut enabled = Vec::new();
        for transition in self.net().transitions().values() {
            if self.is_enabled(transition.id(), state)? {
                enabled.push(transition);
            }
        }
        enabled.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(enabled)
    }

    fn state_tokens<'a>(
        &self,
        place_id: &str,
        state: &'a State,
    ) -> Result<&'a std::collections::BTreeMap<String, u64>> {
        state.tokens(place_id).ok_or_else(|| {
            PetriError::EvaluationError(format!(
                "Place '{place_id}' is not part of the supplied state."
            ))
        })
    }

    fn weight_total(&self, arc: &Arc, state: &State) -> Result<u64> {
        let mut total: i64 = 0;
        for expression in arc.weights().values() {
            total += self.evaluate_expression(expression, state)? as i64;
        }
        Ok(total.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{
        Arc, ArcKind, IncludeHierarchy, PetriNet, Place, PlaceBuilder, Token, Transition,
    };
    use crate::state::StateBuilder;

    fn executable(net: PetriNet) -> ExecutablePetriNet {
        let root = IncludeHierarchy::new("root", net).unwrap();
        ExecutablePetriNet::from_hierarchy(&root).unwrap()
    }

    // P0 -(w)-> T0 -> P1, with the given weight expression and P0 marking
    fn chain_net(weight: &str, marking: u64) -> ExecutablePetriNet {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_place(Place::new("P1")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("P0", "T0", ArcKind::InboundNormal).with_weight("Default", weight))
            .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        net.set_token_count("P0", "Default", marking).unwrap();
        executable(net)
    }

    #[test]
    fn enabled_when_tokens_cover_the_weight() {
        let net = chain_net("2", 3);
        let state = net.state();
        assert!(net.is_enabled("root.T0", &state).unwrap());
    }

    #[test]
    fn not_enabled_when_weight_exceeds_count() {
        let net = chain_net("4", 3);
        let state = net.state();
        assert!(!net.is_enabled("root.T0", &state).unwrap());
    }

    #[test]
    fn empty_source_place_never_enables() {
        // the zero guard applies even when the evaluated weight is <= 0
        let net = chain_net("0", 0);
        let state = net.state();
        assert!(!net.is_enabled("root.T0", &state).unwrap());
        let net = chain_net("1 - 2", 0);
        let state = net.state();
        assert!(!net.is_enabled("root.T0", &state).unwrap());
    }

    #[test]
    fn functional_weight_reads_the_supplied_state() {
        let net = chain_net("#(P1) + 1", 1);
        let one_needed = net.state();
        assert!(net.is_enabled("root.T0", &one_needed).unwrap());
        let two_needed = StateBuilder::new()
            .count("root.P0", "Default", 1)
            .count("root.P1", "Default", 1)
            .build();
        assert!(!net.is_enabled("root.T0", &two_needed).unwrap());
    }

    #[test]
    fn evaluation_failure_propagates_not_disabled() {
        let net = chain_net("#(MISSING)", 1);
        let state = net.state();
        let err = net.is_enabled("root.T0", &state).unwrap_err();
        assert!(matches!(err, PetriError::EvaluationError(_)));
    }

    #[test]
    fn fire_moves_tokens() {
        let net = chain_net("2", 3);
        let before = net.state();
        let after = net.fire("root.T0", &before).unwrap();
        assert_eq!(after.count("root.P0", "Default"), 1);
        assert_eq!(after.count("root.P1", "Default"), 1);
        // the input state is untouched
        assert_eq!(before.count("root.P0", "Default"), 3);
        assert_eq!(before.count("root.P1", "Default"), 0);
    }

    #[test]
    fn fire_evaluates_against_the_pre_fire_snapshot() {
        // T0 drains P0 while the outbound weight still reads P0's
        // pre-fire count
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_place(Place::new("P1")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("P0", "T0", ArcKind::InboundNormal).with_weight("Default", "2"))
            .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "#(P0)"))
            .unwrap();
        net.set_token_count("P0", "Default", 2).unwrap();
        let net = executable(net);
        let after = net.fire("root.T0", &net.state()).unwrap();
        assert_eq!(after.count("root.P0", "Default"), 0);
        // pre-fire #(root.P0) was 2, not the post-fire 0
        assert_eq!(after.count("root.P1", "Default"), 2);
    }

    #[test]
    fn inhibitor_enables_only_on_empty_place() {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_place(Place::new("P1")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("P0", "T0", ArcKind::InboundInhibitor).with_weight("Default", "1"))
            .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        let net = executable(net);
        assert!(net.is_enabled("root.T0", &net.state()).unwrap());
        let marked = StateBuilder::new()
            .count("root.P0", "Default", 1)
            .place("root.P1")
            .build();
        assert!(!net.is_enabled("root.T0", &marked).unwrap());
    }

    #[test]
    fn inhibitor_arc_moves_no_tokens_on_fire() {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_place(Place::new("P1")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("P0", "T0", ArcKind::InboundInhibitor).with_weight("Default", "1"))
            .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        let net = executable(net);
        let after = net.fire("root.T0", &net.state()).unwrap();
        assert_eq!(after.count("root.P0", "Default"), 0);
        assert_eq!(after.count("root.P1", "Default"), 1);
    }

    #[test]
    fn capacity_blocks_enabling() {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_place(PlaceBuilder::default().id("P1").capacity(1u64).build().unwrap()).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("P0", "T0", ArcKind::InboundNormal).with_weight("Default", "1"))
            .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        net.set_token_count("P0", "Default", 2).unwrap();
        net.set_token_count("P1", "Default", 1).unwrap();
        let net = executable(net);
        assert!(!net.is_enabled("root.T0", &net.state()).unwrap());
        let room = StateBuilder::new()
            .count("root.P0", "Default", 2)
            .place("root.P1")
            .build();
        assert!(net.is_enabled("root.T0", &room).unwrap());
    }

    #[test]
    fn transition_without_inbound_arcs_is_enabled() {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("T0", "P0", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        let net = executable(net);
        assert!(net.is_enabled("root.T0", &net.state()).unwrap());
    }

    #[test]
    fn enabled_transitions_enumerates_sorted() {
        let mut net = PetriNet::new();
        net.add_token(Token::default_token()).unwrap();
        net.add_place(Place::new("P0")).unwrap();
        net.add_transition(Transition::new("T1")).unwrap();
        net.add_transition(Transition::new("T0")).unwrap();
        net.add_arc(Arc::new("T0", "P0", ArcKind::Outbound).with_weight("Default", "1")).unwrap();
        net.add_arc(Arc::new("P0", "T1", ArcKind::InboundNormal).with_weight("Default", "1"))
            .unwrap();
        let net = executable(net);
        let state = net.state();
        let enabled = net.enabled_transitions(&state).unwrap();
        let ids: Vec<&str> = enabled.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["root.T0"]);
        let after = net.fire("root.T0", &state).unwrap();
        let enabled = net.enabled_transitions(&after).unwrap();
        let ids: Vec<&str> = enabled.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["root.T0", "root.T1"]);
    }

    #[test]
    fn unknown_transition_is_not_found() {
        let net = chain_net("1", 1);
        let err = net.is_enabled("root.T9", &net.state()).unwrap_err();
        assert!(matches!(err, PetriError::NotFound(id) if id == "root.T9"));
    }
}
