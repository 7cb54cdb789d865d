use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::{debug, warn};

use crate::error::{PetriError, Result};
use crate::expr::FunctionalExpression;
use crate::state::State;

use super::{
    common::derive_arc_id, Annotation, Arc, Component, NetChange, NetChangeEvent, Place, Rate,
    RateParameter, Token, Transition,
};

/// A mutable Petri net: places, transitions, arcs, tokens, rate parameters
/// and annotations, owned by id.
///
/// All mutation goes through the validating add/remove API below; every
/// successful mutation bumps the net's revision and returns a
/// [`NetChangeEvent`] describing what happened.
#[derive(Default, Clone, Debug)]
pub struct PetriNet {
    name: Option<String>,
    pub(super) tokens: HashMap<String, Token>,
    pub(super) places: HashMap<String, Place>,
    pub(super) transitions: HashMap<String, Transition>,
    pub(super) rate_parameters: HashMap<String, RateParameter>,
    pub(super) annotations: Vec<Annotation>,
    pub(super) arcs: HashMap<String, Arc>,
    revision: u64,
}

impl PetriNet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        PetriNet { name: Some(name.into()), ..Default::default() }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Revision counter, bumped by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn tokens(&self) -> &HashMap<String, Token> {
        &self.tokens
    }

    pub fn places(&self) -> &HashMap<String, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &HashMap<String, Transition> {
        &self.transitions
    }

    pub fn rate_parameters(&self) -> &HashMap<String, RateParameter> {
        &self.rate_parameters
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn arcs(&self) -> &HashMap<String, Arc> {
        &self.arcs
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
            && self.transitions.is_empty()
            && self.arcs.is_empty()
            && self.tokens.is_empty()
            && self.rate_parameters.is_empty()
            && self.annotations.is_empty()
    }

    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.get(id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn rate_parameter(&self, id: &str) -> Option<&RateParameter> {
        self.rate_parameters.get(id)
    }

    pub fn arc(&self, id: &str) -> Option<&Arc> {
        self.arcs.get(id)
    }

    /// True if any component of any kind carries this id.
    pub fn contains_component(&self, id: &str) -> bool {
        self.places.contains_key(id)
            || self.transitions.contains_key(id)
            || self.tokens.contains_key(id)
            || self.rate_parameters.contains_key(id)
            || self.arcs.contains_key(id)
    }

    /// Add any component, dispatching on its kind.
    pub fn add(&mut self, component: Component) -> Result<NetChangeEvent> {
        match component {
            Component::Token(token) => self.add_token(token),
            Component::Place(place) => self.add_place(place),
            Component::Transition(transition) => self.add_transition(transition),
            Component::Arc(arc) => self.add_arc(arc),
            Component::Annotation(annotation) => Ok(self.add_annotation(annotation)),
            Component::RateParameter(parameter) => self.add_rate_parameter(parameter),
        }
    }

    pub fn add_token(&mut self, token: Token) -> Result<NetChangeEvent> {
        if self.contains_component(token.id()) {
            return Err(PetriError::DuplicateId(token.id().into()));
        }
        let id = token.id().to_string();
        self.tokens.insert(id.clone(), token);
        Ok(self.event(NetChange::Added(id)))
    }

    pub fn add_place(&mut self, place: Place) -> Result<NetChangeEvent> {
        if self.contains_component(place.id()) {
            return Err(PetriError::DuplicateId(place.id().into()));
        }
        if let Some(capacity) = place.capacity() {
            if capacity == 0 {
                let place_id = place.id();
                return Err(PetriError::ValueError(format!(
                    "Place '{place_id}' cannot be added, a bounded capacity must be positive."
                )));
            }
            let count = place.total_token_count();
            if count > capacity {
                return Err(PetriError::CapacityExceeded {
                    place: place.id().into(),
                    count,
                    capacity,
                });
            }
        }
        for token_id in place.tokens().keys() {
            if !self.tokens.contains_key(token_id) {
                let place_id = place.id();
                return Err(PetriError::ValueError(format!(
                    "Place '{place_id}' cannot be added, token '{token_id}' does not exist."
                )));
            }
        }
        let id = place.id().to_string();
        self.places.insert(id.clone(), place);
        Ok(self.event(NetChange::Added(id)))
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<NetChangeEvent> {
        if self.contains_component(transition.id()) {
            return Err(PetriError::DuplicateId(transition.id().into()));
        }
        if let Rate::Parameter(parameter_id) = transition.rate() {
            if !self.rate_parameters.contains_key(parameter_id) {
                let transition_id = transition.id();
                return Err(PetriError::ValueError(format!(
                    "Transition '{transition_id}' cannot be added, rate parameter \
                     '{parameter_id}' does not exist."
                )));
            }
        }
        let id = transition.id().to_string();
        self.transitions.insert(id.clone(), transition);
        Ok(self.event(NetChange::Added(id)))
    }

    pub fn add_rate_parameter(&mut self, parameter: RateParameter) -> Result<NetChangeEvent> {
        if self.contains_component(parameter.id()) {
            return Err(PetriError::DuplicateId(parameter.id().into()));
        }
        let id = parameter.id().to_string();
        self.rate_parameters.insert(id.clone(), parameter);
        Ok(self.event(NetChange::Added(id)))
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> NetChangeEvent {
        self.annotations.push(annotation);
        self.event(NetChange::AnnotationAdded)
    }

    /// Insert an arc into this net.
    ///
    /// Rejects arcs whose endpoints do not exist or do not match the arc
    /// kind (inbound arcs run place to transition, outbound the other way
    /// round), arcs whose weights name unknown tokens, and a second arc
    /// for an already connected (source, target) pair.
    pub fn add_arc(&mut self, arc: Arc) -> Result<NetChangeEvent> {
        let place_id = arc.place();
        let transition_id = arc.transition();
        if !self.places.contains_key(place_id) {
            return Err(PetriError::ValueError(format!(
                "Arc '{place_id}' <-> '{transition_id}' cannot be added, place does not exist."
            )));
        }
        if !self.transitions.contains_key(transition_id) {
            return Err(PetriError::ValueError(format!(
                "Arc '{place_id}' <-> '{transition_id}' cannot be added, transition does not exist."
            )));
        }
        for token_id in arc.weights().keys() {
            if !self.tokens.contains_key(token_id) {
                return Err(PetriError::ValueError(format!(
                    "Arc '{place_id}' <-> '{transition_id}' cannot be added, token \
                     '{token_id}' does not exist."
                )));
            }
        }
        let source = arc.source().to_string();
        let target = arc.target().to_string();
        if self.arcs.values().any(|a| a.source() == source && a.target() == target) {
            return Err(PetriError::DuplicateId(derive_arc_id(&source, &target)));
        }
        let id = arc.id().to_string();
        if self.arcs.contains_key(&id) {
            return Err(PetriError::DuplicateId(id));
        }
        self.arcs.insert(id.clone(), arc);
        Ok(self.event(NetChange::Added(id)))
    }

    pub fn remove_token(&mut self, id: &str) -> Result<NetChangeEvent> {
        if !self.tokens.contains_key(id) {
            return Err(PetriError::NotFound(id.into()));
        }
        let marked = self.places.values().find(|place| place.tokens().contains_key(id));
        if let Some(place) = marked {
            let place_id = place.id();
            return Err(PetriError::ValueError(format!(
                "Token '{id}' cannot be removed, place '{place_id}' is marked with it."
            )));
        }
        let weighted = self.arcs.values().find(|arc| arc.weights().contains_key(id));
        if let Some(arc) = weighted {
            let arc_id = arc.id();
            return Err(PetriError::ValueError(format!(
                "Token '{id}' cannot be removed, arc '{arc_id}' is weighted with it."
            )));
        }
        self.tokens.remove(id);
        Ok(self.event(NetChange::Removed(id.into())))
    }

    /// Remove a place together with its incident arcs. Expressions that
    /// still reference the place are left alone; the dangling reference
    /// surfaces when they are next validated or evaluated.
    pub fn remove_place(&mut self, id: &str) -> Result<NetChangeEvent> {
        if self.places.remove(id).is_none() {
            return Err(PetriError::NotFound(id.into()));
        }
        let mut changes = vec![NetChange::Removed(id.into())];
        changes.extend(self.remove_incident_arcs(id));
        Ok(self.event_all(changes))
    }

    pub fn remove_transition(&mut self, id: &str) -> Result<NetChangeEvent> {
        if self.transitions.remove(id).is_none() {
            return Err(PetriError::NotFound(id.into()));
        }
        let mut changes = vec![NetChange::Removed(id.into())];
        changes.extend(self.remove_incident_arcs(id));
        Ok(self.event_all(changes))
    }

    pub fn remove_arc(&mut self, id: &str) -> Result<NetChangeEvent> {
        if self.arcs.remove(id).is_none() {
            return Err(PetriError::NotFound(id.into()));
        }
        Ok(self.event(NetChange::Removed(id.into())))
    }

    pub fn remove_rate_parameter(&mut self, id: &str) -> Result<NetChangeEvent> {
        if !self.rate_parameters.contains_key(id) {
            return Err(PetriError::NotFound(id.into()));
        }
        let referenced = self
            .transitions
            .values()
            .find(|transition| transition.rate() == &Rate::Parameter(id.into()));
        if let Some(transition) = referenced {
            let transition_id = transition.id();
            return Err(PetriError::ValueError(format!(
                "Rate parameter '{id}' cannot be removed, transition '{transition_id}' \
                 references it."
            )));
        }
        self.rate_parameters.remove(id);
        Ok(self.event(NetChange::Removed(id.into())))
    }

    fn remove_incident_arcs(&mut self, endpoint_id: &str) -> Vec<NetChange> {
        let dropped: Vec<String> = self
            .arcs
            .values()
            .filter(|arc| arc.source() == endpoint_id || arc.target() == endpoint_id)
            .map(|arc| arc.id().to_string())
            .collect();
        for arc_id in &dropped {
            self.arcs.remove(arc_id);
        }
        if !dropped.is_empty() {
            debug!(endpoint_id, count = dropped.len(), "Removed incident arcs with endpoint.");
        }
        dropped.into_iter().map(NetChange::Removed).collect()
    }

    /// Set the count of one token at one place, validating token existence
    /// and the place's capacity.
    pub fn set_token_count(
        &mut self,
        place_id: &str,
        token_id: &str,
        count: u64,
    ) -> Result<NetChangeEvent> {
        if !self.tokens.contains_key(token_id) {
            return Err(PetriError::NotFound(token_id.into()));
        }
        let place = self
            .places
            .get_mut(place_id)
            .ok_or_else(|| PetriError::NotFound(place_id.into()))?;
        if let Some(capacity) = place.capacity {
            let others: u64 =
                place.tokens.iter().filter(|(id, _)| id.as_str() != token_id).map(|(_, c)| c).sum();
            if others + count > capacity {
                return Err(PetriError::CapacityExceeded {
                    place: place_id.into(),
                    count: others + count,
                    capacity,
                });
            }
        }
        if count == 0 {
            place.tokens.remove(token_id);
        } else {
            place.tokens.insert(token_id.into(), count);
        }
        Ok(self.event(NetChange::Marking(place_id.into(), token_id.into(), count)))
    }

    /// Snapshot the current marking as an independent [`State`].
    pub fn state(&self) -> State {
        let counts = self
            .places
            .values()
            .map(|place| (place.id().to_string(), place.tokens().clone()))
            .collect();
        State::from_counts(counts)
    }

    /// Inbound arcs incident on the given transition, sorted by id.
    pub fn inbound_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.arcs_of(transition_id, true)
    }

    /// Outbound arcs incident on the given transition, sorted by id.
    pub fn outbound_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.arcs_of(transition_id, false)
    }

    fn arcs_of(&self, transition_id: &str, inbound: bool) -> Vec<&Arc> {
        let mut arcs: Vec<&Arc> = self
            .arcs
            .values()
            .filter(|arc| arc.kind().is_inbound() == inbound && arc.transition() == transition_id)
            .collect();
        arcs.sort_by(|a, b| a.id().cmp(b.id()));
        arcs
    }

    /// Parse every functional expression of the net and collect all
    /// problems as human-readable messages, so callers can report an
    /// entire net's worth of mistakes in one pass.
    pub fn validate_expressions(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for arc in self.arcs.values() {
            for (token_id, expression) in arc.weights() {
                let parsed = FunctionalExpression::parse(expression, self);
                let arc_id = arc.id();
                problems.extend(
                    parsed.errors().iter().map(|e| format!("arc '{arc_id}', token '{token_id}': {e}")),
                );
            }
        }
        for parameter in self.rate_parameters.values() {
            let parsed = FunctionalExpression::parse(parameter.expression(), self);
            let parameter_id = parameter.id();
            problems.extend(parsed.errors().iter().map(|e| format!("rate parameter '{parameter_id}': {e}")));
        }
        for transition in self.transitions.values() {
            if let Rate::Expression(expression) = transition.rate() {
                let parsed = FunctionalExpression::parse(expression, self);
                let transition_id = transition.id();
                problems.extend(
                    parsed.errors().iter().map(|e| format!("transition '{transition_id}' rate: {e}")),
                );
            }
        }
        if !problems.is_empty() {
            warn!(count = problems.len(), "Net has expression problems.");
        }
        problems
    }

    fn event(&mut self, change: NetChange) -> NetChangeEvent {
        self.event_all(vec![change])
    }

    fn event_all(&mut self, changes: Vec<NetChange>) -> NetChangeEvent {
        self.revision += 1;
        let mut evt = NetChangeEvent::new(self.revision);
        evt.changes = changes;
        evt
    }
}

// Equality is structural over the component sets; the revision counter is
// mutation bookkeeping and takes no part in it.
impl PartialEq for PetriNet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.tokens == other.tokens
            && self.places == other.places
            && self.transitions == other.transitions
            && self.rate_parameters == other.rate_parameters
            && self.annotations == other.annotations
            && self.arcs == other.arcs
    }
}

impl Eq for PetriNet {}

impl Hash for PetriNet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        hash_map_sorted(&self.tokens, state);
        hash_map_sorted(&self.places, state);
        hash_map_sorted(&self.transitions, state);
        hash_map_sorted(&self.rate_parameters, state);
        self.annotations.hash(state);
        hash_map_sorted(&self.arcs, state);
    }
}

fn hash_map_sorted<V: Hash, H: Hasher>(map: &HashMap<String, V>, state: &mut H) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        key.hash(state);
        map[key].hash(state);
    }
}
