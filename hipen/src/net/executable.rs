use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::{debug, warn};

use crate::error::{PetriError, Result};
use crate::expr::{rename_references, FunctionalExpression};
use crate::state::State;

use super::{
    Annotation, Arc, IncludeHierarchy, PetriNet, Place, Rate, RateParameter, Token, Transition,
};

/// One flattened, executable view of an include hierarchy.
///
/// Component ids are the dotted path of ancestor node names joined with
/// the local id, so place "P0" of the root node "root" becomes "root.P0"
/// and a nested arc "P0 TO T0" becomes "root.P0 TO T0". Token ids are the
/// exception: tokens are shared vocabulary and merge by id.
///
/// The executable net is a cache derived from its hierarchy. After any
/// structural edit to the hierarchy it must be rebuilt wholesale with
/// [`refresh_from_hierarchy`](ExecutablePetriNet::refresh_from_hierarchy);
/// it is never patched incrementally.
#[derive(Clone, Debug)]
pub struct ExecutablePetriNet {
    net: PetriNet,
    inbound: HashMap<String, Vec<String>>,
    outbound: HashMap<String, Vec<String>>,
    expressions: HashMap<String, FunctionalExpression>,
    problems: Vec<String>,
}

impl ExecutablePetriNet {
    /// Flatten the hierarchy into an executable net.
    ///
    /// Fails with a structural error on id collisions, unresolvable arc
    /// endpoints or conflicting token definitions; no partial net is ever
    /// returned. Expression problems are not fatal here: they are
    /// collected into [`validation_problems`](Self::validation_problems).
    pub fn from_hierarchy(root: &IncludeHierarchy) -> Result<Self> {
        let net = flatten(root)?;
        Ok(Self::index(net))
    }

    /// Rebuild this net from its hierarchy, replacing the previous
    /// contents wholesale. On failure the previous contents are kept.
    pub fn refresh_from_hierarchy(&mut self, root: &IncludeHierarchy) -> Result<()> {
        *self = Self::from_hierarchy(root)?;
        Ok(())
    }

    fn index(net: PetriNet) -> Self {
        let mut inbound: HashMap<String, Vec<String>> = HashMap::new();
        let mut outbound: HashMap<String, Vec<String>> = HashMap::new();
        for arc in net.arcs().values() {
            let index = if arc.kind().is_inbound() { &mut inbound } else { &mut outbound };
            index.entry(arc.transition().to_string()).or_default().push(arc.id().to_string());
        }
        for arcs in inbound.values_mut().chain(outbound.values_mut()) {
            arcs.sort();
        }

        let mut expressions: HashMap<String, FunctionalExpression> = HashMap::new();
        let mut problems = Vec::new();
        {
            let mut check = |source: &str, context: String| {
                let parsed = expressions
                    .entry(source.to_string())
                    .or_insert_with(|| FunctionalExpression::parse(source, &net));
                for error in parsed.errors() {
                    problems.push(format!("{context}: {error}"));
                }
            };
            for arc in net.arcs().values() {
                for (token_id, expression) in arc.weights() {
                    let arc_id = arc.id();
                    check(expression, format!("arc '{arc_id}', token '{token_id}'"));
                }
            }
            for parameter in net.rate_parameters().values() {
                let parameter_id = parameter.id();
                check(parameter.expression(), format!("rate parameter '{parameter_id}'"));
            }
            for transition in net.transitions().values() {
                if let Rate::Expression(expression) = transition.rate() {
                    let transition_id = transition.id();
                    check(expression, format!("transition '{transition_id}' rate"));
                }
            }
        }
        if !problems.is_empty() {
            warn!(count = problems.len(), "Executable net has expression problems.");
        }
        ExecutablePetriNet { net, inbound, outbound, expressions, problems }
    }

    pub fn net(&self) -> &PetriNet {
        &self.net
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.net.place(id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.net.transition(id)
    }

    pub fn arc(&self, id: &str) -> Option<&Arc> {
        self.net.arc(id)
    }

    pub fn token(&self, id: &str) -> Option<&Token> {
        self.net.token(id)
    }

    pub fn contains_component(&self, id: &str) -> bool {
        self.net.contains_component(id)
    }

    /// Inbound arcs incident on a transition, via the prebuilt index.
    pub fn inbound_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.indexed_arcs(&self.inbound, transition_id)
    }

    /// Outbound arcs incident on a transition, via the prebuilt index.
    pub fn outbound_arcs(&self, transition_id: &str) -> Vec<&Arc> {
        self.indexed_arcs(&self.outbound, transition_id)
    }

    fn indexed_arcs(&self, index: &HashMap<String, Vec<String>>, transition_id: &str) -> Vec<&Arc> {
        index
            .get(transition_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.net.arc(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every expression problem collected while building this net, one
    /// human-readable message per problem.
    pub fn validation_problems(&self) -> &[String] {
        &self.problems
    }

    /// Snapshot of the flattened net's current marking.
    pub fn state(&self) -> State {
        self.net.state()
    }

    /// Evaluate a functional expression against a state, using the parse
    /// cache built when the net was flattened.
    pub fn evaluate_expression(&self, expression: &str, state: &State) -> Result<f64> {
        match self.expressions.get(expression) {
            Some(parsed) => parsed.evaluate(state),
            None => FunctionalExpression::parse(expression, &self.net).evaluate(state),
        }
    }
}

// Derived indexes and collected problems follow from the net, so equality
// and hashing are those of the flattened component set.
impl PartialEq for ExecutablePetriNet {
    fn eq(&self, other: &Self) -> bool {
        self.net == other.net
    }
}

impl Eq for ExecutablePetriNet {}

impl Hash for ExecutablePetriNet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.net.hash(state);
    }
}

struct Instantiated {
    tokens: Vec<Token>,
    annotations: Vec<Annotation>,
    places: Vec<Place>,
    // interface references: (scope, local id, qualified id)
    deferred: Vec<(String, String, String)>,
    transitions: Vec<(String, Transition)>,
    rate_parameters: Vec<(String, RateParameter)>,
    arcs: Vec<(String, Arc)>,
}

/// Two-pass flatten: instantiate renamed copies of every component while
/// filling an old-qualified-id to new-id remap table, then relink arcs,
/// rate references and expression identifiers through that table. The
/// split is what makes forward references work: a sibling scope that is
/// instantiated later can still be referenced by an earlier one.
fn flatten(root: &IncludeHierarchy) -> Result<PetriNet> {
    let mut remap: HashMap<String, String> = HashMap::new();
    let mut out = Instantiated {
        tokens: Vec::new(),
        annotations: Vec::new(),
        places: Vec::new(),
        deferred: Vec::new(),
        transitions: Vec::new(),
        rate_parameters: Vec::new(),
        arcs: Vec::new(),
    };
    let mut token_colors: HashMap<String, String> = HashMap::new();

    // pass 1: instantiate
    for (path, node) in root.nodes() {
        let local = node.net();
        for token in local.tokens().values() {
            match token_colors.get(token.id()) {
                Some(color) if color == token.color() => {}
                Some(_) => {
                    let token_id = token.id();
                    return Err(PetriError::ValueError(format!(
                        "Token '{token_id}' is defined with conflicting colors across the \
                         hierarchy."
                    )));
                }
                None => {
                    token_colors.insert(token.id().to_string(), token.color().to_string());
                    out.tokens.push(token.clone());
                }
            }
        }
        out.annotations.extend(local.annotations().iter().cloned());
        for place in local.places().values() {
            let qualified = format!("{path}.{}", place.id());
            if place.id().contains('.') {
                // a dotted place id is an interface reference into another
                // scope; it merges with the place it names in pass 2
                if place.total_token_count() > 0 {
                    let place_id = place.id();
                    return Err(PetriError::ValueError(format!(
                        "Interface place '{place_id}' in '{path}' must not carry tokens."
                    )));
                }
                out.deferred.push((path.clone(), place.id().to_string(), qualified));
                continue;
            }
            insert_remap(&mut remap, &qualified)?;
            let mut renamed = place.clone();
            renamed.id = qualified;
            out.places.push(renamed);
        }
        for transition in local.transitions().values() {
            let qualified = format!("{path}.{}", transition.id());
            insert_remap(&mut remap, &qualified)?;
            let mut renamed = transition.clone();
            renamed.id = qualified;
            out.transitions.push((path.clone(), renamed));
        }
        for parameter in local.rate_parameters().values() {
            let qualified = format!("{path}.{}", parameter.id());
            insert_remap(&mut remap, &qualified)?;
            let mut renamed = parameter.clone();
            renamed.id = qualified;
            out.rate_parameters.push((path.clone(), renamed));
        }
        for arc in local.arcs().values() {
            let qualified = format!("{path}.{}", arc.id());
            insert_remap(&mut remap, &qualified)?;
            let mut renamed = arc.clone();
            renamed.id = qualified;
            out.arcs.push((path.clone(), renamed));
        }
    }

    // interface references can only be checked once every scope exists
    for (path, local_id, qualified) in &out.deferred {
        if !remap.contains_key(qualified) {
            return Err(PetriError::ValueError(format!(
                "Interface place '{local_id}' in '{path}' does not match any component."
            )));
        }
    }

    // pass 2: relink through the remap table
    for (scope, transition) in &mut out.transitions {
        match &transition.rate {
            Rate::Parameter(parameter_id) => {
                let resolved = resolve(&remap, scope, parameter_id).ok_or_else(|| {
                    let transition_id = &transition.id;
                    PetriError::ValueError(format!(
                        "Transition '{transition_id}' references unknown rate parameter \
                         '{parameter_id}'."
                    ))
                })?;
                transition.rate = Rate::Parameter(resolved);
            }
            Rate::Expression(expression) => {
                transition.rate =
                    Rate::Expression(rename_references(expression, &|id| resolve(&remap, scope, id)));
            }
        }
    }
    for (scope, parameter) in &mut out.rate_parameters {
        parameter.expression =
            rename_references(&parameter.expression, &|id| resolve(&remap, scope, id));
    }
    for (scope, arc) in &mut out.arcs {
        arc.source = resolve_endpoint(&remap, scope, &arc.source, &arc.id)?;
        arc.target = resolve_endpoint(&remap, scope, &arc.target, &arc.id)?;
        let weights = arc
            .weights
            .iter()
            .map(|(token_id, expression)| {
                (token_id.clone(), rename_references(expression, &|id| resolve(&remap, scope, id)))
            })
            .collect();
        arc.weights = weights;
    }

    // assemble through the validating model API, dependencies first
    let mut flat = PetriNet::new();
    if let Some(name) = root.net().name() {
        flat.set_name(name);
    }
    for token in out.tokens {
        flat.add_token(token)?;
    }
    for annotation in out.annotations {
        flat.add_annotation(annotation);
    }
    for (_, parameter) in out.rate_parameters {
        flat.add_rate_parameter(parameter)?;
    }
    for place in out.places {
        flat.add_place(place)?;
    }
    for (_, transition) in out.transitions {
        flat.add_transition(transition)?;
    }
    for (_, arc) in out.arcs {
        flat.add_arc(arc)?;
    }
    debug!(
        places = flat.places().len(),
        transitions = flat.transitions().len(),
        arcs = flat.arcs().len(),
        "Flattened include hierarchy into executable net."
    );
    Ok(flat)
}

fn insert_remap(remap: &mut HashMap<String, String>, qualified: &str) -> Result<()> {
    if remap.insert(qualified.to_string(), qualified.to_string()).is_some() {
        return Err(PetriError::DuplicateId(qualified.to_string()));
    }
    Ok(())
}

/// Scoped lookup: try the reference qualified with the referencing scope
/// itself, then with each enclosing ancestor scope up to the root.
fn resolve(remap: &HashMap<String, String>, scope: &str, reference: &str) -> Option<String> {
    let mut segments: Vec<&str> = scope.split('.').collect();
    while !segments.is_empty() {
        let candidate = format!("{}.{reference}", segments.join("."));
        if let Some(new_id) = remap.get(&candidate) {
            return Some(new_id.clone());
        }
        segments.pop();
    }
    None
}

fn resolve_endpoint(
    remap: &HashMap<String, String>,
    scope: &str,
    endpoint: &str,
    arc_id: &str,
) -> Result<String> {
    resolve(remap, scope, endpoint).ok_or_else(|| {
        PetriError::ValueError(format!(
            "Arc '{arc_id}' references unknown endpoint '{endpoint}'."
        ))
    })
}
