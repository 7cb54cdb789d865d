use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Token id used by the single-argument form of the token-count operator,
/// `#(P0)`.
pub const DEFAULT_TOKEN: &str = "Default";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    id: String,
    color: String,
}

impl Token {
    pub fn new(id: impl Into<String>, color: impl Into<String>) -> Self {
        Token { id: id.into(), color: color.into() }
    }

    /// The default black token most nets start from.
    pub fn default_token() -> Self {
        Token::new(DEFAULT_TOKEN, "black")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct Place {
    pub(super) id: String,
    #[builder(default)]
    pub(super) name: String,
    #[builder(default)]
    pub(super) x: i32,
    #[builder(default)]
    pub(super) y: i32,
    #[builder(default)]
    pub(super) name_offset_x: f64,
    #[builder(default)]
    pub(super) name_offset_y: f64,
    #[builder(setter(into, strip_option), default)]
    pub(super) capacity: Option<u64>,
    #[builder(default)]
    pub(super) tokens: BTreeMap<String, u64>,
}

impl Place {
    pub fn new(id: impl Into<String>) -> Self {
        Place {
            id: id.into(),
            name: Default::default(),
            x: 0,
            y: 0,
            name_offset_x: 0.0,
            name_offset_y: 0.0,
            capacity: None,
            tokens: Default::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name; falls back to the id when no name was given.
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn name_offset(&self) -> (f64, f64) {
        (self.name_offset_x, self.name_offset_y)
    }

    /// None means the place is unbounded.
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Current marking of this place, token id to count.
    pub fn tokens(&self) -> &BTreeMap<String, u64> {
        &self.tokens
    }

    pub fn token_count(&self, token_id: &str) -> u64 {
        self.tokens.get(token_id).copied().unwrap_or(0)
    }

    pub fn total_token_count(&self) -> u64 {
        self.tokens.values().sum()
    }
}

impl Eq for Place {}

// Note: offsets are hashed bitwise; NaN offsets are not expected.
impl Hash for Place {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.x.hash(state);
        self.y.hash(state);
        self.name_offset_x.to_bits().hash(state);
        self.name_offset_y.to_bits().hash(state);
        self.capacity.hash(state);
        self.tokens.hash(state);
    }
}

/// Rate of a transition, either an inline functional expression or a
/// reference to a shared rate parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rate {
    Expression(String),
    Parameter(String),
}

impl Rate {
    pub fn expression(expression: impl Into<String>) -> Self {
        Rate::Expression(expression.into())
    }

    pub fn parameter(id: impl Into<String>) -> Self {
        Rate::Parameter(id.into())
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::Expression("1".into())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct Transition {
    pub(super) id: String,
    #[builder(default)]
    pub(super) name: String,
    #[builder(default)]
    pub(super) x: i32,
    #[builder(default)]
    pub(super) y: i32,
    #[builder(default)]
    pub(super) name_offset_x: f64,
    #[builder(default)]
    pub(super) name_offset_y: f64,
    /// Timed transitions fire according to their rate, immediate ones as
    /// soon as they are enabled. Selecting between them is the caller's
    /// stepping policy.
    #[builder(default)]
    pub(super) timed: bool,
    #[builder(default)]
    pub(super) rate: Rate,
    #[builder(default = "1")]
    pub(super) priority: u32,
    #[builder(default)]
    pub(super) infinite_server: bool,
}

impl Transition {
    pub fn new(id: impl Into<String>) -> Self {
        Transition {
            id: id.into(),
            name: Default::default(),
            x: 0,
            y: 0,
            name_offset_x: 0.0,
            name_offset_y: 0.0,
            timed: false,
            rate: Default::default(),
            priority: 1,
            infinite_server: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn name_offset(&self) -> (f64, f64) {
        (self.name_offset_x, self.name_offset_y)
    }

    pub fn is_timed(&self) -> bool {
        self.timed
    }

    pub fn rate(&self) -> &Rate {
        &self.rate
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn is_infinite_server(&self) -> bool {
        self.infinite_server
    }
}

impl Eq for Transition {}

impl Hash for Transition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.x.hash(state);
        self.y.hash(state);
        self.name_offset_x.to_bits().hash(state);
        self.name_offset_y.to_bits().hash(state);
        self.timed.hash(state);
        self.rate.hash(state);
        self.priority.hash(state);
        self.infinite_server.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateParameter {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) expression: String,
}

impl RateParameter {
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Self {
        RateParameter { id: id.into(), name: Default::default(), expression: expression.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcKind {
    /// Place to transition; blocks unless the source holds enough tokens.
    InboundNormal,
    /// Place to transition; blocks unless the source is completely empty.
    InboundInhibitor,
    /// Transition to place; deposits tokens on firing.
    Outbound,
}

impl ArcKind {
    /// True for all arcs running from a place into a transition.
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::InboundNormal | Self::InboundInhibitor)
    }

    /// True for all arcs running from a transition into a place.
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound)
    }
}

/// Intermediate bend point of an arc's rendered path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArcPoint {
    pub x: f64,
    pub y: f64,
    pub curved: bool,
}

impl ArcPoint {
    pub fn new(x: f64, y: f64, curved: bool) -> Self {
        ArcPoint { x, y, curved }
    }
}

impl Eq for ArcPoint {}

impl Hash for ArcPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        self.curved.hash(state);
    }
}

/// Directed weighted edge between a place and a transition.
///
/// The id is derived from the endpoints when the arc is created, so no two
/// arcs of one net may share a (source, target) pair. Weights are
/// functional expression strings per token id, evaluated against a state
/// snapshot when the arc is checked or fired.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub(super) id: String,
    pub(super) source: String,
    pub(super) target: String,
    pub(super) kind: ArcKind,
    pub(super) weights: BTreeMap<String, String>,
    pub(super) points: Vec<ArcPoint>,
}

impl Arc {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: ArcKind) -> Self {
        let source = source.into();
        let target = target.into();
        Arc {
            id: derive_arc_id(&source, &target),
            source,
            target,
            kind,
            weights: Default::default(),
            points: Default::default(),
        }
    }

    pub fn with_weight(mut self, token_id: impl Into<String>, expression: impl Into<String>) -> Self {
        self.weights.insert(token_id.into(), expression.into());
        self
    }

    pub fn with_point(mut self, point: ArcPoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> ArcKind {
        self.kind
    }

    /// Weight expression per token id.
    pub fn weights(&self) -> &BTreeMap<String, String> {
        &self.weights
    }

    pub fn points(&self) -> &[ArcPoint] {
        &self.points
    }

    /// The place end of the arc, whichever direction it runs in.
    pub fn place(&self) -> &str {
        if self.kind.is_inbound() {
            &self.source
        } else {
            &self.target
        }
    }

    /// The transition end of the arc, whichever direction it runs in.
    pub fn transition(&self) -> &str {
        if self.kind.is_inbound() {
            &self.target
        } else {
            &self.source
        }
    }
}

pub(super) fn derive_arc_id(source: &str, target: &str) -> String {
    format!("{source} TO {target}")
}

/// Closed set of component kinds a net owns. Operations that act on "any
/// component" (add, clone, serialize) dispatch over this enum exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Token(Token),
    Place(Place),
    Transition(Transition),
    Arc(Arc),
    Annotation(Annotation),
    RateParameter(RateParameter),
}

impl Component {
    /// Annotations are the one kind without an id.
    pub fn id(&self) -> Option<&str> {
        match self {
            Component::Token(token) => Some(token.id()),
            Component::Place(place) => Some(place.id()),
            Component::Transition(transition) => Some(transition.id()),
            Component::Arc(arc) => Some(arc.id()),
            Component::Annotation(_) => None,
            Component::RateParameter(parameter) => Some(parameter.id()),
        }
    }
}

/// Free-floating text label; data only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub width: i32,
    pub height: i32,
    pub border: bool,
}

impl Annotation {
    pub fn new(x: i32, y: i32, text: impl Into<String>, width: i32, height: i32, border: bool) -> Self {
        Annotation { x, y, text: text.into(), width, height, border }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of(value: &impl Hash) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn arc_id_derives_from_endpoints() {
        let arc = Arc::new("P0", "T0", ArcKind::InboundNormal);
        assert_eq!(arc.id(), "P0 TO T0");
        assert_eq!(arc.place(), "P0");
        assert_eq!(arc.transition(), "T0");
    }

    #[test]
    fn outbound_arc_endpoint_roles() {
        let arc = Arc::new("T0", "P1", ArcKind::Outbound);
        assert_eq!(arc.place(), "P1");
        assert_eq!(arc.transition(), "T0");
        assert!(arc.kind().is_outbound());
        assert!(!arc.kind().is_inbound());
    }

    #[test]
    fn place_name_falls_back_to_id() {
        let place = Place::new("P0");
        assert_eq!(place.name(), "P0");
        let named = PlaceBuilder::default().id("P0").name("start").build().unwrap();
        assert_eq!(named.name(), "start");
    }

    #[test]
    fn place_builder_defaults() {
        let place = PlaceBuilder::default().id("P0").capacity(3u64).build().unwrap();
        assert_eq!(place.capacity(), Some(3));
        assert_eq!(place.position(), (0, 0));
        assert_eq!(place.total_token_count(), 0);
    }

    #[test]
    fn transition_builder_defaults() {
        let transition = TransitionBuilder::default().id("T0").build().unwrap();
        assert!(!transition.is_timed());
        assert_eq!(transition.priority(), 1);
        assert_eq!(transition.rate(), &Rate::Expression("1".into()));
    }

    #[test]
    fn equal_places_hash_equal() {
        let a = PlaceBuilder::default().id("P0").x(3).name_offset_x(-5.0).build().unwrap();
        let b = PlaceBuilder::default().id("P0").x(3).name_offset_x(-5.0).build().unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        let c = PlaceBuilder::default().id("P0").x(4).name_offset_x(-5.0).build().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn component_ids() {
        assert_eq!(Component::Place(Place::new("P0")).id(), Some("P0"));
        assert_eq!(Component::Annotation(Annotation::new(0, 0, "note", 10, 10, true)).id(), None);
    }
}
