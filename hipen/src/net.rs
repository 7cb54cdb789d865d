mod change;
mod clone;
mod common;
mod document;
mod executable;
mod hierarchy;
mod model;

pub use change::{NetChange, NetChangeEvent};
pub use clone::ClonePetriNet;
pub use common::{
    Annotation, Arc, ArcKind, ArcPoint, Component, Place, PlaceBuilder, PlaceBuilderError, Rate,
    RateParameter, Token, Transition, TransitionBuilder, TransitionBuilderError, DEFAULT_TOKEN,
};
pub use document::NetDocument;
pub use executable::ExecutablePetriNet;
pub use hierarchy::IncludeHierarchy;
pub use model::PetriNet;
