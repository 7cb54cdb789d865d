use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::{Annotation, Arc, Component, PetriNet, Place, RateParameter, Token, Transition};

/// Flat, typed component listing of one net, sufficient for lossless
/// round-trip persistence. Components are listed sorted by id and grouped
/// in dependency order, so re-adding them in document order always
/// satisfies the validating add API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tokens: Vec<Token>,
    pub annotations: Vec<Annotation>,
    pub rate_parameters: Vec<RateParameter>,
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    pub arcs: Vec<Arc>,
}

impl NetDocument {
    pub fn from_net(net: &PetriNet) -> Self {
        NetDocument {
            name: net.name().map(str::to_string),
            tokens: sorted_by_id(net.tokens().values().cloned(), Token::id),
            annotations: net.annotations().to_vec(),
            rate_parameters: sorted_by_id(net.rate_parameters().values().cloned(), RateParameter::id),
            places: sorted_by_id(net.places().values().cloned(), Place::id),
            transitions: sorted_by_id(net.transitions().values().cloned(), Transition::id),
            arcs: sorted_by_id(net.arcs().values().cloned(), Arc::id),
        }
    }

    /// Rebuild a net, re-validating every component on the way in.
    pub fn into_net(self) -> Result<PetriNet> {
        let mut net = match self.name {
            Some(name) => PetriNet::named(name),
            None => PetriNet::new(),
        };
        let components = self
            .tokens
            .into_iter()
            .map(Component::Token)
            .chain(self.annotations.into_iter().map(Component::Annotation))
            .chain(self.rate_parameters.into_iter().map(Component::RateParameter))
            .chain(self.places.into_iter().map(Component::Place))
            .chain(self.transitions.into_iter().map(Component::Transition))
            .chain(self.arcs.into_iter().map(Component::Arc));
        for component in components {
            net.add(component)?;
        }
        Ok(net)
    }
}

fn sorted_by_id<T>(components: impl Iterator<Item = T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    let mut batch: Vec<T> = components.collect();
    batch.sort_by(|a, b| id(a).cmp(&id(b)));
    batch
}

impl PetriNet {
    pub fn document(&self) -> NetDocument {
        NetDocument::from_net(self)
    }

    pub fn from_document(document: NetDocument) -> Result<Self> {
        document.into_net()
    }

    /// Save the net's component listing as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.document())?;
        debug!(path = %path.display(), "Saved net.");
        Ok(())
    }

    /// Load a net from a JSON component listing, re-validating it.
    pub fn load(path: &Path) -> Result<PetriNet> {
        let file = File::open(path)?;
        let document: NetDocument = serde_json::from_reader(BufReader::new(file))?;
        debug!(path = %path.display(), "Loaded net.");
        document.into_net()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ArcKind, ArcPoint, PlaceBuilder, Rate, TransitionBuilder};

    fn full_net() -> PetriNet {
        let mut net = PetriNet::named("doc net");
        net.add_token(Token::default_token()).unwrap();
        net.add_token(Token::new("Red", "red")).unwrap();
        net.add_rate_parameter(RateParameter::new("R0", "2 * #(P0)")).unwrap();
        net.add_place(
            PlaceBuilder::default()
                .id("P0")
                .name("start")
                .x(10)
                .y(20)
                .name_offset_x(-5.0)
                .name_offset_y(35.0)
                .capacity(4u64)
                .build()
                .unwrap(),
        )
        .unwrap();
        net.add_place(Place::new("P1")).unwrap();
        net.add_transition(
            TransitionBuilder::default()
                .id("T0")
                .timed(true)
                .rate(Rate::parameter("R0"))
                .priority(2u32)
                .infinite_server(true)
                .build()
                .unwrap(),
        )
        .unwrap();
        net.add_arc(
            Arc::new("P0", "T0", ArcKind::InboundNormal)
                .with_weight("Default", "1")
                .with_weight("Red", "#(P1, Red)")
                .with_point(ArcPoint::new(15.0, 25.0, true)),
        )
        .unwrap();
        net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "2")).unwrap();
        net.add_annotation(Annotation::new(5, 5, "a note", 100, 40, true));
        net.set_token_count("P0", "Default", 3).unwrap();
        net
    }

    #[test]
    fn document_lists_components_sorted() {
        let doc = full_net().document();
        assert_eq!(doc.places[0].id(), "P0");
        assert_eq!(doc.places[1].id(), "P1");
        assert_eq!(doc.arcs[0].id(), "P0 TO T0");
        assert_eq!(doc.arcs[1].id(), "T0 TO P1");
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let net = full_net();
        let json = serde_json::to_string_pretty(&net.document()).unwrap();
        let document: NetDocument = serde_json::from_str(&json).unwrap();
        let restored = PetriNet::from_document(document).unwrap();
        assert_eq!(net, restored);
    }

    #[test]
    fn round_trip_keeps_field_values() {
        let document = full_net().document();
        let restored = document.clone().into_net().unwrap();
        let place = restored.place("P0").unwrap();
        assert_eq!(place.name(), "start");
        assert_eq!(place.position(), (10, 20));
        assert_eq!(place.name_offset(), (-5.0, 35.0));
        assert_eq!(place.capacity(), Some(4));
        assert_eq!(place.token_count("Default"), 3);
        let transition = restored.transition("T0").unwrap();
        assert!(transition.is_timed());
        assert!(transition.is_infinite_server());
        assert_eq!(transition.priority(), 2);
        assert_eq!(transition.rate(), &Rate::parameter("R0"));
        let arc = restored.arc("P0 TO T0").unwrap();
        assert_eq!(arc.points(), &[ArcPoint::new(15.0, 25.0, true)]);
        assert_eq!(arc.weights()["Red"], "#(P1, Red)");
    }

    #[test]
    fn save_and_load_round_trip() {
        let net = full_net();
        let path = std::env::temp_dir().join("hipen-document-roundtrip.json");
        net.save(&path).unwrap();
        let loaded = PetriNet::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(net, loaded);
    }

    #[test]
    fn documents_revalidate_on_the_way_in() {
        let mut document = full_net().document();
        document.places.remove(0);
        let err = PetriNet::from_document(document).unwrap_err();
        assert!(err.to_string().contains("cannot be added"));
    }
}
