use hipen::{
    error::Result as PetriResult,
    net::{Arc, ArcKind, ExecutablePetriNet, IncludeHierarchy, PetriNet, Place, Token, Transition},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Builds a two place loop and fires whatever is enabled for a few steps:
///
///   P0 ──► T0 ──► P1 ──► T1 ──► P0
fn run() -> PetriResult<()> {
    let mut net = PetriNet::named("simple loop");
    net.add_token(Token::default_token())?;
    net.add_place(Place::new("P0"))?;
    net.add_place(Place::new("P1"))?;
    net.add_transition(Transition::new("T0"))?;
    net.add_transition(Transition::new("T1"))?;
    net.add_arc(Arc::new("P0", "T0", ArcKind::InboundNormal).with_weight("Default", "1"))?;
    net.add_arc(Arc::new("T0", "P1", ArcKind::Outbound).with_weight("Default", "1"))?;
    net.add_arc(Arc::new("P1", "T1", ArcKind::InboundNormal).with_weight("Default", "1"))?;
    net.add_arc(Arc::new("T1", "P0", ArcKind::Outbound).with_weight("Default", "1"))?;
    net.set_token_count("P0", "Default", 1)?;

    let root = IncludeHierarchy::new("root", net)?;
    let executable = ExecutablePetriNet::from_hierarchy(&root)?;
    let mut state = executable.state();
    for step in 0..6 {
        let enabled = executable.enabled_transitions(&state)?;
        let Some(transition) = enabled.first() else {
            info!(step, "Deadlock, nothing enabled.");
            break;
        };
        info!(step, transition = transition.id(), "Firing.");
        state = executable.fire(transition.id(), &state)?;
    }
    info!(
        p0 = state.count("root.P0", "Default"),
        p1 = state.count("root.P1", "Default"),
        "Final marking."
    );
    Ok(())
}

fn main() -> PetriResult<()> {
    // set up logging
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::try_new("info,hipen=debug").unwrap())
        .init();

    run()
}
