use hipen::{
    error::Result as PetriResult,
    net::{Arc, ArcKind, ExecutablePetriNet, IncludeHierarchy, PetriNet, Place, Token, Transition},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A worker subnet: jobs arrive on 'queue' and leave on 'done'. The weight
/// of the processing arc tracks the queue length, so one firing drains the
/// whole queue.
fn worker() -> PetriResult<PetriNet> {
    let mut net = PetriNet::named("worker");
    net.add_token(Token::default_token())?;
    net.add_place(Place::new("queue"))?;
    net.add_place(Place::new("done"))?;
    net.add_transition(Transition::new("process"))?;
    net.add_arc(
        Arc::new("queue", "process", ArcKind::InboundNormal).with_weight("Default", "#(queue)"),
    )?;
    net.add_arc(
        Arc::new("process", "done", ArcKind::Outbound).with_weight("Default", "#(queue)"),
    )?;
    Ok(net)
}

/// The parent net feeds both workers through interface places.
fn run() -> PetriResult<()> {
    let mut parent = PetriNet::named("dispatcher");
    parent.add_token(Token::default_token())?;
    parent.add_place(Place::new("jobs"))?;
    parent.add_place(Place::new("left.queue"))?;
    parent.add_place(Place::new("right.queue"))?;
    parent.add_transition(Transition::new("dispatch"))?;
    parent.add_arc(
        Arc::new("jobs", "dispatch", ArcKind::InboundNormal).with_weight("Default", "2"),
    )?;
    parent.add_arc(
        Arc::new("dispatch", "left.queue", ArcKind::Outbound).with_weight("Default", "1"),
    )?;
    parent.add_arc(
        Arc::new("dispatch", "right.queue", ArcKind::Outbound).with_weight("Default", "1"),
    )?;
    parent.set_token_count("jobs", "Default", 2)?;

    let mut root = IncludeHierarchy::new("root", parent)?;
    root.include("left", worker()?)?;
    root.include("right", worker()?)?;

    let executable = ExecutablePetriNet::from_hierarchy(&root)?;
    for problem in executable.validation_problems() {
        info!(%problem, "Validation problem.");
    }

    let mut state = executable.state();
    while let Some(transition) = executable.enabled_transitions(&state)?.first().copied() {
        info!(transition = transition.id(), "Firing.");
        state = executable.fire(transition.id(), &state)?;
    }
    info!(
        left = state.count("root.left.done", "Default"),
        right = state.count("root.right.done", "Default"),
        "All jobs processed."
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
