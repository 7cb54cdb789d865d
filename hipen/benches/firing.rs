/// Benchmark enabling checks and firing on a flattened chain net:
///
///   P0 ──► T0 ──► P1 ──► T1 ──► ... ──► Pn
///
/// Every inbound arc carries a functional weight so the expression
/// evaluator sits on the hot path, as it does in real nets.
use criterion::{criterion_group, criterion_main, Criterion};

use hipen::net::{
    Arc, ArcKind, ExecutablePetriNet, IncludeHierarchy, PetriNet, Place, Token, Transition,
};

const CHAIN_LEN: usize = 50;

fn chain_net() -> ExecutablePetriNet {
    let mut net = PetriNet::new();
    net.add_token(Token::default_token()).unwrap();
    for idx in 0..=CHAIN_LEN {
        net.add_place(Place::new(format!("P{idx}"))).unwrap();
    }
    for idx in 0..CHAIN_LEN {
        let place = format!("P{idx}");
        let next = format!("P{}", idx + 1);
        let transition = format!("T{idx}");
        net.add_transition(Transition::new(transition.clone())).unwrap();
        net.add_arc(
            Arc::new(place.clone(), transition.clone(), ArcKind::InboundNormal)
                .with_weight("Default", format!("ceil(#({place}) / 2)")),
        )
        .unwrap();
        net.add_arc(
            Arc::new(transition, next, ArcKind::Outbound).with_weight("Default", "1"),
        )
        .unwrap();
    }
    net.set_token_count("P0", "Default", 8).unwrap();
    let root = IncludeHierarchy::new("root", net).unwrap();
    ExecutablePetriNet::from_hierarchy(&root).unwrap()
}

fn bench_enabled_transitions(c: &mut Criterion) {
    let net = chain_net();
    let state = net.state();
    c.bench_function("enabled_transitions", |b| {
        b.iter(|| net.enabled_transitions(&state).unwrap().len())
    });
}

fn bench_fire_chain(c: &mut Criterion) {
    let net = chain_net();
    let initial = net.state();
    c.bench_function("fire_chain", |b| {
        b.iter(|| {
            let mut state = initial.clone();
            while let Some(transition) =
                net.enabled_transitions(&state).unwrap().first().copied()
            {
                state = net.fire(transition.id(), &state).unwrap();
            }
            state
        })
    });
}

fn bench_flatten(c: &mut Criterion) {
    let mut net = PetriNet::new();
    net.add_token(Token::default_token()).unwrap();
    net.add_place(Place::new("P0")).unwrap();
    let mut root = IncludeHierarchy::new("root", net).unwrap();
    for idx in 0..20 {
        let mut sub = PetriNet::new();
        sub.add_token(Token::default_token()).unwrap();
        sub.add_place(Place::new("P0")).unwrap();
        sub.add_transition(Transition::new("T0")).unwrap();
        sub.add_arc(
            Arc::new("P0", "T0", ArcKind::InboundNormal).with_weight("Default", "#(P0)"),
        )
        .unwrap();
        root.include(format!("sub{idx}"), sub).unwrap();
    }
    c.bench_function("flatten_hierarchy", |b| {
        b.iter(|| ExecutablePetriNet::from_hierarchy(&root).unwrap())
    });
}

criterion_group!(benches, bench_enabled_transitions, bench_fire_chain, bench_flatten);
criterion_main!(benches);
