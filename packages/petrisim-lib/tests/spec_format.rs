use petrisim_lib::{
    marking::Marking,
    net::{PetriNetQuery, initialized::InitializedPetriNet, spec::ToSpecFormat},
    reachability::{
        algorithms::{BreadthFirst, ReachabilityAlgorithm},
        event::Reporter,
        pathfinder::Pathfinder,
    },
    simulation::setup::SimulationSetup,
};

const DIMER: &str = r#"
vars
    a b c
rules
    a >= 2 ->
        a' = a-2,
        b' = b+1;
    b >= 1 ->
        b' = b-1,
        c' = c+1;
init
    a=4, b=0, c=0
target
    a=0, b=0, c=2
rates
    t1 = 0.5;
    t2 = 0.1 * a;
"#;

#[test]
fn test_parse_spec_with_rates() {
    let petri_net = InitializedPetriNet::parse_from_spec(DIMER).unwrap();
    let net = &petri_net.net;

    assert_eq!(net.place_count(), 3);
    assert_eq!(net.transition_count(), 2);
    assert_eq!(petri_net.initial_marking, Marking::from(vec![4, 0, 0]));
    assert_eq!(petri_net.target_marking, Marking::from(vec![0, 0, 2]));

    let t1 = net.find_transition("t1").unwrap();
    let t2 = net.find_transition("t2").unwrap();
    assert_eq!(net.input_weight(net.find_place("a").unwrap(), t1), 2);
    assert_eq!(net.rate_expression(t1), "0.5");
    assert_eq!(net.rate_expression(t2), "0.1 * a");
}

#[test]
fn test_spec_format_is_reparsable() {
    let petri_net = InitializedPetriNet::parse_from_spec(DIMER).unwrap();
    let reparsed = InitializedPetriNet::parse_from_spec(&petri_net.to_spec_format()).unwrap();

    assert_eq!(reparsed, petri_net);
}

#[test]
fn test_search_on_parsed_net() {
    let petri_net = InitializedPetriNet::parse_from_spec(DIMER).unwrap();
    let result = BreadthFirst::new(
        Pathfinder::new(&petri_net.net),
        petri_net.initial_marking.clone(),
        petri_net.target_marking.clone(),
    )
    .run(&mut Reporter::new());

    assert_eq!(result.path().map(|p| p.len()), Some(4));
}

#[test]
fn test_unknown_rate_transition() {
    let spec = DIMER.replace("t2 = 0.1 * a;", "t9 = 1;");
    assert!(InitializedPetriNet::parse_from_spec(&spec).is_err());
}

#[test]
fn test_setup_export() {
    let petri_net = InitializedPetriNet::parse_from_spec(DIMER).unwrap();
    let setup = SimulationSetup::from_net(&petri_net.net, &petri_net.initial_marking);

    let json = setup.to_json().unwrap();
    assert_eq!(SimulationSetup::from_json(&json).unwrap(), setup);

    let xml = setup.to_xml(&petri_net.net);
    assert!(xml.contains("<SimulationSetup>"));
    assert!(xml.contains("<place id=\"0\" name=\"a\" isConstant=\"false\" nrOfTokens=\"4\"/>"));
    assert!(xml.contains("<expressionText>0.1 * a</expressionText>"));
    assert!(xml.contains("<variable name=\"a\" placeId=\"0\"/>"));
    assert!(xml.contains("</SimulationSetup>"));
}
