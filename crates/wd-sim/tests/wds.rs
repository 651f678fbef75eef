//! Integration tests for the live model over the in-process engine.

use proptest::prelude::*;
use wd_core::{LinkStatus, LinkType, NodeType};
use wd_engine::{CountKind, LinkProperty, NodeProperty};
use wd_graph::{GraphError, IdSequence, Junction, LinkKind, Node, NodeKind, Pipe};
use wd_project::*;
use wd_sim::*;

fn fixture() -> NetworkDef {
    let mut def = NetworkDef::new("fixture");
    def.patterns = vec![PatternDef {
        id: "PUMP1".into(),
        multipliers: vec![0.0; 24],
    }];
    let junction = |id: &str, elevation: f64, base_demand: f64| NodeDef {
        id: id.into(),
        elevation,
        kind: NodeKindDef::Junction {
            base_demand,
            pattern: None,
        },
    };
    def.nodes = vec![
        NodeDef {
            id: "R1".into(),
            elevation: 100.0,
            kind: NodeKindDef::Reservoir { pattern: None },
        },
        junction("J1", 95.0, 0.0),
        junction("J2", 90.0, 10.0),
        junction("J3", 92.0, 8.0),
        NodeDef {
            id: "TK1".into(),
            elevation: 110.0,
            kind: NodeKindDef::Tank {
                initial_level: 4.0,
                min_level: 1.0,
                max_level: 8.0,
                diameter: 15.0,
                min_volume: 0.0,
            },
        },
    ];
    let pipe = |id: &str, from: &str, to: &str| LinkDef {
        id: id.into(),
        from: from.into(),
        to: to.into(),
        status: LinkStatus::Open,
        kind: LinkKindDef::Pipe {
            length: 1000.0,
            diameter: 300.0,
            roughness: 100.0,
        },
    };
    def.links = vec![
        LinkDef {
            id: "PU1".into(),
            from: "R1".into(),
            to: "J1".into(),
            status: LinkStatus::Open,
            kind: LinkKindDef::Pump {
                power: 30.0,
                design_flow: 18.0,
                design_head: 40.0,
                pattern: Some("PUMP1".into()),
            },
        },
        pipe("P1", "J1", "J2"),
        pipe("P2", "J2", "J3"),
        pipe("P3", "J3", "TK1"),
    ];
    def
}

fn wds() -> WaterDistributionSystem {
    WaterDistributionSystem::from_def(&fixture()).unwrap()
}

fn junction(elevation: f64) -> Node {
    Node::new(elevation, NodeKind::Junction(Junction::default()))
}

fn pipe(diameter: f64) -> LinkKind {
    LinkKind::Pipe(Pipe {
        length: 100.0,
        diameter,
        roughness: 130.0,
    })
}

#[test]
fn load_mirrors_engine() {
    let wds = wds();
    assert_eq!(wds.network().nodes().len(), 5);
    assert_eq!(wds.network().pipes().len(), 3);
    assert_eq!(wds.network().pumps().len(), 1);
    assert_eq!(wds.network().tanks().len(), 1);
    assert!(wds.temp_elements().is_empty());
    wds.verify_synchronized().unwrap();

    // Internal units: LPS network, pipe diameter in metres.
    let p1 = wds.network().pipe("P1").unwrap();
    assert!((p1.diameter - 0.3).abs() < 1e-12);
    let pump = wds.network().pump("PU1").unwrap();
    assert_eq!(pump.speed_pattern.as_deref(), Some("PUMP1"));
}

#[test]
fn load_from_persisted_description() {
    let path = std::env::temp_dir().join("wd_sim_load_fixture.yaml");
    wd_project::save(&path, &fixture()).unwrap();
    let wds: WaterDistributionSystem = WaterDistributionSystem::load(&path).unwrap();
    wds.verify_synchronized().unwrap();
    assert_eq!(wds.network().junctions().len(), 3);
}

#[test]
fn stale_index_fails_fast_and_refreshes_lazily() {
    let mut wds = wds();
    let before = wds.cached_node_index("TK1").unwrap();

    wds.insert_node("J4", junction(80.0)).unwrap();
    assert!(matches!(
        wds.cached_node_index("TK1"),
        Err(SimError::StaleIndex { .. })
    ));

    // Property calls refresh the cache themselves.
    wds.set_node_property("TK1", NodeProperty::MinLevel, 2.0)
        .unwrap();
    assert!(wds.is_cache_fresh());
    assert_eq!(wds.cached_node_index("TK1").unwrap(), before + 1);
    assert_eq!(wds.network().tank("TK1").unwrap().min_level, 2.0);
}

#[test]
fn install_link_with_missing_endpoint_changes_nothing() {
    let mut wds = wds();
    let epoch = wds.epoch();
    let err = wds
        .install_link("X1", "J1", "NOWHERE", LinkStatus::Open, pipe(0.2))
        .unwrap_err();
    assert!(matches!(
        err,
        SimError::Graph(GraphError::InvalidReference { .. })
    ));
    assert_eq!(wds.epoch(), epoch);
    assert_eq!(wds.adapter().count(CountKind::Links), 4);
    wds.verify_synchronized().unwrap();
}

#[test]
fn rejected_property_rolls_back_the_engine_add() {
    let mut wds = wds();
    let bad = LinkKind::Pipe(Pipe {
        length: 100.0,
        diameter: -1.0,
        roughness: 130.0,
    });
    let err = wds
        .install_link("X1", "J1", "J3", LinkStatus::Open, bad)
        .unwrap_err();
    assert!(matches!(err, SimError::Engine(_)));
    assert!(!wds.network().links().contains("X1"));
    assert_eq!(wds.adapter().count(CountKind::Links), 4);
    wds.verify_synchronized().unwrap();
}

#[test]
fn duplicate_then_remove_restores_structure() {
    let mut wds = wds();
    wds.duplicate("P1", "DP1").unwrap();
    assert_eq!(wds.network().endpoints("DP1").unwrap(), ("J1", "J2"));
    assert_eq!(
        wds.network().pipe("DP1").unwrap(),
        wds.network().pipe("P1").unwrap()
    );
    assert_eq!(wds.link_property("DP1", LinkProperty::Length).unwrap(), 1000.0);
    assert_eq!(wds.network().node("J1").unwrap().links.len(), 3);
    wds.verify_synchronized().unwrap();

    assert_eq!(wds.remove("DP1").unwrap(), 1);
    assert_eq!(wds.remove("DP1").unwrap(), 0);
    assert_eq!(wds.network().node("J1").unwrap().links.len(), 2);
    wds.verify_synchronized().unwrap();
}

#[test]
fn remove_node_takes_incident_links() {
    let mut wds = wds();
    assert_eq!(wds.remove("J2").unwrap(), 1);
    assert!(!wds.network().links().contains("P1"));
    assert!(!wds.network().links().contains("P2"));
    assert_eq!(wds.adapter().count(CountKind::Links), 2);
    wds.verify_synchronized().unwrap();
}

#[test]
fn uninstall_refuses_connected_node() {
    let mut wds = wds();
    let err = wds.uninstall("J2").unwrap_err();
    assert!(matches!(err, SimError::Engine(_)));
    assert!(wds.network().nodes().contains("J2"));
    wds.verify_synchronized().unwrap();

    wds.insert_node("LONE", junction(1.0)).unwrap();
    assert_eq!(wds.uninstall("LONE").unwrap(), 1);
    wds.verify_synchronized().unwrap();
}

#[test]
fn property_without_a_registry_field_is_refused() {
    let mut wds = wds();
    let err = wds
        .set_node_property("J1", NodeProperty::TankDiameter, 3.0)
        .unwrap_err();
    assert!(matches!(
        &err,
        SimError::PropertyMismatch { id, property } if id == "J1" && property == "TankDiameter"
    ));
    assert!(matches!(
        wds.set_node_property("J1", NodeProperty::Head, 50.0),
        Err(SimError::PropertyMismatch { .. })
    ));
    assert!(matches!(
        wds.set_link_property("PU1", LinkProperty::Diameter, 0.3),
        Err(SimError::PropertyMismatch { .. })
    ));
    assert!(matches!(
        wds.set_link_property("P2", LinkProperty::Flow, 1.0),
        Err(SimError::PropertyMismatch { .. })
    ));
    wds.verify_synchronized().unwrap();
}

#[test]
fn link_property_writes_are_mirrored() {
    let mut wds = wds();
    wds.set_link_property("P2", LinkProperty::Diameter, 0.45)
        .unwrap();
    assert!((wds.network().pipe("P2").unwrap().diameter - 0.45).abs() < 1e-12);
    assert!((wds.link_property("P2", LinkProperty::Diameter).unwrap() - 0.45).abs() < 1e-12);

    wds.set_link_property("PU1", LinkProperty::PumpPattern, 0.0)
        .unwrap();
    assert_eq!(wds.network().pump("PU1").unwrap().speed_pattern, None);
}

#[test]
fn pump_schedule_drives_recorded_results() {
    let mut wds = wds();
    let settings = HydraulicSettings::default();

    let run = wds.run_hydraulics(&settings).unwrap();
    assert!(run.is_successful());
    assert_eq!(wds.times().len(), 25);
    let pump = wds.network().link("PU1").unwrap();
    assert_eq!(pump.results.flow.len(), 25);
    assert!(pump.results.flow.values().all(|q| q == 0.0));
    assert!(pump.results.energy.values().all(|e| e == 0.0));

    let mut on = vec![0.0; 24];
    on[3] = 1.0;
    wds.set_pattern("PUMP1", &on).unwrap();
    wds.run_hydraulics(&settings).unwrap();
    let pump = wds.network().link("PU1").unwrap();
    assert_eq!(pump.results.flow.len(), 25);
    let q = pump.results.flow.at(3 * 3600).unwrap();
    assert!((q - 18.0).abs() < 1e-9);
    assert_eq!(pump.results.flow.at(4 * 3600), Some(0.0));
    assert_eq!(pump.results.energy.integral(), 30.0 * 3600.0);
    let tank = wds.network().node("TK1").unwrap();
    assert_eq!(tank.results.level.len(), 25);
}

#[test]
fn report_step_thins_recorded_results() {
    let mut wds = wds();
    let settings = HydraulicSettings {
        save_all_steps: false,
        report_step_s: 6 * 3600,
        ..Default::default()
    };
    let run = wds.run_hydraulics(&settings).unwrap();
    assert_eq!(run.steps.len(), 25);
    assert_eq!(wds.times(), &[0, 21600, 43200, 64800, 86400]);
}

#[test]
fn sourceless_network_fails_the_run() {
    let mut wds = wds();
    wds.remove("R1").unwrap();
    wds.remove("TK1").unwrap();
    let run = wds.run_hydraulics(&HydraulicSettings::default()).unwrap();
    assert!(!run.completed);
    assert!(run.fatal().is_some());
    assert!(!run.is_successful_with_warnings());
}

#[test]
fn subnetwork_views_follow_sequence_order() {
    let mut wds = wds();
    let seq: IdSequence = ["P3", "P1"].into_iter().collect();
    wds.insert_subnetwork("existing_pipes", seq).unwrap();
    let view = wds
        .subnetwork_links("existing_pipes", LinkType::Pipe)
        .unwrap();
    assert_eq!(view.ids().collect::<Vec<_>>(), ["P3", "P1"]);

    let bad: IdSequence = ["P1", "ZZ"].into_iter().collect();
    assert!(wds.insert_subnetwork("bad", bad).is_err());
    assert!(matches!(
        wds.subnetwork_nodes("missing", NodeType::Tank),
        Err(SimError::UnknownSubnetwork { .. })
    ));
}

#[test]
fn save_round_trips_mutations() {
    let mut wds = wds();
    wds.duplicate("P2", "DP2").unwrap();
    let path = std::env::temp_dir().join("wd_sim_save_round_trip.json");
    wds.save(&path).unwrap();
    let reloaded: WaterDistributionSystem = WaterDistributionSystem::load(&path).unwrap();
    assert!(reloaded.network().links().contains("DP2"));
    assert_eq!(
        reloaded.network().pipe("DP2").unwrap(),
        wds.network().pipe("DP2").unwrap()
    );
}

#[derive(Debug, Clone)]
enum Edit {
    AddJunction(u8),
    AddPipe(u8, u8),
    Duplicate(u8),
    Remove(u8),
    Uninstall(u8),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        any::<u8>().prop_map(Edit::AddJunction),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Edit::AddPipe(a, b)),
        any::<u8>().prop_map(Edit::Duplicate),
        any::<u8>().prop_map(Edit::Remove),
        any::<u8>().prop_map(Edit::Uninstall),
    ]
}

proptest! {
    #[test]
    fn structural_edits_keep_engine_and_registries_in_step(
        edits in prop::collection::vec(edit(), 1..40)
    ) {
        let mut wds = wds();
        let nodes = ["J1", "J2", "J3", "N0", "N1", "N2", "N3"];
        let links = ["P1", "P2", "P3", "L0", "L1", "L2", "L3", "DP1", "DL0"];
        for edit in edits {
            let _ = match edit {
                Edit::AddJunction(i) => {
                    wds.insert_node(&format!("N{}", i % 4), junction(50.0)).map(|_| 1)
                }
                Edit::AddPipe(i, a) => wds
                    .install_link(
                        &format!("L{}", i % 4),
                        nodes[a as usize % nodes.len()],
                        "J1",
                        LinkStatus::Open,
                        pipe(0.2),
                    )
                    .map(|_| 1),
                Edit::Duplicate(i) => {
                    let src = links[i as usize % 4];
                    wds.duplicate(src, &format!("D{src}")).map(|_| 1)
                }
                Edit::Remove(i) => wds.remove(links[i as usize % links.len()]),
                Edit::Uninstall(i) => wds.uninstall(nodes[i as usize % nodes.len()]),
            };
            prop_assert!(wds.verify_synchronized().is_ok());
        }
    }
}
