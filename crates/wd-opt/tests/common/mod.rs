//! Shared fixture: a small LPS network with candidate pipes and tank sites.

#![allow(dead_code)]

use wd_core::LinkStatus;
use wd_engine::{LinkProperty, NodeProperty};
use wd_graph::{IdSequence, LinkKind, NodeKind};
use wd_opt::{Formulation, FormulationSwitches, ObjectiveSettings, OptionTables, Problem};
use wd_project::*;
use wd_sim::{HydraulicSettings, WaterDistributionSystem};

/// 0.0001 ft in mm.
pub const NONEXISTING_MM: f64 = 0.03048;

pub fn fixture() -> NetworkDef {
    let mut def = NetworkDef::new("opt-fixture");
    def.patterns = vec![
        PatternDef {
            id: "PUMP1".into(),
            multipliers: vec![0.0; 24],
        },
        PatternDef {
            id: "PUMP2".into(),
            multipliers: vec![0.0; 24],
        },
    ];
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
        junction("J2", 80.0, 10.0),
        junction("J3", 82.0, 8.0),
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
    let pipe = |id: &str, from: &str, to: &str, diameter: f64| LinkDef {
        id: id.into(),
        from: from.into(),
        to: to.into(),
        status: LinkStatus::Open,
        kind: LinkKindDef::Pipe {
            length: 1000.0,
            diameter,
            roughness: 100.0,
        },
    };
    let pump = |id: &str, pattern: &str| LinkDef {
        id: id.into(),
        from: "R1".into(),
        to: "J1".into(),
        status: LinkStatus::Open,
        kind: LinkKindDef::Pump {
            power: 30.0,
            design_flow: 18.0,
            design_head: 40.0,
            pattern: Some(pattern.into()),
        },
    };
    def.links = vec![
        pump("PU1", "PUMP1"),
        pump("PU2", "PUMP2"),
        // 12 in and 10 in, so cleaning prices match.
        pipe("P1", "J1", "J2", 304.8),
        pipe("P2", "J2", "J3", 254.0),
        pipe("P3", "J3", "TK1", 304.8),
        pipe("N1", "J1", "J3", NONEXISTING_MM),
    ];
    def
}

pub fn subnetworks() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("existing_pipes", vec!["P1", "P2", "P3"]),
        ("city_pipes", vec!["P1"]),
        ("new_pipes", vec!["N1"]),
        ("possible_tank_locations", vec!["J2", "J3"]),
    ]
}

pub fn wds() -> WaterDistributionSystem {
    let mut wds = WaterDistributionSystem::from_def(&fixture()).unwrap();
    for (name, ids) in subnetworks() {
        wds.insert_subnetwork(name, ids.into_iter().collect::<IdSequence>())
            .unwrap();
    }
    wds
}

pub fn problem(switches: &FormulationSwitches) -> Problem {
    problem_with(
        switches,
        &OptionTables::default(),
        ObjectiveSettings::default(),
    )
}

pub fn problem_with(
    switches: &FormulationSwitches,
    tables: &OptionTables,
    objectives: ObjectiveSettings,
) -> Problem {
    let formulation = Formulation::from_switches(switches, tables);
    Problem::from_parts(wds(), formulation, HydraulicSettings::default(), objectives).unwrap()
}

/// Everything apply/reset may touch, split into exact and numeric parts.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub shape: Vec<String>,
    pub values: Vec<f64>,
}

impl Snapshot {
    pub fn take(wds: &mut WaterDistributionSystem) -> Self {
        wds.verify_synchronized().unwrap();
        let mut shape = Vec::new();
        let mut values = Vec::new();

        let mut node_ids: Vec<String> = wds.network().nodes().ids().map(String::from).collect();
        node_ids.sort();
        for id in &node_ids {
            let node = wds.network().node(id).unwrap().clone();
            shape.push(format!("node {id} {:?} links={}", node.node_type(), node.links.len()));
            values.push(node.elevation);
            if let NodeKind::Tank(t) = &node.kind {
                values.extend([t.initial_level, t.min_level, t.max_level, t.diameter, t.min_volume]);
                values.push(wds.node_property(id, NodeProperty::TankDiameter).unwrap());
                values.push(wds.node_property(id, NodeProperty::MaxLevel).unwrap());
            }
            values.push(wds.node_property(id, NodeProperty::Elevation).unwrap());
        }

        let mut link_ids: Vec<String> = wds.network().links().ids().map(String::from).collect();
        link_ids.sort();
        for id in &link_ids {
            let link = wds.network().link(id).unwrap().clone();
            let (from, to) = wds.network().endpoints(id).unwrap();
            shape.push(format!("link {id} {from}->{to} {:?}", link.initial_status));
            if let LinkKind::Pipe(p) = &link.kind {
                values.extend([p.length, p.diameter, p.roughness]);
                values.push(wds.link_property(id, LinkProperty::Diameter).unwrap());
                values.push(wds.link_property(id, LinkProperty::Roughness).unwrap());
            }
            values.push(wds.link_property(id, LinkProperty::InitStatus).unwrap());
        }

        let mut patterns: Vec<(String, Vec<f64>)> = wds
            .network()
            .patterns()
            .iter()
            .map(|(id, p)| (id.to_string(), p.multipliers.clone()))
            .collect();
        patterns.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, multipliers) in patterns {
            shape.push(format!("pattern {id} len={}", multipliers.len()));
            values.extend(wds.pattern(&id).unwrap().to_vec());
            values.extend(multipliers);
        }

        let names: Vec<String> = wds.sequence_names().map(String::from).collect();
        for name in names {
            let seq = wds.id_sequence(&name).unwrap();
            shape.push(format!("seq {name} {:?}", seq.iter().collect::<Vec<_>>()));
        }
        Self { shape, values }
    }

    pub fn assert_same(&self, other: &Snapshot) {
        assert_eq!(self.shape, other.shape);
        assert_eq!(self.values.len(), other.values.len());
        for (i, (a, b)) in self.values.iter().zip(&other.values).enumerate() {
            let tol = 1e-9 * a.abs().max(1.0);
            assert!((a - b).abs() <= tol, "value {i} differs: {a} vs {b}");
        }
    }
}
