use wd_core::{FlowUnits, LinkStatus};
use wd_project::*;

fn sample() -> NetworkDef {
    let mut net = NetworkDef::new("two-node");
    net.options.flow_units = FlowUnits::Gpm;
    net.patterns = vec![PatternDef {
        id: "PMP".to_string(),
        multipliers: vec![0.0; 24],
    }];
    net.nodes = vec![
        NodeDef {
            id: "R".to_string(),
            elevation: 10.0,
            kind: NodeKindDef::Reservoir { pattern: None },
        },
        NodeDef {
            id: "J".to_string(),
            elevation: 20.0,
            kind: NodeKindDef::Junction {
                base_demand: 500.0,
                pattern: None,
            },
        },
        NodeDef {
            id: "T".to_string(),
            elevation: 215.0,
            kind: NodeKindDef::Tank {
                initial_level: 10.0,
                min_level: 10.0,
                max_level: 35.0,
                diameter: 50.0,
                min_volume: 0.0,
            },
        },
    ];
    net.links = vec![
        LinkDef {
            id: "PU".to_string(),
            from: "R".to_string(),
            to: "J".to_string(),
            status: LinkStatus::Open,
            kind: LinkKindDef::Pump {
                power: 100.0,
                design_flow: 2500.0,
                design_head: 300.0,
                pattern: Some("PMP".to_string()),
            },
        },
        LinkDef {
            id: "1".to_string(),
            from: "J".to_string(),
            to: "T".to_string(),
            status: LinkStatus::Closed,
            kind: LinkKindDef::Pipe {
                length: 12000.0,
                diameter: 16.0,
                roughness: 70.0,
            },
        },
    ];
    net
}

#[test]
fn roundtrip_yaml() {
    let net = sample();
    let path = std::env::temp_dir().join("wd_project_roundtrip.yaml");
    save(&path, &net).unwrap();
    let loaded = load(&path).unwrap();
    assert_eq!(net, loaded);
}

#[test]
fn roundtrip_json() {
    let net = sample();
    let path = std::env::temp_dir().join("wd_project_roundtrip.json");
    save(&path, &net).unwrap();
    let loaded = load(&path).unwrap();
    assert_eq!(net, loaded);
}

#[test]
fn unknown_extension_is_rejected() {
    let path = std::env::temp_dir().join("wd_project_roundtrip.inp");
    assert!(matches!(
        save(&path, &sample()),
        Err(ProjectError::UnknownFormat { .. })
    ));
}

#[test]
fn yaml_defaults_fill_options_and_status() {
    let yaml = r#"
version: 1
name: minimal
nodes:
  - id: A
    elevation: 1.0
    kind: { type: Junction }
  - id: B
    elevation: 2.0
    kind: { type: Reservoir }
links:
  - id: "1"
    from: B
    to: A
    kind: { type: Pipe, length: 10.0, diameter: 100.0, roughness: 120.0 }
"#;
    let net: NetworkDef = serde_yaml::from_str(yaml).unwrap();
    validate_network(&net).unwrap();
    assert_eq!(net.options, OptionsDef::default());
    assert_eq!(net.links[0].status, LinkStatus::Open);
}
