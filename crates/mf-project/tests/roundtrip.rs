use mf_project::schema::*;
use mf_project::{Format, ProjectError, load, parse, save};

fn simple_project() -> Project {
    Project {
        version: 1,
        name: "Simple".to_string(),
        network: NetworkDef {
            nodes: vec![
                NodeDef {
                    id: "a".to_string(),
                    name: "Inlet".to_string(),
                    position_um: Some([0.0, 0.0, 0.0]),
                    boundary: Some(BoundaryDef::Pressure {
                        pressure_mmhg: 45.0,
                    }),
                    inflow_hematocrit: Some(0.42),
                },
                NodeDef {
                    id: "b".to_string(),
                    name: String::new(),
                    position_um: None,
                    boundary: Some(BoundaryDef::Pressure {
                        pressure_mmhg: 25.0,
                    }),
                    inflow_hematocrit: None,
                },
            ],
            vessels: vec![VesselDef {
                id: "v".to_string(),
                name: "Capillary".to_string(),
                from_node_id: "a".to_string(),
                to_node_id: "b".to_string(),
                length_um: 120.5,
                diameter_um: 6.3,
            }],
        },
        flow: Default::default(),
        adaptation: Default::default(),
    }
}

#[test]
fn roundtrip_yaml_and_json() {
    let project = simple_project();
    let dir = std::env::temp_dir();
    for name in ["mf_project_roundtrip.yaml", "mf_project_roundtrip.json"] {
        let path = dir.join(name);
        save(&path, &project).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(project, loaded, "{name}");
        let _ = std::fs::remove_file(&path);
    }
}

#[test]
fn omitted_sections_take_defaults() {
    let yaml = r#"
version: 1
name: Minimal
network:
  nodes:
    - id: a
      boundary: { type: pressure, pressure_mmhg: 40.0 }
    - id: b
      boundary: { type: pressure, pressure_mmhg: 20.0 }
  vessels:
    - { id: v, from_node_id: a, to_node_id: b, length_um: 100.0, diameter_um: 8.0 }
"#;
    let project = parse(yaml, Format::Yaml).unwrap();
    assert_eq!(project.flow, Default::default());
    assert_eq!(project.adaptation, Default::default());
    assert_eq!(project.network.nodes[0].display_name(), "a");
}

#[test]
fn versions_before_the_first_schema_are_rejected() {
    let json = r#"{
        "version": 0,
        "name": "Old",
        "network": {
            "nodes": [
                { "id": "a", "boundary": { "type": "pressure", "pressure_mmhg": 40.0 } },
                { "id": "b", "boundary": { "type": "pressure", "pressure_mmhg": 20.0 } }
            ],
            "vessels": [
                { "id": "v", "from_node_id": "a", "to_node_id": "b", "length_um": 100.0, "diameter_um": 8.0 }
            ]
        }
    }"#;
    let err = parse(json, Format::Json).unwrap_err();
    assert!(matches!(err, ProjectError::Migration { .. }), "{err}");
    assert_eq!(mf_project::LATEST_VERSION, 1);
}

#[test]
fn invalid_reference_fails_at_load() {
    let yaml = r#"
version: 1
name: Broken
network:
  nodes:
    - id: a
  vessels:
    - { id: v, from_node_id: a, to_node_id: missing, length_um: 100.0, diameter_um: 8.0 }
"#;
    let err = parse(yaml, Format::Yaml).unwrap_err();
    assert!(matches!(
        err,
        mf_project::ProjectError::Validation(mf_project::ValidationError::MissingReference { .. })
    ));
}
