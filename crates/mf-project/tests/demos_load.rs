use std::path::Path;

use mf_core::units::constants::NL_PER_MIN_PER_M3PS;
use mf_solver::solve_flow;

fn demo(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/projects")
        .join(name)
}

#[test]
fn demos_load_and_validate() {
    for name in ["01_bifurcation.yaml", "02_ladder_flow_inlet.json"] {
        let project = mf_project::load(&demo(name))
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        mf_project::validate_project(&project)
            .unwrap_or_else(|e| panic!("Failed to validate {}: {}", name, e));
        project
            .compile()
            .unwrap_or_else(|e| panic!("Failed to compile {}: {}", name, e));
    }
}

#[test]
fn bifurcation_demo_solves() {
    let project = mf_project::load(&demo("01_bifurcation.yaml")).unwrap();
    assert_eq!(project.adaptation.nominal_factor, Some(2.0));

    let mut compiled = project.compile().unwrap();
    let sol = solve_flow(&mut compiled.network, &project.flow).unwrap();

    let parent = compiled.vessel_id_map["parent"].slot();
    let a = compiled.vessel_id_map["daughter_a"].slot();
    let b = compiled.vessel_id_map["daughter_b"].slot();
    assert!(sol.flows[parent] > 0.0);
    assert!(sol.flows[a] > sol.flows[b]);
    assert!(((sol.flows[a] + sol.flows[b]) - sol.flows[parent]).abs() < 1e-9 * sol.flows[parent]);
    // The wider branch draws a larger share of red cells
    assert!(sol.hematocrits[a] > sol.hematocrits[b]);
}

#[test]
fn ladder_demo_carries_the_prescribed_inflow() {
    let project = mf_project::load(&demo("02_ladder_flow_inlet.json")).unwrap();
    let mut compiled = project.compile().unwrap();
    let sol = solve_flow(&mut compiled.network, &project.flow).unwrap();

    let expected = 3.0 / NL_PER_MIN_PER_M3PS;
    let feed = compiled.vessel_id_map["feed"].slot();
    let drain = compiled.vessel_id_map["drain"].slot();
    assert!((sol.flows[feed] - expected).abs() < 1e-9 * expected);
    assert!((sol.flows[drain] - expected).abs() < 1e-9 * expected);
    assert!(sol.gauge_node.is_none());
}

#[test]
fn unknown_extension_is_rejected() {
    let err = mf_project::load(Path::new("network.toml")).unwrap_err();
    assert!(matches!(err, mf_project::ProjectError::UnsupportedFormat { .. }));
}
