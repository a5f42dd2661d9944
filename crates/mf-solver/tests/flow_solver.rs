//! End-to-end flow solves on small networks.

use mf_core::units::{m3ps, mmhg, um};
use mf_network::{Network, NetworkBuilder};
use mf_rheology::{MixInput, RheologyConfig, apparent_viscosity, mix, resistance};
use mf_solver::{
    ConvergenceCriterion, FlowConfig, LinearSolverConfig, LinearSolverKind, MultigridConfig,
    SolverError, solve_flow,
};

/// Inlet -> parent -> junction -> two daughters -> two outlets.
fn diverging_y(d_parent: f64, d_a: f64, d_b: f64) -> Network {
    let mut b = NetworkBuilder::new();
    let inlet = b.add_node("inlet");
    let junction = b.add_node("junction");
    let out_a = b.add_node("out_a");
    let out_b = b.add_node("out_b");
    b.add_vessel("parent", inlet, junction, um(300.0), um(d_parent));
    b.add_vessel("daughter_a", junction, out_a, um(300.0), um(d_a));
    b.add_vessel("daughter_b", junction, out_b, um(300.0), um(d_b));
    b.set_pressure_bc(inlet, mmhg(40.0));
    b.set_pressure_bc(out_a, mmhg(15.0));
    b.set_pressure_bc(out_b, mmhg(15.0));
    b.build().unwrap()
}

/// `nx` by `ny` grid, left column at 40 mmHg, right column at 15 mmHg.
fn grid(nx: usize, ny: usize) -> Network {
    let mut b = NetworkBuilder::new();
    let ids: Vec<_> = (0..nx * ny).map(|i| b.add_node(format!("n{i}"))).collect();
    for y in 0..ny {
        for x in 0..nx {
            let i = y * nx + x;
            let d = 6.0 + ((x * 7 + y * 3) % 5) as f64;
            if x + 1 < nx {
                b.add_vessel(format!("h{i}"), ids[i], ids[i + 1], um(120.0), um(d));
            }
            if y + 1 < ny {
                b.add_vessel(format!("v{i}"), ids[i], ids[i + nx], um(150.0), um(d - 1.0));
            }
        }
        b.set_pressure_bc(ids[y * nx], mmhg(40.0));
        b.set_pressure_bc(ids[y * nx + nx - 1], mmhg(15.0));
    }
    b.build().unwrap()
}

fn newtonian(kind: LinearSolverKind) -> FlowConfig {
    FlowConfig {
        rheology: RheologyConfig::newtonian(1.2e-3),
        linear: LinearSolverConfig {
            kind,
            multigrid: MultigridConfig {
                coarse_size: 16,
                ..MultigridConfig::default()
            },
            ..LinearSolverConfig::default()
        },
        ..FlowConfig::default()
    }
}

#[test]
fn single_vessel_obeys_poiseuille() {
    let mut b = NetworkBuilder::new();
    let n0 = b.add_node("in");
    let n1 = b.add_node("out");
    b.add_vessel("v", n0, n1, um(250.0), um(9.0));
    b.set_pressure_bc(n0, mmhg(40.0));
    b.set_pressure_bc(n1, mmhg(15.0));
    let mut net = b.build().unwrap();

    let cfg = FlowConfig::default();
    let sol = solve_flow(&mut net, &cfg).unwrap();

    let mu = apparent_viscosity(&cfg.rheology, 9e-6, cfg.rheology.discharge_hematocrit).unwrap();
    let r = resistance(9e-6, 250e-6, mu).unwrap();
    let dp = mmhg(40.0).value - mmhg(15.0).value;
    let expected = dp / r;
    assert!((sol.flows[0] - expected).abs() <= 1e-9 * expected);
    assert!((sol.hematocrits[0] - 0.45).abs() < 1e-12);

    // Written back into the network
    let v = &net.vessels()[0];
    assert_eq!(v.flow(), sol.flows[0]);
    assert_eq!(v.resistance(), sol.resistances[0]);
    assert_eq!(net.nodes()[1].pressure(), mmhg(15.0).value);
}

#[test]
fn diverging_junction_separates_phases_and_conserves_red_cells() {
    let mut net = diverging_y(10.0, 10.0, 7.0);
    let sol = solve_flow(&mut net, &FlowConfig::default()).unwrap();

    let (qp, qa, qb) = (sol.flows[0], sol.flows[1], sol.flows[2]);
    let (hp, ha, hb) = (sol.hematocrits[0], sol.hematocrits[1], sol.hematocrits[2]);
    assert!(qa > qb && qb > 0.0);

    // Mixing would hand both daughters the parent value
    assert!(ha > hp + 1e-3, "ha {ha} hp {hp}");
    assert!(hb < hp - 1e-3, "hb {hb} hp {hp}");

    let parent = qp * hp;
    let daughters = qa * ha + qb * hb;
    assert!((parent - daughters).abs() <= 1e-9 * parent);
    assert!(sol.rbc_residual < 1e-9);

    assert_eq!(sol.splits.len(), 1);
    assert_eq!(sol.splits[0].node, 1);
    assert!(sol.splits[0].record.law_applied);
}

#[test]
fn converging_junction_mixes_by_flow() {
    let mut b = NetworkBuilder::new();
    let in1 = b.add_node("in1");
    let in2 = b.add_node("in2");
    let junction = b.add_node("junction");
    let out = b.add_node("out");
    b.add_vessel("a", in1, junction, um(200.0), um(8.0));
    b.add_vessel("b", in2, junction, um(200.0), um(11.0));
    b.add_vessel("c", junction, out, um(200.0), um(12.0));
    b.set_pressure_bc(in1, mmhg(40.0));
    b.set_pressure_bc(in2, mmhg(40.0));
    b.set_pressure_bc(out, mmhg(15.0));
    b.set_inflow_hematocrit(in1, 0.3);
    b.set_inflow_hematocrit(in2, 0.5);
    let mut net = b.build().unwrap();

    let sol = solve_flow(&mut net, &FlowConfig::default()).unwrap();
    assert!((sol.hematocrits[0] - 0.3).abs() < 1e-12);
    assert!((sol.hematocrits[1] - 0.5).abs() < 1e-12);
    let expected = mix(&[
        MixInput {
            flow: sol.flows[0],
            hematocrit: 0.3,
        },
        MixInput {
            flow: sol.flows[1],
            hematocrit: 0.5,
        },
    ])
    .unwrap();
    assert!((sol.hematocrits[2] - expected).abs() < 1e-12);
    assert!(sol.splits.is_empty());
}

#[test]
fn internal_nodes_balance_mass() {
    let mut net = grid(6, 4);
    let cfg = FlowConfig {
        relaxation: 0.5,
        max_inner_iterations: 300,
        ..FlowConfig::default()
    };
    let sol = solve_flow(&mut net, &cfg).unwrap();
    assert!(sol.flow_residual <= cfg.residual_tolerance);
    assert!(sol.total_inflow > 0.0);

    for node in net.nodes().iter().filter(|n| !n.is_boundary()) {
        let net_in: f64 = net
            .node_vessels(node.id)
            .iter()
            .map(|&vid| {
                let v = &net.vessels()[vid.slot()];
                if v.to == node.id { v.flow() } else { -v.flow() }
            })
            .sum();
        assert!(net_in.abs() <= 1e-9 * sol.total_inflow, "node {}", node.name);
    }
    for h in &sol.hematocrits {
        assert!((0.0..=1.0).contains(h));
    }
}

#[test]
fn direct_and_multigrid_agree() {
    let mut direct_net = grid(20, 15);
    let mut mg_net = direct_net.clone();
    let direct = solve_flow(&mut direct_net, &newtonian(LinearSolverKind::Direct)).unwrap();
    let mg = solve_flow(&mut mg_net, &newtonian(LinearSolverKind::Multigrid)).unwrap();
    assert_eq!(direct.backend, "direct");
    assert_eq!(mg.backend, "multigrid");

    let scale = mmhg(40.0).value;
    for (a, b) in direct.pressures.iter().zip(&mg.pressures) {
        assert!((a - b).abs() <= 1e-6 * scale);
    }
}

#[test]
fn multigrid_cycle_budget_surfaces_as_convergence_failure() {
    let mut net = grid(10, 10);
    let mut cfg = newtonian(LinearSolverKind::Multigrid);
    cfg.linear.multigrid.max_iterations = 1;
    cfg.linear.multigrid.tolerance = 1e-14;
    let err = solve_flow(&mut net, &cfg).unwrap_err();
    assert!(matches!(err, SolverError::ConvergenceFailed { .. }));
    assert!(!err.kind().is_fatal());
}

#[test]
fn balanced_flow_boundaries_solve_against_a_gauge() {
    let mut b = NetworkBuilder::new();
    let n0 = b.add_node("in");
    let n1 = b.add_node("junction");
    let n2 = b.add_node("out_a");
    let n3 = b.add_node("out_b");
    b.add_vessel("p", n0, n1, um(200.0), um(10.0));
    b.add_vessel("a", n1, n2, um(200.0), um(8.0));
    b.add_vessel("b", n1, n3, um(200.0), um(8.0));
    b.set_flow_bc(n0, m3ps(3e-13));
    b.set_flow_bc(n2, m3ps(-2e-13));
    b.set_flow_bc(n3, m3ps(-1e-13));
    let mut net = b.build().unwrap();

    let sol = solve_flow(&mut net, &FlowConfig::default()).unwrap();
    assert_eq!(sol.gauge_node, Some(0));
    assert!((sol.flows[1] - 2e-13).abs() < 1e-22);
    assert!((sol.flows[2] - 1e-13).abs() < 1e-22);
}

#[test]
fn widening_a_vessel_does_not_reduce_total_flow() {
    let base = diverging_y(10.0, 9.0, 7.0);
    let cfg = FlowConfig::default();
    let base_inflow = solve_flow(&mut base.clone(), &cfg).unwrap().flows[0];

    for k in 0..3 {
        let mut widened = base.clone();
        let vid = widened.vessels()[k].id;
        let d = widened.vessels()[k].diameter();
        widened.set_diameter(vid, d * 1.2).unwrap();
        let sol = solve_flow(&mut widened, &cfg).unwrap();

        let r_before = resistance(d, 300e-6, 1e-3).unwrap();
        let r_after = resistance(d * 1.2, 300e-6, 1e-3).unwrap();
        assert!(r_after < r_before);
        assert!(sol.flows[0] >= base_inflow, "vessel {k}");
    }
}

#[test]
fn damped_iteration_returns_the_split_law_hematocrit() {
    let tight = FlowConfig {
        hematocrit_tolerance: 1e-10,
        max_inner_iterations: 1000,
        ..FlowConfig::default()
    };
    let reference = solve_flow(&mut diverging_y(10.0, 10.0, 7.0), &tight).unwrap();

    let damped = FlowConfig {
        relaxation: 0.05,
        hematocrit_tolerance: 1e-3,
        max_inner_iterations: 2000,
        ..FlowConfig::default()
    };
    let mut net = diverging_y(10.0, 10.0, 7.0);
    let sol = solve_flow(&mut net, &damped).unwrap();
    assert!(sol.hematocrit_change < damped.hematocrit_tolerance);

    // Daughters carry what the law hands out at the returned flows
    let record = &sol.splits[0].record;
    for (h, law) in sol.hematocrits[1..].iter().zip(&record.hematocrits) {
        assert!((h - law).abs() < 1e-15, "{h} vs {law}");
    }
    assert!(sol.rbc_residual < 1e-9);
    for (h, h_ref) in sol.hematocrits.iter().zip(&reference.hematocrits) {
        assert!((h - h_ref).abs() < 5e-3, "{h} vs {h_ref}");
    }
    assert_eq!(net.vessels()[2].hematocrit(), sol.hematocrits[2]);
}

#[test]
fn berg_criterion_needs_a_previous_iterate() {
    let single = || {
        let mut b = NetworkBuilder::new();
        let n0 = b.add_node("in");
        let n1 = b.add_node("out");
        b.add_vessel("v", n0, n1, um(250.0), um(9.0));
        b.set_pressure_bc(n0, mmhg(40.0));
        b.set_pressure_bc(n1, mmhg(15.0));
        b.build().unwrap()
    };

    let by_change = solve_flow(&mut single(), &newtonian(LinearSolverKind::Direct)).unwrap();
    assert_eq!(by_change.iterations, 1);
    assert_eq!(by_change.berg_residual, None);

    let cfg = FlowConfig {
        convergence: ConvergenceCriterion::Berg,
        ..newtonian(LinearSolverKind::Direct)
    };
    let by_berg = solve_flow(&mut single(), &cfg).unwrap();
    assert_eq!(by_berg.iterations, 2);
    assert!(by_berg.berg_residual.unwrap() < 1e-12);
    assert_eq!(by_berg.flows, by_change.flows);
}

#[test]
fn berg_criterion_settles_near_the_hematocrit_fixed_point() {
    let by_change = solve_flow(&mut diverging_y(10.0, 10.0, 7.0), &FlowConfig::default()).unwrap();

    let cfg = FlowConfig {
        convergence: ConvergenceCriterion::Berg,
        ..FlowConfig::default()
    };
    let sol = solve_flow(&mut diverging_y(10.0, 10.0, 7.0), &cfg).unwrap();
    let berg = sol.berg_residual.unwrap();
    assert!(berg <= cfg.berg_tolerance, "{berg}");
    assert!(sol.iterations >= 2);
    assert!(sol.rbc_residual < 1e-9);
    assert_eq!(sol.propagation_sweeps, 1);
    assert!(!sol.cyclic);
    for (h, h_ref) in sol.hematocrits.iter().zip(&by_change.hematocrits) {
        assert!((h - h_ref).abs() < 1e-4, "{h} vs {h_ref}");
    }
}
