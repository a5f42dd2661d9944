//! Conservation laws of the coupled flow and hematocrit solve.

use mf_core::units::{mmhg, um};
use mf_network::NetworkBuilder;
use mf_rheology::{RheologyConfig, ViscosityLaw};
use mf_solver::{FlowConfig, solve_flow};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn bifurcation_conserves_blood_and_red_cells(
        dp in 6.0_f64..20.0,
        da in 4.0_f64..20.0,
        db in 4.0_f64..20.0,
        p_in in 30.0_f64..80.0,
        h_in in 0.1_f64..0.6,
    ) {
        let mut b = NetworkBuilder::new();
        let inlet = b.add_node("inlet");
        let junction = b.add_node("junction");
        let out_a = b.add_node("out_a");
        let out_b = b.add_node("out_b");
        b.add_vessel("parent", inlet, junction, um(200.0), um(dp));
        b.add_vessel("daughter_a", junction, out_a, um(250.0), um(da));
        b.add_vessel("daughter_b", junction, out_b, um(250.0), um(db));
        b.set_pressure_bc(inlet, mmhg(p_in));
        b.set_pressure_bc(out_a, mmhg(20.0));
        b.set_pressure_bc(out_b, mmhg(20.0));
        b.set_inflow_hematocrit(inlet, h_in);
        let mut net = b.build().unwrap();

        // Hematocrit-independent viscosity keeps the flow split fixed
        let cfg = FlowConfig {
            rheology: RheologyConfig {
                viscosity_law: ViscosityLaw::Newtonian { relative: 3.0 },
                ..RheologyConfig::default()
            },
            ..FlowConfig::default()
        };
        let sol = solve_flow(&mut net, &cfg).unwrap();

        let (qp, qa, qb) = (sol.flows[0], sol.flows[1], sol.flows[2]);
        prop_assert!(qp > 0.0 && qa > 0.0 && qb > 0.0);
        prop_assert!((qp - qa - qb).abs() <= 1e-9 * qp);
        prop_assert!((sol.hematocrits[0] - h_in).abs() < 1e-12);

        let parent = qp * sol.hematocrits[0];
        let daughters = qa * sol.hematocrits[1] + qb * sol.hematocrits[2];
        prop_assert!((parent - daughters).abs() <= 1e-9 * parent);
        prop_assert!(sol.rbc_residual < 1e-9);
        for h in &sol.hematocrits {
            prop_assert!((0.0..1.0).contains(h));
        }
    }
}
