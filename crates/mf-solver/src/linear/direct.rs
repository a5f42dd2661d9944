//! Sparse LDLᵀ direct solver.

use sprs::{CsMat, FillInReduction, SymmetryCheck};
use sprs_ldl::Ldl;

use super::LinearBackend;
use crate::error::{SolverError, SolverResult};

/// Exact (up to rounding) solve by sparse LDLᵀ with reverse Cuthill-McKee ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSolver;

impl DirectSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LinearBackend for DirectSolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn solve_spd(&self, a: &CsMat<f64>, b: &[f64]) -> SolverResult<Vec<f64>> {
        // sprs-ldl needs at least two rows
        if a.rows() == 1 {
            return solve_scalar(a, b);
        }

        let csc: CsMat<f64> = a.to_csc();
        let ldl = Ldl::new()
            .fill_in_reduction(FillInReduction::ReverseCuthillMcKee)
            .check_symmetry(SymmetryCheck::DontCheckSymmetry)
            .numeric(csc.view())
            .map_err(|e| SolverError::SingularSystem {
                what: format!("LDL factorization failed: {e:?}"),
            })?;

        // A reduced Laplacian is SPD; a non-positive pivot means it is not.
        if let Some((i, &d)) = ldl.d().iter().enumerate().find(|(_, d)| !(**d > 0.0)) {
            return Err(SolverError::SingularSystem {
                what: format!("non-positive pivot {d:e} at row {i}"),
            });
        }

        let x = ldl.solve(b);
        if let Some(bad) = x.iter().find(|v| !v.is_finite()) {
            return Err(SolverError::Numeric {
                what: format!("direct solve produced {bad}"),
            });
        }
        Ok(x)
    }
}

/// A single free node: x = b / a.
fn solve_scalar(a: &CsMat<f64>, b: &[f64]) -> SolverResult<Vec<f64>> {
    let pivot = a.get(0, 0).copied().unwrap_or(0.0);
    if !(pivot > 0.0) {
        return Err(SolverError::SingularSystem {
            what: format!("non-positive pivot {pivot:e} at row 0"),
        });
    }
    let x = b[0] / pivot;
    if !x.is_finite() {
        return Err(SolverError::Numeric {
            what: format!("direct solve produced {x}"),
        });
    }
    Ok(vec![x])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::grid_laplacian;
    use super::super::{norm, spmv};
    use super::*;
    use mf_network::BoundaryCondition;
    use sprs::TriMat;

    #[test]
    fn grid_residual_is_tiny() {
        let l = grid_laplacian(12, 9);
        let mut bc = vec![BoundaryCondition::None; l.rows()];
        bc[0] = BoundaryCondition::Pressure(100.0);
        let last = l.rows() - 1;
        bc[last] = BoundaryCondition::Pressure(0.0);
        bc[50] = BoundaryCondition::Flow(3.0);

        let p = DirectSolver::new().solve(&l, &bc).unwrap();
        let mut lp = vec![0.0; p.len()];
        spmv(&l, &p, &mut lp);
        // Free nodes carry exactly their prescribed injection
        for (i, bc) in bc.iter().enumerate() {
            if bc.pressure().is_none() {
                let expected = bc.flow().unwrap_or(0.0);
                assert!((lp[i] - expected).abs() < 1e-9, "node {i}");
            }
        }
        assert!(norm(&p) > 0.0);
    }

    #[test]
    fn single_free_node_is_solved_without_factorization() {
        // Star of three fixed ends around one junction
        let mut tri = TriMat::new((4, 4));
        for (leaf, g) in [(1, 2.0), (2, 1.0), (3, 1.0)] {
            tri.add_triplet(0, 0, g);
            tri.add_triplet(leaf, leaf, g);
            tri.add_triplet(0, leaf, -g);
            tri.add_triplet(leaf, 0, -g);
        }
        let l: CsMat<f64> = tri.to_csr();
        let bc = vec![
            BoundaryCondition::None,
            BoundaryCondition::Pressure(40.0),
            BoundaryCondition::Pressure(20.0),
            BoundaryCondition::Pressure(0.0),
        ];
        let p = DirectSolver::new().solve(&l, &bc).unwrap();
        assert!((p[0] - 25.0).abs() < 1e-12);
        assert_eq!(&p[1..], &[40.0, 20.0, 0.0]);
    }

    #[test]
    fn single_zero_pivot_is_singular() {
        let a: CsMat<f64> = TriMat::new((1, 1)).to_csr();
        assert!(matches!(
            DirectSolver::new().solve_spd(&a, &[1.0]),
            Err(SolverError::SingularSystem { .. })
        ));
    }
}
