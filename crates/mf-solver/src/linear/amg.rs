//! Aggregation algebraic multigrid, used as a conjugate gradient preconditioner.
//!
//! Coarse levels come from greedy aggregation over strong connections with a
//! piecewise-constant prolongation, so the Galerkin product `Pᵀ A P` reduces to
//! summing entries by aggregate. Smoothing is Gauss-Seidel, forward before and
//! backward after the coarse correction, which keeps the V-cycle symmetric.

use nalgebra::{DMatrix, DVector, linalg::Cholesky};
use sprs::{CsMat, TriMat};

use super::{LinearBackend, dot, norm, spmv};
use crate::config::MultigridConfig;
use crate::error::{SolverError, SolverResult};

/// One level of the hierarchy.
struct Level {
    a: CsMat<f64>,
    diag: Vec<f64>,
    /// Aggregate index of each row, `None` on the coarsest level.
    aggregate: Option<Vec<usize>>,
    coarse_n: usize,
}

struct Hierarchy {
    levels: Vec<Level>,
    coarsest: Cholesky<f64, nalgebra::Dyn>,
}

#[derive(Debug, Clone, Default)]
pub struct MultigridSolver {
    cfg: MultigridConfig,
}

impl MultigridSolver {
    pub fn new(cfg: MultigridConfig) -> Self {
        Self { cfg }
    }

    fn build(&self, a: &CsMat<f64>) -> SolverResult<Hierarchy> {
        let mut levels = Vec::new();
        let mut current: CsMat<f64> = a.to_csr();

        loop {
            let n = current.rows();
            let diag = diagonal(&current)?;
            if n <= self.cfg.coarse_size || levels.len() + 1 >= self.cfg.max_levels {
                levels.push(Level {
                    a: current,
                    diag,
                    aggregate: None,
                    coarse_n: 0,
                });
                break;
            }

            let (aggregate, coarse_n) = aggregate(&current, &diag, self.cfg.strength_threshold);
            // Stalled coarsening: solve what is left directly
            if coarse_n * 10 > n * 9 {
                levels.push(Level {
                    a: current,
                    diag,
                    aggregate: None,
                    coarse_n: 0,
                });
                break;
            }

            let coarse = galerkin(&current, &aggregate, coarse_n);
            levels.push(Level {
                a: current,
                diag,
                aggregate: Some(aggregate),
                coarse_n,
            });
            current = coarse;
        }

        let last = levels.last().ok_or_else(|| SolverError::Numeric {
            what: "empty multigrid hierarchy".to_string(),
        })?;
        let dense = to_dense(&last.a);
        let coarsest = Cholesky::new(dense).ok_or_else(|| SolverError::SingularSystem {
            what: format!(
                "coarsest multigrid level ({} rows) is not positive definite",
                last.a.rows()
            ),
        })?;

        tracing::debug!(
            levels = levels.len(),
            sizes = ?levels.iter().map(|l| l.a.rows()).collect::<Vec<_>>(),
            "multigrid hierarchy built"
        );
        Ok(Hierarchy { levels, coarsest })
    }

    fn v_cycle(&self, h: &Hierarchy, level: usize, b: &[f64]) -> Vec<f64> {
        let lv = &h.levels[level];
        let Some(aggregate) = &lv.aggregate else {
            let rhs = DVector::from_column_slice(b);
            return h.coarsest.solve(&rhs).as_slice().to_vec();
        };

        let n = b.len();
        let mut x = vec![0.0; n];
        for _ in 0..self.cfg.pre_smooth {
            gauss_seidel(&lv.a, &lv.diag, b, &mut x, false);
        }

        let mut ax = vec![0.0; n];
        spmv(&lv.a, &x, &mut ax);
        let mut rc = vec![0.0; lv.coarse_n];
        for i in 0..n {
            rc[aggregate[i]] += b[i] - ax[i];
        }

        let ec = self.v_cycle(h, level + 1, &rc);
        for i in 0..n {
            x[i] += ec[aggregate[i]];
        }

        for _ in 0..self.cfg.post_smooth {
            gauss_seidel(&lv.a, &lv.diag, b, &mut x, true);
        }
        x
    }
}

impl LinearBackend for MultigridSolver {
    fn name(&self) -> &'static str {
        "multigrid"
    }

    fn solve_spd(&self, a: &CsMat<f64>, b: &[f64]) -> SolverResult<Vec<f64>> {
        let n = b.len();
        let b_norm = norm(b);
        if b_norm == 0.0 {
            return Ok(vec![0.0; n]);
        }
        let h = self.build(a)?;
        let a = &h.levels[0].a;

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut z = self.v_cycle(&h, 0, &r);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);
        let mut ap = vec![0.0; n];

        for iter in 0..self.cfg.max_iterations {
            spmv(a, &p, &mut ap);
            let pap = dot(&p, &ap);
            if !(pap > 0.0) {
                return Err(SolverError::SingularSystem {
                    what: format!("conjugate gradient breakdown (pᵀAp = {pap:e})"),
                });
            }
            let alpha = rz / pap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }

            let rel = norm(&r) / b_norm;
            if rel <= self.cfg.tolerance {
                tracing::debug!(iterations = iter + 1, residual = rel, "multigrid PCG converged");
                return Ok(x);
            }

            z = self.v_cycle(&h, 0, &r);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(SolverError::ConvergenceFailed {
            what: format!(
                "multigrid PCG did not reach relative residual {:e} in {} cycles (residual {:e})",
                self.cfg.tolerance,
                self.cfg.max_iterations,
                norm(&r) / b_norm
            ),
        })
    }
}

fn diagonal(a: &CsMat<f64>) -> SolverResult<Vec<f64>> {
    let mut d = vec![0.0; a.rows()];
    for (i, row) in a.outer_iterator().enumerate() {
        for (j, &v) in row.iter() {
            if i == j {
                d[i] += v;
            }
        }
    }
    if let Some(i) = d.iter().position(|v| !(*v > 0.0)) {
        return Err(SolverError::SingularSystem {
            what: format!("non-positive diagonal at row {i}"),
        });
    }
    Ok(d)
}

/// Greedy aggregation over strong connections |a_ij| ≥ θ √(a_ii a_jj).
fn aggregate(a: &CsMat<f64>, diag: &[f64], theta: f64) -> (Vec<usize>, usize) {
    const NONE: usize = usize::MAX;
    let n = a.rows();
    let strong: Vec<Vec<usize>> = a
        .outer_iterator()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .filter(|&(j, &v)| j != i && v.abs() >= theta * (diag[i] * diag[j]).sqrt())
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut agg = vec![NONE; n];
    let mut count = 0;

    // Pass 1: seed aggregates from nodes whose neighbourhood is untouched
    for i in 0..n {
        if agg[i] != NONE || strong[i].iter().any(|&j| agg[j] != NONE) {
            continue;
        }
        agg[i] = count;
        for &j in &strong[i] {
            agg[j] = count;
        }
        count += 1;
    }

    // Pass 2: attach leftovers to a neighbouring aggregate
    let snapshot = agg.clone();
    for i in 0..n {
        if agg[i] != NONE {
            continue;
        }
        if let Some(&j) = strong[i].iter().find(|&&j| snapshot[j] != NONE) {
            agg[i] = snapshot[j];
        }
    }

    // Pass 3: whatever remains forms its own aggregate
    for i in 0..n {
        if agg[i] == NONE {
            agg[i] = count;
            for &j in &strong[i] {
                if agg[j] == NONE {
                    agg[j] = count;
                }
            }
            count += 1;
        }
    }
    (agg, count)
}

/// Pᵀ A P for piecewise-constant P.
fn galerkin(a: &CsMat<f64>, aggregate: &[usize], coarse_n: usize) -> CsMat<f64> {
    let mut tri = TriMat::new((coarse_n, coarse_n));
    for (i, row) in a.outer_iterator().enumerate() {
        for (j, &v) in row.iter() {
            tri.add_triplet(aggregate[i], aggregate[j], v);
        }
    }
    tri.to_csr()
}

fn to_dense(a: &CsMat<f64>) -> DMatrix<f64> {
    let n = a.rows();
    let mut m = DMatrix::zeros(n, n);
    for (i, row) in a.outer_iterator().enumerate() {
        for (j, &v) in row.iter() {
            m[(i, j)] += v;
        }
    }
    m
}

/// One Gauss-Seidel sweep on a CSR matrix.
fn gauss_seidel(a: &CsMat<f64>, diag: &[f64], b: &[f64], x: &mut [f64], backward: bool) {
    let n = b.len();
    let mut sweep = |i: usize| {
        let mut s = b[i];
        if let Some(row) = a.outer_view(i) {
            for (j, &v) in row.iter() {
                if j != i {
                    s -= v * x[j];
                }
            }
        }
        x[i] = s / diag[i];
    };
    if backward {
        (0..n).rev().for_each(&mut sweep);
    } else {
        (0..n).for_each(&mut sweep);
    }
}
