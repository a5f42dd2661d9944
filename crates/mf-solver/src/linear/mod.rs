//! Linear system backends for the nodal pressure equations.
//!
//! The flow equations form a weighted graph Laplacian `L p = q_ext`. Fixed
//! pressure nodes are eliminated, which leaves a symmetric positive definite
//! system over the free nodes as long as every free node is connected to a
//! pressure reference.

mod amg;
mod direct;

pub use amg::MultigridSolver;
pub use direct::DirectSolver;

use std::collections::VecDeque;

use mf_network::BoundaryCondition;
use sprs::{CsMat, TriMat};

use crate::config::{LinearSolverConfig, LinearSolverKind};
use crate::error::{SolverError, SolverResult};

/// A strategy for solving the reduced SPD pressure system.
pub trait LinearBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `A x = b` for a symmetric positive definite `A`.
    fn solve_spd(&self, a: &CsMat<f64>, b: &[f64]) -> SolverResult<Vec<f64>>;

    /// Nodal pressures from a full Laplacian and per-node boundary conditions.
    fn solve(
        &self,
        laplacian: &CsMat<f64>,
        boundary: &[BoundaryCondition],
    ) -> SolverResult<Vec<f64>> {
        let reduced = ReducedSystem::new(laplacian, boundary)?;
        if reduced.free.is_empty() {
            return Ok(reduced.expand(&[]));
        }
        let x = self.solve_spd(&reduced.a, &reduced.b)?;
        Ok(reduced.expand(&x))
    }
}

/// Pick a backend for a system with `n` nodes.
pub fn select_backend(cfg: &LinearSolverConfig, n: usize) -> Box<dyn LinearBackend> {
    let use_direct = match cfg.kind {
        LinearSolverKind::Direct => true,
        LinearSolverKind::Multigrid => false,
        LinearSolverKind::Auto => n <= cfg.direct_threshold,
    };
    if use_direct {
        Box::new(DirectSolver::new())
    } else {
        Box::new(MultigridSolver::new(cfg.multigrid.clone()))
    }
}

/// Laplacian restricted to the free nodes, with Dirichlet values moved to the RHS.
pub(crate) struct ReducedSystem {
    pub a: CsMat<f64>,
    pub b: Vec<f64>,
    /// Free node index for each reduced row.
    pub free: Vec<usize>,
    /// Pressure of every node, filled for the fixed ones.
    fixed_values: Vec<f64>,
}

impl ReducedSystem {
    pub fn new(laplacian: &CsMat<f64>, boundary: &[BoundaryCondition]) -> SolverResult<Self> {
        let n = laplacian.rows();
        if laplacian.cols() != n || boundary.len() != n {
            return Err(SolverError::InvalidConfig {
                what: format!(
                    "Laplacian is {}x{} but {} boundary conditions were given",
                    laplacian.rows(),
                    laplacian.cols(),
                    boundary.len()
                ),
            });
        }

        let adjacency = rows(laplacian);
        check_reference(&adjacency, boundary)?;

        let mut fixed_values = vec![0.0; n];
        let mut slot = vec![usize::MAX; n];
        let mut free = Vec::new();
        for (i, bc) in boundary.iter().enumerate() {
            match bc.pressure() {
                Some(p) => fixed_values[i] = p,
                None => {
                    slot[i] = free.len();
                    free.push(i);
                }
            }
        }

        let m = free.len();
        let mut tri = TriMat::new((m, m));
        let mut b = vec![0.0; m];
        for (r, &i) in free.iter().enumerate() {
            b[r] = boundary[i].flow().unwrap_or(0.0);
            for &(j, v) in &adjacency[i] {
                if slot[j] != usize::MAX {
                    tri.add_triplet(r, slot[j], v);
                } else {
                    b[r] -= v * fixed_values[j];
                }
            }
        }

        Ok(Self {
            a: tri.to_csr(),
            b,
            free,
            fixed_values,
        })
    }

    /// Scatter a reduced solution back into a full pressure vector.
    pub fn expand(&self, x: &[f64]) -> Vec<f64> {
        let mut p = self.fixed_values.clone();
        for (r, &i) in self.free.iter().enumerate() {
            p[i] = x[r];
        }
        p
    }
}

/// Row-wise (column, value) lists of a square sparse matrix.
fn rows(a: &CsMat<f64>) -> Vec<Vec<(usize, f64)>> {
    let mut out = vec![Vec::new(); a.rows()];
    for (outer, vec) in a.outer_iterator().enumerate() {
        for (inner, &v) in vec.iter() {
            let (i, j) = if a.is_csr() {
                (outer, inner)
            } else {
                (inner, outer)
            };
            out[i].push((j, v));
        }
    }
    out
}

/// Every free node must reach a fixed-pressure node through non-zero couplings.
fn check_reference(adjacency: &[Vec<(usize, f64)>], boundary: &[BoundaryCondition]) -> SolverResult<()> {
    let mut reached = vec![false; boundary.len()];
    let mut queue: VecDeque<usize> = boundary
        .iter()
        .enumerate()
        .filter(|(_, bc)| bc.pressure().is_some())
        .map(|(i, _)| i)
        .collect();
    if queue.is_empty() {
        return Err(SolverError::SingularSystem {
            what: "no fixed-pressure reference node".to_string(),
        });
    }
    for &i in &queue {
        reached[i] = true;
    }
    while let Some(i) = queue.pop_front() {
        for &(j, v) in &adjacency[i] {
            if j != i && v != 0.0 && !reached[j] {
                reached[j] = true;
                queue.push_back(j);
            }
        }
    }
    let unreached = reached.iter().filter(|r| !**r).count();
    if unreached > 0 {
        return Err(SolverError::SingularSystem {
            what: format!("{unreached} nodes are not connected to a pressure reference"),
        });
    }
    Ok(())
}

/// y = A x for a sparse matrix in either storage order.
pub(crate) fn spmv(a: &CsMat<f64>, x: &[f64], y: &mut [f64]) {
    y.iter_mut().for_each(|v| *v = 0.0);
    for (outer, vec) in a.outer_iterator().enumerate() {
        for (inner, &v) in vec.iter() {
            if a.is_csr() {
                y[outer] += v * x[inner];
            } else {
                y[inner] += v * x[outer];
            }
        }
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
