//! Nodal conductance matrix assembly.

use mf_network::Network;
use sprs::{CsMat, TriMat};

use crate::error::{SolverError, SolverResult};

/// Weighted graph Laplacian with conductance 1/R on every vessel.
///
/// `resistances` is indexed by vessel slot. Row `i` of `L p` is the net
/// outflow from node `i` through its vessels.
pub fn assemble_laplacian(network: &Network, resistances: &[f64]) -> SolverResult<CsMat<f64>> {
    let n = network.node_count();
    if resistances.len() != network.vessel_count() {
        return Err(SolverError::InvalidConfig {
            what: format!(
                "{} resistances for {} vessels",
                resistances.len(),
                network.vessel_count()
            ),
        });
    }

    let mut tri = TriMat::with_capacity((n, n), 4 * resistances.len());
    for (vessel, &r) in network.vessels().iter().zip(resistances) {
        if !r.is_finite() || r <= 0.0 {
            return Err(SolverError::Numeric {
                what: format!("vessel {} has resistance {r}", vessel.id),
            });
        }
        let g = 1.0 / r;
        let (i, j) = (vessel.from.slot(), vessel.to.slot());
        tri.add_triplet(i, i, g);
        tri.add_triplet(j, j, g);
        tri.add_triplet(i, j, -g);
        tri.add_triplet(j, i, -g);
    }
    Ok(tri.to_csr())
}
