//! Flow-weighted hematocrit mixing at converging nodes.

use crate::error::{RheologyError, RheologyResult};

/// One stream entering a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixInput {
    /// Volume flow magnitude (m³/s).
    pub flow: f64,
    /// Discharge hematocrit.
    pub hematocrit: f64,
}

/// Discharge hematocrit of the mixed stream, Σ qᵢHᵢ / Σ qᵢ.
///
/// Returns 0 when no blood enters.
pub fn mix(inflows: &[MixInput]) -> RheologyResult<f64> {
    let mut flow = 0.0;
    let mut rbc = 0.0;
    for input in inflows {
        if !input.flow.is_finite() || input.flow < 0.0 {
            return Err(RheologyError::Domain {
                what: "inflow",
                value: input.flow,
            });
        }
        flow += input.flow;
        rbc += input.flow * input.hematocrit;
    }
    if flow <= 0.0 {
        return Ok(0.0);
    }
    Ok((rbc / flow).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_flow_weighted() {
        let h = mix(&[
            MixInput {
                flow: 3.0,
                hematocrit: 0.2,
            },
            MixInput {
                flow: 1.0,
                hematocrit: 0.6,
            },
        ])
        .unwrap();
        assert!((h - 0.3).abs() < 1e-15);
    }

    #[test]
    fn mix_without_flow_is_zero() {
        assert_eq!(mix(&[]).unwrap(), 0.0);
        assert_eq!(
            mix(&[MixInput {
                flow: 0.0,
                hematocrit: 0.4
            }])
            .unwrap(),
            0.0
        );
    }

    #[test]
    fn negative_inflow_is_rejected() {
        assert!(
            mix(&[MixInput {
                flow: -1.0,
                hematocrit: 0.4
            }])
            .is_err()
        );
    }
}
