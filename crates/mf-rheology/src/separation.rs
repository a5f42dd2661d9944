//! Red-cell phase separation at diverging bifurcations.
//!
//! A split is described by the parent stream and the fraction of blood that
//! enters each daughter channel. The law decides what fraction of the parent
//! red-cell flux each daughter receives; daughter hematocrit then follows as
//! `H_k = F_k · H_p / f_k`, which conserves red cells by construction.

use mf_core::units::constants::UM_PER_M;
use serde::{Deserialize, Serialize};

use crate::config::{PhaseSeparationLaw, RheologyConfig};
use crate::error::{RheologyError, RheologyResult, positive};

/// A law distributing red cells between the two daughters of a bifurcation.
pub trait PhaseSeparation {
    /// Fraction of the parent red-cell flux entering daughter `a`.
    ///
    /// `flow_fraction_a` is daughter a's share of the parent blood flow;
    /// diameters are in µm.
    fn rbc_fraction(
        &self,
        flow_fraction_a: f64,
        parent_hematocrit: f64,
        parent_diameter_um: f64,
        diameter_a_um: f64,
        diameter_b_um: f64,
    ) -> f64;
}

impl PhaseSeparation for PhaseSeparationLaw {
    fn rbc_fraction(
        &self,
        flow_fraction_a: f64,
        parent_hematocrit: f64,
        parent_diameter_um: f64,
        diameter_a_um: f64,
        diameter_b_um: f64,
    ) -> f64 {
        let Some((x0_ref, a_ref, b_ref)) = self.coefficients() else {
            return flow_fraction_a;
        };

        let scale = (1.0 - parent_hematocrit) / parent_diameter_um;
        let da2 = diameter_a_um * diameter_a_um;
        let db2 = diameter_b_um * diameter_b_um;
        let x0 = x0_ref * scale;
        let a = -a_ref * (da2 - db2) / (da2 + db2) * scale;
        let b = 1.0 + b_ref * scale;

        // Plasma skimming swallows the whole range: the faster branch takes all.
        if 1.0 - 2.0 * x0 <= 0.0 {
            return if flow_fraction_a > 0.5 {
                1.0
            } else if flow_fraction_a < 0.5 {
                0.0
            } else {
                0.5
            };
        }

        if flow_fraction_a <= x0 {
            return 0.0;
        }
        if flow_fraction_a >= 1.0 - x0 {
            return 1.0;
        }
        let x = (flow_fraction_a - x0) / (1.0 - 2.0 * x0);
        let logit = a + b * (x / (1.0 - x)).ln();
        1.0 / (1.0 + (-logit).exp())
    }
}

/// Inputs of one split.
#[derive(Debug, Clone, Copy)]
pub struct SplitInput<'a> {
    /// Parent blood flow magnitude (m³/s).
    pub parent_flow: f64,
    pub parent_hematocrit: f64,
    /// Parent diameter (m).
    pub parent_diameter: f64,
    /// Daughter diameters (m).
    pub daughter_diameters: &'a [f64],
    /// Share of the parent flow entering each daughter; normalised internally.
    pub flow_fractions: &'a [f64],
}

/// Outcome of one split, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub parent_flow: f64,
    pub parent_hematocrit: f64,
    /// Normalised blood flow fractions.
    pub flow_fractions: Vec<f64>,
    /// Fraction of the parent red-cell flux entering each daughter.
    pub rbc_fractions: Vec<f64>,
    /// Daughter discharge hematocrit.
    pub hematocrits: Vec<f64>,
    /// False when the empirical law did not apply (one or more than two daughters).
    pub law_applied: bool,
    /// True when a daughter hit the hematocrit ceiling.
    pub ceiling_applied: bool,
}

impl SplitRecord {
    /// Red-cell flux leaving through the daughters (m³/s).
    pub fn daughter_rbc_flux(&self) -> f64 {
        self.flow_fractions
            .iter()
            .zip(&self.hematocrits)
            .map(|(f, h)| self.parent_flow * f * h)
            .sum()
    }
}

/// Daughter hematocrit at a diverging node.
///
/// Two daughters use the configured law; any other count splits red cells in
/// proportion to blood flow. A daughter with no flow gets hematocrit 0 and
/// its sibling carries the full parent red-cell flux.
pub fn phase_separation(cfg: &RheologyConfig, input: &SplitInput<'_>) -> RheologyResult<SplitRecord> {
    let n = input.flow_fractions.len();
    if n == 0 || input.daughter_diameters.len() != n {
        return Err(RheologyError::InvalidArg {
            what: "split needs one diameter per daughter flow fraction",
        });
    }
    if !input.parent_flow.is_finite() || input.parent_flow < 0.0 {
        return Err(RheologyError::Domain {
            what: "parent flow",
            value: input.parent_flow,
        });
    }
    if input.parent_hematocrit.is_nan() {
        return Err(RheologyError::NonFinite {
            what: "parent hematocrit",
            value: input.parent_hematocrit,
        });
    }
    let hp = input.parent_hematocrit.clamp(0.0, 1.0);
    for &d in input.daughter_diameters {
        positive(d, "daughter diameter")?;
    }
    let mut total = 0.0;
    for &f in input.flow_fractions {
        if !f.is_finite() || f < 0.0 {
            return Err(RheologyError::Domain {
                what: "flow fraction",
                value: f,
            });
        }
        total += f;
    }

    let mut record = SplitRecord {
        parent_flow: input.parent_flow,
        parent_hematocrit: hp,
        flow_fractions: vec![0.0; n],
        rbc_fractions: vec![0.0; n],
        hematocrits: vec![0.0; n],
        law_applied: false,
        ceiling_applied: false,
    };
    if input.parent_flow == 0.0 || total <= 0.0 {
        return Ok(record);
    }
    for (out, f) in record.flow_fractions.iter_mut().zip(input.flow_fractions) {
        *out = f / total;
    }

    if n == 2 && cfg.phase_separation.coefficients().is_some() {
        let fa = record.flow_fractions[0];
        let fb = record.flow_fractions[1];
        let rbc_a = if fa == 0.0 {
            0.0
        } else if fb == 0.0 {
            1.0
        } else {
            let parent_d_um = positive(input.parent_diameter, "parent diameter")? * UM_PER_M;
            cfg.phase_separation.rbc_fraction(
                fa,
                hp,
                parent_d_um,
                input.daughter_diameters[0] * UM_PER_M,
                input.daughter_diameters[1] * UM_PER_M,
            )
        };
        record.rbc_fractions = vec![rbc_a, 1.0 - rbc_a];
        record.law_applied = true;
    } else {
        record.rbc_fractions.clone_from(&record.flow_fractions);
    }

    fill_hematocrit(&mut record, hp);
    if n == 2 && hp <= cfg.max_hematocrit {
        apply_ceiling(&mut record, hp, cfg.max_hematocrit);
    }
    for h in &mut record.hematocrits {
        if *h > 1.0 {
            tracing::warn!(hematocrit = *h, "daughter hematocrit clamped to 1");
            *h = 1.0;
        }
    }
    Ok(record)
}

fn fill_hematocrit(record: &mut SplitRecord, hp: f64) {
    for k in 0..record.hematocrits.len() {
        let f = record.flow_fractions[k];
        record.hematocrits[k] = if f > 0.0 {
            (record.rbc_fractions[k] * hp / f).max(0.0)
        } else {
            0.0
        };
    }
}

/// Move the red-cell surplus above `max_h` from one daughter to its sibling.
fn apply_ceiling(record: &mut SplitRecord, hp: f64, max_h: f64) {
    if hp <= 0.0 {
        return;
    }
    for (over, other) in [(1, 0), (0, 1)] {
        let h = record.hematocrits[over];
        if h > max_h {
            let surplus = (h - max_h) * record.flow_fractions[over] / hp;
            record.rbc_fractions[over] -= surplus;
            record.rbc_fractions[other] += surplus;
            record.ceiling_applied = true;
            fill_hematocrit(record, hp);
            tracing::debug!(
                daughter = over,
                hematocrit = h,
                ceiling = max_h,
                "daughter hematocrit capped, surplus moved to sibling"
            );
            return;
        }
    }
}
