//! Discharge and tube hematocrit conversion (Fåhræus effect, in-vitro fit).

use mf_core::units::constants::UM_PER_M;

use crate::error::{RheologyError, RheologyResult, positive};

/// Above this value the fitted ratio is outside its valid range and Ht = Hd.
const X_VALID_MAX: f64 = 0.99;

/// Fåhræus shape factor of Pries, Neuhaus, Gaehtgens (1992), diameter in µm.
fn fahraeus_x(diameter_um: f64) -> f64 {
    1.0 + 1.7 * (-0.35 * diameter_um).exp() - 0.6 * (-0.01 * diameter_um).exp()
}

fn unit_interval(value: f64, what: &'static str) -> RheologyResult<f64> {
    if !value.is_finite() {
        return Err(RheologyError::NonFinite { what, value });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(RheologyError::Domain { what, value });
    }
    Ok(value)
}

/// Tube hematocrit of blood with discharge hematocrit `hd` in a vessel of `diameter` (m).
///
/// Ht / Hd = Hd + (1 - Hd) x(D)
pub fn tube_hematocrit(diameter: f64, hd: f64) -> RheologyResult<f64> {
    let d_um = positive(diameter, "diameter")? * UM_PER_M;
    let hd = unit_interval(hd, "discharge hematocrit")?;
    let x = fahraeus_x(d_um);
    if x > X_VALID_MAX {
        return Ok(hd);
    }
    Ok(hd * (hd + (1.0 - hd) * x))
}

/// Inverse of [`tube_hematocrit`].
pub fn discharge_from_tube(diameter: f64, ht: f64) -> RheologyResult<f64> {
    let d_um = positive(diameter, "diameter")? * UM_PER_M;
    let ht = unit_interval(ht, "tube hematocrit")?;
    let x = fahraeus_x(d_um);
    if x > X_VALID_MAX {
        return Ok(ht);
    }
    let half = x / (2.0 - 2.0 * x);
    Ok(-half + (half * half + ht / (1.0 - x)).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tube_hematocrit_is_lower_in_small_vessels() {
        let ht = tube_hematocrit(20e-6, 0.45).unwrap();
        assert!(ht < 0.45);
        assert!(ht > 0.3);
    }

    #[test]
    fn conversion_inverts() {
        for d in [5e-6, 20e-6, 80e-6] {
            for hd in [0.1, 0.45, 0.7] {
                let ht = tube_hematocrit(d, hd).unwrap();
                let back = discharge_from_tube(d, ht).unwrap();
                assert!((back - hd).abs() < 1e-12, "d={d} hd={hd} back={back}");
            }
        }
    }

    #[test]
    fn out_of_range_hematocrit_is_rejected() {
        assert!(tube_hematocrit(1e-5, 1.5).is_err());
        assert!(discharge_from_tube(0.0, 0.3).is_err());
    }
}
