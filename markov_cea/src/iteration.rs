//! Per-iteration parameter set
//!
//! Pulls the named inputs out of one row of sampled (or mean) values and
//! derives the complement probabilities and the treatment-adjusted X -> Y
//! probability. Nothing here is validated or clamped; out-of-range inputs
//! show up as invalid matrix rows when the matrices are built.

use crate::conversion::apply_relative_risk;
use crate::error::{CeaError, CeaResult};
use crate::matrix::ROW_SUM_TOLERANCE;
use crate::parameters::ParameterRow;
use crate::{State, NUM_STATES};

pub const P_W_TO_X: &str = "p_WtoX";
pub const P_X_TO_W: &str = "p_XtoW";
pub const P_X_TO_Y: &str = "p_XtoY";
pub const P_Y_TO_Z: &str = "p_YtoZ";
pub const P_W: &str = "p_W";
pub const C_W: &str = "c_W";
pub const C_X: &str = "c_X";
pub const C_Y_TRANSITION: &str = "c_Ytransition";
pub const C_Y: &str = "c_Y";
pub const C_Z_TRANSITION: &str = "c_Ztransition";
pub const C_TRT: &str = "c_trt";
pub const U_W: &str = "u_W";
pub const U_X: &str = "u_X";
pub const U_Y: &str = "u_Y";
pub const RR_TREAT: &str = "RR_Treat";

/// Parameters read directly from the table
#[derive(Debug, Clone, PartialEq)]
pub struct BaseParameters {
    // Transition probabilities per cycle
    pub p_w_to_x: f64,
    pub p_x_to_w: f64,
    pub p_x_to_y: f64,
    pub p_y_to_z: f64,
    // Prevalence of W at cycle 0
    pub p_w: f64,

    // Costs per cycle spent in a state
    pub c_w: f64,
    pub c_x: f64,
    pub c_y_transition: f64,
    pub c_y: f64,
    pub c_z_transition: f64,
    pub c_trt: f64, // on top of c_x while treated in X

    // Utilities
    pub u_w: f64,
    pub u_x: f64,
    pub u_y: f64,

    // Hazard ratio of treatment on X -> Y
    pub rr_treat: f64,
}

impl BaseParameters {
    pub fn from_row(row: &ParameterRow) -> CeaResult<Self> {
        Ok(BaseParameters {
            p_w_to_x: row.get(P_W_TO_X)?,
            p_x_to_w: row.get(P_X_TO_W)?,
            p_x_to_y: row.get(P_X_TO_Y)?,
            p_y_to_z: row.get(P_Y_TO_Z)?,
            p_w: row.get(P_W)?,
            c_w: row.get(C_W)?,
            c_x: row.get(C_X)?,
            c_y_transition: row.get(C_Y_TRANSITION)?,
            c_y: row.get(C_Y)?,
            c_z_transition: row.get(C_Z_TRANSITION)?,
            c_trt: row.get(C_TRT)?,
            u_w: row.get(U_W)?,
            u_x: row.get(U_X)?,
            u_y: row.get(U_Y)?,
            rr_treat: row.get(RR_TREAT)?,
        })
    }
}

/// Base parameters plus everything derived from them
///
/// Built fresh for each iteration and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationParameters {
    pub base: BaseParameters,
    pub p_w_return: f64,
    pub p_x_return: f64,
    pub p_y_return: f64,
    pub p_x: f64,
    pub p_x_to_y_trt: f64,
    pub p_x_return_trt: f64,
}

impl IterationParameters {
    /// Derive complements and the treated X -> Y probability
    ///
    /// The relative risk is applied in rate space at unit cycle length.
    pub fn derive(base: BaseParameters) -> Self {
        let p_x_to_y_trt = apply_relative_risk(base.p_x_to_y, base.rr_treat, 1.0);
        IterationParameters {
            p_w_return: 1.0 - base.p_w_to_x,
            p_x_return: 1.0 - (base.p_x_to_w + base.p_x_to_y),
            p_y_return: 1.0 - base.p_y_to_z,
            p_x: 1.0 - base.p_w,
            p_x_to_y_trt,
            p_x_return_trt: 1.0 - (base.p_x_to_w + p_x_to_y_trt),
            base,
        }
    }

    pub fn from_row(row: &ParameterRow) -> CeaResult<Self> {
        Ok(Self::derive(BaseParameters::from_row(row)?))
    }

    /// Cohort distribution at cycle 0: split between W and X by prevalence
    pub fn initial_distribution(&self) -> [f64; NUM_STATES] {
        [self.base.p_w, self.p_x, 0.0, 0.0, 0.0, 0.0]
    }

    /// [`initial_distribution`](Self::initial_distribution), rejecting a
    /// prevalence outside [0, 1]
    pub fn checked_initial_distribution(&self) -> CeaResult<[f64; NUM_STATES]> {
        let initial = self.initial_distribution();
        for (state, &mass) in State::ALL.iter().zip(initial.iter()) {
            if !mass.is_finite() || mass < -ROW_SUM_TOLERANCE || mass > 1.0 + ROW_SUM_TOLERANCE {
                return Err(CeaError::InvalidInitialDistribution {
                    state: *state,
                    value: mass,
                });
            }
        }
        Ok(initial)
    }
}
