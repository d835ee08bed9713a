//! Engine configuration
//!
//! Configuration is plain JSON deserialized with serde. Every section has
//! defaults, so `{}` is a valid configuration. Unknown keys and unknown
//! method names are rejected as configuration errors.

use crate::error::{MfdError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Family of local inverse mass matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MfdMethod {
    /// Diagonal two-point flux approximation (consistent on orthogonal meshes)
    #[default]
    #[serde(rename = "two point flux approximation")]
    TwoPointFlux,
    /// General mimetic form for arbitrary polyhedra
    #[serde(rename = "polyhedra")]
    Polyhedra,
}

/// Krylov method used on the face system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterativeMethod {
    /// Preconditioned conjugate gradient (symmetric systems)
    Pcg,
    /// Restarted GMRES
    #[default]
    Gmres,
}

/// Preconditioner applied inside the Krylov method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreconditionerType {
    #[serde(rename = "identity")]
    Identity,
    #[serde(rename = "diagonal")]
    Diagonal,
    /// ILU(0) of the owned diagonal block
    #[serde(rename = "block ilu")]
    BlockIlu,
    /// Aggregation AMG on the owned diagonal block
    #[default]
    #[serde(rename = "boomer amg")]
    BoomerAmg,
}

/// Krylov solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSettings {
    pub iterative_method: IterativeMethod,
    /// Relative residual tolerance
    pub tolerance: f64,
    pub max_iterations: usize,
    /// GMRES restart length
    pub restart: usize,
    /// Log progress every N iterations (0 disables)
    pub print_interval: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            iterative_method: IterativeMethod::Gmres,
            tolerance: 1e-10,
            max_iterations: 1000,
            restart: 50,
            print_interval: 0,
        }
    }
}

/// Preconditioner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreconditionerSettings {
    pub preconditioner_type: PreconditionerType,
    /// V-cycles per AMG application
    pub cycle_applications: usize,
    /// Early-exit tolerance for repeated V-cycles (0 disables)
    pub tolerance: f64,
    /// AMG strength-of-connection threshold
    pub strong_threshold: f64,
    /// AMG pre- and post-smoothing sweeps
    pub smoothing_sweeps: usize,
}

impl Default for PreconditionerSettings {
    fn default() -> Self {
        Self {
            preconditioner_type: PreconditionerType::BoomerAmg,
            cycle_applications: 1,
            tolerance: 0.0,
            strong_threshold: 0.08,
            smoothing_sweeps: 2,
        }
    }
}

/// Solver used to recover consistent face values from `aff`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsistentFaceSettings {
    pub solver: SolverSettings,
    pub preconditioner: PreconditionerSettings,
}

impl Default for ConsistentFaceSettings {
    fn default() -> Self {
        Self {
            solver: SolverSettings::default(),
            preconditioner: PreconditionerSettings {
                preconditioner_type: PreconditionerType::BlockIlu,
                ..PreconditionerSettings::default()
            },
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MfdConfig {
    pub mfd_method: MfdMethod,
    /// Divide non-Dirichlet face equations by the face kr
    pub scaled_constraint: bool,
    /// Schur complement solver
    pub solver: SolverSettings,
    pub preconditioner: PreconditionerSettings,
    pub consistent_face_solver: ConsistentFaceSettings,
}

impl MfdConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: MfdConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        validate_solver("solver", &self.solver)?;
        validate_solver(
            "consistent_face_solver.solver",
            &self.consistent_face_solver.solver,
        )?;
        validate_preconditioner("preconditioner", &self.preconditioner)?;
        validate_preconditioner(
            "consistent_face_solver.preconditioner",
            &self.consistent_face_solver.preconditioner,
        )
    }
}

fn validate_solver(section: &str, s: &SolverSettings) -> Result<()> {
    if !(s.tolerance > 0.0 && s.tolerance < 1.0) {
        return Err(MfdError::config(format!(
            "{section}: tolerance must lie in (0, 1), got {}",
            s.tolerance
        )));
    }
    if s.max_iterations == 0 {
        return Err(MfdError::config(format!(
            "{section}: max_iterations must be positive"
        )));
    }
    if s.iterative_method == IterativeMethod::Gmres && s.restart == 0 {
        return Err(MfdError::config(format!("{section}: restart must be positive")));
    }
    Ok(())
}

fn validate_preconditioner(section: &str, p: &PreconditionerSettings) -> Result<()> {
    if p.cycle_applications == 0 {
        return Err(MfdError::config(format!(
            "{section}: cycle_applications must be positive"
        )));
    }
    if p.tolerance < 0.0 || !p.tolerance.is_finite() {
        return Err(MfdError::config(format!(
            "{section}: tolerance must be non-negative"
        )));
    }
    if !(0.0..1.0).contains(&p.strong_threshold) {
        return Err(MfdError::config(format!(
            "{section}: strong_threshold must lie in [0, 1)"
        )));
    }
    Ok(())
}
