//! The MFD operator facade
//!
//! [`MatrixMfd`] drives the discretization through a fixed sequence of
//! states. Each transition is one call; calling an operation out of order
//! returns [`MfdError::InvalidSequence`].
//!
//! ```text
//! Uninitialized ─symbolic_assemble_global_matrices→ SymbolicAssembled
//!   ─create_mfd_mass_matrices→ MassBuilt ─create_mfd_stiffness_matrices→ StiffnessBuilt
//!   ─create_mfd_rhs_vectors→ RhsBuilt ─apply_boundary_conditions→ BCApplied
//!   ─assemble_schur_complement→ SchurReady
//! ```
//!
//! `reset_numeric` returns to `SymbolicAssembled` and keeps the sparsity, so
//! a nonlinear iteration re-runs only the numeric stages.
//!
//! In a distributed run every rank holds its own `MatrixMfd` and all ranks
//! make the same calls in the same order. Methods that exchange data are
//! marked collective.

use crate::assembly::GlobalBlocks;
use crate::boundary::{BoundaryConditions, apply_boundary_conditions};
use crate::config::MfdConfig;
use crate::error::{MfdError, Result};
use crate::field::{DistributedField, FieldLayout};
use crate::local_form::{LocalCellForm, LocalFormBuilder, Tensor};
use crate::mesh::Mesh;
use crate::scaling::{RelativeScaling, scale_face_constraints};
use crate::solver::{LinearSolver, SchurReducer, SolveStatus};
use ndarray::{Array1, Array2, s};
use solvers::CsrMatrix;
use std::sync::Arc;

/// Assembly stage of a [`MatrixMfd`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperatorState {
    Uninitialized,
    SymbolicAssembled,
    MassBuilt,
    StiffnessBuilt,
    RhsBuilt,
    BCApplied,
    SchurReady,
}

/// Mixed-hybrid MFD operator over a rank-local mesh
#[derive(Debug)]
pub struct MatrixMfd {
    config: MfdConfig,
    mesh: Arc<Mesh>,
    builder: LocalFormBuilder,
    state: OperatorState,
    blocks: Option<GlobalBlocks>,
    forms: Vec<LocalCellForm>,
    scaling: RelativeScaling,
    rhs: Option<DistributedField>,
    dirichlet: Vec<bool>,
    schur: Option<CsrMatrix>,
    schur_solver: Option<LinearSolver>,
    face_solver: Option<LinearSolver>,
}

impl MatrixMfd {
    pub fn new(config: MfdConfig, mesh: Arc<Mesh>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: LocalFormBuilder::new(config.mfd_method),
            config,
            mesh,
            state: OperatorState::Uninitialized,
            blocks: None,
            forms: Vec::new(),
            scaling: RelativeScaling::Uniform,
            rhs: None,
            dirichlet: Vec::new(),
            schur: None,
            schur_solver: None,
            face_solver: None,
        })
    }

    pub fn state(&self) -> OperatorState {
        self.state
    }

    pub fn config(&self) -> &MfdConfig {
        &self.config
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    fn require(&self, operation: &'static str, expected: OperatorState) -> Result<()> {
        if self.state != expected {
            return Err(MfdError::InvalidSequence {
                operation,
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn require_at_least(&self, operation: &'static str, minimum: OperatorState) -> Result<()> {
        if self.state < minimum {
            return Err(MfdError::InvalidSequence {
                operation,
                expected: minimum,
                found: self.state,
            });
        }
        Ok(())
    }

    fn blocks_ref(&self, operation: &'static str) -> Result<&GlobalBlocks> {
        self.blocks.as_ref().ok_or(MfdError::InvalidSequence {
            operation,
            expected: OperatorState::SymbolicAssembled,
            found: self.state,
        })
    }

    fn rhs_ref(&self, operation: &'static str) -> Result<&DistributedField> {
        self.rhs.as_ref().ok_or(MfdError::InvalidSequence {
            operation,
            expected: OperatorState::RhsBuilt,
            found: self.state,
        })
    }

    // ---- assembly ----

    /// Build the sparsity of `acf`, `afc` and `aff` from the mesh connectivity
    pub fn symbolic_assemble_global_matrices(&mut self) -> Result<()> {
        self.require("symbolic_assemble_global_matrices", OperatorState::Uninitialized)?;
        self.mesh.validate()?;
        self.blocks = Some(GlobalBlocks::symbolic(&self.mesh));
        self.state = OperatorState::SymbolicAssembled;
        Ok(())
    }

    /// Local inverse mass matrices of every local cell
    ///
    /// `permeability` holds one tensor per local cell; `None` means identity.
    pub fn create_mfd_mass_matrices(&mut self, permeability: Option<&[Tensor]>) -> Result<()> {
        self.require("create_mfd_mass_matrices", OperatorState::SymbolicAssembled)?;
        let ncells = self.mesh.num_cells();
        if let Some(k) = permeability {
            if k.len() != ncells {
                return Err(MfdError::DimensionMismatch {
                    what: "permeability",
                    expected: ncells,
                    actual: k.len(),
                });
            }
        }

        let unit = Tensor::default();
        self.forms = (0..ncells)
            .map(|c| {
                let k = permeability.map_or(&unit, |k| &k[c]);
                self.builder.build(&self.mesh, c, k)
            })
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "built {} local forms ({:?})",
            self.forms.len(),
            self.builder.method()
        );
        self.state = OperatorState::MassBuilt;
        Ok(())
    }

    /// kr-weighted stiffness of every local cell, summed into the global blocks
    ///
    /// `kr` carries a `"face"` or `"cell"` component with valid ghost values;
    /// `None` means kr = 1.
    pub fn create_mfd_stiffness_matrices(&mut self, kr: Option<&DistributedField>) -> Result<()> {
        self.require("create_mfd_stiffness_matrices", OperatorState::MassBuilt)?;
        let scaling = RelativeScaling::from_field(&self.mesh, kr)?;
        let mesh = &self.mesh;
        let stiffness: Vec<_> = self
            .forms
            .iter()
            .enumerate()
            .map(|(c, form)| form.stiffness(&scaling.row_weights(mesh, c)))
            .collect();

        let blocks = self.blocks.as_mut().ok_or(MfdError::InvalidSequence {
            operation: "create_mfd_stiffness_matrices",
            expected: OperatorState::SymbolicAssembled,
            found: OperatorState::Uninitialized,
        })?;
        blocks.zero_values();
        blocks.assemble(mesh, &stiffness);

        self.scaling = scaling;
        self.state = OperatorState::StiffnessBuilt;
        Ok(())
    }

    /// Zero right-hand side with `"cell"` and `"face"` components
    pub fn create_mfd_rhs_vectors(&mut self) -> Result<()> {
        self.require("create_mfd_rhs_vectors", OperatorState::StiffnessBuilt)?;
        self.rhs = Some(DistributedField::from_layout(
            Arc::clone(&self.mesh),
            &FieldLayout::cell_face(),
        ));
        self.state = OperatorState::RhsBuilt;
        Ok(())
    }

    /// Mutable right-hand side, available until boundary conditions are applied
    pub fn rhs_mut(&mut self) -> Result<&mut DistributedField> {
        self.require("rhs_mut", OperatorState::RhsBuilt)?;
        self.rhs.as_mut().ok_or(MfdError::InvalidSequence {
            operation: "rhs_mut",
            expected: OperatorState::RhsBuilt,
            found: OperatorState::StiffnessBuilt,
        })
    }

    /// Add `q_c |c|` to the owned cell rows of the right-hand side
    pub fn add_volumetric_source(&mut self, source: &DistributedField) -> Result<()> {
        let mesh = Arc::clone(&self.mesh);
        let q = source.scalar("cell")?;
        let rhs = self.rhs_mut()?;
        let mut rhs_c = rhs.scalar_mut("cell")?;
        for c in 0..mesh.num_owned_cells() {
            rhs_c[c] += q[c] * mesh.cell(c).volume;
        }
        Ok(())
    }

    /// Apply boundary conditions to the blocks and the right-hand side
    ///
    /// `bcs` must agree across ranks (see
    /// [`reconcile_ghost_markers`](crate::boundary::reconcile_ghost_markers)).
    pub fn apply_boundary_conditions(&mut self, bcs: &BoundaryConditions) -> Result<()> {
        self.require("apply_boundary_conditions", OperatorState::RhsBuilt)?;
        let mesh = Arc::clone(&self.mesh);
        let (Some(blocks), Some(rhs)) = (self.blocks.as_mut(), self.rhs.as_mut()) else {
            return Err(MfdError::InvalidSequence {
                operation: "apply_boundary_conditions",
                expected: OperatorState::RhsBuilt,
                found: self.state,
            });
        };

        let mut rhs_c = rhs.scalar("cell")?.to_owned();
        let mut rhs_f = rhs.scalar("face")?.to_owned();
        apply_boundary_conditions(
            &mesh,
            bcs,
            blocks,
            &mut rhs_c.view_mut(),
            &mut rhs_f.view_mut(),
        )?;
        rhs.scalar_mut("cell")?.assign(&rhs_c);
        rhs.scalar_mut("face")?.assign(&rhs_f);

        self.dirichlet = bcs.dirichlet_mask();
        self.state = OperatorState::BCApplied;
        Ok(())
    }

    /// Scale face constraints (if configured), form the Schur complement and
    /// build the solvers
    pub fn assemble_schur_complement(&mut self) -> Result<()> {
        self.require("assemble_schur_complement", OperatorState::BCApplied)?;
        let (Some(blocks), Some(rhs)) = (self.blocks.as_mut(), self.rhs.as_mut()) else {
            return Err(MfdError::InvalidSequence {
                operation: "assemble_schur_complement",
                expected: OperatorState::BCApplied,
                found: self.state,
            });
        };

        if self.config.scaled_constraint {
            let mut rhs_f = rhs.scalar("face")?.to_owned();
            scale_face_constraints(blocks, &mut rhs_f.view_mut(), &self.dirichlet, &self.scaling)?;
            rhs.scalar_mut("face")?.assign(&rhs_f);
        }

        let schur = SchurReducer::reduce(blocks)?;
        self.schur_solver = Some(LinearSolver::new(
            &schur,
            &self.config.solver,
            &self.config.preconditioner,
        ));
        self.face_solver = Some(LinearSolver::new(
            &blocks.aff,
            &self.config.consistent_face_solver.solver,
            &self.config.consistent_face_solver.preconditioner,
        ));
        self.schur = Some(schur);
        self.state = OperatorState::SchurReady;
        Ok(())
    }

    /// Drop all numeric data and return to `SymbolicAssembled`
    pub fn reset_numeric(&mut self) -> Result<()> {
        self.require_at_least("reset_numeric", OperatorState::SymbolicAssembled)?;
        if let Some(blocks) = self.blocks.as_mut() {
            blocks.zero_values();
        }
        self.forms.clear();
        self.scaling = RelativeScaling::Uniform;
        self.rhs = None;
        self.dirichlet.clear();
        self.schur = None;
        self.schur_solver = None;
        self.face_solver = None;
        self.state = OperatorState::SymbolicAssembled;
        Ok(())
    }

    // ---- application ----

    fn check_field(&self, field: &DistributedField) -> Result<()> {
        let cells = field.scalar("cell")?.len();
        if cells != self.mesh.num_cells() {
            return Err(MfdError::DimensionMismatch {
                what: "cell component",
                expected: self.mesh.num_cells(),
                actual: cells,
            });
        }
        let faces = field.scalar("face")?.len();
        if faces != self.mesh.num_faces() {
            return Err(MfdError::DimensionMismatch {
                what: "face component",
                expected: self.mesh.num_faces(),
                actual: faces,
            });
        }
        Ok(())
    }

    /// `y = A x` on the owned rows of `y`
    ///
    /// Reads the ghost values of `x` as they are; ghost rows of `y` are left
    /// untouched.
    pub fn apply(&self, x: &DistributedField, y: &mut DistributedField) -> Result<()> {
        self.require("apply", OperatorState::SchurReady)?;
        self.check_field(x)?;
        self.check_field(y)?;
        let blocks = self.blocks_ref("apply")?;

        let x_c = x.scalar("cell")?.to_owned();
        let x_f = x.scalar("face")?.to_owned();
        let y_c = &blocks.acc * &x_c + blocks.acf.matvec(&x_f);
        let y_f = blocks.afc.matvec(&x_c) + blocks.aff.matvec(&x_f);

        let nc = self.mesh.num_owned_cells();
        let nf = self.mesh.num_owned_faces();
        y.scalar_mut("cell")?
            .slice_mut(s![..nc])
            .assign(&y_c.slice(s![..nc]));
        y.scalar_mut("face")?.slice_mut(s![..nf]).assign(&y_f);
        Ok(())
    }

    /// Solve `A x = b` through the Schur complement; collective
    ///
    /// Ghost cells of `b` are refreshed internally; `x` is returned with
    /// consistent ghost values. Non-convergence is reported in the status,
    /// with `x` holding the last iterate.
    pub fn apply_inverse(&self, b: &DistributedField, x: &mut DistributedField) -> Result<SolveStatus> {
        self.require("apply_inverse", OperatorState::SchurReady)?;
        self.check_field(b)?;
        self.check_field(x)?;
        let blocks = self.blocks_ref("apply_inverse")?;
        let (Some(schur), Some(solver)) = (self.schur.as_ref(), self.schur_solver.as_ref()) else {
            return Err(MfdError::InvalidSequence {
                operation: "apply_inverse",
                expected: OperatorState::SchurReady,
                found: self.state,
            });
        };
        let mesh = self.mesh.as_ref();

        let mut b_c = b.scalar("cell")?.to_owned();
        mesh.cell_importer().scatter_vector(mesh.comm(), &mut b_c);
        let b_f = b.scalar("face")?;

        let r = SchurReducer::reduce_rhs(blocks, b_c.view(), b_f);
        let (x_owned, status) = solver.solve(mesh, schur, &r, None);

        let x_f = self.ghosted_faces(&x_owned);
        let x_c = SchurReducer::back_substitute(blocks, b_c.view(), &x_f);
        x.scalar_mut("cell")?.assign(&x_c);
        x.scalar_mut("face")?.assign(&x_f);
        x.scatter_master_to_ghosted("cell")?;
        Ok(status)
    }

    fn ghosted_faces(&self, owned: &Array1<f64>) -> Array1<f64> {
        let mut full = Array1::zeros(self.mesh.num_faces());
        full.slice_mut(s![..owned.len()]).assign(owned);
        self.mesh
            .face_importer()
            .scatter_vector(self.mesh.comm(), &mut full);
        full
    }

    /// `r = A x - b` on the owned rows
    pub fn compute_residual(&self, x: &DistributedField, r: &mut DistributedField) -> Result<()> {
        self.apply(x, r)?;
        r.update(-1.0, self.rhs_ref("compute_residual")?, 1.0)
    }

    /// Face fluxes from cell and face pressures; collective
    ///
    /// The flux of a face is oriented along its normal and computed from the
    /// kr-weighted local form of its first adjacent cell. Only the unscaled
    /// local forms are used, so the scaled constraint does not change fluxes.
    /// `x` must carry current ghost values.
    pub fn derive_flux(&self, x: &DistributedField, flux: &mut DistributedField) -> Result<()> {
        self.require_at_least("derive_flux", OperatorState::StiffnessBuilt)?;
        self.check_field(x)?;
        let mesh = self.mesh.as_ref();
        let x_c = x.scalar("cell")?;
        let x_f = x.scalar("face")?;
        let nowned = mesh.num_owned_faces();

        let mut values = flux.scalar("face")?.to_owned();
        if values.len() != mesh.num_faces() {
            return Err(MfdError::DimensionMismatch {
                what: "flux face component",
                expected: mesh.num_faces(),
                actual: values.len(),
            });
        }
        for (c, form) in self.forms.iter().enumerate() {
            let cell = mesh.cell(c);
            let needed = cell
                .faces
                .iter()
                .any(|&f| f < nowned && mesh.face(f).cells.first() == Some(&c));
            if !needed {
                continue;
            }
            let p_faces: Vec<f64> = cell.faces.iter().map(|&f| x_f[f]).collect();
            let q = form.outward_fluxes(&self.scaling.row_weights(mesh, c), x_c[c], &p_faces);
            for (m, (&f, &dir)) in cell.faces.iter().zip(&cell.face_dirs).enumerate() {
                if f < nowned && mesh.face(f).cells.first() == Some(&c) {
                    values[f] = dir as f64 * q[m];
                }
            }
        }

        flux.scalar_mut("face")?.assign(&values);
        flux.scatter_master_to_ghosted("face")
    }

    /// Cell velocities `v_c = (1/|c|) Σ_f q_f (x_f - x_c)` from face fluxes
    ///
    /// `q_f` is the flux out of the cell; returns one row per owned cell.
    /// `flux` must carry current ghost values.
    pub fn derive_cell_velocity(&self, flux: &DistributedField) -> Result<Array2<f64>> {
        let mesh = self.mesh.as_ref();
        let q = flux.scalar("face")?;
        let mut velocity = Array2::zeros((mesh.num_owned_cells(), 3));
        for c in 0..mesh.num_owned_cells() {
            let cell = mesh.cell(c);
            let mut v = [0.0; 3];
            for (&f, &dir) in cell.faces.iter().zip(&cell.face_dirs) {
                let r = (mesh.face(f).centroid - cell.centroid).as_array();
                let q_out = dir as f64 * q[f];
                for (vi, ri) in v.iter_mut().zip(r) {
                    *vi += q_out * ri;
                }
            }
            for (k, vk) in v.iter().enumerate() {
                velocity[[c, k]] = vk / cell.volume;
            }
        }
        Ok(velocity)
    }

    /// Replace face values by the solution of `aff x_f = b_f - afc x_c`; collective
    pub fn update_consistent_face_constraints(&self, x: &mut DistributedField) -> Result<SolveStatus> {
        self.require("update_consistent_face_constraints", OperatorState::SchurReady)?;
        let rhs = self.rhs_ref("update_consistent_face_constraints")?;
        let b_f = rhs.scalar("face")?.to_owned();
        self.solve_face_block(&b_f, x)
    }

    /// Replace face corrections by the solution of `aff dx_f = r_f - afc dx_c`; collective
    pub fn update_consistent_face_correction(
        &self,
        r: &DistributedField,
        dx: &mut DistributedField,
    ) -> Result<SolveStatus> {
        self.require("update_consistent_face_correction", OperatorState::SchurReady)?;
        self.check_field(r)?;
        let r_f = r.scalar("face")?.to_owned();
        self.solve_face_block(&r_f, dx)
    }

    fn solve_face_block(&self, b_f: &Array1<f64>, x: &mut DistributedField) -> Result<SolveStatus> {
        self.check_field(x)?;
        let blocks = self.blocks_ref("solve_face_block")?;
        let solver = self.face_solver.as_ref().ok_or(MfdError::InvalidSequence {
            operation: "solve_face_block",
            expected: OperatorState::SchurReady,
            found: self.state,
        })?;
        let mesh = self.mesh.as_ref();

        x.scatter_master_to_ghosted("cell")?;
        let x_c = x.scalar("cell")?.to_owned();
        let nf = mesh.num_owned_faces();
        let rhs = b_f.slice(s![..nf]).to_owned() - blocks.afc.matvec(&x_c);

        let (x_owned, status) = solver.solve(mesh, &blocks.aff, &rhs, None);
        let x_f = self.ghosted_faces(&x_owned);
        x.scalar_mut("face")?.assign(&x_f);
        Ok(status)
    }

    // ---- accessors ----

    /// Assembled blocks, available from `StiffnessBuilt` on
    pub fn blocks(&self) -> Result<&GlobalBlocks> {
        self.require_at_least("blocks", OperatorState::StiffnessBuilt)?;
        self.blocks_ref("blocks")
    }

    pub fn aff(&self) -> Result<&CsrMatrix> {
        Ok(&self.blocks()?.aff)
    }

    pub fn afc(&self) -> Result<&CsrMatrix> {
        Ok(&self.blocks()?.afc)
    }

    pub fn acf(&self) -> Result<&CsrMatrix> {
        Ok(&self.blocks()?.acf)
    }

    pub fn acc(&self) -> Result<&Array1<f64>> {
        Ok(&self.blocks()?.acc)
    }

    pub fn schur(&self) -> Result<&CsrMatrix> {
        self.require("schur", OperatorState::SchurReady)?;
        self.schur.as_ref().ok_or(MfdError::InvalidSequence {
            operation: "schur",
            expected: OperatorState::SchurReady,
            found: self.state,
        })
    }

    pub fn rhs(&self) -> Result<&DistributedField> {
        self.require_at_least("rhs", OperatorState::RhsBuilt)?;
        self.rhs_ref("rhs")
    }

    pub fn local_forms(&self) -> Result<&[LocalCellForm]> {
        self.require_at_least("local_forms", OperatorState::MassBuilt)?;
        Ok(&self.forms)
    }

    /// Zero field with the `"cell"` + `"face"` layout of this operator
    pub fn create_field(&self) -> DistributedField {
        DistributedField::from_layout(Arc::clone(&self.mesh), &FieldLayout::cell_face())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryMarker;
    use crate::mesh::{Point, box_mesh_hexahedra};

    fn mesh() -> Arc<Mesh> {
        Arc::new(
            box_mesh_hexahedra(2, 2, 2, Point::default(), Point::new(1.0, 1.0, 1.0)).unwrap(),
        )
    }

    fn ready(config: MfdConfig) -> MatrixMfd {
        let mesh = mesh();
        let mut op = MatrixMfd::new(config, mesh.clone()).unwrap();
        op.symbolic_assemble_global_matrices().unwrap();
        op.create_mfd_mass_matrices(None).unwrap();
        op.create_mfd_stiffness_matrices(None).unwrap();
        op.create_mfd_rhs_vectors().unwrap();
        let mut bcs = BoundaryConditions::for_mesh(&mesh);
        bcs.set_region(&mesh, "bottom side", BoundaryMarker::Dirichlet, |_| 1.0)
            .unwrap();
        op.apply_boundary_conditions(&bcs).unwrap();
        op.assemble_schur_complement().unwrap();
        op
    }

    #[test]
    fn test_state_sequence() {
        let mesh = mesh();
        let mut op = MatrixMfd::new(MfdConfig::default(), mesh).unwrap();
        assert_eq!(op.state(), OperatorState::Uninitialized);

        let err = op.create_mfd_mass_matrices(None).unwrap_err();
        assert!(matches!(
            err,
            MfdError::InvalidSequence {
                expected: OperatorState::SymbolicAssembled,
                found: OperatorState::Uninitialized,
                ..
            }
        ));

        op.symbolic_assemble_global_matrices().unwrap();
        assert!(op.symbolic_assemble_global_matrices().is_err());
        assert!(op.aff().is_err());
        op.create_mfd_mass_matrices(None).unwrap();
        op.create_mfd_stiffness_matrices(None).unwrap();
        assert!(op.aff().is_ok());
        assert!(op.rhs_mut().is_err());
        op.create_mfd_rhs_vectors().unwrap();
        assert!(op.rhs_mut().is_ok());

        let bcs = BoundaryConditions::for_mesh(op.mesh());
        op.apply_boundary_conditions(&bcs).unwrap();
        assert!(matches!(
            op.apply_boundary_conditions(&bcs),
            Err(MfdError::InvalidSequence { .. })
        ));
        assert!(op.rhs_mut().is_err());

        let x = op.create_field();
        let mut y = op.create_field();
        assert!(op.apply(&x, &mut y).is_err());
        op.assemble_schur_complement().unwrap();
        assert_eq!(op.state(), OperatorState::SchurReady);
        assert!(op.apply(&x, &mut y).is_ok());
    }

    #[test]
    fn test_reset_numeric_keeps_pattern() {
        let mut op = ready(MfdConfig::default());
        let aff = op.aff().unwrap().clone();
        op.reset_numeric().unwrap();
        assert_eq!(op.state(), OperatorState::SymbolicAssembled);
        assert!(op.schur().is_err());

        op.create_mfd_mass_matrices(None).unwrap();
        op.create_mfd_stiffness_matrices(None).unwrap();
        assert!(op.aff().unwrap().same_pattern(&aff));
    }

    #[test]
    fn test_permeability_length_checked() {
        let mut op = MatrixMfd::new(MfdConfig::default(), mesh()).unwrap();
        op.symbolic_assemble_global_matrices().unwrap();
        let k = vec![Tensor::Scalar(2.0); 3];
        assert!(matches!(
            op.create_mfd_mass_matrices(Some(&k)),
            Err(MfdError::DimensionMismatch { .. })
        ));
        assert_eq!(op.state(), OperatorState::SymbolicAssembled);
    }

    #[test]
    fn test_apply_inverse_satisfies_dirichlet() {
        let op = ready(MfdConfig::default());
        let mut x = op.create_field();
        let status = op.apply_inverse(op.rhs().unwrap(), &mut x).unwrap();
        assert!(status.converged);
        // Only Dirichlet data drives the problem: the solution is the constant 1.
        for v in x.scalar("cell").unwrap().iter().chain(x.scalar("face").unwrap().iter()) {
            assert!((v - 1.0).abs() < 1e-8, "value {v}");
        }
    }

    #[test]
    fn test_volumetric_source() {
        let mesh = mesh();
        let mut op = MatrixMfd::new(MfdConfig::default(), mesh.clone()).unwrap();
        op.symbolic_assemble_global_matrices().unwrap();
        op.create_mfd_mass_matrices(None).unwrap();
        op.create_mfd_stiffness_matrices(None).unwrap();
        op.create_mfd_rhs_vectors().unwrap();
        let mut q = op.create_field();
        q.put_scalar(2.0);
        op.add_volumetric_source(&q).unwrap();
        let total: f64 = op.rhs().unwrap().scalar("cell").unwrap().sum();
        assert!((total - 2.0).abs() < 1e-14);
    }
}
