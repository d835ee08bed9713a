//! Shared setup for the integration tests
#![allow(dead_code)]

use math_mfd::boundary::BoundaryConditions;
use math_mfd::config::PreconditionerType;
use math_mfd::local_form::Tensor;
use math_mfd::mesh::{Mesh, Point};
use math_mfd::{DistributedField, Entity, FieldLayout, MatrixMfd, MfdConfig, MfdMethod};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Tight solver tolerances so solution comparisons can use 1e-8
pub fn config(method: MfdMethod) -> MfdConfig {
    let mut config = MfdConfig {
        mfd_method: method,
        ..MfdConfig::default()
    };
    config.solver.tolerance = 1e-12;
    config.solver.max_iterations = 2000;
    config.consistent_face_solver.solver.tolerance = 1e-12;
    config.consistent_face_solver.solver.max_iterations = 2000;
    config
}

/// Same as [`config`] with a Jacobi preconditioner, for singular Schur complements
pub fn jacobi_config(method: MfdMethod) -> MfdConfig {
    let mut config = config(method);
    config.preconditioner.preconditioner_type = PreconditionerType::Diagonal;
    config.consistent_face_solver.preconditioner.preconditioner_type = PreconditionerType::Diagonal;
    config
}

/// Run every stage up to `SchurReady`
pub fn assemble(
    config: MfdConfig,
    mesh: &Arc<Mesh>,
    permeability: Option<&[Tensor]>,
    kr: Option<&DistributedField>,
    bcs: &BoundaryConditions,
) -> MatrixMfd {
    let mut op = MatrixMfd::new(config, Arc::clone(mesh)).unwrap();
    op.symbolic_assemble_global_matrices().unwrap();
    op.create_mfd_mass_matrices(permeability).unwrap();
    op.create_mfd_stiffness_matrices(kr).unwrap();
    op.create_mfd_rhs_vectors().unwrap();
    op.apply_boundary_conditions(bcs).unwrap();
    op.assemble_schur_complement().unwrap();
    op
}

/// Cell and face values sampled from `f` at every local centroid (ghosts included)
pub fn sample(mesh: &Arc<Mesh>, f: impl Fn(&Point) -> f64) -> DistributedField {
    let mut field = DistributedField::from_layout(Arc::clone(mesh), &FieldLayout::cell_face());
    {
        let mut cells = field.scalar_mut("cell").unwrap();
        for (c, v) in cells.iter_mut().enumerate() {
            *v = f(&mesh.cell(c).centroid);
        }
    }
    let mut faces = field.scalar_mut("face").unwrap();
    for (i, v) in faces.iter_mut().enumerate() {
        *v = f(&mesh.face(i).centroid);
    }
    field
}

/// Seeded random cell and face values in [-1, 1)
pub fn random_field(mesh: &Arc<Mesh>, seed: u64) -> DistributedField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut field = DistributedField::from_layout(Arc::clone(mesh), &FieldLayout::cell_face());
    for name in ["cell", "face"] {
        for v in field.scalar_mut(name).unwrap().iter_mut() {
            *v = rng.random_range(-1.0..1.0);
        }
    }
    field
}

/// Face-located kr field with one value per local face
pub fn face_kr(mesh: &Arc<Mesh>, value: impl Fn(usize) -> f64) -> DistributedField {
    let mut kr =
        DistributedField::from_layout(Arc::clone(mesh), &FieldLayout::scalar("face", Entity::Face));
    for (f, v) in kr.scalar_mut("face").unwrap().iter_mut().enumerate() {
        *v = value(f);
    }
    kr
}

/// Max |a - b| over the owned rows of one component
pub fn max_owned_diff(a: &DistributedField, b: &DistributedField, name: &str) -> f64 {
    let a = a.owned(name).unwrap();
    let b = b.owned(name).unwrap();
    a.iter()
        .zip(b.iter())
        .fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()))
}

/// Max |a - b| over the owned rows of both components
pub fn max_diff(a: &DistributedField, b: &DistributedField) -> f64 {
    max_owned_diff(a, b, "cell").max(max_owned_diff(a, b, "face"))
}

/// Max |v| over the owned rows of both components
pub fn max_abs(field: &DistributedField) -> f64 {
    ["cell", "face"]
        .iter()
        .flat_map(|name| field.owned(name).unwrap().iter().copied().collect::<Vec<_>>())
        .fold(0.0_f64, |m, v| m.max(v.abs()))
}
