//! Consistency and solve properties of the assembled MFD operator

mod common;

use approx::assert_relative_eq;
use common::{
    assemble, config, face_kr, jacobi_config, max_abs, max_diff, max_owned_diff, random_field,
    sample,
};
use math_mfd::boundary::{BoundaryConditions, BoundaryMarker};
use math_mfd::config::PreconditionerType;
use math_mfd::local_form::Tensor;
use math_mfd::mesh::{Mesh, Point, affine_box_mesh, box_mesh_hexahedra};
use math_mfd::{DistributedField, Entity, FieldLayout, MatrixMfd, MfdMethod};
use std::sync::Arc;

const METHODS: [MfdMethod; 2] = [MfdMethod::TwoPointFlux, MfdMethod::Polyhedra];

fn box_mesh() -> Arc<Mesh> {
    Arc::new(
        box_mesh_hexahedra(3, 3, 2, Point::new(0.0, -0.5, 0.0), Point::new(1.5, 1.0, 0.5))
            .unwrap(),
    )
}

fn sheared_mesh() -> Arc<Mesh> {
    let matrix = [[1.0, 0.3, 0.1], [0.0, 1.2, 0.2], [0.1, 0.0, 0.9]];
    Arc::new(
        affine_box_mesh(3, 3, 3, Point::default(), Point::new(1.0, 1.0, 1.0), matrix).unwrap(),
    )
}

fn linear(p: &Point) -> f64 {
    p.x + p.y + p.z
}

fn mixed_markers(mesh: &Mesh) -> BoundaryConditions {
    let mut bcs = BoundaryConditions::for_mesh(mesh);
    bcs.set_region(mesh, "bottom side", BoundaryMarker::Dirichlet, |p| p.x)
        .unwrap();
    bcs.set_region(mesh, "top side", BoundaryMarker::Neumann, |_| 0.5)
        .unwrap();
    bcs.set_region(mesh, "right side", BoundaryMarker::Flux, |_| -0.1)
        .unwrap();
    for &f in mesh.region("left side").unwrap() {
        bcs.set_mixed(f, 2.0, 1.0);
    }
    bcs
}

#[test]
fn test_constant_field_has_zero_flux() {
    let mesh = box_mesh();
    let ones = sample(&mesh, |_| 1.0);
    let bcs = BoundaryConditions::for_mesh(&mesh);

    for method in METHODS {
        let kr = face_kr(&mesh, |_| 3.0);
        for (kr, scaled) in [(None, false), (Some(&kr), false), (Some(&kr), true)] {
            let mut config = jacobi_config(method);
            config.scaled_constraint = scaled;
            let op = assemble(config, &mesh, None, kr, &bcs);

            let mut y = op.create_field();
            op.apply(&ones, &mut y).unwrap();
            assert!(
                max_abs(&y) < 1e-8,
                "{method:?} kr={} scaled={scaled}: |A 1| = {}",
                kr.is_some(),
                max_abs(&y)
            );
        }
    }
}

#[test]
fn test_constant_dirichlet_data_gives_zero_residual() {
    let mesh = box_mesh();
    let mut bcs = BoundaryConditions::for_mesh(&mesh);
    bcs.set_region(&mesh, "boundary", BoundaryMarker::Dirichlet, |_| 2.0)
        .unwrap();
    let twos = sample(&mesh, |_| 2.0);

    for method in METHODS {
        let op = assemble(config(method), &mesh, None, None, &bcs);
        let mut r = op.create_field();
        op.compute_residual(&twos, &mut r).unwrap();
        assert!(max_abs(&r) < 1e-8, "{method:?}: residual {}", max_abs(&r));
    }
}

#[test]
fn test_tpfa_reproduces_linear_field() {
    let mesh = box_mesh();
    let permeability = vec![Tensor::Diagonal([1.0, 2.0, 0.5]); mesh.num_cells()];
    let mut bcs = BoundaryConditions::for_mesh(&mesh);
    bcs.set_region(&mesh, "boundary", BoundaryMarker::Dirichlet, linear)
        .unwrap();
    let exact = sample(&mesh, linear);

    for scaled in [false, true] {
        let mut config = config(MfdMethod::TwoPointFlux);
        config.scaled_constraint = scaled;
        let kr = face_kr(&mesh, |_| 0.7);
        let op = assemble(config, &mesh, Some(&permeability), Some(&kr), &bcs);

        let mut r = op.create_field();
        op.compute_residual(&exact, &mut r).unwrap();
        assert!(max_abs(&r) < 1e-8, "residual {}", max_abs(&r));

        let mut x = op.create_field();
        let status = op.apply_inverse(op.rhs().unwrap(), &mut x).unwrap();
        assert_eq!(status.code(), 0);
        assert!(max_diff(&x, &exact) < 1e-8, "error {}", max_diff(&x, &exact));
    }
}

#[test]
fn test_polyhedra_reproduces_linear_field_on_sheared_mesh() {
    let mesh = sheared_mesh();
    let k = Tensor::Full([[2.0, 0.3, 0.1], [0.3, 1.5, 0.2], [0.1, 0.2, 1.0]]);
    let permeability = vec![k; mesh.num_cells()];
    let mut bcs = BoundaryConditions::for_mesh(&mesh);
    bcs.set_region(&mesh, "boundary", BoundaryMarker::Dirichlet, linear)
        .unwrap();
    let exact = sample(&mesh, linear);

    let op = assemble(config(MfdMethod::Polyhedra), &mesh, Some(&permeability), None, &bcs);
    let mut r = op.create_field();
    op.compute_residual(&exact, &mut r).unwrap();
    assert!(max_abs(&r) < 1e-8, "residual {}", max_abs(&r));

    let mut x = op.create_field();
    let status = op.apply_inverse(op.rhs().unwrap(), &mut x).unwrap();
    assert!(status.converged);
    assert!(max_diff(&x, &exact) < 1e-8, "error {}", max_diff(&x, &exact));
}

#[test]
fn test_apply_and_apply_inverse_round_trip() {
    let mesh = box_mesh();
    let bcs = mixed_markers(&mesh);

    for method in METHODS {
        for pc in [PreconditionerType::BoomerAmg, PreconditionerType::BlockIlu] {
            let mut config = config(method);
            config.preconditioner.preconditioner_type = pc;
            let op = assemble(config, &mesh, None, None, &bcs);

            let b = random_field(&mesh, 7);
            let mut x = op.create_field();
            let status = op.apply_inverse(&b, &mut x).unwrap();
            assert_eq!(status.code(), 0, "{method:?}/{pc:?}: {status:?}");
            let mut ax = op.create_field();
            op.apply(&x, &mut ax).unwrap();
            assert!(max_diff(&ax, &b) < 1e-8, "A A^-1 b: {}", max_diff(&ax, &b));

            let x = random_field(&mesh, 11);
            let mut ax = op.create_field();
            op.apply(&x, &mut ax).unwrap();
            let mut back = op.create_field();
            let status = op.apply_inverse(&ax, &mut back).unwrap();
            assert!(status.converged);
            assert!(max_diff(&back, &x) < 1e-8, "A^-1 A x: {}", max_diff(&back, &x));
        }
    }
}

#[test]
fn test_consistent_face_recovery() {
    let mesh = box_mesh();
    let bcs = mixed_markers(&mesh);

    for method in METHODS {
        let op = operator_with_source(method, &mesh, &bcs);
        let mut x = op.create_field();
        assert!(op.apply_inverse(op.rhs().unwrap(), &mut x).unwrap().converged);

        let mut y = x.clone();
        y.scalar_mut("face").unwrap().fill(0.0);
        let status = op.update_consistent_face_constraints(&mut y).unwrap();
        assert!(status.converged);
        let diff = max_owned_diff(&x, &y, "face");
        assert!(diff < 1e-8, "{method:?}: face difference {diff}");
    }
}

fn operator_with_source(
    method: MfdMethod,
    mesh: &Arc<Mesh>,
    bcs: &BoundaryConditions,
) -> MatrixMfd {
    let mut op = MatrixMfd::new(config(method), Arc::clone(mesh)).unwrap();
    op.symbolic_assemble_global_matrices().unwrap();
    op.create_mfd_mass_matrices(None).unwrap();
    op.create_mfd_stiffness_matrices(None).unwrap();
    op.create_mfd_rhs_vectors().unwrap();
    let source = sample(mesh, |p| 1.0 + p.x * p.y);
    op.add_volumetric_source(&source).unwrap();
    op.apply_boundary_conditions(bcs).unwrap();
    op.assemble_schur_complement().unwrap();
    op
}

#[test]
fn test_consistent_face_correction() {
    let mesh = box_mesh();
    let bcs = mixed_markers(&mesh);
    let op = assemble(config(MfdMethod::Polyhedra), &mesh, None, None, &bcs);

    // r = A z, so fixing dx_c = z_c must give back dx_f = z_f.
    let z = random_field(&mesh, 5);
    let mut r = op.create_field();
    op.apply(&z, &mut r).unwrap();

    let mut dx = z.clone();
    dx.scalar_mut("face").unwrap().fill(0.0);
    let status = op.update_consistent_face_correction(&r, &mut dx).unwrap();
    assert!(status.converged);
    assert!(max_owned_diff(&dx, &z, "face") < 1e-8);
}

#[test]
fn test_non_convergence_reports_status() {
    let mesh = box_mesh();
    let bcs = mixed_markers(&mesh);
    let mut config = config(MfdMethod::Polyhedra);
    config.solver.max_iterations = 1;
    config.preconditioner.preconditioner_type = PreconditionerType::Identity;
    let op = assemble(config, &mesh, None, None, &bcs);

    let b = random_field(&mesh, 3);
    let mut x = op.create_field();
    let status = op.apply_inverse(&b, &mut x).unwrap();
    assert!(!status.converged);
    assert_eq!(status.code(), 1);
    assert!(x.norm_inf().is_finite());
}

#[test]
fn test_linear_field_flux_and_velocity() {
    let mesh = box_mesh();
    let exact = sample(&mesh, linear);
    let bcs = BoundaryConditions::for_mesh(&mesh);

    for method in METHODS {
        let op = assemble(jacobi_config(method), &mesh, None, None, &bcs);
        let layout = FieldLayout::scalar("face", Entity::Face);
        let mut flux = DistributedField::from_layout(Arc::clone(&mesh), &layout);
        op.derive_flux(&exact, &mut flux).unwrap();

        // q = -area n·∇p along the face normal
        let q = flux.scalar("face").unwrap();
        for f in 0..mesh.num_faces() {
            let face = mesh.face(f);
            let n = face.normal;
            assert_relative_eq!(q[f], -face.area * (n.x + n.y + n.z), epsilon = 1e-10);
        }

        let velocity = op.derive_cell_velocity(&flux).unwrap();
        assert_eq!(velocity.nrows(), mesh.num_owned_cells());
        for v in velocity.iter() {
            assert_relative_eq!(*v, -1.0, epsilon = 1e-10);
        }
    }
}
