use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use math_mfd::boundary::{BoundaryConditions, BoundaryMarker, reconcile_ghost_markers};
use math_mfd::comm::{Communicator, run_ranks};
use math_mfd::mesh::{Mesh, Point, box_mesh_hexahedra, partition_mesh, slab_partition};
use math_mfd::{DistributedField, FieldLayout, MatrixMfd, MfdConfig, MfdMethod, SolveStatus};
use solvers::{CsrMatrix, write_matrix_market};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "mfd-diagnostics",
    about = "Assemble and solve a linear-pressure MFD problem on a box mesh and report errors"
)]
struct Cli {
    /// Cells along x
    #[arg(long, default_value_t = 8)]
    nx: usize,

    /// Cells along y
    #[arg(long, default_value_t = 8)]
    ny: usize,

    /// Cells along z
    #[arg(long, default_value_t = 8)]
    nz: usize,

    /// JSON configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the discretization method of the configuration
    #[arg(long, value_enum)]
    method: Option<MethodChoice>,

    /// Divide face constraints by kr
    #[arg(long)]
    scaled_constraint: bool,

    /// Constant relative permeability kr on every face
    #[arg(long, default_value_t = 1.0)]
    kr: f64,

    /// Number of thread ranks the mesh is split into
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// Write aff and Schur complement matrices (MatrixMarket) into this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MethodChoice {
    Tpfa,
    Polyhedra,
}

impl From<MethodChoice> for MfdMethod {
    fn from(choice: MethodChoice) -> Self {
        match choice {
            MethodChoice::Tpfa => MfdMethod::TwoPointFlux,
            MethodChoice::Polyhedra => MfdMethod::Polyhedra,
        }
    }
}

#[derive(Debug)]
struct RankReport {
    status: SolveStatus,
    max_error: f64,
    residual: f64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}

fn load_config(cli: &Cli) -> Result<MfdConfig> {
    let mut config = match &cli.config {
        Some(path) => MfdConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => MfdConfig::default(),
    };
    if let Some(method) = cli.method {
        config.mfd_method = method.into();
    }
    if cli.scaled_constraint {
        config.scaled_constraint = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<i32> {
    let config = load_config(cli)?;
    if cli.print_config {
        println!("{}", config.to_json_string()?);
        return Ok(0);
    }
    if cli.ranks == 0 {
        bail!("--ranks must be at least 1");
    }
    if cli.kr.is_nan() || cli.kr <= 0.0 {
        bail!("--kr must be positive, got {}", cli.kr);
    }
    if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let start = Instant::now();
    let global = box_mesh_hexahedra(
        cli.nx,
        cli.ny,
        cli.nz,
        Point::default(),
        Point::new(1.0, 1.0, 1.0),
    )?;
    println!(
        "mesh: {} cells, {} faces, method {:?}, scaled constraint {}",
        global.num_cells(),
        global.num_faces(),
        config.mfd_method,
        config.scaled_constraint
    );

    let reports: Vec<Result<RankReport>> = if cli.ranks == 1 {
        vec![solve_rank(cli, &config, Arc::new(global))]
    } else {
        let owners = slab_partition(&global, cli.ranks);
        run_ranks(cli.ranks, |comm| {
            let mesh = partition_mesh(&global, &owners, Arc::new(comm))?;
            solve_rank(cli, &config, Arc::new(mesh))
        })
    };

    let mut worst = 0;
    for (rank, report) in reports.into_iter().enumerate() {
        let report = report.with_context(|| format!("rank {rank}"))?;
        if rank == 0 {
            println!(
                "solve: converged {} in {} iterations, relative residual {:.3e}",
                report.status.converged, report.status.iterations, report.status.residual
            );
            println!("max pressure error: {:.3e}", report.max_error);
            println!("max equation residual: {:.3e}", report.residual);
        }
        worst = worst.max(report.status.code());
    }
    println!("elapsed: {:.3} s", start.elapsed().as_secs_f64());
    Ok(worst)
}

fn solve_rank(cli: &Cli, config: &MfdConfig, mesh: Arc<Mesh>) -> Result<RankReport> {
    let mut op = MatrixMfd::new(config.clone(), Arc::clone(&mesh))?;
    op.symbolic_assemble_global_matrices()?;
    op.create_mfd_mass_matrices(None)?;

    let mut kr = DistributedField::from_layout(
        Arc::clone(&mesh),
        &FieldLayout::scalar("face", math_mfd::Entity::Face),
    );
    kr.put_scalar(cli.kr);
    op.create_mfd_stiffness_matrices(Some(&kr))?;
    op.create_mfd_rhs_vectors()?;

    let mut bcs = BoundaryConditions::for_mesh(&mesh);
    for side in ["left side", "right side"] {
        bcs.set_region(&mesh, side, BoundaryMarker::Dirichlet, |p| p.x)?;
    }
    reconcile_ghost_markers(&mut bcs, &mesh)?;
    op.apply_boundary_conditions(&bcs)?;
    op.assemble_schur_complement()?;

    if let Some(dir) = &cli.output_dir {
        let rank = mesh.comm().rank();
        let suffix = if mesh.comm().size() > 1 {
            format!(".rank{rank}")
        } else {
            String::new()
        };
        write_matrix(&dir.join(format!("aff{suffix}.mtx")), op.aff()?)?;
        write_matrix(&dir.join(format!("schur{suffix}.mtx")), op.schur()?)?;
    }

    let mut x = op.create_field();
    let status = op.apply_inverse(op.rhs()?, &mut x)?;

    let mut max_error = 0.0_f64;
    for c in 0..mesh.num_owned_cells() {
        max_error = max_error.max((x.scalar("cell")?[c] - mesh.cell(c).centroid.x).abs());
    }
    for f in 0..mesh.num_owned_faces() {
        max_error = max_error.max((x.scalar("face")?[f] - mesh.face(f).centroid.x).abs());
    }

    let mut r = op.create_field();
    op.compute_residual(&x, &mut r)?;
    Ok(RankReport {
        status,
        max_error: mesh.comm().max_all(max_error),
        residual: r.norm_inf(),
    })
}

fn write_matrix(path: &Path, matrix: &CsrMatrix) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_matrix_market(matrix, BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
