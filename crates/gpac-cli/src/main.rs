//! Command-line driver for the analog circuit engine.

mod plot;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;

use gpac_core::{SimulateParams, simulate_observed};

#[derive(Parser)]
#[command(name = "gpacsim")]
#[command(about = "Build, transform and simulate analog circuits", long_about = None)]
#[command(version)]
struct Cli {
    /// Input circuit specification file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Input circuit specification file (alternative to the positional)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input_flag: Option<PathBuf>,

    /// Plot the simulation into this PDF file (requires gnuplot)
    #[arg(short = 'o', long = "output", value_name = "PDF")]
    plot: Option<PathBuf>,

    /// Simulation upper bound
    #[arg(short = 'b', long = "bound", default_value_t = 5.0, value_name = "VAL")]
    bound: f64,

    /// Runge-Kutta step size
    #[arg(short = 's', long = "step", default_value_t = 0.001, value_name = "VAL")]
    step: f64,

    /// Write a Graphviz rendering of the circuit to this file
    #[arg(short = 'd', long = "dot", value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Write the circuit as a LaTeX initial-value problem to this file
    #[arg(long = "to-latex", value_name = "FILE")]
    to_latex: Option<PathBuf>,

    /// Print the circuit back in its source form
    #[arg(long = "to-code")]
    to_code: bool,

    /// Skip the simulation
    #[arg(long = "no-simulation")]
    no_simulation: bool,

    /// Finalize without the simplification pass
    #[arg(long = "no-simplification")]
    no_simplification: bool,

    /// Skip finalization entirely (implies --no-simulation)
    #[arg(long = "no-finalization")]
    no_finalization: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let input = cli
        .input
        .as_ref()
        .or(cli.input_flag.as_ref())
        .context("no input circuit file; pass one as the first argument or with -i")?;
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read circuit file {}", input.display()))?;
    let mut circuit = gpac_parser::parse(&source)
        .with_context(|| format!("failed to parse {}", input.display()))?;

    if let Some(path) = &cli.dot {
        fs::write(path, circuit.to_dot())
            .with_context(|| format!("failed to write DOT file {}", path.display()))?;
    }

    if cli.no_finalization {
        if !cli.no_simulation {
            warn!("skipping simulation: the circuit is not finalized");
        }
    } else {
        circuit
            .finalize_with(!cli.no_simplification)
            .with_context(|| format!("failed to finalize circuit {:?}", circuit.name()))?;
    }

    if cli.to_code {
        print!("{}", circuit.to_code());
    }

    if let Some(path) = &cli.to_latex {
        if !circuit.is_finalized() {
            bail!("--to-latex needs a finalized circuit; drop --no-finalization");
        }
        let latex = circuit
            .to_latex()
            .with_context(|| format!("failed to render circuit {:?} as LaTeX", circuit.name()))?;
        fs::write(path, latex)
            .with_context(|| format!("failed to write LaTeX file {}", path.display()))?;
    }

    if !cli.no_simulation && circuit.is_finalized() {
        let params = SimulateParams::new(0.0, cli.bound, cli.step);
        let series = simulate_observed(&circuit, &params)
            .with_context(|| format!("simulation of circuit {:?} failed", circuit.name()))?;
        match &cli.plot {
            Some(pdf) => plot::render_pdf(&series, circuit.name(), pdf)?,
            None => {
                for (t, v) in series.times.iter().zip(&series.values) {
                    println!("{}\t{}", t, v);
                }
            }
        }
    }

    Ok(())
}
