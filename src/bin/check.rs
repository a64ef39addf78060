// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Consistency harness CLI for the expression core

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use nalgebra::{Matrix3, Vector1, Vector2, Vector3};
use polyframe_expr::validation::{ValidationConfig, ValidationCoordinator, ValidationReporter};
use polyframe_expr::{Datum, Interval, ParametricExpression};
use std::f64::consts::PI;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const CATALOG: [(&str, &str); 7] = [
    ("squiggle", "sin(5t) exp(-t^2) + t/4"),
    ("arc", "half circle of radius 2"),
    ("helix", "three turns around the z axis"),
    ("sphere", "unit sphere without its poles"),
    ("sqrt-minus-x", "sqrt(t) - t"),
    ("tangent", "tan(t) away from the poles"),
    ("power", "u^v"),
];

#[derive(Parser)]
#[command(name = "polyframe-expr-check")]
#[command(about = "Cross-check exact, interval and symbolic evaluation of built-in expressions", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to expr-check.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sample points per check
    #[arg(long)]
    samples: Option<usize>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Only check these expressions (comma-separated)
    #[arg(long)]
    only: Option<String>,

    /// Print the report as JSON instead of the colored summary
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the built-in expressions and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polyframe_expr=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list {
        for (name, description) in CATALOG {
            println!("  {:<14} {}", name.bold(), description);
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => ValidationConfig::from_file(path)?,
        None => ValidationConfig::load()?,
    };
    config.verbose = (config.verbose || cli.verbose) && !cli.json;
    if let Some(samples) = cli.samples {
        config.samples = samples;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(threads) = config.parallelism {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let selected: Vec<String> = match &cli.only {
        Some(names) => names.split(',').map(|name| name.trim().to_string()).collect(),
        None => CATALOG.iter().map(|(name, _)| name.to_string()).collect(),
    };
    for name in &selected {
        if !CATALOG.iter().any(|(known, _)| known == name) {
            anyhow::bail!("Unknown expression: {} (see --list)", name);
        }
    }

    let verbose = config.verbose;
    let mut coordinator = ValidationCoordinator::new(config);
    for name in &selected {
        run_entry(&mut coordinator, name)?;
    }
    let report = coordinator.into_report();

    if let Some(path) = &cli.output {
        ValidationReporter::write_json(&report, path)?;
    }
    if cli.json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else {
        ValidationReporter::print_summary_with_verbose(&report, verbose);
    }

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_entry(coordinator: &mut ValidationCoordinator, name: &str) -> Result<()> {
    let t = ParametricExpression::<1, 1>::t();
    let around = |lower: f64, upper: f64| Vector1::new(Interval::new(lower, upper));

    match name {
        "squiggle" => {
            let f = (&t * 5.0).sin() * (-t.squared()).exp() + &t * 0.25;
            coordinator.check_expression(name, &f, &around(-2.0, 2.0));
        }
        "arc" => {
            let arc = ParametricExpression::<2, 1>::circle(&Vector2::zeros(), 2.0);
            coordinator.check_expression(name, &arc, &around(0.0, PI));
        }
        "helix" => {
            let datum = Datum::new(Vector3::zeros(), Matrix3::from_diagonal(&Vector3::new(1.5, 1.5, 0.5)));
            let helix = ParametricExpression::<3, 1>::helix(&datum, 3.0);
            coordinator.check_expression(name, &helix, &around(0.0, 1.0));
        }
        "sphere" => {
            let sphere = ParametricExpression::<3, 2>::sphere(&Vector3::zeros(), 1.0);
            let domain = Vector2::new(Interval::new(0.1, PI - 0.1), Interval::new(-PI, PI));
            coordinator.check_expression(name, &sphere, &domain);
        }
        "sqrt-minus-x" => {
            let f = t.sqrt() - &t;
            coordinator.check_expression(name, &f, &around(0.1, 4.0));
        }
        "tangent" => {
            coordinator.check_expression(name, &t.tan(), &around(-1.2, 1.2));
        }
        "power" => {
            let u = ParametricExpression::<1, 2>::u();
            let v = ParametricExpression::<1, 2>::v();
            let domain = Vector2::new(Interval::new(0.5, 2.0), Interval::new(-1.0, 2.0));
            coordinator.check_expression(name, &u.pow(&v), &domain);
        }
        _ => anyhow::bail!("Unknown expression: {}", name),
    }
    Ok(())
}
