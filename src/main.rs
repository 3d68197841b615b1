use std::fs;
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use thiserror::Error;

use tedi::parser::{parse, parse_incremental, RetainMap};
use tedi::ted::DynamicTed;
use tedi::tree::index::TreeIndex;
use tedi::tree::labels::{LabelDictionary, UnitCostModel};

/// Interactive incremental tree-edit-distance driver.
///
/// Reads two lines from stdin per iteration, each a path to a bracketed
/// tree file or empty meaning "this tree is unchanged". The first iteration
/// must provide both trees and runs the baseline; later iterations run the
/// incremental engine against whichever trees moved. Two empty lines end
/// the session. One report line per iteration goes to stdout:
/// `label: distance subproblems millis [hit missed]`.
#[derive(Parser, Debug)]
#[command(name = "tedi", version, about)]
struct Cli {
    /// Print parse/index timing and cache diagnostics to stderr.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Error)]
#[error("first two trees must be provided")]
struct MissingInitialTrees;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            if err.is::<MissingInitialTrees>() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let mut labels = LabelDictionary::new();
    let mut driver = DynamicTed::new(UnitCostModel);

    let (first, second) = next_pair(&mut lines)?;
    let (Some(t1_path), Some(t2_path)) = (first, second) else {
        return Err(MissingInitialTrees.into());
    };

    let mut t1_old = load_baseline(&t1_path, &mut labels, cli.verbose)?;
    let mut t2_old = load_baseline(&t2_path, &mut labels, cli.verbose)?;

    let start = Instant::now();
    let distance = driver.ted(&t1_old, &t2_old);
    report("baseline", distance, driver.subproblems(), start.elapsed(), None);
    if cli.verbose && driver.retries() > 0 {
        eprintln!(
            "baseline escalated the threshold {} time(s) to band {}",
            driver.retries(),
            driver.band_bound()
        );
    }

    loop {
        let (p1, p2) = next_pair(&mut lines)?;
        let (distance, elapsed) = match (&p1, &p2) {
            (None, None) => return Ok(()),
            (Some(p1), Some(p2)) => {
                let (t1_new, r1) = load_incremental(p1, &t1_old, &mut labels, cli.verbose)?;
                let (t2_new, r2) = load_incremental(p2, &t2_old, &mut labels, cli.verbose)?;
                let start = Instant::now();
                let d = driver.ted_incremental(&t1_old, &t1_new, &r1, &t2_old, &t2_new, &r2);
                let elapsed = start.elapsed();
                t1_old = t1_new;
                t2_old = t2_new;
                (d, elapsed)
            }
            (Some(p1), None) => {
                if cli.verbose {
                    eprintln!("tree 2 unchanged");
                }
                let (t1_new, r1) = load_incremental(p1, &t1_old, &mut labels, cli.verbose)?;
                let start = Instant::now();
                let d = driver.ted_incremental_t1(&t1_old, &t1_new, &r1, &t2_old);
                let elapsed = start.elapsed();
                t1_old = t1_new;
                (d, elapsed)
            }
            (None, Some(p2)) => {
                if cli.verbose {
                    eprintln!("tree 1 unchanged");
                }
                let (t2_new, r2) = load_incremental(p2, &t2_old, &mut labels, cli.verbose)?;
                let start = Instant::now();
                let d = driver.ted_incremental_t2(&t1_old, &t2_old, &t2_new, &r2);
                let elapsed = start.elapsed();
                t2_old = t2_new;
                (d, elapsed)
            }
        };

        let subproblems = driver.t1_prep_subproblems()
            + driver.t2_prep_subproblems()
            + driver.subproblems();
        report(
            "dynamic",
            distance,
            subproblems,
            elapsed,
            Some((driver.hits(), driver.missed())),
        );

        if cli.verbose {
            eprintln!(
                "prep distances: t1 {} ({} subproblems), t2 {} ({} subproblems)",
                driver.t1_prep_distance(),
                driver.t1_prep_subproblems(),
                driver.t2_prep_distance(),
                driver.t2_prep_subproblems()
            );
            let pairs = driver.hits() + driver.missed();
            if pairs > 0 {
                eprintln!(
                    "cache answered {:.1}% of {pairs} subtree pairs",
                    driver.hits() as f64 / pairs as f64 * 100.0
                );
            }
        }
    }
}

/// Reads one iteration's two stdin lines; empty or absent lines are `None`.
fn next_pair(
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<(Option<String>, Option<String>)> {
    Ok((read_path(lines)?, read_path(lines)?))
}

fn read_path(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<Option<String>> {
    match lines.next() {
        None => Ok(None),
        Some(line) => {
            let line = line.context("failed to read from stdin")?;
            let trimmed = line.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
    }
}

fn load_baseline(
    path: &str,
    labels: &mut LabelDictionary,
    verbose: bool,
) -> Result<TreeIndex> {
    let start = Instant::now();
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read tree from {path}"))?;
    let tree = parse(&source).with_context(|| format!("failed to parse {path}"))?;
    let index =
        TreeIndex::build(&tree, labels).with_context(|| format!("failed to index {path}"))?;
    if verbose {
        eprintln!(
            "parsed and indexed {path} ({} nodes) in {:?}",
            index.tree_size(),
            start.elapsed()
        );
    }
    Ok(index)
}

fn load_incremental(
    path: &str,
    old: &TreeIndex,
    labels: &mut LabelDictionary,
    verbose: bool,
) -> Result<(TreeIndex, RetainMap)> {
    let start = Instant::now();
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read tree from {path}"))?;
    let (tree, retain) = {
        // Annotated nodes may omit their label; recover it from the old
        // tree through the shared dictionary.
        let lookup = |old_prel: usize| {
            (old_prel < old.tree_size())
                .then(|| labels.resolve(old.prel_to_label_id(old_prel)))
                .flatten()
                .map(str::to_string)
        };
        parse_incremental(&source, lookup)
            .with_context(|| format!("failed to parse {path}"))?
    };
    let index =
        TreeIndex::build(&tree, labels).with_context(|| format!("failed to index {path}"))?;
    if verbose {
        eprintln!(
            "parsed and indexed {path} ({} nodes, {} retained) in {:?}",
            index.tree_size(),
            retain.len(),
            start.elapsed()
        );
    }
    Ok((index, retain))
}

fn report(label: &str, distance: f64, subproblems: u64, elapsed: Duration, cache: Option<(u64, u64)>) {
    let millis = elapsed.as_millis();
    match cache {
        Some((hit, missed)) => {
            println!("{label}: {distance} {subproblems} {millis} {hit} {missed}")
        }
        None => println!("{label}: {distance} {subproblems} {millis}"),
    }
}
