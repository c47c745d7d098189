//! Preview: print the outcome table for one or more dice expressions.
//!
//! Usage: preview [--n <n>] [--config <limits.ron>] [--roll <count>] [--seed <s>] <expression>...
//!
//! Set `RUST_LOG=dice_odds=debug` to trace each operator application.

use dice_odds::core::distribution::Distribution;
use dice_odds::core::parser::Evaluator;
use dice_odds::core::summary::Summary;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut n: i64 = 0;
    let mut config_path = None;
    let mut rolls: usize = 0;
    let mut seed: u64 = 42;
    let mut expressions = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--n" if i + 1 < args.len() => {
                i += 1;
                n = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --n must be an integer");
                    process::exit(1);
                });
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--roll" if i + 1 < args.len() => {
                i += 1;
                rolls = args[i].parse().unwrap_or(0);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                process::exit(1);
            }
            expression => expressions.push(expression.to_string()),
        }
        i += 1;
    }

    let mut builder = Evaluator::builder();
    if let Some(ref path) = config_path {
        builder = builder.config_file(path);
    }
    let evaluator = match builder.build() {
        Ok(evaluator) => evaluator,
        Err(e) => {
            eprintln!("ERROR: Failed to load config: {}", e);
            process::exit(1);
        }
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut failures = 0;

    for expression in &expressions {
        match evaluator.evaluate(expression, n) {
            Ok(dist) => {
                print_summary(expression, &Summary::from(&dist));
                if rolls > 0 {
                    print_rolls(&dist, rolls, &mut rng);
                }
            }
            Err(e) => {
                eprintln!("ERROR: '{}': {}", expression, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}

fn print_summary(expression: &str, summary: &Summary) {
    println!("\n=== {} ===\n", expression);
    println!("Average: {:.2}", summary.average);
    println!("Total:   {}", summary.total);
    println!("\nChances:");
    for outcome in &summary.outcomes {
        println!(
            "{:>8}: {:>7.3}%",
            outcome.face.to_string(),
            outcome.probability * 100.0
        );
    }
}

fn print_rolls(dist: &Distribution, rolls: usize, rng: &mut StdRng) {
    let faces: Vec<String> = (0..rolls)
        .filter_map(|_| dist.roll(&mut *rng))
        .map(|face| face.to_string())
        .collect();
    if faces.is_empty() {
        println!("\nRolls: (nothing can come up)");
    } else {
        println!("\nRolls: {}", faces.join(", "));
    }
}

fn print_usage() {
    println!("Usage: preview [--n <n>] [--config <limits.ron>] [--roll <count>] [--seed <s>] <expression>...");
    println!();
    println!("Examples:");
    println!("  preview \"4kh3d6\"");
    println!("  preview \"(d20 > d20 + 6 AC 15) * (2d6 + 4) crit (4d6 + 4)\"");
    println!("  preview --n 5 \"d20 + n DC 15 * 8d6 save half\"");
}
