use std::env;
use std::process;

use domain::adapters::memory_cache::InMemoryAvailabilityCache;
use domain::adapters::memory_registry::InMemoryUsernameRegistry;
use domain::service::{generate_unique_username, UsernameValidator, ValidationError};
use domain::slug::{get_slug_with, SlugOptions};
use domain::SystemClock;

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain slug <text> [--min <n>] [--max <n>]\n  domain check <username> [--taken <name>]...\n  domain generate\n\nNotes:\n  - This demo CLI uses an in-memory registry; nothing is persisted across runs.",
        domain::about()
    );
}

fn parse_len(flag: &str, val: Option<&String>) -> Result<usize, String> {
    let Some(val) = val else {
        return Err(format!("{} requires a value", flag));
    };
    val.parse()
        .map_err(|_| format!("{} must be a non-negative integer", flag))
}

async fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    match cmd.as_str() {
        "slug" => {
            let Some(text) = args.next() else {
                return Err("missing <text> for slug".into());
            };
            let mut opts = SlugOptions::default();
            let rest: Vec<String> = args.collect();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--min" => opts.min_length = parse_len("--min", rest.get(i + 1))?,
                    "--max" => opts.max_length = parse_len("--max", rest.get(i + 1))?,
                    unk => return Err(format!("unknown argument: {}", unk)),
                }
                i += 2;
            }
            println!("{}", get_slug_with(&text, opts));
            Ok(())
        }
        "check" => {
            let Some(candidate) = args.next() else {
                return Err("missing <username> for check".into());
            };
            let rest: Vec<String> = args.collect();
            let mut taken = Vec::new();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--taken" => {
                        let Some(name) = rest.get(i + 1) else {
                            return Err("--taken requires a name".into());
                        };
                        taken.push(name.clone());
                    }
                    unk => return Err(format!("unknown argument: {}", unk)),
                }
                i += 2;
            }

            let validator = UsernameValidator::new(
                InMemoryUsernameRegistry::with_taken(taken),
                InMemoryAvailabilityCache::new(),
            );
            match validator.validate(&candidate).await {
                Ok(name) => {
                    println!("ok: {}", name);
                    Ok(())
                }
                Err(ValidationError::Rejected { kind, message }) => {
                    Err(format!("{} ({})", message, kind.code()))
                }
                Err(e) => Err(format!("check failed: {}", e)),
            }
        }
        "generate" => {
            println!("{}", generate_unique_username(&SystemClock));
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(msg) = run().await {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
