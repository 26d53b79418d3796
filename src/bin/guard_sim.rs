//! guard-sim: 以脚本化的结果序列驱动执行器，观察熔断与指标变化
//!
//! Usage:
//!   guard-sim run [--config <file>] [--category <name>] [--attempts <n>] <outcome>...
//!
//! Outcomes: ok, net, timeout, rate, 5xx, auth, bad, wait:<ms>

use ai_guard_rust::{Error, GuardConfig, RequestDescriptor, ResilientExecutor};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("guard-sim {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"guard-sim: replay a failure scenario through a resilient executor

USAGE:
    guard-sim run [OPTIONS] <OUTCOME>...

OPTIONS:
    --config <file>       Load GuardConfig from a .yaml/.yml/.json file
    --category <name>     Category name (default: simulated)
    --attempts <n>        Override retry.max_attempts (default: 1)

OUTCOMES:
    ok                    Operation succeeds
    net                   Network failure
    timeout               Attempt timeout
    rate                  Rate limited (429)
    5xx                   Server error (503)
    auth                  Authorization failure
    bad                   Malformed response
    wait:<ms>             Sleep before the next step

ENVIRONMENT:
    RUST_LOG              tracing filter (default: warn)"#
    );
}

struct RunArgs {
    config: Option<String>,
    category: String,
    attempts: u32,
    script: Vec<String>,
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    let mut parsed = RunArgs {
        config: None,
        category: "simulated".to_string(),
        attempts: 1,
        script: Vec::new(),
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config = Some(iter.next().ok_or("--config needs a path")?.clone());
            }
            "--category" => {
                parsed.category = iter.next().ok_or("--category needs a name")?.clone();
            }
            "--attempts" => {
                let raw = iter.next().ok_or("--attempts needs a number")?;
                parsed.attempts = raw
                    .parse()
                    .map_err(|_| format!("invalid --attempts value: {raw}"))?;
            }
            step => parsed.script.push(step.to_string()),
        }
    }
    if parsed.script.is_empty() {
        return Err("no outcomes given".to_string());
    }
    Ok(parsed)
}

fn simulate(outcome: &str) -> Result<String, Error> {
    match outcome {
        "ok" => Ok("simulated response".to_string()),
        "net" => Err(Error::network("connection reset by peer")),
        "timeout" => Err(Error::timeout(Duration::from_secs(30))),
        "rate" => Err(Error::rate_limited("too many requests", None)),
        "5xx" => Err(Error::remote(503, "service unavailable")),
        "auth" => Err(Error::authorization("invalid api key")),
        "bad" => Err(Error::invalid_response("response was not valid JSON")),
        other => Err(Error::from_message(format!("unknown outcome: {other}"))),
    }
}

async fn cmd_run(args: &[String]) {
    let run = match parse_run_args(args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut config = match &run.config {
        Some(path) => match GuardConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => GuardConfig::default(),
    };
    config.retry.max_attempts = run.attempts;

    let guard: ResilientExecutor<String> = match ResilientExecutor::new(&run.category, config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    for (i, step) in run.script.iter().enumerate() {
        if let Some(ms) = step.strip_prefix("wait:") {
            match ms.parse::<u64>() {
                Ok(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                Err(_) => eprintln!("step {i}: invalid wait '{step}', skipped"),
            }
            continue;
        }

        // Distinct content per step so successes are not served from cache.
        let request = RequestDescriptor::new(format!("step-{i}")).with_model("sim");
        let outcome = step.clone();
        let result = guard
            .execute(&request, move || {
                let outcome = outcome.clone();
                async move { simulate(&outcome) }
            })
            .await;

        let phase = guard.state().phase;
        match result {
            Ok(_) => println!("step {i:>3} {step:<10} ok                   circuit={phase}"),
            Err(e) => println!(
                "step {i:>3} {step:<10} {:<6} {:<13} circuit={phase}",
                e.kind().code(),
                e.kind().name(),
            ),
        }
    }

    let report = serde_json::json!({
        "category": guard.category(),
        "circuit": guard.state(),
        "metrics": guard.metrics(),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
