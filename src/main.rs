//! The `analyzer` binary: parses the command line, composes the requested
//! stage chain, pumps standard input through it, and announces shutdown.
//!
//! Exit codes: `0` after a normal drain, `1` for argument or stage-name
//! errors (error line on stderr, usage block on stdout), `2` for stage
//! initialization or internal errors (stderr only, no usage).

use std::env;
use std::io;
use std::process;
use text_pipeline::{logfmt, transforms, PipelineBuilder, PipelineError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
enum ArgError {
    #[error("missing arguments")]
    MissingArguments,
    #[error("missing queue_size")]
    MissingQueueSize,
    #[error("queue_size has no digits")]
    NoDigits,
    #[error("invalid queue_size: trailing characters")]
    TrailingCharacters,
    #[error("queue_size out of range")]
    OutOfRange,
    #[error("queue_size must be a positive integer")]
    NotPositive,
    #[error("invalid stage name: empty")]
    EmptyStageName,
    #[error("invalid stage name: should not include .so")]
    SoSuffix,
}

struct RunConfig {
    queue_capacity: usize,
    stages: Vec<String>,
}

/// Parse a strictly positive decimal queue size. Surrounding whitespace is
/// tolerated, trailing garbage and non-positive values are not.
fn parse_queue_size(raw: &str) -> Result<usize, ArgError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ArgError::MissingQueueSize);
    }
    let (negative, body) = match s.as_bytes()[0] {
        b'+' => (false, &s[1..]),
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(ArgError::NoDigits);
    }
    if !body[digits..].trim().is_empty() {
        return Err(ArgError::TrailingCharacters);
    }
    let value: u64 = body[..digits].parse().map_err(|_| ArgError::OutOfRange)?;
    if negative || value == 0 {
        return Err(ArgError::NotPositive);
    }
    usize::try_from(value).map_err(|_| ArgError::OutOfRange)
}

/// Validate and normalize the stage-name arguments: trimmed, non-empty,
/// no `.so` suffix. Order and duplicates are preserved.
fn collect_stage_names(raw: &[String]) -> Result<Vec<String>, ArgError> {
    let mut names = Vec::with_capacity(raw.len());
    for arg in raw {
        let name = arg.trim();
        if name.is_empty() {
            return Err(ArgError::EmptyStageName);
        }
        if name.ends_with(".so") {
            return Err(ArgError::SoSuffix);
        }
        names.push(name.to_owned());
    }
    Ok(names)
}

/// Parse the full argument vector (including the program name)
fn parse_args(args: &[String]) -> Result<RunConfig, ArgError> {
    if args.len() < 3 {
        return Err(ArgError::MissingArguments);
    }
    let queue_capacity = parse_queue_size(&args[1])?;
    let stages = collect_stage_names(&args[2..])?;
    Ok(RunConfig {
        queue_capacity,
        stages,
    })
}

fn usage() -> String {
    let mut text = String::from(
        "Usage: analyzer <queue_size> <stage1> <stage2> ... <stageN>\n\
         \n\
         Arguments:\n\
         \x20 queue_size    Maximum number of items in each stage's queue\n\
         \x20 stage1..N     Names of stages to chain together\n\
         \n\
         Available stages:\n",
    );
    for (name, description) in transforms::catalog() {
        text.push_str(&format!("  {name:<13} - {description}\n"));
    }
    text.push_str(
        "\n\
         Example:\n\
         \x20 analyzer 20 uppercaser rotator logger\n\
         \x20 echo 'hello' | analyzer 20 uppercaser rotator logger\n\
         \x20 echo '<END>' | analyzer 20 uppercaser rotator logger\n",
    );
    text
}

/// Argument or resolve failure: error line on stderr, usage on stdout,
/// exit code 1. No pipeline work has been performed on this path.
fn fail_with_usage(message: &str) -> ! {
    eprintln!("{message}");
    print!("{}", usage());
    process::exit(1);
}

fn main() {
    logfmt::init();

    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(err) => fail_with_usage(&err.to_string()),
    };

    let mut builder = PipelineBuilder::new(config.queue_capacity);
    for name in &config.stages {
        builder = builder.stage(name.as_str());
    }

    let pipeline = match builder.build() {
        Ok(pipeline) => pipeline,
        // Unresolvable names are reported like bad arguments; nothing has
        // started yet.
        Err(err @ (PipelineError::UnknownStage(_) | PipelineError::NoStages)) => {
            fail_with_usage(&err.to_string())
        }
        // Init failures print no usage.
        Err(err) => {
            eprintln!("stage initialization failed: {err}");
            process::exit(2);
        }
    };

    if let Err(err) = pipeline.run(io::stdin().lock()) {
        eprintln!("internal pipeline error: {err}");
        process::exit(2);
    }

    println!("Pipeline shutdown complete");
}
