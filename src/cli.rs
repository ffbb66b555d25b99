//! CLI: validate data files, generate random data, derive type signatures.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use crate::generate::{generate_with, Options, Prefer};
use crate::schema::load_schema_str;
use crate::validate::validate;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON data against a schema, generate random data from it, or
/// derive its type signature
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate one or more data files against a schema
    Validate(ValidateCmd),
    /// generate random data satisfying a schema
    Generate(GenerateCmd),
    /// print the TypeScript-style type a schema describes
    Typegen(TypegenCmd),
    /// generate-then-validate round trips across many seeds
    Trial(TrialCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSource {
    /// schema .json file
    #[arg(short, long)]
    schema: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateCmd {
    #[command(flatten)]
    schema: SchemaSource,

    /// One or more data inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// print the full diagnostic tree for failures
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct GenerateCmd {
    #[command(flatten)]
    schema: SchemaSource,

    /// fixed seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// how union branches involving `?` are picked
    #[arg(long, value_enum, default_value_t = PreferArg::None)]
    prefer: PreferArg,

    /// depth past which generation steers toward termination
    #[arg(long, default_value_t = 4)]
    max_depth_soft: usize,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TypegenCmd {
    #[command(flatten)]
    schema: SchemaSource,

    /// emit as a named type alias declaration
    #[arg(long)]
    name: Option<String>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrialCmd {
    #[command(flatten)]
    schema: SchemaSource,

    /// number of seeds to run
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// first seed of the range
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PreferArg {
    None,
    Defined,
    Undefined,
}

impl From<PreferArg> for Prefer {
    fn from(arg: PreferArg) -> Self {
        match arg {
            PreferArg::None => Prefer::None,
            PreferArg::Defined => Prefer::Defined,
            PreferArg::Undefined => Prefer::Undefined,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSource {
    fn load(&self) -> anyhow::Result<Value> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema file {}", self.schema.display()))?;
        load_schema_str(&source)
            .with_context(|| format!("invalid schema in {}", self.schema.display()))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Returns the process exit code.
    pub fn run(&self) -> anyhow::Result<i32> {
        match &self.cmd {
            Command::Validate(target) => run_validate(target),
            Command::Generate(target) => run_generate(target),
            Command::Typegen(target) => run_typegen(target),
            Command::Trial(target) => run_trial(target),
        }
    }
}

fn run_validate(target: &ValidateCmd) -> anyhow::Result<i32> {
    let schema = target.schema.load()?;
    let data_paths = resolve_file_path_patterns(&target.input)?;

    let mut failures = 0usize;
    for data_path in data_paths {
        let path_str = data_path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(&data_path)
            .with_context(|| format!("failed to read data file {path_str}"))?;
        let value: Value = serde_json::from_str(&source)
            .with_context(|| format!("failed to parse JSON data file {path_str}"))?;

        let result = validate(&schema, &value)
            .with_context(|| format!("schema error while validating {path_str}"))?;
        if result.passed() {
            println!("{} {path_str}", "PASS".green());
        } else {
            failures += 1;
            println!("{} {path_str}", "FAIL".red());
            if target.verbose {
                println!("{}", serde_json::to_string_pretty(&result.output)?);
            }
        }
    }

    Ok(if failures == 0 { 0 } else { 1 })
}

fn run_generate(target: &GenerateCmd) -> anyhow::Result<i32> {
    let schema = target.schema.load()?;
    let options = Options {
        seed: target.seed,
        prefer: target.prefer.into(),
        max_depth_soft: target.max_depth_soft,
        ..Options::default()
    };
    let value = generate_with(&schema, &options)?;
    let rendered = serde_json::to_string_pretty(&value)?;
    write_output(target.out.as_deref(), &rendered)?;
    Ok(0)
}

fn run_typegen(target: &TypegenCmd) -> anyhow::Result<i32> {
    let schema = target.schema.load()?;
    let derived = crate::derive::derive_type(&schema)?;
    let rendered = match target.name.as_deref() {
        Some(name) => format!("type {name} = {derived}"),
        None => derived,
    };
    write_output(target.out.as_deref(), &rendered)?;
    Ok(0)
}

/// Round-trip soak: every generated document must validate against the schema
/// it came from. Seeds run in parallel and failures report their seed so a
/// run can be replayed with `generate --seed`.
fn run_trial(target: &TrialCmd) -> anyhow::Result<i32> {
    let schema = target.schema.load()?;

    let failures: Vec<String> = (target.seed..target.seed + target.count)
        .into_par_iter()
        .filter_map(|seed| {
            let options = Options {
                seed: Some(seed),
                ..Options::default()
            };
            let value = match generate_with(&schema, &options) {
                Ok(value) => value,
                Err(error) => return Some(format!("seed {seed}: generation failed: {error}")),
            };
            match validate(&schema, &value) {
                Ok(result) if result.passed() => None,
                Ok(result) => Some(format!(
                    "seed {seed}: generated data failed validation:\n{}",
                    serde_json::to_string_pretty(&result.output).unwrap_or_default()
                )),
                Err(error) => Some(format!("seed {seed}: schema error: {error}")),
            }
        })
        .collect();

    for failure in &failures {
        println!("{} {failure}", "FAIL".red());
    }
    let passed = target.count as usize - failures.len();
    println!(
        "{} {passed}/{} seeds round-tripped",
        if failures.is_empty() {
            "PASS".green()
        } else {
            "FAIL".red()
        },
        target.count
    );
    Ok(if failures.is_empty() { 0 } else { 1 })
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&std::path::Path>, rendered: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in
                glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))?
            {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
