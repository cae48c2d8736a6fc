use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info};

use cnfhash::{
    check_sanitation_file, gbdhash, isohash2, normalize_file, sanitize_file, IsoHash2Settings,
};

mod limits;

use limits::{is_file_size_violation, ResourceLimits};

fn main() {
    init_logging();
    let exit_code = match main_with_err() {
        Err(err) => {
            if is_file_size_violation(&err) {
                eprintln!("File Size Limit Exceeded");
            } else {
                error!("{:#}", err);
            }
            1
        }
        Ok(exit_code) => exit_code,
    };
    process::exit(exit_code);
}

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            if record.level() == log::Level::Info {
                writeln!(buf, "c {}", record.args())
            } else {
                writeln!(buf, "c {}: {}", record.level(), record.args())
            }
        })
        .filter(None, log::LevelFilter::Info);

    if let Ok(ref env_var) = env::var("CNFHASH_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn main_with_err() -> Result<i32> {
    let matches = App::new("cnfhash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Identifiers and isomorphism-invariant fingerprints for CNF instances")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .value_name("SECONDS")
                .takes_value(true)
                .global(true)
                .help("CPU time limit in seconds"),
        )
        .arg(
            Arg::with_name("memout")
                .short("m")
                .long("memout")
                .value_name("MEGABYTES")
                .takes_value(true)
                .global(true)
                .help("Memory limit in megabytes"),
        )
        .arg(
            Arg::with_name("fileout")
                .short("f")
                .long("fileout")
                .value_name("MEGABYTES")
                .takes_value(true)
                .global(true)
                .help("Output file size limit in megabytes"),
        )
        .subcommand(
            SubCommand::with_name("id")
                .about("Print the content identifier (MD5 of the canonical text)")
                .arg(input_file_arg()),
        )
        .subcommand(
            SubCommand::with_name("isohash2")
                .about("Print the isomorphism-invariant fingerprint")
                .arg(input_file_arg())
                .arg(
                    Arg::with_name("max-iters")
                        .long("max-iters")
                        .value_name("N")
                        .takes_value(true)
                        .default_value("6")
                        .help("Maximum refinement rounds before stopping"),
                )
                .arg(
                    Arg::with_name("stats")
                        .long("stats")
                        .help("Log per-round refinement statistics"),
                ),
        )
        .subcommand(
            SubCommand::with_name("normalize")
                .about("Emit the canonical textual form")
                .arg(input_file_arg())
                .arg(output_file_arg()),
        )
        .subcommand(
            SubCommand::with_name("sanitize")
                .about("Emit the canonical textual form with canonicalised clauses")
                .arg(input_file_arg())
                .arg(output_file_arg()),
        )
        .subcommand(
            SubCommand::with_name("checksani")
                .about("Report the sanitation status of a file")
                .arg(input_file_arg()),
        )
        .get_matches();

    let (tool, sub_matches) = matches.subcommand();
    let limit_matches = sub_matches.unwrap_or(&matches);

    let limits = ResourceLimits {
        time_s: parse_limit(limit_matches, "timeout")?,
        mem_mb: parse_limit(limit_matches, "memout")?,
        file_mb: parse_limit(limit_matches, "fileout")?,
    };
    limits.apply().context("cannot install resource limits")?;

    match (tool, sub_matches) {
        ("id", Some(sub)) => {
            let file = sub.value_of("FILE").unwrap();
            info!("Running: id {}", file);
            println!("{}", gbdhash(file)?);
        }
        ("isohash2", Some(sub)) => {
            let file = sub.value_of("FILE").unwrap();
            info!("Running: isohash2 {}", file);
            let settings = IsoHash2Settings {
                max_iterations: sub
                    .value_of("max-iters")
                    .unwrap()
                    .parse()
                    .context("invalid --max-iters value")?,
                print_stats: sub.is_present("stats"),
            };
            println!("{}", isohash2(file, &settings)?);
        }
        ("normalize", Some(sub)) => {
            let file = sub.value_of("FILE").unwrap();
            info!("Running: normalize {}", file);
            run_transform(sub.value_of("output"), |target| {
                Ok(normalize_file(file, target)?)
            })?;
        }
        ("sanitize", Some(sub)) => {
            let file = sub.value_of("FILE").unwrap();
            info!("Running: sanitize {}", file);
            run_transform(sub.value_of("output"), |target| {
                Ok(sanitize_file(file, target)?)
            })?;
        }
        ("checksani", Some(sub)) => {
            let file = sub.value_of("FILE").unwrap();
            info!("Running: checksani {}", file);
            let check = check_sanitation_file(file)?;
            println!("hash {}", gbdhash(file)?);
            println!("filename {}", file);
            println!("header_consistent {}", yes_no(check.header_consistent()));
            println!("whitespace_normalised {}", yes_no(check.whitespace_normalised));
            println!("no_comment {}", yes_no(check.no_comment()));
            println!(
                "no_tautological_clause {}",
                yes_no(check.no_tautological_clause())
            );
            println!(
                "no_duplicate_literals {}",
                yes_no(check.no_duplicate_literals())
            );
            println!("no_empty_clause {}", yes_no(check.no_empty_clause()));
        }
        _ => unreachable!("a subcommand is required"),
    }

    Ok(0)
}

fn input_file_arg() -> Arg<'static, 'static> {
    Arg::with_name("FILE")
        .help("Path to the input file")
        .required(true)
}

fn output_file_arg() -> Arg<'static, 'static> {
    Arg::with_name("output")
        .short("o")
        .long("output")
        .value_name("FILE")
        .takes_value(true)
        .help("Path to the output file (stdout if omitted)")
}

fn parse_limit(matches: &ArgMatches, name: &str) -> Result<u64> {
    Ok(match matches.value_of(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid --{} value: {}", name, value))?,
        None => 0,
    })
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Run an emitting tool against stdout or an output file.
///
/// A partially written output file is removed again when the tool fails, which covers oversized
/// writes under `-f` as well as parse errors halfway through the input.
fn run_transform(
    output: Option<&str>,
    emit: impl FnOnce(&mut io::BufWriter<Box<dyn Write>>) -> Result<()>,
) -> Result<()> {
    let sink: Box<dyn Write> = match output {
        Some(path) => {
            Box::new(fs::File::create(path).with_context(|| format!("cannot create {}", path))?)
        }
        None => Box::new(io::stdout()),
    };

    let mut target = io::BufWriter::new(sink);
    let result = emit(&mut target).and_then(|()| target.flush().map_err(Into::into));

    if result.is_err() {
        if let Some(path) = output {
            let _ = fs::remove_file(path);
        }
    }
    result
}
