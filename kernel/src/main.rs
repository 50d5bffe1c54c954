use clap::Parser;
use std::path::PathBuf;

use lsk::driver::Driver;
use lsk::ops::OpSet;
use lsk::program::Program;
use lsk::registry::Registry;
use lsk::value::Value;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Run,
    Pretty,
    Json,
    Fingerprint,
}

#[derive(Parser, Debug)]
#[command(
    name = "lsk",
    version,
    about = "Lockstep Synchronous Kernel — executes compiled synchronous dataflow node programs tick by tick"
)]
struct Cli {
    /// Compiled program IR (JSON)
    program: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Run)]
    emit: EmitStage,

    /// Number of ticks to run
    #[arg(long, default_value_t = 1)]
    ticks: u64,

    /// JSON-lines file: one input value vector per tick
    /// (default: zero values for every entry input)
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// Reset the program before the given tick index (repeatable)
    #[arg(long)]
    reset_at: Vec<u64>,

    /// Print kernel phases and progress
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // ── Load the program ──
    let source = match std::fs::read_to_string(&cli.program) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("lsk: error: {}: {}", cli.program.display(), e);
            std::process::exit(2);
        }
    };
    let program = match Program::from_json(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("lsk: error: {}: {}", cli.program.display(), e);
            std::process::exit(2);
        }
    };
    if cli.verbose {
        eprintln!(
            "lsk: loaded {} nodes, {} types, {} sensors, {} consts",
            program.nodes.len(),
            program.types.len(),
            program.sensors.len(),
            program.consts.len(),
        );
    }

    if let Err(e) = lsk::verify::verify(&program) {
        eprintln!("lsk: error: {}", e);
        std::process::exit(1);
    }
    if cli.verbose {
        eprintln!("lsk: program verified");
    }

    match cli.emit {
        EmitStage::Pretty => {
            let ops = OpSet::plan(&program);
            print!("{}", lsk::pretty::listing(&program, &ops));
        }
        EmitStage::Json => {
            println!("{}", program.canonical_json());
        }
        EmitStage::Fingerprint => {
            println!("{}", program.fingerprint());
        }
        EmitStage::Run => run(&cli, &program),
    }
}

fn run(cli: &Cli, program: &Program) {
    // The CLI host has no way to supply imported function implementations;
    // programs that declare imports need an embedding host instead.
    if !program.imports.is_empty() {
        eprintln!(
            "lsk: error: program declares {} imported functions; run it from an embedding host",
            program.imports.len()
        );
        std::process::exit(2);
    }

    let registry = Registry::new();
    let mut driver = match Driver::new(program, &registry) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("lsk: error: {}", e);
            std::process::exit(1);
        }
    };
    if cli.verbose {
        eprintln!(
            "lsk: elaborated, constant table fingerprint {}",
            driver.world().fingerprint()
        );
    }

    let input_lines: Option<Vec<Vec<Value>>> = cli.inputs.as_ref().map(|path| {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("lsk: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| match serde_json::from_str(line) {
                Ok(values) => values,
                Err(e) => {
                    eprintln!("lsk: error: bad input line: {}", e);
                    std::process::exit(2);
                }
            })
            .collect()
    });

    let entry = program.node(program.entry);
    let zero_inputs: Vec<Value> = entry
        .inputs
        .iter()
        .map(|p| Value::zero(&program.types, p.ty))
        .collect();

    for t in 0..cli.ticks {
        if cli.reset_at.contains(&t) {
            if cli.verbose {
                eprintln!("lsk: reset before tick {}", t);
            }
            driver.reset();
        }
        let inputs = match &input_lines {
            Some(lines) => match lines.get(t as usize) {
                Some(v) => v.clone(),
                None => {
                    eprintln!("lsk: error: input file exhausted at tick {}", t);
                    std::process::exit(2);
                }
            },
            None => zero_inputs.clone(),
        };
        let outputs = driver.tick(&inputs);
        println!(
            "{}",
            serde_json::to_string(&outputs).expect("values are always serializable")
        );
    }
}
