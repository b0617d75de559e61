use gibson_planner::{
    about,
    cancel::CancelToken,
    config::AssemblyParameters,
    dna_sequence::DNAsequence,
    engine::{GibsonEngine, Plan, Planner},
    features::FeatureTarget,
    hairpin::NtthalOracle,
    matcher::{Database, ExactMatcher},
    output,
    primers::Primer3Designer,
};
use serde::Serialize;
use std::{env, path::Path, time::Duration};

#[derive(Debug, Default)]
struct GlobalArgs {
    config: Option<String>,
    out: Option<String>,
    timeout: Option<u64>,
    backbone: Option<String>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  gibson_cli --version\n  \
  gibson_cli defaults\n  \
  gibson_cli [--config PATH] [--out PATH] [--timeout SECS] [--backbone FILE] sequence TARGET DB [DB ...]\n  \
  gibson_cli [--config PATH] [--out PATH] [--timeout SECS] [--backbone FILE] features FEATURES DB [DB ...]\n\n  \
  TARGET and DB are FASTA or GenBank files; a FASTA header containing\n  \
  'circular' marks a circular entry. FEATURES lists the parts of the\n  \
  plasmid in order. Set RUST_LOG=debug for progress."
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

/// Options before the command, and the index of the command.
fn parse_global_args(args: &[String]) -> Result<(GlobalArgs, usize), String> {
    let mut global = GlobalArgs::default();
    let mut idx = 1;
    while idx < args.len() && args[idx].starts_with("--") {
        let flag = args[idx].as_str();
        let value = args
            .get(idx + 1)
            .cloned()
            .ok_or_else(|| format!("Missing value for {flag}"))?;
        match flag {
            "--config" => global.config = Some(value),
            "--out" => global.out = Some(value),
            "--backbone" => global.backbone = Some(value),
            "--timeout" => {
                let secs = value
                    .parse::<u64>()
                    .map_err(|e| format!("Invalid --timeout '{value}': {e}"))?;
                global.timeout = Some(secs);
            }
            _ => return Err(format!("Unknown option '{flag}'")),
        }
        idx += 2;
    }
    Ok((global, idx))
}

fn load_params(path: &Option<String>) -> Result<AssemblyParameters, String> {
    match path {
        Some(path) => AssemblyParameters::load_from_path(path).map_err(|e| e.to_string()),
        None => Ok(AssemblyParameters::default()),
    }
}

fn read_first_sequence(path: &str) -> Result<DNAsequence, String> {
    let mut seqs = DNAsequence::from_file(path)
        .map_err(|e| format!("Could not read sequence from '{path}': {e}"))?;
    if seqs.len() > 1 {
        log::warn!(
            "{} sequences in {path}, using the first: {}",
            seqs.len(),
            seqs[0].name()
        );
    }
    Ok(seqs.swap_remove(0))
}

fn read_databases(paths: &[String]) -> Result<Vec<Database>, String> {
    paths
        .iter()
        .map(|path| {
            Database::from_file(path).map_err(|e| format!("Could not read database '{path}': {e}"))
        })
        .collect()
}

fn cancel_token(global: &GlobalArgs) -> CancelToken {
    match global.timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    }
}

fn write_plan(global: &GlobalArgs, plan: &Plan, params: &AssemblyParameters) -> Result<(), String> {
    match &global.out {
        Some(path) => {
            output::write_report(plan, params, path).map_err(|e| e.to_string())?;
            println!(
                "Wrote {} solutions for '{}' to '{path}'",
                plan.solutions.len(),
                plan.target
            );
            Ok(())
        }
        None => print_json(&output::report(plan, params)),
    }
}

fn sequence(global: &GlobalArgs, target: &str, dbs: &[String]) -> Result<(), String> {
    let params = load_params(&global.config)?;
    let target = read_first_sequence(target)?;
    let backbone = match &global.backbone {
        Some(path) => Some(read_first_sequence(path)?),
        None => None,
    };
    let databases = read_databases(dbs)?;

    let designer = Primer3Designer::new();
    let oracle = NtthalOracle::new();
    let engine = GibsonEngine::new(params, &ExactMatcher, &designer, &oracle)
        .map_err(|e| e.to_string())?
        .with_cancel(cancel_token(global));

    let plan = engine
        .plan(&target, &databases, backbone.as_ref())
        .map_err(|e| e.to_string())?;
    write_plan(global, &plan, engine.params())
}

fn features(global: &GlobalArgs, path: &str, dbs: &[String]) -> Result<(), String> {
    let params = load_params(&global.config)?;
    let mut parts = DNAsequence::from_file(path)
        .map_err(|e| format!("Could not read features from '{path}': {e}"))?;
    // the backbone closes the ring as the last feature
    if let Some(backbone) = &global.backbone {
        parts.push(read_first_sequence(backbone)?);
    }
    let name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    let target = FeatureTarget::new(name, parts);
    let databases = read_databases(dbs)?;

    let designer = Primer3Designer::new();
    let oracle = NtthalOracle::new();
    let engine = GibsonEngine::new(params, &ExactMatcher, &designer, &oracle)
        .map_err(|e| e.to_string())?
        .with_cancel(cancel_token(global));

    let plan = engine
        .plan_features(&target, &databases)
        .map_err(|e| e.to_string())?;
    write_plan(global, &plan, engine.params())
}

fn main() {
    let _ = env_logger::Builder::from_default_env().try_init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (global, cmd_idx) = parse_global_args(&args).inspect_err(|_| usage())?;
    if args.len() <= cmd_idx {
        usage();
        return Err("Missing command".to_string());
    }

    let command = &args[cmd_idx];
    match command.as_str() {
        "defaults" => print_json(&AssemblyParameters::default()),
        "sequence" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                return Err("sequence requires: TARGET DB [DB ...]".to_string());
            }
            sequence(&global, &args[cmd_idx + 1], &args[cmd_idx + 2..])
        }
        "features" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                return Err("features requires: FEATURES DB [DB ...]".to_string());
            }
            features(&global, &args[cmd_idx + 1], &args[cmd_idx + 2..])
        }
        _ => {
            usage();
            Err(format!("Unknown command '{command}'"))
        }
    }
}
