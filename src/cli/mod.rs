//! ASH-016: CLI subcommands (run, validate, upgrade, new, versions, completions).

use crate::core::capability::{CapabilityRegistry, RunConfig, StdinInput, TerminalConsole};
use crate::core::dialog::HeadlessHost;
use crate::core::executor::{self, ExecuteConfig};
use crate::core::function::FunctionTable;
use crate::core::normalizer::{self, Normalized};
use crate::core::settings::{self, Settings, SETTINGS_FILE};
use crate::core::types::{RunEvent, StepOutcome, CURRENT_VERSION, VERSION_HISTORY};
use crate::core::verify;
use crate::journal::eventlog;
use crate::script;
use crate::store;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "ash",
    version,
    about = "Guided recipe runner: step-by-step procedures with prompts, retries, and scripted steps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe step by step
    Run {
        /// Recipe file (JSON)
        file: PathBuf,

        /// Functions file (default: <stem>.functions.yaml next to the recipe)
        #[arg(long)]
        functions: Option<PathBuf>,

        /// Settings file
        #[arg(long, default_value = SETTINGS_FILE)]
        config: PathBuf,

        /// Journal directory (overrides settings)
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Do not wait for Enter between steps
        #[arg(long)]
        no_pause: bool,

        /// Do not write the run journal
        #[arg(long)]
        no_journal: bool,

        /// Retries allowed per step (default: unbounded)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Seed a context variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Seed context variables from a JSON object file
        #[arg(long)]
        vars_file: Option<PathBuf>,
    },

    /// Check recipes load and match their functions
    Validate {
        /// Recipe files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Functions file (default: <stem>.functions.yaml next to each recipe)
        #[arg(long)]
        functions: Option<PathBuf>,
    },

    /// Rewrite a legacy recipe in the current format
    Upgrade {
        /// Recipe file (JSON)
        file: PathBuf,

        /// Do not keep <file>.backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Create a new recipe from the starter template
    New {
        /// Path of the recipe to create
        path: PathBuf,

        /// Recipe title
        #[arg(long)]
        title: String,

        /// Recipe description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Show recipe schema versions
    Versions,

    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Run {
            file,
            functions,
            config,
            state_dir,
            no_pause,
            no_journal,
            max_retries,
            vars,
            vars_file,
        } => {
            let mut settings = settings::load_settings(&config)?;
            if let Some(dir) = state_dir {
                settings.state_dir = dir;
            }
            if no_pause {
                settings.pause = false;
            }
            if no_journal {
                settings.journal = false;
            }
            if max_retries.is_some() {
                settings.max_retries = max_retries;
            }
            let seed = seed_variables(vars_file.as_deref(), &vars)?;
            cmd_run(&file, functions.as_deref(), &settings, seed)
        }
        Commands::Validate { files, functions } => cmd_validate(&files, functions.as_deref()),
        Commands::Upgrade { file, no_backup } => cmd_upgrade(&file, !no_backup),
        Commands::New {
            path,
            title,
            description,
        } => cmd_new(&path, &title, &description),
        Commands::Versions => {
            cmd_versions();
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ash", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// A recipe ready to run: normalized, with its function table.
struct Prepared {
    name: String,
    normalized: Normalized,
    source_hash: String,
    functions: FunctionTable,
}

fn prepare(file: &Path, functions_override: Option<&Path>) -> Result<Prepared, String> {
    let doc = store::load_document(file)?;
    let normalized = normalizer::normalize_named(&file.display().to_string(), &doc.value)
        .map_err(|e| format!("LOAD ERROR: {}", e))?;

    let functions_file = functions_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| store::functions_path(file));
    let functions = if functions_file.exists() {
        script::load_functions(&functions_file)?
    } else if functions_override.is_some() {
        return Err(format!("functions file {} not found", functions_file.display()));
    } else {
        FunctionTable::new()
    };

    Ok(Prepared {
        name: store::recipe_name(file),
        normalized,
        source_hash: doc.source_hash,
        functions,
    })
}

/// Print verification errors as LOAD ERROR lines. Returns how many there were.
fn report_verify(prepared: &Prepared) -> usize {
    let errors = verify::verify_recipe(&prepared.normalized.recipe, &prepared.functions);
    for e in &errors {
        eprintln!("  LOAD ERROR: {}", e);
    }
    errors.len()
}

fn verify_prepared(prepared: &Prepared) -> Result<(), String> {
    match report_verify(prepared) {
        0 => Ok(()),
        n => Err(format!("{} verification error(s)", n)),
    }
}

/// Write an upgrade to disk and journal it.
fn apply_upgrade(
    file: &Path,
    prepared: &Prepared,
    backup: bool,
    journal_dir: Option<&Path>,
) -> Result<(), String> {
    let Some(upgrade) = prepared.normalized.upgrade.as_ref() else {
        return Ok(());
    };
    let kept = store::persist_upgrade(file, upgrade, backup)?;
    println!(
        "Upgraded {} from v{} to v{}",
        file.display(),
        upgrade.from_version,
        CURRENT_VERSION
    );
    if let Some(ref b) = kept {
        println!("  Backup: {}", b.display());
    }
    if let Some(dir) = journal_dir {
        let _ = eventlog::append_event(
            dir,
            &prepared.name,
            RunEvent::RecipeUpgraded {
                recipe: prepared.name.clone(),
                from_version: upgrade.from_version.clone(),
                to_version: CURRENT_VERSION.to_string(),
                source_hash: prepared.source_hash.clone(),
                backup: kept.map(|b| b.display().to_string()),
            },
        );
    }
    Ok(())
}

/// Build the context seed from `--vars-file` and `--var` pairs.
fn seed_variables(vars_file: Option<&Path>, pairs: &[String]) -> Result<Value, String> {
    let mut seed = match vars_file {
        Some(path) => store::load_document(path)?.value,
        None => Value::Null,
    };
    if pairs.is_empty() {
        return Ok(seed);
    }
    if seed.is_null() {
        seed = Value::Object(Map::new());
    }
    let Value::Object(map) = &mut seed else {
        return Err("--vars-file must contain a JSON object".to_string());
    };
    for pair in pairs {
        let (key, value) = parse_var(pair)?;
        map.insert(key, Value::String(value));
    }
    Ok(seed)
}

fn parse_var(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("invalid --var '{}': expected KEY=VALUE", pair)),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_run(
    file: &Path,
    functions: Option<&Path>,
    settings: &Settings,
    seed: Value,
) -> Result<(), String> {
    let prepared = prepare(file, functions)?;
    let journal_dir = settings.journal.then_some(settings.state_dir.as_path());

    if settings.auto_upgrade {
        apply_upgrade(file, &prepared, settings.backup, journal_dir)?;
    }
    // Broken steps abort when reached, not before step 1.
    let problems = report_verify(&prepared);
    if problems > 0 {
        eprintln!("warning: {} verification error(s), running anyway", problems);
    }

    let mut registry = CapabilityRegistry::build(
        RunConfig { variables: seed },
        Box::new(TerminalConsole),
        Box::new(HeadlessHost::new()),
    )
    .map_err(|e| e.to_string())?;
    let mut input = StdinInput::new(&settings.skip_token);

    let cfg = ExecuteConfig {
        recipe: &prepared.normalized.recipe,
        recipe_name: &prepared.name,
        functions: &prepared.functions,
        options: settings.engine_options(),
        journal_dir,
    };
    let report = executor::execute(&cfg, &mut registry, &mut input);

    println!();
    println!(
        "Run {}: {} succeeded, {} skipped ({:.1}s)",
        report.run_id,
        report.count(&StepOutcome::Succeeded),
        report.count(&StepOutcome::Skipped),
        report.total_duration.as_secs_f64()
    );
    if report.is_completed() {
        Ok(())
    } else {
        Err(report.status.to_string())
    }
}

fn cmd_validate(files: &[PathBuf], functions: Option<&Path>) -> Result<(), String> {
    let mut failed = 0;
    for file in files {
        let outcome = prepare(file, functions).and_then(|p| verify_prepared(&p).map(|_| p));
        match outcome {
            Ok(p) => {
                let recipe = &p.normalized.recipe;
                let note = if p.normalized.was_upgraded() {
                    format!(", v{} needs upgrade", p.normalized.shape.version())
                } else {
                    String::new()
                };
                println!(
                    "OK: {} ({} steps, {} functions{})",
                    recipe.display_title(),
                    recipe.steps.len(),
                    p.functions.len(),
                    note
                );
            }
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(format!("{} of {} recipe(s) invalid", failed, files.len()));
    }
    Ok(())
}

fn cmd_upgrade(file: &Path, backup: bool) -> Result<(), String> {
    let prepared = prepare(file, None)?;
    if !prepared.normalized.was_upgraded() {
        println!("{} is already v{}", file.display(), CURRENT_VERSION);
        return Ok(());
    }
    apply_upgrade(file, &prepared, backup, None)
}

fn cmd_new(path: &Path, title: &str, description: &str) -> Result<(), String> {
    store::write_template(path, title, description)?;
    println!("Created {} (v{})", path.display(), CURRENT_VERSION);
    println!(
        "  Functions go in: {}",
        store::functions_path(path).display()
    );
    Ok(())
}

fn cmd_versions() {
    for (version, description, features) in VERSION_HISTORY {
        let marker = if *version == CURRENT_VERSION { " (current)" } else { "" };
        println!("v{}{}: {}", version, marker, description);
        println!("  features: {}", features.join(", "));
    }
}
