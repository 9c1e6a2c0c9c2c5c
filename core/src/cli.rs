use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::expression::{has_markers, parse_expression, strip_markers, ExpressionEngine, Validator};
use crate::runtime::RuntimeContext;
use crate::vm::execute;

#[derive(Parser)]
#[command(name = "vario")]
#[command(about = "Vario - sandboxed expressions and actions for schema-driven UIs", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Allow expressions to name host globals such as `window`
    #[arg(long, global = true)]
    pub allow_globals: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute an action list against a state and print the final state
    Run {
        /// JSON file holding the action array
        actions: PathBuf,

        /// JSON file holding the initial state object
        #[arg(short = 's', long = "state")]
        state: Option<PathBuf>,

        /// Execution timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum number of actions to execute
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Evaluate an expression (with or without `{{ }}`) and print the result
    Eval {
        expression: String,

        /// JSON file holding the state object
        #[arg(short = 's', long = "state")]
        state: Option<PathBuf>,

        /// Inline JSON state, used when no state file is given
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Print the state paths an expression depends on
    Deps { expression: String },

    /// Parse and validate an expression without evaluating it
    Check { expression: String },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    // A subscriber may already be installed by an embedding host
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON in {:?}", path))
}

/// Vario errors carry structured context; show all of it
fn report(error: crate::error::Error) -> anyhow::Error {
    anyhow::anyhow!(error.detailed_message())
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let (timeout_ms, max_steps) = match &cli.command {
        Commands::Run {
            timeout_ms,
            max_steps,
            ..
        } => (*timeout_ms, *max_steps),
        _ => (None, None),
    };

    // Eagerly load and validate configuration before executing any command
    let config = Config::builder()
        .config_path(cli.config.clone())
        .allow_globals(cli.allow_globals.then_some(true))
        .executor_timeout_ms(timeout_ms)
        .executor_max_steps(max_steps)
        .build()?;
    init_tracing(&config);

    match cli.command {
        Commands::Run { actions, state, .. } => {
            let actions = match read_json(&actions)? {
                Value::Array(actions) => actions,
                _ => anyhow::bail!("Actions file must contain a JSON array"),
            };
            let state = match state {
                Some(path) => read_json(&path)?,
                None => Value::Null,
            };

            let options = config
                .context_options()
                .with_emit(|event, data| eprintln!("event {}: {}", event, data))
                .with_navigator(|to| {
                    eprintln!("navigate: {}", to);
                    Ok(())
                });
            let ctx = RuntimeContext::new(state, options).map_err(report)?;
            execute(&actions, &ctx, config.execute_options())
                .await
                .map_err(report)?;
            println!("{}", serde_json::to_string_pretty(&ctx.state())?);
        }

        Commands::Eval {
            expression,
            state,
            data,
        } => {
            let state = match state {
                Some(path) => read_json(&path)?,
                None => serde_json::from_str(&data).context("Failed to parse --data")?,
            };
            let ctx = RuntimeContext::new(state, config.context_options()).map_err(report)?;
            let value = if has_markers(&expression) {
                ctx.interpolate(&expression)
            } else {
                ctx.evaluate(&expression)
            }
            .map_err(report)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Commands::Deps { expression } => {
            let engine = ExpressionEngine::new();
            let deps = engine
                .dependencies(&expression, &config.expression_options())
                .map_err(report)?;
            for dep in deps.iter() {
                println!("{}", dep);
            }
        }

        Commands::Check { expression } => {
            let source = strip_markers(&expression);
            let ast = parse_expression(source).map_err(report)?;
            let violations =
                Validator::new().validate(&ast, &config.expression_options().validation());
            if violations.is_empty() {
                println!("✓ Expression is valid");
            } else {
                for violation in &violations {
                    eprintln!("{}", violation);
                }
                anyhow::bail!("{} validation error(s)", violations.len());
            }
        }

        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
