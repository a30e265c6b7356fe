//! Scenegen command line
//!
//! - `validate`: check a batch envelope without side effects
//! - `plan`: show the resolution strategy and API selection of every requirement
//! - `schema`: print the function schema handed to the model
//! - `generate`: generate one step for a single API detail file

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scenegen_core::{
    ApiInfo, ApiOperation, ApiSpec, ApplyRequest, GeneratorConfig, Orchestrator,
    ResolutionStrategy, SceneStepFunction, StepVariables,
};
use scenegen_llm::{FunctionCaller, OpenAiFunctionClient};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("scenegen")
        .version(scenegen_core::VERSION)
        .about("Autotest scene-step generation")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Generator configuration (TOML)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a batch envelope")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Envelope JSON file"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show how each requirement would be resolved")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Envelope JSON file"),
                ),
        )
        .subcommand(Command::new("schema").about("Print the function schema as JSON"))
        .subcommand(
            Command::new("generate")
                .about("Generate one step for an API detail file")
                .arg(
                    Arg::new("api")
                        .long("api")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("API operation JSON file"),
                )
                .arg(
                    Arg::new("prompt")
                        .long("prompt")
                        .default_value("")
                        .help("Replace the fixed user prompt"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GeneratorConfig::from_path(path)?,
        None => GeneratorConfig::default(),
    };

    match matches.subcommand() {
        Some(("validate", args)) => validate(args),
        Some(("plan", args)) => plan(args),
        Some(("schema", _)) => {
            let schema = SceneStepFunction.schema()?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Some(("generate", args)) => generate(&config, args).await,
        _ => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_envelope(path: &Path) -> Result<ApplyRequest> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("decode {}", path.display()))
}

fn validate(args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("file") else {
        bail!("missing envelope file");
    };
    let request = read_envelope(path)?;
    Orchestrator::validate(&request)?;
    println!(
        "OK: {} requirements (need_adjust={})",
        request.function_params.requirements.len(),
        request.need_adjust
    );
    Ok(())
}

fn plan(args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("file") else {
        bail!("missing envelope file");
    };
    let request = read_envelope(path)?;
    Orchestrator::validate(&request)?;

    for (index, requirement) in request.function_params.requirements.iter().enumerate() {
        let target = requirement.target;
        let strategy = ResolutionStrategy::for_target(&target);
        let calls: Vec<String> = strategy
            .planned_calls()
            .iter()
            .map(ToString::to_string)
            .collect();

        println!("requirements[{index}]");
        println!(
            "  target:    space={} scene_set={} scene={}",
            target.space_id, target.scene_set_id, target.scene_id
        );
        println!("  strategy:  {strategy:?}");
        if calls.is_empty() {
            println!("  calls:     none");
        } else {
            println!("  calls:     {}", calls.join(", "));
        }

        let apis = &requirement.apis;
        if requirement.is_adjusted() {
            println!("  apis:      replay of adjusted step");
        } else if apis.selects_all() {
            println!("  apis:      all of asset {} (version {})", apis.asset_id, apis.version_id);
        } else {
            println!(
                "  apis:      index ids {:?}, operation ids {:?}",
                apis.api_index_ids, apis.api_operation_ids
            );
        }
    }
    Ok(())
}

async fn generate(config: &GeneratorConfig, args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("api") else {
        bail!("missing api file");
    };
    let prompt = args.get_one::<String>("prompt").map_or("", String::as_str);
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let detail: ApiOperation =
        serde_json::from_slice(&bytes).with_context(|| format!("decode {}", path.display()))?;

    let api_key = std::env::var(&config.llm.api_key_env)
        .with_context(|| format!("{} is not set", config.llm.api_key_env))?;
    let client = OpenAiFunctionClient::new(config.llm.client_config(api_key))?;

    let function = SceneStepFunction.definition()?;
    let options = SceneStepFunction.completion_options();
    let messages = SceneStepFunction.messages(
        &serde_json::to_string(&detail)?,
        &StepVariables::default().render(),
        prompt,
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    tracing::info!("Generating step for {} {}", detail.method, detail.path);
    let call = tokio::select! {
        () = cancel.cancelled() => bail!("interrupted"),
        call = client.call_function(&messages, &function, &options) => call?,
    };

    let mut api_info: ApiInfo =
        serde_json::from_str(&call.arguments).context("decode function arguments")?;
    api_info.overlay_summary(&detail.description, &detail.method, &detail.path);
    api_info.prettify_body();
    println!("{}", serde_json::to_string_pretty(&ApiSpec::new(api_info))?);
    Ok(())
}
