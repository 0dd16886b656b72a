use anyhow::Context;
use futures::StreamExt;
use lumen::{
    api::routes::build_app,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    research::ProgressEvent,
    types::EffortLevel,
    AppState, ConfigManager, LumenConfig, ResearchCoordinator, ResearchRequest,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let result = match cli.command {
        None | Some(Commands::Serve) => serve(&cli.config, cli.verbose).await,
        Some(Commands::Research {
            query,
            effort,
            queries,
            loops,
            json,
        }) => {
            research(
                &cli.config,
                cli.verbose,
                &output,
                ResearchArgs {
                    query,
                    effort,
                    queries,
                    loops,
                    json,
                },
            )
            .await
        }
        Some(Commands::Config { validate }) => show_config(&cli.config, validate, &output),
        Some(Commands::Init {
            path,
            force,
            provider,
            host,
            port,
        }) => match init::run(
            InitConfig {
                path,
                force,
                provider,
                host,
                port,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        },
    };

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(level: &str, json: bool, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let mut config_manager = ConfigManager::new(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let config = config_manager.config();
    init_tracing(&config.server.log_level, config.server.json_logs, verbose);

    for warning in config.validate_with_warnings()? {
        tracing::warn!("{}", warning.message);
    }

    if let Err(e) = config_manager.start_watching() {
        tracing::warn!("Configuration hot reload disabled: {}", e);
    }

    let coordinator = ResearchCoordinator::from_config(&config).await?;
    let state = AppState::new(Arc::new(config_manager), coordinator);
    let _config_listener = state.spawn_config_listener();

    let app = build_app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Lumen listening on http://{}", addr);
    #[cfg(feature = "swagger-ui")]
    tracing::info!("API docs available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

struct ResearchArgs {
    query: String,
    effort: Option<EffortLevel>,
    queries: Option<i64>,
    loops: Option<i64>,
    json: bool,
}

async fn research(
    config_path: &Path,
    verbose: bool,
    output: &Output,
    args: ResearchArgs,
) -> anyhow::Result<()> {
    let config = LumenConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    init_tracing("warn", config.server.json_logs, verbose);

    let coordinator = Arc::new(ResearchCoordinator::from_config(&config).await?);

    let mut request = ResearchRequest::new(args.query);
    request.effort = args.effort;
    request.initial_search_query_count = args.queries;
    request.max_research_loops = args.loops;

    if !args.json {
        output.banner();
    }

    let mut events = Box::pin(coordinator.stream(request));
    let mut failure = None;

    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => {
                output.warning("Interrupted, cancelling research");
                anyhow::bail!("research cancelled");
            }
        };
        let Some(event) = event else { break };

        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            output.event(&event);
        }
        if let ProgressEvent::Error { error, .. } = &event {
            failure = Some(error.clone());
        }
    }

    match failure {
        Some(error) => Err(anyhow::anyhow!(error)),
        None => Ok(()),
    }
}

fn show_config(config_path: &Path, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = LumenConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    output.header(&format!("Configuration: {}", config_path.display()));

    output.subheader("Server");
    output.kv("host", &config.server.host);
    output.kv("port", &config.server.port.to_string());
    output.kv("log_level", &config.server.log_level);

    output.subheader("Models");
    let mut models: Vec<_> = config.models.iter().collect();
    models.sort_by_key(|(name, _)| name.as_str());
    for (name, model) in models {
        output.list_item(&format!("{} -> {} ({})", name, model.model, model.provider));
    }

    output.subheader("Research");
    for (agent, model) in config.research.agent_models() {
        output.kv(agent, model);
    }
    output.kv("language", &config.research.language);
    output.kv(
        "initial_search_query_count",
        &config.research.initial_search_query_count.to_string(),
    );
    output.kv(
        "max_research_loops",
        &config.research.max_research_loops.to_string(),
    );

    output.subheader("Search");
    let backends: Vec<String> = config
        .search
        .backends
        .iter()
        .map(|b| b.to_string())
        .collect();
    output.kv("backends", &backends.join(" -> "));
    output.kv("timeout_secs", &config.search.timeout_secs.to_string());

    if validate {
        output.subheader("Validation");
        let warnings = config.validate_with_warnings()?;
        if warnings.is_empty() {
            output.success("Configuration is valid");
        } else {
            for warning in warnings {
                output.warning(&warning.message);
            }
            output.success("Configuration is valid (with warnings)");
        }
    }

    Ok(())
}
