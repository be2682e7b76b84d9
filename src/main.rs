mod cli;

use gifify::{config, server};
use gifify_av::{ConversionPipeline, OutputMode, ToolRegistry, FFMPEG};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ConvertArgs};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "gifify=trace,gifify_av=debug,gifify_core=debug,tower_http=debug".to_string()
        } else {
            "gifify=info,gifify_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert(args) => run_convert(&args, cli.config.as_deref()),
        Commands::Serve { host, port } => report(serve(host, port, cli.config.as_deref())),
        Commands::CheckTools { json } => report(check_tools(cli.config.as_deref(), json)),
    }
}

/// Print an edge error and turn it into a failing exit status.
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_convert(args: &ConvertArgs, config_path: Option<&Path>) -> ExitCode {
    let config = match config::load_config_or_default(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match convert(args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if matches!(e, gifify_core::Error::ToolNotFound { ref tool } if tool == FFMPEG) {
                eprintln!("  install ffmpeg (e.g. `brew install ffmpeg` or `apt install ffmpeg`)");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn convert(args: &ConvertArgs, config: &config::Config) -> gifify_core::Result<()> {
    let job = args.to_job()?;

    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let pipeline = ConversionPipeline::new(tools).with_output_mode(OutputMode::Inherit);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        // Dropping the job future kills the running child.
        tokio::select! {
            result = pipeline.run(&job) => result,
            Ok(()) = tokio::signal::ctrl_c() => Err(gifify_core::Error::Interrupted),
        }
    })?;

    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    if outcome.optimized {
        println!("Wrote {} (optimized)", outcome.output.display());
    } else {
        println!("Wrote {}", outcome.output.display());
    }
    Ok(())
}

fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting gifify web UI");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::start_server(config))
}

fn check_tools(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
    } else {
        println!("Checking external tools...\n");

        for tool in &tools {
            let status = if tool.available { "✓" } else { "✗" };
            print!("{} {}", status, tool.name);

            if let Some(ref version) = tool.version {
                print!(" ({})", version);
            }

            if let Some(ref path) = tool.path {
                print!(" - {}", path.display());
            }

            if !tool.required {
                print!(" [optional]");
            }

            println!();
        }
        println!();
    }

    let missing: Vec<&str> = tools
        .iter()
        .filter(|t| t.required && !t.available)
        .map(|t| t.name.as_str())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("required tools missing: {}", missing.join(", "));
    }
    if !json {
        println!("All required tools are available!");
    }

    Ok(())
}
