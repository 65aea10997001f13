use clap::Parser;
use std::io::Read;

use commandstream::{CommandOptions, CommandSpec, Runner, ShellSettings};

#[derive(Parser)]
#[command(name = "commandstream")]
#[command(about = "Run shell-like command pipelines with quoting-safe interpolation and a virtual command registry")]
#[command(version)]
struct Cli {
    /// Execute the command from a command-line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Exit immediately if a command exits with non-zero status
    #[arg(short = 'e', long = "errexit")]
    errexit: bool,

    /// Exit with the status of the first failed stage in a pipeline
    #[arg(long = "pipefail")]
    pipefail: bool,

    /// Working directory
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("COMMAND_STREAM_TRACE"))
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();

    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error: Cannot read script file: {file}: {e}");
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("Error: No command provided. Use -c 'command', provide a script file, or pipe via stdin.");
            std::process::exit(1);
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_default();
        buf
    };

    if script.trim().is_empty() {
        if cli.json {
            println!("{}", serde_json::json!({"stdout": "", "stderr": "", "exitCode": 0}));
        }
        std::process::exit(0);
    }

    let settings = ShellSettings::from_env().errexit(cli.errexit).pipefail(cli.pipefail);
    let mut options = CommandOptions::default();
    options.cwd = cli.cwd;
    options.mirror = !cli.json;

    let registry = std::sync::Arc::new(commandstream::commands::with_builtins());
    let runner = Runner::new(CommandSpec::with_options(script, options), registry, settings);

    let result = match runner.run().await {
        Ok(result) => result,
        Err(e) => {
            if cli.json {
                println!("{}", serde_json::json!({"stdout": "", "stderr": e.to_string(), "exitCode": e.code()}));
            } else {
                eprintln!("{e}");
            }
            std::process::exit(e.code());
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout_string(),
                "stderr": result.stderr_string(),
                "exitCode": result.code,
            })
        );
    }

    std::process::exit(result.code);
}
