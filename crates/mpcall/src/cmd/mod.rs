use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use mpcall_client::ClientConfig;

use crate::exit::{config_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod call;
pub mod kvs;
pub mod serve;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Invoke a method with JSON arguments and explicit type descriptors.
    Call(CallArgs),
    /// Use the key-value service stub.
    #[command(subcommand)]
    Kvs(KvsCommand),
    /// Print the server status table.
    Status,
    /// Run an in-memory key-value server.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, &target.client_config()?, format),
        Command::Kvs(cmd) => kvs::run(cmd, &target.client_config()?, format),
        Command::Status => status::run(&target.client_config()?, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Where client commands send their calls.
///
/// Flags override the config file, which overrides the built-in defaults.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// JSON client configuration file.
    #[arg(long, value_name = "FILE", env = "MPCALL_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Server host.
    #[arg(long, env = "MPCALL_HOST", global = true)]
    pub host: Option<String>,
    /// Server port.
    #[arg(long, short = 'p', env = "MPCALL_PORT", global = true)]
    pub port: Option<u16>,
    /// Service name sent with every request.
    #[arg(long, short = 'n', env = "MPCALL_NAME", global = true)]
    pub name: Option<String>,
    /// Per-call timeout (e.g. 5s, 500ms; 0 disables it).
    #[arg(long, global = true)]
    pub timeout: Option<String>,
}

impl TargetArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path).map_err(config_error)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.endpoint.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(name) = &self.name {
            config.endpoint.name.clone_from(name);
        }
        if let Some(timeout) = &self.timeout {
            config.endpoint.timeout = parse_timeout(timeout)?;
        }
        tracing::debug!(endpoint = %config.endpoint, "client configuration");
        Ok(config)
    }
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("timeout must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid timeout value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Remote method name.
    pub method: String,
    /// Arguments as JSON values, one per --type.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    /// Argument descriptor, repeated in argument order (e.g. string, list<int32>).
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub types: Vec<String>,
    /// Result descriptor.
    #[arg(long, short = 'r', value_name = "TYPE", default_value = "object")]
    pub returns: String,
    /// Record declaration usable by --type and --returns (e.g. 'entry{key: string, value: int32}').
    #[arg(long = "define", value_name = "DECL")]
    pub defines: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum KvsCommand {
    /// Store a value under a key.
    Put {
        key: String,
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },
    /// Fetch the entry stored under a key.
    Get { key: String },
    /// Mean of all stored values.
    Average,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on; port 0 picks a free port.
    #[arg(long, default_value = "127.0.0.1:9199")]
    pub bind: String,
    /// Server id used in status and save results. Defaults to the bind address.
    #[arg(long)]
    pub id: Option<String>,
    /// Configuration string returned by get_config.
    #[arg(long, value_name = "JSON", default_value = "{}")]
    pub server_config: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
