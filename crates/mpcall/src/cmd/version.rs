use mpcall_client::DEFAULT_PORT;
use mpcall_wire::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_MESSAGE_SIZE};
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildInfo>,
}

#[derive(Serialize)]
struct BuildInfo {
    target: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    default_port: u16,
    max_message_size: usize,
    max_depth: usize,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: "mpcall",
        version: env!("CARGO_PKG_VERSION"),
        build: args.extended.then(|| BuildInfo {
            target: option_env!("MPCALL_BUILD_TARGET").unwrap_or("unknown"),
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            default_port: DEFAULT_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }),
    };

    match (format, &out.build) {
        (OutputFormat::Json, _) => print_json(&out),
        (_, None) => println!("{} {}", out.name, out.version),
        (_, Some(build)) => {
            println!("name: {}", out.name);
            println!("version: {}", out.version);
            println!("target: {}", build.target);
            println!("target_os: {}", build.target_os);
            println!("target_arch: {}", build.target_arch);
            println!("default_port: {}", build.default_port);
            println!("max_message_size: {}", build.max_message_size);
            println!("max_depth: {}", build.max_depth);
        }
    }

    Ok(SUCCESS)
}
