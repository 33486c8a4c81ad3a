use std::sync::atomic::Ordering;

use mpcall_client::KvsService;
use serde::Serialize;

use crate::cmd::ServeArgs;
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'static str,
    address: String,
    id: &'a str,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let id = args.id.unwrap_or_else(|| default_id(&args.bind));
    let server = KvsService::new(id.clone())
        .with_config(args.server_config)
        .into_server();
    let handle = server
        .bind(&args.bind)
        .map_err(|err| transport_error("bind failed", err))?;

    // The handler must be in place before the address is announced.
    let stop = handle.shutdown_flag();
    ctrlc::set_handler(move || stop.store(true, Ordering::Release)).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })?;

    let out = ListeningOutput {
        event: "listening",
        address: handle.local_addr().to_string(),
        id: &id,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {} (id {})", out.address, out.id)
        }
    }

    handle.wait();
    tracing::info!(%id, "server stopped");
    Ok(SUCCESS)
}

/// `host:port` becomes `host_port`, the id form used in status maps.
fn default_id(bind: &str) -> String {
    match bind.rsplit_once(':') {
        Some((host, port)) => format!("{}_{port}", host.trim_matches(['[', ']'])),
        None => bind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_id_follows_bind_address() {
        assert_eq!(default_id("127.0.0.1:9199"), "127.0.0.1_9199");
        assert_eq!(default_id("[::1]:9199"), "::1_9199");
        assert_eq!(default_id("localhost"), "localhost");
    }
}
