use mpcall_client::{ClientBase, ClientConfig};

use crate::exit::{call_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(config: &ClientConfig, format: OutputFormat) -> CliResult<i32> {
    let client = ClientBase::from_config(config);
    let status = client.get_status().map_err(call_error)?;
    print_status(&status, format);
    Ok(SUCCESS)
}
