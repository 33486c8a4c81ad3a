use mpcall_client::kvs::Kvs;
use mpcall_client::{ClientBase, ClientConfig};
use mpcall_types::{Typed, Value};

use crate::cmd::KvsCommand;
use crate::exit::{call_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(command: KvsCommand, config: &ClientConfig, format: OutputFormat) -> CliResult<i32> {
    let kvs = Kvs::from_base(ClientBase::from_config(config));

    let value = match command {
        KvsCommand::Put { key, value } => Value::Bool(kvs.put(key, value).map_err(call_error)?),
        KvsCommand::Get { key } => kvs.get(key).map_err(call_error)?.into_value(),
        KvsCommand::Average => Value::Float(kvs.get_average().map_err(call_error)?),
    };

    print_value(&value, format);
    Ok(SUCCESS)
}
