use mpcall_client::{ClientBase, ClientConfig};
use mpcall_types::{TypeDescriptor, TypeRegistry, Value};

use crate::cmd::CallArgs;
use crate::exit::{call_error, parse_error, CliError, CliResult, SUCCESS};
use crate::json::from_json;
use crate::output::{print_value, OutputFormat};

/// Parsed descriptors and arguments, ready for `ClientBase::call`.
struct Invocation {
    arg_types: Vec<TypeDescriptor>,
    result_type: TypeDescriptor,
    args: Vec<Value>,
}

pub fn run(args: CallArgs, config: &ClientConfig, format: OutputFormat) -> CliResult<i32> {
    let invocation = prepare(&args)?;
    let client = ClientBase::from_config(config);
    let result = client
        .call(
            &args.method,
            &invocation.args,
            &invocation.arg_types,
            &invocation.result_type,
        )
        .map_err(call_error)?;

    print_value(&result, format);
    Ok(SUCCESS)
}

fn prepare(args: &CallArgs) -> CliResult<Invocation> {
    let mut registry = TypeRegistry::new();
    for decl in &args.defines {
        registry
            .define(decl)
            .map_err(|err| parse_error("invalid --define", err))?;
    }

    let arg_types = args
        .types
        .iter()
        .map(|text| {
            registry
                .parse(text)
                .map_err(|err| parse_error(&format!("invalid --type {text:?}"), err))
        })
        .collect::<CliResult<Vec<_>>>()?;
    let result_type = registry
        .parse(&args.returns)
        .map_err(|err| parse_error("invalid --returns", err))?;

    // Arguments beyond the declared types stay untyped; ClientBase rejects
    // the count mismatch before anything is sent.
    let object = TypeDescriptor::object();
    let values = args
        .args
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|err| {
                CliError::usage(format!("argument {index} is not valid JSON: {err}"))
            })?;
            let ty = arg_types.get(index).unwrap_or(&object);
            from_json(json, ty).map_err(|err| CliError::usage(format!("argument {index}: {err}")))
        })
        .collect::<CliResult<Vec<_>>>()?;

    Ok(Invocation {
        arg_types,
        result_type,
        args: values,
    })
}
