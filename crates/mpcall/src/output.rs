use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mpcall_client::Status;
use mpcall_types::Value;
use serde::Serialize;

use crate::json::to_json;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Print a call result.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&to_json(value)),
        OutputFormat::Pretty => println!("{value}"),
        OutputFormat::Table => println!("{}", value_table(value)),
    }
}

fn value_table(value: &Value) -> Table {
    match value {
        Value::Record(record) => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (name, v) in record.fields() {
                table.add_row(vec![name.to_string(), v.to_string()]);
            }
            table
        }
        Value::Map(entries) => {
            let mut table = new_table(vec!["KEY", "VALUE"]);
            for (k, v) in entries {
                table.add_row(vec![k.to_string(), v.to_string()]);
            }
            table
        }
        Value::Seq(items) => {
            let mut table = new_table(vec!["#", "VALUE"]);
            for (i, v) in items.iter().enumerate() {
                table.add_row(vec![i.to_string(), v.to_string()]);
            }
            table
        }
        scalar => {
            let mut table = new_table(vec!["VALUE"]);
            table.add_row(vec![scalar.to_string()]);
            table
        }
    }
}

pub fn print_status(status: &Status, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SERVER", "KEY", "VALUE"]);
            for (server, entries) in status {
                for (key, value) in entries {
                    table.add_row(vec![server.as_str(), key.as_str(), value.as_str()]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (server, entries) in status {
                println!("{server}:");
                for (key, value) in entries {
                    println!("  {key}: {value}");
                }
            }
        }
    }
}
