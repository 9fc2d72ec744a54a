use serde::Serialize;

use connectorx_led::create_id;

use crate::cmd::IdArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct IdOutput<'a> {
    name: &'a str,
    id: u16,
    hex: String,
}

pub fn run(args: IdArgs, format: OutputFormat) -> CliResult<i32> {
    let ids: Vec<IdOutput<'_>> = args
        .names
        .iter()
        .map(|name| {
            let id = create_id(name);
            IdOutput {
                name,
                id,
                hex: format!("{id:#06x}"),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&ids),
        OutputFormat::Table => print_table(
            &["NAME", "ID", "HEX"],
            ids.iter()
                .map(|out| vec![out.name.to_string(), out.id.to_string(), out.hex.clone()]),
        ),
        OutputFormat::Pretty => {
            for out in &ids {
                println!("{} = {} ({})", out.name, out.hex, out.id);
            }
        }
        OutputFormat::Raw => {
            for out in &ids {
                println!("{}", out.id);
            }
        }
    }
    Ok(SUCCESS)
}
