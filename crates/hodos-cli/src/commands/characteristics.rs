//! Characteristics command implementation.

use anyhow::Result;
use clap::Args;
use hodos_generator::{CharacteristicType, Generator, GeneratorConfig};

use super::OutputFormat;

/// Arguments for the characteristics command.
#[derive(Args)]
pub struct CharacteristicsArgs {
    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the characteristics command.
pub fn run(args: &CharacteristicsArgs) -> Result<()> {
    let generator = Generator::new(&GeneratorConfig::builder().without_probe().build())?;
    let types = generator.characteristic_types();

    match args.format {
        OutputFormat::Text => print_text(&types),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&types)?),
    }
    Ok(())
}

fn print_text(types: &[CharacteristicType]) {
    for characteristic in types {
        println!("{}", characteristic.name);
        if !characteristic.description.is_empty() {
            println!("  {}", characteristic.description);
        }
        for property in &characteristic.properties {
            let mut line = format!("    {}", property.name);
            if property.mandatory {
                line.push_str(" (mandatory)");
            }
            if let Some(default) = &property.default_value {
                line.push_str(&format!(" [default: {default}]"));
            }
            println!("{line}");
        }
    }
}
