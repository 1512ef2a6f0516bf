use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ext_chart::{demo, document::Document, utils};
use fp::prime::ValidPrime;

#[derive(Debug, Parser)]
#[command(name = "ext-chart", version, about = "Compute the pages of a spectral sequence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the pages of a saved spectral sequence up to `page`
    Advance {
        document: PathBuf,
        #[arg(long)]
        page: i32,
        /// Where to save the result. Defaults to overwriting the input
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Derive d_r differentials from products using the Leibniz rule
    Leibniz {
        document: PathBuf,
        #[arg(long)]
        page: i32,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print E_r of F_p[x, y] / (x^2, y^(height + 1)) with d_2 x = y
    Demo {
        #[arg(long, default_value = "2")]
        prime: ValidPrime,
        #[arg(long, default_value_t = 3)]
        height: u32,
        #[arg(long, default_value_t = 3)]
        page: i32,
    },
}

fn main() -> anyhow::Result<()> {
    utils::init_logging();

    match Cli::parse().command {
        Command::Advance {
            document: path,
            page,
            output,
        } => {
            let mut document = Document::load(&path)?;
            document.advance_to_page(page)?;
            for r in 1..=page {
                tracing::info!("{}", document.summary(r)?);
            }
            document.save(output.as_ref().unwrap_or(&path))?;
        }
        Command::Leibniz {
            document: path,
            page,
            output,
        } => {
            let mut document = Document::load(&path)?;
            let derived = document.propagate_leibniz(page)?;
            tracing::info!(derived, page, "propagated the Leibniz rule");
            document.save(output.as_ref().unwrap_or(&path))?;
        }
        Command::Demo {
            prime,
            height,
            page,
        } => {
            let mut document = Document::from(demo::truncated_polynomial(prime, height)?);
            document.advance_to_page(page)?;
            println!("{}", serde_json::to_string_pretty(&document.chart(page)?)?);
        }
    }
    Ok(())
}
