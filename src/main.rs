use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drugbank_toolkit::config::PipelineConfig;
use drugbank_toolkit::data::loader;
use drugbank_toolkit::{basic_plot, basic_preproc, basic_tool, explode, Annotation, Dataset};

/// Run a preprocessing, annotation and plotting pipeline described in JSON.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Pipeline description (input, preprocess, explode, tools, plot, output_csv).
    #[arg(value_name = "PIPELINE_JSON")]
    pipeline: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = PipelineConfig::from_path(&cli.pipeline)?;

    let raw = loader::load_file(&config.input)?;
    let mut dataset = basic_preproc(&raw, &config.preprocess).context("preprocessing")?;
    log::info!(
        "Preprocessed {} → {} rows",
        raw.row_count().unwrap_or(0),
        dataset.row_count()?
    );

    if let Some(ex) = &config.explode {
        dataset = explode(&dataset, &ex.column, &ex.separator)
            .with_context(|| format!("exploding '{}'", ex.column))?;
    }

    for tool in &config.tools {
        dataset = basic_tool(&dataset, tool)
            .with_context(|| format!("computing {} of '{}'", tool.metric, tool.column))?;
    }

    if let Some(out) = &config.output_csv {
        loader::save_csv(&dataset, out)?;
    }

    if let Some(plot) = &config.plot {
        let spec = plot.to_spec(&dataset.schema()).context("plot configuration")?;
        let figure = basic_plot(&dataset, &spec).context("rendering")?;
        if let Some(path) = &figure.path {
            println!("plot: {}", path.display());
        }
    }

    print_summary(&dataset)
}

fn print_summary(dataset: &Dataset) -> Result<()> {
    println!(
        "{} rows × {} columns",
        dataset.row_count()?,
        dataset.n_columns()
    );
    for (name, annotation) in dataset.annotations() {
        match annotation {
            Annotation::Value(v) => println!("{name} = {v}"),
            Annotation::Grouped(g) => {
                println!("{name} by {}:", g.group_by);
                for (key, value) in &g.values {
                    println!("  {key}: {value}");
                }
            }
            Annotation::Column(c) => println!("{name}: {} values ({})", c.len(), c.dtype()),
        }
    }
    Ok(())
}
