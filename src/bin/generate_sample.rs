use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

/// Four-parameter Hill curve.
fn hill(conc: f64, ec50: f64, slope: f64, bottom: f64, top: f64) -> f64 {
    bottom + (top - bottom) / (1.0 + (ec50 / conc).powf(slope))
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Write a synthetic dose-response dataset as Parquet and CSV.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Directory for `dose_response.parquet` and `dose_response.csv`.
    #[arg(default_value = ".")]
    out_dir: PathBuf,
}

struct Row {
    drugbank_id: &'static str,
    primary_name: &'static str,
    synonyms: &'static str,
    concentration: f64,
    replicate: i64,
    response: Option<f64>,
}

fn main() -> Result<()> {
    let out_dir = Cli::parse().out_dir;
    let mut rng = SimpleRng::new(42);

    // (id, name, synonyms, ec50, hill slope)
    let drugs = [
        ("DB00945", "Aspirin", "Acetylsalicylic acid|ASA", 2.0, 1.0),
        ("DB01050", "Ibuprofen", "Advil|Nurofen", 0.8, 1.4),
        ("DB00201", "Caffeine", "Guaranine|Methyltheobromine", 5.0, 0.8),
    ];
    let concentrations = [0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0];
    let replicates = 3;

    let mut rows = Vec::new();
    for &(drugbank_id, primary_name, synonyms, ec50, slope) in &drugs {
        for &concentration in &concentrations {
            for replicate in 1..=replicates {
                let signal = hill(concentration, ec50, slope, 0.05, 1.0);
                // roughly one reading in twenty is lost
                let response = (rng.next_f64() >= 0.05)
                    .then(|| (signal + rng.gauss(0.0, 0.03)).clamp(0.0, 1.2));
                rows.push(Row {
                    drugbank_id,
                    primary_name,
                    synonyms,
                    concentration,
                    replicate,
                    response,
                });
            }
        }
    }

    write_parquet(&rows, &out_dir.join("dose_response.parquet"))?;
    write_csv(&rows, &out_dir.join("dose_response.csv"))?;

    println!(
        "Wrote {} readings for {} drugs to {}",
        rows.len(),
        drugs.len(),
        out_dir.display()
    );
    Ok(())
}

fn write_parquet(rows: &[Row], path: &std::path::Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("drugbank_id", DataType::Utf8, false),
        Field::new("primary_name", DataType::Utf8, false),
        Field::new("synonyms", DataType::Utf8, false),
        Field::new("concentration", DataType::Float64, false),
        Field::new("replicate", DataType::Int64, false),
        Field::new("response", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.drugbank_id))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.primary_name))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.synonyms))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.concentration))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.replicate))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.response))),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Same readings as text, with the untidy cells a spreadsheet export has:
/// padded ids, "NA" for missing responses and the odd "n.d." marker.
fn write_csv(rows: &[Row], path: &std::path::Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "drugbank_id",
        "primary_name",
        "synonyms",
        "concentration",
        "replicate",
        "response",
    ])?;
    for (i, row) in rows.iter().enumerate() {
        let id = if i % 7 == 0 {
            format!(" {} ", row.drugbank_id)
        } else {
            row.drugbank_id.to_string()
        };
        let response = match row.response {
            None => "NA".to_string(),
            Some(_) if i % 31 == 5 => "n.d.".to_string(),
            Some(v) => format!("{v:.4}"),
        };
        writer.write_record([
            id,
            row.primary_name.to_string(),
            row.synonyms.to_string(),
            row.concentration.to_string(),
            row.replicate.to_string(),
            response,
        ])?;
    }
    writer.flush()?;
    Ok(())
}
