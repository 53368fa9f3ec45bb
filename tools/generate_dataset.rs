//! Synthetic Dataset Generator
//!
//! Writes a `creditcard.csv` with the job's input layout for local runs.
//!
//! Usage: generate_dataset [output] [count] [fraud_rate] [seed]

use fraud_analysis::types::{Column, Transaction, TransactionClass};
use fraud_analysis::types::transaction::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::fs;
use std::path::Path;
use tracing::info;

/// Transaction generator with a fixed class mix
struct TransactionGenerator {
    rng: StdRng,
    /// Standard normal for the anonymized features
    features: Normal<f64>,
    clock: f64,
}

impl TransactionGenerator {
    fn new(seed: Option<u64>) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            features: Normal::new(0.0, 1.0)?,
            clock: 0.0,
        })
    }

    fn gaussian(&mut self) -> f64 {
        self.rng.sample(self.features)
    }

    fn advance_clock(&mut self) -> f64 {
        self.clock += self.rng.gen_range(0.0..4.0_f64).floor();
        self.clock
    }

    /// Generate a legitimate transaction
    fn generate_legitimate(&mut self) -> Transaction {
        let time = self.advance_clock();
        let mut features = [0.0; FEATURE_COUNT];
        for value in features.iter_mut() {
            *value = self.gaussian();
        }
        // Mostly small purchases with a long tail
        let amount = (self.rng.gen_range(0.0..6.5_f64).exp() - 1.0).max(0.0);
        Transaction::new(time, round_cents(amount), TransactionClass::Normal).with_features(features)
    }

    /// Generate a fraudulent transaction
    fn generate_fraud(&mut self) -> Transaction {
        let time = self.advance_clock();
        let mut features = [0.0; FEATURE_COUNT];
        for (i, value) in features.iter_mut().enumerate() {
            let shift = if i % 3 == 0 { -3.0 } else { 1.5 };
            *value = self.gaussian() * 2.0 + shift;
        }
        let amount = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(0.0..2.0)
        } else {
            self.rng.gen_range(100.0..2500.0)
        };
        Transaction::new(time, round_cents(amount), TransactionClass::Fraud).with_features(features)
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn header() -> Vec<String> {
    let mut columns = vec![Column::Time.name()];
    columns.extend((1..=FEATURE_COUNT).map(|i| Column::Feature(i).name()));
    columns.push(Column::Amount.name());
    columns.push("Class".to_string());
    columns
}

fn record(tx: &Transaction) -> Vec<String> {
    let mut fields = Vec::with_capacity(FEATURE_COUNT + 3);
    fields.push(tx.time.to_string());
    fields.extend(tx.features.iter().map(|v| format!("{:.6}", v)));
    fields.push(format!("{:.2}", tx.amount));
    fields.push(format!("\"{}\"", tx.class.label()));
    fields
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_dataset=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("object-store/ws-cc-raw-data-local/data/creditcard.csv");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0017);
    let seed: Option<u64> = args.get(4).and_then(|s| s.parse().ok());

    anyhow::ensure!(
        (0.0..=1.0).contains(&fraud_rate),
        "fraud rate must be in [0, 1], got {}",
        fraud_rate
    );

    info!(
        output = %output,
        count = count,
        fraud_rate = fraud_rate,
        seed = ?seed,
        "Configuration loaded"
    );

    if let Some(parent) = Path::new(output).parent() {
        fs::create_dir_all(parent)?;
    }

    // Class labels are pre-quoted, as in the public dataset
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_path(output)?;
    writer.write_record(header())?;

    let mut generator = TransactionGenerator::new(seed)?;
    let mut fraud_count = 0u64;

    for i in 0..count {
        let tx = if generator.rng.gen_bool(fraud_rate) {
            fraud_count += 1;
            generator.generate_fraud()
        } else {
            generator.generate_legitimate()
        };
        writer.write_record(record(&tx))?;

        if (i + 1) % 100_000 == 0 {
            info!(written = i + 1, total = count, "Progress");
        }
    }
    writer.flush()?;

    info!(
        rows = count,
        fraud = fraud_count,
        normal = count - fraud_count,
        "Dataset written"
    );
    Ok(())
}
