use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Writes one record per epoch to `metrics.jsonl` and `metrics.csv`.
pub struct MetricsLogger {
    json: File,
    csv: Writer<File>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub d_loss: f32,
    pub g_loss: f32,
    /// Mean discriminator probability on real images.
    pub d_real: f32,
    /// Mean discriminator probability on generated images.
    pub d_fake: f32,
    pub fid: Option<f64>,
    pub seconds: f64,
}

impl MetricsLogger {
    /// Open the metrics files in `dir`. With `append` existing records are
    /// kept (a resumed run), otherwise both files start empty.
    pub fn new(dir: impl AsRef<Path>, append: bool) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let open = |name: &str| -> io::Result<File> {
            let mut options = OpenOptions::new();
            options.create(true);
            if append {
                options.append(true);
            } else {
                options.write(true).truncate(true);
            }
            options.open(dir.join(name))
        };
        let json = open("metrics.jsonl")?;
        let csv_file = open("metrics.csv")?;
        let fresh = csv_file.metadata()?.len() == 0;
        let csv = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(csv_file);
        Ok(MetricsLogger { json, csv })
    }

    pub fn log(&mut self, record: &EpochRecord) -> Result<()> {
        let line = serde_json::to_string(record).map_err(io::Error::from)?;
        writeln!(self.json, "{}", line)?;
        self.csv.serialize(record).map_err(io::Error::from)?;
        self.csv.flush()?;
        Ok(())
    }
}
