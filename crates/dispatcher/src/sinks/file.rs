//! FileSink - appends scans to one file per sensor

use contracts::{ContractError, ScanFrame, ScanMessage, ScanSink, SensorId};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// On-disk record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Concatenated binary wire frames (`<sensor>.lidr`)
    #[default]
    Lidr,
    /// One JSON object per line (`<sensor>.jsonl`)
    JsonLines,
}

impl FileFormat {
    fn extension(self) -> &'static str {
        match self {
            FileFormat::Lidr => "lidr",
            FileFormat::JsonLines => "jsonl",
        }
    }
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    pub format: FileFormat,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let format = match params.get("format").map(String::as_str) {
            Some("lidr") | None => FileFormat::Lidr,
            Some("jsonl") | Some("json") => FileFormat::JsonLines,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        Ok(Self { base_path, format })
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    sensor_id: &'a str,
    sequence: u64,
    sim_time: f64,
    hits: u32,
    scan: Cow<'a, ScanMessage>,
}

/// Scan with the frame's range policy applied, as the wire encoder would
fn resolved_scan(frame: &ScanFrame) -> Cow<'_, ScanMessage> {
    let options = frame.encode_options;
    let scan = &*frame.scan;
    if !options.replace_non_finite || scan.ranges.iter().all(|r| r.is_finite()) {
        return Cow::Borrowed(scan);
    }

    let mut resolved = scan.clone();
    let range_max = resolved.range_max;
    for range in &mut resolved.ranges {
        *range = options.resolve_range(*range, range_max);
    }
    Cow::Owned(resolved)
}

/// Sink that appends scans to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writers: HashMap<SensorId, BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            writers: HashMap::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name.clone(), config)
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    /// File that receives scans from `sensor_id`
    pub fn path_for(&self, sensor_id: &str) -> PathBuf {
        output_path(&self.config.base_path, sensor_id, self.config.format)
    }

    fn writer(&mut self, sensor_id: &SensorId) -> std::io::Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(sensor_id) {
            let path = self.path_for(sensor_id);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(sink = %self.name, path = %path.display(), "Opened output file");
            self.writers.insert(sensor_id.clone(), BufWriter::new(file));
        }
        self.writers
            .get_mut(sensor_id)
            .ok_or_else(|| std::io::Error::other("writer missing after insert"))
    }

    fn append(&mut self, frame: &ScanFrame) -> std::io::Result<()> {
        let format = self.config.format;
        let writer = self.writer(&frame.sensor_id)?;
        match format {
            FileFormat::Lidr => writer.write_all(&frame.encode()),
            FileFormat::JsonLines => {
                let record = JsonRecord {
                    sensor_id: &frame.sensor_id,
                    sequence: frame.sequence,
                    sim_time: frame.sim_time,
                    hits: frame.hits,
                    scan: resolved_scan(frame),
                };
                serde_json::to_writer(&mut *writer, &record)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                writer.write_all(b"\n")
            }
        }
    }

    fn persist_frame(&mut self, frame: &ScanFrame) -> Result<(), ContractError> {
        self.append(frame).map_err(|e| {
            error!(
                sink = %self.name,
                sensor_id = %frame.sensor_id,
                sequence = frame.sequence,
                error = %e,
                "Write failed"
            );
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    fn flush_all(&mut self) -> Result<(), ContractError> {
        for writer in self.writers.values_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }
}

fn output_path(base: &Path, sensor_id: &str, format: FileFormat) -> PathBuf {
    base.join(format!("{}.{}", sensor_id, format.extension()))
}

impl ScanSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, sequence = frame.sequence)
    )]
    async fn write(&mut self, frame: &ScanFrame) -> Result<(), ContractError> {
        self.persist_frame(frame)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush_all()?;
        self.writers.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
