use anyhow::{Context, Result};
use confique::Config;
use serde::Deserialize;
use std::path::Path;

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub input: InputSettings,
    #[config(nested)]
    pub output: OutputSettings,
    #[config(nested)]
    pub stream: StreamSettings,
}

#[derive(Config, Debug, Clone)]
pub struct InputSettings {
    /// Number of logic probes packed into each sample.
    #[config(default = 8)]
    pub channels: usize,
    /// Bytes per sample. Defaults to the smallest width that holds `channels` bits.
    pub unitsize: Option<usize>,
    /// Sample rate in Hz, reported in the header when known.
    pub samplerate: Option<u64>,
    #[config(default = true)]
    pub enabled: ChannelSelection,
    /// Display names by channel index. Missing entries fall back to `D<index>`.
    #[config(default = [])]
    pub names: Vec<String>,
    /// Absolute sample number at which a trigger is reported.
    pub trigger_at: Option<u64>,
}

#[derive(Config, Debug, Clone)]
pub struct OutputSettings {
    #[config(default = "hex")]
    pub format: String,
    /// Samples per output line.
    pub width: Option<usize>,
}

#[derive(Config, Debug, Clone)]
pub struct StreamSettings {
    /// Samples per packet handed from the reader to the encoder.
    #[config(default = 4096)]
    pub chunk_samples: usize,
    /// Packets that may be in flight between reader and encoder.
    #[config(default = 16)]
    pub queue_depth: usize,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChannelSelection {
    All(bool),
    List(Vec<usize>),
}

impl ChannelSelection {
    pub fn is_enabled(&self, index: usize) -> bool {
        match self {
            ChannelSelection::All(state) => *state,
            ChannelSelection::List(channels) => channels.contains(&index),
        }
    }
}

impl InputSettings {
    pub fn unitsize(&self) -> usize {
        self.unitsize.unwrap_or(self.channels.div_ceil(8).max(1))
    }

    pub fn channel_name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("D{index}"))
    }
}

impl Conf {
    /// Load settings from `path`, or use the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Conf::builder();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        builder
            .load()
            .with_context(|| format!("failed to load configuration from {path:?}"))
    }
}
