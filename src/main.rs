use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use logic_hex::{pipeline, utils, ChannelSelection, Conf, OutputFormat};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::PathBuf,
};
use time::macros::format_description;

#[derive(Parser, Debug)]
#[command(version, about = "Render a raw logic capture as a hexadecimal text report")]
struct Args {
    /// Raw capture to read; `-` or nothing reads stdin
    input: Option<PathBuf>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report destination; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of logic channels in the capture
    #[arg(long)]
    channels: Option<usize>,

    /// Bytes per sample
    #[arg(long)]
    unitsize: Option<usize>,

    /// Sample rate in Hz
    #[arg(long)]
    samplerate: Option<u64>,

    /// Comma separated list of channel indices to include
    #[arg(long, value_delimiter = ',')]
    enable: Option<Vec<usize>>,

    /// Samples per output line
    #[arg(short, long)]
    width: Option<usize>,

    /// Report a trigger before this sample number
    #[arg(short, long)]
    trigger_at: Option<u64>,

    /// Output format id
    #[arg(short, long)]
    format: Option<String>,

    /// Print the available output formats and exit
    #[arg(long)]
    list_formats: bool,

    /// More log output; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, conf: &mut Conf) {
        if let Some(channels) = self.channels {
            conf.input.channels = channels;
        }
        if self.unitsize.is_some() {
            conf.input.unitsize = self.unitsize;
        }
        if self.samplerate.is_some() {
            conf.input.samplerate = self.samplerate;
        }
        if let Some(enable) = &self.enable {
            conf.input.enabled = ChannelSelection::List(enable.clone());
        }
        if self.width.is_some() {
            conf.output.width = self.width;
        }
        if self.trigger_at.is_some() {
            conf.input.trigger_at = self.trigger_at;
        }
        if let Some(format) = &self.format {
            conf.output.format = format.clone();
        }
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("failed to initialise logging")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    if args.list_formats {
        for format in OutputFormat::list() {
            println!("{:<8}{}", format.id(), format.description());
        }
        return Ok(());
    }

    let mut conf = Conf::load(args.config.as_deref())?;
    args.apply(&mut conf);

    let mut device = utils::build_device(&conf.input);
    utils::configure_device(&mut device, &conf.input).context("failed to configure channels")?;

    let reader: Box<dyn Read + Send> = match &args.input {
        Some(path) if path.as_os_str() != "-" => Box::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        _ => Box::new(io::stdin()),
    };
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    info!(
        "{} channels, {} bytes per sample, format {}",
        conf.input.channels,
        conf.input.unitsize(),
        conf.output.format
    );
    let stats = pipeline::run(&conf, &device, reader, &mut writer)?;
    info!(
        "done: {} samples at {:.0} samples/s",
        stats.samples,
        stats.sample_rate()
    );

    Ok(())
}
