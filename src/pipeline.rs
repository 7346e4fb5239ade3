use crate::{Conf, DeviceInstance, Logic, Output, OutputFormat, Packet};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use std::{
    collections::HashMap,
    io::{ErrorKind, Read, Write},
    thread,
    time::{Duration, Instant},
};

/// What the reader thread hands to the encoder.
#[derive(Debug)]
enum Feed {
    Logic(Vec<u8>),
    Trigger,
    End,
    Failed(std::io::Error),
}

/// Totals for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub packets: usize,
    pub samples: u64,
    pub triggers: usize,
    pub bytes_out: usize,
    pub t_begin: Instant,
}

impl Default for StreamStats {
    fn default() -> Self {
        Self {
            packets: 0,
            samples: 0,
            triggers: 0,
            bytes_out: 0,
            t_begin: Instant::now(),
        }
    }
}

impl StreamStats {
    pub fn elapsed(&self) -> Duration {
        self.t_begin.elapsed()
    }

    /// Average input rate in samples per second.
    pub fn sample_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64().max(1e-6);
        self.samples as f64 / secs
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Cut the capture into packets of `chunk_samples` samples. If `trigger_at`
/// is set, the packet holding that sample is split and a trigger is sent in
/// between. `unitsize * chunk_samples` must be nonzero and must not overflow.
fn reader_thread(
    mut reader: impl Read,
    tx: Sender<Feed>,
    unitsize: usize,
    chunk_samples: usize,
    trigger_at: Option<u64>,
) {
    let mut buf = vec![0u8; unitsize * chunk_samples];
    let mut position = 0u64;
    let mut trigger = trigger_at;

    loop {
        let n = match fill(&mut reader, &mut buf) {
            Ok(n) => n,
            Err(e) => {
                let _ = tx.send(Feed::Failed(e));
                return;
            }
        };
        if n == 0 {
            break;
        }

        let data = &buf[..n];
        let samples = (n / unitsize) as u64;
        if n % unitsize != 0 {
            warn!(
                "capture ends with a partial sample, dropping {} bytes",
                n % unitsize
            );
        }

        let split = trigger
            .filter(|&at| at >= position && at < position + samples)
            .map(|at| ((at - position) as usize) * unitsize);
        let sent = match split {
            Some(at) => {
                trigger = None;
                let before = &data[..at];
                let after = &data[at..];
                (before.is_empty() || tx.send(Feed::Logic(before.to_vec())).is_ok())
                    && tx.send(Feed::Trigger).is_ok()
                    && tx.send(Feed::Logic(after.to_vec())).is_ok()
            }
            None => tx.send(Feed::Logic(data.to_vec())).is_ok(),
        };
        if !sent {
            debug!("encoder went away, reader stopping");
            return;
        }

        position += samples;
        if n < buf.len() {
            break;
        }
    }

    match trigger {
        Some(at) if at == position => {
            let _ = tx.send(Feed::Trigger);
        }
        Some(at) => warn!("trigger at sample {at} is past the end of the capture ({position} samples)"),
        None => (),
    }
    let _ = tx.send(Feed::End);
}

/// Drive `output` with every feed until the reader sends its last one.
fn consume<W: Write>(
    rx: &Receiver<Feed>,
    output: &mut Output,
    unitsize: usize,
    writer: &mut W,
    stats: &mut StreamStats,
) -> Result<()> {
    for feed in rx.iter() {
        let text = match feed {
            Feed::Logic(data) => {
                let logic = Logic::new(unitsize, &data);
                stats.packets += 1;
                stats.samples += logic.num_samples() as u64;
                output.send(&Packet::Logic(logic))?
            }
            Feed::Trigger => {
                stats.triggers += 1;
                output.send(&Packet::Trigger)?
            }
            Feed::End => output.send(&Packet::End)?,
            Feed::Failed(e) => return Err(e).context("failed to read capture"),
        };
        if let Some(text) = text {
            writer
                .write_all(text.as_bytes())
                .context("failed to write report")?;
            stats.bytes_out += text.len();
        }
    }
    writer.flush().context("failed to flush report")
}

/// Encode everything `reader` yields and write the report to `writer`.
pub fn run<R, W>(conf: &Conf, device: &DeviceInstance, reader: R, writer: &mut W) -> Result<StreamStats>
where
    R: Read + Send + 'static,
    W: Write,
{
    let format = OutputFormat::find(&conf.output.format)
        .ok_or_else(|| anyhow!("unknown output format {:?}", conf.output.format))?;
    let mut options = HashMap::new();
    if let Some(width) = conf.output.width {
        options.insert("width".to_string(), width.to_string());
    }
    let mut output =
        Output::new(format, &options, Some(device)).context("failed to set up output")?;

    let unitsize = conf.input.unitsize();
    if unitsize == 0 {
        return Err(anyhow!("unitsize must be at least one byte per sample"));
    }
    let chunk_samples = conf.stream.chunk_samples.max(1);
    unitsize.checked_mul(chunk_samples).ok_or_else(|| {
        anyhow!("packet of {chunk_samples} samples of {unitsize} bytes is too large")
    })?;

    let trigger_at = conf.input.trigger_at;
    let (tx, rx) = bounded(conf.stream.queue_depth.max(1));
    let reader_handle =
        thread::spawn(move || reader_thread(reader, tx, unitsize, chunk_samples, trigger_at));

    let mut stats = StreamStats::default();
    let result = consume(&rx, &mut output, unitsize, writer, &mut stats);
    output.cleanup();

    // The reader exits once its next send fails.
    drop(rx);
    let joined = reader_handle.join();
    result?;
    joined.map_err(|_| anyhow!("reader thread panicked"))?;

    info!(
        "encoded {} samples in {} packets ({} triggers), {} bytes of text in {:.3} s",
        stats.samples,
        stats.packets,
        stats.triggers,
        stats.bytes_out,
        stats.elapsed().as_secs_f64()
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(data: Vec<u8>, unitsize: usize, chunk: usize, trigger_at: Option<u64>) -> Vec<String> {
        let (tx, rx) = bounded(64);
        reader_thread(Cursor::new(data), tx, unitsize, chunk, trigger_at);
        rx.iter()
            .map(|f| match f {
                Feed::Logic(d) => format!("L{}", d.len()),
                Feed::Trigger => "T".to_string(),
                Feed::End => "E".to_string(),
                Feed::Failed(e) => format!("F{e}"),
            })
            .collect()
    }

    #[test]
    fn reader_chunks_by_samples() {
        assert_eq!(collect(vec![0; 10], 2, 2, None), ["L4", "L4", "L2", "E"]);
        assert_eq!(collect(vec![0; 8], 2, 2, None), ["L4", "L4", "E"]);
        assert_eq!(collect(vec![], 1, 4, None), ["E"]);
    }

    #[test]
    fn reader_keeps_partial_sample_for_encoder() {
        assert_eq!(collect(vec![0; 5], 2, 4, None), ["L5", "E"]);
    }

    #[test]
    fn reader_splits_packet_at_trigger() {
        assert_eq!(collect(vec![0; 8], 1, 4, Some(6)), ["L4", "L2", "T", "L2", "E"]);
        assert_eq!(collect(vec![0; 8], 1, 4, Some(4)), ["L4", "T", "L4", "E"]);
        assert_eq!(collect(vec![0; 8], 1, 4, Some(0)), ["T", "L4", "L4", "E"]);
        assert_eq!(collect(vec![0; 8], 1, 4, Some(8)), ["L4", "L4", "T", "E"]);
        assert_eq!(collect(vec![0; 8], 1, 4, Some(9)), ["L4", "L4", "E"]);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk on fire"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (Conf, DeviceInstance) {
        let conf = Conf::load(None).unwrap();
        let device = crate::utils::build_device(&conf.input);
        (conf, device)
    }

    #[test]
    fn run_fails_on_read_error() {
        let (conf, device) = setup();
        let mut sink = Vec::new();
        let err = run(&conf, &device, FailingReader, &mut sink).unwrap_err();
        assert_eq!(err.to_string(), "failed to read capture");
        assert_eq!(err.root_cause().to_string(), "disk on fire");
        assert!(sink.is_empty());
    }

    #[test]
    fn run_fails_on_write_error() {
        let (conf, device) = setup();
        let err = run(&conf, &device, Cursor::new(vec![0xff; 4096]), &mut FailingWriter)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to write report");
    }

    #[test]
    fn run_stops_when_writer_fails_mid_stream() {
        let (mut conf, device) = setup();
        conf.stream.chunk_samples = 1;
        conf.stream.queue_depth = 1;
        // More packets than the queue can hold, so the reader is blocked on
        // send when the consumer gives up.
        let err = run(&conf, &device, Cursor::new(vec![0; 1024]), &mut FailingWriter)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to write report");
    }

    #[test]
    fn read_error_aborts_stream() {
        let (tx, rx) = bounded(4);
        reader_thread(FailingReader, tx, 1, 4, None);
        let feeds: Vec<Feed> = rx.iter().collect();
        assert_eq!(feeds.len(), 1);
        assert!(matches!(feeds[0], Feed::Failed(_)));
    }
}
