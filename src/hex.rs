//! Hexadecimal text encoder for logic sample streams.
//!
//! Each enabled logic channel gets its own line, `name:xx xx ...`, where
//! every pair of hex digits renders 8 consecutive samples with the earliest
//! sample in the most significant bit. A line is emitted once
//! `samples_per_line` samples have been seen. A trigger inside that line
//! group is marked by an extra `T:` line with a caret under the column where
//! it occurred.

use crate::utils::samplerate_string;
use crate::{ChannelKind, DeviceInstance, Error, Logic, Packet, Result};
use log::debug;

pub const DEFAULT_SAMPLES_PER_LINE: usize = 192;

/// Per-channel state: where to find the bit, the byte being assembled, and
/// the text of the line in progress.
#[derive(Debug)]
struct LineChannel {
    index: usize,
    name: String,
    acc: u8,
    line: String,
}

impl LineChannel {
    fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            acc: 0,
            line: format!("{name}:"),
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.line.push_str(&format!("{byte:02x} "));
    }

    fn reset_line(&mut self) {
        self.line = format!("{}:", self.name);
    }
}

/// Encoding session for one acquisition stream.
///
/// The channel selection is taken from the device once, at construction;
/// later changes to the device are not observed.
#[derive(Debug)]
pub struct HexContext {
    samples_per_line: usize,
    channels: Vec<LineChannel>,
    spl_cnt: usize,
    trigger: Option<usize>,
    header: Option<String>,
    samples_total: u64,
    lines_total: u64,
}

/// Parse a line-width override. Anything that is not a positive integer is
/// rejected.
pub fn parse_width(param: &str) -> Result<usize> {
    match param.trim().parse::<usize>() {
        Ok(spl) if spl >= 1 => Ok(spl),
        _ => Err(Error::config(format!(
            "samples per line must be a positive integer, got {param:?}"
        ))),
    }
}

impl HexContext {
    pub fn new(device: &DeviceInstance, width: Option<&str>) -> Result<Self> {
        let samples_per_line = match width {
            Some(param) if !param.is_empty() => parse_width(param)?,
            _ => DEFAULT_SAMPLES_PER_LINE,
        };

        let channels: Vec<LineChannel> = device
            .channels
            .iter()
            .filter(|ch| ch.kind == ChannelKind::Logic && ch.enabled)
            .map(|ch| LineChannel::new(ch.index, &ch.name))
            .collect();

        let mut header = format!("{} {}\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        if let Some(samplerate) = device.samplerate() {
            header.push_str(&format!(
                "Acquisition with {}/{} channels at {}\n",
                channels.len(),
                device.channels.len(),
                samplerate_string(samplerate)
            ));
        }

        debug!(
            "hex: {} channels, {} samples per line",
            channels.len(),
            samples_per_line
        );

        Ok(Self {
            samples_per_line,
            channels,
            spl_cnt: 0,
            trigger: None,
            header: Some(header),
            samples_total: 0,
            lines_total: 0,
        })
    }

    pub fn samples_per_line(&self) -> usize {
        self.samples_per_line
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples accumulated towards the line currently being built.
    pub fn samples_in_line(&self) -> usize {
        self.spl_cnt
    }

    pub fn trigger_mark(&self) -> Option<usize> {
        self.trigger
    }

    pub fn samples_total(&self) -> u64 {
        self.samples_total
    }

    pub fn lines_total(&self) -> u64 {
        self.lines_total
    }

    /// Consume one packet. Returns text when the packet completed at least one
    /// line, or when it is the first logic packet and the header is due.
    pub fn receive(&mut self, packet: &Packet) -> Result<Option<String>> {
        match packet {
            Packet::Trigger => {
                self.trigger = Some(self.spl_cnt);
                Ok(None)
            }
            Packet::Logic(logic) => self.logic(logic),
            Packet::End => Ok(self.end()),
        }
    }

    fn logic(&mut self, logic: &Logic) -> Result<Option<String>> {
        if logic.unitsize == 0 {
            return Err(Error::arg("logic packet with zero unitsize"));
        }

        let mut out = self.header.take().unwrap_or_default();

        for sample in logic.samples() {
            self.spl_cnt += 1;
            self.samples_total += 1;
            let byte_done = self.spl_cnt % 8 == 0;

            for ch in &mut self.channels {
                let bit = sample
                    .get(ch.index / 8)
                    .map_or(0, |&b| (b >> (ch.index % 8)) & 1);
                ch.acc = (ch.acc << 1) | bit;
                if byte_done {
                    let acc = ch.acc;
                    ch.push_byte(acc);
                    ch.acc = 0;
                }
            }

            if self.spl_cnt == self.samples_per_line {
                self.flush_line(&mut out);
            }
        }

        Ok((!out.is_empty()).then_some(out))
    }

    fn flush_line(&mut self, out: &mut String) {
        let last = self.channels.len().wrapping_sub(1);
        for (j, ch) in self.channels.iter_mut().enumerate() {
            out.push_str(&ch.line);
            out.push('\n');
            if j == last {
                if let Some(trigger) = self.trigger.take() {
                    let offset = trigger + trigger / 8;
                    out.push_str(&format!("T:{:offset$}^ {trigger}\n", ""));
                }
            }
            ch.reset_line();
        }
        self.lines_total += 1;
        self.spl_cnt = 0;
    }

    /// Flush a partial line. The last byte of each channel is left-justified
    /// so the samples line up with the columns of complete lines. An
    /// outstanding trigger mark is not annotated here.
    fn end(&mut self) -> Option<String> {
        if self.spl_cnt == 0 {
            return None;
        }

        let rem = self.spl_cnt % 8;
        let mut out = String::new();
        for ch in &mut self.channels {
            if rem != 0 {
                let acc = ch.acc << (8 - rem);
                ch.push_byte(acc);
            }
            out.push_str(&ch.line);
            out.push('\n');
            ch.acc = 0;
            ch.reset_line();
        }
        self.lines_total += 1;
        self.spl_cnt = 0;

        (!out.is_empty()).then_some(out)
    }
}
