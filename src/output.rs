use crate::{DeviceInstance, Error, HexContext, Packet, Result};
use log::debug;
use std::collections::HashMap;

/// Text encoders that a packet stream can be rendered with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    Hex,
}

const OUTPUT_FORMATS: &[OutputFormat] = &[OutputFormat::Hex];

impl OutputFormat {
    pub fn list() -> &'static [OutputFormat] {
        OUTPUT_FORMATS
    }

    pub fn find(id: &str) -> Option<OutputFormat> {
        OUTPUT_FORMATS.iter().copied().find(|f| f.id() == id)
    }

    pub fn id(&self) -> &'static str {
        match self {
            OutputFormat::Hex => "hex",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::Hex => "Hexadecimal",
        }
    }

    fn options(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Hex => &["width"],
        }
    }
}

enum Session {
    Hex(HexContext),
}

/// An output format bound to a device for one stream.
pub struct Output {
    format: OutputFormat,
    internal: Option<Session>,
}

impl Output {
    pub fn new(
        format: OutputFormat,
        options: &HashMap<String, String>,
        device: Option<&DeviceInstance>,
    ) -> Result<Self> {
        let device = device.ok_or_else(|| Error::arg("output needs a device"))?;

        if let Some(key) = options.keys().find(|k| !format.options().contains(&k.as_str())) {
            return Err(Error::config(format!(
                "unknown option {key:?} for output format {}",
                format.id()
            )));
        }

        let session = match format {
            OutputFormat::Hex => {
                let width = options.get("width").map(String::as_str);
                Session::Hex(HexContext::new(device, width)?)
            }
        };

        Ok(Self {
            format,
            internal: Some(session),
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_active(&self) -> bool {
        self.internal.is_some()
    }

    /// Feed one packet. See [`HexContext::receive`] for when text is produced.
    pub fn send(&mut self, packet: &Packet) -> Result<Option<String>> {
        match self.internal.as_mut() {
            Some(Session::Hex(ctx)) => ctx.receive(packet),
            None => Err(Error::arg("output has been cleaned up")),
        }
    }

    /// Release the session. Pending partial lines are discarded unless an
    /// end packet was sent first. Calling this again does nothing.
    pub fn cleanup(&mut self) {
        if let Some(Session::Hex(ctx)) = self.internal.take() {
            debug!(
                "{}: cleanup after {} samples, {} lines",
                self.format.id(),
                ctx.samples_total(),
                ctx.lines_total()
            );
        }
    }
}
