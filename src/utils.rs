use crate::{Channel, ChannelKind, DeviceInstance, DeviceStatus, InputSettings, Result, StaticDriver};
use log::debug;

const SI_PREFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];

/// Format `value` with the largest SI prefix that keeps the integer part
/// below 1000, e.g. `1500000, "Hz"` gives `"1.5 MHz"`.
pub fn si_string_u64(value: u64, unit: &str) -> String {
    let mut exp = 0;
    let mut divisor = 1u64;
    while exp < SI_PREFIXES.len() - 1 && value / divisor >= 1000 {
        divisor *= 1000;
        exp += 1;
    }

    let quot = value / divisor;
    let mut fract = String::new();
    if exp > 0 {
        fract = format!(".{:0width$}", value % divisor, width = exp * 3);
        let trimmed = fract.trim_end_matches('0').trim_end_matches('.').len();
        fract.truncate(trimmed);
    }

    format!("{quot}{fract} {}{unit}", SI_PREFIXES[exp])
}

pub fn samplerate_string(samplerate: u64) -> String {
    si_string_u64(samplerate, "Hz")
}

/// Build the device that stands in for a recorded capture: `channels` logic
/// probes behind a [`StaticDriver`].
pub fn build_device(input: &InputSettings) -> DeviceInstance {
    let driver = StaticDriver {
        samplerate: input.samplerate,
    };
    let mut device = DeviceInstance::new(0, DeviceStatus::Active, None, Some("capture"), None)
        .with_driver(Box::new(driver));
    for index in 0..input.channels {
        device.add_channel(Channel::new(
            index,
            ChannelKind::Logic,
            true,
            &input.channel_name(index),
        ));
    }
    device
}

/// Apply the enable selection from the settings through the device layer.
pub fn configure_device(device: &mut DeviceInstance, input: &InputSettings) -> Result<()> {
    let indices: Vec<usize> = device.channels.iter().map(|ch| ch.index).collect();
    for index in indices {
        let state = input.enabled.is_enabled(index);
        device.channel_enable(index, state)?;
    }
    debug!(
        "{} of {} channels enabled",
        device.channels.iter().filter(|ch| ch.enabled).count(),
        device.channels.len()
    );
    Ok(())
}
