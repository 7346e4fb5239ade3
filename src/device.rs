use crate::{Error, Result};
use log::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChannelKind {
    Logic,
    Analog,
}

/// One probe of a device. `index` is the bit position within a packed sample.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Channel {
    pub index: usize,
    pub kind: ChannelKind,
    pub enabled: bool,
    pub name: String,
    pub trigger: Option<String>,
}

impl Channel {
    pub fn new(index: usize, kind: ChannelKind, enabled: bool, name: &str) -> Self {
        Self {
            index,
            kind,
            enabled,
            name: name.to_string(),
            trigger: None,
        }
    }

    pub fn logic(index: usize, name: &str) -> Self {
        Self::new(index, ChannelKind::Logic, true, name)
    }
}

/// Which channel property a driver is asked to apply.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChannelSetting {
    Enabled,
    Trigger,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConfigKey {
    Samplerate,
}

/// Capabilities a driver exposes to the device layer.
///
/// Every method has a default so a driver only implements what its hardware
/// supports.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    fn samplerate(&self) -> Option<u64> {
        None
    }

    fn device_options(&self) -> Option<Vec<ConfigKey>> {
        None
    }

    fn config_channel_set(&self, _channel: &Channel, _setting: ChannelSetting) -> Result<()> {
        Ok(())
    }
}

/// Driver for captures that were recorded elsewhere, e.g. loaded from a file.
#[derive(Clone, Debug, Default)]
pub struct StaticDriver {
    pub samplerate: Option<u64>,
}

impl Driver for StaticDriver {
    fn name(&self) -> &str {
        "static"
    }

    fn samplerate(&self) -> Option<u64> {
        self.samplerate
    }

    fn device_options(&self) -> Option<Vec<ConfigKey>> {
        self.samplerate.map(|_| vec![ConfigKey::Samplerate])
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeviceStatus {
    NotFound,
    Found,
    Inactive,
    Active,
}

pub struct DeviceInstance {
    pub index: usize,
    pub status: DeviceStatus,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub channels: Vec<Channel>,
    driver: Option<Box<dyn Driver>>,
}

impl DeviceInstance {
    pub fn new(
        index: usize,
        status: DeviceStatus,
        vendor: Option<&str>,
        model: Option<&str>,
        version: Option<&str>,
    ) -> Self {
        Self {
            index,
            status,
            vendor: vendor.map(str::to_string),
            model: model.map(str::to_string),
            version: version.map(str::to_string),
            channels: Vec::new(),
            driver: None,
        }
    }

    pub fn with_driver(mut self, driver: Box<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn add_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn samplerate(&self) -> Option<u64> {
        self.driver.as_ref().and_then(|d| d.samplerate())
    }

    pub fn has_option(&self, key: ConfigKey) -> bool {
        self.driver
            .as_ref()
            .and_then(|d| d.device_options())
            .is_some_and(|opts| opts.contains(&key))
    }

    fn position(&self, index: usize) -> Result<usize> {
        self.channels
            .iter()
            .position(|ch| ch.index == index)
            .ok_or_else(|| Error::arg(format!("no channel with index {index}")))
    }

    pub fn channel_name_set(&mut self, index: usize, name: &str) -> Result<()> {
        let pos = self.position(index)?;
        self.channels[pos].name = name.to_string();
        Ok(())
    }

    /// Enable or disable a channel. If the driver rejects the change the
    /// previous state is restored and the driver's error is returned.
    pub fn channel_enable(&mut self, index: usize, state: bool) -> Result<()> {
        let pos = self.position(index)?;
        let was_enabled = self.channels[pos].enabled;
        if was_enabled == state {
            return Ok(());
        }
        self.channels[pos].enabled = state;

        if let Some(driver) = &self.driver {
            if let Err(e) = driver.config_channel_set(&self.channels[pos], ChannelSetting::Enabled)
            {
                debug!("{}: rolling back enable of channel {index}: {e}", driver.name());
                self.channels[pos].enabled = was_enabled;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Set or clear the trigger condition of a channel, with the same
    /// rollback rule as [`DeviceInstance::channel_enable`].
    pub fn trigger_set(&mut self, index: usize, trigger: Option<&str>) -> Result<()> {
        let pos = self.position(index)?;
        if self.channels[pos].trigger.as_deref() == trigger {
            return Ok(());
        }
        let old_trigger = std::mem::replace(
            &mut self.channels[pos].trigger,
            trigger.map(str::to_string),
        );

        if let Some(driver) = &self.driver {
            if let Err(e) = driver.config_channel_set(&self.channels[pos], ChannelSetting::Trigger)
            {
                debug!("{}: rolling back trigger of channel {index}: {e}", driver.name());
                self.channels[pos].trigger = old_trigger;
                return Err(e);
            }
        }
        Ok(())
    }
}
