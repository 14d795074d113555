//! Per-call BMX settings, stored as a 32-bit word in the stream header

use super::error::FormatError;

bitflags::bitflags! {
    /// Settings bits as stored on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SettingFlags: u32 {
        /// Body is compressed (reserved, no algorithm is defined yet)
        const COMPRESSION = 0b0000_0001;
    }
}

/// A single feature flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Compression,
}

impl Setting {
    pub const ALL: [Setting; 1] = [Setting::Compression];

    #[inline]
    pub fn flag(self) -> SettingFlags {
        match self {
            Setting::Compression => SettingFlags::COMPRESSION,
        }
    }

    /// Whether the flag is part of `Settings::default()`
    pub fn is_enabled_by_default(self) -> bool {
        match self {
            Setting::Compression => false,
        }
    }
}

/// Flag set for one encode or decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Settings {
    flags: SettingFlags,
}

impl Settings {
    /// Settings with no flag set
    pub fn empty() -> Self {
        Settings {
            flags: SettingFlags::empty(),
        }
    }

    pub fn set(&mut self, setting: Setting) {
        self.flags.insert(setting.flag());
    }

    pub fn unset(&mut self, setting: Setting) {
        self.flags.remove(setting.flag());
    }

    pub fn is_set(&self, setting: Setting) -> bool {
        self.flags.contains(setting.flag())
    }

    /// Packed form for the stream header
    #[inline]
    pub fn storage_value(&self) -> u32 {
        self.flags.bits()
    }

    /// Rebuild settings from a packed value, dropping unknown bits
    pub fn from_storage_value(value: u32) -> Self {
        Settings {
            flags: SettingFlags::from_bits_truncate(value),
        }
    }

    /// Rebuild settings read from a stream header
    ///
    /// Unknown bits may change the body layout and a compressed body cannot
    /// be read, so both are rejected.
    pub fn from_wire(value: u32) -> Result<Self, FormatError> {
        let settings = SettingFlags::from_bits(value)
            .map(|flags| Settings { flags })
            .ok_or(FormatError::UnsupportedSettings(value))?;
        settings.ensure_supported()?;
        Ok(settings)
    }

    /// Fail if a flag is set that this codec cannot honour
    pub fn ensure_supported(&self) -> Result<(), FormatError> {
        if self.is_set(Setting::Compression) {
            return Err(FormatError::UnsupportedSettings(self.storage_value()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Settings::empty();
        for setting in Setting::ALL {
            if setting.is_enabled_by_default() {
                settings.set(setting);
            }
        }
        settings
    }
}
