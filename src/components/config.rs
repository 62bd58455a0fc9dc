use bitflags::bitflags;
use log::info;
use thiserror::Error;

use crate::parameters::{self, ParameterMap};

pub const DEFAULT_FRAME_ID: &str = "gps";
pub const DEFAULT_RATE_HZ: f64 = 4.0;
pub const DEFAULT_NAV_RATE: u8 = 1;

/// Slowest rate whose measurement period still fits the receiver's u16 [ms] field
pub const MIN_RATE_HZ: f64 = 1000.0 / u16::MAX as f64;
/// Fastest rate with a non-zero measurement period
pub const MAX_RATE_HZ: f64 = 1000.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid settings: {flag} is true, therefore {field} must be set")]
    MissingDependent { flag: String, field: String },

    #[error("Setting '{path}' = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        path: String,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error(
        "Invalid measurement rate {rate} Hz, must be within [{min:.4}, {max}]",
        min = MIN_RATE_HZ,
        max = MAX_RATE_HZ
    )]
    InvalidRate { rate: f64 },

    #[error(transparent)]
    Parameter(#[from] parameters::Error),
}

bitflags! {
    /// NMEA output filter (CFG-NMEA `filter`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NmeaFilter: u8 {
        /// Output positions flagged invalid
        const POS = 0x01;
        /// Output masked positions
        const MSK_POS = 0x02;
        /// Output invalid times
        const TIME = 0x04;
        /// Output invalid dates
        const DATE = 0x08;
        /// Restrict output to GPS satellites only (SBAS filter)
        const SBAS = 0x10;
        /// Output heading even when not moving
        const TRACK = 0x20;
    }
}

bitflags! {
    /// NMEA mode flags (CFG-NMEA `flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NmeaFlags: u8 {
        const COMPAT = 0x01;
        const CONSIDER = 0x02;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NmeaConfig {
    pub version: u8,
    pub num_sv: u8,
    pub filter: NmeaFilter,
    pub flags: NmeaFlags,
}

impl NmeaConfig {
    /// Filter and flag bits packed in one word, flags in the high byte.
    pub fn mask(&self) -> u16 {
        ((self.flags.bits() as u16) << 8) | self.filter.bits() as u16
    }
}

/// Which raw reports are republished alongside the fused outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishToggles {
    pub nav_posllh: bool,
    pub nav_velned: bool,
    pub nav_sol: bool,
    pub nav_svinfo: bool,
    pub mon_hw: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpsConfig {
    pub frame_id: String,
    pub rate_hz: f64,
    pub nav_rate: u8,
    /// Present only when the alternate NMEA output is enabled (`nmea.set`)
    pub nmea: Option<NmeaConfig>,
    pub publish: PublishToggles,
}

impl Default for GpsConfig {
    fn default() -> Self {
        GpsConfig {
            frame_id: DEFAULT_FRAME_ID.to_string(),
            rate_hz: DEFAULT_RATE_HZ,
            nav_rate: DEFAULT_NAV_RATE,
            nmea: None,
            publish: PublishToggles::default(),
        }
    }
}

impl GpsConfig {
    /// Resolves the receiver settings from the `gps` map of the parameter tree.
    pub fn resolve(params: &ParameterMap) -> Result<GpsConfig, ConfigError> {
        let frame_id = match params.get_param_opt("frame_id")? {
            Some(p) => p.value_string()?,
            None => DEFAULT_FRAME_ID.to_string(),
        };

        let rate_hz = match params.get_param_opt("rate")? {
            Some(p) => p.value_float()?,
            None => DEFAULT_RATE_HZ,
        };
        if !(MIN_RATE_HZ..=MAX_RATE_HZ).contains(&rate_hz) {
            return Err(ConfigError::InvalidRate { rate: rate_hz });
        }

        let nav_rate = get_int_in_range(params, "nav_rate", 1, 127)?
            .map_or(DEFAULT_NAV_RATE, |v| v as u8);

        let nmea = if params.get_bool_or("nmea.set", false)? {
            Some(resolve_nmea(params)?)
        } else {
            None
        };

        let publish = PublishToggles {
            nav_posllh: params.get_bool_or("publish.nav.posllh", false)?,
            nav_velned: params.get_bool_or("publish.nav.velned", false)?,
            nav_sol: params.get_bool_or("publish.nav.sol", false)?,
            nav_svinfo: params.get_bool_or("publish.nav.svinfo", false)?,
            mon_hw: params.get_bool_or("publish.mon.hw", false)?,
        };

        let config = GpsConfig {
            frame_id,
            rate_hz,
            nav_rate,
            nmea,
            publish,
        };

        info!(
            "Resolved gps config: frame '{}', rate {:.2} Hz, nav rate {}",
            config.frame_id, config.rate_hz, config.nav_rate
        );
        if let Some(nmea) = &config.nmea {
            info!(
                "NMEA output enabled: version {:#04x}, min SVs {}, mask {:#06x}",
                nmea.version,
                nmea.num_sv,
                nmea.mask()
            );
        }

        Ok(config)
    }

    /// Measurement period [ms]
    pub fn meas_rate_ms(&self) -> u16 {
        (1000.0 / self.rate_hz) as u16
    }

    /// Expected rate of position fixes [Hz]
    pub fn fix_frequency_hz(&self) -> f64 {
        self.rate_hz / self.nav_rate as f64
    }
}

fn resolve_nmea(params: &ParameterMap) -> Result<NmeaConfig, ConfigError> {
    let required = |field: &str| -> Result<u8, ConfigError> {
        get_int_in_range(params, field, 0, u8::MAX as i64)?
            .map(|v| v as u8)
            .ok_or_else(|| ConfigError::MissingDependent {
                flag: "nmea.set".to_string(),
                field: field.to_string(),
            })
    };

    let version = required("nmea.version")?;
    let num_sv = required("nmea.num_sv")?;

    let mut flags = NmeaFlags::empty();
    for (key, bit) in [
        ("nmea.compat", NmeaFlags::COMPAT),
        ("nmea.consider", NmeaFlags::CONSIDER),
    ] {
        flags.set(bit, params.get_bool_or(key, false)?);
    }

    let mut filter = NmeaFilter::empty();
    for (key, bit) in [
        ("nmea.filter.pos", NmeaFilter::POS),
        ("nmea.filter.msk_pos", NmeaFilter::MSK_POS),
        ("nmea.filter.time", NmeaFilter::TIME),
        ("nmea.filter.date", NmeaFilter::DATE),
        ("nmea.filter.sbas", NmeaFilter::SBAS),
        ("nmea.filter.track", NmeaFilter::TRACK),
    ] {
        filter.set(bit, params.get_bool_or(key, false)?);
    }

    Ok(NmeaConfig {
        version,
        num_sv,
        filter,
        flags,
    })
}

fn get_int_in_range(
    params: &ParameterMap,
    rel_path: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, ConfigError> {
    let Some(param) = params.get_param_opt(rel_path)? else {
        return Ok(None);
    };

    let value = param.value_int()?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            path: param.path().to_string(),
            min,
            max,
            value,
        });
    }

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parameters::parse_string;

    fn resolve(toml: &str) -> Result<GpsConfig, ConfigError> {
        let params = parse_string(toml.to_string()).unwrap();
        let empty = ParameterMap::default();
        let gps = params.get_map("gps").unwrap_or(&empty);
        GpsConfig::resolve(gps)
    }

    #[test]
    fn test_defaults() {
        let config = resolve("").unwrap();

        assert_eq!(config, GpsConfig::default());
        assert_eq!(config.frame_id, "gps");
        assert_eq!(config.nmea, None);
        assert_eq!(config.publish, PublishToggles::default());
        assert_eq!(config.meas_rate_ms(), 250);
        assert_eq!(config.fix_frequency_hz(), 4.0);
    }

    #[test]
    fn test_nmea_full() {
        let config = resolve(
            "
            [gps.nmea]
            set = { val = true, type = \"bool\" }
            version = { val = 35, type = \"int\" }
            num_sv = { val = 8, type = \"int\" }
            compat = { val = true, type = \"bool\" }
            consider = { val = false, type = \"bool\" }

            [gps.nmea.filter]
            pos = { val = true, type = \"bool\" }
            date = { val = true, type = \"bool\" }
            track = { val = true, type = \"bool\" }
            ",
        )
        .unwrap();

        let nmea = config.nmea.unwrap();
        assert_eq!(nmea.version, 35);
        assert_eq!(nmea.num_sv, 8);
        assert_eq!(nmea.flags, NmeaFlags::COMPAT);
        assert_eq!(nmea.filter, NmeaFilter::POS | NmeaFilter::DATE | NmeaFilter::TRACK);
        assert_eq!(nmea.mask(), 0x0129);
    }

    #[test]
    fn test_each_filter_bit() {
        let keys = [
            ("pos", NmeaFilter::POS),
            ("msk_pos", NmeaFilter::MSK_POS),
            ("time", NmeaFilter::TIME),
            ("date", NmeaFilter::DATE),
            ("sbas", NmeaFilter::SBAS),
            ("track", NmeaFilter::TRACK),
        ];

        for (key, bit) in keys {
            let config = resolve(&format!(
                "
                [gps.nmea]
                set = {{ val = true, type = \"bool\" }}
                version = {{ val = 35, type = \"int\" }}
                num_sv = {{ val = 0, type = \"int\" }}
                [gps.nmea.filter]
                {key} = {{ val = true, type = \"bool\" }}
                "
            ))
            .unwrap();

            assert_eq!(config.nmea.unwrap().filter, bit);
        }
    }

    #[test]
    fn test_each_flag_bit() {
        for (key, bit, mask) in [
            ("compat", NmeaFlags::COMPAT, 0x0100),
            ("consider", NmeaFlags::CONSIDER, 0x0200),
        ] {
            let config = resolve(&format!(
                "
                [gps.nmea]
                set = {{ val = true, type = \"bool\" }}
                version = {{ val = 35, type = \"int\" }}
                num_sv = {{ val = 0, type = \"int\" }}
                {key} = {{ val = true, type = \"bool\" }}
                "
            ))
            .unwrap();

            let nmea = config.nmea.unwrap();
            assert_eq!(nmea.flags, bit);
            assert_eq!(nmea.filter, NmeaFilter::empty());
            assert_eq!(nmea.mask(), mask);
        }
    }

    #[test]
    fn test_missing_version() {
        let err = resolve(
            "
            [gps.nmea]
            set = { val = true, type = \"bool\" }
            num_sv = { val = 8, type = \"int\" }
            ",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::MissingDependent {
                flag: "nmea.set".to_string(),
                field: "nmea.version".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "Invalid settings: nmea.set is true, therefore nmea.version must be set"
        );
    }

    #[test]
    fn test_missing_num_sv() {
        let err = resolve(
            "
            [gps.nmea]
            set = { val = true, type = \"bool\" }
            version = { val = 35, type = \"int\" }
            ",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::MissingDependent {
                flag: "nmea.set".to_string(),
                field: "nmea.num_sv".to_string()
            }
        );
    }

    #[test]
    fn test_dependents_ignored_when_not_set() {
        for set in ["", "set = { val = false, type = \"bool\" }"] {
            let config = resolve(&format!(
                "
                [gps.nmea]
                {set}
                compat = {{ val = true, type = \"bool\" }}
                "
            ))
            .unwrap();

            assert_eq!(config.nmea, None);
        }
    }

    #[test]
    fn test_publish_toggles_independent() {
        let config = resolve(
            "
            [gps.publish.nav]
            velned = { val = true, type = \"bool\" }
            [gps.publish.mon]
            hw = { val = true, type = \"bool\" }
            ",
        )
        .unwrap();

        assert_eq!(
            config.publish,
            PublishToggles {
                nav_posllh: false,
                nav_velned: true,
                nav_sol: false,
                nav_svinfo: false,
                mon_hw: true,
            }
        );
    }

    #[test]
    fn test_each_publish_toggle() {
        let toggles: [(&str, fn(&PublishToggles) -> bool); 5] = [
            ("nav.posllh", |p| p.nav_posllh),
            ("nav.velned", |p| p.nav_velned),
            ("nav.sol", |p| p.nav_sol),
            ("nav.svinfo", |p| p.nav_svinfo),
            ("mon.hw", |p| p.mon_hw),
        ];

        for (key, _) in toggles {
            let config = resolve(&format!(
                "
                [gps.publish]
                {key} = {{ val = true, type = \"bool\" }}
                "
            ))
            .unwrap();

            for (other, other_field) in toggles {
                assert_eq!(other_field(&config.publish), other == key, "{key} set, {other} read");
            }
        }
    }

    #[test]
    fn test_rate_bounds() {
        let rate = |val: f64| {
            resolve(&format!(
                "
                [gps]
                rate = {{ val = {val:?}, type = \"float\" }}
                "
            ))
        };

        assert_eq!(rate(0.0001), Err(ConfigError::InvalidRate { rate: 0.0001 }));
        assert_eq!(rate(2000.0), Err(ConfigError::InvalidRate { rate: 2000.0 }));
        assert_eq!(rate(-4.0), Err(ConfigError::InvalidRate { rate: -4.0 }));

        assert_eq!(rate(1000.0).unwrap().meas_rate_ms(), 1);
        assert_eq!(rate(0.5).unwrap().meas_rate_ms(), 2000);
    }

    #[test]
    fn test_rates() {
        let config = resolve(
            "
            [gps]
            frame_id = { val = \"antenna\", type = \"str\" }
            rate = { val = 10, type = \"int\" }
            nav_rate = { val = 2, type = \"int\" }
            ",
        )
        .unwrap();

        assert_eq!(config.frame_id, "antenna");
        assert_eq!(config.meas_rate_ms(), 100);
        assert_eq!(config.fix_frequency_hz(), 5.0);

        let err = resolve(
            "
            [gps]
            rate = { val = 0.0, type = \"float\" }
            ",
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidRate { rate: 0.0 });
    }

    #[test]
    fn test_out_of_range() {
        let err = resolve(
            "
            [gps.nmea]
            set = { val = true, type = \"bool\" }
            version = { val = 300, type = \"int\" }
            num_sv = { val = 8, type = \"int\" }
            ",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::OutOfRange {
                path: ".gps.nmea.version".to_string(),
                min: 0,
                max: 255,
                value: 300
            }
        );
    }

    #[test]
    fn test_bad_type() {
        let err = resolve(
            "
            [gps.nmea]
            set = { val = 1, type = \"int\" }
            ",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Parameter(parameters::Error::BadCast {
                path: ".gps.nmea.set".to_string(),
                dtype: "bool".to_string()
            })
        );
    }
}
