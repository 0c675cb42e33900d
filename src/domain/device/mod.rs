//! Device domain - coarse device classification used for cache variance

mod classifier;

pub use classifier::{
    CDN_DESKTOP_HEADER, CDN_MOBILE_HEADER, CDN_TABLET_HEADER, DEFAULT_OVERRIDE_PARAM,
    DeviceClassifier,
};

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Device bucket a request is rendered and cached for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    #[default]
    Desktop,
    Phone,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "DESKTOP",
            DeviceType::Phone => "PHONE",
            DeviceType::Tablet => "TABLET",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DESKTOP" => Ok(DeviceType::Desktop),
            "PHONE" => Ok(DeviceType::Phone),
            "TABLET" => Ok(DeviceType::Tablet),
            _ => Err(DomainError::validation(format!(
                "Unknown device type: {}. Valid types: DESKTOP, PHONE, TABLET",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_from_str_is_case_insensitive() {
        assert_eq!("tablet".parse::<DeviceType>().unwrap(), DeviceType::Tablet);
        assert_eq!("Phone".parse::<DeviceType>().unwrap(), DeviceType::Phone);
        assert_eq!("DESKTOP".parse::<DeviceType>().unwrap(), DeviceType::Desktop);
        assert!("watch".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(DeviceType::Tablet.to_string(), "TABLET");
        assert_eq!(DeviceType::default(), DeviceType::Desktop);
    }
}
