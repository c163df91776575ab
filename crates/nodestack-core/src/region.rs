//! Target regions and machine image selection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Regions the stack can be deployed to.
///
/// The set is closed: a region without an entry here has no image mapping
/// and the build refuses it with [`ConfigError::UnsupportedRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    /// US East (N. Virginia).
    #[serde(rename = "us-east-1")]
    UsEast1,
    /// US West (N. California).
    #[serde(rename = "us-west-1")]
    UsWest1,
}

impl Region {
    /// Every supported region.
    pub const ALL: [Region; 2] = [Region::UsEast1, Region::UsWest1];

    /// Get the region code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::UsEast1 => "us-east-1",
            Region::UsWest1 => "us-west-1",
        }
    }

    /// Codes of every supported region.
    pub fn supported() -> Vec<String> {
        Self::ALL.iter().map(|r| r.as_str().to_string()).collect()
    }

    fn unsupported(region: &str) -> ConfigError {
        ConfigError::UnsupportedRegion {
            region: region.to_string(),
            supported: Self::supported(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Self::unsupported(s))
    }
}

/// A generic Linux machine image, expressed as a region to image-id mapping.
///
/// # Example
///
/// ```
/// use nodestack_core::{MachineImage, Region};
///
/// let image = MachineImage::for_region(Region::UsEast1, "ami-1234");
/// assert_eq!(image.resolve(Region::UsEast1).unwrap(), "ami-1234");
/// assert!(image.resolve(Region::UsWest1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineImage {
    images: BTreeMap<Region, String>,
}

impl MachineImage {
    /// Create a mapping from explicit region/image pairs.
    pub fn generic_linux(images: impl IntoIterator<Item = (Region, String)>) -> Self {
        Self {
            images: images.into_iter().collect(),
        }
    }

    /// Create a mapping with a single entry for the target region.
    pub fn for_region(region: Region, image_id: impl Into<String>) -> Self {
        Self::generic_linux([(region, image_id.into())])
    }

    /// Resolve the image id for a region.
    pub fn resolve(&self, region: Region) -> ConfigResult<&str> {
        self.images
            .get(&region)
            .map(String::as_str)
            .ok_or_else(|| Region::unsupported(region.as_str()))
    }

    /// Regions with a mapping.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.images.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_regions() {
        assert_eq!("us-east-1".parse::<Region>().unwrap(), Region::UsEast1);
        assert_eq!("us-west-1".parse::<Region>().unwrap(), Region::UsWest1);
    }

    #[test]
    fn test_parse_unsupported_region() {
        let err = "eu-west-1".parse::<Region>().unwrap_err();
        match err {
            ConfigError::UnsupportedRegion { region, supported } => {
                assert_eq!(region, "eu-west-1");
                assert_eq!(supported, vec!["us-east-1", "us-west-1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_region_codes_are_case_sensitive() {
        assert!("US-EAST-1".parse::<Region>().is_err());
        assert!("".parse::<Region>().is_err());
    }

    #[test]
    fn test_image_resolves_for_every_supported_region() {
        for region in Region::ALL {
            let image = MachineImage::for_region(region, format!("ami-{}", region));
            assert_eq!(image.resolve(region).unwrap(), format!("ami-{}", region));
        }
    }

    #[test]
    fn test_image_missing_region() {
        let image = MachineImage::for_region(Region::UsWest1, "ami-west");
        assert!(matches!(
            image.resolve(Region::UsEast1),
            Err(ConfigError::UnsupportedRegion { .. })
        ));
        assert_eq!(image.regions().collect::<Vec<_>>(), vec![Region::UsWest1]);
    }
}
