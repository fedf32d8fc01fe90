/// Beach registry for the Saint-Barthélemy sargassum risk service.
///
/// Defines the canonical list of monitored beaches with their WGS84 centers
/// and influence radii. The radius is the bandwidth of the local (imminent
/// arrival) score, so every entry must have `radius_km > 0`.
///
/// The built-in catalogue can be replaced by a TOML file with the same
/// fields (see `beaches.toml`). Either way the list is validated once at
/// startup and is read-only afterwards.

use crate::model::{Beach, ConfigError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Built-in catalogue
// ---------------------------------------------------------------------------

/// Static metadata for a single beach.
pub struct BeachSite {
    pub name: &'static str,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Influence radius in km; bandwidth of the local score.
    pub radius_km: f64,
}

/// Monitored beaches, roughly west to east along the island.
pub static BEACH_SITES: &[BeachSite] = &[
    BeachSite {
        name: "Flamands",
        latitude: 17.9067,
        longitude: -62.8467,
        radius_km: 3.0,
    },
    BeachSite {
        name: "Colombier",
        latitude: 17.9033,
        longitude: -62.8600,
        radius_km: 2.0,
    },
    BeachSite {
        name: "Saint-Jean",
        latitude: 17.9000,
        longitude: -62.8267,
        radius_km: 4.0,
    },
    BeachSite {
        name: "Lorient",
        latitude: 17.9000,
        longitude: -62.8100,
        radius_km: 3.0,
    },
    BeachSite {
        name: "Grand_Cul-de-Sac",
        latitude: 17.9117,
        longitude: -62.7917,
        radius_km: 3.0,
    },
    BeachSite {
        name: "Petit_Cul-de-Sac",
        latitude: 17.9067,
        longitude: -62.7967,
        radius_km: 2.0,
    },
    BeachSite {
        name: "Toiny",
        latitude: 17.8933,
        longitude: -62.7817,
        radius_km: 2.0,
    },
    BeachSite {
        name: "Gouverneur",
        latitude: 17.8717,
        longitude: -62.8433,
        radius_km: 3.0,
    },
    BeachSite {
        name: "Grande_Saline",
        latitude: 17.8717,
        longitude: -62.8267,
        radius_km: 3.0,
    },
    BeachSite {
        name: "Marigot",
        latitude: 17.9033,
        longitude: -62.8067,
        radius_km: 2.0,
    },
];

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BeachFile {
    #[serde(default)]
    beaches: Vec<Beach>,
}

/// Validated, immutable list of beaches.
#[derive(Debug, Clone)]
pub struct BeachRegistry {
    beaches: Vec<Beach>,
}

impl BeachRegistry {
    /// Validates `beaches` and wraps them.
    pub fn new(beaches: Vec<Beach>) -> Result<Self, ConfigError> {
        validate(&beaches)?;
        Ok(BeachRegistry { beaches })
    }

    /// Registry built from `BEACH_SITES`.
    pub fn builtin() -> Result<Self, ConfigError> {
        let beaches = BEACH_SITES
            .iter()
            .map(|site| Beach {
                name: site.name.to_string(),
                lat: site.latitude,
                lon: site.longitude,
                radius_km: site.radius_km,
            })
            .collect();
        Self::new(beaches)
    }

    /// Parses a `[[beaches]]` TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: BeachFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(format!("beach registry: {}", e)))?;
        Self::new(file.beaches)
    }

    /// Loads a registry file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn list(&self) -> &[Beach] {
        &self.beaches
    }

    pub fn find(&self, name: &str) -> Option<&Beach> {
        self.beaches.iter().find(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.beaches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beaches.is_empty()
    }
}

fn validate(beaches: &[Beach]) -> Result<(), ConfigError> {
    if beaches.is_empty() {
        return Err(ConfigError::MissingBeaches);
    }

    let mut seen = HashSet::new();
    for beach in beaches {
        // NaN fails the `> 0.0` comparison as well.
        if !(beach.radius_km.is_finite() && beach.radius_km > 0.0) {
            return Err(ConfigError::InvalidRadius {
                beach: beach.name.clone(),
                radius_km: beach.radius_km,
            });
        }
        let lat_ok = beach.lat.is_finite() && (-90.0..=90.0).contains(&beach.lat);
        let lon_ok = beach.lon.is_finite() && (-180.0..=180.0).contains(&beach.lon);
        if !lat_ok || !lon_ok {
            return Err(ConfigError::InvalidCoordinates {
                beach: beach.name.clone(),
                lat: beach.lat,
                lon: beach.lon,
            });
        }
        if !seen.insert(beach.name.as_str()) {
            return Err(ConfigError::DuplicateBeach(beach.name.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
