//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG codes of geographic (lon/lat degree) systems recognised by the engine.
const GEOGRAPHIC_EPSG: [u32; 5] = [4326, 4674, 4269, 4258, 4618];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse an authority identifier.
    ///
    /// Accepts `EPSG:31983`, `epsg:4326`, `urn:ogc:def:crs:EPSG::31983`
    /// and `urn:ogc:def:crs:OGC:1.3:CRS84` (mapped to EPSG:4326). Anything
    /// else that looks like WKT is kept verbatim.
    pub fn parse(identifier: &str) -> Option<Self> {
        let s = identifier.trim();
        if s.ends_with("CRS84") {
            return Some(Self::wgs84());
        }
        let upper = s.to_ascii_uppercase();
        if let Some(idx) = upper.rfind("EPSG:") {
            let code = upper[idx + 5..].trim_start_matches(':');
            return code.parse().ok().map(Self::from_epsg);
        }
        if upper.starts_with("GEOGCS") || upper.starts_with("PROJCS") || upper.starts_with("GEOGCRS") {
            return Some(Self::from_wkt(s));
        }
        None
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return GEOGRAPHIC_EPSG.contains(&code);
        }
        self.wkt
            .as_deref()
            .map(|w| {
                let w = w.trim_start().to_ascii_uppercase();
                w.starts_with("GEOGCS") || w.starts_with("GEOGCRS")
            })
            .unwrap_or(false)
    }

    /// UTM zone and hemisphere (`true` = north) for WGS84 and SIRGAS 2000 UTM codes.
    ///
    /// - EPSG 326xx / 327xx → WGS84 UTM north / south
    /// - EPSG 31978..=31985 → SIRGAS 2000 UTM zones 18S..25S
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        let code = self.epsg?;
        match code {
            32601..=32660 => Some((code - 32600, true)),
            32701..=32760 => Some((code - 32700, false)),
            31978..=31985 => Some((code - 31960, false)),
            _ => None,
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison is the best we can do without a projection database
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// OGC URN used in the GeoJSON `crs` member
    pub fn urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
