//! GeoJSON FeatureCollection reading/writing
//!
//! The legacy `crs` member (`{"type": "name", "properties": {"name": ...}}`)
//! is read and written so the CRS survives round trips. A collection without
//! one is WGS84.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{GeoJson, JsonObject, JsonValue};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON file (FeatureCollection, Feature or bare Geometry)
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    debug!("reading GeoJSON {}", path.display());
    let text = std::fs::read_to_string(path)?;
    parse_geojson(&text)
}

/// Parse GeoJSON text
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(crs_member);
            let features = fc
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection { features, crs })
        }
        GeoJson::Feature(f) => Ok(FeatureCollection {
            features: vec![convert_feature(f)?],
            crs: None,
        }),
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g.value)?;
            Ok(FeatureCollection {
                features: vec![Feature::new(geometry)],
                crs: None,
            })
        }
    }
}

fn crs_member(members: &JsonObject) -> Option<CRS> {
    members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .and_then(CRS::parse)
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = f
        .geometry
        .map(|g| geo_types::Geometry::<f64>::try_from(g.value))
        .transpose()?;
    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, AttributeValue::from(v)))
        .collect();
    Ok(Feature {
        geometry,
        properties,
        id: f.id,
    })
}

/// Serialize a collection to GeoJSON text
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .features
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::from(v)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone(),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = collection.crs.as_ref().map(|crs| {
        let name = crs.urn().unwrap_or_else(|| crs.identifier());
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": name}}),
        );
        members
    });

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    Ok(GeoJson::FeatureCollection(fc).to_string())
}

/// Write a collection to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    debug!(
        "writing {} feature(s) to {}",
        collection.len(),
        path.display()
    );
    let text = to_geojson_string(collection)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(())
}
