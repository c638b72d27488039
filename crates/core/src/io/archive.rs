//! Archive-wrapped vector inputs
//!
//! Uploaded layers often arrive zipped. `resolve_vector_input` extracts a
//! `.zip` into a scoped temporary directory and points at the first GeoJSON
//! member; plain files pass through.

use crate::error::{Error, Result};
use crate::vector::FeatureCollection;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

const VECTOR_EXTENSIONS: [&str; 2] = ["geojson", "json"];

/// A vector file ready to read.
///
/// When extracted from an archive the temporary directory lives as long as
/// this value and is removed on drop.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was extracted from an archive
    pub fn is_extracted(&self) -> bool {
        self._scratch.is_some()
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Resolve a vector input path, unpacking `.zip` archives
pub fn resolve_vector_input<P: AsRef<Path>>(path: P) -> Result<ResolvedInput> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }

    if !has_extension(path, &["zip"]) {
        return Ok(ResolvedInput {
            path: path.to_path_buf(),
            _scratch: None,
        });
    }

    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))
        .map_err(|e| Error::Vector(format!("Failed to open ZIP archive: {}", e)))?;

    let scratch = tempfile::Builder::new().prefix("hydrorisk-").tempdir()?;
    archive
        .extract(scratch.path())
        .map_err(|e| Error::Vector(format!("Failed to extract ZIP archive: {}", e)))?;

    // Archive order decides which layer is used when several are present
    let names: Vec<PathBuf> = archive.file_names().map(PathBuf::from).collect();
    let member = match names.iter().find(|name| has_extension(name, &VECTOR_EXTENSIONS)) {
        Some(name) => name.clone(),
        None if names.iter().any(|name| has_extension(name, &["shp"])) => {
            return Err(Error::Vector(format!(
                "{} holds a shapefile; only GeoJSON layers are read, convert it to .geojson first",
                path.display()
            )));
        }
        None => {
            return Err(Error::Vector(format!(
                "No .geojson or .json layer found in {}",
                path.display()
            )));
        }
    };

    debug!("extracted {} from {}", member.display(), path.display());

    Ok(ResolvedInput {
        path: scratch.path().join(member),
        _scratch: Some(scratch),
    })
}

/// Read a vector layer, unpacking archives as needed
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let input = resolve_vector_input(path)?;
    super::read_geojson(input.path())
}
