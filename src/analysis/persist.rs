//! Bundle persistence — versioned YAML/JSON documents for feature bundles.
//!
//! The in-memory bundle is converted to a flat document of plain records
//! (per-role maps and sparse matrices become lists) tagged with a schema
//! version. Readers accept any minor version of their major and refuse newer
//! majors with [`Error::SchemaTooNew`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::bundle::FeatureBundle;
use super::extract::DrumEvent;
use super::fingerprint::{BarFingerprint, RoleFingerprint};
use super::matrix::{BeatPositionMatrix, MatrixCell};
use super::stats::BarStats;
use crate::error::{Error, Result};
use crate::event::{BarContext, BarGrid};
use crate::groove::PercussionRole;

/// Schema version written by this build.
pub const SCHEMA_VERSION: &str = "1.0";
/// Highest major version this build reads.
pub const SUPPORTED_MAJOR: u32 = 1;

/// Document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Yaml,
    Json,
}

impl Encoding {
    /// `.json` files are JSON; everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Encoding::Json,
            _ => Encoding::Yaml,
        }
    }
}

/// One role's slice of a bar fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role: PercussionRole,
    pub mask: u64,
    pub velocities: Vec<u8>,
    pub count: usize,
}

/// A bar fingerprint as a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub bar: u32,
    pub hash: u64,
    pub roles: Vec<RoleRecord>,
}

/// A filled matrix slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub role: PercussionRole,
    pub bar: u32,
    pub slot: u32,
    pub velocity: u8,
    pub timing_offset: i64,
}

/// The stored shape of a feature bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleDocument {
    pub schema_version: String,
    pub resolution: u32,
    pub bars: Vec<BarContext>,
    pub active_roles: Vec<PercussionRole>,
    pub events: Vec<DrumEvent>,
    pub fingerprints: Vec<FingerprintRecord>,
    pub stats: Vec<BarStats>,
    pub matrix_cells: Vec<CellRecord>,
}

impl BundleDocument {
    pub fn from_bundle(bundle: &FeatureBundle) -> Self {
        let fingerprints = bundle
            .fingerprints
            .iter()
            .map(|fp| FingerprintRecord {
                bar: fp.bar,
                hash: fp.hash,
                roles: fp
                    .roles
                    .iter()
                    .map(|(role, r)| RoleRecord {
                        role: *role,
                        mask: r.mask,
                        velocities: r.velocities.clone(),
                        count: r.count,
                    })
                    .collect(),
            })
            .collect();
        let matrix_cells = bundle
            .matrices
            .values()
            .flat_map(|m| {
                m.cells().map(move |(bar, slot, cell)| CellRecord {
                    role: m.role,
                    bar,
                    slot,
                    velocity: cell.velocity,
                    timing_offset: cell.timing_offset,
                })
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            resolution: bundle.resolution,
            bars: bundle.grid.bars().to_vec(),
            active_roles: bundle.active_roles.iter().copied().collect(),
            events: bundle.events.clone(),
            fingerprints,
            stats: bundle.stats.clone(),
            matrix_cells,
        }
    }

    /// Rebuild the bundle, validating structure.
    pub fn into_bundle(self) -> Result<FeatureBundle> {
        check_version(&self.schema_version)?;
        let grid = BarGrid::new(self.bars).map_err(|e| Error::malformed(e.to_string()))?;
        if self.resolution == 0 {
            return Err(Error::malformed("zero grid resolution"));
        }
        if self.fingerprints.len() != grid.len() || self.stats.len() != grid.len() {
            return Err(Error::malformed(format!(
                "{} fingerprints and {} stats rows for {} bars",
                self.fingerprints.len(),
                self.stats.len(),
                grid.len()
            )));
        }

        let mut fingerprints = Vec::with_capacity(self.fingerprints.len());
        for record in self.fingerprints {
            let roles: BTreeMap<PercussionRole, RoleFingerprint> = record
                .roles
                .into_iter()
                .map(|r| {
                    (
                        r.role,
                        RoleFingerprint {
                            mask: r.mask,
                            velocities: r.velocities,
                            count: r.count,
                        },
                    )
                })
                .collect();
            let fp = BarFingerprint::new(record.bar, roles);
            if fp.hash != record.hash {
                return Err(Error::malformed(format!(
                    "pattern hash mismatch in bar {}",
                    record.bar
                )));
            }
            fingerprints.push(fp);
        }

        let first_bar = grid.bars().first().map(|b| b.number).unwrap_or(1);
        let mut matrices: BTreeMap<PercussionRole, BeatPositionMatrix> = BTreeMap::new();
        for cell in self.matrix_cells {
            let matrix = matrices.entry(cell.role).or_insert_with(|| {
                BeatPositionMatrix::new(cell.role, first_bar, grid.len(), self.resolution)
            });
            matrix
                .place(
                    cell.bar,
                    cell.slot,
                    MatrixCell {
                        velocity: cell.velocity,
                        timing_offset: cell.timing_offset,
                    },
                )
                .map_err(|e| Error::malformed(format!("matrix cell: {e}")))?;
        }

        Ok(FeatureBundle {
            resolution: self.resolution,
            grid,
            events: self.events,
            fingerprints,
            stats: self.stats,
            matrices,
            active_roles: self.active_roles.into_iter().collect::<BTreeSet<_>>(),
        })
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: String,
}

fn check_version(version: &str) -> Result<()> {
    let major = version
        .split('.')
        .next()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::malformed(format!("unreadable schema version '{version}'")))?;
    if major > SUPPORTED_MAJOR {
        return Err(Error::SchemaTooNew {
            found: version.to_string(),
            supported: SUPPORTED_MAJOR,
        });
    }
    if major < SUPPORTED_MAJOR {
        return Err(Error::malformed(format!("unsupported schema version '{version}'")));
    }
    Ok(())
}

/// Encode a bundle as a versioned document.
pub fn encode(bundle: &FeatureBundle, encoding: Encoding) -> Result<String> {
    let doc = BundleDocument::from_bundle(bundle);
    match encoding {
        Encoding::Yaml => serde_yaml::to_string(&doc).map_err(|e| Error::invalid(e.to_string())),
        Encoding::Json => {
            serde_json::to_string_pretty(&doc).map_err(|e| Error::invalid(e.to_string()))
        }
    }
}

/// Decode a document, checking the schema version before the body.
pub fn decode(text: &str, encoding: Encoding) -> Result<FeatureBundle> {
    let header: VersionHeader = match encoding {
        Encoding::Yaml => serde_yaml::from_str(text).map_err(|e| Error::malformed(e.to_string()))?,
        Encoding::Json => serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?,
    };
    check_version(&header.schema_version)?;
    let doc: BundleDocument = match encoding {
        Encoding::Yaml => serde_yaml::from_str(text).map_err(|e| Error::malformed(e.to_string()))?,
        Encoding::Json => serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?,
    };
    doc.into_bundle()
}

/// Write a bundle to `path`, choosing the encoding from the extension.
pub fn save_bundle(path: &Path, bundle: &FeatureBundle) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let doc = BundleDocument::from_bundle(bundle);
    let mut writer = BufWriter::new(File::create(path)?);
    match Encoding::from_path(path) {
        Encoding::Yaml => {
            serde_yaml::to_writer(&mut writer, &doc).map_err(|e| Error::invalid(e.to_string()))?
        }
        Encoding::Json => serde_json::to_writer_pretty(&mut writer, &doc)
            .map_err(|e| Error::invalid(e.to_string()))?,
    }
    writer.flush()?;
    log::debug!("saved feature bundle to {}", path.display());
    Ok(())
}

/// Read a bundle from `path`, choosing the encoding from the extension.
pub fn load_bundle(path: &Path) -> Result<FeatureBundle> {
    let text = std::fs::read_to_string(path)?;
    decode(&text, Encoding::from_path(path))
}
