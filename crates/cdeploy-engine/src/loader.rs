//! manifest loading with include support.

use crate::decode_desired;
use crate::types::Resource;
use anyhow::{anyhow, Context, Result};
use cdeploy_core::schema::{DELIVERY_PIPELINE, TARGET};
use cdeploy_core::{validate_document, ResourceSchema};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// raw on-disk representation for a manifest file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    delivery_pipelines: Vec<Value>,
    #[serde(default)]
    targets: Vec<Value>,
}

/// where a document was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub collection: &'static str,
    pub index: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]",
            self.file.display(),
            self.collection,
            self.index
        )
    }
}

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub source: SourceLocation,
    pub document: Value,
}

/// documents collected from a manifest and its includes.
#[derive(Debug, Default, Clone)]
pub struct Manifest {
    pub delivery_pipelines: Vec<ManifestEntry>,
    pub targets: Vec<ManifestEntry>,
}

impl Manifest {
    /// entries declared for the given kind.
    pub fn entries(&self, schema: &ResourceSchema) -> &[ManifestEntry] {
        if schema.collection == TARGET.collection {
            &self.targets
        } else {
            &self.delivery_pipelines
        }
    }

    /// decode every entry of kind `R`.
    pub fn resources<R: Resource>(&self) -> Result<Vec<R>> {
        self.entries(R::schema())
            .iter()
            .map(|entry| {
                decode_desired::<R>(&entry.document).with_context(|| entry.source.to_string())
            })
            .collect()
    }
}

/// load a manifest (yaml or json), merge includes and validate every document.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest> {
    let mut visited = BTreeSet::new();
    let mut manifest = Manifest::default();
    load_recursive(path.as_ref(), &mut visited, &mut manifest)?;
    validate_with_sources(&manifest)?;
    Ok(manifest)
}

/// recursive loader with cycle-safe include handling.
fn load_recursive(
    path: &Path,
    visited: &mut BTreeSet<PathBuf>,
    manifest: &mut Manifest,
) -> Result<()> {
    let canonical =
        fs::canonicalize(path).with_context(|| format!("load manifest: {}", path.display()))?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let content = fs::read_to_string(&canonical)
        .with_context(|| format!("read manifest: {}", canonical.display()))?;
    let file: ManifestFile = if canonical.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("parse json: {}", canonical.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("parse yaml: {}", canonical.display()))?
    };

    let base = canonical
        .parent()
        .ok_or_else(|| anyhow!("missing parent dir for {}", canonical.display()))?;
    for entry in &file.include {
        load_recursive(&base.join(entry), visited, manifest)?;
    }

    let defaults = Defaults {
        project: file.project.as_deref(),
        location: file.location.as_deref(),
    };
    for (index, document) in file.delivery_pipelines.into_iter().enumerate() {
        manifest.delivery_pipelines.push(ManifestEntry {
            source: SourceLocation {
                file: canonical.clone(),
                collection: DELIVERY_PIPELINE.collection,
                index,
            },
            document: defaults.apply(document),
        });
    }
    for (index, document) in file.targets.into_iter().enumerate() {
        manifest.targets.push(ManifestEntry {
            source: SourceLocation {
                file: canonical.clone(),
                collection: TARGET.collection,
                index,
            },
            document: defaults.apply(document),
        });
    }

    Ok(())
}

/// file-level `project` and `location`, applied to documents that omit them.
struct Defaults<'a> {
    project: Option<&'a str>,
    location: Option<&'a str>,
}

impl Defaults<'_> {
    fn apply(&self, mut document: Value) -> Value {
        if let Value::Object(map) = &mut document {
            for (key, value) in [("project", self.project), ("location", self.location)] {
                if let Some(value) = value {
                    map.entry(key)
                        .or_insert_with(|| Value::String(value.to_string()));
                }
            }
        }
        document
    }
}

fn validate_with_sources(manifest: &Manifest) -> Result<()> {
    let mut message = String::new();
    for schema in [&DELIVERY_PIPELINE, &TARGET] {
        for entry in manifest.entries(schema) {
            let report = validate_document(&entry.document, schema);
            for error in &report.errors {
                message.push_str(&format!("- {}: {error}\n", entry.source));
            }
        }
    }
    if message.is_empty() {
        return Ok(());
    }
    Err(anyhow!("validation failed:\n{message}"))
}
