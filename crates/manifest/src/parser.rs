// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest directory parsing

use cor_core::JobDefinition;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Errors from manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("validation failed for {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Raw manifest document, `apiVersion: v1`, `kind: Job`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    api_version: String,
    kind: String,
    metadata: RawMetadata,
    spec: RawSpec,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    id: Uuid,
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    // Annotations are accepted but carried nowhere; the authoring system owns
    // them.
    #[serde(default)]
    #[allow(dead_code)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpec {
    schedule: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    paused: Option<bool>,
}

/// Parses job manifests out of a directory tree
#[derive(Debug, Clone)]
pub struct Parser {
    manifest_dir: PathBuf,
}

impl Parser {
    pub fn new(manifest_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
        }
    }

    /// Parse a single manifest file, deriving the namespace from its location
    /// under the manifest root.
    pub fn parse_file(&self, path: &Path) -> Result<JobDefinition, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawManifest =
            serde_yaml::from_str(&text).map_err(|source| ManifestError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;

        validate(&raw).map_err(|reason| ManifestError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(JobDefinition {
            id: raw.metadata.id,
            name: raw.metadata.name,
            namespace: self.namespace_for(path),
            schedule: raw.spec.schedule,
            command: raw.spec.command,
            args: raw.spec.args,
            env: raw.spec.env,
            working_dir: raw.spec.working_dir,
            enabled: raw.spec.enabled.unwrap_or(true),
            paused: raw.spec.paused.unwrap_or(false),
            labels: raw.metadata.labels,
        })
    }

    /// Parse every `.yaml`/`.yml` file under the manifest root.
    ///
    /// A file that fails to parse or validate is logged and skipped — that
    /// one definition is simply absent from this pass. An unreadable root is
    /// an error: the caller skips the whole pass rather than treating desired
    /// state as empty.
    pub fn parse_all(&self) -> Result<Vec<JobDefinition>, ManifestError> {
        let mut paths = Vec::new();
        collect_manifests(&self.manifest_dir, &mut paths).map_err(|source| ManifestError::Io {
            path: self.manifest_dir.clone(),
            source,
        })?;
        paths.sort();

        let mut definitions = Vec::new();
        for path in paths {
            match self.parse_file(&path) {
                Ok(def) => definitions.push(def),
                Err(e) => warn!(error = %e, "skipping manifest"),
            }
        }
        Ok(definitions)
    }

    /// Namespace = first path component under the manifest root; `default`
    /// for files sitting directly in the root.
    fn namespace_for(&self, path: &Path) -> String {
        let rel = match path.strip_prefix(&self.manifest_dir) {
            Ok(rel) => rel,
            Err(_) => return "default".to_string(),
        };
        let mut components = rel.components();
        let first = components.next();
        if components.next().is_none() {
            // file directly in the root
            return "default".to_string();
        }
        match first {
            Some(c) => c.as_os_str().to_string_lossy().into_owned(),
            None => "default".to_string(),
        }
    }
}

fn validate(raw: &RawManifest) -> Result<(), String> {
    if raw.api_version != "v1" {
        return Err(format!("unsupported apiVersion: {}", raw.api_version));
    }
    if raw.kind != "Job" {
        return Err(format!("unsupported kind: {}", raw.kind));
    }
    if raw.metadata.name.is_empty() {
        return Err("metadata.name is required".to_string());
    }
    if raw.metadata.name.len() > 63 {
        return Err("metadata.name must be 63 characters or less".to_string());
    }
    if raw.spec.schedule.trim().is_empty() {
        return Err("spec.schedule is required".to_string());
    }
    if raw.spec.command.trim().is_empty() {
        return Err("spec.command is required".to_string());
    }
    Ok(())
}

fn collect_manifests(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for dirent in std::fs::read_dir(dir)? {
        let path = dirent?.path();
        if path.is_dir() {
            collect_manifests(&path, out)?;
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
