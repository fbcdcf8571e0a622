//! Design document providers
//!
//! A provider hands the engine a parsed [`DesignDocument`]. Retrieval
//! failures are reported as [`ProviderError`]; the synchronizer wraps them
//! into an invalid-design error before validation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

use super::catalog::KindCatalog;
use super::wire::{self, WireError};
use super::{DesignDocument, DesignKind, TenantId};

/// File name suffix of participant properties designs
const PARTICIPANT_PROPERTIES_FILE: &str = "ParticipantProperties";

/// Which design to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignRequest {
    pub tenant: TenantId,
    pub kind: DesignKind,
    /// Survey activity id, or the participant properties table name
    pub design: String,
    /// Required for surveys; participant properties carry their own version
    pub version: Option<String>,
}

impl DesignRequest {
    pub fn survey(
        tenant: impl Into<TenantId>,
        activity: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            kind: DesignKind::Survey,
            design: activity.into(),
            version: Some(version.into()),
        }
    }

    pub fn participant_properties(tenant: impl Into<TenantId>) -> Self {
        Self {
            tenant: tenant.into(),
            kind: DesignKind::ParticipantProperties,
            design: DesignKind::ParticipantProperties.default_table_name().to_string(),
            version: None,
        }
    }
}

/// Why a provider could not produce a design.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("design not found: {0}")]
    NotFound(String),

    #[error("survey design request for '{0}' has no version")]
    MissingVersion(String),

    #[error("unable to read design file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Source of design documents.
pub trait DesignProvider: Send + Sync {
    fn fetch(&self, request: &DesignRequest) -> Result<DesignDocument, ProviderError>;
}

/// Reads designs from a metadata drop directory.
///
/// Surveys live at `<dir>/<study>_<activity>_<version>.json`; participant
/// properties at `<dir>/<study>_ParticipantProperties.json`.
pub struct FileDesignProvider {
    dir: PathBuf,
    catalog: KindCatalog,
}

impl FileDesignProvider {
    pub fn new(dir: impl Into<PathBuf>, catalog: KindCatalog) -> Self {
        Self {
            dir: dir.into(),
            catalog,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file a request resolves to.
    pub fn path_for(&self, request: &DesignRequest) -> Result<PathBuf, ProviderError> {
        let file_name = match request.kind {
            DesignKind::Survey => {
                let version = request
                    .version
                    .as_deref()
                    .ok_or_else(|| ProviderError::MissingVersion(request.design.clone()))?;
                format!("{}_{}_{}.json", request.tenant, request.design, version)
            }
            DesignKind::ParticipantProperties => {
                format!("{}_{}.json", request.tenant, PARTICIPANT_PROPERTIES_FILE)
            }
        };
        Ok(self.dir.join(file_name))
    }
}

impl DesignProvider for FileDesignProvider {
    fn fetch(&self, request: &DesignRequest) -> Result<DesignDocument, ProviderError> {
        let path = self.path_for(request)?;
        if !path.exists() {
            return Err(ProviderError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;

        let document = match request.kind {
            DesignKind::Survey => wire::parse_survey(&content, &self.catalog)?,
            DesignKind::ParticipantProperties => {
                wire::parse_participant_properties(&content, &self.catalog)?
            }
        };
        Ok(document)
    }
}

/// In-memory provider holding pre-built documents.
#[derive(Default)]
pub struct MemoryDesignProvider {
    documents: RwLock<Vec<DesignDocument>>,
}

impl MemoryDesignProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document; later documents shadow earlier ones with the same identity.
    pub fn insert(&self, document: DesignDocument) {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        documents.push(document);
    }
}

impl DesignProvider for MemoryDesignProvider {
    fn fetch(&self, request: &DesignRequest) -> Result<DesignDocument, ProviderError> {
        let documents = self
            .documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        documents
            .iter()
            .rev()
            .find(|doc| {
                doc.tenant == request.tenant
                    && doc.kind == request.kind
                    && doc.name == request.design
                    && request.version.as_ref().map_or(true, |v| *v == doc.version)
            })
            .cloned()
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "{}/{}/{}@{}",
                    request.tenant,
                    request.kind,
                    request.design,
                    request.version.as_deref().unwrap_or("latest")
                ))
            })
    }
}
