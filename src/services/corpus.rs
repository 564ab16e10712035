use crate::core::connectivity::REFERENCE_POOL_ID;
use crate::core::figure::Role;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Directory does not exist: {path}")]
    MissingDirectory { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("No submissions found under {path}")]
    NoEntities { path: String },

    #[error("Submission id {id:?} is reserved for the reference pool ({path})")]
    ReservedId { id: String, path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The documents filed under one entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSet {
    pub entity_id: String,
    pub role: Role,
    pub documents: Vec<PathBuf>,
}

/// Submissions and references discovered for one run, ordered by entity id.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub submissions: Vec<DocumentSet>,
    pub references: Vec<DocumentSet>,
}

impl Corpus {
    /// Walk the submission and (optional) reference trees. Each document is filed under the
    /// name of the directory that contains it; reference ids get the `ref_` prefix.
    pub fn discover(
        input_dir: &Path,
        reference_dir: Option<&Path>,
        file_types: &[String],
    ) -> Result<Self, CorpusError> {
        validate_dir(input_dir)?;
        let submissions = walk(input_dir, Role::Submission, file_types);

        let references = match reference_dir {
            Some(dir) => {
                validate_dir(dir)?;
                walk(dir, Role::Reference, file_types)
            }
            None => Vec::new(),
        };

        Self::checked(input_dir, submissions, references)
    }

    /// Load an extraction staging area: every subdirectory is one entity, `ref_*` directories
    /// are references and keep their name as id.
    pub fn from_staging(dir: &Path, file_types: &[String]) -> Result<Self, CorpusError> {
        validate_dir(dir)?;

        let mut submissions = Vec::new();
        let mut references = Vec::new();

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        for entity_dir in entries {
            let Some(name) = entity_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let role = if name.starts_with(Role::Reference.id_prefix()) {
                Role::Reference
            } else {
                Role::Submission
            };

            let mut documents: Vec<PathBuf> = WalkDir::new(&entity_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .map(|entry| entry.into_path())
                .filter(|path| path.is_file() && has_extension(path, file_types))
                .collect();
            documents.sort();

            let set = DocumentSet {
                entity_id: name,
                role,
                documents,
            };
            match role {
                Role::Submission => submissions.push(set),
                Role::Reference => references.push(set),
            }
        }

        Self::checked(dir, submissions, references)
    }

    pub fn files_checked(&self) -> usize {
        self.submissions
            .iter()
            .chain(&self.references)
            .map(|set| set.documents.len())
            .sum()
    }

    fn checked(
        root: &Path,
        submissions: Vec<DocumentSet>,
        references: Vec<DocumentSet>,
    ) -> Result<Self, CorpusError> {
        if submissions.is_empty() {
            return Err(CorpusError::NoEntities {
                path: root.display().to_string(),
            });
        }
        if let Some(clash) = submissions
            .iter()
            .find(|set| set.entity_id == REFERENCE_POOL_ID)
        {
            let path = clash
                .documents
                .first()
                .and_then(|doc| doc.parent())
                .unwrap_or(root);
            return Err(CorpusError::ReservedId {
                id: clash.entity_id.clone(),
                path: path.display().to_string(),
            });
        }
        if references.is_empty() {
            log::warn!("No reference documents found; only submissions will be compared");
        }
        Ok(Self {
            submissions,
            references,
        })
    }
}

fn validate_dir(path: &Path) -> Result<(), CorpusError> {
    if !path.exists() {
        return Err(CorpusError::MissingDirectory {
            path: path.display().to_string(),
        });
    }
    if !path.is_dir() {
        return Err(CorpusError::NotADirectory {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn walk(root: &Path, role: Role, file_types: &[String]) -> Vec<DocumentSet> {
    let mut grouped: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() || !has_extension(path, file_types) {
            continue;
        }
        let Some(owner) = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
        else {
            log::warn!("Cannot derive an entity id for {}", path.display());
            continue;
        };
        let id = format!("{}{}", role.id_prefix(), owner);
        grouped.entry(id).or_default().push(path.to_path_buf());
    }

    grouped
        .into_iter()
        .map(|(entity_id, mut documents)| {
            documents.sort();
            DocumentSet {
                entity_id,
                role,
                documents,
            }
        })
        .collect()
}

fn has_extension(path: &Path, file_types: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            file_types.iter().any(|t| *t == ext)
        })
        .unwrap_or(false)
}
