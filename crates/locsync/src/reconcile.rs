use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::mapping::{ExpectedTranslation, TranslationMapping};

/// An archive entry matched to its local destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Archive-relative path.
    pub entry: String,
    pub destination: PathBuf,
    /// Destination relative to the base path, anchored with `/`.
    pub local_path: String,
}

/// Partition of an archive into placed and omitted entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Sorted by destination.
    pub to_write: Vec<Placement>,
    /// Archive-relative paths with no expected translation.
    pub omitted: Vec<String>,
}

/// Omitted entries grouped by the remote source that owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmittedSummary {
    /// Remote source path -> omitted entries attributable to it.
    pub by_source: BTreeMap<String, Vec<String>>,
    pub without_source: Vec<String>,
}

impl OmittedSummary {
    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty() && self.without_source.is_empty()
    }

    /// Number of distinct omitted entries.
    pub fn len(&self) -> usize {
        let mut attributed: Vec<&String> = self.by_source.values().flatten().collect();
        attributed.sort();
        attributed.dedup();
        attributed.len() + self.without_source.len()
    }
}

/// Split extracted entries into those with an expected destination and the rest.
pub fn reconcile<S: AsRef<str>>(
    entries: &[S],
    mapping: &TranslationMapping,
    base_path: &Path,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for entry in entries {
        let entry = entry.as_ref().trim_start_matches('/');
        match mapping.get(entry) {
            Some(ExpectedTranslation { local_path, .. }) => result.to_write.push(Placement {
                entry: entry.to_owned(),
                destination: base_path.join(local_path.trim_start_matches('/')),
                local_path: local_path.clone(),
            }),
            None => result.omitted.push(entry.to_owned()),
        }
    }

    result
        .to_write
        .sort_by(|a, b| a.destination.cmp(&b.destination));
    result
}

/// Attribute omitted entries to the remote sources whose known translation
/// paths include them. An entry may belong to several sources.
pub fn classify_omitted(
    omitted: &[String],
    project_translations: &BTreeMap<String, Vec<String>>,
) -> OmittedSummary {
    let mut summary = OmittedSummary::default();

    for entry in omitted {
        let entry = entry.trim_start_matches('/');
        let mut found = false;
        for (source, translations) in project_translations {
            if translations
                .iter()
                .any(|t| t.trim_start_matches('/') == entry)
            {
                found = true;
                summary
                    .by_source
                    .entry(source.clone())
                    .or_default()
                    .push(entry.to_owned());
            }
        }
        if !found {
            summary.without_source.push(entry.to_owned());
        }
    }

    summary
}
