use std::collections::BTreeMap;

use locsync::{Language, LanguageMapping, RemoteBranch, RemoteDirectory, RemoteFile};
use serde::{Deserialize, Serialize};

/// `{ "data": ... }` wrapper around every Crowdin v2 payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub data: Vec<Envelope<T>>,
}

/// `GET /projects/{projectId}`
///
/// Managers receive the full project settings; translators get a reduced
/// view without `translateDuplicates` or `languageMapping`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: u64,
    pub source_language_id: String,
    #[serde(default)]
    pub target_language_ids: Vec<String>,
    #[serde(default)]
    pub translate_duplicates: Option<serde_json::Value>,
    /// Object keyed by language id; an empty mapping may arrive as `[]`.
    #[serde(default)]
    pub language_mapping: Option<serde_json::Value>,
}

impl ProjectResponse {
    pub fn is_manager(&self) -> bool {
        self.translate_duplicates.is_some() || self.language_mapping.is_some()
    }

    /// Server mapping is keyed by language first; convert to the kind-first table.
    pub fn mapping(&self) -> Option<LanguageMapping> {
        let value = self.language_mapping.as_ref()?;
        if !value.is_object() {
            return Some(LanguageMapping::new());
        }
        match serde_json::from_value::<BTreeMap<String, BTreeMap<String, String>>>(value.clone()) {
            Ok(by_language) => Some(LanguageMapping::from_languages(by_language)),
            Err(e) => {
                tracing::warn!("ignoring malformed project language mapping: {e}");
                Some(LanguageMapping::new())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageResponse {
    pub id: String,
    pub name: String,
    pub two_letters_code: String,
    #[serde(default)]
    pub three_letters_code: String,
    pub locale: String,
    #[serde(default)]
    pub android_code: String,
    #[serde(default)]
    pub osx_code: String,
    #[serde(default)]
    pub osx_locale: String,
}

impl From<LanguageResponse> for Language {
    fn from(l: LanguageResponse) -> Self {
        Language {
            id: l.id,
            name: l.name,
            two_letters_code: l.two_letters_code,
            three_letters_code: l.three_letters_code,
            locale: l.locale,
            android_code: l.android_code,
            osx_code: l.osx_code,
            osx_locale: l.osx_locale,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BranchResponse {
    pub id: u64,
    pub name: String,
}

impl From<BranchResponse> for RemoteBranch {
    fn from(b: BranchResponse) -> Self {
        RemoteBranch {
            id: b.id,
            name: b.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryResponse {
    pub id: u64,
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
}

impl From<DirectoryResponse> for RemoteDirectory {
    fn from(d: DirectoryResponse) -> Self {
        RemoteDirectory {
            id: d.id,
            name: d.name,
            directory_id: d.directory_id,
            branch_id: d.branch_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: u64,
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
    #[serde(default)]
    pub export_options: Option<ExportOptions>,
}

impl From<FileResponse> for RemoteFile {
    fn from(f: FileResponse) -> Self {
        RemoteFile {
            id: f.id,
            name: f.name,
            directory_id: f.directory_id,
            branch_id: f.branch_id,
            export_pattern: f.export_options.and_then(|o| o.export_pattern),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub export_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageResponse {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct BuildResponse {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub progress: u8,
}

impl From<BuildResponse> for locsync::Build {
    fn from(b: BuildResponse) -> Self {
        locsync::Build {
            id: b.id,
            status: b.status,
            progress: b.progress.min(100),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadLinkResponse {
    pub url: String,
}

// -- request bodies --

#[derive(Debug, Serialize)]
pub struct AddBranchBody<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDirectoryBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileBody<'a> {
    pub storage_id: u64,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<u64>,
    pub export_options: ExportOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileBody {
    pub storage_id: u64,
    pub export_options: ExportOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTranslationBody {
    pub storage_id: u64,
    pub file_id: u64,
    pub import_eq_suggestions: bool,
    pub auto_approve_imported: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_language_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_untranslated_strings: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_untranslated_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_approved_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_with_min_approvals_count: Option<u32>,
}

impl<'a> From<&'a locsync::BuildRequest> for BuildBody<'a> {
    fn from(request: &'a locsync::BuildRequest) -> Self {
        let (approved_only, min_approvals) = match request.export_filter {
            Some(locsync::ExportFilter::ApprovedOnly(flag)) => (Some(flag), None),
            Some(locsync::ExportFilter::MinApprovals(count)) => (None, Some(count)),
            None => (None, None),
        };
        BuildBody {
            branch_id: request.branch_id,
            target_language_ids: request.target_language_ids.as_deref(),
            skip_untranslated_strings: request.skip_untranslated_strings,
            skip_untranslated_files: request.skip_untranslated_files,
            export_approved_only: approved_only,
            export_with_min_approvals_count: min_approvals,
        }
    }
}

// -- errors --

/// `{"error": {"code": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct SingleErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// `{"errors": [{"error": {"key": "name", "errors": [{"code": "...", "message": "..."}]}}]}`
#[derive(Debug, Deserialize)]
pub struct ValidationErrorResponse {
    pub errors: Vec<ValidationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ValidationEntry {
    pub error: ValidationError,
}

#[derive(Debug, Deserialize)]
pub struct ValidationError {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}
