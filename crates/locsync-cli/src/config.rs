use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use locsync::{FileEntry, SyncConfig};
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://api.crowdin.com/api/v2";

/// `crowdin.yml`, or the identity file, which uses the same keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectFile {
    pub project_id: Option<Scalar>,
    pub project_id_env: Option<String>,
    pub api_token: Option<String>,
    pub api_token_env: Option<String>,
    pub base_path: Option<String>,
    pub base_path_env: Option<String>,
    pub base_url: Option<String>,
    pub base_url_env: Option<String>,
    pub preserve_hierarchy: bool,
    pub files: Vec<FileEntry>,
}

/// YAML allows `project_id: 42` as well as `project_id: "42"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(u64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

impl ProjectFile {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str::<Option<Self>>(contents)?.unwrap_or_default())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn project_id(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        pick(self.project_id.clone().map(Scalar::into_string), &self.project_id_env, env)
    }

    fn api_token(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        pick(self.api_token.clone(), &self.api_token_env, env)
    }

    fn base_path(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        pick(self.base_path.clone(), &self.base_path_env, env)
    }

    fn base_url(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        pick(self.base_url.clone(), &self.base_url_env, env)
    }
}

fn pick(
    value: Option<String>,
    env_key: &Option<String>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<String> {
    value
        .or_else(|| env_key.as_deref().and_then(env))
        .filter(|v| !v.trim().is_empty())
}

/// Values given on the command line; they beat both files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub project_id: Option<String>,
    pub base_url: Option<String>,
    pub base_path: Option<PathBuf>,
}

/// Where API calls go and which export filter flavor applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTarget {
    pub url: String,
    pub organization: bool,
}

impl ApiTarget {
    /// Derive the API root from a configured `base_url`.
    ///
    /// `https://<org>.crowdin.com` maps to the organization API; a URL that
    /// already ends in `/api/v2` is used as is.
    pub fn from_base_url(base_url: Option<&str>) -> Result<Self> {
        let Some(raw) = base_url.map(|u| u.trim().trim_end_matches('/')) else {
            return Ok(Self::public());
        };

        if raw.ends_with("/api/v2") {
            let organization = organization_name(raw.trim_end_matches("/api/v2")).is_some();
            return Ok(Self {
                url: raw.to_owned(),
                organization,
            });
        }
        if raw == "https://crowdin.com" || raw == "https://api.crowdin.com" {
            return Ok(Self::public());
        }
        match organization_name(raw) {
            Some(org) => Ok(Self {
                url: format!("https://{org}.api.crowdin.com/api/v2"),
                organization: true,
            }),
            None => bail!("unsupported base_url '{raw}'"),
        }
    }

    fn public() -> Self {
        Self {
            url: DEFAULT_API_URL.to_owned(),
            organization: false,
        }
    }
}

/// `https://acme.crowdin.com` or `https://acme.api.crowdin.com` -> `acme`.
fn organization_name(url: &str) -> Option<&str> {
    let host = url.strip_prefix("https://")?;
    let org = host
        .strip_suffix(".api.crowdin.com")
        .or_else(|| host.strip_suffix(".crowdin.com"))?;
    (!org.is_empty() && org != "api" && !org.contains(['.', '/'])).then_some(org)
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: u64,
    pub token: String,
    pub api: ApiTarget,
    pub sync: SyncConfig,
}

/// Default identity file: `~/.crowdin.yml`.
pub fn default_identity_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".crowdin.yml"))
}

/// Merge the project file, the identity file and CLI overrides.
pub fn load(
    config_path: &Path,
    identity: Option<&ProjectFile>,
    overrides: &Overrides,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let project = ProjectFile::read(config_path)?;
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    resolve(project, identity, overrides, config_dir, env)
}

/// Identity file contents, if one exists at `path`.
pub fn read_identity(path: Option<&Path>) -> Result<Option<ProjectFile>> {
    match path {
        Some(path) if path.is_file() => Ok(Some(ProjectFile::read(path)?)),
        _ => Ok(None),
    }
}

pub fn resolve(
    project: ProjectFile,
    identity: Option<&ProjectFile>,
    overrides: &Overrides,
    config_dir: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let from_identity = |f: fn(&ProjectFile, &dyn Fn(&str) -> Option<String>) -> Option<String>| {
        identity.and_then(|i| f(i, env))
    };

    let project_id = overrides
        .project_id
        .clone()
        .or_else(|| project.project_id(env))
        .or_else(|| from_identity(ProjectFile::project_id))
        .context("project_id is required")?;
    let project_id: u64 = project_id
        .trim()
        .parse()
        .with_context(|| format!("project_id '{project_id}' is not a number"))?;

    let token = overrides
        .token
        .clone()
        .or_else(|| project.api_token(env))
        .or_else(|| from_identity(ProjectFile::api_token))
        .context("api_token is required")?;

    let base_url = overrides
        .base_url
        .clone()
        .or_else(|| project.base_url(env))
        .or_else(|| from_identity(ProjectFile::base_url));
    let api = ApiTarget::from_base_url(base_url.as_deref())?;

    let base_path = match &overrides.base_path {
        Some(path) => path.clone(),
        None => project
            .base_path(env)
            .or_else(|| from_identity(ProjectFile::base_path))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let base_path = if base_path.is_absolute() {
        base_path
    } else {
        config_dir.join(base_path)
    };
    if !base_path.is_dir() {
        bail!("base path {} is not a directory", base_path.display());
    }

    if project.files.is_empty() {
        bail!("configuration has no 'files' entries");
    }
    for (index, entry) in project.files.iter().enumerate() {
        if entry.source.trim().is_empty() {
            bail!("files[{index}] is missing 'source'");
        }
        if entry.translation.trim().is_empty() {
            bail!("files[{index}] is missing 'translation'");
        }
    }

    Ok(Settings {
        project_id,
        token,
        api,
        sync: SyncConfig {
            base_path,
            preserve_hierarchy: project.preserve_hierarchy,
            files: project.files,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use locsync::PlaceholderKind;
    use tempfile::TempDir;

    use super::*;

    const MINIMAL: &str = r#"
project_id: 42
api_token: secret
files:
  - source: /src/*.po
    translation: /%two_letters_code%/%original_file_name%
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn settings(yaml: &str, dir: &Path) -> Result<Settings> {
        resolve(ProjectFile::parse(yaml).unwrap(), None, &Overrides::default(), dir, &no_env)
    }

    #[test]
    fn minimal_project_file() {
        let dir = TempDir::new().unwrap();
        let settings = settings(MINIMAL, dir.path()).unwrap();

        assert_eq!(settings.project_id, 42);
        assert_eq!(settings.token, "secret");
        assert_eq!(settings.api.url, DEFAULT_API_URL);
        assert!(!settings.api.organization);
        assert_eq!(settings.sync.base_path, dir.path().join("."));
        assert_eq!(settings.sync.files.len(), 1);
        assert!(!settings.sync.preserve_hierarchy);
    }

    #[test]
    fn full_file_entry() {
        let yaml = r#"
project_id: "42"
api_token: secret
preserve_hierarchy: true
files:
  - source: /**/*.po
    ignore: [/vendor/**]
    dest: /%original_file_name%
    translation: /%locale%/%original_file_name%
    translation_replace:
      app: application
    languages_mapping:
      two_letters_code:
        uk: ua
"#;
        let dir = TempDir::new().unwrap();
        let settings = settings(yaml, dir.path()).unwrap();
        let entry = &settings.sync.files[0];

        assert!(settings.sync.preserve_hierarchy);
        assert_eq!(entry.ignore, vec!["/vendor/**"]);
        assert_eq!(entry.dest.as_deref(), Some("/%original_file_name%"));
        assert_eq!(entry.translation_replace["app"], "application");
        let mapping = entry.languages_mapping.as_ref().unwrap();
        assert_eq!(mapping.get(PlaceholderKind::TwoLettersCode.key(), "uk"), Some("ua"));
    }

    #[test]
    fn env_keys_are_read() {
        let yaml = r#"
project_id_env: LOCSYNC_PROJECT
api_token_env: LOCSYNC_TOKEN
files:
  - source: "*.po"
    translation: /%locale%.po
"#;
        let vars: HashMap<&str, &str> = [("LOCSYNC_PROJECT", "7"), ("LOCSYNC_TOKEN", "from-env")].into();
        let env = |key: &str| vars.get(key).map(|v| (*v).to_owned());
        let dir = TempDir::new().unwrap();

        let settings = resolve(
            ProjectFile::parse(yaml).unwrap(),
            None,
            &Overrides::default(),
            dir.path(),
            &env,
        )
        .unwrap();

        assert_eq!(settings.project_id, 7);
        assert_eq!(settings.token, "from-env");
    }

    #[test]
    fn identity_fills_missing_credentials() {
        let yaml = r#"
project_id: 42
files:
  - source: "*.po"
    translation: /%locale%.po
"#;
        let identity = ProjectFile::parse("api_token: personal\nbase_url: https://acme.crowdin.com\n").unwrap();
        let dir = TempDir::new().unwrap();

        let settings = resolve(
            ProjectFile::parse(yaml).unwrap(),
            Some(&identity),
            &Overrides::default(),
            dir.path(),
            &no_env,
        )
        .unwrap();

        assert_eq!(settings.token, "personal");
        assert!(settings.api.organization);
    }

    #[test]
    fn overrides_win() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            token: Some("cli".into()),
            project_id: Some("9".into()),
            base_path: Some(dir.path().to_path_buf()),
            base_url: None,
        };

        let settings = resolve(
            ProjectFile::parse(MINIMAL).unwrap(),
            None,
            &overrides,
            Path::new("/nonexistent"),
            &no_env,
        )
        .unwrap();

        assert_eq!(settings.token, "cli");
        assert_eq!(settings.project_id, 9);
        assert_eq!(settings.sync.base_path, dir.path());
    }

    #[test]
    fn relative_base_path_is_resolved_against_config_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        let yaml = format!("base_path: app\n{MINIMAL}");

        let settings = settings(&yaml, dir.path()).unwrap();

        assert_eq!(settings.sync.base_path, dir.path().join("app"));
    }

    // -- validation --

    #[test]
    fn non_numeric_project_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let yaml = MINIMAL.replace("project_id: 42", "project_id: abc");
        let err = settings(&yaml, dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn missing_token_is_rejected() {
        let dir = TempDir::new().unwrap();
        let yaml = MINIMAL.replace("api_token: secret", "");
        let err = settings(&yaml, dir.path()).unwrap_err();
        assert!(err.to_string().contains("api_token"));
    }

    #[test]
    fn entries_need_source_and_translation() {
        let dir = TempDir::new().unwrap();
        let yaml = "project_id: 1\napi_token: t\nfiles:\n  - source: '*.po'\n";
        let err = settings(yaml, dir.path()).unwrap_err();
        assert!(err.to_string().contains("files[0] is missing 'translation'"));

        let err = settings("project_id: 1\napi_token: t\n", dir.path()).unwrap_err();
        assert!(err.to_string().contains("no 'files'"));
    }

    #[test]
    fn missing_base_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let yaml = format!("base_path: missing\n{MINIMAL}");
        assert!(settings(&yaml, dir.path()).is_err());
    }

    // -- api target --

    #[test]
    fn api_target_from_base_url() {
        assert_eq!(ApiTarget::from_base_url(None).unwrap(), ApiTarget::public());
        assert_eq!(
            ApiTarget::from_base_url(Some("https://crowdin.com/")).unwrap(),
            ApiTarget::public()
        );
        assert_eq!(
            ApiTarget::from_base_url(Some("https://acme.crowdin.com")).unwrap(),
            ApiTarget {
                url: "https://acme.api.crowdin.com/api/v2".into(),
                organization: true,
            }
        );
        assert_eq!(
            ApiTarget::from_base_url(Some("http://localhost:8080/api/v2")).unwrap(),
            ApiTarget {
                url: "http://localhost:8080/api/v2".into(),
                organization: false,
            }
        );
        assert!(ApiTarget::from_base_url(Some("https://example.com")).is_err());
    }
}
