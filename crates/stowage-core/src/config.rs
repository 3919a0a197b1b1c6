//! 設定ファイル（TOML）の読み込みと検証
//!
//! `BackupConfig` は TOML をそのまま写した形で、`targets()` / `store()` で
//! 検証済みの値に変換する。検証エラーは起動時に一度だけ返す。
//!
//! 同じ destination に置く target 同士は prefix が重ならないこと
//! （`alternate_prefixes` を含む）。`alternate_prefixes` は primary prefix より
//! 辞書順で前に来るものに限る（例: `sjg` に対して `sillytavern`）。
//!
//! ```toml
//! [store]
//! url = "https://dav.example.com/dav"
//! username = "me"
//! password = "secret"
//!
//! [defaults]
//! base_path = "/backup/"
//!
//! [[account]]
//! name = "alice"
//! datasets = ["alice/notes"]
//! ```

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::retention::prefix_matches;
use crate::domain::{
    ArtifactSpec, ConfigError, DatabaseEngine, DatabaseSource, DatasetSource, RemotePath,
    RepoType, Source, SourceKind, Target, TargetName, DEFAULT_MAX_BACKUPS,
};
use crate::impls::hub_dataset::HubConfig;
use crate::impls::webdav::{DEFAULT_TIMEOUT_SECS, WebDavConfig};

pub const DEFAULT_CONFIG_PATH: &str = "stowage.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountSection>,
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectSection>,
    #[serde(default, rename = "database")]
    pub databases: Vec<DatabaseSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsSection {
    pub base_path: Option<String>,
    pub max_backups: Option<usize>,
}

/// Dataset group: one target per dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    pub name: String,
    pub token: Option<String>,
    #[serde(default)]
    pub datasets: Vec<String>,
    pub backup_path: Option<String>,
    pub max_backups: Option<usize>,
    pub repo_type: Option<RepoType>,
}

/// Dataset target with an optional secondary database.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    pub name: String,
    pub token: Option<String>,
    pub backup_path: Option<String>,
    pub max_backups: Option<usize>,
    pub repo_type: Option<RepoType>,
    /// 旧名で書かれた artifact も同じ系列として数える。
    /// 削除順は名前の辞書順なので、primary prefix より後ろに並ぶ prefix を
    /// 指定すると新しい upload の方が先に消える。
    #[serde(default)]
    pub alternate_prefixes: Vec<String>,
    pub database: Option<DatabaseSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub name: String,
    #[serde(rename = "type")]
    pub engine: DatabaseEngine,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub file: Option<PathBuf>,
    pub custom_cmd: Option<String>,
    pub ssl_mode: Option<String>,
    pub backup_path: Option<String>,
    pub max_backups: Option<usize>,
    /// 旧名で書かれた artifact も同じ系列として数える。
    /// 削除順は名前の辞書順なので、primary prefix より後ろに並ぶ prefix を
    /// 指定すると新しい upload の方が先に消える。
    #[serde(default)]
    pub alternate_prefixes: Vec<String>,
}

impl BackupConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse TOML text; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn store(&self) -> Result<WebDavConfig, ConfigError> {
        let required = |value: &Option<String>, field: &'static str| {
            value
                .as_ref()
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingField {
                    context: "[store]".to_string(),
                    field,
                })
        };
        Ok(WebDavConfig {
            url: required(&self.store.url, "url")?,
            username: required(&self.store.username, "username")?,
            password: required(&self.store.password, "password")?,
            timeout_secs: self.store.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Validated targets in file order: accounts, projects, databases.
    pub fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        let base = self
            .defaults
            .base_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(RemotePath::dir)
            .ok_or_else(|| ConfigError::MissingField {
                context: "[defaults]".to_string(),
                field: "base_path",
            })?;
        let default_max = match self.defaults.max_backups {
            Some(n) => max_backups(n, "[defaults]")?,
            None => DEFAULT_MAX_BACKUPS,
        };

        let mut targets = Vec::new();
        for account in &self.accounts {
            targets.extend(account_targets(account, &base, default_max)?);
        }
        for project in &self.projects {
            targets.push(project_target(project, &base, default_max)?);
        }
        for database in &self.databases {
            let context = format!("database `{}`", database.name);
            let spec = database_spec(
                database,
                TargetName::new(database.name.clone()),
                &base.child_dir(database.engine.as_str()),
                default_max,
                &context,
            )?;
            targets.push(Target {
                name: spec.name.clone(),
                group: Some(database.engine.as_str().to_string()),
                primary: spec,
                secondary: None,
            });
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.to_string()));
            }
        }
        check_series(&targets)?;
        Ok(targets)
    }

    /// Every source kind the configured targets need a producer for.
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if self.accounts.iter().any(|a| !a.datasets.is_empty()) || !self.projects.is_empty() {
            kinds.push(SourceKind::Dataset);
        }
        if !self.databases.is_empty() || self.projects.iter().any(|p| p.database.is_some()) {
            kinds.push(SourceKind::Database);
        }
        kinds
    }
}

/// 同じ destination の spec 同士で、片方の prefix がもう片方のファイル名を
/// 拾ってしまう組み合わせを拒否する（alternate prefix も含む）。
fn check_series(targets: &[Target]) -> Result<(), ConfigError> {
    let specs: Vec<&ArtifactSpec> = targets
        .iter()
        .flat_map(|t| std::iter::once(&t.primary).chain(t.secondary.as_ref()))
        .collect();
    for (i, first) in specs.iter().enumerate() {
        for second in specs[i + 1..].iter().filter(|s| s.destination == first.destination) {
            if let Some(prefix) = shared_prefix(first, second) {
                return Err(ConfigError::ConflictingSeries {
                    first: first.name.to_string(),
                    second: second.name.to_string(),
                    destination: first.destination.to_string(),
                    prefix: prefix.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn shared_prefix<'a>(a: &'a ArtifactSpec, b: &'a ArtifactSpec) -> Option<&'a str> {
    let prefixes = |spec: &'a ArtifactSpec| {
        std::iter::once(spec.prefix.as_str()).chain(spec.alternate_prefixes.iter().map(String::as_str))
    };
    // `p` が `q` の系列のファイル名を拾うか
    let claims = |p: &str, q: &str| {
        [format!("{q}_00000000_000000"), format!("{q}_backup_00000000_000000")]
            .iter()
            .any(|name| prefix_matches(name, p))
    };
    prefixes(a).find_map(|p| {
        prefixes(b)
            .find(|q| claims(p, q) || claims(q, p))
            .map(|q| if p.len() <= q.len() { p } else { q })
    })
}

fn max_backups(value: usize, context: &str) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::InvalidField {
        context: context.to_string(),
        field: "max_backups",
        reason: "must be at least 1".to_string(),
    })
}

fn resolve_max(
    value: Option<usize>,
    default: NonZeroUsize,
    context: &str,
) -> Result<NonZeroUsize, ConfigError> {
    value.map_or(Ok(default), |n| max_backups(n, context))
}

fn non_empty(value: &str, context: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            context: context.to_string(),
            field,
        });
    }
    Ok(())
}

/// `owner/name` with both parts present.
fn dataset_name(value: &str, context: &str) -> Result<TargetName, ConfigError> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(TargetName::new(value))
        }
        _ => Err(ConfigError::InvalidField {
            context: context.to_string(),
            field: "name",
            reason: format!("`{value}` is not of the form owner/name"),
        }),
    }
}

fn account_targets(
    account: &AccountSection,
    base: &RemotePath,
    default_max: NonZeroUsize,
) -> Result<Vec<Target>, ConfigError> {
    let context = format!("account `{}`", account.name);
    non_empty(&account.name, &context, "name")?;
    let destination = account
        .backup_path
        .as_deref()
        .map_or_else(|| base.child_dir(&account.name), RemotePath::dir);
    let max = resolve_max(account.max_backups, default_max, &context)?;

    account
        .datasets
        .iter()
        .map(|dataset| -> Result<Target, ConfigError> {
            let name = dataset_name(dataset, &context)?;
            Ok(Target {
                group: Some(account.name.clone()),
                primary: ArtifactSpec {
                    name: name.clone(),
                    prefix: name.short_name().to_string(),
                    alternate_prefixes: Vec::new(),
                    source: Source::Dataset(DatasetSource {
                        repo: dataset.clone(),
                        token: account.token.clone(),
                        repo_type: account.repo_type,
                    }),
                    destination: destination.clone(),
                    max_backups: max,
                },
                secondary: None,
                name,
            })
        })
        .collect()
}

fn project_target(
    project: &ProjectSection,
    base: &RemotePath,
    default_max: NonZeroUsize,
) -> Result<Target, ConfigError> {
    let context = format!("project `{}`", project.name);
    let name = dataset_name(&project.name, &context)?;
    let destination = project
        .backup_path
        .as_deref()
        .map_or_else(|| base.child_dir(name.short_name()), RemotePath::dir);

    let secondary = project
        .database
        .as_ref()
        .map(|db| {
            database_spec(
                db,
                TargetName::new(format!("{}:{}", name, db.name)),
                &destination.child_dir("db"),
                default_max,
                &format!("{context} database `{}`", db.name),
            )
        })
        .transpose()?;

    Ok(Target {
        group: name.owner().map(str::to_string),
        primary: ArtifactSpec {
            name: name.clone(),
            prefix: name.short_name().to_string(),
            alternate_prefixes: project.alternate_prefixes.clone(),
            source: Source::Dataset(DatasetSource {
                repo: project.name.clone(),
                token: project.token.clone(),
                repo_type: project.repo_type,
            }),
            destination,
            max_backups: resolve_max(project.max_backups, default_max, &context)?,
        },
        secondary,
        name,
    })
}

fn database_spec(
    db: &DatabaseSection,
    name: TargetName,
    default_destination: &RemotePath,
    default_max: NonZeroUsize,
    context: &str,
) -> Result<ArtifactSpec, ConfigError> {
    non_empty(&db.name, context, "name")?;
    match db.engine {
        DatabaseEngine::Sqlite if db.file.is_none() => {
            return Err(ConfigError::MissingField {
                context: context.to_string(),
                field: "file",
            });
        }
        DatabaseEngine::Other if db.custom_cmd.as_deref().is_none_or(str::is_empty) => {
            return Err(ConfigError::MissingField {
                context: context.to_string(),
                field: "custom_cmd",
            });
        }
        DatabaseEngine::Mysql | DatabaseEngine::Postgresql => {
            if db.user.is_none() {
                return Err(ConfigError::MissingField {
                    context: context.to_string(),
                    field: "user",
                });
            }
            if db.host.is_none() {
                return Err(ConfigError::MissingField {
                    context: context.to_string(),
                    field: "host",
                });
            }
        }
        _ => {}
    }

    Ok(ArtifactSpec {
        name,
        prefix: db.name.clone(),
        alternate_prefixes: db.alternate_prefixes.clone(),
        source: Source::Database(DatabaseSource {
            engine: db.engine,
            name: db.name.clone(),
            user: db.user.clone(),
            password: db.password.clone(),
            host: db.host.clone(),
            port: db.port,
            file: db.file.clone(),
            custom_cmd: db.custom_cmd.clone(),
            ssl_mode: db.ssl_mode.clone(),
        }),
        destination: db
            .backup_path
            .as_deref()
            .map_or_else(|| default_destination.clone(), RemotePath::dir),
        max_backups: resolve_max(db.max_backups, default_max, context)?,
    })
}
