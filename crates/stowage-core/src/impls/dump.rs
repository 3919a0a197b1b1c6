//! DumpProducer - database のダンプツールを呼ぶ Producer
//!
//! | engine     | tool                       | artifact       |
//! |------------|----------------------------|----------------|
//! | mysql      | `mysqldump`                | `.sql`         |
//! | postgresql | `pg_dump --format=custom`  | `.dump`        |
//! | mongodb    | `mongodump --archive --gzip` | `.archive.gz` |
//! | sqlite     | file copy                  | `.db`          |
//! | other      | `sh -c <custom_cmd>`       | `.backup`      |
//!
//! パスワードはコマンドラインに載せず環境変数で渡す（mongodump を除く）。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::artifact::dump_file_name;
use crate::domain::{ArtifactSpec, DatabaseEngine, DatabaseSource, ProducerError, Source};
use crate::ports::{Clock, Producer};

pub const DEFAULT_PG_SSL_MODE: &str = "require";

pub struct DumpProducer {
    clock: Arc<dyn Clock>,
}

impl DumpProducer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Producer for DumpProducer {
    async fn produce(&self, spec: &ArtifactSpec, workdir: &Path) -> Result<PathBuf, ProducerError> {
        let Source::Database(db) = &spec.source else {
            return Err(ProducerError::Other(format!(
                "{} is not a database target",
                spec.name
            )));
        };

        let file = workdir.join(dump_file_name(
            &spec.prefix,
            self.clock.now(),
            db.engine.dump_extension(),
        ));

        match db.engine {
            DatabaseEngine::Mysql => run_to_file(mysqldump(db), "mysqldump", &file).await?,
            DatabaseEngine::Postgresql => run_to_file(pg_dump(db), "pg_dump", &file).await?,
            DatabaseEngine::Mongodb => run(mongodump(db, &file), "mongodump").await?,
            DatabaseEngine::Sqlite => copy_sqlite(db, &file).await?,
            DatabaseEngine::Other => {
                let template = db.custom_cmd.as_deref().ok_or_else(|| {
                    ProducerError::Other(format!("{} has no custom_cmd", spec.name))
                })?;
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(expand_placeholders(template, db, &file));
                run(cmd, "sh").await?;
                if !tokio::fs::try_exists(&file).await? {
                    return Err(ProducerError::Other(format!(
                        "custom command did not write {}",
                        file.display()
                    )));
                }
            }
        }

        tracing::debug!(engine = %db.engine, file = %file.display(), "dump written");
        Ok(file)
    }
}

fn mysqldump(db: &DatabaseSource) -> Command {
    let mut cmd = Command::new("mysqldump");
    if let Some(user) = &db.user {
        cmd.arg(format!("--user={user}"));
    }
    if let Some(host) = &db.host {
        cmd.arg(format!("--host={host}"));
    }
    if let Some(port) = db.port {
        cmd.arg(format!("--port={port}"));
    }
    if let Some(password) = &db.password {
        cmd.env("MYSQL_PWD", password);
    }
    cmd.args(["--single-transaction", "--quick", "--lock-tables=false"])
        .arg(&db.name);
    cmd
}

fn pg_dump(db: &DatabaseSource) -> Command {
    let mut cmd = Command::new("pg_dump");
    if let Some(user) = &db.user {
        cmd.arg(format!("--username={user}"));
    }
    if let Some(host) = &db.host {
        cmd.arg(format!("--host={host}"));
    }
    if let Some(port) = db.port {
        cmd.arg(format!("--port={port}"));
    }
    if let Some(password) = &db.password {
        cmd.env("PGPASSWORD", password);
    }
    cmd.env(
        "PGSSLMODE",
        db.ssl_mode.as_deref().unwrap_or(DEFAULT_PG_SSL_MODE),
    );
    cmd.arg("--format=custom").arg(&db.name);
    cmd
}

fn mongodump(db: &DatabaseSource, file: &Path) -> Command {
    let mut cmd = Command::new("mongodump");
    cmd.arg(format!("--db={}", db.name))
        .arg(format!("--archive={}", file.display()))
        .arg("--gzip");
    if let (Some(user), Some(password)) = (&db.user, &db.password) {
        cmd.arg(format!("--username={user}"))
            .arg(format!("--password={password}"))
            .arg("--authenticationDatabase=admin");
    }
    if let Some(host) = &db.host {
        cmd.arg(format!("--host={host}"));
    }
    if let Some(port) = db.port {
        cmd.arg(format!("--port={port}"));
    }
    cmd
}

async fn copy_sqlite(db: &DatabaseSource, file: &Path) -> Result<(), ProducerError> {
    let source = db
        .file
        .as_ref()
        .ok_or_else(|| ProducerError::Other(format!("sqlite database {} has no file", db.name)))?;
    if !tokio::fs::try_exists(source).await? {
        return Err(ProducerError::MissingSource(source.clone()));
    }
    tokio::fs::copy(source, file).await?;
    Ok(())
}

/// Substitute `{backup_file}`, `{db_name}`, `{db_user}`, `{db_password}`,
/// `{db_host}` and `{db_port}`. Unset values become empty strings.
fn expand_placeholders(template: &str, db: &DatabaseSource, file: &Path) -> String {
    let port = db.port.map(|p| p.to_string()).unwrap_or_default();
    template
        .replace("{backup_file}", &file.display().to_string())
        .replace("{db_name}", &db.name)
        .replace("{db_user}", db.user.as_deref().unwrap_or_default())
        .replace("{db_password}", db.password.as_deref().unwrap_or_default())
        .replace("{db_host}", db.host.as_deref().unwrap_or_default())
        .replace("{db_port}", &port)
}

/// Run `cmd` with stdout redirected into `file`.
async fn run_to_file(mut cmd: Command, tool: &str, file: &Path) -> Result<(), ProducerError> {
    let out = tokio::fs::File::create(file).await?.into_std().await;
    cmd.stdout(Stdio::from(out));
    run(cmd, tool).await
}

async fn run(mut cmd: Command, tool: &str) -> Result<(), ProducerError> {
    cmd.stdin(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd.spawn().map_err(|source| ProducerError::Spawn {
        tool: tool.to_string(),
        source,
    })?;
    let output = child.wait_with_output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ProducerError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RemotePath, TargetName, DEFAULT_MAX_BACKUPS};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn database(engine: DatabaseEngine) -> DatabaseSource {
        DatabaseSource {
            engine,
            name: "shop".to_string(),
            user: Some("root".to_string()),
            password: Some("pw".to_string()),
            host: Some("localhost".to_string()),
            port: Some(3306),
            file: None,
            custom_cmd: None,
            ssl_mode: None,
        }
    }

    fn spec(db: DatabaseSource) -> ArtifactSpec {
        ArtifactSpec {
            name: TargetName::new(db.name.clone()),
            prefix: db.name.clone(),
            alternate_prefixes: vec![],
            source: Source::Database(db),
            destination: RemotePath::dir("/backup/db"),
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    fn producer() -> DumpProducer {
        DumpProducer::new(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap(),
        )))
    }

    #[test]
    fn placeholders_are_substituted() {
        let db = database(DatabaseEngine::Other);
        let cmd = expand_placeholders(
            "dump -u {db_user} -p {db_password} -h {db_host}:{db_port} {db_name} > {backup_file}",
            &db,
            Path::new("/tmp/shop.backup"),
        );
        assert_eq!(cmd, "dump -u root -p pw -h localhost:3306 shop > /tmp/shop.backup");
    }

    #[test]
    fn secrets_stay_off_the_command_line() {
        let cmd = mysqldump(&database(DatabaseEngine::Mysql));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.iter().all(|a| !a.contains("pw")));
        assert_eq!(args.last().map(String::as_str), Some("shop"));

        let cmd = pg_dump(&database(DatabaseEngine::Postgresql));
        let envs: Vec<(String, String)> = cmd
            .as_std()
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_string_lossy().into_owned(), v?.to_string_lossy().into_owned())))
            .collect();
        assert!(envs.contains(&("PGPASSWORD".to_string(), "pw".to_string())));
        assert!(envs.contains(&("PGSSLMODE".to_string(), "require".to_string())));
    }

    #[tokio::test]
    async fn sqlite_file_is_copied() {
        let work = tempfile::tempdir().unwrap();
        let source = work.path().join("app.db");
        std::fs::write(&source, b"sqlite").unwrap();
        let mut db = database(DatabaseEngine::Sqlite);
        db.file = Some(source);

        let out = tempfile::tempdir().unwrap();
        let file = producer().produce(&spec(db), out.path()).await.unwrap();

        assert_eq!(file.file_name().unwrap(), "shop_20240601_030000.db");
        assert_eq!(std::fs::read(&file).unwrap(), b"sqlite");
    }

    #[tokio::test]
    async fn missing_sqlite_file_is_producer_error() {
        let mut db = database(DatabaseEngine::Sqlite);
        db.file = Some("/nonexistent/app.db".into());

        let out = tempfile::tempdir().unwrap();
        let err = producer().produce(&spec(db), out.path()).await.unwrap_err();
        assert!(matches!(err, ProducerError::MissingSource(_)));
    }

    #[tokio::test]
    async fn custom_command_writes_backup_file() {
        let mut db = database(DatabaseEngine::Other);
        db.custom_cmd = Some("printf '%s' {db_name} > {backup_file}".to_string());

        let out = tempfile::tempdir().unwrap();
        let file = producer().produce(&spec(db), out.path()).await.unwrap();

        assert_eq!(file.file_name().unwrap(), "shop_20240601_030000.backup");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "shop");
    }

    #[tokio::test]
    async fn failing_custom_command_carries_stderr() {
        let mut db = database(DatabaseEngine::Other);
        db.custom_cmd = Some("echo 'access denied' >&2; exit 3".to_string());

        let out = tempfile::tempdir().unwrap();
        let err = producer().produce(&spec(db), out.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ProducerError::ToolFailed { ref stderr, .. } if stderr == "access denied"
        ));
    }
}
