use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::images::{DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT, FetchOptions};
use crate::matchers::BaseUrl;
use crate::source::{DEFAULT_MYSQL_DATABASE, DEFAULT_MYSQL_PORT, MysqlOptions};

pub const DEFAULT_CONFIG_FILENAME: &str = "bookstack-export.toml";
pub const DEFAULT_EXPORT_DIR: &str = "export";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExportFileConfig {
    #[serde(default)]
    pub bookstack: BookstackSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BookstackSection {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DatabaseSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExportSection {
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct HttpSection {
    pub timeout_ms: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
    pub user_agent: Option<String>,
}

/// Load and parse the export config from a TOML file. Returns defaults if the
/// file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ExportFileConfig> {
    if !config_path.exists() {
        return Ok(ExportFileConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ExportFileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

/// Values given on the command line. `None` falls through to env, then the
/// config file, then defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub bookstack_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub mysql_host: Option<String>,
    pub mysql_port: Option<u16>,
    pub mysql_user: Option<String>,
    pub mysql_password: Option<String>,
    pub mysql_database: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub verify_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSourceSettings {
    Mysql(MysqlOptions),
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub base_url: BaseUrl,
    pub output_root: PathBuf,
    pub source: PageSourceSettings,
    pub fetch: FetchOptions,
    pub origins: Vec<(&'static str, ValueSource)>,
}

impl ResolvedSettings {
    pub fn diagnostics(&self) -> String {
        let mut lines = vec![
            format!("bookstack_url={}", self.base_url),
            format!("output_root={}", normalize_path(&self.output_root)),
        ];
        match &self.source {
            PageSourceSettings::Mysql(options) => {
                lines.push(format!(
                    "source=mysql://{}@{}:{}/{}",
                    options.user, options.host, options.port, options.database
                ));
                lines.push("password=<redacted>".to_string());
            }
            PageSourceSettings::Sqlite(path) => {
                lines.push(format!("source=sqlite://{}", normalize_path(path)));
            }
        }
        lines.push(format!("http.timeout_ms={}", self.fetch.timeout_ms));
        lines.push(format!(
            "http.accept_invalid_certs={}",
            self.fetch.accept_invalid_certs
        ));
        lines.push(format!("http.user_agent={}", self.fetch.user_agent));
        for (name, origin) in &self.origins {
            lines.push(format!("origin.{name}={}", origin.as_str()));
        }
        lines.join("\n")
    }
}

pub fn resolve_settings(
    overrides: &SettingsOverrides,
    file: &ExportFileConfig,
) -> Result<ResolvedSettings> {
    resolve_settings_with_env(overrides, file, |key| env::var(key).ok())
}

pub fn resolve_settings_with_env<E>(
    overrides: &SettingsOverrides,
    file: &ExportFileConfig,
    env_lookup: E,
) -> Result<ResolvedSettings>
where
    E: Fn(&str) -> Option<String>,
{
    let env_value = |key: &str| {
        env_lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let mut origins = Vec::new();

    let (url, origin) = pick(
        overrides.bookstack_url.clone(),
        env_value("BOOKSTACK_URL"),
        file.bookstack.url.clone(),
    )
    .ok_or_else(|| {
        missing(
            "BookStack URL",
            "--bookstack-url",
            "BOOKSTACK_URL",
            "bookstack.url",
        )
    })?;
    origins.push(("bookstack_url", origin));
    let base_url = BaseUrl::parse(&url)?;

    let (output_root, origin) = pick(
        overrides.output_dir.clone(),
        env_value("BOOKSTACK_EXPORT_PATH").map(PathBuf::from),
        file.export.output_dir.clone(),
    )
    .unwrap_or_else(|| (PathBuf::from(DEFAULT_EXPORT_DIR), ValueSource::Default));
    origins.push(("output_root", origin));

    let sqlite = pick(
        overrides.sqlite_path.clone(),
        env_value("BOOKSTACK_SQLITE_PATH").map(PathBuf::from),
        file.database.sqlite_path.clone(),
    );
    let source = match sqlite {
        Some((path, origin)) => {
            origins.push(("sqlite_path", origin));
            PageSourceSettings::Sqlite(path)
        }
        None => {
            let (host, origin) = pick(
                overrides.mysql_host.clone(),
                env_value("BOOKSTACK_DB_HOST"),
                file.database.host.clone(),
            )
            .ok_or_else(|| {
                missing("MySQL host", "--mysql-host", "BOOKSTACK_DB_HOST", "database.host")
            })?;
            origins.push(("mysql_host", origin));

            let (port, origin) = match pick(
                overrides.mysql_port.map(|port| port.to_string()),
                env_value("BOOKSTACK_DB_PORT"),
                file.database.port.map(|port| port.to_string()),
            ) {
                Some((raw, origin)) => {
                    let port = raw
                        .parse::<u16>()
                        .with_context(|| format!("invalid MySQL port: {raw}"))?;
                    (port, origin)
                }
                None => (DEFAULT_MYSQL_PORT, ValueSource::Default),
            };
            origins.push(("mysql_port", origin));

            let (user, origin) = pick(
                overrides.mysql_user.clone(),
                env_value("BOOKSTACK_DB_USER"),
                file.database.user.clone(),
            )
            .ok_or_else(|| {
                missing("MySQL user", "--mysql-user", "BOOKSTACK_DB_USER", "database.user")
            })?;
            origins.push(("mysql_user", origin));

            let (password, origin) = pick(
                overrides.mysql_password.clone(),
                env_value("BOOKSTACK_DB_PASSWORD"),
                file.database.password.clone(),
            )
            .ok_or_else(|| {
                missing(
                    "MySQL password",
                    "--mysql-pass",
                    "BOOKSTACK_DB_PASSWORD",
                    "database.password",
                )
            })?;
            origins.push(("mysql_password", origin));

            let (database, origin) = pick(
                overrides.mysql_database.clone(),
                env_value("BOOKSTACK_DB_NAME"),
                file.database.name.clone(),
            )
            .unwrap_or_else(|| (DEFAULT_MYSQL_DATABASE.to_string(), ValueSource::Default));
            origins.push(("mysql_database", origin));

            PageSourceSettings::Mysql(MysqlOptions {
                host,
                port,
                user,
                password,
                database,
            })
        }
    };

    let (timeout_raw, origin) = pick(
        overrides.timeout_ms.map(|value| value.to_string()),
        env_value("BOOKSTACK_HTTP_TIMEOUT_MS"),
        file.http.timeout_ms.map(|value| value.to_string()),
    )
    .unwrap_or_else(|| (DEFAULT_TIMEOUT_MS.to_string(), ValueSource::Default));
    let timeout_ms = timeout_raw
        .parse::<u64>()
        .with_context(|| format!("invalid HTTP timeout: {timeout_raw}"))?;
    if timeout_ms == 0 {
        bail!("HTTP timeout must be greater than zero");
    }
    origins.push(("http_timeout_ms", origin));

    let (accept_invalid_certs, origin) = if overrides.verify_tls {
        (false, ValueSource::Flag)
    } else if let Some(value) = file.http.accept_invalid_certs {
        (value, ValueSource::Config)
    } else {
        (true, ValueSource::Default)
    };
    origins.push(("http_accept_invalid_certs", origin));

    let (user_agent, origin) = pick(
        None,
        env_value("BOOKSTACK_USER_AGENT"),
        file.http.user_agent.clone(),
    )
    .unwrap_or_else(|| (DEFAULT_USER_AGENT.to_string(), ValueSource::Default));
    origins.push(("http_user_agent", origin));

    Ok(ResolvedSettings {
        base_url,
        output_root,
        source,
        fetch: FetchOptions {
            accept_invalid_certs,
            timeout_ms,
            user_agent,
        },
        origins,
    })
}

fn pick<T>(flag: Option<T>, env: Option<T>, config: Option<T>) -> Option<(T, ValueSource)> {
    flag.map(|value| (value, ValueSource::Flag))
        .or_else(|| env.map(|value| (value, ValueSource::Env)))
        .or_else(|| config.map(|value| (value, ValueSource::Config)))
}

fn missing(what: &str, flag: &str, env_key: &str, config_key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{what} is required: pass {flag}, set {env_key}, or add `{config_key}` to the config file"
    )
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn mysql_overrides() -> SettingsOverrides {
        SettingsOverrides {
            bookstack_url: Some("https://wiki.example.org/".to_string()),
            mysql_host: Some("db.internal".to_string()),
            mysql_user: Some("reader".to_string()),
            mysql_password: Some("secret".to_string()),
            ..SettingsOverrides::default()
        }
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/bookstack-export.toml")).expect("load");
        assert_eq!(config, ExportFileConfig::default());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[bookstack]
url = "https://docs.internal"

[database]
host = "mysql.internal"
port = 3307
user = "bookstack"
password = "pw"
name = "wiki"

[export]
output_dir = "out"

[http]
timeout_ms = 5000
accept_invalid_certs = false
user_agent = "exporter-test/1.0"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load");
        assert_eq!(config.bookstack.url.as_deref(), Some("https://docs.internal"));
        assert_eq!(config.database.port, Some(3307));
        assert_eq!(config.database.name.as_deref(), Some("wiki"));
        assert_eq!(config.export.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.http.timeout_ms, Some(5000));
        assert_eq!(config.http.accept_invalid_certs, Some(false));
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&config_path, "[bookstack\nurl = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn defaults_fill_optional_values() {
        let settings =
            resolve_settings_with_env(&mysql_overrides(), &ExportFileConfig::default(), no_env)
                .expect("resolve");

        assert_eq!(settings.base_url.as_str(), "https://wiki.example.org");
        assert_eq!(settings.output_root, PathBuf::from(DEFAULT_EXPORT_DIR));
        assert_eq!(
            settings.source,
            PageSourceSettings::Mysql(MysqlOptions {
                host: "db.internal".to_string(),
                port: 3306,
                user: "reader".to_string(),
                password: "secret".to_string(),
                database: "bookstack".to_string(),
            })
        );
        assert!(settings.fetch.accept_invalid_certs);
        assert_eq!(settings.fetch.timeout_ms, 30_000);
    }

    #[test]
    fn flag_beats_env_beats_config() {
        let mut file = ExportFileConfig::default();
        file.export.output_dir = Some(PathBuf::from("from-config"));
        file.database.name = Some("config-db".to_string());
        file.database.port = Some(3310);
        let env = BTreeMap::from([
            ("BOOKSTACK_EXPORT_PATH", "from-env"),
            ("BOOKSTACK_DB_NAME", "env-db"),
        ]);
        let mut overrides = mysql_overrides();
        overrides.output_dir = Some(PathBuf::from("from-flag"));

        let settings = resolve_settings_with_env(&overrides, &file, |key| {
            env.get(key).map(|value| value.to_string())
        })
        .expect("resolve");

        assert_eq!(settings.output_root, PathBuf::from("from-flag"));
        let PageSourceSettings::Mysql(options) = &settings.source else {
            panic!("expected mysql source");
        };
        assert_eq!(options.database, "env-db");
        assert_eq!(options.port, 3310);
        assert!(
            settings
                .origins
                .contains(&("mysql_database", ValueSource::Env))
        );
        assert!(settings.origins.contains(&("mysql_port", ValueSource::Config)));
    }

    #[test]
    fn sqlite_path_replaces_mysql_requirements() {
        let overrides = SettingsOverrides {
            bookstack_url: Some("https://wiki.example.org".to_string()),
            sqlite_path: Some(PathBuf::from("dump.sqlite")),
            ..SettingsOverrides::default()
        };

        let settings =
            resolve_settings_with_env(&overrides, &ExportFileConfig::default(), no_env)
                .expect("resolve");

        assert_eq!(
            settings.source,
            PageSourceSettings::Sqlite(PathBuf::from("dump.sqlite"))
        );
    }

    #[test]
    fn missing_required_values_name_every_input() {
        let error = resolve_settings_with_env(
            &SettingsOverrides::default(),
            &ExportFileConfig::default(),
            no_env,
        )
        .expect_err("must fail");
        let message = error.to_string();
        assert!(message.contains("--bookstack-url"));
        assert!(message.contains("BOOKSTACK_URL"));
        assert!(message.contains("bookstack.url"));

        let overrides = SettingsOverrides {
            bookstack_url: Some("https://wiki.example.org".to_string()),
            ..SettingsOverrides::default()
        };
        let error = resolve_settings_with_env(&overrides, &ExportFileConfig::default(), no_env)
            .expect_err("must fail");
        assert!(error.to_string().contains("--mysql-host"));
    }

    #[test]
    fn verify_tls_flag_overrides_config() {
        let mut file = ExportFileConfig::default();
        file.http.accept_invalid_certs = Some(true);
        let mut overrides = mysql_overrides();
        overrides.verify_tls = true;

        let settings = resolve_settings_with_env(&overrides, &file, no_env).expect("resolve");
        assert!(!settings.fetch.accept_invalid_certs);
    }

    #[test]
    fn invalid_env_numbers_are_rejected() {
        let error = resolve_settings_with_env(
            &mysql_overrides(),
            &ExportFileConfig::default(),
            |key| (key == "BOOKSTACK_DB_PORT").then(|| "not-a-port".to_string()),
        )
        .expect_err("must fail");
        assert!(error.to_string().contains("invalid MySQL port"));
    }

    #[test]
    fn diagnostics_never_print_the_password() {
        let settings =
            resolve_settings_with_env(&mysql_overrides(), &ExportFileConfig::default(), no_env)
                .expect("resolve");
        let diagnostics = settings.diagnostics();
        assert!(!diagnostics.contains("secret"));
        assert!(diagnostics.contains("source=mysql://reader@db.internal:3306/bookstack"));
        assert!(diagnostics.contains("origin.bookstack_url=flag"));
    }
}
