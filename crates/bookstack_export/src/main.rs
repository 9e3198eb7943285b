use std::path::{Path, PathBuf};

use anyhow::Result;
use bookstack_export_core::config::{
    DEFAULT_CONFIG_FILENAME, PageSourceSettings, SettingsOverrides, load_config, resolve_settings,
};
use bookstack_export_core::exporter::ExportConfig;
use bookstack_export_core::images::HttpImageFetcher;
use bookstack_export_core::run::{ExportSummary, export_from_source};
use bookstack_export_core::source::{MysqlPageSource, PageSource, SqlitePageSource};
use clap::Parser;
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(
    name = "bookstack-export",
    version,
    about = "Export BookStack pages to a self-contained Markdown tree"
)]
struct Cli {
    #[arg(long, value_name = "URL", help = "BookStack root URL, e.g. https://wiki.internal")]
    bookstack_url: Option<String>,
    #[arg(long, value_name = "PATH", help = "Directory the shelf/book tree is written to")]
    export_path: Option<PathBuf>,
    #[arg(long, value_name = "HOST")]
    mysql_host: Option<String>,
    #[arg(long, value_name = "PORT")]
    mysql_port: Option<u16>,
    #[arg(long, value_name = "USER")]
    mysql_user: Option<String>,
    #[arg(long, value_name = "PASSWORD")]
    mysql_pass: Option<String>,
    #[arg(long, value_name = "NAME")]
    mysql_db: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Read pages from a SQLite copy of the BookStack tables instead of MySQL"
    )]
    sqlite: Option<PathBuf>,
    #[arg(long, value_name = "MS", help = "Timeout for each image download")]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Validate the wiki's TLS certificate when downloading images")]
    verify_tls: bool,
    #[arg(long, value_name = "PATH", help = "Config file (default: ./bookstack-export.toml)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print resolved settings before exporting")]
    diagnostics: bool,
    #[arg(short, long, help = "Log per-request details")]
    verbose: bool,
    #[arg(long, help = "Print the final report as JSON")]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            bookstack_url: self.bookstack_url.clone(),
            output_dir: self.export_path.clone(),
            mysql_host: self.mysql_host.clone(),
            mysql_port: self.mysql_port,
            mysql_user: self.mysql_user.clone(),
            mysql_password: self.mysql_pass.clone(),
            mysql_database: self.mysql_db.clone(),
            sqlite_path: self.sqlite.clone(),
            timeout_ms: self.timeout_ms,
            verify_tls: self.verify_tls,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_export_command(&cli)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.as_str()),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();
}

fn run_export_command(cli: &Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let file_config = load_config(&config_path)?;
    let settings = resolve_settings(&cli.overrides(), &file_config)?;
    if cli.diagnostics {
        println!("[diagnostics]");
        println!("config_path={}", normalize_path(&config_path));
        println!("{}\n", settings.diagnostics());
    }

    let export_config = ExportConfig::new(&settings.base_url, settings.output_root.clone())?;
    let mut fetcher = HttpImageFetcher::new(&settings.fetch)?;
    let mut source: Box<dyn PageSource> = match &settings.source {
        PageSourceSettings::Mysql(options) => Box::new(MysqlPageSource::new(options.clone())),
        PageSourceSettings::Sqlite(path) => Box::new(SqlitePageSource::new(path.clone())),
    };

    let summary = export_from_source(source.as_mut(), &export_config, &mut fetcher)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ExportSummary) {
    println!("export");
    println!("output_root: {}", normalize_path(&summary.output_root));
    println!("pages_exported: {}", summary.pages_exported);
    println!("images_downloaded: {}", summary.images_downloaded);
    println!(
        "manual_cleanup_required: {}",
        format_flag(summary.manual_attention_required)
    );
    for path in &summary.pages_with_internal_links {
        println!("manual_cleanup.page: {}", normalize_path(path));
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
