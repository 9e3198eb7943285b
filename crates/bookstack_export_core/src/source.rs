use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::debug;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};
use rusqlite::{Connection, OpenFlags};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MYSQL_DATABASE: &str = "bookstack";

/// Every non-template page that sits in a book on at least one shelf. Books
/// that are not shelved are not exported.
pub const PAGES_QUERY: &str = "SELECT s.name, b.name, p.name, p.markdown, p.draft
FROM bookshelves s
JOIN bookshelves_books bb ON s.id = bb.bookshelf_id
JOIN books b ON b.id = bb.book_id
JOIN pages p ON b.id = p.book_id
WHERE p.template = 0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub shelf: String,
    pub book: String,
    pub title: String,
    pub markdown: String,
    pub is_draft: bool,
}

pub trait PageSource {
    fn describe(&self) -> String;
    fn load_pages(&mut self) -> Result<Vec<PageRecord>>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct MysqlOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for MysqlOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MysqlOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

pub struct MysqlPageSource {
    options: MysqlOptions,
}

impl MysqlPageSource {
    pub fn new(options: MysqlOptions) -> Self {
        Self { options }
    }
}

impl PageSource for MysqlPageSource {
    fn describe(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.options.user, self.options.host, self.options.port, self.options.database
        )
    }

    fn load_pages(&mut self) -> Result<Vec<PageRecord>> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(self.options.host.clone()))
            .tcp_port(self.options.port)
            .user(Some(self.options.user.clone()))
            .pass(Some(self.options.password.clone()))
            .db_name(Some(self.options.database.clone()));
        let mut connection =
            Conn::new(opts).with_context(|| format!("failed to connect to {}", self.describe()))?;

        let rows: Vec<(String, String, String, Option<String>, bool)> = connection
            .query(PAGES_QUERY)
            .context("failed to query BookStack pages")?;
        debug!("mysql returned {} page rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|(shelf, book, title, markdown, is_draft)| PageRecord {
                shelf,
                book,
                title,
                markdown: markdown.unwrap_or_default(),
                is_draft,
            })
            .collect())
    }
}

/// Reads pages from a SQLite file that holds the BookStack tables, e.g. an
/// offline copy of the production database.
pub struct SqlitePageSource {
    db_path: PathBuf,
}

impl SqlitePageSource {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl PageSource for SqlitePageSource {
    fn describe(&self) -> String {
        format!("sqlite://{}", normalize_path(&self.db_path))
    }

    fn load_pages(&mut self) -> Result<Vec<PageRecord>> {
        if !self.db_path.is_file() {
            bail!("SQLite database not found: {}", self.db_path.display());
        }
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {}", self.db_path.display()))?;

        let mut statement = connection
            .prepare(PAGES_QUERY)
            .context("failed to prepare BookStack page query")?;
        let rows = statement
            .query_map([], |row| {
                let markdown: Option<String> = row.get(3)?;
                Ok(PageRecord {
                    shelf: row.get(0)?,
                    book: row.get(1)?,
                    title: row.get(2)?,
                    markdown: markdown.unwrap_or_default(),
                    is_draft: row.get(4)?,
                })
            })
            .context("failed to run BookStack page query")?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(row.context("failed to read BookStack page row")?);
        }
        debug!("sqlite returned {} page rows", pages.len());
        Ok(pages)
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
