use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                is_autoincrement: false,
                non_null: false,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn from_declared(declared: &str) -> Option<Self> {
        match declared.to_ascii_uppercase().as_str() {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    /// Only meaningful on an INTEGER primary key. Row ids are then never
    /// handed out twice, even after the row holding the highest id is deleted.
    pub is_autoincrement: bool,
    pub non_null: bool,
}

impl Column {
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.is_autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// One row of `PRAGMA table_info` for a column of an existing file.
struct ExistingColumn {
    name: String,
    declared_type: String,
    non_null: bool,
    is_primary_key: bool,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// `(index name, indexed column)`
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let columns: Vec<String> = self.columns.iter().map(Column::definition).collect();
        conn.execute(
            &format!("CREATE TABLE {} ({});", self.name, columns.join(", ")),
            [],
        )?;
        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, column_name),
                [],
            )?;
        }
        Ok(())
    }

    fn existing_columns(&self, conn: &Connection) -> Result<Vec<ExistingColumn>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ExistingColumn {
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    non_null: row.get::<_, i32>(3)? == 1,
                    is_primary_key: row.get::<_, i32>(5)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn check_column(&self, expected: &Column, actual: &ExistingColumn) -> Result<()> {
        let context = format!("Table {} column {}", self.name, expected.name);
        if actual.name != expected.name {
            bail!("{}: found column {} in its place", context, actual.name);
        }
        let actual_type = SqlType::from_declared(&actual.declared_type);
        if actual_type != Some(expected.sql_type) {
            bail!(
                "{}: type mismatch, expected {}, got {}",
                context,
                expected.sql_type.as_sql(),
                actual.declared_type
            );
        }
        if actual.non_null != expected.non_null {
            bail!(
                "{}: non-null mismatch, expected {}, got {}",
                context,
                expected.non_null,
                actual.non_null
            );
        }
        if actual.is_primary_key != expected.is_primary_key {
            bail!(
                "{}: primary key mismatch, expected {}, got {}",
                context,
                expected.is_primary_key,
                actual.is_primary_key
            );
        }
        Ok(())
    }

    /// `PRAGMA table_info` says nothing about AUTOINCREMENT, the stored DDL does.
    fn check_autoincrement(&self, conn: &Connection) -> Result<()> {
        if !self.columns.iter().any(|c| c.is_autoincrement) {
            return Ok(());
        }
        let ddl: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .optional()?;
        match ddl {
            Some(sql) if sql.to_ascii_uppercase().contains("AUTOINCREMENT") => Ok(()),
            _ => bail!(
                "Table {} is missing AUTOINCREMENT on its primary key",
                self.name
            ),
        }
    }

    fn check_indices(&self, conn: &Connection) -> Result<()> {
        for (index_name, _column) in self.indices {
            let found = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1 AND tbl_name = ?2",
                    params![index_name, self.name],
                    |_| Ok(()),
                )
                .optional()
                .with_context(|| format!("Failed to look up index {}", index_name))?;
            if found.is_none() {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let existing = self.existing_columns(conn)?;
        if existing.is_empty() {
            bail!("Table {} does not exist", self.name);
        }
        if existing.len() != self.columns.len() {
            let found: Vec<&str> = existing.iter().map(|c| c.name.as_str()).collect();
            bail!(
                "Table {} has {} columns ({}), expected {}",
                self.name,
                existing.len(),
                found.join(", "),
                self.columns.len()
            );
        }
        for (expected, actual) in self.columns.iter().zip(&existing) {
            self.check_column(expected, actual)?;
        }
        self.check_autoincrement(conn)?;
        self.check_indices(conn)
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
}

impl VersionedSchema {
    /// Creates every table and stamps the file with this schema's version.
    /// Runs inside a single transaction so a crash never leaves a half-built file.
    pub fn create(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        for table in self.tables {
            table.create(&tx)?;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        self.tables.iter().try_for_each(|table| table.validate(conn))
    }
}

pub const BASE_DB_VERSION: usize = 99999;

/// Reads `PRAGMA user_version` and strips the base offset.
/// Returns `None` for a file that was never stamped by us.
pub fn read_schema_version(conn: &Connection) -> Result<Option<usize>> {
    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if raw_version <= BASE_DB_VERSION as i64 {
        return Ok(None);
    }
    Ok(Some(raw_version as usize - BASE_DB_VERSION))
}
