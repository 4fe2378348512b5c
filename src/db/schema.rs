//! SQL for the session table.
//!
//! Identifiers cannot be bound as parameters, so statements are rendered once
//! per table name. The name is validated by `MySqlAuthConfig::validate`
//! before it gets here.

use crate::types::CREDS_KEY;

pub const COL_ACCOUNT: &str = "ws_account";
pub const COL_KEY: &str = "ws_key";
pub const COL_VALUE: &str = "ws_value";

pub const COLUMNS: [&str; 3] = [COL_ACCOUNT, COL_KEY, COL_VALUE];

/// Rendered statements for one session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub table: String,
    pub create_table: String,
    pub select_value: String,
    pub upsert: String,
    pub delete_one: String,
    pub delete_all_but_creds: String,
    pub delete_all: String,
    pub list_keys: String,
}

impl Statements {
    pub fn for_table(table: &str) -> Self {
        // - (ws_account, ws_key) UNIQUE; one row per entry
        // - separate indexes on each column for per-account and per-key scans
        let create_table = format!(
            r#"CREATE TABLE IF NOT EXISTS `{table}` (
    `{COL_ACCOUNT}` VARCHAR(50) NOT NULL,
    `{COL_KEY}` VARCHAR(80) NOT NULL,
    `{COL_VALUE}` JSON NULL,
    UNIQUE KEY `idx_unique` (`{COL_ACCOUNT}`, `{COL_KEY}`),
    KEY `idx_{COL_ACCOUNT}` (`{COL_ACCOUNT}`),
    KEY `idx_{COL_KEY}` (`{COL_KEY}`)
)"#
        );

        Self {
            table: table.to_string(),
            create_table,
            select_value: format!(
                "SELECT `{COL_VALUE}` FROM `{table}` WHERE `{COL_ACCOUNT}` = ? AND `{COL_KEY}` = ?"
            ),
            // The value is bound twice; VALUES() in the update clause is
            // deprecated on MySQL 8.
            upsert: format!(
                "INSERT INTO `{table}` (`{COL_ACCOUNT}`, `{COL_KEY}`, `{COL_VALUE}`) VALUES (?, ?, ?) \
                 ON DUPLICATE KEY UPDATE `{COL_VALUE}` = ?"
            ),
            delete_one: format!(
                "DELETE FROM `{table}` WHERE `{COL_ACCOUNT}` = ? AND `{COL_KEY}` = ?"
            ),
            delete_all_but_creds: format!(
                "DELETE FROM `{table}` WHERE `{COL_ACCOUNT}` = ? AND `{COL_KEY}` <> '{CREDS_KEY}'"
            ),
            delete_all: format!("DELETE FROM `{table}` WHERE `{COL_ACCOUNT}` = ?"),
            list_keys: format!(
                "SELECT `{COL_KEY}` FROM `{table}` WHERE `{COL_ACCOUNT}` = ? ORDER BY `{COL_KEY}`"
            ),
        }
    }

    fn all(&self) -> [&str; 7] {
        [
            &self.create_table,
            &self.select_value,
            &self.upsert,
            &self.delete_one,
            &self.delete_all_but_creds,
            &self.delete_all,
            &self.list_keys,
        ]
    }
}

/// Backtick-quoted identifiers in `sql`, in order of appearance.
fn quoted_identifiers(sql: &str) -> Vec<&str> {
    sql.split('`').skip(1).step_by(2).collect()
}

/// Identifiers that are neither the table, an index, nor a declared column.
pub fn undeclared_identifiers<'a>(stmts: &'a Statements) -> Vec<&'a str> {
    stmts
        .all()
        .into_iter()
        .flat_map(quoted_identifiers)
        .filter(|ident| {
            *ident != stmts.table && !ident.starts_with("idx_") && !COLUMNS.contains(ident)
        })
        .collect()
}
