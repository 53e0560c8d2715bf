use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::expect_changed;

const ACCOUNT_COLUMNS: &str = "id, username, full_name, telegram_id, is_active, created_at";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        telegram_id: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_account(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    full_name: Option<&str>,
    telegram_id: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (username, password_hash, full_name, telegram_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![username, password_hash, full_name, telegram_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Option<Account>, DatabaseError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], account_from_row).optional()?)
}

pub fn get_account_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Account>, DatabaseError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1");
    Ok(conn.query_row(&sql, params![username], account_from_row).optional()?)
}

pub fn get_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<AccountCredentials>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, password_hash, is_active FROM accounts WHERE username = ?1",
            params![username],
            |row| {
                Ok(AccountCredentials {
                    id: row.get(0)?,
                    password_hash: row.get(1)?,
                    is_active: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn list_accounts(conn: &Connection, q: Option<&str>) -> Result<Vec<Account>, DatabaseError> {
    let mut conditions = super::Conditions::new();
    conditions.and_search(&["username", "full_name"], q);
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts{} ORDER BY username",
        conditions.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), account_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_account(
    conn: &Connection,
    id: i64,
    full_name: Option<&str>,
    telegram_id: Option<&str>,
    is_active: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE accounts SET full_name = ?1, telegram_id = ?2, is_active = ?3 WHERE id = ?4",
        params![full_name, telegram_id, is_active, id],
    )?;
    expect_changed(changed, "Account", id)
}

pub fn set_password_hash(conn: &Connection, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    expect_changed(changed, "Account", id)
}

/// Deletes the account. Role links cascade; a linked neighborhood keeps
/// existing with its officer cleared.
pub fn delete_account(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
    expect_changed(changed, "Account", id)
}

/// First free username of the form `<prefix><n>`, counting from 1.
pub fn next_free_username(conn: &Connection, prefix: &str) -> Result<String, DatabaseError> {
    let mut n = 1u32;
    loop {
        let candidate = format!("{prefix}{n}");
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1)",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_fetch_by_username() {
        let conn = open_memory_database().unwrap();
        let id = insert_account(&conn, "nodira", "hash", Some("Nodira K."), None).unwrap();

        let account = get_account_by_username(&conn, "nodira").unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.full_name.as_deref(), Some("Nodira K."));
        assert!(account.is_active);

        let creds = get_credentials(&conn, "nodira").unwrap().unwrap();
        assert_eq!(creds.password_hash, "hash");
    }

    #[test]
    fn duplicate_username_is_constraint_error() {
        let conn = open_memory_database().unwrap();
        insert_account(&conn, "same", "h", None, None).unwrap();
        let err = insert_account(&conn, "same", "h", None, None).unwrap_err();
        assert!(err.is_constraint());
    }

    #[test]
    fn update_missing_account_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_account(&conn, 99, None, None, false).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn deleting_officer_account_clears_neighborhood_link() {
        let (conn, seed) = fixtures::seeded();
        delete_account(&conn, seed.officer_a1_account).unwrap();
        let user: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM neighborhoods WHERE id = ?1",
                params![seed.hood_a1],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(user, None);
    }

    #[test]
    fn next_free_username_skips_taken() {
        let (conn, _) = fixtures::seeded();
        // psixiatr1 and psixiatr2 exist in the fixture
        assert_eq!(next_free_username(&conn, "psixiatr").unwrap(), "psixiatr3");
    }

    #[test]
    fn list_accounts_filters_by_term() {
        let (conn, _) = fixtures::seeded();
        let found = list_accounts(&conn, Some("INSPECTOR")).unwrap();
        assert_eq!(found.len(), 3);
    }
}
