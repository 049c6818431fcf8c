use crate::models::UserRow;
use crate::{COLLECTIONS, Database};
use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, phone, password) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, phone, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, email, phone, password, created_at FROM users")?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        phone: row.get(3)?,
                        password: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Full replace of the mutable user columns. Returns false when no row
    /// has that id.
    pub fn update_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?2, email = ?3, phone = ?4, password = ?5 WHERE id = ?1",
                rusqlite::params![id, name, email, phone, password_hash],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// True when `email` is already registered to a user other than `user_id`.
    /// Lets updates keep their own email without tripping the unique column.
    pub fn email_taken_by_other(&self, email: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
                .optional()?;

            Ok(matches!(existing, Some(id) if id != user_id))
        })
    }

    // -- Owned documents --

    pub fn insert_doc(&self, collection: &str, id: &str, owner_id: &str, doc: &str) -> Result<()> {
        let table = table_name(collection)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("INSERT INTO {table} (id, owner_id, doc) VALUES (?1, ?2, ?3)"),
                rusqlite::params![id, owner_id, doc],
            )?;
            Ok(())
        })
    }

    /// Scoped lookup: a record under someone else's owner id comes back None,
    /// same as a record that does not exist.
    pub fn get_doc(&self, collection: &str, id: &str, owner_id: &str) -> Result<Option<String>> {
        let table = table_name(collection)?;
        self.with_conn(|conn| {
            let doc = conn
                .query_row(
                    &format!("SELECT doc FROM {table} WHERE id = ?1 AND owner_id = ?2"),
                    [id, owner_id],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(doc)
        })
    }

    pub fn list_docs_for_owner(&self, collection: &str, owner_id: &str) -> Result<Vec<String>> {
        let table = table_name(collection)?;
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT doc FROM {table} WHERE owner_id = ?1"))?;

            let docs = stmt
                .query_map([owner_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(docs)
        })
    }

    pub fn list_all_docs(&self, collection: &str) -> Result<Vec<String>> {
        let table = table_name(collection)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT doc FROM {table}"))?;

            let docs = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(docs)
        })
    }

    /// Scoped full replace. Returns false when no row matches both id and
    /// owner, which callers report as not found.
    pub fn replace_doc(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        doc: &str,
    ) -> Result<bool> {
        let table = table_name(collection)?;
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                &format!("UPDATE {table} SET doc = ?3 WHERE id = ?1 AND owner_id = ?2"),
                rusqlite::params![id, owner_id, doc],
            )?;
            Ok(changed > 0)
        })
    }

    /// Scoped delete. Returns false when nothing was deleted, so a repeat
    /// delete of the same id reports not found.
    pub fn delete_doc(&self, collection: &str, id: &str, owner_id: &str) -> Result<bool> {
        let table = table_name(collection)?;
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {table} WHERE id = ?1 AND owner_id = ?2"),
                [id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

// Collection names are compile-time constants upstream, but never splice an
// unchecked one into SQL.
fn table_name(collection: &str) -> Result<&str> {
    if COLLECTIONS.contains(&collection) {
        Ok(collection)
    } else {
        bail!("unknown collection: {}", collection)
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, name, email, phone, password, created_at FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                password: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, name, email, phone, password, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                password: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "11111111-1111-1111-1111-111111111111";
    const BOB: &str = "22222222-2222-2222-2222-222222222222";

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn user_roundtrip() {
        let db = db();
        db.create_user(ALICE, "Alice", "alice@example.com", Some("555-0100"), "hash-a")
            .unwrap();

        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, ALICE);
        assert_eq!(by_email.phone.as_deref(), Some("555-0100"));

        let by_id = db.get_user_by_id(ALICE).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let db = db();
        db.create_user(ALICE, "Alice", "alice@example.com", None, "hash-a")
            .unwrap();

        let err = db
            .create_user(BOB, "Bob", "alice@example.com", None, "hash-b")
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn email_matching_is_case_sensitive() {
        let db = db();
        db.create_user(ALICE, "Alice", "Alice@Example.com", None, "hash-a")
            .unwrap();

        assert!(db.get_user_by_email("alice@example.com").unwrap().is_none());
        // Different case is a different identity, not a conflict.
        db.create_user(BOB, "Bob", "alice@example.com", None, "hash-b")
            .unwrap();
    }

    #[test]
    fn email_taken_by_other_ignores_self() {
        let db = db();
        db.create_user(ALICE, "Alice", "alice@example.com", None, "hash-a")
            .unwrap();

        assert!(!db.email_taken_by_other("alice@example.com", ALICE).unwrap());
        assert!(db.email_taken_by_other("alice@example.com", BOB).unwrap());
        assert!(!db.email_taken_by_other("free@example.com", BOB).unwrap());
    }

    #[test]
    fn update_and_delete_report_missing_users() {
        let db = db();
        assert!(!db.update_user(ALICE, "A", "a@example.com", None, "h").unwrap());
        assert!(!db.delete_user(ALICE).unwrap());

        db.create_user(ALICE, "Alice", "alice@example.com", None, "hash-a")
            .unwrap();
        assert!(db.update_user(ALICE, "Alicia", "alicia@example.com", None, "h2").unwrap());

        let row = db.get_user_by_id(ALICE).unwrap().unwrap();
        assert_eq!(row.name, "Alicia");
        assert_eq!(row.password, "h2");

        assert!(db.delete_user(ALICE).unwrap());
        assert!(!db.delete_user(ALICE).unwrap());
    }

    #[test]
    fn docs_are_owner_scoped() {
        let db = db();
        db.insert_doc("contacts", "c1", ALICE, r#"{"name":"mom"}"#).unwrap();
        db.insert_doc("contacts", "c2", BOB, r#"{"name":"dad"}"#).unwrap();

        assert!(db.get_doc("contacts", "c1", ALICE).unwrap().is_some());
        assert!(db.get_doc("contacts", "c1", BOB).unwrap().is_none());

        let alices = db.list_docs_for_owner("contacts", ALICE).unwrap();
        assert_eq!(alices, vec![r#"{"name":"mom"}"#.to_string()]);

        let all = db.list_all_docs("contacts").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn replace_doc_is_scoped() {
        let db = db();
        db.insert_doc("pets", "p1", ALICE, r#"{"name":"rex"}"#).unwrap();

        assert!(!db.replace_doc("pets", "p1", BOB, r#"{"name":"stolen"}"#).unwrap());
        assert!(db.replace_doc("pets", "p1", ALICE, r#"{"name":"rex ii"}"#).unwrap());

        let doc = db.get_doc("pets", "p1", ALICE).unwrap().unwrap();
        assert_eq!(doc, r#"{"name":"rex ii"}"#);
    }

    #[test]
    fn delete_doc_is_scoped_and_not_idempotent() {
        let db = db();
        db.insert_doc("alerts", "a1", ALICE, "{}").unwrap();

        assert!(!db.delete_doc("alerts", "a1", BOB).unwrap());
        assert!(db.delete_doc("alerts", "a1", ALICE).unwrap());
        assert!(!db.delete_doc("alerts", "a1", ALICE).unwrap());
    }

    #[test]
    fn unknown_collections_are_rejected() {
        let db = db();
        assert!(db.insert_doc("users; DROP TABLE users", "x", ALICE, "{}").is_err());
        assert!(db.list_all_docs("nope").is_err());
    }
}
