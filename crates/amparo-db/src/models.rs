/// Database row types — these map directly to SQLite rows.
/// Distinct from the amparo-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub created_at: String,
}
