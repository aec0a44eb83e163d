/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity of an end user as stored on documents and device registrations
/// (usually a login e-mail).
pub type UserId = String;
