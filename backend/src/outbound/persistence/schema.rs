//! Diesel table definitions for the PostgreSQL schema.
//!
//! These must match `migrations/` exactly; regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered users. `id` is a UUIDv7 assigned by the service layer.
    users (id) {
        id -> Uuid,
        name -> Varchar,
        /// Lowercase email, unique across users.
        email -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
