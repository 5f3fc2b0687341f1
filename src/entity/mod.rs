//! SeaORM entities, one module per table.
//!
//! Survey data (`survey_response`, `line_counter`, `report`) is written by the
//! ingestion path; `user` and `user_session` back the staff login; and
//! `web_session` is the table behind the cookie session store.

pub mod line_counter;
pub mod report;
pub mod survey_response;
pub mod user;
pub mod user_session;

/// Cookie-session records persisted by [`crate::SeaOrmSessionStore`].
pub mod web_session;
