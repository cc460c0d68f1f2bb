//! Database access for fgm-server
//!
//! Schema creation and migrations live in `fgm_common::db`; this module holds
//! the query layers the HTTP handlers call.

pub mod audit;
pub mod profile_details;
pub mod repository;

pub use profile_details::{ProfileDetailAccess, SqliteProfileDetails};
pub use repository::{
    Entity, ListPage, ListQuery, ReadRepository, Record, Repository, SortOrder, SqliteRepository,
};
