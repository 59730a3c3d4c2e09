pub mod inspect;
pub mod migrate;
pub mod models;
