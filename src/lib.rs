pub mod app;
pub mod assemble;
pub mod catalog;
pub mod config;
pub mod episodes;
pub mod error;
pub mod home;
pub mod images;
pub mod models;
pub mod providers;
pub mod query;
pub mod tmdb;
pub mod view;
