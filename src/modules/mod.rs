pub mod auth;
pub mod config;
pub mod error;
pub mod firestore;
pub mod parser;
pub mod uploader;
pub mod utility;
