// lib.rs - Library root for the go-formatter editor integration

pub mod buffer;
pub mod cli;
pub mod config;
pub mod cursor;
pub mod formatter;
pub mod host;
pub mod integration;
pub mod language;
pub mod project;
pub mod subscription;
pub mod workspace;
