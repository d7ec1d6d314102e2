//! CLI Commands

pub mod extract;
pub mod import;
pub mod init;
pub mod pages;
