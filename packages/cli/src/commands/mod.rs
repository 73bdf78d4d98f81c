pub mod ask;
pub mod chat;
pub mod check;
pub mod endpoints;
pub mod info;
pub mod init;
pub mod questions;
pub mod tts;
