pub mod app;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod handler;
pub mod openai;
pub mod tui;
pub mod ui;
