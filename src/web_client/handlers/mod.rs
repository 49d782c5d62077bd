//! Route handler modules for the chatwindow-web REST API.

pub mod health;
pub mod views;
