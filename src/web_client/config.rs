//! Configuration types and constants for the chatwindow-web server.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use crate::calendar::Calendar;
use crate::session::MAX_PAGE_SIZE;

pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub(crate) const DEFAULT_DB: &str = "msgstore.db";
pub(crate) const DEFAULT_UTC_OFFSET: &str = "+00:00";
/// Page size used when a request does not name one.
pub(crate) const DEFAULT_PAGE_SIZE: usize = 400;

/// Read-only JSON API over an archived WhatsApp message database.
///
/// Each option can also be given through its environment variable.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "chatwindow-web", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: CHATWINDOW_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Path to msgstore.db [env: CHATWINDOW_DB] [default: ./msgstore.db]
    #[arg(long, short = 'd')]
    pub db: Option<PathBuf>,

    /// UTC offset used to bucket messages into days, e.g. +02:00 [env: CHATWINDOW_UTC_OFFSET]
    #[arg(long, short = 'z', allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Default page size [env: CHATWINDOW_PAGE_SIZE] [default: 400]
    #[arg(long, short = 'p')]
    pub page_size: Option<usize>,
}

#[derive(Debug)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub calendar: Calendar,
    pub page_size: usize,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Result<Self, Box<dyn Error>> {
        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("CHATWINDOW_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let db_path = cli
            .db
            .or_else(|| std::env::var("CHATWINDOW_DB").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

        let offset = cli
            .utc_offset
            .or_else(|| std::env::var("CHATWINDOW_UTC_OFFSET").ok())
            .unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
        let calendar: Calendar = offset
            .parse()
            .map_err(|e| format!("invalid UTC offset {offset:?}: {e}"))?;

        let page_size = match cli.page_size {
            Some(size) => size,
            None => match std::env::var("CHATWINDOW_PAGE_SIZE") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid CHATWINDOW_PAGE_SIZE {raw:?}: {e}"))?,
                Err(_) => DEFAULT_PAGE_SIZE,
            },
        };
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(format!("page size must be between 1 and {MAX_PAGE_SIZE}").into());
        }

        Ok(Self {
            bind_addr,
            db_path,
            calendar,
            page_size,
        })
    }
}
