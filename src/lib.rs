pub mod calendar;
pub mod cursor;
pub mod fetcher;
pub mod logging;
pub mod message;
pub mod navigator;
pub mod session;
pub mod storage;
pub mod web_client;
pub mod window;
