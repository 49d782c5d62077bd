//! chatwindow-web: serve conversation windows from a msgstore.db over HTTP.

#[tokio::main]
async fn main() {
    if let Err(error) = chatwindow::web_client::run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
