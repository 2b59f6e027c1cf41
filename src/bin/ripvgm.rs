//! ripvgm - download soundtrack albums from the command line.

#[tokio::main]
async fn main() {
    let code = ripvgm::cli::run().await;
    std::process::exit(code);
}
