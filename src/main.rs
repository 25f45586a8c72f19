#[tokio::main]
async fn main() {
    if let Err(e) = ndm_recorder_lib::run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
