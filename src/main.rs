use cloud_data_sync::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::main().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
