#[tokio::main]
async fn main() -> std::io::Result<()> {
    booking_server::run_with_config().await
}
