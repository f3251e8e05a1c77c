use zia_provider::{init_logging, serve, ZiaProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(ZiaProvider::new()).await
}
