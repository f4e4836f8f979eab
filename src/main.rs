#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = englift_scoring::run().await {
        eprintln!("englift-scoring fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
