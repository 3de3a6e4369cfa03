//! Thin CLI entry point (spec.md §1: out of scope beyond this shim).

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    signal_bridge::bootstrap::run().await
}
