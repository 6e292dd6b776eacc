use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = peerrank_worker::Args::parse();

	peerrank_worker::run(args).await
}
