use clap::Parser;
use voxita_relay::config::RelayConfig;
use voxita_relay::server::{self, AppState};

#[derive(Debug, Parser)]
#[command(
    name = "voxita-relay",
    about = "Chat relay with local desktop command dispatch"
)]
struct Args {
    /// Address to bind the HTTP server on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind the HTTP server on
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = RelayConfig::from_env(args.host, args.port);
    let state = AppState::new(config.clone())?;
    actix_web::rt::System::new().block_on(server::startup(config, state))?;
    Ok(())
}
