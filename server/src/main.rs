use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use prompterlink_server::error::ServerError;
use prompterlink_server::qr::lan_ipv4;
use prompterlink_server::router;
use prompterlink_server::state::{AppState, DisplayPolicy, ServerConfig};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    /// What to do when a second display connects.
    #[arg(long, value_enum, default_value_t = DisplayPolicy::Replace)]
    display_policy: DisplayPolicy,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let lan_ip = lan_ipv4().map(|ip| ip.to_string());

    let state = AppState::new(
        ServerConfig {
            port: args.port,
            public_dir,
            lan_ip: lan_ip.clone(),
        },
        args.display_policy,
    );
    let app = router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    let lan_host = lan_ip.as_deref().unwrap_or("localhost");
    tracing::info!(%addr, policy = ?args.display_policy, "relay listening");
    tracing::info!("display: http://localhost:{}", args.port);
    tracing::info!("remote:  http://{lan_host}:{}/remote.html", args.port);

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}
