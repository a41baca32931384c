//! `vantage <ip> <port> <url>`
//!
//! Waits for agents on ip:port, asks each for `url`, and prints every page
//! it gets back once the operator types `q`.

use clap::Parser;
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use vantage::{
    cancel_channel, spawn_stdin_watcher, write_report, Campaign, CampaignOptions,
    GeoPluginLocator, Locator, NullLocator,
};

#[derive(Debug, Parser)]
#[command(name = "vantage", version, about = "Collect viewpoints of a URL from remote agents")]
struct Args {
    /// Address to listen on
    ip: Ipv4Addr,

    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// URL every agent is asked to fetch
    url: String,

    /// Seconds to wait for an agent's page (0 = forever)
    #[arg(long, default_value_t = 60)]
    recv_timeout: u64,

    /// Seconds to wait for the URL to be sent (0 = forever)
    #[arg(long, default_value_t = 30)]
    send_timeout: u64,

    /// Seconds shutdown waits for busy workers (0 = forever)
    #[arg(long, default_value_t = 120)]
    drain_timeout: u64,

    /// Reject pages larger than this many bytes
    #[arg(long)]
    max_frame_len: Option<usize>,

    /// Skip agent geolocation
    #[arg(long)]
    no_geolocate: bool,

    /// Leave Nagle's algorithm on for agent sockets
    #[arg(long)]
    no_tcp_nodelay: bool,
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

impl Args {
    fn options(&self) -> CampaignOptions {
        let mut options = CampaignOptions::unbounded().with_tcp_nodelay(!self.no_tcp_nodelay);
        if let Some(d) = secs(self.recv_timeout) {
            options = options.with_recv_timeout(d);
        }
        if let Some(d) = secs(self.send_timeout) {
            options = options.with_send_timeout(d);
        }
        if let Some(d) = secs(self.drain_timeout) {
            options = options.with_drain_timeout(d);
        }
        if let Some(max) = self.max_frame_len {
            options = options.with_max_frame_len(max);
        }
        options
    }

    fn locator(&self) -> Arc<dyn Locator> {
        if self.no_geolocate {
            return Arc::new(NullLocator);
        }
        match GeoPluginLocator::new() {
            Ok(locator) => Arc::new(locator),
            Err(e) => {
                warn!("geolocation disabled: {}", e);
                Arc::new(NullLocator)
            }
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from((args.ip, args.port));
    let mut campaign =
        Campaign::bind_with(addr, args.url.as_str(), args.options(), args.locator()).await?;

    let (canceller, cancel) = cancel_channel();
    spawn_stdin_watcher(canceller)?;

    {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Waiting for incoming connections...\nq to exit")?;
        stdout.flush()?;
    }

    campaign.run(cancel).await;
    let viewpoints = campaign.shutdown().await;

    write_report(&mut io::stdout().lock(), &viewpoints)?;
    Ok(())
}

fn main() -> ExitCode {
    vantage::dev_tracing::init_cli_tracing("info");
    let args = Args::parse();

    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
