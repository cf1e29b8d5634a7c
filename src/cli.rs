use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "status-monitor-demo", version, about = "Demo server with a live status page")]
pub struct Cli {
    /// Monitor configuration file (TOML, YAML or JSON); `monitor.*` is
    /// picked up when present
    #[arg(short, long, env = "STATUS_MONITOR_CONFIG")]
    pub config: Option<String>,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// In-process workers generating demo traffic (0 disables)
    #[arg(short, long, default_value_t = 4)]
    pub load_workers: u32,
}
