use clap::Parser;

/// Operator client for a matchd server.
///
/// Prints every line the server sends and forwards each stdin line as a
/// command.
#[derive(Parser, Debug)]
#[command(name = "matchd-cli", about = "Operator client for the matchd job scheduler")]
pub struct CliArgs {
    /// Server host name or address
    #[arg(long, env = "MATCHD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(long, env = "MATCHD_PORT", default_value_t = 42424)]
    pub port: u16,

    /// Send a single command, print replies for `--wait` seconds, then exit
    #[arg(long)]
    pub command: Option<String>,

    /// Seconds to keep printing replies after `--command`
    #[arg(long, default_value_t = 1.0)]
    pub wait: f64,
}

impl CliArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
