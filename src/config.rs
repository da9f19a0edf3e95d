use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use clap::Parser;
use clap::builder::BoolishValueParser;

/// Runtime settings for the chat server.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatd", version, about = "Line-oriented TCP chat server")]
pub struct Config {
    /// IPv4 address to listen on.
    #[arg(long, env = "CHATD_HOST", default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub host: Ipv4Addr,

    /// TCP port to listen on.
    #[arg(long, short, env = "CHATD_PORT", default_value_t = 8008)]
    pub port: u16,

    /// Listen backlog depth.
    #[arg(long, default_value_t = 10)]
    pub backlog: u32,

    /// Seconds between housekeeping ticks of the event loop.
    #[arg(long, default_value_t = 15)]
    pub tick_secs: u64,

    /// Longest accepted input line in bytes; longer lines drop the client.
    #[arg(long, default_value_t = 1024)]
    pub max_line_len: usize,

    /// Longest accepted nickname in characters.
    #[arg(long, default_value_t = 32)]
    pub max_nick_len: usize,

    /// Lines buffered per client before further output to it is dropped.
    #[arg(long, default_value_t = 512)]
    pub outbox_capacity: usize,

    /// Seconds a write to a client may stall before the client is dropped.
    #[arg(long, default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Emit logs as JSON (`1`, `true`, `yes` or `on` when set via env).
    #[arg(long, env = "CHATD_LOG_JSON", value_parser = BoolishValueParser::new())]
    pub log_json: bool,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 8008,
            backlog: 10,
            tick_secs: 15,
            max_line_len: 1024,
            max_nick_len: 32,
            outbox_capacity: 512,
            write_timeout_secs: 10,
            log_json: false,
        }
    }
}
