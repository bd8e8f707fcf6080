use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "relayd", about = "Multi-tenant message relay for agent connections")]
pub struct Cli {
    /// Address to bind the agent WebSocket listener to.
    #[arg(long = "bind", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_addr: IpAddr,

    #[arg(long, default_value_t = 9090)]
    pub port: u16,
}
