use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    /// Webhook signing key for the receiving account. When unset, payload
    /// signatures are not validated.
    pub signing_key: Option<String>,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}
