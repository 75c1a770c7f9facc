use std::fmt;
use std::net::SocketAddr;

/// Identifies one accepted lobby connection. Two connections from the same peer
/// address are told apart by `connection_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientConnectionDescriptor {
    pub connection_id: u64,
    pub host_port: u16,
    pub client_ip: String,
    pub client_port: u16,
}

impl ClientConnectionDescriptor {
    pub fn new(connection_id: u64, host_port: u16, client_ip: String, client_port: u16) -> Self {
        Self {
            connection_id,
            host_port,
            client_ip,
            client_port,
        }
    }

    pub fn from_peer(connection_id: u64, host_port: u16, addr: SocketAddr) -> Self {
        Self::new(connection_id, host_port, addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for ClientConnectionDescriptor {
    // format: tcp+lobby#<connection_id>@<host_port>://<client_ip>:<client_port>
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tcp+lobby#{}@{}://{}:{}",
            self.connection_id, self.host_port, self.client_ip, self.client_port
        )
    }
}
