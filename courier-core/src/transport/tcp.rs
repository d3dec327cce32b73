use std::{future::Future, io};

use tokio::net::TcpStream;

use crate::debug;

use super::Connector;

#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new<A: Into<String>>(address: A) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        async move {
            let stream = TcpStream::connect(&self.address).await?;
            stream.set_nodelay(true)?;
            debug!("tcp connected to {}", self.address);
            Ok(stream)
        }
    }
}
