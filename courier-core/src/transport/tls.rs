use std::{fs::File, future::Future, io, io::BufReader, path::Path, sync::Arc};

use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::{config::TlsConfig, debug, error::Error};

use super::{tcp::TcpConnector, Connector};

fn load_roots<P: AsRef<Path>>(ca_file: P) -> Result<RootCertStore, Error> {
    let ca_file = &mut BufReader::new(File::open(ca_file)?);
    let certs = rustls_pemfile::certs(ca_file).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::InvalidCertificate("no CA certificate found".to_string()));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;
    }
    Ok(roots)
}

pub fn rustls_client_config(cfg: &TlsConfig) -> Result<ClientConfig, Error> {
    let client_auth = match (&cfg.cert_file, &cfg.key_file) {
        (Some(cert_file), Some(key_file)) => Some((cert_file, key_file)),
        (None, None) => None,
        _ => {
            return Err(Error::InvalidOptions(
                "client certificate and key must be given together".to_string(),
            ))
        }
    };

    let builder = ClientConfig::builder().with_root_certificates(load_roots(&cfg.ca_file)?);
    match client_auth {
        Some((cert_file, key_file)) => {
            let cert_file = &mut BufReader::new(File::open(cert_file)?);
            let key_file = &mut BufReader::new(File::open(key_file)?);
            let cert_chain = rustls_pemfile::certs(cert_file).collect::<Result<Vec<_>, _>>()?;
            let key = rustls_pemfile::private_key(key_file)?
                .ok_or(Error::InvalidCertificate("invalid client key".to_string()))?;
            Ok(builder.with_client_auth_cert(cert_chain, key)?)
        }
        None => Ok(builder.with_no_client_auth()),
    }
}

/// Host part of `host:port`, brackets stripped from IPv6 literals
fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

pub struct TlsConnector {
    tcp: TcpConnector,
    connector: tokio_rustls::TlsConnector,
    server_name: ServerName<'static>,
}

impl TlsConnector {
    pub fn new<A: Into<String>>(address: A, cfg: &TlsConfig) -> Result<Self, Error> {
        let tcp = TcpConnector::new(address);
        let name = cfg
            .server_name
            .as_deref()
            .unwrap_or_else(|| host_of(tcp.address()));
        let server_name = ServerName::try_from(name)
            .map_err(|e| Error::InvalidOptions(format!("invalid server name {name}: {e}")))?
            .to_owned();
        let connector = tokio_rustls::TlsConnector::from(Arc::new(rustls_client_config(cfg)?));

        Ok(Self {
            tcp,
            connector,
            server_name,
        })
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        async move {
            let stream = self.tcp.connect().await?;
            let stream = self
                .connector
                .connect(self.server_name.clone(), stream)
                .await?;
            debug!("tls handshake with {:?} done", self.server_name);
            Ok(stream)
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("courier-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn host_parsing() {
        assert_eq!(host_of("broker.local:8883"), "broker.local");
        assert_eq!(host_of("broker.local"), "broker.local");
        assert_eq!(host_of("[::1]:8883"), "::1");
        assert_eq!(host_of("10.0.0.1:8883"), "10.0.0.1");
    }

    #[test]
    fn missing_ca_file() {
        let cfg = TlsConfig::new("/nonexistent/ca.pem");
        assert!(matches!(rustls_client_config(&cfg), Err(Error::Io(_))));
    }

    #[test]
    fn empty_ca_file() {
        let cfg = TlsConfig::new(temp_file("empty-ca.pem", ""));
        assert!(matches!(
            rustls_client_config(&cfg),
            Err(Error::InvalidCertificate(_))
        ));
    }

    #[test]
    fn half_client_auth() {
        let mut cfg = TlsConfig::new("/nonexistent/ca.pem");
        cfg.cert_file = Some(PathBuf::from("/nonexistent/cert.pem"));
        assert!(matches!(
            TlsConnector::new("broker:8883", &cfg),
            Err(Error::InvalidOptions(_))
        ));
    }
}
