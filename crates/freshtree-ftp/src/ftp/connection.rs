//! TCP transport: establishes the FTP control connection.
//!
//! Applies the connect timeout from `FtpConnectionConfig` and reads the
//! server welcome banner.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::{FtpConnectionConfig, FtpResponse};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server welcome banner.
pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<(FtpCodec, FtpResponse)> {
    let addr = format!("{}:{}", config.host, config.port);

    let tcp = timeout(config.connect_timeout(), TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let mut codec = FtpCodec::from_tcp(tcp);
    let banner = codec.read_response().await?;
    if !banner.is_completion() {
        return Err(FtpError::from_reply(banner.code, &banner.text()));
    }
    log::debug!("Connected to {}", addr);
    Ok((codec, banner))
}
