//! Passive data-channel setup for listings and downloads.
//!
//! Supports two modes (RFC 959 + RFC 2428):
//! - **PASV**: server opens a port, client connects
//! - **EPSV**: extended passive (IPv6-ready)

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("valid PASV regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("valid EPSV regex");
}

/// Open a data channel according to the configured mode.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    match mode {
        DataChannelMode::Passive => open_pasv(codec, data_timeout).await,
        DataChannelMode::ExtendedPassive => open_epsv(codec, host, data_timeout).await,
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(codec: &mut FtpCodec, data_timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let addr = parse_pasv_response(&resp.text())?;
    timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect: {}", e)))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(codec: &mut FtpCodec, host: &str, data_timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let addr = format!("{}:{}", host, port);
    timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel("EPSV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("EPSV data connect: {}", e)))
}

fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_reply_yields_socket_address() {
        let addr = parse_pasv_response("227 Entering Passive Mode (192,168,1,20,195,80)").unwrap();
        assert_eq!(addr, "192.168.1.20:50000".parse().unwrap());
    }

    #[test]
    fn pasv_rejects_out_of_range_octets() {
        assert!(parse_pasv_response("227 Entering Passive Mode (300,1,1,1,1,1)").is_err());
        assert!(parse_pasv_response("227 whatever").is_err());
    }

    #[test]
    fn epsv_reply_yields_port() {
        assert_eq!(
            parse_epsv_response("229 Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
        assert!(parse_epsv_response("229 (|||x|)").is_err());
    }
}
