//! Per-request FTP session: owns one control connection.
//!
//! Lifecycle: `connect()` → authenticate → `TYPE I` → one or more
//! commands → `quit()`. No session outlives the operation that opened it,
//! so credentials are sent again on every request.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::transfer;
use crate::ftp::types::*;
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// A connected, logged-in FTP session.
pub struct FtpClient {
    codec: FtpCodec,
    config: FtpConnectionConfig,
}

impl FtpClient {
    /// Connect, log in and switch to binary mode.
    pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let (mut codec, _banner) = connection::connect(config).await?;

        // ── Authenticate ─────────────────────────────────────────
        let creds = &config.credentials;
        let user_resp = codec.execute(&format!("USER {}", creds.username)).await?;
        if user_resp.code == 331 {
            let pass_resp = codec.execute(&format!("PASS {}", creds.password)).await?;
            if !pass_resp.is_completion() {
                return Err(FtpError::auth_failed(format!("Login failed: {}", pass_resp.text()))
                    .with_code(pass_resp.code));
            }
        } else if !user_resp.is_completion() {
            return Err(FtpError::auth_failed(format!("USER rejected: {}", user_resp.text()))
                .with_code(user_resp.code));
        }

        // ── TYPE ─────────────────────────────────────────────────
        codec.expect_ok("TYPE I").await?;

        Ok(Self {
            codec,
            config: config.clone(),
        })
    }

    // ─── CWD ─────────────────────────────────────────────────────

    /// Change into `path`.
    pub async fn cwd(&mut self, path: &str) -> FtpResult<()> {
        self.codec.expect_ok(&format!("CWD {}", path)).await?;
        Ok(())
    }

    // ─── Data channel helper ─────────────────────────────────────

    async fn open_data_channel(&mut self) -> FtpResult<TcpStream> {
        transfer::open_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &self.config.host,
            self.config.data_timeout(),
        )
        .await
    }

    /// Open the data channel and issue a transfer command, returning the
    /// connected data socket once the server has accepted the command.
    ///
    /// The flag is `true` when the server answered with a completion reply
    /// straight away, in which case no further reply follows the data.
    async fn start_transfer(&mut self, cmd: &str) -> FtpResult<(TcpStream, bool)> {
        let ds = self.open_data_channel().await?;
        let resp = self.codec.execute(cmd).await?;
        if resp.is_completion() {
            log::debug!("{} completed without a preliminary reply", cmd);
            return Ok((ds, true));
        }
        if !resp.is_preliminary() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok((ds, false))
    }

    /// Read the `226` that closes a data transfer.
    async fn finish_transfer(&mut self) -> FtpResult<()> {
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(())
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// `CWD` into `path` and return the raw `LIST` body.
    pub async fn list(&mut self, path: &str) -> FtpResult<String> {
        self.cwd(path).await?;
        let (mut ds, completed) = self.start_transfer("LIST").await?;
        let mut buf = Vec::new();
        ds.read_to_end(&mut buf).await?;
        drop(ds);
        if !completed {
            self.finish_transfer().await?;
        }
        log::debug!("LIST {} returned {} bytes", path, buf.len());
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    // ─── SIZE / MDTM ─────────────────────────────────────────────

    /// Get the size of a remote file (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let resp = self.codec.expect_ok(&format!("SIZE {}", path)).await?;
        let text = resp.text();
        // "213 12345"
        text.split_whitespace()
            .nth(1)
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse SIZE: {}", text)))
    }

    /// Get the modification time of a remote file (RFC 3659 MDTM).
    pub async fn mdtm(&mut self, path: &str) -> FtpResult<DateTime<Utc>> {
        let resp = self.codec.expect_ok(&format!("MDTM {}", path)).await?;
        let text = resp.text();
        // "213 20260101120000"
        text.split_whitespace()
            .nth(1)
            .and_then(parser::parse_mdtm_time)
            .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse MDTM: {}", text)))
    }

    // ─── RETR ────────────────────────────────────────────────────

    /// Start downloading `path`; the session moves into the returned stream.
    pub async fn retr(mut self, path: &str) -> FtpResult<Retrieval> {
        let (data, completed) = self.start_transfer(&format!("RETR {}", path)).await?;
        Ok(Retrieval {
            client: self,
            data,
            completed,
        })
    }

    // ─── QUIT ────────────────────────────────────────────────────

    /// Gracefully close the session.
    pub async fn quit(mut self) {
        let _ = self.codec.execute("QUIT").await;
    }
}

/// An in-flight `RETR`: the data socket plus the session awaiting `226`.
pub struct Retrieval {
    client: FtpClient,
    data: TcpStream,
    /// The completion reply already arrived with the `RETR` answer.
    completed: bool,
}

impl Retrieval {
    /// Read up to `buf.len()` bytes; `0` means the server closed the stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> FtpResult<usize> {
        self.data
            .read(buf)
            .await
            .map_err(|e| FtpError::transfer_failed(format!("Data channel read: {}", e)))
    }

    /// Close the data socket, wait for the completion reply and log out.
    pub async fn finish(self) -> FtpResult<()> {
        let Retrieval {
            mut client,
            data,
            completed,
        } = self;
        drop(data);
        if !completed {
            client.finish_transfer().await?;
        }
        client.quit().await;
        Ok(())
    }
}
