//! Loopback listener for the authorization redirect.
//!
//! Binds the host and port of the redirect URI and waits for the browser to
//! come back with `state` and `code` (or `error`). The listener answers the
//! first matching request and shuts down, so the parameters are consumed
//! exactly once.

use crate::service::CallbackParams;
use crate::{OAuthError, OAuthResult};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use url::Url;

/// Time a single connection may take to send its request
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Local HTTP listener receiving the authorization redirect
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
    timeout: Duration,
}

impl CallbackListener {
    /// Bind the address of a loopback redirect URI
    pub async fn bind(redirect_uri: &Url, timeout: Duration) -> OAuthResult<Self> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| OAuthError::Callback(format!("{} has no host", redirect_uri)))?;
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host.trim_matches(['[', ']']), port);

        let listener = TcpListener::bind(&addr).await?;
        info!("OAuth callback listener on {}", addr);

        Ok(Self {
            listener,
            path: redirect_uri.path().to_string(),
            timeout,
        })
    }

    pub fn local_addr(&self) -> OAuthResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the redirect and return its parameters
    pub async fn wait_for_callback(self) -> OAuthResult<CallbackParams> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.accept_loop())
            .await
            .map_err(|_| OAuthError::Timeout)?
    }

    async fn accept_loop(self) -> OAuthResult<CallbackParams> {
        // One task per socket; an idle connection must not hold up the redirect
        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (mut socket, peer) = accepted?;
                    debug!("Callback connection from {}", peer);

                    let tx = tx.clone();
                    let path = self.path.clone();
                    tokio::spawn(async move {
                        match handle_connection(&mut socket, &path).await {
                            Ok(Some(params)) => {
                                let _ = tx.send(params).await;
                            }
                            Ok(None) => {}
                            Err(e) => warn!("Error handling callback connection: {}", e),
                        }
                    });
                }
                Some(params) = rx.recv() => return Ok(params),
            }
        }
    }
}

/// Serve one request; returns the parameters if it was the redirect
async fn handle_connection(
    socket: &mut TcpStream,
    expected_path: &str,
) -> OAuthResult<Option<CallbackParams>> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    let read_request = async {
        reader.read_line(&mut request_line).await?;

        // Drain headers so closing the socket does not reset the connection
        let mut header = String::new();
        while reader.read_line(&mut header).await? > 2 {
            header.clear();
        }
        Ok::<_, std::io::Error>(())
    };
    tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request)
        .await
        .map_err(|_| OAuthError::Callback("request not received in time".to_string()))??;

    // GET /callback?state=...&code=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        send_response(&mut writer, 400, "Bad Request", "Bad Request").await?;
        return Ok(None);
    };
    if method != "GET" {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    }

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != expected_path {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    }

    let params = CallbackParams::from_query(query);
    if !params.is_authorization_response() {
        send_response(
            &mut writer,
            400,
            "Bad Request",
            &error_page("Missing authorization response parameters"),
        )
        .await?;
        return Ok(None);
    }

    match &params.error {
        Some(error) => send_response(&mut writer, 200, "OK", &error_page(error)).await?,
        None => send_response(&mut writer, 200, "OK", &success_page()).await?,
    }
    Ok(Some(params))
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> OAuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>repo-kit - Signed in</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Signed in</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>repo-kit - Sign-in failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Sign-in failed</h1>
<p>Error: {}</p>
<p>You can close this window and try again.</p>
</body>
</html>"#,
        html_escape(error)
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
