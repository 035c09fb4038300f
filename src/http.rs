// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Minimal HTTP/1.1 transport for the control API.
//!
//! One request per connection, bodies sized by `Content-Length`. That is
//! all the energy manager and `atonctl` need.

use std::io;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{self, Duration};

use crate::api::{self, Response};
use crate::state::SharedState;

/// Upper bound for request bodies.
const MAX_BODY_BYTES: usize = 64 * 1024;
/// Upper bound for the request line plus all header lines.
const MAX_HEADER_BYTES: usize = 8 * 1024;
const MAX_HEADER_LINES: usize = 64;

/// A client has this long to deliver its whole request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Accept connections until `shutdown` is notified.
pub async fn serve(listener: TcpListener, state: SharedState, shutdown: Arc<Notify>) {
    let stop = shutdown.notified();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        log::debug!("Connection from {addr}");
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &state).await {
                                log::debug!("Connection from {addr} failed: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Failed to accept connection: {e}");
                    }
                }
            }
            _ = &mut stop => {
                break;
            }
        }
    }
}

/// Read one request, apply it and write the response.
pub async fn handle_connection<S>(stream: S, state: &SharedState) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let request = time::timeout(REQUEST_TIMEOUT, read_request(&mut reader))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request timed out"))?;

    let response = match request {
        Ok(req) => match api::parse_request(&req.method, &req.path, &req.body) {
            Ok(request) => api::handle(request, state).await,
            Err(response) => response,
        },
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Response::BadRequest(format!("Malformed request: {e}"))
        }
        Err(e) => return Err(e),
    };

    writer.write_all(&encode_response(&response)).await?;
    writer.shutdown().await
}

async fn read_request<R>(reader: &mut R) -> io::Result<HttpRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = MAX_HEADER_BYTES;
    let mut line = String::new();
    if read_header_line(reader, &mut line, &mut budget).await? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
    }

    let mut parts = line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid(format!("bad request line {:?}", line.trim_end())));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(invalid(format!("unsupported version {version}")));
    }
    let (method, path) = (method.to_string(), path.to_string());

    let mut content_length = 0usize;
    let mut header_lines = 0;
    loop {
        line.clear();
        if read_header_line(reader, &mut line, &mut budget).await? == 0 {
            return Err(invalid("truncated headers".to_string()));
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADER_LINES {
            return Err(invalid("too many headers".to_string()));
        }
        let Some((name, value)) = header.split_once(':') else {
            return Err(invalid(format!("bad header {header:?}")));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad content-length {value:?}")))?;
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(invalid(format!("body too large ({content_length} bytes)")));
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            invalid(format!("body shorter than Content-Length {content_length}"))
        } else {
            e
        }
    })?;
    let body = String::from_utf8(body).map_err(|_| invalid("body is not UTF-8".to_string()))?;

    Ok(HttpRequest { method, path, body })
}

/// Read one line, charging it against the remaining header `budget`.
async fn read_header_line<R>(
    reader: &mut R,
    line: &mut String,
    budget: &mut usize,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let n = (&mut *reader).take(*budget as u64).read_line(line).await?;
    *budget -= n;
    if n > 0 && !line.ends_with('\n') {
        if *budget == 0 {
            return Err(invalid(format!("header section exceeds {MAX_HEADER_BYTES} bytes")));
        }
        return Err(invalid("truncated headers".to_string()));
    }
    Ok(n)
}

fn encode_response(response: &Response) -> Vec<u8> {
    let (content_type, body) = match response {
        Response::Ok => ("text/plain; charset=utf-8", String::new()),
        Response::State(report) => match serde_json::to_string(report) {
            Ok(json) => ("application/json", json),
            Err(e) => {
                log::error!("Failed to encode state: {e}");
                ("text/plain; charset=utf-8", format!("Error: {e}"))
            }
        },
        Response::BadRequest(message) => ("text/plain; charset=utf-8", format!("{message}\n")),
        Response::MethodNotAllowed => (
            "text/plain; charset=utf-8",
            "Method not allowed\n".to_string(),
        ),
        Response::NotFound => ("text/plain; charset=utf-8", "404 page not found\n".to_string()),
    };

    let code = response.status_code();
    format!(
        "HTTP/1.1 {code} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(code),
        body.len()
    )
    .into_bytes()
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Send a request to `addr` and return the status code and body.
pub async fn send(addr: &str, method: &str, path: &str, body: &str) -> io::Result<(u16, String)> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    parse_response(&String::from_utf8_lossy(&raw))
}

fn parse_response(raw: &str) -> io::Result<(u16, String)> {
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| invalid("truncated response".to_string()))?;
    let status_line = head.lines().next().unwrap_or_default();
    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| invalid(format!("bad status line {status_line:?}")))?;
    Ok((code, body.to_string()))
}
