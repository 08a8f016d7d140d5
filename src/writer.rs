use crate::{config::Config, encode, point::Point};
use log::{debug, info, warn};
use reqwest::{
    blocking::Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::Deserialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    PoisonError, RwLock,
};
use thiserror::Error;

const WRITE_PATH: &str = "/api/v2/write";

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("failed to build http client")]
    Client(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("writer is closed")]
    Closed,
    #[error("failed to get client lock")]
    LockFailure,
    #[error("failed to encode point")]
    Encode(#[source] std::io::Error),
    #[error("error sending write request")]
    Transport(#[source] reqwest::Error),
    #[error("store refused credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("store rejected write ({status}): {message}")]
    Rejected { status: u16, message: String },
}

// Error body returned by the store on a failed write.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client that submits points to one bucket. Each write is a
/// single request; nothing is buffered or retried.
pub struct Writer {
    config: Config,
    write_url: String,
    client: RwLock<Option<Client>>,
    closed: AtomicBool,
}

impl Writer {
    pub fn new(config: Config) -> Result<Self, WriterError> {
        if config.allow_insecure_tls {
            warn!(
                "TLS certificate verification is disabled for {}, only use this against a self-signed test endpoint",
                config.url
            );
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.allow_insecure_tls)
            .build()?;
        let write_url = format!("{}{}", config.url.trim_end_matches('/'), WRITE_PATH);
        debug!(
            "configured writer for {} (org {:?}, bucket {:?}, precision {})",
            write_url, config.org, config.bucket, config.precision
        );

        Ok(Self {
            config,
            write_url,
            client: RwLock::new(Some(client)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends `point` and blocks until the store acknowledges it, the request
    /// fails or the configured timeout elapses.
    pub fn write_point(&self, point: &Point) -> Result<(), WriteError> {
        let client = self.client()?;

        let mut body = Vec::new();
        encode::encode_point(&mut body, point, self.config.precision)
            .map_err(WriteError::Encode)?;
        debug!(
            "writing {} to {}",
            String::from_utf8_lossy(&body).trim_end(),
            self.write_url
        );

        let response = client
            .post(&self.write_url)
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", self.config.precision.as_str()),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.config.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(WriteError::Transport)?;

        let status = response.status();
        if status.is_success() {
            info!(
                "wrote point {} to bucket {:?}",
                point.measurement(),
                self.config.bucket
            );
            return Ok(());
        }

        let message = error_message(status, &response.text().unwrap_or_default());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WriteError::Unauthorized {
                status: status.as_u16(),
                message,
            }),
            _ => Err(WriteError::Rejected {
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// Releases the http client. Safe to call more than once and after a
    /// failed write; later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = match self.client.write() {
            Ok(mut client) => client.take(),
            Err(poisoned) => PoisonError::into_inner(poisoned).take(),
        };
        drop(client);
        info!("closed writer for {}", self.write_url);
    }

    fn client(&self) -> Result<Client, WriteError> {
        if self.is_closed() {
            return Err(WriteError::Closed);
        }
        match self.client.read() {
            // Client is reference counted, cloning shares the connection pool.
            Ok(client) => client.clone().ok_or(WriteError::Closed),
            Err(_) => Err(WriteError::LockFailure),
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.close();
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<ErrorBody>(body) {
        return error.message;
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
