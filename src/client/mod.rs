use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::core::DetectionResponse;

mod error;
mod multipart;

pub use error::{DetectError, parse_detail};
pub use multipart::Multipart;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

/// An image ready to be posted to the detection endpoint.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub tracking_code: Option<String>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DetectError> {
        let filename = filename.into();
        let content_type = content_type_for(&filename).ok_or_else(|| {
            DetectError::InvalidImage(format!(
                "{filename}: unsupported file type (expected jpg, png, bmp, webp, gif or tiff)"
            ))
        })?;
        if bytes.is_empty() {
            return Err(DetectError::InvalidImage(format!("{filename}: file is empty")));
        }
        Ok(Self {
            filename,
            content_type,
            bytes,
            tracking_code: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, DetectError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| DetectError::InvalidImage(format!("{}: not a file", path.display())))?;
        // Reject by extension before reading a possibly large file.
        if content_type_for(&filename).is_none() {
            return Err(DetectError::InvalidImage(format!(
                "{filename}: unsupported file type (expected jpg, png, bmp, webp, gif or tiff)"
            )));
        }
        let bytes = std::fs::read(path)
            .map_err(|err| DetectError::InvalidImage(format!("{}: {err}", path.display())))?;
        Self::new(filename, bytes)
    }

    pub fn with_tracking_code(mut self, code: Option<String>) -> Self {
        self.tracking_code = code.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn to_multipart(&self) -> Multipart {
        let form = Multipart::new().file("file", &self.filename, self.content_type, &self.bytes);
        match &self.tracking_code {
            Some(code) => form.text("tracking_code", code),
            None => form,
        }
    }
}

pub fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}

/// The seam between the upload workflow and the network.
pub trait DetectionApi: Send + Sync {
    fn detect(&self, upload: &ImageUpload) -> Result<DetectionResponse, DetectError>;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    opts: ClientOptions,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(opts: ClientOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(opts.timeout)
            .user_agent(concat!("parcelscan/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { opts, agent }
    }

    pub fn base_url(&self) -> &str {
        self.opts.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.opts.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    fn authorize(&self, req: ureq::Request) -> ureq::Request {
        match self.opts.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => req.set("Authorization", &format!("Bearer {token}")),
            _ => req,
        }
    }

    pub fn package_details(&self, tracking_code: &str) -> Result<serde_json::Value, DetectError> {
        let code = tracking_code.trim();
        if code.is_empty() || code.contains('/') {
            return Err(DetectError::Http {
                status: 400,
                detail: Some(format!("invalid tracking code: {tracking_code:?}")),
            });
        }
        let url = self.url(&format!("packages/{code}"));
        log::debug!("GET {url}");
        let started = Instant::now();
        let result = self.authorize(self.agent.get(&url)).call();
        let body = read_body(&url, result, started, self.opts.timeout)?;
        serde_json::from_slice(&body).map_err(|err| DetectError::InvalidResponse(err.to_string()))
    }

    pub fn health(&self) -> Result<serde_json::Value, DetectError> {
        let url = self.url("health");
        log::debug!("GET {url}");
        let started = Instant::now();
        let result = self.agent.get(&url).call();
        let body = read_body(&url, result, started, self.opts.timeout)?;
        serde_json::from_slice(&body).map_err(|err| DetectError::InvalidResponse(err.to_string()))
    }
}

impl DetectionApi for ApiClient {
    fn detect(&self, upload: &ImageUpload) -> Result<DetectionResponse, DetectError> {
        let url = self.url("detect");
        let form = upload.to_multipart();
        let content_type = form.content_type();
        let body = form.finish();
        log::info!(
            "POST {url} file={} type={} bytes={}",
            upload.filename,
            upload.content_type,
            upload.bytes.len()
        );

        let started = Instant::now();
        let result = self
            .authorize(self.agent.post(&url))
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        let body = read_body(&url, result, started, self.opts.timeout)?;
        decode_detection(&body)
    }
}

pub fn decode_detection(body: &[u8]) -> Result<DetectionResponse, DetectError> {
    let resp: DetectionResponse =
        serde_json::from_slice(body).map_err(|err| DetectError::InvalidResponse(err.to_string()))?;
    if !resp.success {
        return Err(DetectError::InvalidResponse(
            "server reported success=false".to_string(),
        ));
    }
    Ok(resp)
}

fn read_body(
    url: &str,
    result: Result<ureq::Response, ureq::Error>,
    started: Instant,
    timeout: Duration,
) -> Result<Vec<u8>, DetectError> {
    match result {
        Ok(resp) => {
            log::info!("{url} -> {} in {:?}", resp.status(), started.elapsed());
            let mut body = Vec::new();
            resp.into_reader().read_to_end(&mut body).map_err(|err| {
                if is_timeout_io(&err) {
                    DetectError::Timeout(timeout)
                } else {
                    DetectError::InvalidResponse(format!("failed to read response body: {err}"))
                }
            })?;
            Ok(body)
        }
        Err(ureq::Error::Status(status, resp)) => {
            let detail = resp.into_string().ok().and_then(|b| parse_detail(&b));
            log::warn!("{url} -> {status} in {:?}", started.elapsed());
            Err(DetectError::from_status(status, detail))
        }
        Err(ureq::Error::Transport(transport)) => {
            log::warn!("{url} transport error after {:?}: {transport}", started.elapsed());
            if transport_timed_out(&transport) || started.elapsed() >= timeout {
                Err(DetectError::Timeout(timeout))
            } else {
                Err(DetectError::Network {
                    url: url.to_string(),
                    source: Box::new(transport),
                })
            }
        }
    }
}

fn transport_timed_out(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_timeout_io(io) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn is_timeout_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}
