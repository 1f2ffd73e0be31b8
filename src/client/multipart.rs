//! Minimal multipart/form-data encoder for the detection upload.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self::with_boundary(format!("----parcelscan{nanos:x}"))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part();
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quoted(name)
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.open_part();
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {content_type}\r\n\r\n",
                escape_quoted(name),
                escape_quoted(filename)
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }

    fn open_part(&mut self) {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quoted(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '"' => "%22".to_string(),
            '\r' => "%0D".to_string(),
            '\n' => "%0A".to_string(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_file_parts() {
        let form = Multipart::with_boundary("XYZ")
            .file("file", "box.jpg", "image/jpeg", b"\xff\xd8data")
            .text("tracking_code", "PKG-1");
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
        let body = form.finish();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"--XYZ\r\n");
        expected.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"box.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
        );
        expected.extend_from_slice(b"\xff\xd8data\r\n");
        expected.extend_from_slice(b"--XYZ\r\n");
        expected.extend_from_slice(
            b"Content-Disposition: form-data; name=\"tracking_code\"\r\n\r\nPKG-1\r\n",
        );
        expected.extend_from_slice(b"--XYZ--\r\n");
        assert_eq!(body, expected);
    }

    #[test]
    fn quotes_in_filenames_are_escaped() {
        let body = Multipart::with_boundary("B")
            .file("file", "a\"b.png", "image/png", b"")
            .finish();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"a%22b.png\""));
    }
}
