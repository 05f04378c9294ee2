use anyhow::{Context, Result};
use reqwest::blocking::Response as HttpResponse;
use serde_json::Value;
use thumbdeck_contracts::error::PipelineError;

pub const ERROR_BODY_MAX_CHARS: usize = 512;

/// Parse a JSON body, turning non-2xx responses into `PipelineError::Upstream`.
pub fn response_json_or_error(service: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{service} response body read failed"))?;
    if !status.is_success() {
        return Err(upstream_error(service, status.as_u16(), &body).into());
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{service} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub fn response_bytes_or_error(service: &str, response: HttpResponse) -> Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(upstream_error(service, status.as_u16(), &body).into());
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("{service} response body read failed"))?;
    Ok(bytes.to_vec())
}

/// Non-2xx reply as a typed error; the body is trimmed and capped.
pub fn upstream_error(service: &str, status: u16, body: &str) -> PipelineError {
    PipelineError::Upstream {
        service: service.to_string(),
        status,
        body: truncate_text(body.trim(), ERROR_BODY_MAX_CHARS),
    }
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub fn trimmed_base_url(raw: Option<String>, default: &str) -> String {
    raw.map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use reqwest::blocking::Client as HttpClient;
    use thumbdeck_contracts::error::PipelineError;

    use super::{
        response_bytes_or_error, response_json_or_error, trimmed_base_url, truncate_text,
        upstream_error, ERROR_BODY_MAX_CHARS,
    };

    /// Serve exactly one canned HTTP reply on a loopback port.
    fn serve_once(status_line: &'static str, body: String) -> anyhow::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while let Ok(read) = stream.read(&mut chunk) {
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..read]);
                    if request.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {status_line}\r\n\
                     Content-Type: text/plain\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        Ok(format!("http://{addr}/"))
    }

    #[test]
    fn upstream_error_names_service_status_and_body() {
        let err = upstream_error("Gemini", 429, "  quota exhausted \n");
        assert_eq!(err.to_string(), "Gemini returned 429: quota exhausted");

        let long = "x".repeat(ERROR_BODY_MAX_CHARS + 100);
        match upstream_error("search", 500, &long) {
            PipelineError::Upstream { body, .. } => {
                assert_eq!(body.chars().count(), ERROR_BODY_MAX_CHARS + 1);
                assert!(body.ends_with('…'));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_helper_turns_503_into_upstream() -> anyhow::Result<()> {
        let url = serve_once("503 Service Unavailable", "backend down".to_string())?;
        let response = HttpClient::new().get(&url).send()?;
        let err = response_json_or_error("ScrapeCreators search", response).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Upstream {
                service,
                status,
                body,
            }) => {
                assert_eq!(service, "ScrapeCreators search");
                assert_eq!(*status, 503);
                assert_eq!(body, "backend down");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(format!("{err:#}").contains("503"));
        Ok(())
    }

    #[test]
    fn bytes_helper_truncates_long_error_bodies() -> anyhow::Result<()> {
        let url = serve_once("503 Service Unavailable", "e".repeat(2_000))?;
        let response = HttpClient::new().get(&url).send()?;
        let err = response_bytes_or_error("thumbnail host", response).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Upstream { status, body, .. }) => {
                assert_eq!(*status, 503);
                assert_eq!(body.chars().count(), ERROR_BODY_MAX_CHARS + 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn success_bodies_pass_through() -> anyhow::Result<()> {
        let url = serve_once("200 OK", "{\"videos\":[]}".to_string())?;
        let response = HttpClient::new().get(&url).send()?;
        let payload = response_json_or_error("search", response)?;
        assert_eq!(payload["videos"], serde_json::json!([]));
        Ok(())
    }

    #[test]
    fn truncate_text_marks_cut_bodies() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefgh", 3), "abc…");
        assert_eq!(truncate_text("ééééé", 2), "éé…");
    }

    #[test]
    fn base_url_override_is_trimmed() {
        assert_eq!(
            trimmed_base_url(Some(" http://localhost:9000/ ".to_string()), "https://x"),
            "http://localhost:9000"
        );
        assert_eq!(trimmed_base_url(Some("  ".to_string()), "https://x"), "https://x");
        assert_eq!(trimmed_base_url(None, "https://x"), "https://x");
    }
}
