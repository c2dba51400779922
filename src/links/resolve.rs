use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::redirect::Policy;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

use super::{decode, tracking, CandidateLink, Resolution, ResolvedLink};
use crate::config::{Settings, MAX_RESOLVE_CONCURRENCY};
use crate::error::ResolveError;

/// Follows a URL to its final destination. Implementations must not fail:
/// every problem maps to `Resolution::unresolved()`.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Resolution;
}

/// Body-less HEAD resolution with automatic redirect following.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new(settings: &Settings) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(settings.max_redirects))
            .timeout(settings.resolve_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(HttpResolver { client })
    }

    async fn try_resolve(&self, url: &str) -> Result<Resolution, ResolveError> {
        let parsed = Url::parse(url).map_err(|e| ResolveError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResolveError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let response = self.client.head(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Timeout
            } else {
                ResolveError::Http(e)
            }
        })?;

        Ok(Resolution {
            final_url: Some(response.url().to_string()),
            status_code: Some(response.status().as_u16()),
        })
    }
}

#[async_trait]
impl LinkResolver for HttpResolver {
    async fn resolve(&self, url: &str) -> Resolution {
        match self.try_resolve(url).await {
            Ok(resolution) => resolution,
            Err(e) => {
                debug!(url, error = %e, "unresolved");
                Resolution::unresolved()
            }
        }
    }
}

/// Knobs for one batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_unwrap_depth: usize,
    pub concurrency: usize,
    pub per_call_timeout: Duration,
    pub show_progress: bool,
}

impl BatchOptions {
    pub fn from_settings(settings: &Settings, show_progress: bool) -> Self {
        BatchOptions {
            max_unwrap_depth: settings.max_unwrap_depth,
            concurrency: settings.resolve_concurrency,
            per_call_timeout: settings.resolve_timeout(),
            show_progress,
        }
    }

    fn workers(&self) -> usize {
        self.concurrency.clamp(1, MAX_RESOLVE_CONCURRENCY)
    }

    /// Upper bound for the whole batch; slots still pending after it stay unresolved.
    fn ceiling(&self, links: usize) -> Duration {
        let waves = u32::try_from(links.div_ceil(self.workers())).unwrap_or(u32::MAX);
        self.per_call_timeout.saturating_mul(waves.saturating_add(1))
    }
}

/// Decode and classify without touching the network.
pub fn prepare(candidate: &CandidateLink, max_unwrap_depth: usize) -> ResolvedLink {
    ResolvedLink {
        original: candidate.original.clone(),
        decoded: decode::decode(&candidate.original, max_unwrap_depth),
        final_destination: None,
        status_code: None,
        is_probable_tracker: tracking::is_probable_tracker(&candidate.original),
    }
}

/// Decode, resolve and classify every candidate. The output has one entry per
/// candidate, in candidate order, whatever order the resolutions finish in.
pub async fn resolve_all(
    resolver: Arc<dyn LinkResolver>,
    candidates: &[CandidateLink],
    opts: &BatchOptions,
) -> Vec<ResolvedLink> {
    let mut slots: Vec<ResolvedLink> = candidates
        .iter()
        .map(|c| prepare(c, opts.max_unwrap_depth))
        .collect();
    if slots.is_empty() {
        return slots;
    }

    let total = slots.len();
    let pb = if opts.show_progress {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} links ({per_sec})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let workers = opts.workers();
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<(usize, Resolution)>(workers.saturating_mul(2));
    let mut handles = Vec::with_capacity(total);

    for (idx, slot) in slots.iter().enumerate() {
        let resolver = Arc::clone(&resolver);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let target = slot.decoded.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let resolution = resolver.resolve(&target).await;
            let _ = tx.send((idx, resolution)).await;
        }));
    }
    drop(tx);

    let drain = async {
        while let Some((idx, resolution)) = rx.recv().await {
            let slot = &mut slots[idx];
            slot.final_destination = resolution.final_url;
            slot.status_code = resolution.status_code;
            pb.inc(1);
        }
    };
    if tokio::time::timeout(opts.ceiling(total), drain).await.is_err() {
        warn!("Link resolution hit the batch ceiling; pending links left unresolved");
        for handle in &handles {
            handle.abort();
        }
    }

    pb.finish_and_clear();
    let resolved = slots.iter().filter(|s| s.final_destination.is_some()).count();
    info!("Resolved {} of {} links", resolved, total);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct StubResolver {
        answers: HashMap<String, (u64, Resolution)>,
    }

    #[async_trait]
    impl LinkResolver for StubResolver {
        async fn resolve(&self, url: &str) -> Resolution {
            match self.answers.get(url) {
                Some((delay_ms, r)) => {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    r.clone()
                }
                None => Resolution::unresolved(),
            }
        }
    }

    fn ok(url: &str, code: u16) -> Resolution {
        Resolution {
            final_url: Some(url.to_string()),
            status_code: Some(code),
        }
    }

    fn opts(concurrency: usize) -> BatchOptions {
        BatchOptions {
            max_unwrap_depth: 8,
            concurrency,
            per_call_timeout: Duration::from_secs(2),
            show_progress: false,
        }
    }

    fn test_settings() -> Settings {
        Settings {
            resolve_timeout_secs: 2,
            ..Settings::default()
        }
    }

    /// Minimal loopback HTTP responder: /start redirects to /final, /loop redirects to itself.
    async fn spawn_http_stub() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = sock.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let head = match path.as_str() {
                        "/start" => "HTTP/1.1 302 Found\r\nLocation: /final\r\n".to_string(),
                        "/final" => "HTTP/1.1 200 OK\r\n".to_string(),
                        "/loop" => "HTTP/1.1 301 Moved Permanently\r\nLocation: /loop\r\n".to_string(),
                        _ => "HTTP/1.1 404 Not Found\r\n".to_string(),
                    };
                    let response = format!("{head}Content-Length: 0\r\nConnection: close\r\n\r\n");
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn follows_redirects_to_final_url() {
        let addr = spawn_http_stub().await;
        let resolver = HttpResolver::new(&test_settings()).unwrap();
        let r = resolver.resolve(&format!("http://{addr}/start")).await;
        assert_eq!(r.final_url.as_deref(), Some(format!("http://{addr}/final").as_str()));
        assert_eq!(r.status_code, Some(200));
    }

    #[tokio::test]
    async fn error_status_is_still_a_resolution() {
        let addr = spawn_http_stub().await;
        let resolver = HttpResolver::new(&test_settings()).unwrap();
        let r = resolver.resolve(&format!("http://{addr}/missing")).await;
        assert_eq!(r.status_code, Some(404));
    }

    #[tokio::test]
    async fn redirect_loop_is_unresolved() {
        let addr = spawn_http_stub().await;
        let resolver = HttpResolver::new(&test_settings()).unwrap();
        let r = resolver.resolve(&format!("http://{addr}/loop")).await;
        assert_eq!(r, Resolution::unresolved());
    }

    #[tokio::test]
    async fn malformed_and_unreachable_are_unresolved() {
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let resolver = HttpResolver::new(&test_settings()).unwrap();
        for url in [
            "not a url".to_string(),
            "www.example.com/path".to_string(),
            "ftp://example.com/file".to_string(),
            "".to_string(),
            format!("http://{closed}/"),
        ] {
            assert_eq!(resolver.resolve(&url).await, Resolution::unresolved(), "{url}");
        }
    }

    #[tokio::test]
    async fn batch_preserves_candidate_order() {
        let mut answers = HashMap::new();
        answers.insert("http://a.test/".to_string(), (120, ok("http://a.test/", 200)));
        answers.insert("http://b.test/".to_string(), (10, ok("http://b.final/", 301)));
        answers.insert("http://c.test/".to_string(), (60, ok("http://c.test/", 404)));
        let resolver: Arc<dyn LinkResolver> = Arc::new(StubResolver { answers });

        let candidates: Vec<_> = ["http://a.test/", "http://dead.test/", "http://b.test/", "http://c.test/", "http://a.test/"]
            .into_iter()
            .map(CandidateLink::new)
            .collect();

        let out = resolve_all(resolver, &candidates, &opts(4)).await;
        let originals: Vec<_> = out.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(
            originals,
            vec!["http://a.test/", "http://dead.test/", "http://b.test/", "http://c.test/", "http://a.test/"]
        );
        assert_eq!(out[0].status_code, Some(200));
        assert_eq!(out[1].final_destination, None);
        assert_eq!(out[1].status_code, None);
        assert_eq!(out[2].final_destination.as_deref(), Some("http://b.final/"));
        assert_eq!(out[3].status_code, Some(404));
        assert_eq!(out[4], out[0]);
    }

    #[tokio::test]
    async fn batch_resolves_decoded_target_and_classifies_original() {
        let wrapped = "https://eur01.safelinks.protection.outlook.com/?url=http%3A%2F%2Finner.test%2Ftrack&data=1";
        let mut answers = HashMap::new();
        answers.insert("http://inner.test/track".to_string(), (0, ok("http://inner.test/landing", 200)));
        let resolver: Arc<dyn LinkResolver> = Arc::new(StubResolver { answers });

        let out = resolve_all(resolver, &[CandidateLink::new(wrapped)], &opts(1)).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].was_unwrapped());
        assert_eq!(out[0].decoded, "http://inner.test/track");
        assert_eq!(out[0].final_destination.as_deref(), Some("http://inner.test/landing"));
        assert!(out[0].is_probable_tracker);
    }

    #[tokio::test]
    async fn oversized_pool_is_capped() {
        let mut answers = HashMap::new();
        answers.insert("http://a.test/".to_string(), (0, ok("http://a.test/", 200)));
        let resolver: Arc<dyn LinkResolver> = Arc::new(StubResolver { answers });

        let wide = opts(usize::MAX);
        assert_eq!(wide.workers(), MAX_RESOLVE_CONCURRENCY);
        let out = resolve_all(resolver, &[CandidateLink::new("http://a.test/")], &wide).await;
        assert_eq!(out[0].status_code, Some(200));
    }

    #[tokio::test]
    async fn empty_batch() {
        let resolver: Arc<dyn LinkResolver> = Arc::new(StubResolver { answers: HashMap::new() });
        assert!(resolve_all(resolver, &[], &opts(1)).await.is_empty());
    }
}
