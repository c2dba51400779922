use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::WhoisError;

const WHOIS_PORT: u16 = 43;
const MAX_ANSWER: u64 = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoisRecord {
    pub query: String,
    /// Server that gave the final answer.
    pub server: String,
    pub raw: String,
}

#[async_trait]
pub trait WhoisLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<WhoisRecord, WhoisError>;
}

/// Plain port-43 client: asks the root server, then follows one referral.
pub struct TcpWhois {
    root: String,
    port: u16,
    timeout: Duration,
}

impl TcpWhois {
    pub fn new(settings: &Settings) -> Self {
        TcpWhois {
            root: settings.whois_server.clone(),
            port: WHOIS_PORT,
            timeout: settings.whois_timeout(),
        }
    }

    async fn query(&self, server: &str, query: &str) -> Result<String, WhoisError> {
        let exchange = async {
            let mut stream = TcpStream::connect((server, self.port))
                .await
                .map_err(|source| WhoisError::Connect {
                    server: server.to_string(),
                    source,
                })?;
            stream.write_all(format!("{query}\r\n").as_bytes()).await?;
            let mut buf = Vec::new();
            stream.take(MAX_ANSWER).read_to_end(&mut buf).await?;
            Ok::<_, WhoisError>(String::from_utf8_lossy(&buf).into_owned())
        };

        let answer = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| WhoisError::Timeout(server.to_string()))??;
        if answer.trim().is_empty() {
            return Err(WhoisError::Empty(server.to_string()));
        }
        Ok(answer)
    }
}

#[async_trait]
impl WhoisLookup for TcpWhois {
    async fn lookup(&self, query: &str) -> Result<WhoisRecord, WhoisError> {
        info!("WHOIS {} via {}", query, self.root);
        let root_answer = self.query(&self.root, query).await?;

        match referral(&root_answer).filter(|s| !s.eq_ignore_ascii_case(&self.root)) {
            Some(next) => {
                debug!(server = %next, "following WHOIS referral");
                let raw = self.query(&next, query).await?;
                Ok(WhoisRecord {
                    query: query.to_string(),
                    server: next,
                    raw,
                })
            }
            None => Ok(WhoisRecord {
                query: query.to_string(),
                server: self.root.clone(),
                raw: root_answer,
            }),
        }
    }
}

/// `refer:` / `whois:` server named in an answer.
fn referral(answer: &str) -> Option<String> {
    answer.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn finds_referral() {
        let iana = "% IANA WHOIS server\n\nrefer:        whois.arin.net\n\ninetnum: 8.0.0.0 - 8.255.255.255\n";
        assert_eq!(referral(iana).as_deref(), Some("whois.arin.net"));
        assert_eq!(referral("NetRange: 8.0.0.0 - 8.255.255.255\n"), None);
    }

    /// Serves one canned answer per connection, in order.
    async fn spawn_stub(answers: Vec<&'static str>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for answer in answers {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 64];
                let _ = sock.read(&mut buf).await;
                sock.write_all(answer.as_bytes()).await.unwrap();
            }
        });
        port
    }

    fn client(port: u16) -> TcpWhois {
        TcpWhois {
            root: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn answer_without_referral() {
        let port = spawn_stub(vec!["NetName: TEST-NET\n"]).await;
        let record = client(port).lookup("8.8.8.8").await.unwrap();
        assert_eq!(record.server, "127.0.0.1");
        assert_eq!(record.raw, "NetName: TEST-NET\n");
        assert_eq!(record.query, "8.8.8.8");
    }

    #[tokio::test]
    async fn follows_one_referral() {
        let port = spawn_stub(vec!["refer: localhost\n", "OrgName: Referred Org\n"]).await;
        let record = client(port).lookup("8.8.8.8").await.unwrap();
        assert_eq!(record.server, "localhost");
        assert!(record.raw.contains("Referred Org"));
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let port = spawn_stub(vec![""]).await;
        assert!(matches!(client(port).lookup("1.1.1.1").await, Err(WhoisError::Empty(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        assert!(matches!(client(port).lookup("1.1.1.1").await, Err(WhoisError::Connect { .. })));
    }
}
