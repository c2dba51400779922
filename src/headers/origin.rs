//! Best guess at the sender's public IP, used as the default WHOIS target.
//!
//! Order: explicit originating-IP headers, then the `client-ip`/`smtp.remote-ip`
//! annotations, then the bottom-most `Received:` hop with a public address.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::HeaderBlock;

static IP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:[0-9]{1,3}(?:\.[0-9]{1,3}){3})|(?:[a-f0-9]{0,4}:[a-f0-9:.]+))\b").unwrap()
});
static CLIENT_IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:client-ip|smtp\.remote-ip)=\[?([a-f0-9:.]+)\]?").unwrap());

const ORIGIN_HEADERS: &[&str] = &["X-Originating-IP", "X-Sender-IP", "X-Mailgun-Sending-Ip"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginIp {
    pub ip: IpAddr,
    /// Header the address was taken from.
    pub source: String,
}

pub fn sender_origin(headers: &HeaderBlock) -> Option<OriginIp> {
    for name in ORIGIN_HEADERS {
        if let Some(ip) = headers.all(name).flat_map(ips_in).find(|ip| is_public(*ip)) {
            return Some(OriginIp {
                ip,
                source: name.to_string(),
            });
        }
    }

    for name in ["Received-SPF", "Authentication-Results"] {
        let found = headers
            .all(name)
            .flat_map(|v| CLIENT_IP_RE.captures_iter(v).collect::<Vec<_>>())
            .filter_map(|c| c[1].parse::<IpAddr>().ok())
            .find(|ip| is_public(*ip));
        if let Some(ip) = found {
            return Some(OriginIp {
                ip,
                source: name.to_string(),
            });
        }
    }

    // Received headers are prepended per hop, so the last one is the earliest.
    let received: Vec<&str> = headers.all("Received").collect();
    received.iter().rev().find_map(|hop| {
        ips_in(hop).into_iter().find(|ip| is_public(*ip)).map(|ip| OriginIp {
            ip,
            source: "Received".to_string(),
        })
    })
}

fn ips_in(text: &str) -> Vec<IpAddr> {
    IP_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<IpAddr>().ok())
        .collect()
}

/// Globally routable unicast, approximately.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
                || o[0] == 0
                || (o[0] == 100 && (64..128).contains(&o[1]))
                || o[0] >= 240)
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (seg[0] & 0xfe00) == 0xfc00
                || (seg[0] & 0xffc0) == 0xfe80
                || (seg[0] == 0x2001 && seg[1] == 0x0db8))
        }
    }
}
