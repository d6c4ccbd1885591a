//! Hosts file format parser and snapshot diff
//!
//! # Format
//!
//! - `<ipv4> <hostname> [hostname...]`
//! - `#` starts a comment that runs to end of line
//! - Empty lines are ignored
//! - Lines whose address is not a dotted-quad are logged and skipped
//!
//! # Example
//!
//! ```text
//! # Lab machines
//! 192.168.1.100  example.com www.example.com
//! 10.0.0.1       service.internal   # inline comment
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::normalize_hostname;

/// Point-in-time view of every hostname mapping in a hosts directory
pub type HostsSnapshot = BTreeMap<String, Ipv4Addr>;

/// Parse a strict dotted-quad: four decimal parts, each in `0..=255`
pub fn parse_ipv4_literal(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');

    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())?;
    }

    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Parse hosts-formatted `content`
///
/// `origin` only labels log lines. Later lines override earlier ones for
/// the same hostname.
pub fn parse_hosts(content: &str, origin: &str) -> HostsSnapshot {
    let mut records = HostsSnapshot::new();

    for (index, line) in content.lines().enumerate() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(address) = tokens.next() else {
            continue;
        };

        let Some(ip) = parse_ipv4_literal(address) else {
            warn!(
                file = origin,
                line = index + 1,
                address,
                "Skipping hosts line with invalid IPv4 address"
            );
            continue;
        };

        let mut hostnames = 0;
        for hostname in tokens {
            let hostname = normalize_hostname(hostname);
            if hostname.is_empty() {
                continue;
            }
            records.insert(hostname, ip);
            hostnames += 1;
        }

        if hostnames == 0 {
            debug!(file = origin, line = index + 1, "Hosts line has no hostnames");
        }
    }

    records
}

/// Merge every visible regular file in `dir` into one snapshot
///
/// Files are read in file-name order and later files win. Names starting
/// with `.` are skipped. A file that cannot be read is logged and skipped;
/// only failing to list `dir` itself is an error.
pub async fn load_directory(dir: &Path) -> Result<HostsSnapshot> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            debug!(file = %name, "Skipping hidden file");
            continue;
        }

        // Follows symlinks
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => files.push((name, entry.path())),
            Ok(_) => {}
            Err(e) => warn!(file = %name, error = %e, "Failed to stat hosts file"),
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut snapshot = HostsSnapshot::new();
    for (name, path) in files {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => snapshot.extend(parse_hosts(&content, &name)),
            Err(e) => warn!(file = %path.display(), error = %e, "Failed to read hosts file"),
        }
    }

    Ok(snapshot)
}

/// Kind of change a [`HostDelta`] represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaAction {
    Add,
    Remove,
}

impl DeltaAction {
    /// `"add"` or `"remove"`
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaAction::Add => "add",
            DeltaAction::Remove => "remove",
        }
    }
}

impl fmt::Display for DeltaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostDelta {
    /// New hostname, or existing hostname with a different address
    Add { hostname: String, address: Ipv4Addr },
    /// Hostname no longer present
    Remove { hostname: String },
}

impl HostDelta {
    pub fn action(&self) -> DeltaAction {
        match self {
            HostDelta::Add { .. } => DeltaAction::Add,
            HostDelta::Remove { .. } => DeltaAction::Remove,
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            HostDelta::Add { hostname, .. } | HostDelta::Remove { hostname } => hostname,
        }
    }

    /// Address for adds, `None` for removals
    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            HostDelta::Add { address, .. } => Some(*address),
            HostDelta::Remove { .. } => None,
        }
    }
}

/// Deltas turning `old` into `new`: adds first, then removes
pub fn diff(old: &HostsSnapshot, new: &HostsSnapshot) -> Vec<HostDelta> {
    let adds = new
        .iter()
        .filter(|(hostname, address)| old.get(*hostname) != Some(*address))
        .map(|(hostname, address)| HostDelta::Add {
            hostname: hostname.clone(),
            address: *address,
        });

    let removes = old
        .keys()
        .filter(|hostname| !new.contains_key(*hostname))
        .map(|hostname| HostDelta::Remove {
            hostname: hostname.clone(),
        });

    adds.chain(removes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_multiple_hostnames() {
        let content = "192.168.1.100  example.com www.example.com\n10.0.0.1  service.internal\n";
        let records = parse_hosts(content, "test");

        assert_eq!(records.len(), 3);
        assert_eq!(records["example.com"], ip("192.168.1.100"));
        assert_eq!(records["www.example.com"], ip("192.168.1.100"));
        assert_eq!(records["service.internal"], ip("10.0.0.1"));
    }

    #[test]
    fn test_invalid_address_skips_line_only() {
        let content = "999.999.999.999 bad.local\n10.0.0.1 good.local\n";
        let records = parse_hosts(content, "test");

        assert_eq!(records.len(), 1);
        assert_eq!(records["good.local"], ip("10.0.0.1"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let content = "# header\n\n   \n10.0.0.1 a.local # trailing\n#10.0.0.2 b.local\n";
        let records = parse_hosts(content, "test");

        assert_eq!(records.len(), 1);
        assert!(records.contains_key("a.local"));
    }

    #[test]
    fn test_later_lines_override() {
        let content = "10.0.0.1 a.local\n10.0.0.2 A.Local.\n";
        let records = parse_hosts(content, "test");

        assert_eq!(records.len(), 1);
        assert_eq!(records["a.local"], ip("10.0.0.2"));
    }

    #[test]
    fn test_parse_ipv4_literal() {
        assert_eq!(parse_ipv4_literal("0.0.0.0"), Some(ip("0.0.0.0")));
        assert_eq!(parse_ipv4_literal("255.255.255.255"), Some(ip("255.255.255.255")));
        assert_eq!(parse_ipv4_literal("256.1.1.1"), None);
        assert_eq!(parse_ipv4_literal("1.2.3"), None);
        assert_eq!(parse_ipv4_literal("1.2.3.4.5"), None);
        assert_eq!(parse_ipv4_literal("1..3.4"), None);
        assert_eq!(parse_ipv4_literal("a.b.c.d"), None);
        assert_eq!(parse_ipv4_literal("-1.2.3.4"), None);
        assert_eq!(parse_ipv4_literal("::1"), None);
    }

    #[test]
    fn test_diff_add_change_remove() {
        let old = HostsSnapshot::from([
            ("a.local".to_string(), ip("1.1.1.1")),
            ("b.local".to_string(), ip("2.2.2.2")),
        ]);
        let new = HostsSnapshot::from([
            ("b.local".to_string(), ip("3.3.3.3")),
            ("c.local".to_string(), ip("4.4.4.4")),
        ]);

        let deltas = diff(&old, &new);
        assert_eq!(
            deltas,
            vec![
                HostDelta::Add { hostname: "b.local".into(), address: ip("3.3.3.3") },
                HostDelta::Add { hostname: "c.local".into(), address: ip("4.4.4.4") },
                HostDelta::Remove { hostname: "a.local".into() },
            ]
        );
    }

    #[test]
    fn test_diff_unchanged_is_empty() {
        let snapshot = HostsSnapshot::from([("a.local".to_string(), ip("1.1.1.1"))]);
        assert!(diff(&snapshot, &snapshot.clone()).is_empty());
    }

    #[tokio::test]
    async fn test_load_directory_skips_hidden_and_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.hosts"), "10.0.0.2 shared.local\n").unwrap();
        std::fs::write(dir.path().join("a.hosts"), "10.0.0.1 shared.local a.local\n").unwrap();
        std::fs::write(dir.path().join(".hidden"), "10.0.0.9 hidden.local\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let snapshot = load_directory(dir.path()).await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["shared.local"], ip("10.0.0.2"));
        assert_eq!(snapshot["a.local"], ip("10.0.0.1"));
        assert!(!snapshot.contains_key("hidden.local"));
    }

    #[tokio::test]
    async fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_directory(&dir.path().join("absent")).await.is_err());
    }
}
