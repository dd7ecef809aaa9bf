//! Rendering of peer changes for stdout.
//!
//! JSON mode prints one object per change, one per line.  Table mode
//! re-prints the whole directory after each change.

use crate::application::{PeerChange, PeerDirectory};

pub const TABLE_HEADER: &str = "NODE ID | ADDRESS | PORT | TIMESTAMP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    /// Renders `change` (JSON) or the updated `directory` (table), including
    /// the trailing newline.
    pub fn render(
        self,
        change: &PeerChange,
        directory: &PeerDirectory,
    ) -> Result<String, serde_json::Error> {
        match self {
            OutputFormat::Json => Ok(format!("{}\n", render_json_line(change)?)),
            OutputFormat::Table => Ok(format!("{}\n", render_table(directory))),
        }
    }
}

pub fn render_json_line(change: &PeerChange) -> Result<String, serde_json::Error> {
    serde_json::to_string(change)
}

pub fn render_table(directory: &PeerDirectory) -> String {
    let mut out = String::from(TABLE_HEADER);
    out.push('\n');
    for row in directory.rows() {
        out.push_str(&format!(
            "{} | {} | {} | {}\n",
            row.node_id, row.ip, row.port, row.timestamp_ms
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ChangeKind;
    use mesh_core::{NodeId, PeerUpdate};
    use mesh_discovery::{DiscoveryEvent, PeerAnnouncement};

    fn announce(dir: &mut PeerDirectory, byte: u8, ip: &str, port: u16) -> PeerChange {
        dir.apply(DiscoveryEvent::Announced(PeerAnnouncement {
            node_id: NodeId::from_bytes([byte; 16]),
            source_ip: ip.parse().unwrap(),
            service_port: port,
            timestamp_ms: 1,
            update: PeerUpdate::New,
        }))
        .unwrap()
    }

    #[test]
    fn test_json_line_for_added_peer() {
        // Arrange
        let mut dir = PeerDirectory::new();
        let change = announce(&mut dir, b'a', "1.1.1.1", 5000);

        // Act
        let line = render_json_line(&change).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        // Assert
        assert_eq!(value["event"], "added");
        assert_eq!(value["node_id"], NodeId::from_bytes([b'a'; 16]).to_string());
        assert_eq!(value["ip"], "1.1.1.1");
        assert_eq!(value["port"], 5000);
        assert_eq!(value["timestamp_ms"], 1);
    }

    #[test]
    fn test_json_line_omits_unknown_fields() {
        let change = PeerChange {
            event: ChangeKind::Removed,
            node_id: NodeId::from_bytes([b'x'; 16]),
            ip: None,
            port: None,
            timestamp_ms: None,
        };

        let line = render_json_line(&change).unwrap();

        assert!(line.contains(r#""event":"removed""#));
        assert!(!line.contains("ip"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_table_lists_peers_sorted_under_header() {
        // Arrange
        let mut dir = PeerDirectory::new();
        announce(&mut dir, 2, "10.0.0.2", 4464);
        announce(&mut dir, 1, "10.0.0.1", 4465);

        // Act
        let table = render_table(&dir);
        let lines: Vec<&str> = table.lines().collect();

        // Assert
        assert_eq!(lines[0], TABLE_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("10.0.0.1 | 4465"));
        assert!(lines[2].contains("10.0.0.2 | 4464"));
    }

    #[test]
    fn test_empty_table_is_header_only() {
        assert_eq!(render_table(&PeerDirectory::new()), format!("{TABLE_HEADER}\n"));
    }

    #[test]
    fn test_render_json_is_newline_terminated() {
        let mut dir = PeerDirectory::new();
        let change = announce(&mut dir, 1, "10.0.0.1", 1);

        let text = OutputFormat::Json.render(&change, &dir).unwrap();

        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }
}
