use crate::graph::FrameGraph;
use crate::link::Link;
use crate::FrameIdString;
use serde::Serialize;
use std::io::{self, Write};

/// A point-in-time copy of the whole memory, for debugging sinks.
///
/// The shape is stable enough to eyeball and diff but is not a versioned
/// contract; nothing in the memory depends on it.
#[derive(Clone, Debug, Serialize)]
pub struct MemoryDump {
    pub frames: Vec<FrameDump>,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FrameDump {
    pub id: FrameIdString,
    pub neighbors: Vec<FrameIdString>,
}

impl MemoryDump {
    pub(crate) fn capture(graph: &FrameGraph) -> Self {
        let topology = graph.topology();

        let frames = topology
            .node_indices()
            .map(|idx| FrameDump {
                id: topology[idx],
                neighbors: topology.neighbors(idx).map(|n| topology[n]).collect(),
            })
            .collect();

        let links = topology
            .edge_indices()
            .map(|e| topology[e].clone())
            .collect();

        Self { frames, links }
    }

    pub fn write_json(&self, writer: impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, self).map_err(io::Error::from)
    }

    /// Writes the topology as GraphML: one node per frame, one edge per
    /// link, with the link weight and sample count as data attributes.
    pub fn write_graphml(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            writer,
            r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#
        )?;
        writeln!(
            writer,
            r#"  <key id="weight" for="edge" attr.name="weight" attr.type="double"/>"#
        )?;
        writeln!(
            writer,
            r#"  <key id="samples" for="edge" attr.name="samples" attr.type="int"/>"#
        )?;
        writeln!(writer, r#"  <graph edgedefault="undirected">"#)?;

        for frame in &self.frames {
            writeln!(writer, r#"    <node id="{}"/>"#, escape(frame.id.as_str()))?;
        }
        for link in &self.links {
            writeln!(
                writer,
                r#"    <edge source="{}" target="{}">"#,
                escape(link.parent().as_str()),
                escape(link.child().as_str())
            )?;
            writeln!(writer, r#"      <data key="weight">{}</data>"#, link.weight())?;
            writeln!(writer, r#"      <data key="samples">{}</data>"#, link.len())?;
            writeln!(writer, r#"    </edge>"#)?;
        }

        writeln!(writer, "  </graph>")?;
        writeln!(writer, "</graphml>")
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TransMem;
    use cu29::clock::CuDuration;
    use glam::{DQuat, DVec3};

    fn populated() -> TransMem {
        let mem = TransMem::new(CuDuration(u64::MAX));
        mem.connect("world", "robot", CuDuration(1_000), DQuat::IDENTITY, DVec3::X)
            .unwrap();
        mem.connect("robot", "camera", CuDuration(2_000), DQuat::IDENTITY, DVec3::Y)
            .unwrap();
        mem
    }

    #[test]
    fn test_snapshot_shape() {
        let dump = populated().snapshot();
        assert_eq!(dump.frames.len(), 3);
        assert_eq!(dump.links.len(), 2);

        let robot = dump
            .frames
            .iter()
            .find(|f| f.id.as_str() == "robot")
            .unwrap();
        assert_eq!(robot.neighbors.len(), 2);
    }

    #[test]
    fn test_json_dump_parses() {
        let mut out = Vec::new();
        populated().dump_json(&mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["frames"].as_array().unwrap().len(), 3);
        assert_eq!(value["links"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_graphml_dump_mentions_frames() {
        let mut out = Vec::new();
        populated().dump_graphml(&mut out).unwrap();

        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"<node id="world"/>"#));
        assert!(xml.contains(r#"source="robot" target="camera""#));
        assert!(xml.contains("</graphml>"));
    }
}
