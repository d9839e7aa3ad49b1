//! Export netlists to the Graphviz dot format using [`Ntk::to_dot`].
//!
//! Nodes are rendered by kind (inputs as boxes, AND gates as circles,
//! inverters as triangles); complemented edges carry a dot marker.
//! [`Ntk::to_dot_with_slack`] additionally fills the zero-slack subgraph so
//! the timing-critical part of a circuit stands out. Render the result with
//! the DOT engine.

use std::fmt::Write;

use crate::{dfs::Dfs, sta::SlackMap, Ntk, NtkNode};

const RANKDIR: &str = "BT";
const INPUT_FORMAT: &str = "shape=box";
const AND_FORMAT: &str = "shape=circle";
const INV_FORMAT: &str = "shape=invtriangle";
const CONST_FORMAT: &str = "shape=point, label=\"GND\"";
const OUTPUT_FORMAT: &str = "shape=none";
const CRITICAL_FORMAT: &str = ", style=filled, fillcolor=lightcoral";
const COMPLEMENT_EDGE_FORMAT: &str = " [headlabel=\"\u{25cf}\", labeldistance=1.5]";

impl Ntk {
    /// Render the observed part of the netlist as a Graphviz digraph.
    pub fn to_dot(&self) -> String {
        self.render(None)
    }

    /// Same as [`Ntk::to_dot`], with the zero-slack nodes highlighted.
    pub fn to_dot_with_slack(&self, slack: &SlackMap) -> String {
        self.render(Some(slack))
    }

    fn render(&self, slack: Option<&SlackMap>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", self.get_name());
        let _ = writeln!(out, "  rankdir={};", RANKDIR);

        let critical = |id| {
            if slack.and_then(|m| m.get(&id)).map(|t| t.slack) == Some(0) {
                CRITICAL_FORMAT
            } else {
                ""
            }
        };

        let mut dfs = Dfs::from_outputs(self);
        while let Some(node) = dfs.next(self) {
            let node = node.borrow();
            let id = node.get_id();
            let format = match &*node {
                NtkNode::Const0 => CONST_FORMAT,
                NtkNode::Input { .. } => INPUT_FORMAT,
                NtkNode::And { .. } => AND_FORMAT,
                NtkNode::Inv { .. } => INV_FORMAT,
                NtkNode::Output { .. } => OUTPUT_FORMAT,
            };
            let _ = writeln!(
                out,
                "  n{} [label=\"{}\", {}{}];",
                id,
                node.get_name(),
                format,
                critical(id)
            );
            for fanin in node.get_fanins() {
                let _ = writeln!(
                    out,
                    "  n{} -> n{}{};",
                    fanin.get_node_id(),
                    id,
                    if fanin.get_complement() {
                        COMPLEMENT_EDGE_FORMAT
                    } else {
                        ""
                    }
                );
            }
        }

        for output in self.get_outputs() {
            let output = output.borrow();
            let fanins = output.get_fanins();
            let fanin = &fanins[0];
            let _ = writeln!(
                out,
                "  n{} [label=\"{}\", {}];",
                output.get_id(),
                output.get_name(),
                OUTPUT_FORMAT
            );
            let _ = writeln!(
                out,
                "  n{} -> n{}{};",
                fanin.get_node_id(),
                output.get_id(),
                if fanin.get_complement() {
                    COMPLEMENT_EDGE_FORMAT
                } else {
                    ""
                }
            );
        }

        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod test {
    use crate::{sta, Ntk, NtkEdge};

    #[test]
    fn dot_mentions_every_observed_node() {
        let mut ntk = Ntk::with_name("tiny");
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .new_and(
                Some("g"),
                NtkEdge::new(a, false),
                NtkEdge::new(b, true),
            )
            .unwrap();
        ntk.add_output("o", !g).unwrap();

        let dot = ntk.to_dot();
        assert!(dot.starts_with("digraph tiny {"));
        for name in ["\"a\"", "\"b\"", "\"g\"", "\"o\""] {
            assert!(dot.contains(name), "missing {} in {}", name, dot);
        }
        // one complemented fanin plus the complemented output edge
        assert_eq!(dot.matches("headlabel").count(), 2);
    }

    #[test]
    fn critical_nodes_are_highlighted() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .new_and(None, NtkEdge::new(a.clone(), false), NtkEdge::new(b, false))
            .unwrap();
        let h = ntk
            .new_and(None, g.clone(), NtkEdge::new(a, true))
            .unwrap();
        ntk.add_output("o", h).unwrap();
        let slack = sta::compute_slack(&ntk).unwrap();
        let dot = ntk.to_dot_with_slack(&slack);
        assert!(dot.contains("lightcoral"));
    }
}
