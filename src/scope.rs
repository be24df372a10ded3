// SPDX-License-Identifier: Apache-2.0

//! Hierarchical namespace of configuration buses.
//!
//! Every instantiation adds a child frame named `label:Type`; every config
//! declaration (explicit or synthesized by a choose operator) is recorded in
//! the frame it was elaborated under. The tree is built once during the
//! elaboration pass and walked once after a satisfiable solve to report the
//! resolved configuration bit-strings by dotted path.
//!
//! Frames live in an arena owned by the elaboration root and are addressed by
//! index handles.

use crate::bus::{Bus, Lit};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug)]
struct ScopeNode {
    /// Uniqueness key among siblings: the bare instantiation label (or loop
    /// iteration key). Two children of one frame may never share it.
    label: String,
    /// What the report prints for this frame, e.g. `label:Type`.
    display: String,
    configs: Vec<(String, Bus)>,
    children: Vec<ScopeId>,
}

#[derive(Debug)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl ScopeTree {
    pub fn new(root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        ScopeTree {
            nodes: vec![ScopeNode {
                label: root_name.clone(),
                display: root_name,
                configs: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a child frame. The label must be unique among its siblings;
    /// the display string only affects report rendering.
    pub fn create_child(
        &mut self,
        parent: ScopeId,
        label: impl Into<String>,
        display: impl Into<String>,
    ) -> Result<ScopeId> {
        let label = label.into();
        let taken = self.nodes[parent.0]
            .children
            .iter()
            .any(|&c| self.nodes[c.0].label == label);
        if taken {
            return Err(Error::NameConflict(label));
        }
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode {
            label,
            display: display.into(),
            configs: Vec::new(),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Records a config bus under its frame; the name must be unique within
    /// the frame.
    pub fn add_config(&mut self, scope: ScopeId, name: impl Into<String>, bus: Bus) -> Result<()> {
        let name = name.into();
        let node = &mut self.nodes[scope.0];
        if node.configs.iter().any(|(n, _)| *n == name) {
            return Err(Error::NameConflict(name));
        }
        node.configs.push((name, bus));
        Ok(())
    }

    /// Depth-first report of every recorded config, most significant bit
    /// first, each frame introduced by its dotted instantiation path.
    pub fn render_report(&self, resolve: &dyn Fn(Lit) -> Result<bool>) -> Result<String> {
        let mut out = String::new();
        let mut path = String::new();
        self.render_frame(self.root(), &mut path, &mut out, resolve)?;
        Ok(out)
    }

    fn render_frame(
        &self,
        id: ScopeId,
        path: &mut String,
        out: &mut String,
        resolve: &dyn Fn(Lit) -> Result<bool>,
    ) -> Result<()> {
        let node = &self.nodes[id.0];
        for (name, bus) in &node.configs {
            let mut bits = String::with_capacity(bus.width());
            for i in (0..bus.width()).rev() {
                bits.push(if resolve(bus.get(i))? { '1' } else { '0' });
            }
            out.push_str(&format!("\t{} = \"{}\";\n", name, bits));
        }
        for &child in &node.children {
            let prev = path.len();
            path.push('/');
            path.push_str(&self.nodes[child.0].display);
            out.push_str(path);
            out.push('\n');
            self.render_frame(child, path, out, resolve)?;
            path.truncate(prev);
        }
        Ok(())
    }
}
