use std::collections::BTreeMap;

use crate::error::{PetriError, Result};

use super::PetriNet;

/// A tree of nets: every node owns one net plus named child nodes, so one
/// net can embed scoped instances of others. The root's own name becomes
/// the first id segment of everything in a flattened net.
#[derive(Clone, Debug, PartialEq)]
pub struct IncludeHierarchy {
    name: String,
    net: PetriNet,
    children: BTreeMap<String, IncludeHierarchy>,
}

impl IncludeHierarchy {
    pub fn new(name: impl Into<String>, net: PetriNet) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(IncludeHierarchy { name, net, children: Default::default() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn net(&self) -> &PetriNet {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut PetriNet {
        &mut self.net
    }

    pub fn children(&self) -> &BTreeMap<String, IncludeHierarchy> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&IncludeHierarchy> {
        self.children.get(name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut IncludeHierarchy> {
        self.children.get_mut(name)
    }

    /// Embed a net as a named child instance, returning the new node.
    pub fn include(&mut self, name: impl Into<String>, net: PetriNet) -> Result<&mut IncludeHierarchy> {
        let name = name.into();
        let node = IncludeHierarchy::new(name.clone(), net)?;
        self.attach(node)?;
        Ok(self.children.get_mut(&name).unwrap())
        // Note: if this unwrap panics, we have a logic error here somewhere
    }

    /// Attach an already assembled subtree.
    pub fn attach(&mut self, child: IncludeHierarchy) -> Result<()> {
        if self.children.contains_key(child.name()) {
            return Err(PetriError::DuplicateId(child.name().into()));
        }
        let name = child.name().to_string();
        self.children.insert(name, child);
        Ok(())
    }

    /// Depth-first walk, parents before children; yields each node with
    /// its dotted path from the root ("root", "root.child", ...).
    pub fn nodes(&self) -> Vec<(String, &IncludeHierarchy)> {
        let mut result = Vec::new();
        self.collect_nodes(None, &mut result);
        result
    }

    fn collect_nodes<'a>(&'a self, prefix: Option<&str>, into: &mut Vec<(String, &'a IncludeHierarchy)>) {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", self.name),
            None => self.name.clone(),
        };
        into.push((path.clone(), self));
        for child in self.children.values() {
            child.collect_nodes(Some(&path), into);
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PetriError::ValueError("Include name must not be empty.".into()));
    }
    if name.contains('.') {
        return Err(PetriError::ValueError(format!(
            "Include name '{name}' must not contain '.'."
        )));
    }
    Ok(())
}
