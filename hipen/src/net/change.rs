use std::fmt::Display;

/// A single structural mutation applied to a net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetChange {
    Added(String),
    Removed(String),
    AnnotationAdded,
    Marking(String, String, u64),
}

/// Notification returned by every successful mutation of a net, carrying
/// the net's new revision. Callers that want to observe mutations forward
/// these events; the core itself never holds observers.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct NetChangeEvent {
    pub changes: Vec<NetChange>,
    pub revision: u64,
}

impl NetChangeEvent {
    pub fn new(revision: u64) -> Self {
        NetChangeEvent { changes: Default::default(), revision }
    }
}

impl Display for NetChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "revision={}, changes=[", self.revision)?;
        for (idx, change) in self.changes.iter().enumerate() {
            if idx == 0 {
                write!(f, "{}", change)?;
            } else {
                write!(f, ", {}", change)?;
            }
        }
        write!(f, "]")?;
        Ok(())
    }
}

impl Display for NetChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetChange::Added(id) => write!(f, "Added({id})"),
            NetChange::Removed(id) => write!(f, "Removed({id})"),
            NetChange::AnnotationAdded => write!(f, "AnnotationAdded()"),
            NetChange::Marking(place_id, token_id, count) => {
                write!(f, "Marking({place_id}: {token_id} = {count})")
            }
        }
    }
}
