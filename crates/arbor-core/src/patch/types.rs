use crate::value::{path_to_pointer, Path, PathSegment};
use serde::{Deserialize, Serialize};

/// One change to one slot of the tree.
///
/// Removals index the position the value had before it was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Patch {
    Add {
        path: Path,
        value: serde_json::Value,
    },
    Remove {
        path: Path,
        #[serde(rename = "oldValue", default, skip_serializing_if = "Option::is_none")]
        old_value: Option<serde_json::Value>,
    },
    Replace {
        path: Path,
        value: serde_json::Value,
        #[serde(rename = "oldValue", default, skip_serializing_if = "Option::is_none")]
        old_value: Option<serde_json::Value>,
    },
}

impl Patch {
    pub fn op(&self) -> &'static str {
        match self {
            Patch::Add { .. } => "add",
            Patch::Remove { .. } => "remove",
            Patch::Replace { .. } => "replace",
        }
    }

    pub fn path(&self) -> &[PathSegment] {
        match self {
            Patch::Add { path, .. } | Patch::Remove { path, .. } | Patch::Replace { path, .. } => {
                path
            }
        }
    }

    /// Path rendered as `/a/0/b`
    pub fn pointer(&self) -> String {
        path_to_pointer(self.path())
    }

    /// The same patch seen from `prefix` levels higher up.
    pub fn with_prefix(&self, prefix: &[PathSegment]) -> Patch {
        let mut patch = self.clone();
        if prefix.is_empty() {
            return patch;
        }
        let path = match &mut patch {
            Patch::Add { path, .. } | Patch::Remove { path, .. } | Patch::Replace { path, .. } => {
                path
            }
        };
        let mut full = prefix.to_vec();
        full.append(path);
        *path = full;
        patch
    }
}
