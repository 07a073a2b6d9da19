//! Secret snippet lifecycle.
//!
//! Locking the vault purges the plaintext of every secret snippet from the
//! in-memory forest. Ciphertext (`encrypted_value`) is never touched here;
//! restoring plaintext is the backend's job after an unlock.

use zeroize::Zeroize;

use crate::node::Node;
use crate::state::VaultState;
use crate::tree::Forest;

/// Return a copy of `forest` with every secret snippet's value cleared.
///
/// Idempotent. Folder structure and ciphertext are left as they are.
pub fn purge_secrets(forest: &Forest) -> Forest {
    let mut purged = forest.clone();
    scrub_secrets(&mut purged);
    purged
}

/// Purge a forest in place, zeroing the plaintext bytes before release.
pub fn scrub_secrets(forest: &mut Forest) {
    scrub_nodes(forest.nodes_mut());
}

/// Purge a single node (and, for a folder, everything below it).
pub fn purge_node(node: &Node) -> Node {
    let mut purged = node.clone();
    scrub_nodes(std::slice::from_mut(&mut purged));
    purged
}

fn scrub_nodes(nodes: &mut [Node]) {
    for node in nodes {
        match node {
            Node::Snippet(snippet) if snippet.is_secret => snippet.value.zeroize(),
            Node::Snippet(_) => {}
            Node::Folder(folder) => scrub_nodes(&mut folder.children),
        }
    }
}

/// Whether any secret snippet still carries plaintext.
pub fn has_plain_secrets(forest: &Forest) -> bool {
    forest
        .iter()
        .filter_map(Node::as_snippet)
        .any(|snippet| snippet.is_secret && !snippet.value.is_empty())
}

/// Remove secret snippets entirely. Used when the vault is reset.
pub fn strip_secrets(forest: &Forest) -> Forest {
    let mut nodes = forest.nodes().to_vec();
    strip_nodes(&mut nodes);
    Forest::new(nodes)
}

fn strip_nodes(nodes: &mut Vec<Node>) {
    nodes.retain(|node| !node.is_secret());
    for node in nodes.iter_mut() {
        if let Node::Folder(folder) = node {
            strip_nodes(&mut folder.children);
        }
    }
}

/// Whether a node's plaintext may be read, written or copied in `state`.
pub fn can_access(node: &Node, state: VaultState) -> bool {
    !node.is_secret() || state == VaultState::Unlocked
}

/// Secrets can only be authored while there is an unlocked key to seal them.
pub fn can_author_secrets(state: VaultState) -> bool {
    state == VaultState::Unlocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Folder, Snippet};

    /// [Folder A [Snippet S (secret), Snippet P], Snippet R (secret)]
    fn sample() -> Forest {
        let mut secret = Snippet::new("S", None).with_value("p@ssw0rd").secret();
        secret.encrypted_value = Some("c2VhbGVk".to_string());
        let plain = Snippet::new("P", None).with_value("public");
        let root_secret = Snippet::new("R", None).with_value("token").secret();

        Forest::new(vec![
            Node::Folder(Folder::new("A", None).with_children(vec![secret.into(), plain.into()])),
            root_secret.into(),
        ])
    }

    fn values(forest: &Forest) -> Vec<String> {
        forest
            .iter()
            .filter_map(Node::as_snippet)
            .map(|s| s.value.clone())
            .collect()
    }

    #[test]
    fn test_purge_clears_only_secret_values() {
        let purged = purge_secrets(&sample());

        assert_eq!(values(&purged), ["", "public", ""]);
        let secret = purged.iter().find(|n| n.label() == "S").unwrap();
        assert_eq!(
            secret.as_snippet().unwrap().encrypted_value.as_deref(),
            Some("c2VhbGVk")
        );
    }

    #[test]
    fn test_purge_is_idempotent() {
        let once = purge_secrets(&sample());
        assert_eq!(purge_secrets(&once), once);
    }

    #[test]
    fn test_purge_leaves_input_intact() {
        let forest = sample();
        let _ = purge_secrets(&forest);
        assert!(has_plain_secrets(&forest));
    }

    #[test]
    fn test_purge_node() {
        let node: Node = Snippet::new("S", None).with_value("x").secret().into();
        assert_eq!(purge_node(&node).as_snippet().unwrap().value, "");
    }

    #[test]
    fn test_has_plain_secrets() {
        assert!(has_plain_secrets(&sample()));
        assert!(!has_plain_secrets(&purge_secrets(&sample())));
    }

    #[test]
    fn test_strip_secrets() {
        let stripped = strip_secrets(&sample());
        let labels: Vec<&str> = stripped.iter().map(Node::label).collect();
        assert_eq!(labels, ["A", "P"]);
    }

    #[test]
    fn test_access_gating() {
        let secret: Node = Snippet::new("S", None).secret().into();
        let plain: Node = Snippet::new("P", None).into();

        assert!(can_access(&plain, VaultState::Locked));
        assert!(can_access(&plain, VaultState::Uninitialized));
        assert!(!can_access(&secret, VaultState::Locked));
        assert!(!can_access(&secret, VaultState::Uninitialized));
        assert!(can_access(&secret, VaultState::Unlocked));

        assert!(!can_author_secrets(VaultState::Uninitialized));
        assert!(!can_author_secrets(VaultState::Locked));
        assert!(can_author_secrets(VaultState::Unlocked));
    }
}
