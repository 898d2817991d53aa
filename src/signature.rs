//! Signatures
//!
//! Path based identifiers of tree nodes. Nodes at the same position in different trees share one
//! canonical [`TreeNodeSignature`] instance handed out by the ensemble wide [`SignatureFactory`].
use crate::constants::MAX_CHILDREN;
use crate::errors::TreeEnsembleError;
use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Child index at every level below the root, the root has an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TreeNodeSignature {
    path: Vec<u8>,
}

impl TreeNodeSignature {
    pub fn root() -> Self {
        TreeNodeSignature { path: Vec::new() }
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    fn child_path(&self, index: u8) -> Vec<u8> {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(index);
        path
    }

    /// Hash that doesn't depend on the process, used to derive per node random streams.
    pub fn stable_hash(&self) -> u64 {
        // FNV-1a, the length is mixed in so that the root differs from paths of zeros.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in std::iter::once(self.path.len() as u8).chain(self.path.iter().copied()) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }
}

impl Display for TreeNodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r")?;
        for i in &self.path {
            write!(f, "-{}", i)?;
        }
        Ok(())
    }
}

impl FromStr for TreeNodeSignature {
    type Err = TreeEnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        if parts.next() != Some("r") {
            return Err(TreeEnsembleError::UnableToRead(format!("invalid node signature \"{}\"", s)));
        }
        let path = parts
            .map(|p| p.parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| TreeEnsembleError::UnableToRead(format!("invalid node signature \"{}\": {}", s, e)))?;
        Ok(TreeNodeSignature { path })
    }
}

impl Serialize for TreeNodeSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TreeNodeSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Interns signatures so that equal paths map to the same instance. Shared by all trees of one
/// ensemble build and discarded afterwards.
#[derive(Debug)]
pub struct SignatureFactory {
    root: Arc<TreeNodeSignature>,
    cache: Mutex<HashMap<Vec<u8>, Arc<TreeNodeSignature>>>,
}

impl Default for SignatureFactory {
    fn default() -> Self {
        SignatureFactory::new()
    }
}

impl SignatureFactory {
    pub fn new() -> Self {
        SignatureFactory {
            root: Arc::new(TreeNodeSignature::root()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> Arc<TreeNodeSignature> {
        Arc::clone(&self.root)
    }

    /// Canonical signature of child `index` of `parent`.
    pub fn child(&self, parent: &TreeNodeSignature, index: usize) -> Result<Arc<TreeNodeSignature>, TreeEnsembleError> {
        let index = u8::try_from(index).map_err(|_| TreeEnsembleError::StructuralOverflow {
            signature: parent.to_string(),
            children: index + 1,
            max: MAX_CHILDREN,
        })?;
        let path = parent.child_path(index);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(signature) = cache.get(&path) {
            return Ok(Arc::clone(signature));
        }
        let signature = Arc::new(TreeNodeSignature { path: path.clone() });
        cache.insert(path, Arc::clone(&signature));
        Ok(signature)
    }

    /// Number of interned signatures below the root.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_child_is_interned() {
        let factory = SignatureFactory::new();
        let root = factory.root();
        let a = factory.child(&root, 1).unwrap();
        let b = factory.child(&root, 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = factory.child(&a, 0).unwrap();
        // a structurally equal parent leads to the same instance
        let d = factory.child(&TreeNodeSignature { path: vec![1] }, 0).unwrap();
        assert!(Arc::ptr_eq(&c, &d));
        assert_eq!(c.depth(), 2);
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_concurrent_interning() {
        let factory = SignatureFactory::new();
        let root = factory.root();
        let results: Vec<Arc<TreeNodeSignature>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| factory.child(&root, 3).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_overflow() {
        let factory = SignatureFactory::new();
        let root = factory.root();
        assert!(factory.child(&root, 255).is_ok());
        assert!(matches!(
            factory.child(&root, 256),
            Err(TreeEnsembleError::StructuralOverflow { children: 257, .. })
        ));
    }

    #[test]
    fn test_display_and_parse() {
        let factory = SignatureFactory::new();
        let child = factory.child(&factory.child(&factory.root(), 1).unwrap(), 0).unwrap();
        assert_eq!(child.to_string(), "r-1-0");
        assert_eq!("r-1-0".parse::<TreeNodeSignature>().unwrap(), *child);
        assert_eq!("r".parse::<TreeNodeSignature>().unwrap(), TreeNodeSignature::root());
        assert!("x-1".parse::<TreeNodeSignature>().is_err());
        assert_ne!(TreeNodeSignature::root().stable_hash(), child.stable_hash());
        let json = serde_json::to_string(&*child).unwrap();
        assert_eq!(json, "\"r-1-0\"");
    }
}
