//! Persistent bidirectional label <-> id registry.

use std::collections::HashMap;

use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use super::types::{LabelId, SecurityLabel};
use crate::error::{Error, Result};

/// Tree mapping label text to id.
const BY_LABEL_TREE: &str = "labels:by_label";

/// Tree mapping id to label text.
const BY_ID_TREE: &str = "labels:by_id";

/// Tree holding the id counter.
const META_TREE: &str = "labels:meta";

/// Key for the next unissued id in the meta tree.
const NEXT_ID_KEY: &[u8] = b"next_id";

/// Registry handing out stable ids for label text.
///
/// Ids are minted inside a sled transaction spanning both directions and the
/// counter, so concurrent registries opened on the same store never hand out
/// two ids for one label or one id for two labels. Each registry keeps an
/// in-memory copy of the pairs it has seen.
pub struct LabelRegistry {
    by_label: Tree,
    by_id: Tree,
    meta: Tree,
    label_to_id: HashMap<SecurityLabel, LabelId>,
    id_to_label: HashMap<LabelId, SecurityLabel>,
}

impl LabelRegistry {
    /// Open or create the registry in the given sled database.
    pub fn open(db: &Db) -> Result<Self> {
        Ok(Self {
            by_label: db.open_tree(BY_LABEL_TREE)?,
            by_id: db.open_tree(BY_ID_TREE)?,
            meta: db.open_tree(META_TREE)?,
            label_to_id: HashMap::new(),
            id_to_label: HashMap::new(),
        })
    }

    /// Id for `label`, issuing a fresh one the first time the label is seen.
    pub fn id_of(&mut self, label: &SecurityLabel) -> Result<LabelId> {
        if let Some(id) = self.label_to_id.get(label) {
            return Ok(*id);
        }

        let (id, minted) = self.get_or_mint(label)?;
        if minted {
            debug!(label = %label, id = id.get(), "issued label id");
        }
        self.remember(id, label.clone());
        Ok(id)
    }

    /// Label text for an id previously returned by [`LabelRegistry::id_of`].
    pub fn label_of(&mut self, id: LabelId) -> Result<&SecurityLabel> {
        if !self.id_to_label.contains_key(&id) {
            let bytes = self
                .by_id
                .get(id.to_bytes())?
                .ok_or(Error::UnknownId(i64::from(id.get())))?;
            let text = std::str::from_utf8(&bytes).map_err(|_| Error::Corrupt("label"))?;
            self.remember(id, SecurityLabel::new(text));
        }
        self.id_to_label
            .get(&id)
            .ok_or(Error::UnknownId(i64::from(id.get())))
    }

    /// Resolve a raw id, failing with [`Error::UnknownId`] for anything the
    /// registry could never have issued.
    pub fn label_of_raw(&mut self, raw: i64) -> Result<&SecurityLabel> {
        let id = LabelId::from_i64(raw).ok_or(Error::UnknownId(raw))?;
        self.label_of(id)
    }

    /// Id for `label` if one has been issued, without minting.
    pub fn find(&self, label: &SecurityLabel) -> Result<Option<LabelId>> {
        if let Some(id) = self.label_to_id.get(label) {
            return Ok(Some(*id));
        }
        match self.by_label.get(label.as_str().as_bytes())? {
            Some(bytes) => LabelId::from_bytes(&bytes)
                .map(Some)
                .ok_or(Error::Corrupt("label id")),
            None => Ok(None),
        }
    }

    /// Number of labels issued so far.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All issued pairs in id order.
    pub fn entries(&self) -> Result<Vec<(LabelId, SecurityLabel)>> {
        let mut entries = Vec::with_capacity(self.by_id.len());
        for item in self.by_id.iter() {
            let (key, value) = item?;
            let id = LabelId::from_bytes(&key).ok_or(Error::Corrupt("label id"))?;
            let text = std::str::from_utf8(&value).map_err(|_| Error::Corrupt("label"))?;
            entries.push((id, SecurityLabel::new(text)));
        }
        Ok(entries)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.by_label.flush()?;
        self.by_id.flush()?;
        self.meta.flush()?;
        Ok(())
    }

    fn remember(&mut self, id: LabelId, label: SecurityLabel) {
        self.label_to_id.insert(label.clone(), id);
        self.id_to_label.insert(id, label);
    }

    fn get_or_mint(&self, label: &SecurityLabel) -> Result<(LabelId, bool)> {
        let key = label.as_str().as_bytes();

        let outcome = (&self.by_label, &self.by_id, &self.meta).transaction(
            |(by_label, by_id, meta)| -> ConflictableTransactionResult<(LabelId, bool), Error> {
                if let Some(existing) = by_label.get(key)? {
                    let id = LabelId::from_bytes(&existing)
                        .ok_or(ConflictableTransactionError::Abort(Error::Corrupt("label id")))?;
                    return Ok((id, false));
                }

                let next = match meta.get(NEXT_ID_KEY)? {
                    Some(bytes) => {
                        let raw: [u8; 4] = bytes
                            .as_ref()
                            .try_into()
                            .map_err(|_| ConflictableTransactionError::Abort(Error::Corrupt("id counter")))?;
                        u32::from_be_bytes(raw)
                    }
                    None => 1,
                };
                let id = LabelId::new(next)
                    .ok_or(ConflictableTransactionError::Abort(Error::IdSpaceExhausted))?;

                by_label.insert(key, id.to_bytes().to_vec())?;
                by_id.insert(id.to_bytes().to_vec(), key)?;
                meta.insert(NEXT_ID_KEY, (next + 1).to_be_bytes().to_vec())?;
                Ok((id, true))
            },
        );

        match outcome {
            Ok(pair) => Ok(pair),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_ids_start_at_one_and_are_stable() {
        let db = temp_db();
        let mut registry = LabelRegistry::open(&db).unwrap();

        let a = registry.id_of(&"system_u:object_r:a_t".into()).unwrap();
        let b = registry.id_of(&"system_u:object_r:b_t".into()).unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(registry.id_of(&"system_u:object_r:a_t".into()).unwrap(), a);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_bijection() {
        let db = temp_db();
        let mut registry = LabelRegistry::open(&db).unwrap();

        let labels: Vec<SecurityLabel> = (0..200)
            .map(|i| SecurityLabel::new(format!("user_u:role_r:type{i}_t:s0")))
            .collect();
        let ids: Vec<LabelId> = labels.iter().map(|l| registry.id_of(l).unwrap()).collect();

        for (label, id) in labels.iter().zip(&ids) {
            assert_eq!(registry.label_of(*id).unwrap(), label);
            assert_eq!(registry.id_of(label).unwrap(), *id);
        }

        let mut distinct = ids.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), ids.len());
    }

    #[test]
    fn test_unknown_id() {
        let db = temp_db();
        let mut registry = LabelRegistry::open(&db).unwrap();
        let id = LabelId::new(42).unwrap();
        assert!(matches!(registry.label_of(id), Err(Error::UnknownId(42))));
        assert!(matches!(registry.label_of_raw(0), Err(Error::UnknownId(0))));
        assert!(matches!(registry.label_of_raw(-7), Err(Error::UnknownId(-7))));
        let oversized = i64::from(u32::MAX) + 1;
        assert!(matches!(registry.label_of_raw(oversized), Err(Error::UnknownId(v)) if v == oversized));
        assert_eq!(
            registry.label_of_raw(-7).unwrap_err().to_string(),
            "unknown label id -7"
        );
    }

    #[test]
    fn test_concurrent_first_use_mints_one_id() {
        use std::sync::Barrier;

        const THREADS: usize = 8;
        let db = temp_db();
        let before = LabelRegistry::open(&db).unwrap().len();
        let label = SecurityLabel::new("system_u:object_r:contended_t:s0");
        let barrier = Barrier::new(THREADS);

        let ids: Vec<LabelId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        let mut registry = LabelRegistry::open(&db).unwrap();
                        barrier.wait();
                        registry.id_of(&label).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.iter().all(|id| *id == ids[0]), "ids diverged: {ids:?}");
        let registry = LabelRegistry::open(&db).unwrap();
        assert_eq!(registry.len(), before + 1);
        assert_eq!(registry.find(&label).unwrap(), Some(ids[0]));
    }

    #[test]
    fn test_registries_share_store() {
        let db = temp_db();
        let mut first = LabelRegistry::open(&db).unwrap();
        let mut second = LabelRegistry::open(&db).unwrap();

        let label = SecurityLabel::new("shared_t");
        let id = first.id_of(&label).unwrap();
        assert_eq!(second.id_of(&label).unwrap(), id);
        assert_eq!(second.label_of(id).unwrap(), &label);

        let other = second.id_of(&"other_t".into()).unwrap();
        assert_ne!(other, id);
        assert_eq!(first.label_of(other).unwrap().as_str(), "other_t");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let db = sled::open(dir.path()).unwrap();
            let mut registry = LabelRegistry::open(&db).unwrap();
            let id = registry.id_of(&"persisted_t".into()).unwrap();
            registry.flush().unwrap();
            id
        };

        let db = sled::open(dir.path()).unwrap();
        let mut registry = LabelRegistry::open(&db).unwrap();
        assert_eq!(registry.label_of(id).unwrap().as_str(), "persisted_t");
        assert_eq!(registry.find(&"persisted_t".into()).unwrap(), Some(id));
        assert_eq!(registry.find(&"missing_t".into()).unwrap(), None);
        let next = registry.id_of(&"fresh_t".into()).unwrap();
        assert_eq!(next.get(), id.get() + 1);
    }

    #[test]
    fn test_entries_in_id_order() {
        let db = temp_db();
        let mut registry = LabelRegistry::open(&db).unwrap();
        for name in ["c_t", "a_t", "b_t"] {
            registry.id_of(&name.into()).unwrap();
        }
        let names: Vec<String> = registry
            .entries()
            .unwrap()
            .into_iter()
            .map(|(_, l)| l.into_string())
            .collect();
        assert_eq!(names, vec!["c_t", "a_t", "b_t"]);
    }
}
