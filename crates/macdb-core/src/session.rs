//! Per-connection MAC state.
//!
//! A [`MacSession`] owns everything one connection needs to answer
//! authorizer callbacks: the label registry, the context resolver, the
//! access vector cache, the object label store and the schema journal.
//! Hosts that call in from several threads wrap it in a [`SharedSession`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::authority::PolicyAuthority;
use crate::authorizer::{self, AccessChecker, AuthorizationEvent, Decision, Denial};
use crate::avc::{AccessDecision, AccessVectorCache, AvcStats};
use crate::config::MacConfig;
use crate::context::{load_rules, ContextResolver, RuleSet};
use crate::error::{Error, Result};
use crate::label::{LabelId, LabelRegistry, SecurityLabel};
use crate::object::{ObjectClass, ObjectCoordinate, ObjectRef, Permission, ROWID_COLUMN};
use crate::schema::{
    LabelColumn, ObjectLabelStore, ObjectRow, SchemaChange, SchemaJournal, TableLabels, LABEL_COLUMN,
};

/// A session shared between a host's callbacks.
pub type SharedSession = Arc<Mutex<MacSession>>;

/// Key of the in-memory object label cache.
struct CachedObject {
    coordinate: ObjectCoordinate,
    class: ObjectClass,
}

/// Common view of owned and borrowed cache keys, so a lookup can borrow.
trait ObjectKey {
    fn key(&self) -> (ObjectRef<'_>, ObjectClass);
}

impl ObjectKey for CachedObject {
    fn key(&self) -> (ObjectRef<'_>, ObjectClass) {
        (self.coordinate.borrowed(), self.class)
    }
}

impl ObjectKey for (ObjectRef<'_>, ObjectClass) {
    fn key(&self) -> (ObjectRef<'_>, ObjectClass) {
        *self
    }
}

impl<'a> Borrow<dyn ObjectKey + 'a> for CachedObject {
    fn borrow(&self) -> &(dyn ObjectKey + 'a) {
        self
    }
}

impl Hash for dyn ObjectKey + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialEq for dyn ObjectKey + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for dyn ObjectKey + '_ {}

impl Hash for CachedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialEq for CachedObject {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for CachedObject {}

/// MAC state for one connection.
pub struct MacSession {
    config: MacConfig,
    authority: Arc<dyn PolicyAuthority>,
    registry: LabelRegistry,
    resolver: ContextResolver,
    avc: AccessVectorCache,
    objects: ObjectLabelStore,
    object_cache: HashMap<CachedObject, LabelId>,
    journal: SchemaJournal,
    subject: LabelId,
    vacuum: bool,
    last_denial: Option<Denial>,
    db: sled::Db,
}

impl MacSession {
    /// Open a session with its own label store as described by `config`.
    #[instrument(skip(authority))]
    pub fn open(config: MacConfig, authority: Arc<dyn PolicyAuthority>) -> Result<Self> {
        let db = config.open_store()?;
        Self::with_store(db, config, authority)
    }

    /// Open a session on an existing label store, which other sessions may
    /// share. Rules are loaded from `config.rules_path`.
    pub fn with_store(db: sled::Db, config: MacConfig, authority: Arc<dyn PolicyAuthority>) -> Result<Self> {
        let rules = match &config.rules_path {
            Some(path) => load_rules(path, authority.as_ref())?.rules,
            None => RuleSet::new(),
        };
        Self::with_rules(db, config, authority, rules)
    }

    /// Open a session with an already parsed rule set.
    pub fn with_rules(
        db: sled::Db,
        config: MacConfig,
        authority: Arc<dyn PolicyAuthority>,
        rules: RuleSet,
    ) -> Result<Self> {
        let mut registry = LabelRegistry::open(&db)?;
        let objects = ObjectLabelStore::open(&db)?;
        let resolver = ContextResolver::new(rules, Arc::clone(&authority))?;

        let process_label = resolver.process_label().clone();
        if !authority.validate_label(process_label.as_str()) {
            return Err(Error::InvalidLabel(process_label.into_string()));
        }
        let subject = registry.id_of(&process_label)?;

        info!(
            subject = %process_label,
            subject_id = subject.get(),
            rules = resolver.rules().len(),
            "MAC session opened"
        );

        Ok(Self {
            avc: AccessVectorCache::with_capacity(config.avc_capacity_hint),
            config,
            authority,
            registry,
            resolver,
            objects,
            object_cache: HashMap::new(),
            journal: SchemaJournal::new(),
            subject,
            vacuum: false,
            last_denial: None,
            db,
        })
    }

    /// Wrap for sharing between host callbacks.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Decide one intercepted operation, remembering the reason of a denial.
    pub fn authorize(&mut self, event: &AuthorizationEvent<'_>) -> Decision {
        let decision = authorizer::authorize(self, event);
        if let Decision::Deny(denial) = &decision {
            self.last_denial = Some(denial.clone());
        }
        decision
    }

    /// Check one permission on one object.
    ///
    /// Anything that keeps the label from being determined is a denial.
    pub fn check_object<'t>(
        &mut self,
        target: impl Into<ObjectRef<'t>>,
        class: ObjectClass,
        perm: Permission,
    ) -> Decision {
        let target = target.into();
        if self.vacuum {
            return Decision::Allow;
        }

        match self.decide_object(target, class, perm) {
            Ok(AccessDecision::Allow) => Decision::Allow,
            Ok(AccessDecision::Deny) => Decision::Deny(Denial::Policy {
                class,
                perm,
                target: target.to_coordinate(),
            }),
            Err(e) => {
                if let Error::UnknownId(id) = &e {
                    error!(id, target = %target, "label id missing from registry");
                }
                debug_assert!(
                    !matches!(e, Error::UnknownId(_)),
                    "object label refers to an unissued id: {e}"
                );
                Decision::Deny(Denial::Unlabelled {
                    class,
                    perm,
                    target: target.to_coordinate(),
                    cause: e.to_string(),
                })
            }
        }
    }

    fn decide_object(
        &mut self,
        target: ObjectRef<'_>,
        class: ObjectClass,
        perm: Permission,
    ) -> Result<AccessDecision> {
        let object = self.label_id_for(target, class)?;
        self.avc.decide(
            self.subject,
            object,
            class,
            perm,
            &mut self.registry,
            self.authority.as_ref(),
        )
    }

    /// Label id of an object: memory, then the persisted table, then the
    /// rules. Resolved labels are cached in memory only.
    pub fn label_id_for<'t>(&mut self, target: impl Into<ObjectRef<'t>>, class: ObjectClass) -> Result<LabelId> {
        let target = target.into();
        if let Some(id) = self.object_cache.get(&(target, class) as &dyn ObjectKey) {
            return Ok(*id);
        }

        let coordinate = target.to_coordinate();
        let id = match self.objects.get(&coordinate, class)? {
            Some(id) => id,
            None => self.resolve_new(&coordinate, class)?,
        };
        self.object_cache.insert(CachedObject { coordinate, class }, id);
        Ok(id)
    }

    /// Label text an object resolves to under the current rules.
    pub fn resolve(&self, target: &ObjectCoordinate, class: ObjectClass) -> Result<SecurityLabel> {
        self.resolver.resolve(target, class)
    }

    fn resolve_new(&mut self, target: &ObjectCoordinate, class: ObjectClass) -> Result<LabelId> {
        let label = self.resolver.resolve(target, class)?;
        self.registry.id_of(&label)
    }

    /// Labels for a table about to be created with `columns`.
    ///
    /// The label column is appended to the column list and its default is the
    /// table's tuple label. A declared column with the label column's name is
    /// rejected.
    pub fn table_labels<I, S>(&mut self, database: &str, table: &str, columns: I) -> Result<TableLabels>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.build_table_labels(database, table, columns, true)
    }

    /// Labels for a table that already exists with `columns`, e.g. one
    /// created before labelling was enabled.
    pub fn existing_table_labels<I, S>(&mut self, database: &str, table: &str, columns: I) -> Result<TableLabels>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.build_table_labels(database, table, columns, false)
    }

    fn build_table_labels<I, S>(
        &mut self,
        database: &str,
        table: &str,
        columns: I,
        with_label_column: bool,
    ) -> Result<TableLabels>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table_coord = ObjectCoordinate::table(database, table);
        let table_label = self.resolve_new(&table_coord, ObjectClass::Table)?;
        let tuple_label = self.resolve_new(&table_coord, ObjectClass::Tuple)?;

        let mut labelled = Vec::new();
        for column in columns {
            let column = column.as_ref();
            if with_label_column && column.eq_ignore_ascii_case(LABEL_COLUMN) {
                return Err(Error::ReservedName(column.to_string()));
            }
            if column.eq_ignore_ascii_case(ROWID_COLUMN) {
                return Err(Error::ReservedName(column.to_string()));
            }
            let id = self.resolve_new(&ObjectCoordinate::column(database, table, column), ObjectClass::Column)?;
            labelled.push((column.to_string(), id));
        }

        let label_column = if with_label_column {
            let id = self.resolve_new(
                &ObjectCoordinate::column(database, table, LABEL_COLUMN),
                ObjectClass::Column,
            )?;
            labelled.push((LABEL_COLUMN.to_string(), id));
            Some(LabelColumn { default: tuple_label })
        } else {
            None
        };

        let rowid_label = self.resolve_new(&ObjectCoordinate::rowid(database, table), ObjectClass::Column)?;

        Ok(TableLabels {
            database: database.to_string(),
            table: table.to_string(),
            table_label,
            tuple_label,
            columns: labelled,
            rowid_label,
            label_column,
        })
    }

    /// Record a schema change made inside the current transaction. It is
    /// undone if the transaction rolls back.
    #[instrument(skip(self))]
    pub fn on_schema_change(&mut self, change: SchemaChange) -> Result<()> {
        self.apply_change(change, true)
    }

    /// Record a schema change that is already durable.
    #[instrument(skip(self))]
    pub fn apply_schema_change(&mut self, change: SchemaChange) -> Result<()> {
        self.apply_change(change, false)
    }

    fn apply_change(&mut self, change: SchemaChange, journaled: bool) -> Result<()> {
        match change {
            SchemaChange::CreateTable(labels) => {
                for row in labels.rows() {
                    self.put_row(row, journaled)?;
                }
            }
            SchemaChange::DropTable { database, table } => {
                for row in self.objects.remove_table(&database, &table)? {
                    if journaled {
                        self.journal.record_remove(row);
                    }
                }
            }
            SchemaChange::RenameTable { database, from, to } => {
                for row in self.objects.remove_table(&database, &from)? {
                    let moved = ObjectRow::new(row.coordinate.with_table(&to), row.class, row.label);
                    if journaled {
                        self.journal.record_remove(row);
                    }
                    self.put_row(moved, journaled)?;
                }
            }
            SchemaChange::AddColumn {
                database,
                table,
                column,
            } => {
                if column.eq_ignore_ascii_case(LABEL_COLUMN) || column.eq_ignore_ascii_case(ROWID_COLUMN) {
                    return Err(Error::ReservedName(column));
                }
                let coordinate = ObjectCoordinate::column(&database, &table, &column);
                let id = self.resolve_new(&coordinate, ObjectClass::Column)?;
                self.put_row(ObjectRow::new(coordinate, ObjectClass::Column, id), journaled)?;
            }
        }
        self.object_cache.clear();
        Ok(())
    }

    fn put_row(&mut self, row: ObjectRow, journaled: bool) -> Result<()> {
        let previous = self.objects.put(&row)?;
        if journaled {
            self.journal.record_put(&row, previous);
        }
        Ok(())
    }

    /// The host committed: schema changes are durable, cached labels and
    /// decisions go. Other sessions on the same store may have committed
    /// label changes too.
    pub fn on_commit(&mut self) {
        self.journal.clear();
        self.object_cache.clear();
        self.avc.invalidate_all();
        debug!("commit: label and access vector caches cleared");
    }

    /// The host rolled back: undo journaled schema changes and forget
    /// everything cached since.
    pub fn on_rollback(&mut self) {
        match self.journal.undo(&self.objects) {
            Ok(0) => {}
            Ok(undone) => info!(undone, "rolled back schema label changes"),
            Err(e) => error!(error = %e, "failed to roll back schema label changes"),
        }
        self.object_cache.clear();
        self.avc.invalidate_all();
        debug!("rollback: access vector cache cleared");
    }

    /// `label_id_of(text)`: id for a label, issuing one if needed.
    pub fn label_id_of(&mut self, text: &str) -> Result<LabelId> {
        if !self.authority.validate_label(text) {
            warn!(label = text, "rejected malformed label");
            return Err(Error::InvalidLabel(text.to_string()));
        }
        self.registry.id_of(&SecurityLabel::from(text))
    }

    /// `label_text_of(id)`: label text for an issued id.
    pub fn label_text_of(&mut self, id: i64) -> Result<SecurityLabel> {
        self.registry.label_of_raw(id).cloned()
    }

    /// `check_access(id, class, perm, table)`: whether the session subject
    /// holds `perm` on an object labelled `id`.
    pub fn check_access(&mut self, id: i64, class: &str, perm: &str, table: &str) -> Result<bool> {
        let class: ObjectClass = class.parse()?;
        let perm = Permission::for_class(class, perm)?;
        let object = LabelId::from_i64(id).ok_or(Error::UnknownId(id))?;
        if self.vacuum {
            return Ok(true);
        }

        let decision = self.avc.decide(
            self.subject,
            object,
            class,
            perm,
            &mut self.registry,
            self.authority.as_ref(),
        )?;
        debug!(table, class = %class, perm = %perm, ?decision, "check_access");
        Ok(decision.is_allowed())
    }

    /// Reload the rule file and forget labels resolved under the old rules.
    /// Returns the number of skipped lines.
    #[instrument(skip(self))]
    pub fn reload_rules(&mut self) -> Result<usize> {
        let Some(path) = self.config.rules_path.clone() else {
            return Ok(0);
        };
        let parsed = load_rules(&path, self.authority.as_ref())?;
        self.resolver.replace_rules(parsed.rules);
        self.object_cache.clear();
        self.avc.invalidate_all();
        Ok(parsed.skipped.len())
    }

    pub fn set_vacuum(&mut self, vacuum: bool) {
        self.vacuum = vacuum;
    }

    pub fn is_vacuum(&self) -> bool {
        self.vacuum
    }

    /// Reason of the most recent denial.
    pub fn last_denial(&self) -> Option<&Denial> {
        self.last_denial.as_ref()
    }

    pub fn take_last_denial(&mut self) -> Option<Denial> {
        self.last_denial.take()
    }

    /// Subject label id used for every check.
    pub fn subject(&self) -> LabelId {
        self.subject
    }

    pub fn subject_label(&self) -> &SecurityLabel {
        self.resolver.process_label()
    }

    pub fn avc_stats(&self) -> &AvcStats {
        self.avc.stats()
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn objects(&self) -> &ObjectLabelStore {
        &self.objects
    }

    pub fn rules(&self) -> &RuleSet {
        self.resolver.rules()
    }

    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    /// Number of schema changes awaiting commit.
    pub fn pending_changes(&self) -> usize {
        self.journal.len()
    }

    /// Flush the label store.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl AccessChecker for MacSession {
    fn check(&mut self, target: ObjectRef<'_>, class: ObjectClass, perm: Permission) -> Decision {
        self.check_object(target, class, perm)
    }

    fn columns_of(&mut self, database: &str, table: &str) -> Result<Option<Vec<String>>> {
        if !self.objects.has_table(database, table)? {
            return Ok(None);
        }
        self.objects.columns_of(database, table).map(Some)
    }

    fn default_database(&self) -> &str {
        &self.config.database_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::StaticPolicy;
    use crate::authorizer::OperationKind;
    use crate::context::parse_rules;

    const RULES: &str = "
db_database *         db_t
db_table    *.*       public_t
db_table    main.secret secret_t
db_column   *.*.*     column_t
db_tuple    *.*       row_t
";

    fn policy() -> StaticPolicy {
        StaticPolicy::new("user_t")
            .allow(None, None, None, &[])
            .deny(None, Some("secret_t"), Some(ObjectClass::Table), &[Permission::Select])
    }

    fn session_with(rules: &str, policy: StaticPolicy) -> MacSession {
        let parsed = parse_rules(rules, &policy);
        let db = sled::Config::new().temporary(true).open().unwrap();
        MacSession::with_rules(db, MacConfig::temporary(), Arc::new(policy), parsed.rules).unwrap()
    }

    fn session() -> MacSession {
        session_with(RULES, policy())
    }

    fn read<'a>(table: &'a str, column: &'a str) -> AuthorizationEvent<'a> {
        AuthorizationEvent::new(OperationKind::Read)
            .database("main")
            .arg1(table)
            .arg2(column)
    }

    #[test]
    fn test_subject_registered() {
        let mut s = session();
        assert_eq!(s.subject_label().as_str(), "user_t");
        assert_eq!(s.label_text_of(i64::from(s.subject().get())).unwrap().as_str(), "user_t");
    }

    #[test]
    fn test_label_assignment_then_check() {
        let mut s = session();
        let secret = ObjectCoordinate::table("main", "secret");
        assert_eq!(s.resolve(&secret, ObjectClass::Table).unwrap().as_str(), "secret_t");

        let first = s.label_id_of("secret_t").unwrap();
        let second = s.label_id_of("secret_t").unwrap();
        assert_eq!(first, second);
        assert_eq!(s.label_id_for(&secret, ObjectClass::Table).unwrap(), first);

        let decision = s.authorize(&read("secret", "col"));
        assert!(!decision.is_allowed());
        assert_eq!(
            s.last_denial().unwrap().to_string(),
            "permission denied: db_table:select on main.secret"
        );
        assert!(s.authorize(&read("public", "col")).is_allowed());
    }

    #[test]
    fn test_commit_clears_cache() {
        let mut s = session();
        assert!(s.authorize(&read("t", "c")).is_allowed());
        let misses = s.avc_stats().misses();

        assert!(s.authorize(&read("t", "c")).is_allowed());
        assert_eq!(s.avc_stats().misses(), misses);

        s.on_commit();
        assert!(s.authorize(&read("t", "c")).is_allowed());
        assert!(s.avc_stats().misses() > misses);
        assert_eq!(s.avc_stats().invalidations(), 1);
    }

    #[test]
    fn test_wildcard_fallback_no_duplicate_ids() {
        let mut s = session_with("db_table * ignored\ndb_table *.* ctx_default", StaticPolicy::permissive("user_t", "object_t"));
        let before = s.registry().len();

        for _ in 0..3 {
            for table in ["a", "b", "c"] {
                let id = s
                    .label_id_for(&ObjectCoordinate::table("elsewhere", table), ObjectClass::Table)
                    .unwrap();
                assert_eq!(s.label_text_of(i64::from(id.get())).unwrap().as_str(), "ctx_default");
            }
            s.on_commit();
        }
        assert_eq!(s.registry().len(), before + 1);
    }

    #[test]
    fn test_no_default_label_denies() {
        let mut s = session_with("db_database * db_t", StaticPolicy::new("user_t").allow(None, None, None, &[]));
        let decision = s.authorize(&read("t", "c"));
        match decision {
            Decision::Deny(Denial::Unlabelled { class, .. }) => assert_eq!(class, ObjectClass::Table),
            other => panic!("expected unlabelled denial, got {other:?}"),
        }
    }

    #[test]
    fn test_create_table_labels_and_drop() {
        let mut s = session();
        let labels = s.table_labels("main", "secret", ["name", "ssn"]).unwrap();
        assert_eq!(labels.columns.len(), 3);
        assert_eq!(labels.columns[2].0, LABEL_COLUMN);
        assert_eq!(labels.label_column.unwrap().default, labels.tuple_label);
        assert_eq!(s.label_text_of(i64::from(labels.tuple_label.get())).unwrap().as_str(), "row_t");

        s.apply_schema_change(SchemaChange::CreateTable(labels)).unwrap();
        let mut columns = s.objects().columns_of("main", "secret").unwrap();
        columns.sort();
        assert_eq!(columns, vec!["name", "security_context", "ssn"]);

        s.apply_schema_change(SchemaChange::DropTable {
            database: "main".into(),
            table: "secret".into(),
        })
        .unwrap();
        assert!(s.objects().is_empty());
    }

    #[test]
    fn test_reserved_column_rejected() {
        let mut s = session();
        let err = s.table_labels("main", "t", ["a", "Security_Context"]).unwrap_err();
        assert!(matches!(err, Error::ReservedName(name) if name == "Security_Context"));
        assert!(s.existing_table_labels("main", "t", ["a", "security_context"]).is_ok());
    }

    #[test]
    fn test_rollback_undoes_schema_changes() {
        let mut s = session();
        let kept = s.table_labels("main", "kept", ["a"]).unwrap();
        s.apply_schema_change(SchemaChange::CreateTable(kept)).unwrap();
        let rows_before = s.objects().len();

        let created = s.table_labels("main", "scratch", ["x"]).unwrap();
        s.on_schema_change(SchemaChange::CreateTable(created)).unwrap();
        s.on_schema_change(SchemaChange::RenameTable {
            database: "main".into(),
            from: "kept".into(),
            to: "renamed".into(),
        })
        .unwrap();
        s.on_schema_change(SchemaChange::AddColumn {
            database: "main".into(),
            table: "renamed".into(),
            column: "b".into(),
        })
        .unwrap();
        assert!(s.pending_changes() > 0);
        assert!(s.objects().has_table("main", "renamed").unwrap());

        s.on_rollback();
        assert_eq!(s.pending_changes(), 0);
        assert_eq!(s.objects().len(), rows_before);
        assert!(s.objects().has_table("main", "kept").unwrap());
        assert!(!s.objects().has_table("main", "renamed").unwrap());
        assert!(!s.objects().has_table("main", "scratch").unwrap());
    }

    #[test]
    fn test_cached_label_lookup_borrows() {
        let mut s = session();
        let owned = s.label_id_for(&ObjectCoordinate::table("main", "secret"), ObjectClass::Table).unwrap();
        let borrowed = s.label_id_for(ObjectRef::table("MAIN", "Secret"), ObjectClass::Table).unwrap();
        assert_eq!(owned, borrowed);
        assert_eq!(s.object_cache.len(), 1);
        assert_ne!(
            s.label_id_for(ObjectRef::table("main", "secret"), ObjectClass::Tuple).unwrap(),
            owned
        );
        assert_eq!(s.object_cache.len(), 2);
    }

    #[test]
    fn test_commit_keeps_schema_changes() {
        let mut s = session();
        let labels = s.table_labels("main", "t", ["a"]).unwrap();
        s.on_schema_change(SchemaChange::CreateTable(labels)).unwrap();
        s.on_commit();
        s.on_rollback();
        assert!(s.objects().has_table("main", "t").unwrap());
    }

    #[test]
    fn test_drop_checks_registered_columns() {
        let policy = StaticPolicy::new("user_t")
            .allow(None, None, None, &[])
            .deny(None, Some("locked_t"), Some(ObjectClass::Column), &[Permission::Drop]);
        let rules = format!("{RULES}db_column main.t.c2 locked_t\n");
        let mut s = session_with(&rules, policy);

        let insert = AuthorizationEvent::new(OperationKind::Insert).database("main").arg1("t");
        assert!(matches!(
            s.authorize(&insert),
            Decision::Deny(Denial::Unlabelled { class: ObjectClass::Column, .. })
        ));

        let labels = s.table_labels("main", "t", ["c1", "c2"]).unwrap();
        s.apply_schema_change(SchemaChange::CreateTable(labels)).unwrap();

        let drop = AuthorizationEvent::new(OperationKind::DropTable).database("main").arg1("t");
        let decision = s.authorize(&drop);
        assert_eq!(
            decision.denial().unwrap().to_string(),
            "permission denied: db_column:drop on main.t.c2"
        );
    }

    #[test]
    fn test_vacuum_bypasses_object_checks_only() {
        let mut s = session();
        s.set_vacuum(true);
        assert!(s.authorize(&read("secret", "c")).is_allowed());
        let attach = AuthorizationEvent::new(OperationKind::Attach).arg1("other.db");
        assert!(!s.authorize(&attach).is_allowed());
        s.set_vacuum(false);
        assert!(!s.authorize(&read("secret", "c")).is_allowed());
    }

    #[test]
    fn test_sql_functions() {
        let mut s = session();
        assert!(matches!(s.label_id_of("has space"), Err(Error::InvalidLabel(_))));
        assert!(matches!(s.label_text_of(4242), Err(Error::UnknownId(4242))));
        assert!(matches!(
            s.check_access(-3, "db_table", "select", "secret"),
            Err(Error::UnknownId(-3))
        ));

        let secret = s.label_id_of("secret_t").unwrap();
        let raw = i64::from(secret.get());
        assert!(!s.check_access(raw, "db_table", "select", "secret").unwrap());
        assert!(s.check_access(raw, "db_tuple", "select", "secret").unwrap());
        assert!(matches!(
            s.check_access(raw, "db_view", "select", "secret"),
            Err(Error::UnknownClass(_))
        ));
        assert!(matches!(
            s.check_access(raw, "db_tuple", "create", "secret"),
            Err(Error::UnknownPermission { .. })
        ));
    }
}
