//! Integration tests for MAC sessions over a shared label store.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use macdb_core::{
    AuthorizationEvent, Decision, Denial, MacConfig, MacSession, ObjectClass, ObjectCoordinate,
    OperationKind, Permission, PolicyAuthority, Result, SchemaChange, SecurityLabel, StaticPolicy,
};

const RULES: &str = "\
# databases
db_database  *                 system_u:object_r:sql_db_t:s0
# tables
db_table     *.*               system_u:object_r:sql_table_t:s0
db_table     main.payroll      system_u:object_r:payroll_t:s0
# columns
db_column    *.*.*             system_u:object_r:sql_column_t:s0
db_column    main.payroll.salary system_u:object_r:salary_t:s0
# rows
db_tuple     *.*               system_u:object_r:sql_tuple_t:s0
db_view      main.v            system_u:object_r:view_t:s0
";

const POLICY: &str = "\
process  unconfined_u:unconfined_r:clerk_t:s0
default  *  system_u:object_r:sql_fallback_t:s0
allow    *  *  *  *
deny     clerk_t_never  *  *  *
deny     *  system_u:object_r:salary_t:s0  db_column  select,update
";

/// Wraps a policy and counts access checks reaching it.
struct CountingPolicy {
    inner: StaticPolicy,
    checks: AtomicUsize,
}

impl CountingPolicy {
    fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl PolicyAuthority for CountingPolicy {
    fn check_access(
        &self,
        subject: &SecurityLabel,
        object: &SecurityLabel,
        class: ObjectClass,
        perm: Permission,
    ) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.check_access(subject, object, class, perm)
    }

    fn compute_default_label(&self, process: &SecurityLabel, class: ObjectClass) -> Option<SecurityLabel> {
        self.inner.compute_default_label(process, class)
    }

    fn validate_label(&self, label: &str) -> bool {
        self.inner.validate_label(label)
    }

    fn process_label(&self) -> Result<SecurityLabel> {
        self.inner.process_label()
    }
}

struct TestContext {
    policy: Arc<CountingPolicy>,
    config: MacConfig,
    _rules_file: tempfile::NamedTempFile,
    _data_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let mut rules_file = tempfile::NamedTempFile::new().unwrap();
        rules_file.write_all(RULES.as_bytes()).unwrap();
        let data_dir = tempfile::tempdir().unwrap();

        let config = MacConfig::new(data_dir.path()).rules_path(rules_file.path());
        let policy = Arc::new(CountingPolicy {
            inner: StaticPolicy::parse(POLICY).unwrap(),
            checks: AtomicUsize::new(0),
        });

        Self {
            policy,
            config,
            _rules_file: rules_file,
            _data_dir: data_dir,
        }
    }

    fn store(&self) -> sled::Db {
        self.config.open_store().unwrap()
    }

    fn session(&self, db: &sled::Db) -> MacSession {
        MacSession::with_store(db.clone(), self.config.clone(), self.policy.clone()).unwrap()
    }
}

fn read<'a>(table: &'a str, column: &'a str) -> AuthorizationEvent<'a> {
    AuthorizationEvent::new(OperationKind::Read)
        .database("main")
        .arg1(table)
        .arg2(column)
}

#[test]
fn test_rule_file_drives_column_denial() {
    let ctx = TestContext::new();
    let db = ctx.store();
    let mut session = ctx.session(&db);

    let labels = session.table_labels("main", "payroll", ["name", "salary"]).unwrap();
    session.apply_schema_change(SchemaChange::CreateTable(labels)).unwrap();

    assert!(session.authorize(&read("payroll", "name")).is_allowed());
    match session.authorize(&read("payroll", "salary")) {
        Decision::Deny(Denial::Policy { class, perm, target }) => {
            assert_eq!(class, ObjectClass::Column);
            assert_eq!(perm, Permission::Select);
            assert_eq!(target, ObjectCoordinate::column("main", "payroll", "salary"));
        }
        other => panic!("expected policy denial, got {other:?}"),
    }

    let update = AuthorizationEvent::new(OperationKind::Update)
        .database("main")
        .arg1("payroll")
        .arg2("SALARY");
    assert!(!session.authorize(&update).is_allowed());

    let insert = AuthorizationEvent::new(OperationKind::Insert).database("main").arg1("payroll");
    assert!(session.authorize(&insert).is_allowed());
}

#[test]
fn test_statement_checks_hit_cache() {
    let ctx = TestContext::new();
    let db = ctx.store();
    let mut session = ctx.session(&db);

    for _ in 0..100 {
        assert!(session.authorize(&read("orders", "total")).is_allowed());
    }
    // database access, table select, column select
    assert_eq!(ctx.policy.checks(), 3);
    assert!(session.avc_stats().hit_rate() > 0.9);

    session.on_commit();
    assert!(session.authorize(&read("orders", "total")).is_allowed());
    assert_eq!(ctx.policy.checks(), 6);
}

#[test]
fn test_sessions_share_labels_not_caches() {
    let ctx = TestContext::new();
    let db = ctx.store();
    let mut first = ctx.session(&db);
    let mut second = ctx.session(&db);

    assert_eq!(first.subject(), second.subject());

    let labels = first.table_labels("main", "payroll", ["salary"]).unwrap();
    let tuple = labels.tuple_label;
    first.apply_schema_change(SchemaChange::CreateTable(labels)).unwrap();

    assert!(second.objects().has_table("main", "payroll").unwrap());
    assert_eq!(
        second
            .label_id_for(&ObjectCoordinate::table("main", "payroll"), ObjectClass::Tuple)
            .unwrap(),
        tuple
    );

    assert!(!first.authorize(&read("payroll", "salary")).is_allowed());
    first.on_commit();
    assert_eq!(second.avc_stats().invalidations(), 0);
}

#[test]
fn test_commit_picks_up_labels_committed_elsewhere() {
    let ctx = TestContext::new();
    let db = ctx.store();
    let mut reader = ctx.session(&db);
    let mut writer = ctx.session(&db);

    // no table yet: the column resolves through the wildcard rule
    assert!(reader.authorize(&read("archive", "salary")).is_allowed());

    let labels = writer.table_labels("main", "payroll", ["salary"]).unwrap();
    writer.on_schema_change(SchemaChange::CreateTable(labels)).unwrap();
    writer
        .on_schema_change(SchemaChange::RenameTable {
            database: "main".into(),
            from: "payroll".into(),
            to: "archive".into(),
        })
        .unwrap();
    writer.on_commit();
    reader.on_commit();

    match reader.authorize(&read("archive", "salary")) {
        Decision::Deny(Denial::Policy { class, perm, target }) => {
            assert_eq!(class, ObjectClass::Column);
            assert_eq!(perm, Permission::Select);
            assert_eq!(target, ObjectCoordinate::column("main", "archive", "salary"));
        }
        other => panic!("expected policy denial, got {other:?}"),
    }
}

#[test]
fn test_labels_survive_reopen() {
    let ctx = TestContext::new();
    let (subject, table_label) = {
        let db = ctx.store();
        let mut session = ctx.session(&db);
        let labels = session.table_labels("main", "payroll", ["salary"]).unwrap();
        let table_label = labels.table_label;
        session.apply_schema_change(SchemaChange::CreateTable(labels)).unwrap();
        session.flush().unwrap();
        (session.subject(), table_label)
    };

    let db = ctx.store();
    let mut session = ctx.session(&db);
    assert_eq!(session.subject(), subject);
    assert_eq!(
        session
            .label_id_for(&ObjectCoordinate::table("main", "payroll"), ObjectClass::Table)
            .unwrap(),
        table_label
    );
    assert_eq!(
        session.label_text_of(i64::from(table_label.get())).unwrap().as_str(),
        "system_u:object_r:payroll_t:s0"
    );
}

#[test]
fn test_missing_rule_file_uses_defaults() {
    let ctx = TestContext::new();
    let config = MacConfig::temporary().rules_path(ctx.config.data_path().join("no_such_rules"));
    let mut session = MacSession::open(config, ctx.policy.clone()).unwrap();

    assert!(session.rules().is_empty());
    let label = session
        .resolve(&ObjectCoordinate::column("main", "t", "c"), ObjectClass::Column)
        .unwrap();
    assert_eq!(label.as_str(), "system_u:object_r:sql_fallback_t:s0");
    assert!(session.authorize(&read("t", "c")).is_allowed());
}

#[test]
fn test_reload_rules() {
    let ctx = TestContext::new();
    let db = ctx.store();
    let mut session = ctx.session(&db);
    let coord = ObjectCoordinate::table("main", "payroll");
    let before = session.label_id_for(&coord, ObjectClass::Table).unwrap();

    std::fs::write(
        ctx.config.rules_path.as_ref().unwrap(),
        "db_table main.payroll system_u:object_r:archived_t:s0\nbogus line here\n",
    )
    .unwrap();
    assert_eq!(session.reload_rules().unwrap(), 1);

    let after = session.label_id_for(&coord, ObjectClass::Table).unwrap();
    assert_ne!(before, after);
}
