//! Entity persistence and the audit lifecycle hook
//!
//! [`EntityStore`] is the consumed persistence engine: get, insert,
//! update, delete on one entity type. [`AuditedStore`] decorates a store
//! so every save and delete is transparently diffed against the prior
//! persisted state and recorded, without the entity author writing any
//! audit code.
//!
//! The primary write always runs before auditing. A failed audit write
//! therefore never blocks or rolls back the entity change; it is traced
//! and surfaced in the operation's report instead.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::warn;

use crate::actor::Actor;
use crate::diff::diff_snapshots;
use crate::entity::{audited_fields, snapshot, Auditable};
use crate::entry::{truncate_chars, AuditEntry, NAME_MAX};
use crate::error::{AuditError, AuditResult};
use crate::log::AuditLog;
use crate::recorder::Recorder;

/// The persistence engine for one entity type
///
/// Implementations live outside this crate; [`MemoryStore`] is provided
/// for tests and simple embedders.
pub trait EntityStore<T: Auditable> {
    /// Load an entity by id; `Ok(None)` when not found
    fn get(&self, id: u64) -> AuditResult<Option<T>>;

    /// Persist a new entity, assigning and returning its id
    fn insert(&self, entity: &mut T) -> AuditResult<u64>;

    /// Persist the new state of an existing entity
    fn update(&self, entity: &T) -> AuditResult<()>;

    /// Delete an entity by id; returns whether it existed
    fn delete(&self, id: u64) -> AuditResult<bool>;
}

/// In-memory entity store with monotonic id assignment
pub struct MemoryStore<T> {
    data: RwLock<HashMap<u64, T>>,
    next_id: AtomicU64,
}

impl<T: Auditable + Clone> MemoryStore<T> {
    /// Create an empty store; ids start at 1
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored entities
    pub fn len(&self) -> AuditResult<usize> {
        let data = self
            .data
            .read()
            .map_err(|e| AuditError::Store(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.len())
    }

    /// Check whether the store is empty
    pub fn is_empty(&self) -> AuditResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T: Auditable + Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Auditable + Clone> EntityStore<T> for MemoryStore<T> {
    fn get(&self, id: u64) -> AuditResult<Option<T>> {
        let data = self
            .data
            .read()
            .map_err(|e| AuditError::Store(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.get(&id).cloned())
    }

    fn insert(&self, entity: &mut T) -> AuditResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entity.set_id(id);

        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Store(format!("Failed to acquire write lock: {}", e)))?;
        data.insert(id, entity.clone());
        Ok(id)
    }

    fn update(&self, entity: &T) -> AuditResult<()> {
        let id = entity
            .id()
            .ok_or_else(|| AuditError::Store("Cannot update an entity without an id".into()))?;

        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Store(format!("Failed to acquire write lock: {}", e)))?;
        data.insert(id, entity.clone());
        Ok(())
    }

    fn delete(&self, id: u64) -> AuditResult<bool> {
        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Store(format!("Failed to acquire write lock: {}", e)))?;
        Ok(data.remove(&id).is_some())
    }
}

/// Outcome of an audited save
#[derive(Debug)]
pub struct SaveReport {
    /// Identifier of the saved entity
    pub id: u64,
    /// Whether this was a first insert (no prior persisted state)
    pub created: bool,
    /// Number of audit entries written
    pub entries_written: usize,
    /// Audit sink failure, if any; the entity write still committed
    pub audit_error: Option<AuditError>,
}

/// Outcome of an audited delete
#[derive(Debug)]
pub struct DeleteReport {
    /// Whether an entity was actually deleted
    pub deleted: bool,
    /// Number of audit entries written
    pub entries_written: usize,
    /// Audit sink failure, if any; the deletion still ran
    pub audit_error: Option<AuditError>,
}

/// Decorator that audits every save and delete on an entity store
pub struct AuditedStore<T, S, L>
where
    T: Auditable,
    S: EntityStore<T>,
    L: AuditLog,
{
    store: S,
    recorder: Recorder<L>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S, L> AuditedStore<T, S, L>
where
    T: Auditable,
    S: EntityStore<T>,
    L: AuditLog,
{
    /// Wrap a store so its writes are audited into `log`
    pub fn new(store: S, log: L) -> Self {
        Self {
            store,
            recorder: Recorder::new(log),
            _entity: PhantomData,
        }
    }

    /// Access the wrapped store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Access the audit log sink
    pub fn log(&self) -> &L {
        self.recorder.log()
    }

    /// Save an entity, attributing changes to the thread's actor context
    pub fn save(&self, entity: &mut T) -> AuditResult<SaveReport> {
        self.save_as(None, entity)
    }

    /// Save an entity, attributing changes to an explicit actor
    ///
    /// Loads the prior snapshot (a failed or empty lookup degrades to
    /// "no prior state"), persists the new state, then diffs and records
    /// each changed field. Store errors on the primary write propagate;
    /// audit errors after the committed write are reported in the
    /// [`SaveReport`] only.
    pub fn save_as(&self, actor: Option<&Actor>, entity: &mut T) -> AuditResult<SaveReport> {
        let prior = match entity.id() {
            Some(id) => self.load_prior(id),
            None => None,
        };
        let prior_snapshot = prior.as_ref().map(snapshot);
        let created = prior_snapshot.is_none();

        // Persist before diffing so a change is never recorded before it
        // is made, and a failed audit write never blocks the save
        let id = match entity.id() {
            Some(id) => {
                self.store.update(entity)?;
                id
            }
            None => self.store.insert(entity)?,
        };

        let fields = audited_fields::<T>();
        let new_snapshot = snapshot(entity);
        let changes = diff_snapshots(
            prior_snapshot.as_ref(),
            Some(&new_snapshot),
            &fields,
            T::censored(),
        );

        let (entries_written, audit_error) = match self.recorder.record::<T>(actor, id, &changes) {
            Ok(written) => (written, None),
            Err(e) => (0, Some(e)),
        };

        Ok(SaveReport {
            id,
            created,
            entries_written,
            audit_error,
        })
    }

    /// Delete an entity, attributing the removal to the actor context
    pub fn remove(&self, id: u64) -> AuditResult<DeleteReport> {
        self.remove_as(None, id)
    }

    /// Delete an entity, attributing the removal to an explicit actor
    ///
    /// Every field with a non-empty prior value is recorded as changed
    /// to absent before the row is removed. An unknown id is a no-op.
    pub fn remove_as(&self, actor: Option<&Actor>, id: u64) -> AuditResult<DeleteReport> {
        let Some(prior) = self.load_prior(id) else {
            return Ok(DeleteReport {
                deleted: false,
                entries_written: 0,
                audit_error: None,
            });
        };

        let fields = audited_fields::<T>();
        let prior_snapshot = snapshot(&prior);
        let changes = diff_snapshots(Some(&prior_snapshot), None, &fields, T::censored());

        let (entries_written, audit_error) = match self.recorder.record::<T>(actor, id, &changes) {
            Ok(written) => (written, None),
            Err(e) => (0, Some(e)),
        };

        let deleted = self.store.delete(id)?;

        Ok(DeleteReport {
            deleted,
            entries_written,
            audit_error,
        })
    }

    /// The audit trail for one entity, in the sink's query order
    ///
    /// History survives deletion, so this works for ids that no longer
    /// resolve in the store.
    pub fn audit_log(&self, id: u64) -> AuditResult<Vec<AuditEntry>> {
        self.recorder.log().for_entity(
            &truncate_chars(T::APP_NAME, NAME_MAX),
            &truncate_chars(T::MODEL_NAME, NAME_MAX),
            id,
        )
    }

    /// Load prior state, degrading lookup failures to "no prior state"
    fn load_prior(&self, id: u64) -> Option<T> {
        match self.store.get(id) {
            Ok(prior) => prior,
            Err(e) => {
                warn!(
                    app_name = T::APP_NAME,
                    model_name = T::MODEL_NAME,
                    model_id = id,
                    "prior state lookup failed, auditing as new: {}",
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{clear_actor, ActorScope, ANONYMOUS_ACTOR_ID};
    use crate::diff::REDACTION_MARKER;
    use crate::log::MemoryAuditLog;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    struct Person {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        name: String,
        notes: String,
        active: bool,
        password: String,
    }

    impl Person {
        fn named(name: &str) -> Self {
            Self {
                id: None,
                name: name.into(),
                notes: String::new(),
                active: true,
                password: String::new(),
            }
        }
    }

    impl Auditable for Person {
        const APP_NAME: &'static str = "crm";
        const MODEL_NAME: &'static str = "Person";

        fn id(&self) -> Option<u64> {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = Some(id);
        }

        fn fields() -> &'static [&'static str] {
            &["name", "notes", "active", "password"]
        }

        fn ignored() -> &'static [&'static str] {
            &["id"]
        }

        fn censored() -> &'static [&'static str] {
            &["password"]
        }
    }

    fn audited() -> AuditedStore<Person, MemoryStore<Person>, MemoryAuditLog> {
        clear_actor();
        AuditedStore::new(MemoryStore::new(), MemoryAuditLog::new())
    }

    #[test]
    fn test_create_audits_every_non_empty_field() {
        let store = audited();
        let mut person = Person::named("Alice");

        let report = store.save(&mut person).unwrap();
        assert!(report.created);
        assert!(report.audit_error.is_none());
        assert_eq!(person.id, Some(report.id));

        // name and active are non-empty; notes and password are empty
        let log = store.audit_log(report.id).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.old_val.is_none()));

        let name_entry = log.iter().find(|e| e.field_name == "name").unwrap();
        assert_eq!(name_entry.new_val.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_update_audits_only_changed_fields() {
        let store = audited();
        let mut person = Person::named("Alice");
        let id = store.save(&mut person).unwrap().id;

        person.name = "Bob".into();
        let report = store.save(&mut person).unwrap();
        assert!(!report.created);
        assert_eq!(report.entries_written, 1);

        let log = store.audit_log(id).unwrap();
        let last = log.last().unwrap();
        assert_eq!(last.field_name, "name");
        assert_eq!(last.old_val.as_deref(), Some("Alice"));
        assert_eq!(last.new_val.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_resave_without_changes_is_silent() {
        let store = audited();
        let mut person = Person::named("Alice");
        store.save(&mut person).unwrap();

        let report = store.save(&mut person).unwrap();
        assert_eq!(report.entries_written, 0);
    }

    #[test]
    fn test_delete_audits_changed_to_absent_and_trail_survives() {
        let store = audited();
        let mut person = Person::named("Alice");
        let id = store.save(&mut person).unwrap().id;
        let before = store.audit_log(id).unwrap().len();

        let report = store.remove(id).unwrap();
        assert!(report.deleted);
        assert_eq!(report.entries_written, 2); // name, active

        assert!(store.store().get(id).unwrap().is_none());
        let log = store.audit_log(id).unwrap();
        assert_eq!(log.len(), before + 2);

        let name_entry = log[before..]
            .iter()
            .find(|e| e.field_name == "name")
            .unwrap();
        assert_eq!(name_entry.old_val.as_deref(), Some("Alice"));
        assert!(name_entry.new_val.is_none());
    }

    #[test]
    fn test_remove_unknown_id_is_a_noop() {
        let store = audited();
        let report = store.remove(404).unwrap();
        assert!(!report.deleted);
        assert_eq!(report.entries_written, 0);
    }

    #[derive(Debug, Clone, Serialize)]
    struct Contact {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        name: String,
    }

    impl Auditable for Contact {
        const APP_NAME: &'static str = "crm";
        const MODEL_NAME: &'static str = "Contact";

        fn id(&self) -> Option<u64> {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = Some(id);
        }

        fn fields() -> &'static [&'static str] {
            &["name"]
        }
    }

    #[test]
    fn test_scenario_create_update_delete_ledger() {
        clear_actor();
        let store: AuditedStore<Contact, _, _> =
            AuditedStore::new(MemoryStore::new(), MemoryAuditLog::new());
        let mut person = Contact {
            id: None,
            name: "Alice".into(),
        };

        let id = store.save(&mut person).unwrap().id;
        let log = store.audit_log(id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].field_name, "name");
        assert!(log[0].old_val.is_none());
        assert_eq!(log[0].new_val.as_deref(), Some("Alice"));

        person.name = "Bob".into();
        store.save(&mut person).unwrap();
        let log = store.audit_log(id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].old_val.as_deref(), Some("Alice"));
        assert_eq!(log[1].new_val.as_deref(), Some("Bob"));

        store.remove(id).unwrap();
        let log = store.audit_log(id).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].field_name, "name");
        assert_eq!(log[2].old_val.as_deref(), Some("Bob"));
        assert!(log[2].new_val.is_none());
    }

    #[test]
    fn test_censored_field_redacted_through_hook() {
        let store = audited();
        let mut person = Person::named("Alice");
        person.password = "hunter2".into();
        let id = store.save(&mut person).unwrap().id;

        let log = store.audit_log(id).unwrap();
        let pw = log.iter().find(|e| e.field_name == "password").unwrap();
        assert_eq!(pw.old_val.as_deref(), Some(REDACTION_MARKER));
        assert_eq!(pw.new_val.as_deref(), Some(REDACTION_MARKER));
    }

    #[test]
    fn test_anonymous_actor_when_none_set() {
        let store = audited();
        let mut person = Person::named("Alice");
        let id = store.save(&mut person).unwrap().id;

        let log = store.audit_log(id).unwrap();
        assert!(log.iter().all(|e| e.user_id.is_none()));
        assert!(log.iter().all(|e| e.actor_id() == ANONYMOUS_ACTOR_ID));
    }

    #[test]
    fn test_actor_context_attributed() {
        let store = audited();
        let _scope = ActorScope::enter(Actor::new(7, "alice"));

        let mut person = Person::named("Alice");
        let id = store.save(&mut person).unwrap().id;

        let log = store.audit_log(id).unwrap();
        assert!(log.iter().all(|e| e.user_id == Some(7)));
    }

    #[test]
    fn test_explicit_actor_on_save_and_remove() {
        let store = audited();
        let auditor = Actor::new(42, "auditor");

        let mut person = Person::named("Alice");
        let id = store.save_as(Some(&auditor), &mut person).unwrap().id;
        store.remove_as(Some(&auditor), id).unwrap();

        let log = store.audit_log(id).unwrap();
        assert!(!log.is_empty());
        assert!(log.iter().all(|e| e.user_id == Some(42)));
    }

    #[test]
    fn test_memory_store_assigns_monotonic_ids() {
        let store = MemoryStore::<Person>::new();
        let mut a = Person::named("a");
        let mut b = Person::named("b");

        let id_a = store.insert(&mut a).unwrap();
        let id_b = store.insert(&mut b).unwrap();
        assert_eq!(id_a, 1);
        assert_eq!(id_b, 2);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_memory_store_update_without_id_fails() {
        let store = MemoryStore::<Person>::new();
        let person = Person::named("a");
        assert!(store.update(&person).is_err());
    }

    /// Store whose reads always fail, for the degradation path
    struct BrokenReads {
        inner: MemoryStore<Person>,
    }

    impl EntityStore<Person> for BrokenReads {
        fn get(&self, _id: u64) -> AuditResult<Option<Person>> {
            Err(AuditError::Store("index corrupted".into()))
        }

        fn insert(&self, entity: &mut Person) -> AuditResult<u64> {
            self.inner.insert(entity)
        }

        fn update(&self, entity: &Person) -> AuditResult<()> {
            self.inner.update(entity)
        }

        fn delete(&self, id: u64) -> AuditResult<bool> {
            self.inner.delete(id)
        }
    }

    #[test]
    fn test_lookup_failure_degrades_to_everything_new() {
        clear_actor();
        let store = AuditedStore::new(
            BrokenReads {
                inner: MemoryStore::new(),
            },
            MemoryAuditLog::new(),
        );

        let mut person = Person::named("Alice");
        let id = store.save(&mut person).unwrap().id;

        // Second save cannot read prior state; every non-empty field is
        // audited as new again rather than failing the write
        person.name = "Bob".into();
        let report = store.save(&mut person).unwrap();
        assert!(report.created);
        assert!(report.audit_error.is_none());

        let log = store.audit_log(id).unwrap();
        let bob = log
            .iter()
            .filter(|e| e.field_name == "name")
            .last()
            .unwrap();
        assert!(bob.old_val.is_none());
        assert_eq!(bob.new_val.as_deref(), Some("Bob"));
    }

    /// Sink that always fails, for the best-effort contract
    struct BrokenSink;

    impl AuditLog for BrokenSink {
        fn append(&self, _entry: &AuditEntry) -> AuditResult<()> {
            Err(AuditError::Sink("disk full".into()))
        }

        fn read_all(&self) -> AuditResult<Vec<AuditEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_audit_failure_never_fails_the_primary_write() {
        clear_actor();
        let store = AuditedStore::new(MemoryStore::new(), BrokenSink);

        let mut person = Person::named("Alice");
        let report = store.save(&mut person).unwrap();

        // The entity committed; the audit failure is surfaced, not thrown
        assert!(store.store().get(report.id).unwrap().is_some());
        assert_eq!(report.entries_written, 0);
        assert!(matches!(report.audit_error, Some(AuditError::Sink(_))));

        let delete = store.remove(report.id).unwrap();
        assert!(delete.deleted);
        assert!(matches!(delete.audit_error, Some(AuditError::Sink(_))));
    }
}
