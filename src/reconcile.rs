//! Brings the registry and Discord's registered commands in line with
//! the definition files.
//!
//! A pass loads every kind, sweeps registry entries whose file is gone,
//! merges fresh definitions (a file that fails to parse keeps whatever
//! was loaded from it before, locally and on Discord), then (when a remote is attached) diffs the
//! in-scope command shapes against what Discord has and applies the
//! creates, updates and deletes concurrently. One failing call never
//! stops its siblings. Running a pass twice with nothing changed in
//! between issues no remote calls the second time, so an interrupted
//! pass is repaired by simply running another.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serenity::futures::future::join_all;
use tracing::{debug, info, warn};

use crate::definition::{HandlerDefinition, HandlerKind};
use crate::error::{ReconcileError, RemoteError};
use crate::loader::DefinitionSource;
use crate::notify::{Notifier, NotifyLevel};
use crate::registry::SharedRegistry;
use crate::remote::{RemoteCommand, RemoteCommands};
use crate::shape::CommandShape;

/// Which definitions a pass reloads and syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Every definition. Without `force`, existing registry entries are
    /// kept and only new ones are picked up; with it, everything is
    /// replaced and every command is pushed to Discord again.
    All { force: bool },
    /// Only the named definitions, or every other one when `exclude` is set.
    Selected { names: HashSet<String>, exclude: bool },
}

impl ReconcileScope {
    /// Builds a scope from operator input: a comma separated name list
    /// selects, an empty one means everything.
    pub fn from_parts(names: Option<&str>, exclude: bool, force: bool) -> Self {
        let names: HashSet<String> = names
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            ReconcileScope::All { force }
        } else {
            ReconcileScope::Selected { names, exclude }
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            ReconcileScope::All { .. } => true,
            ReconcileScope::Selected { names, exclude } => names.contains(name) != *exclude,
        }
    }

    /// Whether a registry entry with this name is overwritten by its
    /// freshly loaded definition.
    pub fn replaces(&self, name: &str) -> bool {
        match self {
            ReconcileScope::All { force } => *force,
            ReconcileScope::Selected { .. } => self.includes(name),
        }
    }

    pub fn force(&self) -> bool {
        matches!(self, ReconcileScope::All { force: true })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// The remote changes one pass needs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Plan {
    pub creates: Vec<CommandShape>,
    pub updates: Vec<(u64, CommandShape)>,
    pub deletes: Vec<RemoteCommand>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Diffs local command shapes against registered ones.
///
/// Commands match on type and name. Local shapes outside `scope` are
/// left alone, and remote commands are only deleted when their name is
/// in scope, not `held`, and no local definition exists for them at all.
pub fn plan_changes(
    local: &[CommandShape],
    remote: &[RemoteCommand],
    scope: &ReconcileScope,
    held: &HashSet<&str>,
) -> Plan {
    let registered: HashMap<(u8, &str), &RemoteCommand> =
        remote.iter().map(|r| (r.shape.key(), r)).collect();
    let defined: HashSet<(u8, &str)> = local.iter().map(CommandShape::key).collect();

    let mut plan = Plan::default();
    for shape in local.iter().filter(|s| scope.includes(&s.name)) {
        match registered.get(&shape.key()) {
            None => plan.creates.push(shape.clone()),
            Some(existing) if scope.force() || existing.shape != *shape => {
                plan.updates.push((existing.id, shape.clone()))
            }
            Some(_) => {}
        }
    }

    plan.deletes = remote
        .iter()
        .filter(|r| {
            scope.includes(&r.shape.name)
                && !held.contains(r.shape.name.as_str())
                && !defined.contains(&r.shape.key())
        })
        .cloned()
        .collect();

    plan
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub operation: Operation,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Definitions read from the source.
    pub loaded: usize,
    /// Definition files that exist but failed to parse.
    pub unparsed: usize,
    /// Registry entries removed because their file is gone.
    pub swept: usize,
    /// Registry entries inserted or overwritten.
    pub merged: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<OperationFailure>,
    /// False when no remote was attached and only the registry changed.
    pub remote_synced: bool,
}

impl ReconcileReport {
    pub fn remote_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded {} definitions; {} created, {} updated, {} deleted, {} failed",
            self.loaded,
            self.created,
            self.updated,
            self.deleted,
            self.failures.len()
        )?;
        if self.unparsed > 0 {
            write!(f, "; {} file(s) failed to parse and were left as they were", self.unparsed)?;
        }
        if !self.remote_synced {
            f.write_str(" (registry only, not synced with Discord)")?;
        }
        Ok(())
    }
}

enum PendingOperation {
    Create(CommandShape),
    Update(u64, CommandShape),
    Delete(RemoteCommand),
}

impl PendingOperation {
    fn operation(&self) -> Operation {
        match self {
            PendingOperation::Create(_) => Operation::Create,
            PendingOperation::Update(..) => Operation::Update,
            PendingOperation::Delete(_) => Operation::Delete,
        }
    }

    fn name(&self) -> &str {
        match self {
            PendingOperation::Create(shape) | PendingOperation::Update(_, shape) => &shape.name,
            PendingOperation::Delete(remote) => &remote.shape.name,
        }
    }

    async fn run(&self, remote: &dyn RemoteCommands) -> Result<(), RemoteError> {
        match self {
            PendingOperation::Create(shape) => remote.create(shape).await,
            PendingOperation::Update(id, shape) => remote.update(*id, shape).await,
            PendingOperation::Delete(existing) => remote.delete(existing.id).await,
        }
    }
}

impl Plan {
    fn into_pending(self) -> Vec<PendingOperation> {
        let mut pending = Vec::with_capacity(self.len());
        pending.extend(self.creates.into_iter().map(PendingOperation::Create));
        pending.extend(
            self.updates
                .into_iter()
                .map(|(id, shape)| PendingOperation::Update(id, shape)),
        );
        pending.extend(self.deletes.into_iter().map(PendingOperation::Delete));
        pending
    }
}

pub struct Reconciler {
    source: Arc<dyn DefinitionSource>,
    registry: SharedRegistry,
    remote: RwLock<Option<Arc<dyn RemoteCommands>>>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn DefinitionSource>,
        registry: SharedRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            registry,
            remote: RwLock::new(None),
            notifier,
        }
    }

    /// Enables the remote sync step of later passes.
    pub fn attach_remote(&self, remote: Arc<dyn RemoteCommands>) {
        *self.remote.write() = Some(remote);
    }

    pub fn has_remote(&self) -> bool {
        self.remote.read().is_some()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub async fn reconcile_all(&self, force: bool) -> Result<ReconcileReport, ReconcileError> {
        self.reconcile(&ReconcileScope::All { force }).await
    }

    pub async fn reconcile_selected(
        &self,
        names: HashSet<String>,
        exclude: bool,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.reconcile(&ReconcileScope::Selected { names, exclude }).await
    }

    pub async fn reconcile(&self, scope: &ReconcileScope) -> Result<ReconcileReport, ReconcileError> {
        let mut fresh = Vec::new();
        let mut unparsed: Vec<(HandlerKind, String)> = Vec::new();
        for kind in HandlerKind::ALL {
            let outcome = self.source.load(kind).await?;
            fresh.extend(outcome.definitions);
            unparsed.extend(outcome.unparsed.into_iter().map(|stem| (kind, stem)));
        }

        let mut report = ReconcileReport {
            loaded: fresh.len(),
            unparsed: unparsed.len(),
            ..Default::default()
        };
        self.merge(scope, fresh, &unparsed, &mut report);

        let remote = self.remote.read().clone();
        if let Some(remote) = remote {
            let registered = remote.fetch_all().await.map_err(ReconcileError::Fetch)?;
            let held: HashSet<&str> = unparsed
                .iter()
                .filter(|(kind, _)| kind.is_application_command())
                .map(|(_, name)| name.as_str())
                .collect();
            let plan = plan_changes(&self.local_shapes(), &registered, scope, &held);
            if plan.is_empty() {
                debug!("Registered commands already match the definitions");
            } else {
                debug!(
                    "Reconcile plan: {} create, {} update, {} delete",
                    plan.creates.len(),
                    plan.updates.len(),
                    plan.deletes.len()
                );
                self.apply(remote.as_ref(), plan, &mut report).await;
            }
            report.remote_synced = true;
        }

        if !unparsed.is_empty() {
            let files: Vec<String> = unparsed
                .iter()
                .map(|(kind, stem)| format!("{} {}", kind, stem))
                .collect();
            self.notifier
                .notify(
                    NotifyLevel::Warn,
                    &format!(
                        "{} definition file(s) failed to parse and were left as they were: {}",
                        unparsed.len(),
                        files.join(", ")
                    ),
                )
                .await;
        }

        info!("Reconcile finished: {}", report);
        if !report.failures.is_empty() {
            let names: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{} {}", f.operation, f.name))
                .collect();
            self.notifier
                .notify(
                    NotifyLevel::Warn,
                    &format!(
                        "{} command operation(s) failed: {}",
                        report.failures.len(),
                        names.join(", ")
                    ),
                )
                .await;
        }
        Ok(report)
    }

    fn merge(
        &self,
        scope: &ReconcileScope,
        fresh: Vec<HandlerDefinition>,
        unparsed: &[(HandlerKind, String)],
        report: &mut ReconcileReport,
    ) {
        let mut registry = self.registry.write();

        for kind in HandlerKind::ALL {
            // An unparsed file still exists, so its entry stays.
            let present: HashSet<&str> = fresh
                .iter()
                .filter(|d| d.kind == kind)
                .map(|d| d.name.as_str())
                .chain(
                    unparsed
                        .iter()
                        .filter(|(k, _)| *k == kind)
                        .map(|(_, stem)| stem.as_str()),
                )
                .collect();
            for name in registry.sweep(kind, &present) {
                debug!("Removed {} '{}': its definition is gone", kind, name);
                report.swept += 1;
            }
        }

        for definition in fresh {
            if scope.replaces(&definition.name) || !registry.contains(definition.kind, &definition.name) {
                registry.insert(definition);
                report.merged += 1;
            }
        }
    }

    fn local_shapes(&self) -> Vec<CommandShape> {
        let registry = self.registry.read();
        HandlerKind::ALL
            .into_iter()
            .filter(|kind| kind.is_application_command())
            .flat_map(|kind| registry.iter(kind))
            .filter_map(CommandShape::from_definition)
            .collect()
    }

    async fn apply(&self, remote: &dyn RemoteCommands, plan: Plan, report: &mut ReconcileReport) {
        let pending = plan.into_pending();
        let outcomes = join_all(pending.iter().map(|op| async move { (op, op.run(remote).await) })).await;

        for (op, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!("Command '{}': {} succeeded", op.name(), op.operation());
                    match op.operation() {
                        Operation::Create => report.created += 1,
                        Operation::Update => report.updated += 1,
                        Operation::Delete => report.deleted += 1,
                    }
                }
                Err(e) => {
                    warn!("Command '{}': {} failed: {}", op.name(), op.operation(), e);
                    report.failures.push(OperationFailure {
                        operation: op.operation(),
                        name: op.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CommandData, CommandOption, OptionType};
    use crate::error::LoadError;
    use crate::loader::{DirectorySource, LoadOutcome, StaticSource};
    use crate::notify::recording::RecordingNotifier;
    use crate::registry::Registry;
    use crate::remote::memory::{Call, MemoryCommands};
    use async_trait::async_trait;

    fn chat(name: &str, description: &str) -> HandlerDefinition {
        HandlerDefinition::new(HandlerKind::ChatCommand, name).with_data(CommandData::new(description))
    }

    fn shape(def: &HandlerDefinition) -> CommandShape {
        CommandShape::from_definition(def).unwrap()
    }

    struct Harness {
        source: Arc<StaticSource>,
        remote: Arc<MemoryCommands>,
        notifier: Arc<RecordingNotifier>,
        reconciler: Reconciler,
    }

    fn harness(local: Vec<HandlerDefinition>, remote: Vec<CommandShape>) -> Harness {
        let source = Arc::new(StaticSource::new(local));
        let remote = Arc::new(MemoryCommands::with(remote));
        let notifier = Arc::new(RecordingNotifier::default());
        let reconciler = Reconciler::new(source.clone(), Registry::shared(), notifier.clone());
        reconciler.attach_remote(remote.clone());
        Harness {
            source,
            remote,
            notifier,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_new_definition_is_created() {
        let h = harness(vec![chat("ping", "Ping")], vec![]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (1, 0, 0));
        assert_eq!(h.remote.take_calls(), vec![Call::Create("ping".into())]);
        assert!(report.remote_synced);
    }

    #[tokio::test]
    async fn test_changed_description_is_updated() {
        let h = harness(vec![chat("ping", "A")], vec![shape(&chat("ping", "B"))]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (0, 1, 0));
        assert_eq!(h.remote.take_calls(), vec![Call::Update(1, "ping".into())]);
        assert_eq!(h.remote.commands.lock()[0].shape.description, "A");
    }

    #[tokio::test]
    async fn test_orphaned_remote_command_is_deleted() {
        let h = harness(vec![], vec![shape(&chat("old", "Gone"))]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (0, 0, 1));
        assert!(h.remote.names().is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let h = harness(
            vec![chat("ping", "Ping"), chat("echo", "Echo")],
            vec![shape(&chat("echo", "Old echo")), shape(&chat("stale", "Stale"))],
        );
        let first = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(first.remote_changes(), 3);
        h.remote.take_calls();

        let second = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(second.remote_changes(), 0);
        assert!(second.failures.is_empty());
        assert!(h.remote.take_calls().is_empty());
    }

    #[tokio::test]
    async fn test_in_sync_remote_needs_no_changes() {
        let defs = vec![chat("ping", "Ping"), chat("echo", "Echo")];
        let shapes = defs.iter().map(shape).collect();
        let h = harness(defs, shapes);

        let report = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.remote_changes(), 0);
        assert!(h.remote.take_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let h = harness(
            vec![chat("a", "A"), chat("b", "B"), chat("c", "C")],
            vec![shape(&chat("old", "Old"))],
        );
        h.remote.fail_on("b");

        let report = h.reconciler.reconcile_all(false).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(
            report.failures,
            vec![OperationFailure {
                operation: Operation::Create,
                name: "b".into(),
                error: "b rejected".into(),
            }]
        );
        assert_eq!(h.remote.take_calls().len(), 4);
        assert_eq!(h.remote.names(), vec!["a", "c"]);

        let notes = h.notifier.messages.lock();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, NotifyLevel::Warn);
        assert!(notes[0].1.contains("create b"));
    }

    #[tokio::test]
    async fn test_reordered_options_are_updated() {
        let target = CommandOption::new(OptionType::String, "target", "Who");
        let loud = CommandOption::new(OptionType::Boolean, "loud", "Shout");
        let before = HandlerDefinition::new(HandlerKind::ChatCommand, "ping")
            .with_data(CommandData::new("Ping").option(target.clone()).option(loud.clone()));
        let after = HandlerDefinition::new(HandlerKind::ChatCommand, "ping")
            .with_data(CommandData::new("Ping").option(loud).option(target));

        let h = harness(vec![after], vec![shape(&before)]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.updated, 1);
    }

    #[tokio::test]
    async fn test_edits_need_force_or_selection() {
        let h = harness(vec![chat("ping", "v1")], vec![]);
        h.reconciler.reconcile_all(false).await.unwrap();
        h.remote.take_calls();

        h.source.replace(vec![chat("ping", "v2")]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.remote_changes(), 0);
        assert_eq!(report.merged, 0);

        let report = h.reconciler.reconcile_all(true).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(h.remote.commands.lock()[0].shape.description, "v2");
    }

    #[tokio::test]
    async fn test_force_pushes_unchanged_commands() {
        let defs = vec![chat("ping", "Ping")];
        let shapes = defs.iter().map(shape).collect();
        let h = harness(defs, shapes);

        let report = h.reconciler.reconcile_all(true).await.unwrap();
        assert_eq!(report.updated, 1);
    }

    #[tokio::test]
    async fn test_removed_file_is_swept_and_deleted() {
        let h = harness(vec![chat("ping", "Ping"), chat("echo", "Echo")], vec![]);
        h.reconciler.reconcile_all(false).await.unwrap();

        h.source.replace(vec![chat("ping", "Ping")]);
        let report = h.reconciler.reconcile_all(false).await.unwrap();

        assert_eq!(report.swept, 1);
        assert_eq!(report.deleted, 1);
        assert!(!h.reconciler.registry().read().contains(HandlerKind::ChatCommand, "echo"));
        assert_eq!(h.remote.names(), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_selected_reload_touches_only_selected() {
        let h = harness(vec![chat("ping", "v1"), chat("echo", "v1")], vec![]);
        h.reconciler.reconcile_all(false).await.unwrap();
        h.remote.push(shape(&chat("manual", "Registered by hand")));
        h.remote.take_calls();

        h.source.replace(vec![chat("ping", "v2"), chat("echo", "v2")]);
        let report = h
            .reconciler
            .reconcile_selected(HashSet::from(["ping".to_string()]), false)
            .await
            .unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (0, 1, 0));
        let registry = h.reconciler.registry().read();
        assert_eq!(
            registry.get(HandlerKind::ChatCommand, "ping").unwrap().data.as_ref().unwrap().description,
            "v2"
        );
        assert_eq!(
            registry.get(HandlerKind::ChatCommand, "echo").unwrap().data.as_ref().unwrap().description,
            "v1"
        );
        drop(registry);
        assert!(h.remote.names().contains(&"manual".to_string()));
    }

    #[tokio::test]
    async fn test_excluded_reload_touches_everything_else() {
        let h = harness(vec![chat("ping", "v1"), chat("echo", "v1")], vec![]);
        h.reconciler.reconcile_all(false).await.unwrap();
        h.remote.push(shape(&chat("manual", "Registered by hand")));

        h.source.replace(vec![chat("ping", "v2"), chat("echo", "v2")]);
        let report = h
            .reconciler
            .reconcile_selected(HashSet::from(["ping".to_string()]), true)
            .await
            .unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (0, 1, 1));
        assert_eq!(h.remote.names(), vec!["echo", "ping"]);
        let registry = h.reconciler.registry().read();
        assert_eq!(
            registry.get(HandlerKind::ChatCommand, "ping").unwrap().data.as_ref().unwrap().description,
            "v1"
        );
    }

    #[tokio::test]
    async fn test_without_remote_only_registry_changes() {
        let source = Arc::new(StaticSource::new(vec![
            chat("ping", "Ping"),
            HandlerDefinition::new(HandlerKind::Event, "ready"),
        ]));
        let reconciler = Reconciler::new(source, Registry::shared(), Arc::new(RecordingNotifier::default()));

        let report = reconciler.reconcile_all(false).await.unwrap();
        assert!(!report.remote_synced);
        assert_eq!(report.loaded, 2);
        assert_eq!(reconciler.registry().read().total(), 2);
        assert!(report.to_string().contains("not synced"));
    }

    #[tokio::test]
    async fn test_non_command_kinds_stay_local() {
        let h = harness(
            vec![
                HandlerDefinition::new(HandlerKind::Event, "message"),
                HandlerDefinition::new(HandlerKind::Modal, "feedback"),
            ],
            vec![],
        );
        let report = h.reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.remote_changes(), 0);
        assert_eq!(h.reconciler.registry().read().total(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_pass() {
        let h = harness(vec![chat("ping", "Ping")], vec![]);
        *h.remote.fail_fetch.lock() = true;

        let result = h.reconciler.reconcile_all(false).await;
        assert!(matches!(result, Err(ReconcileError::Fetch(_))));
        assert!(h.remote.take_calls().is_empty());
    }

    struct BrokenSource;

    #[async_trait]
    impl DefinitionSource for BrokenSource {
        async fn load(&self, _kind: HandlerKind) -> Result<LoadOutcome, LoadError> {
            Err(LoadError::Io {
                path: "commands".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    #[tokio::test]
    async fn test_load_failure_aborts_pass() {
        let reconciler = Reconciler::new(
            Arc::new(BrokenSource),
            Registry::shared(),
            Arc::new(RecordingNotifier::default()),
        );
        let result = reconciler.reconcile_all(false).await;
        assert!(matches!(result, Err(ReconcileError::Load(_))));
    }

    fn chat_directory(root: &std::path::Path) -> Arc<DirectorySource> {
        Arc::new(
            DirectorySource::new(root)
                .with_directories(HandlerKind::ChatCommand, [std::path::PathBuf::from("chat")]),
        )
    }

    #[tokio::test]
    async fn test_typo_in_definition_file_keeps_command() {
        let root = tempfile::tempdir().unwrap();
        let chat_dir = root.path().join("chat");
        std::fs::create_dir(&chat_dir).unwrap();
        std::fs::write(chat_dir.join("ping.toml"), "[data]\ndescription = \"Ping\"\n").unwrap();

        let remote = Arc::new(MemoryCommands::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let reconciler = Reconciler::new(chat_directory(root.path()), Registry::shared(), notifier.clone());
        reconciler.attach_remote(remote.clone());

        let first = reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(remote.names(), vec!["ping"]);
        remote.take_calls();

        // Half-saved edit: unterminated string.
        std::fs::write(chat_dir.join("ping.toml"), "[data]\ndescription = \"Pi").unwrap();
        let report = reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.unparsed, 1);
        assert_eq!(report.swept, 0);
        assert_eq!(report.remote_changes(), 0);
        assert!(remote.take_calls().is_empty());
        assert_eq!(remote.names(), vec!["ping"]);
        assert!(reconciler.registry().read().contains(HandlerKind::ChatCommand, "ping"));
        assert!(notifier
            .messages
            .lock()
            .iter()
            .any(|(level, message)| *level == NotifyLevel::Warn && message.contains("ping")));

        let forced = reconciler.reconcile_all(true).await.unwrap();
        assert_eq!(forced.deleted, 0);
        assert_eq!(remote.names(), vec!["ping"]);

        // Starting up with the broken file must not unregister the command either.
        let restarted = Reconciler::new(
            chat_directory(root.path()),
            Registry::shared(),
            Arc::new(RecordingNotifier::default()),
        );
        restarted.attach_remote(remote.clone());
        let report = restarted.reconcile_all(false).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(remote.names(), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_deleted_definition_file_removes_command() {
        let root = tempfile::tempdir().unwrap();
        let chat_dir = root.path().join("chat");
        std::fs::create_dir(&chat_dir).unwrap();
        std::fs::write(chat_dir.join("ping.toml"), "[data]\ndescription = \"Ping\"\n").unwrap();

        let remote = Arc::new(MemoryCommands::default());
        let reconciler = Reconciler::new(
            chat_directory(root.path()),
            Registry::shared(),
            Arc::new(RecordingNotifier::default()),
        );
        reconciler.attach_remote(remote.clone());
        reconciler.reconcile_all(false).await.unwrap();

        std::fs::remove_file(chat_dir.join("ping.toml")).unwrap();
        let report = reconciler.reconcile_all(false).await.unwrap();
        assert_eq!(report.swept, 1);
        assert_eq!(report.deleted, 1);
        assert!(remote.names().is_empty());
    }

    #[test]
    fn test_plan_never_deletes_held_names() {
        let remote = vec![
            RemoteCommand { id: 4, shape: shape(&chat("ping", "Ping")) },
            RemoteCommand { id: 5, shape: shape(&chat("gone", "Gone")) },
        ];
        let plan = plan_changes(&[], &remote, &ReconcileScope::All { force: true }, &HashSet::from(["ping"]));
        assert!(plan.creates.is_empty() && plan.updates.is_empty());
        assert_eq!(plan.deletes.len(), 1);
        assert_eq!(plan.deletes[0].id, 5);
    }

    #[test]
    fn test_plan_matches_on_type_and_name() {
        let slash = chat("Inspect", "Inspect something");
        let menu = HandlerDefinition::new(HandlerKind::ContextCommand, "Inspect");
        let remote = vec![RemoteCommand { id: 9, shape: shape(&slash) }];

        let plan = plan_changes(&[shape(&menu)], &remote, &ReconcileScope::All { force: false }, &HashSet::new());
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].kind, 2);
        assert_eq!(plan.deletes.len(), 1);
        assert_eq!(plan.deletes[0].id, 9);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn test_plan_counts_each_change_once() {
        let local = vec![shape(&chat("new", "N")), shape(&chat("same", "S")), shape(&chat("diff", "D2"))];
        let remote = vec![
            RemoteCommand { id: 1, shape: shape(&chat("same", "S")) },
            RemoteCommand { id: 2, shape: shape(&chat("diff", "D1")) },
            RemoteCommand { id: 3, shape: shape(&chat("gone", "G")) },
        ];

        let plan = plan_changes(&local, &remote, &ReconcileScope::All { force: false }, &HashSet::new());
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.creates[0].name, "new");
        assert_eq!(plan.updates[0].0, 2);
        assert_eq!(plan.deletes[0].id, 3);
    }

    #[test]
    fn test_scope_from_parts() {
        assert_eq!(ReconcileScope::from_parts(None, false, true), ReconcileScope::All { force: true });
        assert_eq!(ReconcileScope::from_parts(Some(" , "), true, false), ReconcileScope::All { force: false });

        let scope = ReconcileScope::from_parts(Some("ping, echo"), true, false);
        assert_eq!(
            scope,
            ReconcileScope::Selected {
                names: HashSet::from(["ping".to_string(), "echo".to_string()]),
                exclude: true,
            }
        );
        assert!(!scope.includes("ping"));
        assert!(scope.includes("help"));
        assert!(scope.replaces("help"));
        assert!(!scope.force());
    }
}
