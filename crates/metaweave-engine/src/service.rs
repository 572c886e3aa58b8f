//! The metadata service: providers, cache, registry and triggers behind one facade

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use metaweave_ids::{ClassTag, Identifier, Marker, TypeKey};
use metaweave_registry::{
    DependencyRegistry, NotificationListener, Propagation, PropagationHost, PropagationReport,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::{
    CacheLookup, CacheStats, ChangeSubject, ComputeContext, ComputeError, ConfigurationError,
    Diagnostic, EngineConfig, EngineError, MetadataCache, MetadataProvider, MetadataValue, Result,
    TriggerIndex, TypeFacts, TypeFactsSource,
};

/// Graph-shaped state guarded by one lock
#[derive(Default)]
struct EngineState {
    registry: DependencyRegistry,
    cache: MetadataCache,
    triggers: TriggerIndex,
    /// Bumped on every deactivation of a class; computations started under
    /// an older epoch may neither cache their result nor add edges
    epochs: HashMap<ClassTag, u64>,
}

impl EngineState {
    fn epoch(&self, class: &ClassTag) -> u64 {
        self.epochs.get(class).copied().unwrap_or(0)
    }

    /// A physical identifier only needs a generation once something has read it
    fn invalidate(&mut self, id: &Identifier) -> bool {
        if id.is_physical() && !self.cache.tracks(id) && !self.registry.has_dependents(id) {
            return false;
        }
        self.cache.invalidate(id)
    }
}

#[derive(Default)]
struct PassState {
    active: bool,
    /// Notifications raised while a pass was running on this thread
    nested: Vec<Identifier>,
}

#[derive(Default)]
struct DiagnosticState {
    /// Latest configuration error per identifier, awaiting publication
    pending: BTreeMap<Identifier, ConfigurationError>,
    published: Vec<Diagnostic>,
}

/// Entry point for requesting metadata and announcing change.
///
/// `get` returns the cached value or computes it through the owning
/// provider; every read a provider makes registers a dependency edge.
/// `notify` invalidates everything downstream of a change. Recomputation is
/// lazy: the next `get` of an invalidated identifier recomputes it.
///
/// No lock is held while a provider computes, so providers may read other
/// metadata freely. Values computed from inputs invalidated in the meantime
/// are returned to their caller but not cached.
pub struct MetadataService {
    config: EngineConfig,
    facts: Arc<dyn TypeFactsSource>,
    state: Mutex<EngineState>,
    providers: RwLock<BTreeMap<ClassTag, Arc<dyn MetadataProvider>>>,
    pass: ReentrantMutex<RefCell<PassState>>,
    diagnostics: Mutex<DiagnosticState>,
}

impl MetadataService {
    pub fn new(facts: Arc<dyn TypeFactsSource>) -> Self {
        Self::with_config(facts, EngineConfig::default())
    }

    pub fn with_config(facts: Arc<dyn TypeFactsSource>, config: EngineConfig) -> Self {
        Self {
            config,
            facts,
            state: Mutex::new(EngineState::default()),
            providers: RwLock::new(BTreeMap::new()),
            pass: ReentrantMutex::new(RefCell::new(PassState::default())),
            diagnostics: Mutex::new(DiagnosticState::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The source of type facts providers read from
    pub fn facts(&self) -> &dyn TypeFactsSource {
        self.facts.as_ref()
    }

    // ===== Providers =====

    /// Make a provider's class available and bind its trigger markers
    pub fn activate_provider(&self, provider: Arc<dyn MetadataProvider>) -> Result<()> {
        let class = provider.provides_class_tag();
        if class.is_physical() {
            return Err(EngineError::ReservedClassTag(class));
        }
        {
            let mut providers = self.providers.write();
            if providers.contains_key(&class) {
                return Err(EngineError::DuplicateProvider(class));
            }
            provider.on_activate();
            providers.insert(class.clone(), provider.clone());
        }

        let triggers = provider.interested_triggers();
        let mut state = self.state.lock();
        for marker in &triggers {
            state.triggers.add_trigger(marker.clone(), class.clone());
        }
        tracing::info!("activated provider {} ({} triggers)", class, triggers.len());
        Ok(())
    }

    /// Remove a provider and everything it left behind.
    ///
    /// Its cache entries, every edge touching its class, its trigger bindings
    /// and its pending diagnostics are dropped. Returns false if no provider
    /// owned `class`.
    pub fn deactivate_provider(&self, class: &ClassTag) -> bool {
        let Some(provider) = self.providers.write().remove(class) else {
            return false;
        };
        let (entries, edges, triggers) = {
            let mut state = self.state.lock();
            *state.epochs.entry(class.clone()).or_default() += 1;
            (
                state.cache.purge_class(class),
                state.registry.deregister_class(class),
                state.triggers.remove_class(class),
            )
        };
        self.diagnostics
            .lock()
            .pending
            .retain(|id, _| id.class_tag() != class);
        provider.on_deactivate();
        tracing::info!(
            "deactivated provider {} (dropped {} cache entries, {} edges, {} triggers)",
            class,
            entries,
            edges,
            triggers
        );
        true
    }

    pub fn provider(&self, class: &ClassTag) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.read().get(class).cloned()
    }

    pub fn active_classes(&self) -> Vec<ClassTag> {
        self.providers.read().keys().cloned().collect()
    }

    fn active_providers(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers.read().values().cloned().collect()
    }

    // ===== Reads =====

    /// Return the metadata of `id`, computing it if it is not cached.
    ///
    /// Unknown classes, missing prerequisites and misconfiguration all read
    /// as [`MetadataValue::Absent`]; `Err` is reserved for structural faults
    /// such as an invalid dependency edge.
    pub fn get(&self, id: &Identifier) -> Result<MetadataValue> {
        let mut chain = Vec::new();
        let value = self.resolve(id, &mut chain)?;
        if !self.pass_active_here() {
            self.publish_diagnostics();
        }
        Ok(value)
    }

    /// Inspect the cache entry of `id` without computing anything
    pub fn lookup(&self, id: &Identifier) -> CacheLookup {
        self.state.lock().cache.lookup(id)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().cache.stats()
    }

    pub(crate) fn resolve(
        &self,
        id: &Identifier,
        chain: &mut Vec<Identifier>,
    ) -> Result<MetadataValue> {
        if id.is_physical() {
            return Ok(self.physical_value(id.key()));
        }

        let (stamp, epoch) = {
            let mut state = self.state.lock();
            if let Some(value) = state.cache.get_valid(id) {
                return Ok(value);
            }
            (state.cache.stamp(id), state.epoch(id.class_tag()))
        };

        let Some(provider) = self.provider(id.class_tag()) else {
            tracing::debug!("no active provider for {}, reading as absent", id);
            return Ok(MetadataValue::Absent);
        };

        tracing::debug!("computing {}", id);
        chain.push(id.clone());
        let mut ctx = ComputeContext::new(self, id.clone(), epoch, chain);
        let outcome = provider.compute_metadata(id, &mut ctx);
        let (reads, cycle_cut) = ctx.finish();
        chain.pop();

        let value = match outcome {
            Ok(value) => {
                self.diagnostics.lock().pending.remove(id);
                value
            }
            Err(ComputeError::Configuration(err)) => {
                tracing::debug!("{} is misconfigured: {}", id, err);
                self.diagnostics.lock().pending.insert(id.clone(), err);
                MetadataValue::Absent
            }
            Err(ComputeError::Engine(err)) => return Err(err),
        };

        if cycle_cut {
            tracing::debug!("{} was computed across a cycle, not caching", id);
            return Ok(value);
        }
        let stored = {
            let mut state = self.state.lock();
            if state.epoch(id.class_tag()) != epoch {
                tracing::debug!("provider of {} was deactivated while computing, result not cached", id);
                return Ok(value);
            }
            state.cache.store_if_current(id, stamp, &reads, value.clone())
        };
        if !stored {
            tracing::debug!("inputs of {} changed while computing, result not cached", id);
        }
        Ok(value)
    }

    fn physical_value(&self, key: &TypeKey) -> MetadataValue {
        match self.facts.type_facts(key) {
            Some(facts) => MetadataValue::present(facts),
            None => MetadataValue::Absent,
        }
    }

    // ===== Dependencies =====

    /// Record `upstream -> downstream` explicitly
    pub fn register_dependency(&self, upstream: &Identifier, downstream: &Identifier) -> Result<bool> {
        let mut state = self.state.lock();
        self.checked_register(&mut state, upstream, downstream)
    }

    /// Register an edge for a read and return the upstream generation seen, atomically.
    ///
    /// `epoch` is the epoch of the downstream class when its computation
    /// started; once the class has been deactivated since, no edge is added.
    pub(crate) fn register_read(
        &self,
        upstream: &Identifier,
        downstream: &Identifier,
        epoch: u64,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        if state.epoch(downstream.class_tag()) == epoch {
            self.checked_register(&mut state, upstream, downstream)?;
        }
        Ok(state.cache.generation(upstream))
    }

    fn checked_register(
        &self,
        state: &mut EngineState,
        upstream: &Identifier,
        downstream: &Identifier,
    ) -> Result<bool> {
        match state.registry.register_dependency(upstream, downstream) {
            Ok(inserted) => Ok(inserted),
            Err(err) if !self.config.reject_invalid_edges => {
                tracing::warn!("ignoring invalid dependency: {}", err);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn deregister_dependency(&self, upstream: &Identifier, downstream: &Identifier) -> bool {
        self.state
            .lock()
            .registry
            .deregister_dependency(upstream, downstream)
    }

    /// Remove every edge touching an identifier of `class`
    pub fn deregister_dependencies(&self, class: &ClassTag) -> usize {
        self.state.lock().registry.deregister_class(class)
    }

    pub fn has_dependency(&self, upstream: &Identifier, downstream: &Identifier) -> bool {
        self.state.lock().registry.has_dependency(upstream, downstream)
    }

    pub fn upstream_of(&self, id: &Identifier) -> Vec<Identifier> {
        self.state.lock().registry.upstream_of(id)
    }

    pub fn downstream_of(&self, id: &Identifier) -> Vec<Identifier> {
        self.state.lock().registry.downstream_of(id)
    }

    /// Snapshot of every edge as `(upstream, downstream)`
    pub fn edges(&self) -> Vec<(Identifier, Identifier)> {
        self.state
            .lock()
            .registry
            .edges()
            .map(|(up, down)| (up.clone(), down.clone()))
            .collect()
    }

    pub fn add_notification_listener(&self, listener: Arc<dyn NotificationListener>) {
        self.state.lock().registry.add_notification_listener(listener);
    }

    pub fn remove_notification_listener(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        self.state
            .lock()
            .registry
            .remove_notification_listener(listener)
    }

    // ===== Change =====

    /// Mark one identifier stale without propagating
    pub fn invalidate(&self, id: &Identifier) -> bool {
        self.state.lock().invalidate(id)
    }

    /// Invalidate `id` and everything transitively downstream of it.
    ///
    /// A notification raised while a pass is already running on this thread
    /// (typically from a listener) joins that pass instead of starting a new
    /// one; its effects then show in the outer report.
    pub fn notify(&self, id: &Identifier) -> PropagationReport {
        self.run_pass(vec![id.clone()])
    }

    /// Announce that a type's markers or attributes changed.
    ///
    /// Every provider bound to a current or previously seen marker has its
    /// local identifier for the type invalidated, along with the physical
    /// identifier of the type, in a single pass.
    pub fn on_type_changed(&self, key: &TypeKey, current: &BTreeSet<Marker>) -> PropagationReport {
        let classes = self.state.lock().triggers.on_type_changed(key, current);
        let mut roots = vec![Identifier::physical(key.clone())];
        for class in classes {
            if let Some(provider) = self.provider(&class) {
                roots.push(provider.create_local_identifier(&key.name, &key.path));
            }
        }
        self.run_pass(roots)
    }

    /// Re-read a type's facts and propagate the change.
    ///
    /// When the type no longer exists, everything keyed on it is forgotten
    /// once propagation is done.
    pub fn notify_type_changed(&self, key: &TypeKey) -> PropagationReport {
        let facts = self.facts.type_facts(key);
        let markers = facts
            .as_ref()
            .map(TypeFacts::marker_set)
            .unwrap_or_default();
        let report = self.on_type_changed(key, &markers);
        if facts.is_none() {
            self.forget_type(key);
        }
        report
    }

    fn forget_type(&self, key: &TypeKey) {
        let (entries, edges) = {
            let mut state = self.state.lock();
            let entries = state.cache.remove_type(key);
            let edges: usize = state
                .registry
                .identifiers_of_type(key)
                .iter()
                .map(|id| state.registry.deregister_dependencies_of(id))
                .sum();
            state.triggers.forget_type(key);
            (entries, edges)
        };
        self.diagnostics
            .lock()
            .pending
            .retain(|id, _| id.key() != key);
        tracing::debug!(
            "forgot deleted type {} ({} cache entries, {} edges)",
            key,
            entries,
            edges
        );
    }

    /// Walk every known type and return the identifiers active providers would own.
    ///
    /// Also records each type's markers, so later marker removals are seen.
    pub fn rescan(&self) -> Vec<Identifier> {
        let seen: Vec<(TypeKey, BTreeSet<Marker>)> = self
            .facts
            .all_types()
            .into_iter()
            .filter_map(|key| {
                let markers = self.facts.type_facts(&key)?.marker_set();
                Some((key, markers))
            })
            .collect();

        let mut bound = Vec::new();
        {
            let mut state = self.state.lock();
            for (key, markers) in &seen {
                let classes = state.triggers.on_type_changed(key, markers);
                bound.push((key, classes));
            }
        }

        let mut owned = BTreeSet::new();
        for (key, classes) in bound {
            for class in classes {
                if let Some(provider) = self.provider(&class) {
                    owned.insert(provider.create_local_identifier(&key.name, &key.path));
                }
            }
        }
        tracing::info!("rescan found {} identifiers over {} types", owned.len(), seen.len());
        owned.into_iter().collect()
    }

    fn run_pass(&self, roots: Vec<Identifier>) -> PropagationReport {
        let guard = self.pass.lock();
        {
            let mut pass_state = guard.borrow_mut();
            if pass_state.active {
                tracing::debug!("joining running pass with {} identifiers", roots.len());
                pass_state.nested.extend(roots);
                return PropagationReport::default();
            }
            pass_state.active = true;
        }

        let report = {
            let _reset = PassReset(&guard);
            let mut pass = Propagation::new(self.config.max_pass_len);
            for root in roots {
                pass.enqueue(root);
            }
            let mut host = ServiceHost {
                service: self,
                pass_state: &guard,
            };
            loop {
                pass.run(&mut host);
                let nested = std::mem::take(&mut guard.borrow_mut().nested);
                if nested.is_empty() || pass.report().truncated {
                    break;
                }
                for id in nested {
                    pass.enqueue(id);
                }
            }
            pass.into_report()
        };
        drop(guard);

        tracing::debug!(
            "pass reached fixpoint: {} invalidated, {} edges dropped",
            report.invalidated.len(),
            report.dropped_edges.len()
        );
        self.publish_diagnostics();
        report
    }

    fn pass_active_here(&self) -> bool {
        self.pass
            .try_lock()
            .map(|guard| guard.borrow().active)
            .unwrap_or(false)
    }

    // ===== Diagnostics =====

    fn publish_diagnostics(&self) {
        let mut diagnostics = self.diagnostics.lock();
        let pending = std::mem::take(&mut diagnostics.pending);
        for (identifier, error) in pending {
            let diagnostic = Diagnostic::new(identifier, error);
            tracing::warn!("{}", diagnostic);
            diagnostics.published.push(diagnostic);
        }
    }

    /// Drain the diagnostics published so far
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics.lock().published)
    }
}

/// Clears the pass flag even if a provider panics mid-pass
struct PassReset<'a>(&'a RefCell<PassState>);

impl Drop for PassReset<'_> {
    fn drop(&mut self) {
        let mut state = self.0.borrow_mut();
        state.active = false;
        state.nested.clear();
    }
}

struct ServiceHost<'a> {
    service: &'a MetadataService,
    pass_state: &'a RefCell<PassState>,
}

impl PropagationHost for ServiceHost<'_> {
    fn downstream_of(&mut self, id: &Identifier) -> Vec<Identifier> {
        self.service.state.lock().registry.downstream_of(id)
    }

    fn invalidate(&mut self, id: &Identifier) {
        let listeners = {
            let mut state = self.service.state.lock();
            state.invalidate(id);
            state.registry.listeners()
        };
        tracing::trace!("invalidated {}", id);
        for listener in listeners {
            listener.notify(id);
        }
    }

    fn still_depends(&mut self, upstream: &Identifier, downstream: &Identifier) -> bool {
        match self.service.provider(downstream.class_tag()) {
            Some(provider) => provider.still_depends_on(downstream, upstream, self.service.facts()),
            None => true,
        }
    }

    fn drop_dependency(&mut self, upstream: &Identifier, downstream: &Identifier) {
        tracing::debug!("{} no longer depends on {}", downstream, upstream);
        self.service
            .state
            .lock()
            .registry
            .deregister_dependency(upstream, downstream);
    }

    fn also_affected(&mut self, id: &Identifier) -> Vec<Identifier> {
        let mut affected = std::mem::take(&mut self.pass_state.borrow_mut().nested);
        let subject = if id.is_physical() {
            ChangeSubject::Type(id.key().clone())
        } else {
            ChangeSubject::Metadata(id.clone())
        };
        for provider in self.service.active_providers() {
            if provider.provides_class_tag() == *id.class_tag() {
                continue;
            }
            affected.extend(provider.local_identifier_affected_by(&subject, self.service.facts()));
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnnotationValues, InMemoryFacts};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEXT: ClassTag = ClassTag::from_static("Text");
    const UPPER: ClassTag = ClassTag::from_static("Upper");

    #[derive(Debug, PartialEq, serde::Serialize)]
    struct Echo(String);

    /// Reads attribute `text` of marker `echo`, optionally suffixed with an upstream class
    struct EchoProvider {
        class: ClassTag,
        upstream: Option<ClassTag>,
        calls: AtomicUsize,
    }

    impl EchoProvider {
        fn new(class: ClassTag, upstream: Option<ClassTag>) -> Arc<Self> {
            Arc::new(Self {
                class,
                upstream,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MetadataProvider for EchoProvider {
        fn provides_class_tag(&self) -> ClassTag {
            self.class.clone()
        }

        fn interested_triggers(&self) -> BTreeSet<Marker> {
            [Marker::new("echo")].into_iter().collect()
        }

        fn compute_metadata(
            &self,
            id: &Identifier,
            ctx: &mut ComputeContext<'_>,
        ) -> std::result::Result<MetadataValue, ComputeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(facts) = ctx.governor_facts()? else {
                return Ok(MetadataValue::Absent);
            };
            let Some(echo) = AnnotationValues::read(&facts, &Marker::new("echo")) else {
                return Ok(MetadataValue::Absent);
            };
            let mut text = echo.required_text("text")?.to_string();
            if let Some(class) = &self.upstream {
                let upstream = ctx.get(&id.with_class(class.clone()))?;
                let Some(Echo(inner)) = upstream.downcast::<Echo>() else {
                    return Ok(MetadataValue::Absent);
                };
                text = format!("{}+{}", inner, text.to_uppercase());
            }
            Ok(MetadataValue::present(Echo(text)))
        }
    }

    fn key(name: &str) -> TypeKey {
        TypeKey::main(name).unwrap()
    }

    fn echo_facts(name: &str, text: &str) -> TypeFacts {
        TypeFacts::new(key(name)).with_attribute(Marker::new("echo"), "text", text)
    }

    fn setup() -> (Arc<InMemoryFacts>, MetadataService, Arc<EchoProvider>, Arc<EchoProvider>) {
        let facts = Arc::new(InMemoryFacts::new());
        facts.put(echo_facts("Order", "order"));
        let service = MetadataService::new(facts.clone());
        let text = EchoProvider::new(TEXT, None);
        let upper = EchoProvider::new(UPPER, Some(TEXT));
        service.activate_provider(text.clone()).unwrap();
        service.activate_provider(upper.clone()).unwrap();
        (facts, service, text, upper)
    }

    #[test]
    fn test_get_memoizes() {
        let (_facts, service, text, _upper) = setup();
        let id = Identifier::new(TEXT, key("Order"));

        let first = service.get(&id).unwrap();
        let second = service.get(&id).unwrap();
        assert!(first.same_object(&second));
        assert_eq!(text.calls(), 1);
    }

    #[test]
    fn test_reads_register_edges() {
        let (_facts, service, _text, _upper) = setup();
        let upper = Identifier::new(UPPER, key("Order"));
        let text = Identifier::new(TEXT, key("Order"));

        let value = service.get(&upper).unwrap();
        assert_eq!(value.downcast::<Echo>(), Some(&Echo("order+ORDER".into())));
        assert!(service.has_dependency(&text, &upper));
        assert!(service.has_dependency(&Identifier::physical(key("Order")), &text));
    }

    #[test]
    fn test_type_change_recomputes_downstream() {
        let (facts, service, text, upper) = setup();
        let upper_id = Identifier::new(UPPER, key("Order"));
        service.get(&upper_id).unwrap();

        facts.put(echo_facts("Order", "purchase"));
        let report = service.notify_type_changed(&key("Order"));
        assert!(report.invalidated.contains(&upper_id));
        assert!(matches!(service.lookup(&upper_id), CacheLookup::Invalidated));

        let value = service.get(&upper_id).unwrap();
        assert_eq!(value.downcast::<Echo>(), Some(&Echo("purchase+PURCHASE".into())));
        assert_eq!(text.calls(), 2);
        assert_eq!(upper.calls(), 2);
    }

    #[test]
    fn test_unknown_class_is_absent_and_not_cached() {
        let (_facts, service, _text, _upper) = setup();
        let id = Identifier::new(ClassTag::new("Nobody").unwrap(), key("Order"));
        assert!(service.get(&id).unwrap().is_absent());
        assert!(matches!(service.lookup(&id), CacheLookup::NotComputed));
    }

    #[test]
    fn test_misconfiguration_becomes_diagnostic() {
        let (facts, service, _text, _upper) = setup();
        facts.put(echo_facts("Broken", " "));
        let id = Identifier::new(TEXT, key("Broken"));

        assert!(service.get(&id).unwrap().is_absent());
        let diagnostics = service.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), "E-CONFIG-001");
        assert_eq!(diagnostics[0].identifier, id);

        // cached Absent does not report twice
        assert!(service.get(&id).unwrap().is_absent());
        assert!(service.take_diagnostics().is_empty());
    }

    #[test]
    fn test_duplicate_and_reserved_classes_rejected() {
        let (_facts, service, _text, _upper) = setup();
        let err = service
            .activate_provider(EchoProvider::new(TEXT, None))
            .unwrap_err();
        assert_eq!(err.code(), "E-ENGINE-001");

        let err = service
            .activate_provider(EchoProvider::new(ClassTag::PHYSICAL_TYPE, None))
            .unwrap_err();
        assert_eq!(err.code(), "E-ENGINE-002");
    }

    #[test]
    fn test_deactivation_cleans_up() {
        let (_facts, service, _text, _upper) = setup();
        let upper_id = Identifier::new(UPPER, key("Order"));
        service.get(&upper_id).unwrap();

        assert!(service.deactivate_provider(&UPPER));
        assert!(!service.deactivate_provider(&UPPER));
        assert!(service.edges().iter().all(|(up, down)| up.class_tag() != &UPPER
            && down.class_tag() != &UPPER));
        assert!(matches!(service.lookup(&upper_id), CacheLookup::NotComputed));
        assert_eq!(service.active_classes(), vec![TEXT]);
        assert!(service.get(&upper_id).unwrap().is_absent());
    }

    #[test]
    fn test_unread_physical_types_get_no_cache_slot() {
        let (facts, service, _text, _upper) = setup();
        facts.put(TypeFacts::new(key("Plain")));
        service.notify_type_changed(&key("Plain"));
        assert!(!service
            .state
            .lock()
            .cache
            .tracks(&Identifier::physical(key("Plain"))));

        service.get(&Identifier::new(TEXT, key("Order"))).unwrap();
        service.notify_type_changed(&key("Order"));
        assert!(service
            .state
            .lock()
            .cache
            .tracks(&Identifier::physical(key("Order"))));
    }

    #[test]
    fn test_invalid_edge_policy() {
        let (_facts, service, _text, _upper) = setup();
        let a = Identifier::new(TEXT, key("Order"));
        let b = Identifier::new(TEXT, key("Customer"));
        assert!(service.register_dependency(&a, &b).is_err());

        let lenient = MetadataService::with_config(
            Arc::new(InMemoryFacts::new()),
            EngineConfig {
                reject_invalid_edges: false,
                ..EngineConfig::default()
            },
        );
        assert!(!lenient.register_dependency(&a, &b).unwrap());
        assert!(lenient.edges().is_empty());
    }

    #[test]
    fn test_listener_notification_joins_running_pass() {
        let (_facts, service, _text, _upper) = setup();
        let service = Arc::new(service);
        let text_id = Identifier::new(TEXT, key("Order"));
        let other = Identifier::new(UPPER, key("Customer"));

        let weak = Arc::downgrade(&service);
        let trigger = text_id.clone();
        let chained = other.clone();
        let listener: Arc<dyn NotificationListener> = Arc::new(move |changed: &Identifier| {
            if changed == &trigger {
                if let Some(service) = weak.upgrade() {
                    service.notify(&chained);
                }
            }
        });
        service.add_notification_listener(listener);

        let report = service.notify(&text_id);
        assert_eq!(report.invalidated, vec![text_id, other]);
    }

    #[test]
    fn test_rescan_lists_owned_identifiers() {
        let (facts, service, _text, _upper) = setup();
        facts.put(TypeFacts::new(key("Plain")));
        let owned = service.rescan();
        assert_eq!(
            owned,
            vec![
                Identifier::new(TEXT, key("Order")),
                Identifier::new(UPPER, key("Order")),
            ]
        );
    }

    #[test]
    fn test_deleted_type_is_forgotten() {
        let (facts, service, _text, _upper) = setup();
        let upper_id = Identifier::new(UPPER, key("Order"));
        service.get(&upper_id).unwrap();
        assert!(!service.edges().is_empty());

        facts.remove(&key("Order"));
        service.notify_type_changed(&key("Order"));
        assert!(service.edges().is_empty());
        assert!(matches!(service.lookup(&upper_id), CacheLookup::NotComputed));
        assert!(service.get(&upper_id).unwrap().is_absent());
    }
}
