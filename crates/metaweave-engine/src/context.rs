//! Per-computation view of the metadata service

use metaweave_ids::{Identifier, TypeKey, TypeName};

use crate::{MetadataService, MetadataValue, Result, TypeFacts, TypeFactsSource};

/// Handed to [`MetadataProvider::compute_metadata`](crate::MetadataProvider::compute_metadata).
///
/// Bound to the identifier being computed. Every read through it registers
/// the corresponding dependency edge before the value is returned, so
/// dependencies are discovered by use.
pub struct ComputeContext<'a> {
    service: &'a MetadataService,
    target: Identifier,
    /// Deactivation epoch of the target's class when the computation started
    epoch: u64,
    /// Identifiers currently being computed on this call stack, outermost first
    chain: &'a mut Vec<Identifier>,
    /// Upstream identifiers read so far with the generation observed at read time
    reads: Vec<(Identifier, u64)>,
    cycle_cut: bool,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(
        service: &'a MetadataService,
        target: Identifier,
        epoch: u64,
        chain: &'a mut Vec<Identifier>,
    ) -> Self {
        Self {
            service,
            target,
            epoch,
            chain,
            reads: Vec::new(),
            cycle_cut: false,
        }
    }

    /// The identifier being computed
    pub fn target(&self) -> &Identifier {
        &self.target
    }

    /// Read another identifier's metadata, registering `upstream -> target` first
    pub fn get(&mut self, upstream: &Identifier) -> Result<MetadataValue> {
        self.register_dependency(upstream)?;
        if self.chain.contains(upstream) {
            tracing::warn!(
                "dependency cycle: {} is already being computed, reading it as absent from {}",
                upstream,
                self.target
            );
            self.cycle_cut = true;
            return Ok(MetadataValue::Absent);
        }
        self.service.resolve(upstream, self.chain)
    }

    /// Register `upstream -> target` without reading the upstream value
    pub fn register_dependency(&mut self, upstream: &Identifier) -> Result<()> {
        let generation = self
            .service
            .register_read(upstream, &self.target, self.epoch)?;
        self.reads.push((upstream.clone(), generation));
        Ok(())
    }

    /// Read a type's facts, registering its physical identifier as upstream
    pub fn type_facts(&mut self, key: &TypeKey) -> Result<Option<TypeFacts>> {
        self.register_dependency(&Identifier::physical(key.clone()))?;
        Ok(self.service.facts().type_facts(key))
    }

    /// Facts of the governing type of the target
    pub fn governor_facts(&mut self) -> Result<Option<TypeFacts>> {
        let key = self.target.key().clone();
        self.type_facts(&key)
    }

    /// Resolve the logical path of a type known by name
    pub fn locate(&self, name: &TypeName) -> Option<TypeKey> {
        self.service.facts().locate(name)
    }

    pub fn facts(&self) -> &dyn TypeFactsSource {
        self.service.facts()
    }

    pub(crate) fn finish(self) -> (Vec<(Identifier, u64)>, bool) {
        (self.reads, self.cycle_cut)
    }
}
