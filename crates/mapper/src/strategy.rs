use core_types::{RecordDescriptor, TypeDescriptor, TypeRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// How a source shape is turned into a destination shape, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionStrategy {
    /// The destination type is the source type or one of its bases.
    AssignableCopy,
    /// Both records declare a shared capability; its members are copied.
    CommonInterfaceCopy,
    /// Same-named members are copied, converting values whose types differ.
    CommonPropertyCopy,
    /// Sequences and mappings are converted element by element.
    CollectionElementCopy,
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionStrategy::AssignableCopy => "assignable copy",
            ConversionStrategy::CommonInterfaceCopy => "common interface copy",
            ConversionStrategy::CommonPropertyCopy => "common property copy",
            ConversionStrategy::CollectionElementCopy => "collection element copy",
        };
        f.write_str(name)
    }
}

/// One source member matched to one destination member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPair {
    pub name: String,
    pub source_type: TypeDescriptor,
    pub destination_type: TypeDescriptor,
}

/// The member-matching table for a (source record, destination record) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPlan {
    pub strategy: ConversionStrategy,
    pub pairs: Vec<MemberPair>,
}

/// Builds the member-matching table for two records, or `None` when the
/// records share nothing copyable.
pub(crate) fn build_record_plan(
    registry: &TypeRegistry,
    source: &RecordDescriptor,
    destination: &RecordDescriptor,
) -> Option<MemberPlan> {
    let pair = |name: &str| -> Option<MemberPair> {
        let from = source.readable_member(name)?;
        let to = destination.writable_member(name)?;
        Some(MemberPair {
            name: name.to_string(),
            source_type: from.ty.clone(),
            destination_type: to.ty.clone(),
        })
    };

    if source.name == destination.name || registry.is_ancestor(&destination.name, &source.name) {
        let pairs = destination.members.iter().filter_map(|m| pair(&m.name)).collect();
        return Some(MemberPlan {
            strategy: ConversionStrategy::AssignableCopy,
            pairs,
        });
    }

    let shared = registry.shared_capabilities(source, destination);
    if !shared.is_empty() {
        let mut names: Vec<&str> = Vec::new();
        for capability in shared.iter().filter_map(|c| registry.capability(c).ok()) {
            for member in &capability.members {
                if !names.contains(&member.name.as_str()) {
                    names.push(&member.name);
                }
            }
        }
        let pairs: Vec<MemberPair> = names.into_iter().filter_map(pair).collect();
        if !pairs.is_empty() {
            return Some(MemberPlan {
                strategy: ConversionStrategy::CommonInterfaceCopy,
                pairs,
            });
        }
        tracing::trace!(
            source = %source.name,
            destination = %destination.name,
            "Shared capabilities have no copyable members; falling back to property matching."
        );
    }

    let pairs: Vec<MemberPair> = destination.members.iter().filter_map(|m| pair(&m.name)).collect();
    if pairs.is_empty() {
        return None;
    }
    Some(MemberPlan {
        strategy: ConversionStrategy::CommonPropertyCopy,
        pairs,
    })
}

/// Memoized member plans, keyed by (source record, destination record).
///
/// Registered records never change, so an entry stays valid for the life of
/// the registry it was built from.
#[derive(Debug, Default)]
pub(crate) struct PlanCache {
    plans: RwLock<HashMap<(String, String), Option<Arc<MemberPlan>>>>,
}

impl PlanCache {
    pub(crate) fn get_or_build(
        &self,
        registry: &TypeRegistry,
        source: &RecordDescriptor,
        destination: &RecordDescriptor,
    ) -> Option<Arc<MemberPlan>> {
        let key = (source.name.clone(), destination.name.clone());
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return plan.clone();
        }

        let plan = build_record_plan(registry, source, destination).map(Arc::new);
        tracing::trace!(
            source = %source.name,
            destination = %destination.name,
            strategy = ?plan.as_ref().map(|p| p.strategy),
            "Built member plan."
        );
        self.plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, plan.clone());
        plan
    }

    pub(crate) fn len(&self) -> usize {
        self.plans.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
