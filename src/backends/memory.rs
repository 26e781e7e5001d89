//! In-Memory Array
//!
//! Simulated PowerMax array holding every entity in process memory. It
//! enforces the array-side rules the provider relies on (name uniqueness,
//! in-use checks, SRP constraints, grow-only volumes), records every call it
//! receives and can be told to fail chosen operations.

use crate::domain::array::{
    CapUnit, CreateHostGroupParams, CreateHostParams, CreateMaskingViewParams,
    CreatePortGroupParams, CreateStorageGroupParams, CreateVolumeParams, HostGroupInfo,
    HostGroupMember, HostInfo, HostIoLimit, MaskingViewInfo, PortGroupInfo, PortKey,
    SnapshotPolicyBinding, StorageGroupInfo, VolumeInfo,
};
use crate::domain::flags::HostFlags;
use crate::domain::ports::{ArrayClient, CallContext, Operation};
use crate::error::{Error, Result};
use crate::model::NONE_SENTINEL;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

// =============================================================================
// Memory Array Configuration
// =============================================================================

/// Catalog of array-side resources the simulated array accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryArrayConfig {
    /// Array serial number
    pub serial: String,
    /// Storage resource pools
    pub srps: Vec<String>,
    /// Service levels
    pub service_levels: Vec<String>,
    /// Snapshot policies available for association
    pub snapshot_policies: Vec<String>,
    /// Most recent calls kept in the journal; zero disables recording
    pub journal_capacity: usize,
}

impl Default for MemoryArrayConfig {
    fn default() -> Self {
        Self {
            serial: "000197900123".to_string(),
            srps: vec!["SRP_1".to_string()],
            service_levels: ["Diamond", "Platinum", "Gold", "Silver", "Bronze", "Optimized"]
                .map(String::from)
                .to_vec(),
            snapshot_policies: vec!["DailyDefault".to_string(), "WeeklyDefault".to_string()],
            journal_capacity: 1024,
        }
    }
}

// =============================================================================
// Call Journal & Failure Injection
// =============================================================================

/// One call received by the array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Entity the call addressed
    pub target: String,
    /// Members or values carried by the call
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: Operation,
    target: Option<String>,
    reason: String,
    /// Apply the change, then report failure
    after_apply: bool,
}

impl Fault {
    fn matches(&self, operation: Operation, target: &str) -> bool {
        self.operation == operation && self.target.as_deref().map_or(true, |t| t == target)
    }
}

/// Why the simulated array refused a call
enum Rejection {
    NotFound { kind: &'static str, id: String },
    Invalid(String),
}

type Outcome<T> = std::result::Result<T, Rejection>;

fn invalid<T>(reason: impl Into<String>) -> Outcome<T> {
    Err(Rejection::Invalid(reason.into()))
}

fn missing(kind: &'static str, id: &str) -> Rejection {
    Rejection::NotFound {
        kind,
        id: id.to_string(),
    }
}

// =============================================================================
// Array State
// =============================================================================

#[derive(Debug, Clone, Default)]
struct HostRecord {
    initiators: Vec<String>,
    flags: HostFlags,
    consistent_lun: bool,
}

#[derive(Debug, Clone, Default)]
struct HostGroupRecord {
    hosts: Vec<String>,
    flags: HostFlags,
    consistent_lun: bool,
}

#[derive(Debug, Clone, Default)]
struct PortGroupRecord {
    protocol: String,
    ports: Vec<PortKey>,
}

#[derive(Debug, Clone, Default)]
struct StorageGroupRecord {
    srp: String,
    slo: String,
    compression: bool,
    workload: String,
    host_io_limit: HostIoLimit,
    volumes: Vec<String>,
    snapshot_policies: Vec<SnapshotPolicyBinding>,
}

#[derive(Debug, Clone, Default)]
struct VolumeRecord {
    identifier: String,
    cap_mb: f64,
    mobility_id_enabled: bool,
}

#[derive(Debug, Default)]
struct ArrayState {
    hosts: IndexMap<String, HostRecord>,
    host_groups: IndexMap<String, HostGroupRecord>,
    port_groups: IndexMap<String, PortGroupRecord>,
    masking_views: IndexMap<String, MaskingViewInfo>,
    storage_groups: IndexMap<String, StorageGroupRecord>,
    volumes: IndexMap<String, VolumeRecord>,
    next_device: u32,
}

impl ArrayState {
    fn host_mut(&mut self, id: &str) -> Outcome<&mut HostRecord> {
        self.hosts.get_mut(id).ok_or_else(|| missing("host", id))
    }

    fn host_group_mut(&mut self, id: &str) -> Outcome<&mut HostGroupRecord> {
        self.host_groups.get_mut(id).ok_or_else(|| missing("host group", id))
    }

    fn port_group_mut(&mut self, id: &str) -> Outcome<&mut PortGroupRecord> {
        self.port_groups.get_mut(id).ok_or_else(|| missing("port group", id))
    }

    fn storage_group_mut(&mut self, id: &str) -> Outcome<&mut StorageGroupRecord> {
        self.storage_groups
            .get_mut(id)
            .ok_or_else(|| missing("storage group", id))
    }

    fn volume_mut(&mut self, id: &str) -> Outcome<&mut VolumeRecord> {
        self.volumes.get_mut(id).ok_or_else(|| missing("volume", id))
    }

    fn views_where(&self, pred: impl Fn(&MaskingViewInfo) -> bool) -> Vec<String> {
        self.masking_views
            .values()
            .filter(|view| pred(view))
            .map(|view| view.masking_view_id.clone())
            .collect()
    }

    fn groups_of_host(&self, host_id: &str) -> Vec<String> {
        self.host_groups
            .iter()
            .filter(|(_, group)| group.hosts.iter().any(|h| h == host_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn groups_of_volume(&self, volume_id: &str) -> Vec<String> {
        self.storage_groups
            .iter()
            .filter(|(_, group)| group.volumes.iter().any(|v| v == volume_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn initiator_owner(&self, initiator: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|(_, host)| host.initiators.iter().any(|i| i == initiator))
            .map(|(id, _)| id.as_str())
    }

    fn ensure_free(&self, kind: &str, name: &str, taken: bool) -> Outcome<()> {
        if name.trim().is_empty() {
            return invalid(format!("{kind} name cannot be empty"));
        }
        if taken {
            return invalid(format!("{kind} {name} already exists"));
        }
        Ok(())
    }

    fn host_info(&self, id: &str) -> Outcome<HostInfo> {
        let host = self.hosts.get(id).ok_or_else(|| missing("host", id))?;
        let groups = self.groups_of_host(id);
        let masking_views = self.views_where(|view| {
            view.host_id == id || groups.iter().any(|g| *g == view.host_group_id)
        });
        let (enabled_flags, disabled_flags) = host.flags.encode();
        Ok(HostInfo {
            host_id: id.to_string(),
            num_of_masking_views: masking_views.len() as i64,
            num_of_initiators: host.initiators.len() as i64,
            num_of_host_groups: groups.len() as i64,
            port_flags_override: host.flags.overridden_count() > 0,
            consistent_lun: host.consistent_lun,
            enabled_flags,
            disabled_flags,
            host_type: "Fibre".to_string(),
            initiators: host.initiators.clone(),
            masking_views,
            ..Default::default()
        })
    }

    fn host_group_info(&self, id: &str) -> Outcome<HostGroupInfo> {
        let group = self.host_groups.get(id).ok_or_else(|| missing("host group", id))?;
        let hosts: Vec<HostGroupMember> = group
            .hosts
            .iter()
            .map(|host_id| HostGroupMember {
                host_id: host_id.clone(),
                initiators: self
                    .hosts
                    .get(host_id)
                    .map(|host| host.initiators.clone())
                    .unwrap_or_default(),
            })
            .collect();
        let masking_views = self.views_where(|view| view.host_group_id == id);
        let (enabled_flags, disabled_flags) = group.flags.encode();
        Ok(HostGroupInfo {
            host_group_id: id.to_string(),
            num_of_hosts: hosts.len() as i64,
            num_of_initiators: hosts.iter().map(|h| h.initiators.len() as i64).sum(),
            num_of_masking_views: masking_views.len() as i64,
            port_flags_override: group.flags.overridden_count() > 0,
            consistent_lun: group.consistent_lun,
            enabled_flags,
            disabled_flags,
            host_group_type: "Fibre".to_string(),
            hosts,
            masking_views,
        })
    }

    fn port_group_info(&self, id: &str) -> Outcome<PortGroupInfo> {
        let group = self.port_groups.get(id).ok_or_else(|| missing("port group", id))?;
        let masking_views = self.views_where(|view| view.port_group_id == id);
        Ok(PortGroupInfo {
            port_group_id: id.to_string(),
            protocol: group.protocol.clone(),
            ports: group.ports.clone(),
            num_of_ports: group.ports.len() as i64,
            num_of_masking_views: masking_views.len() as i64,
            port_group_type: group.protocol.clone(),
            masking_views,
        })
    }

    fn storage_group_info(&self, id: &str, serial: &str) -> Outcome<StorageGroupInfo> {
        let group = self
            .storage_groups
            .get(id)
            .ok_or_else(|| missing("storage group", id))?;
        let masking_views = self.views_where(|view| view.storage_group_id == id);
        let cap_mb: f64 = group
            .volumes
            .iter()
            .filter_map(|v| self.volumes.get(v))
            .map(|v| v.cap_mb)
            .sum();
        Ok(StorageGroupInfo {
            storage_group_id: id.to_string(),
            srp: group.srp.clone(),
            slo: group.slo.clone(),
            base_slo_name: group.slo.clone(),
            slo_compliance: if group.slo.is_empty() { "NONE" } else { "STABLE" }.to_string(),
            compression: group.compression,
            compression_ratio: if group.compression { "1.0:1" } else { "" }.to_string(),
            workload: group.workload.clone(),
            num_of_vols: group.volumes.len() as i64,
            num_of_masking_views: masking_views.len() as i64,
            num_of_snapshot_policies: group.snapshot_policies.len() as i64,
            cap_gb: cap_mb / CapUnit::Gb.megabytes(),
            device_emulation: "FBA".to_string(),
            sg_type: "Standalone".to_string(),
            unprotected: group.snapshot_policies.is_empty(),
            uuid: format!("{serial}-{id}"),
            host_io_limit: group.host_io_limit.clone(),
            volume_ids: group.volumes.clone(),
            snapshot_policies: group.snapshot_policies.clone(),
            masking_views,
            ..Default::default()
        })
    }

    fn volume_info(&self, id: &str, serial: &str) -> Outcome<VolumeInfo> {
        let volume = self.volumes.get(id).ok_or_else(|| missing("volume", id))?;
        let storage_group_ids = self.groups_of_volume(id);
        let front_end_paths: usize = storage_group_ids
            .iter()
            .flat_map(|sg| self.views_where(|view| view.storage_group_id == *sg))
            .filter_map(|view| self.masking_views.get(&view))
            .filter_map(|view| self.port_groups.get(&view.port_group_id))
            .map(|group| group.ports.len())
            .sum();
        let wwn = format!("60000970000{serial}5330{id}");
        Ok(VolumeInfo {
            volume_id: id.to_string(),
            volume_identifier: volume.identifier.clone(),
            volume_type: "TDEV".to_string(),
            emulation: "FBA".to_string(),
            status: "Ready".to_string(),
            effective_wwn: wwn.clone(),
            wwn,
            has_effective_wwn: true,
            physical_name: "Not Visible".to_string(),
            cap_gb: volume.cap_mb / CapUnit::Gb.megabytes(),
            cap_mb: volume.cap_mb,
            cap_cyl: (volume.cap_mb / CapUnit::Cyl.megabytes()).ceil() as i64,
            num_of_storage_groups: storage_group_ids.len() as i64,
            num_of_front_end_paths: front_end_paths as i64,
            storage_group_ids,
            mobility_id_enabled: volume.mobility_id_enabled,
            ..Default::default()
        })
    }
}

// =============================================================================
// Memory Array
// =============================================================================

/// In-process simulated array
pub struct MemoryArray {
    config: MemoryArrayConfig,
    state: RwLock<ArrayState>,
    journal: Mutex<VecDeque<RecordedCall>>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryArray {
    pub fn new(config: MemoryArrayConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ArrayState {
                next_device: 0x100,
                ..Default::default()
            }),
            journal: Mutex::new(VecDeque::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &MemoryArrayConfig {
        &self.config
    }

    /// Fail every call of `operation` with `reason`
    pub fn fail(&self, operation: Operation, reason: impl Into<String>) {
        self.inject(operation, None, reason.into(), false);
    }

    /// Fail calls of `operation` addressing `target` only
    pub fn fail_for(
        &self,
        operation: Operation,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.inject(operation, Some(target.into()), reason.into(), false);
    }

    /// Apply calls of `operation`, then report them as failed
    pub fn fail_after_apply(&self, operation: Operation, reason: impl Into<String>) {
        self.inject(operation, None, reason.into(), true);
    }

    pub fn clear_failures(&self) {
        self.faults.lock().clear();
    }

    /// Mutating calls received so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.operation.is_mutating())
            .cloned()
            .collect()
    }

    /// Calls of one operation
    pub fn calls_of(&self, operation: Operation) -> Vec<RecordedCall> {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    /// Every retained call, reads included
    pub fn journal(&self) -> Vec<RecordedCall> {
        self.journal.lock().iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    fn record(&self, call: RecordedCall) {
        let capacity = self.config.journal_capacity;
        if capacity == 0 {
            return;
        }
        let mut journal = self.journal.lock();
        while journal.len() >= capacity {
            journal.pop_front();
        }
        journal.push_back(call);
    }

    fn inject(
        &self,
        operation: Operation,
        target: Option<String>,
        reason: String,
        after_apply: bool,
    ) {
        debug!(%operation, ?target, %reason, after_apply, "injecting failure");
        self.faults.lock().push(Fault {
            operation,
            target,
            reason,
            after_apply,
        });
    }

    fn admit(
        &self,
        ctx: &CallContext,
        operation: Operation,
        target: &str,
        members: Vec<String>,
    ) -> Result<Option<Fault>> {
        ctx.check()?;
        trace!(%operation, entity = target, "array call");
        self.record(RecordedCall {
            operation,
            target: target.to_string(),
            members,
        });
        let fault = self
            .faults
            .lock()
            .iter()
            .find(|fault| fault.matches(operation, target))
            .cloned();
        match fault {
            Some(fault) if !fault.after_apply => {
                Err(Error::remote(operation.as_str(), fault.reason))
            }
            other => Ok(other),
        }
    }

    fn settle<T>(operation: Operation, outcome: Outcome<T>, fault: Option<Fault>) -> Result<T> {
        let value = outcome.map_err(|rejection| match rejection {
            Rejection::NotFound { kind, id } => Error::not_found(kind, id),
            Rejection::Invalid(reason) => Error::remote(operation.as_str(), reason),
        })?;
        match fault {
            Some(fault) => Err(Error::remote(operation.as_str(), fault.reason)),
            None => Ok(value),
        }
    }

    fn read<T>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        target: &str,
        view: impl FnOnce(&ArrayState) -> Outcome<T>,
    ) -> Result<T> {
        let fault = self.admit(ctx, operation, target, Vec::new())?;
        let outcome = view(&*self.state.read());
        Self::settle(operation, outcome, fault)
    }

    fn mutate<T>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        target: &str,
        members: Vec<String>,
        apply: impl FnOnce(&mut ArrayState) -> Outcome<T>,
    ) -> Result<T> {
        let fault = self.admit(ctx, operation, target, members)?;
        let outcome = apply(&mut *self.state.write());
        Self::settle(operation, outcome, fault)
    }

    fn check_srp(&self, srp: &str) -> Outcome<()> {
        if is_none(srp) || self.config.srps.iter().any(|s| s == srp) {
            Ok(())
        } else {
            invalid(format!("SRP {srp} does not exist"))
        }
    }

    fn check_service_level(&self, slo: &str) -> Outcome<()> {
        if is_none(slo) || self.config.service_levels.iter().any(|s| s == slo) {
            Ok(())
        } else {
            invalid(format!("service level {slo} does not exist"))
        }
    }

    fn check_policies(&self, names: &[String]) -> Outcome<()> {
        match names
            .iter()
            .find(|name| !self.config.snapshot_policies.contains(name))
        {
            Some(name) => invalid(format!("snapshot policy {name} does not exist")),
            None => Ok(()),
        }
    }
}

fn is_none(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case(NONE_SENTINEL)
}

fn stored(value: &str) -> String {
    if is_none(value) {
        String::new()
    } else {
        value.to_string()
    }
}

/// Move an entry to a new key, keeping the value
fn rekey<V>(
    map: &mut IndexMap<String, V>,
    kind: &'static str,
    from: &str,
    to: &str,
) -> Outcome<()> {
    if to.trim().is_empty() {
        return invalid(format!("{kind} name cannot be empty"));
    }
    if from != to && map.contains_key(to) {
        return invalid(format!("{kind} {to} already exists"));
    }
    let value = map.shift_remove(from).ok_or_else(|| missing(kind, from))?;
    map.insert(to.to_string(), value);
    Ok(())
}

fn flag_members(flags: &HostFlags, consistent_lun: bool) -> Vec<String> {
    let (enabled, disabled) = flags.encode();
    vec![enabled, disabled, format!("consistent_lun={consistent_lun}")]
}

#[async_trait]
impl ArrayClient for MemoryArray {
    // -------------------------------------------------------------------------
    // Hosts
    // -------------------------------------------------------------------------

    async fn get_host(&self, ctx: &CallContext, host_id: &str) -> Result<HostInfo> {
        self.read(ctx, Operation::GetHost, host_id, |state| state.host_info(host_id))
    }

    async fn create_host(&self, ctx: &CallContext, params: &CreateHostParams) -> Result<HostInfo> {
        let id = params.host_id.as_str();
        self.mutate(ctx, Operation::CreateHost, id, params.initiators.clone(), |state| {
            state.ensure_free("host", id, state.hosts.contains_key(id))?;
            let initiators: Vec<String> = params
                .initiators
                .iter()
                .map(|i| i.to_ascii_lowercase())
                .collect();
            for initiator in &initiators {
                if initiator.trim().is_empty() {
                    return invalid("initiator cannot be empty");
                }
                if let Some(owner) = state.initiator_owner(initiator) {
                    return invalid(format!(
                        "initiator {initiator} is already in use by host {owner}"
                    ));
                }
            }
            state.hosts.insert(
                id.to_string(),
                HostRecord {
                    initiators,
                    flags: params.flags,
                    consistent_lun: params.consistent_lun,
                },
            );
            state.host_info(id)
        })
    }

    async fn rename_host(&self, ctx: &CallContext, host_id: &str, new_name: &str) -> Result<()> {
        self.mutate(ctx, Operation::RenameHost, host_id, vec![new_name.to_string()], |state| {
            rekey(&mut state.hosts, "host", host_id, new_name)?;
            for group in state.host_groups.values_mut() {
                for member in group.hosts.iter_mut().filter(|m| m.as_str() == host_id) {
                    *member = new_name.to_string();
                }
            }
            for view in state.masking_views.values_mut().filter(|v| v.host_id == host_id) {
                view.host_id = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn add_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()> {
        self.mutate(ctx, Operation::AddHostInitiators, host_id, initiators.to_vec(), |state| {
            state.host_mut(host_id)?;
            let mut added = Vec::with_capacity(initiators.len());
            for initiator in initiators.iter().map(|i| i.to_ascii_lowercase()) {
                if initiator.trim().is_empty() {
                    return invalid("initiator cannot be empty");
                }
                match state.initiator_owner(&initiator) {
                    Some(owner) if owner == host_id => {}
                    Some(owner) => {
                        return invalid(format!(
                            "initiator {initiator} is already in use by host {owner}"
                        ))
                    }
                    None => added.push(initiator),
                }
            }
            state.host_mut(host_id)?.initiators.extend(added);
            Ok(())
        })
    }

    async fn remove_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()> {
        self.mutate(ctx, Operation::RemoveHostInitiators, host_id, initiators.to_vec(), |state| {
            let host = state.host_mut(host_id)?;
            for initiator in initiators {
                let before = host.initiators.len();
                host.initiators.retain(|i| !i.eq_ignore_ascii_case(initiator));
                if host.initiators.len() == before {
                    return invalid(format!("initiator {initiator} is not part of host {host_id}"));
                }
            }
            Ok(())
        })
    }

    async fn set_host_flags(
        &self,
        ctx: &CallContext,
        host_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()> {
        let members = flag_members(flags, consistent_lun);
        self.mutate(ctx, Operation::SetHostFlags, host_id, members, |state| {
            let host = state.host_mut(host_id)?;
            host.flags = *flags;
            host.consistent_lun = consistent_lun;
            Ok(())
        })
    }

    async fn delete_host(&self, ctx: &CallContext, host_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeleteHost, host_id, Vec::new(), |state| {
            if !state.hosts.contains_key(host_id) {
                return Err(missing("host", host_id));
            }
            if let Some(view) = state.views_where(|v| v.host_id == host_id).first() {
                return invalid(format!("host {host_id} is in use by masking view {view}"));
            }
            if let Some(group) = state.groups_of_host(host_id).first() {
                return invalid(format!("host {host_id} is a member of host group {group}"));
            }
            state.hosts.shift_remove(host_id);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Host Groups
    // -------------------------------------------------------------------------

    async fn get_host_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
    ) -> Result<HostGroupInfo> {
        self.read(ctx, Operation::GetHostGroup, host_group_id, |state| {
            state.host_group_info(host_group_id)
        })
    }

    async fn create_host_group(
        &self,
        ctx: &CallContext,
        params: &CreateHostGroupParams,
    ) -> Result<HostGroupInfo> {
        let id = params.host_group_id.as_str();
        self.mutate(ctx, Operation::CreateHostGroup, id, params.host_ids.clone(), |state| {
            state.ensure_free("host group", id, state.host_groups.contains_key(id))?;
            if params.host_ids.is_empty() {
                return invalid("a host group needs at least one host");
            }
            if let Some(unknown) = params.host_ids.iter().find(|h| !state.hosts.contains_key(*h)) {
                return Err(missing("host", unknown));
            }
            let mut hosts = params.host_ids.clone();
            hosts.dedup();
            state.host_groups.insert(
                id.to_string(),
                HostGroupRecord {
                    hosts,
                    flags: params.flags,
                    consistent_lun: params.consistent_lun,
                },
            );
            state.host_group_info(id)
        })
    }

    async fn rename_host_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let members = vec![new_name.to_string()];
        self.mutate(ctx, Operation::RenameHostGroup, host_group_id, members, |state| {
            rekey(&mut state.host_groups, "host group", host_group_id, new_name)?;
            for view in state
                .masking_views
                .values_mut()
                .filter(|v| v.host_group_id == host_group_id)
            {
                view.host_group_id = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn add_hosts_to_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()> {
        self.mutate(ctx, Operation::AddHostsToGroup, host_group_id, host_ids.to_vec(), |state| {
            if let Some(unknown) = host_ids.iter().find(|h| !state.hosts.contains_key(*h)) {
                return invalid(format!("host {unknown} does not exist"));
            }
            let group = state.host_group_mut(host_group_id)?;
            for host_id in host_ids {
                if !group.hosts.contains(host_id) {
                    group.hosts.push(host_id.clone());
                }
            }
            Ok(())
        })
    }

    async fn remove_hosts_from_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()> {
        let members = host_ids.to_vec();
        self.mutate(ctx, Operation::RemoveHostsFromGroup, host_group_id, members, |state| {
            let group = state.host_group_mut(host_group_id)?;
            if let Some(stranger) = host_ids.iter().find(|h| !group.hosts.contains(*h)) {
                return invalid(format!(
                    "host {stranger} is not part of host group {host_group_id}"
                ));
            }
            if group.hosts.iter().all(|h| host_ids.contains(h)) {
                return invalid(format!("host group {host_group_id} cannot be left without hosts"));
            }
            group.hosts.retain(|h| !host_ids.contains(h));
            Ok(())
        })
    }

    async fn set_host_group_flags(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()> {
        let members = flag_members(flags, consistent_lun);
        self.mutate(ctx, Operation::SetHostGroupFlags, host_group_id, members, |state| {
            let group = state.host_group_mut(host_group_id)?;
            group.flags = *flags;
            group.consistent_lun = consistent_lun;
            Ok(())
        })
    }

    async fn delete_host_group(&self, ctx: &CallContext, host_group_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeleteHostGroup, host_group_id, Vec::new(), |state| {
            if !state.host_groups.contains_key(host_group_id) {
                return Err(missing("host group", host_group_id));
            }
            if let Some(view) = state.views_where(|v| v.host_group_id == host_group_id).first() {
                return invalid(format!(
                    "host group {host_group_id} is in use by masking view {view}"
                ));
            }
            state.host_groups.shift_remove(host_group_id);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Port Groups
    // -------------------------------------------------------------------------

    async fn get_port_group(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
    ) -> Result<PortGroupInfo> {
        self.read(ctx, Operation::GetPortGroup, port_group_id, |state| {
            state.port_group_info(port_group_id)
        })
    }

    async fn create_port_group(
        &self,
        ctx: &CallContext,
        params: &CreatePortGroupParams,
    ) -> Result<PortGroupInfo> {
        let id = params.port_group_id.as_str();
        let members = params.ports.iter().map(ToString::to_string).collect();
        self.mutate(ctx, Operation::CreatePortGroup, id, members, |state| {
            state.ensure_free("port group", id, state.port_groups.contains_key(id))?;
            if params.protocol.trim().is_empty() {
                return invalid("port group protocol cannot be empty");
            }
            state.port_groups.insert(
                id.to_string(),
                PortGroupRecord {
                    protocol: params.protocol.clone(),
                    ports: params.ports.clone(),
                },
            );
            state.port_group_info(id)
        })
    }

    async fn rename_port_group(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let members = vec![new_name.to_string()];
        self.mutate(ctx, Operation::RenamePortGroup, port_group_id, members, |state| {
            rekey(&mut state.port_groups, "port group", port_group_id, new_name)?;
            for view in state
                .masking_views
                .values_mut()
                .filter(|v| v.port_group_id == port_group_id)
            {
                view.port_group_id = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn add_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()> {
        let members = ports.iter().map(ToString::to_string).collect();
        self.mutate(ctx, Operation::AddPorts, port_group_id, members, |state| {
            let group = state.port_group_mut(port_group_id)?;
            for port in ports {
                if !group.ports.iter().any(|p| p.identity() == port.identity()) {
                    group.ports.push(port.clone());
                }
            }
            Ok(())
        })
    }

    async fn remove_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()> {
        let members = ports.iter().map(ToString::to_string).collect();
        self.mutate(ctx, Operation::RemovePorts, port_group_id, members, |state| {
            let group = state.port_group_mut(port_group_id)?;
            for port in ports {
                let before = group.ports.len();
                group.ports.retain(|p| p.identity() != port.identity());
                if group.ports.len() == before {
                    return invalid(format!(
                        "port {port} is not part of port group {port_group_id}"
                    ));
                }
            }
            Ok(())
        })
    }

    async fn delete_port_group(&self, ctx: &CallContext, port_group_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeletePortGroup, port_group_id, Vec::new(), |state| {
            if !state.port_groups.contains_key(port_group_id) {
                return Err(missing("port group", port_group_id));
            }
            if let Some(view) = state.views_where(|v| v.port_group_id == port_group_id).first() {
                return invalid(format!(
                    "port group {port_group_id} is in use by masking view {view}"
                ));
            }
            state.port_groups.shift_remove(port_group_id);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Masking Views
    // -------------------------------------------------------------------------

    async fn get_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
    ) -> Result<MaskingViewInfo> {
        self.read(ctx, Operation::GetMaskingView, masking_view_id, |state| {
            state
                .masking_views
                .get(masking_view_id)
                .cloned()
                .ok_or_else(|| missing("masking view", masking_view_id))
        })
    }

    async fn create_masking_view(
        &self,
        ctx: &CallContext,
        params: &CreateMaskingViewParams,
    ) -> Result<MaskingViewInfo> {
        let id = params.masking_view_id.as_str();
        self.mutate(ctx, Operation::CreateMaskingView, id, Vec::new(), |state| {
            state.ensure_free("masking view", id, state.masking_views.contains_key(id))?;
            match (params.host_id.is_empty(), params.host_group_id.is_empty()) {
                (false, true) if !state.hosts.contains_key(&params.host_id) => {
                    return invalid(format!("host {} does not exist", params.host_id))
                }
                (true, false) if !state.host_groups.contains_key(&params.host_group_id) => {
                    return invalid(format!("host group {} does not exist", params.host_group_id))
                }
                (false, true) | (true, false) => {}
                _ => return invalid("exactly one of host and host group is required"),
            }
            if !state.storage_groups.contains_key(&params.storage_group_id) {
                return invalid(format!("storage group {} does not exist", params.storage_group_id));
            }
            if !state.port_groups.contains_key(&params.port_group_id) {
                return invalid(format!("port group {} does not exist", params.port_group_id));
            }
            let view = MaskingViewInfo {
                masking_view_id: id.to_string(),
                host_id: params.host_id.clone(),
                host_group_id: params.host_group_id.clone(),
                port_group_id: params.port_group_id.clone(),
                storage_group_id: params.storage_group_id.clone(),
            };
            state.masking_views.insert(id.to_string(), view.clone());
            Ok(view)
        })
    }

    async fn rename_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let members = vec![new_name.to_string()];
        self.mutate(ctx, Operation::RenameMaskingView, masking_view_id, members, |state| {
            rekey(&mut state.masking_views, "masking view", masking_view_id, new_name)?;
            if let Some(view) = state.masking_views.get_mut(new_name) {
                view.masking_view_id = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn delete_masking_view(&self, ctx: &CallContext, masking_view_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeleteMaskingView, masking_view_id, Vec::new(), |state| {
            state
                .masking_views
                .shift_remove(masking_view_id)
                .map(|_| ())
                .ok_or_else(|| missing("masking view", masking_view_id))
        })
    }

    // -------------------------------------------------------------------------
    // Storage Groups
    // -------------------------------------------------------------------------

    async fn get_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
    ) -> Result<StorageGroupInfo> {
        let serial = self.config.serial.as_str();
        self.read(ctx, Operation::GetStorageGroup, storage_group_id, |state| {
            state.storage_group_info(storage_group_id, serial)
        })
    }

    async fn create_storage_group(
        &self,
        ctx: &CallContext,
        params: &CreateStorageGroupParams,
    ) -> Result<StorageGroupInfo> {
        let id = params.storage_group_id.as_str();
        let serial = self.config.serial.as_str();
        self.mutate(ctx, Operation::CreateStorageGroup, id, Vec::new(), |state| {
            state.ensure_free("storage group", id, state.storage_groups.contains_key(id))?;
            self.check_srp(&params.srp)?;
            self.check_service_level(&params.slo)?;
            if is_none(&params.srp) && params.compression {
                return invalid("compression requires an SRP");
            }
            if is_none(&params.srp) && !is_none(&params.slo) {
                return invalid("a service level requires an SRP");
            }
            state.storage_groups.insert(
                id.to_string(),
                StorageGroupRecord {
                    srp: stored(&params.srp),
                    slo: stored(&params.slo),
                    compression: params.compression,
                    workload: params.workload.clone(),
                    host_io_limit: params.host_io_limit.clone(),
                    ..Default::default()
                },
            );
            state.storage_group_info(id, serial)
        })
    }

    async fn rename_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let members = vec![new_name.to_string()];
        self.mutate(ctx, Operation::RenameStorageGroup, storage_group_id, members, |state| {
            rekey(&mut state.storage_groups, "storage group", storage_group_id, new_name)?;
            for view in state
                .masking_views
                .values_mut()
                .filter(|v| v.storage_group_id == storage_group_id)
            {
                view.storage_group_id = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn set_srp(&self, ctx: &CallContext, storage_group_id: &str, srp: &str) -> Result<()> {
        self.mutate(ctx, Operation::SetSrp, storage_group_id, vec![srp.to_string()], |state| {
            self.check_srp(srp)?;
            let group = state.storage_group_mut(storage_group_id)?;
            group.srp = stored(srp);
            if group.srp.is_empty() {
                group.slo.clear();
                group.compression = false;
            }
            Ok(())
        })
    }

    async fn set_service_level(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        service_level: &str,
    ) -> Result<()> {
        let members = vec![service_level.to_string()];
        self.mutate(ctx, Operation::SetServiceLevel, storage_group_id, members, |state| {
            self.check_service_level(service_level)?;
            let group = state.storage_group_mut(storage_group_id)?;
            if group.srp.is_empty() && !is_none(service_level) {
                return invalid("a service level requires an SRP");
            }
            group.slo = stored(service_level);
            Ok(())
        })
    }

    async fn set_compression(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        enabled: bool,
    ) -> Result<()> {
        let members = vec![enabled.to_string()];
        self.mutate(ctx, Operation::SetCompression, storage_group_id, members, |state| {
            let group = state.storage_group_mut(storage_group_id)?;
            if group.srp.is_empty() && enabled {
                return invalid("compression requires an SRP");
            }
            group.compression = enabled;
            Ok(())
        })
    }

    async fn set_workload(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        workload: &str,
    ) -> Result<()> {
        let members = vec![workload.to_string()];
        self.mutate(ctx, Operation::SetWorkload, storage_group_id, members, |state| {
            state.storage_group_mut(storage_group_id)?.workload = workload.to_string();
            Ok(())
        })
    }

    async fn set_host_io_limits(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        limits: &HostIoLimit,
    ) -> Result<()> {
        let members = [
            ("host_io_limit_mb_sec", &limits.host_io_limit_mb_sec),
            ("host_io_limit_io_sec", &limits.host_io_limit_io_sec),
            ("dynamic_distribution", &limits.dynamic_distribution),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| format!("{field}={v}")))
        .collect();
        self.mutate(ctx, Operation::SetHostIoLimits, storage_group_id, members, |state| {
            let group = state.storage_group_mut(storage_group_id)?;
            group.host_io_limit = group.host_io_limit.merged(limits);
            Ok(())
        })
    }

    async fn add_volumes_to_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()> {
        let members = volume_ids.to_vec();
        self.mutate(ctx, Operation::AddVolumesToStorageGroup, storage_group_id, members, |state| {
            if let Some(unknown) = volume_ids.iter().find(|v| !state.volumes.contains_key(*v)) {
                return invalid(format!("volume {unknown} does not exist"));
            }
            let group = state.storage_group_mut(storage_group_id)?;
            for volume_id in volume_ids {
                if !group.volumes.contains(volume_id) {
                    group.volumes.push(volume_id.clone());
                }
            }
            Ok(())
        })
    }

    async fn remove_volumes_from_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()> {
        self.mutate(
            ctx,
            Operation::RemoveVolumesFromStorageGroup,
            storage_group_id,
            volume_ids.to_vec(),
            |state| {
                let group = state.storage_group_mut(storage_group_id)?;
                if let Some(stranger) = volume_ids.iter().find(|v| !group.volumes.contains(*v)) {
                    return invalid(format!(
                        "volume {stranger} is not part of storage group {storage_group_id}"
                    ));
                }
                group.volumes.retain(|v| !volume_ids.contains(v));
                Ok(())
            },
        )
    }

    async fn associate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let members = policy_names.to_vec();
        self.mutate(ctx, Operation::AssociateSnapshotPolicies, storage_group_id, members, |state| {
            self.check_policies(policy_names)?;
            let group = state.storage_group_mut(storage_group_id)?;
            if let Some(name) = policy_names
                .iter()
                .find(|name| group.snapshot_policies.iter().any(|p| p.policy_name == **name))
            {
                return invalid(format!("snapshot policy {name} is already associated"));
            }
            let bindings = policy_names
                .iter()
                .map(|name| SnapshotPolicyBinding::new(name.clone(), true));
            group.snapshot_policies.extend(bindings);
            Ok(())
        })
    }

    async fn disassociate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let members = policy_names.to_vec();
        let operation = Operation::DisassociateSnapshotPolicies;
        self.mutate(ctx, operation, storage_group_id, members, |state| {
            let group = state.storage_group_mut(storage_group_id)?;
            ensure_associated(group, storage_group_id, policy_names)?;
            group
                .snapshot_policies
                .retain(|p| !policy_names.contains(&p.policy_name));
            Ok(())
        })
    }

    async fn suspend_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let members = policy_names.to_vec();
        self.mutate(ctx, Operation::SuspendSnapshotPolicies, storage_group_id, members, |state| {
            let group = state.storage_group_mut(storage_group_id)?;
            set_policy_activity(group, storage_group_id, policy_names, false)
        })
    }

    async fn resume_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let members = policy_names.to_vec();
        self.mutate(ctx, Operation::ResumeSnapshotPolicies, storage_group_id, members, |state| {
            let group = state.storage_group_mut(storage_group_id)?;
            set_policy_activity(group, storage_group_id, policy_names, true)
        })
    }

    async fn delete_storage_group(&self, ctx: &CallContext, storage_group_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeleteStorageGroup, storage_group_id, Vec::new(), |state| {
            if !state.storage_groups.contains_key(storage_group_id) {
                return Err(missing("storage group", storage_group_id));
            }
            if let Some(view) = state
                .views_where(|v| v.storage_group_id == storage_group_id)
                .first()
            {
                return invalid(format!(
                    "storage group {storage_group_id} is in use by masking view {view}"
                ));
            }
            state.storage_groups.shift_remove(storage_group_id);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Volumes
    // -------------------------------------------------------------------------

    async fn get_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<VolumeInfo> {
        let serial = self.config.serial.as_str();
        self.read(ctx, Operation::GetVolume, volume_id, |state| {
            state.volume_info(volume_id, serial)
        })
    }

    async fn find_volume_by_name(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Option<VolumeInfo>> {
        let serial = self.config.serial.as_str();
        self.read(ctx, Operation::FindVolumeByName, name, |state| {
            let found = state
                .volumes
                .iter()
                .find(|(_, volume)| volume.identifier == name)
                .map(|(id, _)| id.clone());
            found.map(|id| state.volume_info(&id, serial)).transpose()
        })
    }

    async fn create_volume(
        &self,
        ctx: &CallContext,
        params: &CreateVolumeParams,
    ) -> Result<VolumeInfo> {
        let name = params.volume_identifier.as_str();
        let serial = self.config.serial.as_str();
        let members = vec![format!("{} {}", params.size, params.cap_unit)];
        self.mutate(ctx, Operation::CreateVolume, name, members, |state| {
            let taken = state.volumes.values().any(|v| v.identifier == name);
            state.ensure_free("volume", name, taken)?;
            if params.size.is_nan() || params.size <= 0.0 {
                return invalid("volume size must be positive");
            }
            if !params.storage_group_id.is_empty() {
                let sg_id = params.storage_group_id.as_str();
                state.storage_group_mut(sg_id).map_err(|_| {
                    Rejection::Invalid(format!("storage group {sg_id} does not exist"))
                })?;
            }
            let id = format!("{:05X}", state.next_device);
            state.next_device += 1;
            state.volumes.insert(
                id.clone(),
                VolumeRecord {
                    identifier: name.to_string(),
                    cap_mb: params.cap_unit.to_megabytes(params.size),
                    mobility_id_enabled: params.mobility_id_enabled,
                },
            );
            if !params.storage_group_id.is_empty() {
                state
                    .storage_group_mut(&params.storage_group_id)?
                    .volumes
                    .push(id.clone());
            }
            state.volume_info(&id, serial)
        })
    }

    async fn rename_volume(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        new_name: &str,
    ) -> Result<()> {
        self.mutate(ctx, Operation::RenameVolume, volume_id, vec![new_name.to_string()], |state| {
            if new_name.trim().is_empty() {
                return invalid("volume name cannot be empty");
            }
            if state
                .volumes
                .iter()
                .any(|(id, v)| id != volume_id && v.identifier == new_name)
            {
                return invalid(format!("volume {new_name} already exists"));
            }
            state.volume_mut(volume_id)?.identifier = new_name.to_string();
            Ok(())
        })
    }

    async fn expand_volume(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        size: f64,
        cap_unit: CapUnit,
    ) -> Result<()> {
        let members = vec![format!("{size} {cap_unit}")];
        self.mutate(ctx, Operation::ExpandVolume, volume_id, members, |state| {
            let volume = state.volume_mut(volume_id)?;
            let requested = cap_unit.to_megabytes(size);
            if requested <= volume.cap_mb {
                return invalid(format!(
                    "volume {volume_id} can only grow ({} MB requested, {} MB allocated)",
                    requested, volume.cap_mb
                ));
            }
            volume.cap_mb = requested;
            Ok(())
        })
    }

    async fn modify_mobility_id(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        enabled: bool,
    ) -> Result<()> {
        let members = vec![enabled.to_string()];
        self.mutate(ctx, Operation::ModifyMobilityId, volume_id, members, |state| {
            state.volume_mut(volume_id)?.mobility_id_enabled = enabled;
            Ok(())
        })
    }

    async fn delete_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<()> {
        self.mutate(ctx, Operation::DeleteVolume, volume_id, Vec::new(), |state| {
            if !state.volumes.contains_key(volume_id) {
                return Err(missing("volume", volume_id));
            }
            if let Some(group) = state.groups_of_volume(volume_id).first() {
                return invalid(format!("volume {volume_id} is still in storage group {group}"));
            }
            state.volumes.shift_remove(volume_id);
            Ok(())
        })
    }
}

fn ensure_associated(
    group: &StorageGroupRecord,
    storage_group_id: &str,
    names: &[String],
) -> Outcome<()> {
    match names
        .iter()
        .find(|name| !group.snapshot_policies.iter().any(|p| p.policy_name == **name))
    {
        Some(name) => invalid(format!(
            "snapshot policy {name} is not associated with storage group {storage_group_id}"
        )),
        None => Ok(()),
    }
}

fn set_policy_activity(
    group: &mut StorageGroupRecord,
    storage_group_id: &str,
    names: &[String],
    active: bool,
) -> Outcome<()> {
    ensure_associated(group, storage_group_id, names)?;
    for policy in group
        .snapshot_policies
        .iter_mut()
        .filter(|p| names.contains(&p.policy_name))
    {
        policy.is_active = active;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ctx() -> CallContext {
        CallContext::new()
    }

    fn array() -> MemoryArray {
        MemoryArray::new(MemoryArrayConfig::default())
    }

    async fn with_host(array: &MemoryArray, id: &str, initiators: &[&str]) {
        array
            .create_host(
                &ctx(),
                &CreateHostParams {
                    host_id: id.into(),
                    initiators: initiators.iter().map(|i| i.to_string()).collect(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_initiators_stored_lower_case() {
        let array = array();
        with_host(&array, "h1", &["10000000C9ABCDEF"]).await;
        let info = array.get_host(&ctx(), "h1").await.unwrap();
        assert_eq!(info.initiators, vec!["10000000c9abcdef".to_string()]);
    }

    #[tokio::test]
    async fn test_initiator_cannot_belong_to_two_hosts() {
        let array = array();
        with_host(&array, "h1", &["aa"]).await;
        let err = array
            .create_host(
                &ctx(),
                &CreateHostParams {
                    host_id: "h2".into(),
                    initiators: vec!["AA".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already in use by host h1"));
    }

    #[tokio::test]
    async fn test_missing_entity_is_not_found() {
        let err = array().get_storage_group(&ctx(), "nope").await.unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_srp_none_rejects_compression_and_service_level() {
        let array = array();
        let err = array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg".into(),
                    srp: "none".into(),
                    slo: "none".into(),
                    compression: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::Remote { .. });

        array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg".into(),
                    srp: "none".into(),
                    slo: "none".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(array.set_service_level(&ctx(), "sg", "Gold").await.is_err());
        assert!(array.set_compression(&ctx(), "sg", true).await.is_err());
        array.set_srp(&ctx(), "sg", "SRP_1").await.unwrap();
        array.set_service_level(&ctx(), "sg", "Gold").await.unwrap();
    }

    #[tokio::test]
    async fn test_in_use_entities_cannot_be_deleted() {
        let array = array();
        with_host(&array, "h1", &["aa"]).await;
        array
            .create_port_group(
                &ctx(),
                &CreatePortGroupParams {
                    port_group_id: "pg".into(),
                    protocol: "SCSI_FC".into(),
                    ports: vec![PortKey::new("OR-1C", "0")],
                },
            )
            .await
            .unwrap();
        array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg".into(),
                    srp: "SRP_1".into(),
                    slo: "Diamond".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        array
            .create_masking_view(
                &ctx(),
                &CreateMaskingViewParams {
                    masking_view_id: "mv".into(),
                    storage_group_id: "sg".into(),
                    port_group_id: "pg".into(),
                    host_id: "h1".into(),
                    host_group_id: String::new(),
                },
            )
            .await
            .unwrap();

        assert!(array.delete_host(&ctx(), "h1").await.is_err());
        assert!(array.delete_port_group(&ctx(), "pg").await.is_err());
        assert!(array.delete_storage_group(&ctx(), "sg").await.is_err());

        array.rename_storage_group(&ctx(), "sg", "sg2").await.unwrap();
        let view = array.get_masking_view(&ctx(), "mv").await.unwrap();
        assert_eq!(view.storage_group_id, "sg2");

        array.delete_masking_view(&ctx(), "mv").await.unwrap();
        array.delete_host(&ctx(), "h1").await.unwrap();
    }

    #[tokio::test]
    async fn test_volume_grows_only_and_detaches_before_delete() {
        let array = array();
        array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg".into(),
                    srp: "SRP_1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let volume = array
            .create_volume(
                &ctx(),
                &CreateVolumeParams {
                    volume_identifier: "vol".into(),
                    size: 1.0,
                    cap_unit: CapUnit::Tb,
                    storage_group_id: "sg".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(volume.cap_gb, 1024.0);
        assert_eq!(volume.storage_group_ids, vec!["sg".to_string()]);

        assert!(array.expand_volume(&ctx(), &volume.volume_id, 512.0, CapUnit::Gb).await.is_err());
        assert!(array.delete_volume(&ctx(), &volume.volume_id).await.is_err());

        array
            .remove_volumes_from_storage_group(&ctx(), "sg", &[volume.volume_id.clone()])
            .await
            .unwrap();
        array.delete_volume(&ctx(), &volume.volume_id).await.unwrap();
        assert_eq!(array.find_volume_by_name(&ctx(), "vol").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_injection_per_target() {
        let array = array();
        with_host(&array, "h1", &[]).await;
        with_host(&array, "h2", &[]).await;
        array.fail_for(Operation::RenameHost, "h2", "locked");

        array.rename_host(&ctx(), "h1", "h1b").await.unwrap();
        let err = array.rename_host(&ctx(), "h2", "h2b").await.unwrap_err();
        assert_eq!(err.to_string(), "rename_host failed: locked");
        assert!(array.get_host(&ctx(), "h2").await.is_ok());

        array.clear_failures();
        array.rename_host(&ctx(), "h2", "h2b").await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_after_apply_still_applies() {
        let array = array();
        array.fail_after_apply(Operation::CreateHost, "timeout");
        assert!(array
            .create_host(
                &ctx(),
                &CreateHostParams {
                    host_id: "h1".into(),
                    ..Default::default()
                },
            )
            .await
            .is_err());
        assert!(array.get_host(&ctx(), "h1").await.is_ok());
    }

    #[tokio::test]
    async fn test_journal_separates_reads() {
        let array = array();
        with_host(&array, "h1", &[]).await;
        array.get_host(&ctx(), "h1").await.unwrap();
        assert_eq!(array.calls().len(), 1);
        assert_eq!(array.journal().len(), 2);
    }

    #[tokio::test]
    async fn test_journal_keeps_most_recent_calls() {
        let array = MemoryArray::new(MemoryArrayConfig {
            journal_capacity: 2,
            ..Default::default()
        });
        with_host(&array, "h1", &[]).await;
        array.get_host(&ctx(), "h1").await.unwrap();
        array.delete_host(&ctx(), "h1").await.unwrap();

        let operations: Vec<_> = array.journal().into_iter().map(|call| call.operation).collect();
        assert_eq!(operations, vec![Operation::GetHost, Operation::DeleteHost]);

        let silent = MemoryArray::new(MemoryArrayConfig {
            journal_capacity: 0,
            ..Default::default()
        });
        with_host(&silent, "h1", &[]).await;
        assert!(silent.journal().is_empty());
        assert!(silent.get_host(&ctx(), "h1").await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_context_is_rejected() {
        let array = array();
        let ctx = ctx();
        ctx.cancel();
        let err = array.get_host(&ctx, "h1").await.unwrap_err();
        assert_matches!(err, Error::Cancelled);
        assert!(array.journal().is_empty());
    }
}
