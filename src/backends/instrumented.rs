//! Instrumented Client
//!
//! Decorator around any [`ArrayClient`] adding a tracing span per call,
//! Prometheus call counters and latency histograms, and cancellation: a call
//! still in flight when its context is cancelled resolves to
//! [`Error::Cancelled`].

use crate::domain::array::{
    CapUnit, CreateHostGroupParams, CreateHostParams, CreateMaskingViewParams,
    CreatePortGroupParams, CreateStorageGroupParams, CreateVolumeParams, HostGroupInfo,
    HostInfo, HostIoLimit, MaskingViewInfo, PortGroupInfo, PortKey, StorageGroupInfo,
    VolumeInfo,
};
use crate::domain::flags::HostFlags;
use crate::domain::ports::{ArrayClient, CallContext, Operation};
use crate::error::{Error, Result};
use async_trait::async_trait;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

// =============================================================================
// Client Metrics
// =============================================================================

/// Prometheus collectors for remote calls
#[derive(Clone)]
pub struct ClientMetrics {
    calls: IntCounterVec,
    latency: HistogramVec,
}

impl ClientMetrics {
    /// Create the collectors and register them with `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let calls = IntCounterVec::new(
            Opts::new("powermax_remote_calls_total", "Remote array calls by outcome"),
            &["operation", "outcome"],
        )
        .map_err(metrics_error)?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "powermax_remote_call_duration_seconds",
                "Latency of remote array calls",
            ),
            &["operation"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(calls.clone())).map_err(metrics_error)?;
        registry.register(Box::new(latency.clone())).map_err(metrics_error)?;
        Ok(Self { calls, latency })
    }

    /// Calls of `operation` that ended with `outcome`
    pub fn count(&self, operation: Operation, outcome: &str) -> u64 {
        self.calls
            .with_label_values(&[operation.as_str(), outcome])
            .get()
    }
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registration failed: {err}"))
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::NotFound { .. }) => "not_found",
        Err(Error::Cancelled) => "cancelled",
        Err(_) => "failure",
    }
}

// =============================================================================
// Instrumented Client
// =============================================================================

/// Wraps an [`ArrayClient`] with tracing, metrics and cancellation
pub struct InstrumentedClient<C> {
    inner: Arc<C>,
    metrics: ClientMetrics,
}

impl<C: ArrayClient> InstrumentedClient<C> {
    pub fn new(inner: Arc<C>, metrics: ClientMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    async fn observe<T, F>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        target: &str,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        ctx.check()?;
        let span = info_span!("array_call", operation = operation.as_str(), entity = target);
        let timer = self
            .metrics
            .latency
            .with_label_values(&[operation.as_str()])
            .start_timer();

        let result = tokio::select! {
            result = call.instrument(span) => result,
            _ = ctx.token().cancelled() => Err(Error::Cancelled),
        };

        timer.observe_duration();
        let outcome = outcome(&result);
        self.metrics
            .calls
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
        if let Err(err) = &result {
            debug!(%operation, entity = target, outcome, error = %err, "array call failed");
        }
        result
    }
}

#[async_trait]
impl<C: ArrayClient> ArrayClient for InstrumentedClient<C> {
    async fn get_host(&self, ctx: &CallContext, host_id: &str) -> Result<HostInfo> {
        self.observe(ctx, Operation::GetHost, host_id, self.inner.get_host(ctx, host_id))
            .await
    }

    async fn create_host(&self, ctx: &CallContext, params: &CreateHostParams) -> Result<HostInfo> {
        let call = self.inner.create_host(ctx, params);
        self.observe(ctx, Operation::CreateHost, &params.host_id, call).await
    }

    async fn rename_host(&self, ctx: &CallContext, host_id: &str, new_name: &str) -> Result<()> {
        let call = self.inner.rename_host(ctx, host_id, new_name);
        self.observe(ctx, Operation::RenameHost, host_id, call).await
    }

    async fn add_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()> {
        let call = self.inner.add_host_initiators(ctx, host_id, initiators);
        self.observe(ctx, Operation::AddHostInitiators, host_id, call).await
    }

    async fn remove_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()> {
        let call = self.inner.remove_host_initiators(ctx, host_id, initiators);
        self.observe(ctx, Operation::RemoveHostInitiators, host_id, call).await
    }

    async fn set_host_flags(
        &self,
        ctx: &CallContext,
        host_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()> {
        let call = self.inner.set_host_flags(ctx, host_id, flags, consistent_lun);
        self.observe(ctx, Operation::SetHostFlags, host_id, call).await
    }

    async fn delete_host(&self, ctx: &CallContext, host_id: &str) -> Result<()> {
        let call = self.inner.delete_host(ctx, host_id);
        self.observe(ctx, Operation::DeleteHost, host_id, call).await
    }

    async fn get_host_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
    ) -> Result<HostGroupInfo> {
        let call = self.inner.get_host_group(ctx, host_group_id);
        self.observe(ctx, Operation::GetHostGroup, host_group_id, call).await
    }

    async fn create_host_group(
        &self,
        ctx: &CallContext,
        params: &CreateHostGroupParams,
    ) -> Result<HostGroupInfo> {
        let call = self.inner.create_host_group(ctx, params);
        self.observe(ctx, Operation::CreateHostGroup, &params.host_group_id, call).await
    }

    async fn rename_host_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let call = self.inner.rename_host_group(ctx, host_group_id, new_name);
        self.observe(ctx, Operation::RenameHostGroup, host_group_id, call).await
    }

    async fn add_hosts_to_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()> {
        let call = self.inner.add_hosts_to_group(ctx, host_group_id, host_ids);
        self.observe(ctx, Operation::AddHostsToGroup, host_group_id, call).await
    }

    async fn remove_hosts_from_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()> {
        let call = self.inner.remove_hosts_from_group(ctx, host_group_id, host_ids);
        self.observe(ctx, Operation::RemoveHostsFromGroup, host_group_id, call).await
    }

    async fn set_host_group_flags(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()> {
        let call = self
            .inner
            .set_host_group_flags(ctx, host_group_id, flags, consistent_lun);
        self.observe(ctx, Operation::SetHostGroupFlags, host_group_id, call).await
    }

    async fn delete_host_group(&self, ctx: &CallContext, host_group_id: &str) -> Result<()> {
        let call = self.inner.delete_host_group(ctx, host_group_id);
        self.observe(ctx, Operation::DeleteHostGroup, host_group_id, call).await
    }

    async fn get_port_group(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
    ) -> Result<PortGroupInfo> {
        let call = self.inner.get_port_group(ctx, port_group_id);
        self.observe(ctx, Operation::GetPortGroup, port_group_id, call).await
    }

    async fn create_port_group(
        &self,
        ctx: &CallContext,
        params: &CreatePortGroupParams,
    ) -> Result<PortGroupInfo> {
        let call = self.inner.create_port_group(ctx, params);
        self.observe(ctx, Operation::CreatePortGroup, &params.port_group_id, call).await
    }

    async fn rename_port_group(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let call = self.inner.rename_port_group(ctx, port_group_id, new_name);
        self.observe(ctx, Operation::RenamePortGroup, port_group_id, call).await
    }

    async fn add_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()> {
        let call = self.inner.add_ports(ctx, port_group_id, ports);
        self.observe(ctx, Operation::AddPorts, port_group_id, call).await
    }

    async fn remove_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()> {
        let call = self.inner.remove_ports(ctx, port_group_id, ports);
        self.observe(ctx, Operation::RemovePorts, port_group_id, call).await
    }

    async fn delete_port_group(&self, ctx: &CallContext, port_group_id: &str) -> Result<()> {
        let call = self.inner.delete_port_group(ctx, port_group_id);
        self.observe(ctx, Operation::DeletePortGroup, port_group_id, call).await
    }

    async fn get_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
    ) -> Result<MaskingViewInfo> {
        let call = self.inner.get_masking_view(ctx, masking_view_id);
        self.observe(ctx, Operation::GetMaskingView, masking_view_id, call).await
    }

    async fn create_masking_view(
        &self,
        ctx: &CallContext,
        params: &CreateMaskingViewParams,
    ) -> Result<MaskingViewInfo> {
        let call = self.inner.create_masking_view(ctx, params);
        self.observe(ctx, Operation::CreateMaskingView, &params.masking_view_id, call).await
    }

    async fn rename_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let call = self.inner.rename_masking_view(ctx, masking_view_id, new_name);
        self.observe(ctx, Operation::RenameMaskingView, masking_view_id, call).await
    }

    async fn delete_masking_view(&self, ctx: &CallContext, masking_view_id: &str) -> Result<()> {
        let call = self.inner.delete_masking_view(ctx, masking_view_id);
        self.observe(ctx, Operation::DeleteMaskingView, masking_view_id, call).await
    }

    async fn get_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
    ) -> Result<StorageGroupInfo> {
        let call = self.inner.get_storage_group(ctx, storage_group_id);
        self.observe(ctx, Operation::GetStorageGroup, storage_group_id, call).await
    }

    async fn create_storage_group(
        &self,
        ctx: &CallContext,
        params: &CreateStorageGroupParams,
    ) -> Result<StorageGroupInfo> {
        let call = self.inner.create_storage_group(ctx, params);
        self.observe(ctx, Operation::CreateStorageGroup, &params.storage_group_id, call).await
    }

    async fn rename_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let call = self.inner.rename_storage_group(ctx, storage_group_id, new_name);
        self.observe(ctx, Operation::RenameStorageGroup, storage_group_id, call).await
    }

    async fn set_srp(&self, ctx: &CallContext, storage_group_id: &str, srp: &str) -> Result<()> {
        let call = self.inner.set_srp(ctx, storage_group_id, srp);
        self.observe(ctx, Operation::SetSrp, storage_group_id, call).await
    }

    async fn set_service_level(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        service_level: &str,
    ) -> Result<()> {
        let call = self.inner.set_service_level(ctx, storage_group_id, service_level);
        self.observe(ctx, Operation::SetServiceLevel, storage_group_id, call).await
    }

    async fn set_compression(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        enabled: bool,
    ) -> Result<()> {
        let call = self.inner.set_compression(ctx, storage_group_id, enabled);
        self.observe(ctx, Operation::SetCompression, storage_group_id, call).await
    }

    async fn set_workload(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        workload: &str,
    ) -> Result<()> {
        let call = self.inner.set_workload(ctx, storage_group_id, workload);
        self.observe(ctx, Operation::SetWorkload, storage_group_id, call).await
    }

    async fn set_host_io_limits(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        limits: &HostIoLimit,
    ) -> Result<()> {
        let call = self.inner.set_host_io_limits(ctx, storage_group_id, limits);
        self.observe(ctx, Operation::SetHostIoLimits, storage_group_id, call).await
    }

    async fn add_volumes_to_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .add_volumes_to_storage_group(ctx, storage_group_id, volume_ids);
        self.observe(ctx, Operation::AddVolumesToStorageGroup, storage_group_id, call).await
    }

    async fn remove_volumes_from_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .remove_volumes_from_storage_group(ctx, storage_group_id, volume_ids);
        self.observe(ctx, Operation::RemoveVolumesFromStorageGroup, storage_group_id, call)
            .await
    }

    async fn associate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .associate_snapshot_policies(ctx, storage_group_id, policy_names);
        self.observe(ctx, Operation::AssociateSnapshotPolicies, storage_group_id, call).await
    }

    async fn disassociate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .disassociate_snapshot_policies(ctx, storage_group_id, policy_names);
        self.observe(ctx, Operation::DisassociateSnapshotPolicies, storage_group_id, call)
            .await
    }

    async fn suspend_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .suspend_snapshot_policies(ctx, storage_group_id, policy_names);
        self.observe(ctx, Operation::SuspendSnapshotPolicies, storage_group_id, call).await
    }

    async fn resume_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()> {
        let call = self
            .inner
            .resume_snapshot_policies(ctx, storage_group_id, policy_names);
        self.observe(ctx, Operation::ResumeSnapshotPolicies, storage_group_id, call).await
    }

    async fn delete_storage_group(&self, ctx: &CallContext, storage_group_id: &str) -> Result<()> {
        let call = self.inner.delete_storage_group(ctx, storage_group_id);
        self.observe(ctx, Operation::DeleteStorageGroup, storage_group_id, call).await
    }

    async fn get_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<VolumeInfo> {
        let call = self.inner.get_volume(ctx, volume_id);
        self.observe(ctx, Operation::GetVolume, volume_id, call).await
    }

    async fn find_volume_by_name(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Option<VolumeInfo>> {
        let call = self.inner.find_volume_by_name(ctx, name);
        self.observe(ctx, Operation::FindVolumeByName, name, call).await
    }

    async fn create_volume(
        &self,
        ctx: &CallContext,
        params: &CreateVolumeParams,
    ) -> Result<VolumeInfo> {
        let call = self.inner.create_volume(ctx, params);
        self.observe(ctx, Operation::CreateVolume, &params.volume_identifier, call).await
    }

    async fn rename_volume(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        new_name: &str,
    ) -> Result<()> {
        let call = self.inner.rename_volume(ctx, volume_id, new_name);
        self.observe(ctx, Operation::RenameVolume, volume_id, call).await
    }

    async fn expand_volume(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        size: f64,
        cap_unit: CapUnit,
    ) -> Result<()> {
        let call = self.inner.expand_volume(ctx, volume_id, size, cap_unit);
        self.observe(ctx, Operation::ExpandVolume, volume_id, call).await
    }

    async fn modify_mobility_id(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        enabled: bool,
    ) -> Result<()> {
        let call = self.inner.modify_mobility_id(ctx, volume_id, enabled);
        self.observe(ctx, Operation::ModifyMobilityId, volume_id, call).await
    }

    async fn delete_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<()> {
        let call = self.inner.delete_volume(ctx, volume_id);
        self.observe(ctx, Operation::DeleteVolume, volume_id, call).await
    }
}
