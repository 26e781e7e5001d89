//! Resource models
//!
//! One record per resource type, used both as the desired plan and as the
//! recorded state. Computed attributes are ignored when read from a plan.
//! - Host, HostGroup, PortGroup: initiator-side connectivity
//! - MaskingView: binds storage to initiators and ports
//! - StorageGroup, Volume: capacity

pub mod host;
pub mod host_group;
pub mod masking_view;
pub mod port_group;
pub mod storage_group;
pub mod volume;

pub use host::HostModel;
pub use host_group::HostGroupModel;
pub use masking_view::MaskingViewModel;
pub use port_group::PortGroupModel;
pub use storage_group::{StorageGroupModel, NONE_SENTINEL};
pub use volume::VolumeModel;
