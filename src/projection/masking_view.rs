//! Masking view projection

use super::ProjectionMode;
use crate::domain::array::MaskingViewInfo;
use crate::model::MaskingViewModel;

/// Masking views carry no collections, so every mode copies the array's view
pub fn project_masking_view(
    remote: &MaskingViewInfo,
    _prior: Option<&MaskingViewModel>,
    _mode: ProjectionMode,
) -> MaskingViewModel {
    MaskingViewModel {
        id: remote.masking_view_id.clone(),
        name: remote.masking_view_id.clone(),
        storage_group_id: remote.storage_group_id.clone(),
        port_group_id: remote.port_group_id.clone(),
        host_id: remote.host_id.clone(),
        host_group_id: remote.host_group_id.clone(),
    }
}
