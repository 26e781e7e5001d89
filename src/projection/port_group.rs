//! Port group projection

use super::{merge_collection, merge_ids, prior_for, Prefer, ProjectionMode};
use crate::domain::array::{PortGroupInfo, PortKey};
use crate::model::PortGroupModel;

pub fn project_port_group(
    remote: &PortGroupInfo,
    prior: Option<&PortGroupModel>,
    mode: ProjectionMode,
) -> PortGroupModel {
    let prior = prior_for(mode, prior);
    let empty = PortGroupModel::default();
    let base = prior.unwrap_or(&empty);

    PortGroupModel {
        id: remote.port_group_id.clone(),
        name: remote.port_group_id.clone(),
        protocol: remote.protocol.clone(),
        ports: merge_collection(mode, &base.ports, &remote.ports, PortKey::identity, Prefer::Prior),
        port_group_type: remote.port_group_type.clone(),
        num_of_ports: remote.num_of_ports,
        num_of_masking_views: remote.num_of_masking_views,
        masking_views: merge_ids(mode.computed(), &base.masking_views, &remote.masking_views),
    }
}
