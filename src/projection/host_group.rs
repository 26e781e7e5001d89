//! Host group projection

use super::{merge_ids, prior_for, ProjectionMode};
use crate::domain::array::HostGroupInfo;
use crate::domain::flags::HostFlags;
use crate::model::HostGroupModel;

pub fn project_host_group(
    remote: &HostGroupInfo,
    prior: Option<&HostGroupModel>,
    mode: ProjectionMode,
) -> HostGroupModel {
    let prior = prior_for(mode, prior);
    let empty = HostGroupModel::default();
    let base = prior.unwrap_or(&empty);

    HostGroupModel {
        id: remote.host_group_id.clone(),
        name: remote.host_group_id.clone(),
        host_ids: merge_ids(mode, &base.host_ids, &remote.host_ids()),
        host_flags: HostFlags::decode(&remote.enabled_flags, &remote.disabled_flags),
        consistent_lun: remote.consistent_lun,
        host_group_type: remote.host_group_type.clone(),
        num_of_hosts: remote.num_of_hosts,
        num_of_initiators: remote.num_of_initiators,
        num_of_masking_views: remote.num_of_masking_views,
        port_flags_override: remote.port_flags_override,
        masking_views: merge_ids(mode.computed(), &base.masking_views, &remote.masking_views),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::array::HostGroupMember;

    fn remote_group(hosts: &[&str]) -> HostGroupInfo {
        HostGroupInfo {
            host_group_id: "cluster1".into(),
            num_of_hosts: hosts.len() as i64,
            hosts: hosts
                .iter()
                .map(|id| HostGroupMember {
                    host_id: id.to_string(),
                    initiators: Vec::new(),
                })
                .collect(),
            disabled_flags: "Environ_Set(E)".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_drops_hosts_the_array_rejected() {
        let plan = HostGroupModel::new("cluster1", vec!["h1".into(), "h2".into(), "h3".into()]);
        let remote = remote_group(&["h3", "h1"]);
        let state = project_host_group(&remote, Some(&plan), ProjectionMode::Update);
        assert_eq!(state.host_ids, vec!["h1".to_string(), "h3".to_string()]);
        assert!(state.host_flags.environ_set.r#override);
        assert!(!state.host_flags.environ_set.enabled);
    }

    #[test]
    fn test_read_picks_up_out_of_band_members() {
        let prior = HostGroupModel {
            id: "cluster1".into(),
            ..HostGroupModel::new("cluster1", vec!["h1".into(), "h2".into()])
        };
        let remote = remote_group(&["h2", "h9"]);
        let state = project_host_group(&remote, Some(&prior), ProjectionMode::Read);
        assert_eq!(state.host_ids, vec!["h2".to_string(), "h9".to_string()]);
        assert_eq!(state.num_of_hosts, 2);
    }
}
