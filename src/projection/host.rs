//! Host projection

use super::{merge_collection, merge_ids, prior_for, Prefer, ProjectionMode};
use crate::domain::array::HostInfo;
use crate::domain::flags::HostFlags;
use crate::model::HostModel;

/// Fold an array host into a state record.
///
/// Initiators always keep the prior spelling for entries the array reports
/// (the array normalizes case), pick up initiators only the array knows about,
/// and drop prior entries the array does not report.
pub fn project_host(
    remote: &HostInfo,
    prior: Option<&HostModel>,
    mode: ProjectionMode,
) -> HostModel {
    let prior = prior_for(mode, prior);
    let empty = HostModel::default();
    let base = prior.unwrap_or(&empty);

    let initiator_mode = match mode {
        ProjectionMode::Import => ProjectionMode::Import,
        _ => ProjectionMode::Read,
    };

    HostModel {
        id: remote.host_id.clone(),
        name: remote.host_id.clone(),
        initiators: merge_collection(
            initiator_mode,
            &base.initiators,
            &remote.initiators,
            |initiator| initiator.to_ascii_lowercase(),
            Prefer::Prior,
        ),
        host_flags: HostFlags::decode(&remote.enabled_flags, &remote.disabled_flags),
        consistent_lun: remote.consistent_lun,
        host_type: remote.host_type.clone(),
        num_of_masking_views: remote.num_of_masking_views,
        num_of_initiators: remote.num_of_initiators,
        num_of_host_groups: remote.num_of_host_groups,
        num_of_powerpath_hosts: remote.num_of_powerpath_hosts,
        port_flags_override: remote.port_flags_override,
        bw_limit: remote.bw_limit,
        masking_views: merge_ids(mode.computed(), &base.masking_views, &remote.masking_views),
        powerpath_hosts: merge_ids(mode.computed(), &base.powerpath_hosts, &remote.powerpath_hosts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::flags::{Flag, HostFlag};

    fn remote_host() -> HostInfo {
        HostInfo {
            host_id: "esx01".into(),
            initiators: vec!["abc123".into(), "ffff0000".into()],
            enabled_flags: "SCSI_3(SC3)".into(),
            num_of_initiators: 2,
            host_type: "Fibre".into(),
            masking_views: vec!["mv1".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_keeps_plan_casing_and_surfaces_remote_only() {
        let plan = HostModel::new("esx01", vec!["ABC123".into(), "DEADBEEF".into()]);
        let state = project_host(&remote_host(), Some(&plan), ProjectionMode::Create);

        assert_eq!(state.id, "esx01");
        assert_eq!(state.initiators, vec!["ABC123".to_string(), "ffff0000".to_string()]);
        assert_eq!(state.host_flags.scsi_3, Flag::overridden(true));
        assert_eq!(state.masking_views, vec!["mv1".to_string()]);
    }

    #[test]
    fn test_import_takes_remote_verbatim() {
        let state = project_host(&remote_host(), None, ProjectionMode::Import);
        assert_eq!(state.initiators, vec!["abc123".to_string(), "ffff0000".to_string()]);
        assert_eq!(state.num_of_initiators, 2);
        for flag in HostFlag::ALL {
            if flag != HostFlag::Scsi3 {
                assert_eq!(state.host_flags.get(flag), Flag::default());
            }
        }
    }

    #[test]
    fn test_read_without_prior_behaves_like_import() {
        let imported = project_host(&remote_host(), None, ProjectionMode::Import);
        let read = project_host(&remote_host(), None, ProjectionMode::Read);
        assert_eq!(imported, read);
    }
}
