//! Role capabilities and row visibility.
//!
//! Every service operation asks `Principal::authorize` before touching the
//! store, and filters reads through `Principal::visibility`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{Error, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    SystemAdmin,
    DataManager,
    ActivityManager,
    Viewer,
    UserManager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Activity,
    Attachment,
    MasterData,
    UploadBatch,
    Dashboard,
    AuditLog,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    View,
    Create,
    Update,
    Delete,
    Upload,
    Export,
}

use Operation::*;

const ALL: &[Operation] = &[View, Create, Update, Delete, Upload, Export];
const NONE: &[Operation] = &[];

/// The allowed operations for `role` on `resource`.
pub fn capabilities(role: Role, resource: Resource) -> &'static [Operation] {
    match (role, resource) {
        (Role::SystemAdmin, Resource::UploadBatch) => &[View, Upload],
        (Role::SystemAdmin, Resource::Dashboard | Resource::AuditLog) => &[View],
        (Role::SystemAdmin, _) => ALL,

        (Role::DataManager, Resource::Activity) => &[View, Create, Update, Delete, Export],
        (Role::DataManager, Resource::Attachment) => &[View, Upload, Delete],
        (Role::DataManager, Resource::MasterData) => &[View, Create, Update],
        (Role::DataManager, Resource::UploadBatch) => &[View, Upload],
        (Role::DataManager, Resource::Dashboard | Resource::AuditLog) => &[View],
        (Role::DataManager, Resource::User) => NONE,

        (Role::ActivityManager, Resource::Activity) => &[View, Update, Export],
        (Role::ActivityManager, Resource::Attachment) => &[View, Upload, Delete],
        (Role::ActivityManager, Resource::MasterData | Resource::Dashboard) => &[View],
        (Role::ActivityManager, _) => NONE,

        (Role::Viewer, Resource::Activity) => &[View, Export],
        (Role::Viewer, Resource::Attachment | Resource::MasterData | Resource::Dashboard) => &[View],
        (Role::Viewer, _) => NONE,

        (Role::UserManager, Resource::User) => ALL,
        (Role::UserManager, _) => NONE,
    }
}

pub fn is_allowed(role: Role, resource: Resource, operation: Operation) -> bool {
    capabilities(role, resource).contains(&operation)
}

/// Which activities a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// Only activities whose cluster id is listed.
    Clusters(Vec<i64>),
}

impl Visibility {
    pub fn permits(&self, cluster_id: i64) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Clusters(ids) => ids.contains(&cluster_id),
        }
    }
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub clusters: Vec<i64>,
}

impl Principal {
    pub fn authorize(&self, resource: Resource, operation: Operation) -> Result<()> {
        if is_allowed(self.role, resource, operation) {
            Ok(())
        } else {
            Err(Error::Permission(format!(
                "{} may not {} {}",
                self.role, operation, resource
            )))
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self.role {
            Role::SystemAdmin | Role::DataManager => Visibility::All,
            _ => Visibility::Clusters(self.clusters.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn principal(role: Role, clusters: Vec<i64>) -> Principal {
        Principal {
            username: "jbanda".into(),
            full_name: "Joseph Banda".into(),
            role,
            clusters,
        }
    }

    #[test]
    fn user_manager_only_manages_users() {
        for resource in Resource::iter() {
            let expected = resource == Resource::User;
            assert_eq!(!capabilities(Role::UserManager, resource).is_empty(), expected, "{resource}");
        }
    }

    #[test]
    fn uploads_are_limited_to_admins_and_data_managers() {
        for role in Role::iter() {
            let expected = matches!(role, Role::SystemAdmin | Role::DataManager);
            assert_eq!(is_allowed(role, Resource::UploadBatch, Upload), expected, "{role}");
        }
    }

    #[test]
    fn viewer_cannot_modify_anything() {
        for resource in Resource::iter() {
            for op in [Create, Update, Delete, Upload] {
                assert!(!is_allowed(Role::Viewer, resource, op), "{resource} {op}");
            }
        }
    }

    #[test]
    fn activity_manager_edits_but_does_not_create() {
        assert!(is_allowed(Role::ActivityManager, Resource::Activity, Update));
        assert!(!is_allowed(Role::ActivityManager, Resource::Activity, Create));
        assert!(is_allowed(Role::ActivityManager, Resource::Attachment, Upload));
    }

    #[test]
    fn denied_checks_are_permission_errors() {
        let err = principal(Role::Viewer, vec![]).authorize(Resource::Activity, Create).unwrap_err();
        assert_eq!(err, Error::Permission("viewer may not create activity".into()));
    }

    #[test]
    fn cluster_scoped_roles_see_their_clusters_only() {
        let viewer = principal(Role::Viewer, vec![3, 5]);
        assert!(viewer.visibility().permits(5));
        assert!(!viewer.visibility().permits(4));
        assert_eq!(principal(Role::DataManager, vec![]).visibility(), Visibility::All);
    }

    #[test]
    fn roles_parse_from_stored_names() {
        assert_eq!("system_admin".parse::<Role>().unwrap(), Role::SystemAdmin);
        assert_eq!(Role::ActivityManager.as_ref(), "activity_manager");
    }
}
