/// API group of the cluster inventory resources
pub const MULTICLUSTER_GROUP: &str = "multicluster.x-k8s.io";
pub const MULTICLUSTER_VERSION: &str = "v1alpha1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crd {
    pub group: &'static str,
    pub version: &'static str,
    pub names: CrdNames,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdNames {
    pub kind: &'static str,
    pub plural: &'static str,
    pub singular: &'static str,
}

impl Crd {
    fn is_core(&self) -> bool {
        self.group == "core"
    }

    pub fn group_version(&self) -> String {
        if self.is_core() {
            self.version.to_owned()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// path prefix for this resource, `api/v1` for core group otherwise `apis/<group>/<version>`
    pub fn api_prefix(&self) -> String {
        if self.is_core() {
            format!("api/{}", self.version)
        } else {
            format!("apis/{}", self.group_version())
        }
    }
}
