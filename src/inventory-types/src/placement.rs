use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::Header;
use crate::NoStatus;
use crate::Spec;
use crate::MULTICLUSTER_GROUP;
use crate::MULTICLUSTER_VERSION;

const PLACEMENT_DECISION_API: Crd = Crd {
    group: MULTICLUSTER_GROUP,
    version: MULTICLUSTER_VERSION,
    names: CrdNames {
        kind: "PlacementDecision",
        plural: "placementdecisions",
        singular: "placementdecision",
    },
};

pub const DECISION_KEY_LABEL: &str = "multicluster.x-k8s.io/decision-key";
pub const DECISION_INDEX_LABEL: &str = "multicluster.x-k8s.io/decision-index";
pub const PLACEMENT_KEY_LABEL: &str = "multicluster.x-k8s.io/placement-key";

/// placement decisions carry no spec, payload is at the top level
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct PlacementDecisionSpec {}

impl Spec for PlacementDecisionSpec {
    type Status = NoStatus;
    type Header = PlacementDecisionHeader;

    fn metadata() -> &'static Crd {
        &PLACEMENT_DECISION_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDecisionHeader {
    #[serde(default)]
    pub decisions: Vec<ClusterDecision>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduler_name: String,
}

impl Header for PlacementDecisionHeader {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDecision {
    pub cluster_profile_ref: ClusterProfileReference,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterProfileReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}
