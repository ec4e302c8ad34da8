use std::path::Path;

use tracing::debug;

use crate::pod::service_account_namespace;
use crate::pod::SERVICE_ACCOUNT_DIR;
use crate::KubeConfig;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace a plugin should read from when none is configured: the current
/// kubeconfig context, then the service account mount, then `default`.
pub fn infer_namespace() -> String {
    let kube_config = KubeConfig::load_default().ok();
    infer_namespace_from(kube_config.as_ref(), SERVICE_ACCOUNT_DIR)
}

pub fn infer_namespace_from<P: AsRef<Path>>(
    kube_config: Option<&KubeConfig>,
    account_dir: P,
) -> String {
    let from_context = kube_config
        .and_then(|config| config.current_context())
        .and_then(|ctx| ctx.context.namespace.as_deref())
        .map(str::trim)
        .filter(|ns| !ns.is_empty());
    if let Some(ns) = from_context {
        debug!(ns, "namespace from kubeconfig context");
        return ns.to_owned();
    }

    if let Some(ns) = service_account_namespace(account_dir) {
        debug!(%ns, "namespace from service account");
        return ns;
    }

    DEFAULT_NAMESPACE.to_owned()
}
