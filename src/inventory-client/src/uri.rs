use http::Uri;
use serde::Serialize;

use inventory_types::Crd;
use inventory_types::LabelSelector;
use inventory_types::Spec;

use crate::AuthError;

/// namespace scope of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSpace {
    All,
    Named(String),
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        Self::Named(namespace.to_owned())
    }
}

impl From<String> for NameSpace {
    fn from(namespace: String) -> Self {
        Self::Named(namespace)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

impl ListOptions {
    pub fn selecting(selector: &LabelSelector) -> Self {
        Self {
            label_selector: Some(selector.as_query()),
        }
    }
}

/// uri of a single object
pub fn item_uri<S>(host: &str, name: &str, namespace: &str) -> Result<Uri, AuthError>
where
    S: Spec,
{
    let ns = if S::NAME_SPACED {
        NameSpace::from(namespace)
    } else {
        NameSpace::All
    };
    let prefix = prefix_uri(S::metadata(), host, ns, None)?;
    parse(format!("{prefix}/{name}"))
}

/// uri of a collection
pub fn items_uri<S>(
    host: &str,
    namespace: NameSpace,
    options: Option<&ListOptions>,
) -> Result<Uri, AuthError>
where
    S: Spec,
{
    let ns = if S::NAME_SPACED {
        namespace
    } else {
        NameSpace::All
    };
    parse(prefix_uri(S::metadata(), host, ns, options)?)
}

/// collection url of `crd`, scoped to `ns`
pub fn prefix_uri(
    crd: &Crd,
    host: &str,
    ns: NameSpace,
    options: Option<&ListOptions>,
) -> Result<String, AuthError> {
    let host = host.trim_end_matches('/');
    let api_prefix = crd.api_prefix();
    let plural = crd.names.plural;

    let query = match options {
        Some(options) => {
            let qs = serde_qs::to_string(options)
                .map_err(|err| AuthError::configuration(format!("list options: {err}")))?;
            if qs.is_empty() {
                String::new()
            } else {
                format!("?{qs}")
            }
        }
        None => String::new(),
    };

    Ok(match ns {
        NameSpace::All => format!("{host}/{api_prefix}/{plural}{query}"),
        NameSpace::Named(namespace) => {
            format!("{host}/{api_prefix}/namespaces/{namespace}/{plural}{query}")
        }
    })
}

fn parse(value: String) -> Result<Uri, AuthError> {
    value
        .parse()
        .map_err(|err| AuthError::configuration(format!("invalid uri {value}: {err}")))
}
