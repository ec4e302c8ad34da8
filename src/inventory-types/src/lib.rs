mod crd;
mod metadata;
pub mod base64_bytes;
pub mod cluster_profile;
pub mod core;
pub mod exec_credential;
pub mod placement;

pub use self::crd::*;
pub use self::metadata::*;
pub use self::spec_def::*;

mod spec_def {

    use std::fmt::Debug;

    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use serde::Serialize;

    use super::Crd;

    /// bounds shared by every part of a stored object
    pub trait ObjectPart:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
    }

    impl<T> ObjectPart for T where
        T: Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
    }

    /// `status` block of an object
    pub trait Status: ObjectPart {}

    /// top level fields stored next to `metadata`, such as Secret `data`
    pub trait Header: ObjectPart {}

    /// Resource type served by the api server.
    ///
    /// The spec type names the resource; its `Status` and `Header` types give
    /// the shape of the rest of the object.
    pub trait Spec: ObjectPart {
        type Status: Status;

        type Header: Header;

        /// cluster scoped resources set this to false
        const NAME_SPACED: bool = true;

        fn metadata() -> &'static Crd;

        fn label() -> &'static str {
            Self::metadata().names.kind
        }

        /// `apiVersion` of stored objects: `v1` for the core group, `<group>/<version>` otherwise
        fn api_version() -> String {
            Self::metadata().group_version()
        }

        fn kind() -> String {
            Self::label().to_owned()
        }
    }

    /// header of resources without top level payload
    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    pub struct DefaultHeader {}

    impl Header for DefaultHeader {}

    /// status of resources without a status block
    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    pub struct NoStatus {}

    impl Status for NoStatus {}
}
