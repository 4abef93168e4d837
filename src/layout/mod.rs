pub mod manifest;
pub mod provisioner;

pub use manifest::{write_manifest, ManifestEntry, ManifestWriter};
pub use provisioner::{
    provision_directories, DirectoryProvisioner, DirectoryTarget, ProvisionReport,
    ProvisionedDirectory,
};
