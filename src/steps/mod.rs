pub mod collection;
pub mod principal;

use std::sync::Arc;

use api_creator_kernel::Provisioner;

/// Register the bootstrap steps. The principal comes first, then the
/// collection it is granted access to.
pub fn register_all(provisioner: &mut Provisioner) {
    provisioner.register(Arc::new(principal::PrincipalStep::new()));
    provisioner.register(Arc::new(collection::CollectionStep::new()));
}
