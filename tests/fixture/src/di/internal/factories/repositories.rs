use std::sync::Arc;

use super::super::lookup;
use crate::services::Users;

pub fn create_repositories_users(_ctx: &(), _c: &mut dyn lookup::Container) -> Arc<Users> {
    Arc::new(Users)
}
