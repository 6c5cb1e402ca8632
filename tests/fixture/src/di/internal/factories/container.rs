use std::sync::{atomic::Ordering, Arc};

use super::super::lookup;
use crate::services::{self, Dep, Flaky, Server, Top};

pub fn create_port(_ctx: &(), _c: &mut dyn lookup::Container) -> u16 {
    services::PORT_CALLS.fetch_add(1, Ordering::SeqCst);
    8080
}

pub fn create_server(_ctx: &(), _c: &mut dyn lookup::Container) -> anyhow::Result<Arc<Server>> {
    if services::SERVER_FAILS.swap(false, Ordering::SeqCst) {
        anyhow::bail!("bind failed");
    }
    Ok(Arc::new(Server))
}

pub fn create_dep(_ctx: &(), _c: &mut dyn lookup::Container) -> anyhow::Result<Arc<Dep>> {
    if services::DEP_FAILS.swap(false, Ordering::SeqCst) {
        anyhow::bail!("db down");
    }
    Ok(Arc::new(Dep))
}

pub fn create_top(ctx: &(), c: &mut dyn lookup::Container) -> Arc<Top> {
    Arc::new(Top {
        has_dep: c.dep(ctx).is_some(),
    })
}

pub fn create_flaky(_ctx: &(), _c: &mut dyn lookup::Container) -> anyhow::Result<Arc<Flaky>> {
    anyhow::bail!("flaky down")
}

pub fn create_chain(ctx: &(), c: &mut dyn lookup::Container) -> u8 {
    let _ = c.flaky(ctx);
    panic!("chain broke")
}

pub fn create_boom(_ctx: &(), _c: &mut dyn lookup::Container) -> u8 {
    panic!("kaboom")
}
