use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub static PORT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static SERVER_FAILS: AtomicBool = AtomicBool::new(true);
pub static SERVER_CLOSED: AtomicUsize = AtomicUsize::new(0);
pub static DEP_FAILS: AtomicBool = AtomicBool::new(true);
pub static USERS_CLOSED: AtomicUsize = AtomicUsize::new(0);

pub struct Server;

impl Server {
    pub fn close(&self) -> anyhow::Result<()> {
        SERVER_CLOSED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Users;

impl Users {
    pub fn close(&self) -> anyhow::Result<()> {
        USERS_CLOSED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Dep;

pub struct Flaky;

pub struct Top {
    pub has_dep: bool,
}
