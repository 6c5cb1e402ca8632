use std::sync::Arc;

use crate::services::{Dep, Flaky, Server, Top, Users};

pub struct Container {
    #[di(required, public)]
    name: String,
    #[di(public)]
    port: u16,
    #[di(public, close)]
    server: Arc<Server>,
    #[di(external, public)]
    external: Arc<String>,
    #[di(public)]
    dep: Arc<Dep>,
    #[di(public)]
    top: Arc<Top>,
    flaky: Arc<Flaky>,
    #[di(public)]
    chain: u8,
    #[di(public)]
    boom: u8,

    repositories: Repositories,
}

pub struct Repositories {
    #[di(public, close)]
    users: Arc<Users>,
}
