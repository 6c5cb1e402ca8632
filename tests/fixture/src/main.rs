mod di;
mod services;

use std::sync::{atomic::Ordering, Arc};

use di::{Container, Injector};
use services::{PORT_CALLS, SERVER_CLOSED, USERS_CLOSED};

fn describe<T>(result: anyhow::Result<T>) -> String {
    match result {
        Ok(_) => "ok".to_owned(),
        Err(err) => format!("{err:#}"),
    }
}

fn closed() -> String {
    format!(
        "{}/{}",
        SERVER_CLOSED.load(Ordering::SeqCst),
        USERS_CLOSED.load(Ordering::SeqCst)
    )
}

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|_| {}));

    let c = Container::new("app".to_owned(), Vec::new())?;
    println!("name={}", c.name(&())?);

    c.port(&())?;
    c.port(&())?;
    println!("port_calls={}", PORT_CALLS.load(Ordering::SeqCst));

    println!("external_missing={}", describe(c.external(&())));

    println!("server_err={}", describe(c.server(&())));
    c.close();
    println!("closed_before={}", closed());

    let server = c.server(&())?;
    println!("server_shared={}", Arc::ptr_eq(&server, &c.server(&())?));
    c.users(&())?;
    c.close();
    println!("closed_after={}", closed());

    println!("top_first={}", describe(c.top(&())));
    println!("top_second={}", c.top(&())?.has_dep);

    println!("chain={}", describe(c.chain(&())));
    println!("boom={}", describe(c.boom(&())));
    println!("boom_again={}", describe(c.boom(&())));

    let c = Container::new("app".to_owned(), vec![Container::set_external(Arc::new("ext".to_owned()))])?;
    println!("external={}", c.external(&())?);

    let reject: Injector = Box::new(|_: &Container| Err(anyhow::anyhow!("injector rejected")));
    println!("rejected={}", describe(Container::new("app".to_owned(), vec![reject])));

    Ok(())
}
