//! Connect to a board, prime every component and print state changes.
//!
//! Usage: cargo run --example board_monitor [-- <host:port | config.json>]
//!
//! Set `RUST_LOG=vmlink=debug` to see the wire traffic.

use std::process;
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use vmlink::components::{Activity, Mute, OtaHosts, Packages, Screen, Tasks, UsbDump, Volume};
use vmlink::{BoardLink, LinkConfig, LinkError};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vmlink=info")))
        .init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn load_config() -> Result<LinkConfig, LinkError> {
    let Some(arg) = std::env::args().nth(1) else {
        return Ok(LinkConfig::default());
    };
    if arg.ends_with(".json") {
        let raw = std::fs::read_to_string(&arg)?;
        return LinkConfig::from_json(&raw).map_err(|e| LinkError::Protocol(format!("{arg}: {e}")));
    }
    Ok(LinkConfig { addr: arg, ..LinkConfig::default() })
}

fn run() -> Result<(), LinkError> {
    let config = load_config()?;
    let link = BoardLink::tcp(&config)?;

    // Wire observers before connecting so the first replies are seen.
    let volume = link.component::<Volume>();
    volume.level().changed().subscribe(|level| println!("volume   {level}"));

    let mute = link.component::<Mute>();
    mute.muted().changed().subscribe(|muted| println!("muted    {muted}"));

    let screen = link.component::<Screen>();
    screen.on().changed().subscribe(|on| println!("screen   {}", if *on { "on" } else { "off" }));
    screen.command_failed().subscribe(|err| println!("screen   failed: {}", err.describe()));

    let tasks = link.component::<Tasks>();
    tasks.tasks().changed().subscribe(|list| {
        println!("tasks    {} running", list.len());
        for t in list {
            println!("         #{:<5} {}", t.task_id, t.top_activity);
        }
    });
    tasks.foreground().changed().subscribe(|fg| match fg {
        Some(t) => println!("front    {} (task {})", t.package(), t.task_id),
        None => println!("front    none"),
    });

    let packages = link.component::<Packages>();
    packages.packages().changed().subscribe(|list| {
        let user = list.iter().filter(|p| !p.is_system).count();
        println!("packages {} installed, {user} user", list.len());
    });

    let ota = link.component::<OtaHosts>();
    ota.hosts().changed().subscribe(|hosts| println!("ota      {}", hosts.join(", ")));

    let usb = link.component::<UsbDump>();
    usb.devices().changed().subscribe(|devices| {
        for d in devices {
            println!("usb      {} {}", d.usb_id(), d.product_name);
        }
    });

    let activity = link.component::<Activity>();
    activity.launched().subscribe(|_| println!("activity launched"));
    activity.launch_failed().subscribe(|err| println!("activity failed: {}", err.describe()));

    println!("Connecting to {}...", config.addr);
    link.connect()?;
    println!("Connected.");
    usb.dump()?;

    loop {
        thread::sleep(Duration::from_secs(1));
        if !link.is_ready() {
            println!("Connection lost.");
            return Ok(());
        }
    }
}
